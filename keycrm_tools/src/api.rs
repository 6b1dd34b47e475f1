use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::Client;
use serde_json::{json, Value};

use crate::{
    config::KeyCrmConfig,
    data_objects::{CreatedLead, CrmPayment, ExternalTransaction, NewPipelineCard},
    error::KeyCrmApiError,
};

/// The CRM operations the payment server relies on. Implementations are expected to be thin wrappers
/// around a single HTTP call each; retries and backoff live with the caller.
#[allow(async_fn_in_trait)]
pub trait CrmApi {
    /// Create a pipeline card (lead) with its contact and embedded payment. Returns the new ids.
    async fn create_pipeline_card(&self, card: &NewPipelineCard) -> Result<CreatedLead, KeyCrmApiError>;
    /// One page of the CRM's external transaction feed, newest first.
    async fn list_external_transactions(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ExternalTransaction>, KeyCrmApiError>;
    /// Link a CRM payment record to one of the CRM's own external transactions.
    async fn attach_external_transaction(
        &self,
        payment_id: i64,
        transaction_id: i64,
    ) -> Result<(), KeyCrmApiError>;
    /// Manually set a payment's status. Used when no external transaction could be matched.
    async fn update_payment_status(
        &self,
        payment_id: i64,
        status: &str,
        description: Option<&str>,
    ) -> Result<(), KeyCrmApiError>;
    /// All payment records on a lead.
    async fn get_payments(&self, lead_id: i64) -> Result<Vec<CrmPayment>, KeyCrmApiError>;
}

/// Reqwest-backed [`CrmApi`] implementation against the KeyCRM open API.
#[derive(Clone)]
pub struct KeyCrmApi {
    config: KeyCrmConfig,
    client: Arc<Client>,
}

impl KeyCrmApi {
    pub fn new(config: KeyCrmConfig) -> Result<Self, KeyCrmApiError> {
        if !config.enabled {
            return Err(KeyCrmApiError::NotConfigured);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| KeyCrmApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &KeyCrmConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Value, KeyCrmApiError> {
        let response = request
            .bearer_auth(self.config.api_key.reveal())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| KeyCrmApiError::RequestError(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| KeyCrmApiError::RequestError(e.to_string()))?;
        if status.as_u16() >= 400 {
            return Err(KeyCrmApiError::QueryError { status: status.as_u16(), message: snippet(&body) });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|_| KeyCrmApiError::NonJsonResponse { status: status.as_u16(), body: snippet(&body) })
    }
}

impl CrmApi for KeyCrmApi {
    async fn create_pipeline_card(&self, card: &NewPipelineCard) -> Result<CreatedLead, KeyCrmApiError> {
        debug!("📇️ Creating CRM card \"{}\" in pipeline {}", card.title, card.pipeline_id);
        let value = self.execute(self.client.post(self.url("/pipelines/cards")).json(card)).await?;
        let lead = CreatedLead::from_response(&value)
            .ok_or_else(|| KeyCrmApiError::MissingField("pipelines/cards response id".into()))?;
        debug!("📇️ CRM card created. lead={}, payment={:?}", lead.lead_id, lead.payment_id);
        Ok(lead)
    }

    async fn list_external_transactions(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ExternalTransaction>, KeyCrmApiError> {
        let value = self
            .execute(
                self.client
                    .get(self.url("/payments/external-transactions"))
                    .query(&[("limit", limit), ("offset", offset)]),
            )
            .await?;
        // The feed is paginated under `data`; an empty page comes back as an empty array.
        let rows = value.get("data").cloned().unwrap_or(Value::Array(vec![]));
        let transactions: Vec<ExternalTransaction> = serde_json::from_value(rows)
            .map_err(|e| KeyCrmApiError::RequestError(format!("Unexpected transaction feed shape: {e}")))?;
        trace!("📇️ Fetched {} external transactions (offset {offset})", transactions.len());
        Ok(transactions)
    }

    async fn attach_external_transaction(
        &self,
        payment_id: i64,
        transaction_id: i64,
    ) -> Result<(), KeyCrmApiError> {
        info!("📇️ Attaching external transaction {transaction_id} to CRM payment {payment_id}");
        let payload = json!({ "transaction_id": transaction_id });
        self.execute(self.client.put(self.url(&format!("/payments/{payment_id}/external-transactions"))).json(&payload))
            .await?;
        Ok(())
    }

    async fn update_payment_status(
        &self,
        payment_id: i64,
        status: &str,
        description: Option<&str>,
    ) -> Result<(), KeyCrmApiError> {
        info!("📇️ Setting CRM payment {payment_id} status to {status}");
        let mut payload = json!({ "status": status });
        if let Some(d) = description {
            payload["description"] = Value::String(d.to_string());
        }
        self.execute(self.client.put(self.url(&format!("/payments/{payment_id}"))).json(&payload)).await?;
        Ok(())
    }

    async fn get_payments(&self, lead_id: i64) -> Result<Vec<CrmPayment>, KeyCrmApiError> {
        let value = self
            .execute(self.client.get(self.url(&format!("/pipelines/cards/{lead_id}"))).query(&[("include", "payments")]))
            .await?;
        let rows = value.get("payments").cloned().unwrap_or(Value::Array(vec![]));
        let payments: Vec<CrmPayment> = serde_json::from_value(rows)
            .map_err(|e| KeyCrmApiError::RequestError(format!("Unexpected payments shape: {e}")))?;
        Ok(payments)
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}
