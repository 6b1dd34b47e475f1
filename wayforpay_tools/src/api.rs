use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::Client;
use serde_json::json;

use crate::{config::WayForPayConfig, data_objects::RegularStatus, error::WayForPayApiError};

/// Client for the gateway's regular-payments API. Only the `STATUS` request is needed: it is how the
/// subscription sync discovers the current state of a recurring payment for an order reference.
#[derive(Clone)]
pub struct WayForPayApi {
    config: WayForPayConfig,
    client: Arc<Client>,
}

impl WayForPayApi {
    pub fn new(config: WayForPayConfig) -> Result<Self, WayForPayApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| WayForPayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn status(&self, order_reference: &str) -> Result<RegularStatus, WayForPayApiError> {
        let payload = json!({
            "requestType": "STATUS",
            "merchantAccount": self.config.merchant_account,
            "merchantPassword": self.config.merchant_password.reveal(),
            "orderReference": order_reference,
        });
        trace!("💳️ STATUS request for {order_reference}");
        let response = self
            .client
            .post(&self.config.regular_api_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| WayForPayApiError::RequestError(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| WayForPayApiError::RequestError(e.to_string()))?;
        let raw: serde_json::Value = serde_json::from_str(&body)
            .map_err(|_| WayForPayApiError::NonJsonResponse { status: status.as_u16(), body: snippet(&body) })?;
        if status.as_u16() >= 400 {
            return Err(WayForPayApiError::QueryError { status: status.as_u16(), message: snippet(&body) });
        }
        let mut result: RegularStatus = serde_json::from_value(raw.clone())
            .map_err(|e| WayForPayApiError::RequestError(format!("Unexpected STATUS response shape: {e}")))?;
        result.raw = raw;
        trace!("💳️ STATUS for {order_reference}: {} ({})", result.status.as_str(), result.reason_code.as_str());
        Ok(result)
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}
