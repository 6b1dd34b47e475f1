use serde::{Deserialize, Serialize};
use serde_json::Value;
use tps_common::Money;

pub const PAYMENT_STATUS_NOT_PAID: &str = "not_paid";
pub const PAYMENT_STATUS_PAID: &str = "paid";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrmContact {
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmProduct {
    pub sku: String,
    pub price: f64,
    pub quantity: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCrmPayment {
    pub payment_method: String,
    pub amount: f64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomField {
    pub uuid: String,
    pub value: String,
}

/// A new pipeline card (lead) with its embedded payment. Created at checkout time so the funnel shows
/// abandoned carts as well as paid orders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPipelineCard {
    pub title: String,
    pub pipeline_id: i64,
    pub source_id: i64,
    pub manager_comment: String,
    pub contact: CrmContact,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub products: Vec<CrmProduct>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub payments: Vec<NewCrmPayment>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub custom_fields: Vec<CustomField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrmPayment {
    pub id: i64,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub status: String,
}

/// The identifiers harvested from a card-creation response. The payment id matters most: it is the record
/// the external transaction gets attached to after the gateway confirms the charge.
#[derive(Debug, Clone, Default)]
pub struct CreatedLead {
    pub lead_id: i64,
    pub contact_id: Option<i64>,
    pub payment_id: Option<i64>,
}

impl CreatedLead {
    /// The CRM's response shape has drifted over API revisions (`id` at the top level or nested under
    /// `data`), so extraction probes both rather than binding a strict type.
    pub fn from_response(value: &Value) -> Option<Self> {
        let body = if value.get("id").is_some() { value } else { value.get("data")? };
        let lead_id = body.get("id")?.as_i64()?;
        let contact_id = body.get("contact").and_then(|c| c.get("id")).and_then(Value::as_i64);
        let payment_id = body
            .get("payments")
            .and_then(Value::as_array)
            .and_then(|ps| ps.first())
            .and_then(|p| p.get("id"))
            .and_then(Value::as_i64);
        Some(Self { lead_id, contact_id, payment_id })
    }
}

/// A CRM-side record of a gateway transaction, ingested by the CRM from its own payment-provider feed.
/// These are matched (never created) during reconciliation.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalTransaction {
    pub id: i64,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
}

impl ExternalTransaction {
    pub fn amount_as_money(&self) -> Money {
        Money::from_cents((self.amount * 100.0).round() as i64)
    }

    /// The searchable text of the transaction: description and uuid, whichever are present.
    pub fn haystack(&self) -> String {
        let mut s = String::new();
        if let Some(d) = &self.description {
            s.push_str(d);
        }
        if let Some(u) = &self.uuid {
            s.push(' ');
            s.push_str(u);
        }
        s
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn created_lead_from_flat_response() {
        let value = json!({"id": 77, "contact": {"id": 12}, "payments": [{"id": 501, "amount": 100.0}]});
        let lead = CreatedLead::from_response(&value).unwrap();
        assert_eq!(lead.lead_id, 77);
        assert_eq!(lead.contact_id, Some(12));
        assert_eq!(lead.payment_id, Some(501));
    }

    #[test]
    fn created_lead_from_nested_response() {
        let value = json!({"data": {"id": 78}});
        let lead = CreatedLead::from_response(&value).unwrap();
        assert_eq!(lead.lead_id, 78);
        assert_eq!(lead.contact_id, None);
        assert_eq!(lead.payment_id, None);
    }

    #[test]
    fn created_lead_missing_id_is_none() {
        assert!(CreatedLead::from_response(&json!({"status": "ok"})).is_none());
    }

    #[test]
    fn transaction_amount_rounds_to_cents() {
        let txn = ExternalTransaction { id: 1, amount: 100.004999, description: None, uuid: None };
        assert_eq!(txn.amount_as_money(), Money::from_cents(10_000));
    }
}
