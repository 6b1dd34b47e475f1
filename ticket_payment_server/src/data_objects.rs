use std::{collections::BTreeMap, fmt::Display};

use serde::{Deserialize, Serialize};
use ticket_payment_engine::db_types::DeviceType;
use wayforpay_tools::PaymentRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// A checkout form submission, for both ticket and subscription orders.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub device_type: Option<DeviceType>,
}

/// Structured checkout response. Exactly one of `payment` (admitted), `sold_out` (redirect) or
/// `errors` (validation) is meaningful, discriminated by `success`/`sold_out`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sold_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    /// Signed gateway parameters the front end posts to the payment page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub errors: BTreeMap<String, String>,
}

impl CheckoutResponse {
    pub fn admitted(order_id: i64, payment: PaymentRequest) -> Self {
        Self {
            success: true,
            sold_out: false,
            order_id: Some(order_id),
            payment: Some(payment),
            redirect: None,
            errors: BTreeMap::new(),
        }
    }

    pub fn sold_out() -> Self {
        Self {
            success: false,
            sold_out: true,
            order_id: None,
            payment: None,
            redirect: Some("/sold-out".to_string()),
            errors: BTreeMap::new(),
        }
    }

    pub fn invalid(errors: BTreeMap<String, String>) -> Self {
        Self { success: false, sold_out: false, order_id: None, payment: None, redirect: None, errors }
    }
}

/// Body of a door scan request.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    #[serde(default = "default_scanner")]
    pub scanned_by: String,
}

fn default_scanner() -> String {
    "door".to_string()
}

/// Door scan / validation response. `status` is one of `valid`, `used` or `invalid`.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<chrono::DateTime<chrono::Utc>>,
}
