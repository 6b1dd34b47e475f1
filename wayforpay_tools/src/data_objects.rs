use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tps_common::Money;

use crate::{config::WayForPayConfig, signature::Signer};

/// Transaction-status token the gateway sends for an authorised charge.
pub const APPROVED_TOKEN: &str = "Approved";
/// Transaction-status token for a declined charge. Anything that is not [`APPROVED_TOKEN`] is treated as a
/// failure, but this one is logged without the "unknown status" warning.
pub const DECLINED_TOKEN: &str = "Declined";
/// The fixed status token in webhook acknowledgments.
pub const ACCEPT_STATUS: &str = "accept";

//--------------------------------------      WireField      ---------------------------------------------------------
/// A webhook field that the gateway may deliver as a string, a number, or not at all.
///
/// The original wire lexeme is preserved verbatim because these values feed the signature base string; absent
/// fields coerce to the empty string there and nowhere else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WireField(Option<String>);

impl WireField {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(Some(value.into()))
    }

    /// The value as it appears in the signature base string: the wire lexeme, or "" when absent.
    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }

    /// The value as data: `None` when absent or empty.
    pub fn get(&self) -> Option<&str> {
        self.0.as_deref().filter(|s| !s.is_empty())
    }
}

impl<'de> Deserialize<'de> for WireField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        let lexeme = match value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            Some(other) => {
                return Err(serde::de::Error::custom(format!("scalar expected in webhook field, got {other}")))
            },
        };
        Ok(Self(lexeme))
    }
}

impl<S: Into<String>> From<S> for WireField {
    fn from(value: S) -> Self {
        Self::new(value)
    }
}

//--------------------------------------   CallbackPayload   ---------------------------------------------------------
/// The webhook body the gateway POSTs after a transaction settles (or fails). Delivery is at-least-once, so
/// consumers must treat repeats of the same `order_reference` as retransmissions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub order_reference: String,
    #[serde(default)]
    pub merchant_account: WireField,
    #[serde(default)]
    pub merchant_signature: WireField,
    #[serde(default)]
    pub amount: WireField,
    #[serde(default)]
    pub currency: WireField,
    #[serde(default)]
    pub auth_code: WireField,
    #[serde(default)]
    pub card_pan: WireField,
    #[serde(default)]
    pub transaction_status: WireField,
    #[serde(default)]
    pub reason_code: WireField,
    #[serde(default)]
    pub payment_system: WireField,
    #[serde(default)]
    pub client_first_name: WireField,
    #[serde(default)]
    pub client_email: WireField,
    #[serde(default)]
    pub client_phone: WireField,
}

impl CallbackPayload {
    /// The signature base fields in the gateway-documented order for inbound callbacks. This order differs
    /// from the payment-initiation order; do not unify them.
    pub fn signature_fields(&self) -> [&str; 8] {
        [
            self.merchant_account.as_str(),
            self.order_reference.as_str(),
            self.amount.as_str(),
            self.currency.as_str(),
            self.auth_code.as_str(),
            self.card_pan.as_str(),
            self.transaction_status.as_str(),
            self.reason_code.as_str(),
        ]
    }

    pub fn is_approved(&self) -> bool {
        self.transaction_status.as_str() == APPROVED_TOKEN
    }

    /// The callback amount as money, when present and parseable.
    pub fn parsed_amount(&self) -> Option<Money> {
        self.amount.get().and_then(|s| s.parse().ok())
    }
}

//--------------------------------------     CallbackAck     ---------------------------------------------------------
/// The signed acknowledgment returned to the gateway for every processed callback. The gateway's retry policy
/// keys off the absence or malformation of this response, not off the payment outcome, so it is returned for
/// successes and failures alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackAck {
    pub order_reference: String,
    pub status: String,
    pub time: i64,
    pub signature: String,
}

impl CallbackAck {
    pub fn accept(order_reference: &str, signer: &Signer) -> Self {
        Self {
            order_reference: order_reference.to_string(),
            status: ACCEPT_STATUS.to_string(),
            time: Utc::now().timestamp(),
            signature: signer.ack_signature(order_reference),
        }
    }
}

//--------------------------------------    PaymentRequest   ---------------------------------------------------------
/// The payment-initiation parameters the checkout client form-posts to the gateway. Serialized field names
/// (including the `[]`-suffixed product arrays) follow the gateway's form encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub merchant_account: String,
    pub merchant_domain_name: String,
    pub order_reference: String,
    pub order_date: String,
    pub amount: String,
    pub currency: String,
    #[serde(rename = "productName[]")]
    pub product_name: Vec<String>,
    #[serde(rename = "productCount[]")]
    pub product_count: Vec<String>,
    #[serde(rename = "productPrice[]")]
    pub product_price: Vec<String>,
    pub client_first_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub language: String,
    pub return_url: String,
    pub service_url: String,
    pub merchant_signature: String,
}

#[derive(Debug, Clone)]
pub struct PaymentRequestBuilder<'a> {
    config: &'a WayForPayConfig,
    order_reference: String,
    amount: Money,
    products: Vec<(String, u32, Money)>,
    client_name: String,
    client_email: String,
    client_phone: String,
}

impl<'a> PaymentRequestBuilder<'a> {
    /// `order_reference` must be unique per payment attempt, even for repeat purchases against the same
    /// order. The convention is `{PREFIX}_{order_id}_{unix_timestamp}`.
    pub fn new(config: &'a WayForPayConfig, order_reference: String, amount: Money) -> Self {
        Self {
            config,
            order_reference,
            amount,
            products: Vec::new(),
            client_name: String::new(),
            client_email: String::new(),
            client_phone: String::new(),
        }
    }

    pub fn with_product<S: Into<String>>(mut self, name: S, count: u32, price: Money) -> Self {
        self.products.push((name.into(), count, price));
        self
    }

    pub fn with_client<S: Into<String>>(mut self, name: S, email: S, phone: S) -> Self {
        self.client_name = name.into();
        self.client_email = email.into();
        self.client_phone = phone.into();
        self
    }

    pub fn build(self, signer: &Signer) -> PaymentRequest {
        let order_date = Utc::now().timestamp().to_string();
        let amount = self.amount.to_decimal_string();
        let product_name = self.products.iter().map(|(n, _, _)| n.clone()).collect::<Vec<_>>();
        let product_count = self.products.iter().map(|(_, c, _)| c.to_string()).collect::<Vec<_>>();
        let product_price = self.products.iter().map(|(_, _, p)| p.to_decimal_string()).collect::<Vec<_>>();
        // Signature base: the header fields, then the flattened product arrays in declaration order.
        let mut fields = vec![
            self.config.merchant_account.clone(),
            self.config.merchant_domain.clone(),
            self.order_reference.clone(),
            order_date.clone(),
            amount.clone(),
            self.config.currency.clone(),
        ];
        fields.extend(product_name.iter().cloned());
        fields.extend(product_count.iter().cloned());
        fields.extend(product_price.iter().cloned());
        let merchant_signature = signer.sign_fields(&fields);
        PaymentRequest {
            merchant_account: self.config.merchant_account.clone(),
            merchant_domain_name: self.config.merchant_domain.clone(),
            order_reference: self.order_reference,
            order_date,
            amount,
            currency: self.config.currency.clone(),
            product_name,
            product_count,
            product_price,
            client_first_name: self.client_name,
            client_email: self.client_email,
            client_phone: self.client_phone,
            language: self.config.language.clone(),
            return_url: self.config.return_url.clone(),
            service_url: self.config.service_url.clone(),
            merchant_signature,
        }
    }
}

//--------------------------------------    RegularStatus    ---------------------------------------------------------
/// Response of the regular-payments `STATUS` call. The gateway is loose with types here (unix seconds,
/// unix milliseconds and `dd.mm.yyyy` strings have all been observed in the date fields), so everything is
/// captured as [`WireField`] and interpreted by the sync tooling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegularStatus {
    #[serde(default)]
    pub reason_code: WireField,
    #[serde(default)]
    pub reason: WireField,
    #[serde(default)]
    pub status: WireField,
    #[serde(default)]
    pub mode: WireField,
    #[serde(default)]
    pub amount: WireField,
    #[serde(default)]
    pub regular_amount: WireField,
    #[serde(default)]
    pub currency: WireField,
    #[serde(default)]
    pub date_begin: WireField,
    #[serde(default)]
    pub date_end: WireField,
    #[serde(default)]
    pub next_payment_date: WireField,
    #[serde(default)]
    pub last_payed_date: WireField,
    #[serde(default)]
    pub last_payed_status: WireField,
    /// The raw response body, retained for audit and offline backfills.
    #[serde(skip)]
    pub raw: Value,
}

impl RegularStatus {
    /// True if the response carries at least one status-bearing field. The gateway sometimes returns an error
    /// reason code alongside a perfectly usable status payload (e.g. 4107 with status `Removed`), so the
    /// reason code alone does not decide usability.
    pub fn has_meaningful_status(&self) -> bool {
        [&self.status, &self.mode, &self.next_payment_date, &self.date_begin, &self.date_end]
            .iter()
            .any(|f| f.get().is_some())
    }
}
