use chrono::{DateTime, Utc};
use tps_common::Money;

use crate::db_types::{Order, OrderId, PaymentStatus, SubscriptionStatus, TicketStatus};

/// Outcome of a ticket reservation attempt. Selling out is an expected result, not an error.
#[derive(Debug, Clone)]
pub enum Reservation {
    Admitted(Order),
    SoldOut,
}

/// Outcome of settling a gateway callback against an order.
#[derive(Debug, Clone)]
pub enum CallbackSettlement {
    /// A previous callback already settled this order. Nothing was changed.
    AlreadyProcessed(Order),
    /// This callback won the settlement race and the order transitioned.
    Settled(Order),
}

/// The fields a gateway callback may write onto an order when it settles.
#[derive(Debug, Clone)]
pub struct CallbackUpdate {
    pub new_status: PaymentStatus,
    pub auth_code: Option<String>,
    pub card_pan: Option<String>,
    pub payment_system: Option<String>,
    /// Contact fields from the callback. Only fields the order is missing get filled in.
    pub contact: ContactInfo,
}

/// Contact fields as they appear on a gateway callback, already normalised.
#[derive(Debug, Clone, Default)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactInfo {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.phone.is_none()
    }
}

/// A door scan attempt to append to the scan log.
#[derive(Debug, Clone)]
pub struct NewScanRecord {
    pub order_id: i64,
    pub scanned_by: String,
    pub ip_address: Option<String>,
    pub was_valid: bool,
    pub previous_status: TicketStatus,
}

/// One gateway STATUS response mapped onto the local subscription mirror, keyed by order reference.
#[derive(Debug, Clone)]
pub struct SubscriptionUpsert {
    pub order_reference: OrderId,
    pub source_order_id: Option<i64>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: SubscriptionStatus,
    pub mode: Option<String>,
    pub amount: Option<Money>,
    pub currency: Option<String>,
    pub date_begin: Option<DateTime<Utc>>,
    pub date_end: Option<DateTime<Utc>>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub last_payed_date: Option<DateTime<Utc>>,
    pub last_payed_status: Option<String>,
    pub last_reason_code: Option<String>,
    pub last_reason: Option<String>,
    pub last_raw: Option<String>,
}
