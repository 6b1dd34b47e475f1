use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use tps_common::Money;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        OrderId        -------------------------------------------------------
/// The gateway correlation string for an order, e.g. `TICKET_42_1718000000`. Assigned when the payment
/// request is built, so freshly created orders do not have one yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      OrderKind        -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Ticket,
    Subscription,
}

impl Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::Ticket => write!(f, "Ticket"),
            OrderKind::Subscription => write!(f, "Subscription"),
        }
    }
}

impl FromStr for OrderKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ticket" => Ok(Self::Ticket),
            "Subscription" => Ok(Self::Subscription),
            s => Err(ConversionError(format!("Invalid order kind: {s}"))),
        }
    }
}

impl OrderKind {
    /// The prefix used when generating gateway order references.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            OrderKind::Ticket => "TICKET",
            OrderKind::Subscription => "SUB",
        }
    }
}

//--------------------------------------    PaymentStatus      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// The order has been created and no gateway verdict has arrived yet.
    Pending,
    /// The gateway reported an approved charge.
    Success,
    /// The gateway reported a declined or otherwise unsuccessful charge.
    Failed,
    /// The order sat in `Pending` past the reservation TTL and its inventory slot was reclaimed.
    Expired,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Success => write!(f, "Success"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Expired => write!(f, "Expired"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            "Expired" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status in DB: {value}. Defaulting to Pending");
            PaymentStatus::Pending
        })
    }
}

impl PaymentStatus {
    /// Terminal states never transition again through the webhook path.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

//--------------------------------------     EmailStatus       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    NotSent,
    Sent,
    Failed,
}

impl Display for EmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailStatus::NotSent => write!(f, "NotSent"),
            EmailStatus::Sent => write!(f, "Sent"),
            EmailStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for EmailStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NotSent" => Ok(Self::NotSent),
            "Sent" => Ok(Self::Sent),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid email status: {s}"))),
        }
    }
}

//--------------------------------------    TicketStatus       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Paid and not yet scanned at the door.
    Active,
    /// Scanned and admitted.
    Used,
    /// Not admissible (unpaid, expired, or administratively voided).
    Invalid,
}

impl Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketStatus::Active => write!(f, "Active"),
            TicketStatus::Used => write!(f, "Used"),
            TicketStatus::Invalid => write!(f, "Invalid"),
        }
    }
}

impl FromStr for TicketStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Used" => Ok(Self::Used),
            "Invalid" => Ok(Self::Invalid),
            s => Err(ConversionError(format!("Invalid ticket status: {s}"))),
        }
    }
}

//--------------------------------------      DeviceType       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Desktop,
    Mobile,
}

impl Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Desktop => write!(f, "Desktop"),
            DeviceType::Mobile => write!(f, "Mobile"),
        }
    }
}

impl FromStr for DeviceType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "mobile" => Ok(Self::Mobile),
            s => Err(ConversionError(format!("Invalid device type: {s}"))),
        }
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub kind: OrderKind,
    pub event_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub amount: Money,
    pub currency: String,
    pub device_type: DeviceType,
    pub payment_status: PaymentStatus,
    pub email_status: EmailStatus,
    pub ticket_status: TicketStatus,
    /// Display ordinal assigned at reservation time. Advisory only: expiries leave gaps and concurrent
    /// reservations may reuse an ordinal after a sweep.
    pub ticket_number: Option<i64>,
    pub order_reference: Option<OrderId>,
    pub callback_processed: bool,
    pub auth_code: Option<String>,
    pub card_pan: Option<String>,
    pub payment_system: Option<String>,
    pub crm_lead_id: Option<i64>,
    pub crm_payment_id: Option<i64>,
    pub crm_contact_id: Option<i64>,
    pub scan_count: i64,
    pub used_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewOrder       --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub kind: OrderKind,
    /// Normalised (trimmed, lowercased) email.
    pub name: String,
    pub email: String,
    /// Normalised (digits only) phone.
    pub phone: String,
    pub amount: Money,
    pub currency: String,
    pub device_type: DeviceType,
}

impl NewOrder {
    pub fn new(kind: OrderKind, name: String, email: String, phone: String, amount: Money) -> Self {
        Self { kind, name, email, phone, amount, currency: tps_common::UAH_CURRENCY_CODE.to_string(), device_type: DeviceType::default() }
    }

    pub fn with_device(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }
}

//--------------------------------------     TicketEvent      --------------------------------------------------------
/// An event (party) tickets are sold for. At most one event is active for ticket sales at a time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TicketEvent {
    pub id: i64,
    pub title: String,
    pub event_date: DateTime<Utc>,
    pub price: Money,
    pub max_tickets: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      ScanRecord      --------------------------------------------------------
/// One row in the append-only door scan log. Every scan attempt is recorded, including rejected ones.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: i64,
    pub order_id: i64,
    pub scanned_at: DateTime<Utc>,
    pub scanned_by: String,
    pub ip_address: Option<String>,
    pub was_valid: bool,
    pub previous_status: TicketStatus,
}

//--------------------------------------  SubscriptionStatus  --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Created,
    Active,
    Suspended,
    Removed,
    Completed,
    Unknown,
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::Created => write!(f, "Created"),
            SubscriptionStatus::Active => write!(f, "Active"),
            SubscriptionStatus::Suspended => write!(f, "Suspended"),
            SubscriptionStatus::Removed => write!(f, "Removed"),
            SubscriptionStatus::Completed => write!(f, "Completed"),
            SubscriptionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

impl SubscriptionStatus {
    /// Maps the gateway's status strings onto the local set. The gateway has been observed to vary
    /// capitalisation and to report "Confirmed" for freshly created plans.
    pub fn from_gateway(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" | "confirmed" => Self::Created,
            "active" => Self::Active,
            "suspended" => Self::Suspended,
            "removed" => Self::Removed,
            "completed" => Self::Completed,
            _ => Self::Unknown,
        }
    }

    /// Statuses for which the gateway will not charge again, so a stored next-payment date is stale.
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Removed | Self::Completed)
    }
}

//--------------------------------------     Subscription     --------------------------------------------------------
/// Local mirror of the gateway's recurring-payment state for one order reference. Refreshed by the
/// operator sync command; the webhook path never writes here.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
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
    /// Raw STATUS response from the last sync, kept for contact backfill.
    pub last_raw: Option<String>,
    pub last_sync_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payment_status_round_trip() {
        for s in [PaymentStatus::Pending, PaymentStatus::Success, PaymentStatus::Failed, PaymentStatus::Expired] {
            assert_eq!(s.to_string().parse::<PaymentStatus>().unwrap(), s);
        }
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Success.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Expired.is_terminal());
    }

    #[test]
    fn gateway_subscription_statuses_normalise() {
        assert_eq!(SubscriptionStatus::from_gateway("Active"), SubscriptionStatus::Active);
        assert_eq!(SubscriptionStatus::from_gateway("confirmed"), SubscriptionStatus::Created);
        assert_eq!(SubscriptionStatus::from_gateway(" REMOVED "), SubscriptionStatus::Removed);
        assert_eq!(SubscriptionStatus::from_gateway("whatever"), SubscriptionStatus::Unknown);
    }

    #[test]
    fn reference_prefixes() {
        assert_eq!(OrderKind::Ticket.reference_prefix(), "TICKET");
        assert_eq!(OrderKind::Subscription.reference_prefix(), "SUB");
    }
}
