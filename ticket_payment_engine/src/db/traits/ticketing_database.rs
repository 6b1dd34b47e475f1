use chrono::Duration;

use crate::{
    db_types::{EmailStatus, NewOrder, Order, OrderId, OrderKind, Subscription, TicketEvent},
    traits::{CallbackSettlement, CallbackUpdate, NewScanRecord, Reservation, SubscriptionUpsert},
};

/// The full backend surface the order flow needs. Implementations must make [`Self::reserve_ticket`]
/// and [`Self::settle_callback`] safe under concurrent calls; everything else is plain CRUD.
#[allow(async_fn_in_trait)]
pub trait TicketingDatabase {
    type Error: std::error::Error;

    /// The URL of the database
    fn url(&self) -> &str;

    /// The event currently open for ticket sales, if any.
    async fn fetch_active_event(&self) -> Result<Option<TicketEvent>, Self::Error>;

    /// Attempts to reserve a ticket for the active event. In one serialised write transaction:
    /// pending orders older than `reservation_ttl` are expired, live orders are counted against the
    /// event's cap, and either the order is inserted with the next advisory ticket number or
    /// [`Reservation::SoldOut`] is returned.
    async fn reserve_ticket(
        &self,
        event: &TicketEvent,
        order: NewOrder,
        reservation_ttl: Duration,
    ) -> Result<Reservation, Self::Error>;

    /// Inserts a subscription order. Subscriptions have no inventory cap.
    async fn insert_subscription_order(&self, order: NewOrder) -> Result<Order, Self::Error>;

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, Self::Error>;

    async fn fetch_order_by_reference(&self, reference: &OrderId) -> Result<Option<Order>, Self::Error>;

    /// Stores the gateway order reference generated for a freshly created order.
    async fn assign_order_reference(&self, id: i64, reference: &OrderId) -> Result<(), Self::Error>;

    /// The most recent pending order of this kind for this email within `window`, used as a
    /// duplicate-submission guard at checkout. The kind filter keeps a pending subscription from
    /// swallowing a ticket purchase by the same person, and vice versa.
    async fn recent_pending_order_for_email(
        &self,
        email: &str,
        kind: OrderKind,
        window: Duration,
    ) -> Result<Option<Order>, Self::Error>;

    /// Pending, not-yet-processed subscription orders, newest first. Input to the callback matcher.
    async fn fetch_unmatched_subscription_orders(&self) -> Result<Vec<Order>, Self::Error>;

    /// Settles a gateway callback. The check on `callback_processed` and the write happen in one
    /// transaction, so exactly one of two racing callbacks observes [`CallbackSettlement::Settled`].
    /// Contact fields in the update fill gaps only; existing order values are never overwritten.
    async fn settle_callback(&self, id: i64, update: CallbackUpdate) -> Result<CallbackSettlement, Self::Error>;

    async fn set_email_status(&self, id: i64, status: EmailStatus) -> Result<(), Self::Error>;

    /// Records the CRM identifiers created or discovered for an order.
    async fn set_crm_refs(
        &self,
        id: i64,
        lead_id: Option<i64>,
        payment_id: Option<i64>,
        contact_id: Option<i64>,
    ) -> Result<(), Self::Error>;

    /// Expires pending ticket orders older than `reservation_ttl`. Returns how many were expired.
    async fn expire_stale_orders(&self, reservation_ttl: Duration) -> Result<u64, Self::Error>;

    /// Appends a row to the scan log. Scan attempts are recorded whether or not they were admitted.
    async fn append_scan(&self, scan: NewScanRecord) -> Result<(), Self::Error>;

    /// Marks an active ticket as used. Returns false if the ticket was not in `Active` status, in
    /// which case nothing was changed.
    async fn mark_ticket_used(&self, id: i64) -> Result<bool, Self::Error>;

    /// Inserts or refreshes one row of the subscription mirror, keyed by order reference.
    async fn upsert_subscription(&self, sub: SubscriptionUpsert) -> Result<(), Self::Error>;

    async fn fetch_subscriptions(&self) -> Result<Vec<Subscription>, Self::Error>;

    /// Distinct gateway references of subscription orders, newest first. Drives the sync command.
    async fn subscription_order_references(&self, limit: Option<i64>) -> Result<Vec<OrderId>, Self::Error>;

    /// Orders missing a name, email or phone. Candidates for contact backfill from sync payloads.
    async fn orders_missing_contacts(&self) -> Result<Vec<Order>, Self::Error>;

    /// Fills in the missing contact fields on an order. Present fields are left untouched.
    async fn backfill_contact(
        &self,
        id: i64,
        name: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<(), Self::Error>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
