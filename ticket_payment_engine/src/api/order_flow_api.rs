use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    api::{errors::OrderFlowError, order_objects::{ScanOutcome, TicketCheck}},
    db_types::{EmailStatus, NewOrder, Order, OrderId, OrderKind, PaymentStatus, TicketEvent, TicketStatus},
    events::{EventProducers, OrderPaidEvent},
    helpers::{new_order_reference, phones_match},
    traits::{CallbackSettlement, CallbackUpdate, ContactInfo, NewScanRecord, Reservation, TicketingDatabase},
};

/// `OrderFlowApi` is the primary API for the checkout, webhook settlement and scanning flows. It owns
/// the state machine rules; the backend only provides atomic primitives.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: TicketingDatabase
{
    /// The event currently on sale, if any. Checkout uses it for pricing and the product line.
    pub async fn active_event(&self) -> Result<Option<TicketEvent>, OrderFlowError> {
        self.db.fetch_active_event().await.map_err(OrderFlowError::db)
    }

    /// Reserves a ticket for the active event and assigns its gateway reference.
    ///
    /// Selling out is reported through [`Reservation::SoldOut`], not as an error. The reservation
    /// itself is serialised by the backend; reference assignment happens after, outside the lock.
    pub async fn checkout_ticket(
        &self,
        order: NewOrder,
        reservation_ttl: Duration,
    ) -> Result<Reservation, OrderFlowError> {
        let event = self
            .db
            .fetch_active_event()
            .await
            .map_err(OrderFlowError::db)?
            .ok_or(OrderFlowError::NoActiveEvent)?;
        let reservation =
            self.db.reserve_ticket(&event, order, reservation_ttl).await.map_err(OrderFlowError::db)?;
        match reservation {
            Reservation::SoldOut => Ok(Reservation::SoldOut),
            Reservation::Admitted(order) => {
                let order = self.attach_reference(order).await?;
                debug!(
                    "🔄️📦️ Ticket order #{} reserved (ticket {:?}, ref {:?})",
                    order.id, order.ticket_number, order.order_reference
                );
                Ok(Reservation::Admitted(order))
            },
        }
    }

    /// Creates a subscription order (no inventory cap) and assigns its gateway reference.
    pub async fn checkout_subscription(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        let order = self.db.insert_subscription_order(order).await.map_err(OrderFlowError::db)?;
        let order = self.attach_reference(order).await?;
        debug!("🔄️📦️ Subscription order #{} created (ref {:?})", order.id, order.order_reference);
        Ok(order)
    }

    async fn attach_reference(&self, mut order: Order) -> Result<Order, OrderFlowError> {
        let reference = OrderId(new_order_reference(order.kind, order.id));
        self.db.assign_order_reference(order.id, &reference).await.map_err(OrderFlowError::db)?;
        order.order_reference = Some(reference);
        Ok(order)
    }

    /// The most recent pending order of this kind for this email inside the window, if any. Checkout
    /// uses this to return the existing payment parameters instead of stacking up duplicate pending
    /// orders when someone double-submits the form.
    pub async fn duplicate_pending_order(
        &self,
        email: &str,
        kind: OrderKind,
        window: Duration,
    ) -> Result<Option<Order>, OrderFlowError> {
        self.db.recent_pending_order_for_email(email, kind, window).await.map_err(OrderFlowError::db)
    }

    /// Locates the order a gateway callback refers to.
    ///
    /// An exact reference match wins for any order kind. Recurring subscription charges arrive under
    /// references the gateway invented, so an ordered fallback chain runs over pending, unprocessed
    /// subscription orders:
    /// 1. email AND phone match (phones compared on trailing digits);
    /// 2. email OR phone match, order created within `match_window`;
    /// 3. a single pending candidate within the window.
    /// Step 3 is known to be unsound when two unrelated checkouts race inside the window; it is kept
    /// because the alternative is dropping real payments, and it is always logged as low confidence.
    /// Fallback matches rebind the order's reference to the callback's so retries hit the exact path.
    pub async fn locate_order_for_callback(
        &self,
        reference: &OrderId,
        contact: &ContactInfo,
        match_window: Duration,
    ) -> Result<Option<Order>, OrderFlowError> {
        if let Some(order) = self.db.fetch_order_by_reference(reference).await.map_err(OrderFlowError::db)? {
            return Ok(Some(order));
        }
        if contact.is_empty() {
            debug!("🔄️🧩️ No order for reference {reference} and the callback carries no contact data");
            return Ok(None);
        }
        let candidates = self.db.fetch_unmatched_subscription_orders().await.map_err(OrderFlowError::db)?;
        let email = contact.email.as_deref().unwrap_or_default();
        let phone = contact.phone.as_deref().unwrap_or_default();
        let matched = candidates
            .iter()
            .find(|o| {
                !email.is_empty() && o.email == email && !phone.is_empty() && phones_match(&o.phone, phone)
            })
            .map(|o| ("email and phone", o.clone()));
        let matched = matched.or_else(|| {
            let cutoff = Utc::now() - match_window;
            candidates
                .iter()
                .filter(|o| o.created_at >= cutoff)
                .find(|o| {
                    (!email.is_empty() && o.email == email)
                        || (!phone.is_empty() && phones_match(&o.phone, phone))
                })
                .map(|o| ("email or phone in window", o.clone()))
        });
        let matched = matched.or_else(|| {
            let cutoff = Utc::now() - match_window;
            let mut recent = candidates.iter().filter(|o| o.created_at >= cutoff);
            match (recent.next(), recent.next()) {
                (Some(o), None) => {
                    warn!(
                        "🔄️🧩️ Low-confidence match: callback {reference} bound to order #{} only because \
                         it is the sole pending subscription order in the window",
                        o.id
                    );
                    Some(("single candidate", o.clone()))
                },
                _ => None,
            }
        });
        match matched {
            Some((rule, order)) => {
                info!("🔄️🧩️ Callback {reference} matched to order #{} via {rule}", order.id);
                self.db.assign_order_reference(order.id, reference).await.map_err(OrderFlowError::db)?;
                let mut order = order;
                order.order_reference = Some(reference.clone());
                Ok(Some(order))
            },
            None => {
                debug!("🔄️🧩️ No order matched callback {reference}");
                Ok(None)
            },
        }
    }

    /// Settles a verified callback against an order. Exactly one of any number of duplicate or racing
    /// callbacks observes [`CallbackSettlement::Settled`]; that one fires the order-paid hook when the
    /// verdict is `Success`. All others observe `AlreadyProcessed` and change nothing.
    pub async fn settle_payment(
        &self,
        order: &Order,
        update: CallbackUpdate,
    ) -> Result<CallbackSettlement, OrderFlowError> {
        let verdict = update.new_status;
        let settlement = self.db.settle_callback(order.id, update).await.map_err(OrderFlowError::db)?;
        if let CallbackSettlement::Settled(order) = &settlement {
            if verdict == PaymentStatus::Success {
                self.call_order_paid_hook(order).await;
            }
            info!("🔄️💳️ Order #{} settled as {}", order.id, order.payment_status);
        }
        Ok(settlement)
    }

    async fn call_order_paid_hook(&self, order: &Order) {
        for emitter in &self.producers.order_paid_producer {
            debug!("🔄️💳️ Notifying order paid hook subscribers for order #{}", order.id);
            emitter.publish_event(OrderPaidEvent::new(order.clone())).await;
        }
    }

    pub async fn mark_email_sent(&self, order_id: i64) -> Result<(), OrderFlowError> {
        self.db.set_email_status(order_id, EmailStatus::Sent).await.map_err(OrderFlowError::db)
    }

    pub async fn mark_email_failed(&self, order_id: i64) -> Result<(), OrderFlowError> {
        self.db.set_email_status(order_id, EmailStatus::Failed).await.map_err(OrderFlowError::db)
    }

    pub async fn record_crm_refs(
        &self,
        order_id: i64,
        lead_id: Option<i64>,
        payment_id: Option<i64>,
        contact_id: Option<i64>,
    ) -> Result<(), OrderFlowError> {
        self.db.set_crm_refs(order_id, lead_id, payment_id, contact_id).await.map_err(OrderFlowError::db)
    }

    /// Expires stale pending ticket orders. The reservation path performs the same sweep under its
    /// lock; this entry point exists for the background worker so reports stay tidy between sales.
    pub async fn expire_stale_orders(&self, reservation_ttl: Duration) -> Result<u64, OrderFlowError> {
        self.db.expire_stale_orders(reservation_ttl).await.map_err(OrderFlowError::db)
    }

    pub async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderFlowError> {
        self.db.fetch_order_by_id(order_id).await.map_err(OrderFlowError::db)
    }

    /// Read-only status report for a ticket. No scan log entry is made.
    pub async fn validate_ticket(&self, order_id: i64) -> Result<Option<TicketCheck>, OrderFlowError> {
        let order = self.db.fetch_order_by_id(order_id).await.map_err(OrderFlowError::db)?;
        Ok(order.map(|o| ticket_check(&o)))
    }

    /// Commits a door scan. Every attempt against a known order is appended to the scan log; an
    /// admissible ticket is marked used atomically, so two staff scanning the same ticket produce one
    /// `Admitted` and one `AlreadyUsed`.
    pub async fn scan_ticket(
        &self,
        order_id: i64,
        scanned_by: &str,
        ip_address: Option<String>,
    ) -> Result<ScanOutcome, OrderFlowError> {
        let Some(order) = self.db.fetch_order_by_id(order_id).await.map_err(OrderFlowError::db)? else {
            info!("🎟️ Scan of unknown order #{order_id} rejected");
            return Ok(ScanOutcome::NotFound);
        };
        let previous_status = order.ticket_status;
        let check = ticket_check(&order);
        let was_valid = check == TicketCheck::Valid;
        let admitted = if was_valid {
            self.db.mark_ticket_used(order_id).await.map_err(OrderFlowError::db)?
        } else {
            false
        };
        let scan = NewScanRecord {
            order_id,
            scanned_by: scanned_by.to_string(),
            ip_address,
            was_valid: admitted,
            previous_status,
        };
        self.db.append_scan(scan).await.map_err(OrderFlowError::db)?;
        // re-read so callers see the post-scan state
        let order = self
            .db
            .fetch_order_by_id(order_id)
            .await
            .map_err(OrderFlowError::db)?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.to_string()))?;
        let outcome = if admitted {
            info!("🎟️ Ticket {:?} (order #{order_id}) admitted by {scanned_by}", order.ticket_number);
            ScanOutcome::Admitted { ticket_number: order.ticket_number, order }
        } else {
            match check {
                // Lost the race to another scanner, or was already used to begin with.
                TicketCheck::Valid | TicketCheck::Used => {
                    info!("🎟️ Order #{order_id} was already scanned (at {:?})", order.used_at);
                    ScanOutcome::AlreadyUsed { used_at: order.used_at, order }
                },
                TicketCheck::Invalid => {
                    info!("🎟️ Scan of order #{order_id} rejected: not admissible");
                    ScanOutcome::Invalid { order }
                },
            }
        };
        Ok(outcome)
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

fn ticket_check(order: &Order) -> TicketCheck {
    if order.payment_status != PaymentStatus::Success {
        return TicketCheck::Invalid;
    }
    match order.ticket_status {
        TicketStatus::Active => TicketCheck::Valid,
        TicketStatus::Used => TicketCheck::Used,
        TicketStatus::Invalid => TicketCheck::Invalid,
    }
}
