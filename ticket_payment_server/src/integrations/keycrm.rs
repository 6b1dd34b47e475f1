use keycrm_tools::{
    CreatedLead, CrmApi, CrmContact, CrmProduct, KeyCrmConfig, NewCrmPayment, NewPipelineCard,
    PAYMENT_STATUS_NOT_PAID, PAYMENT_STATUS_PAID,
};
use log::*;
use ticket_payment_engine::db_types::{Order, OrderKind};
use wayforpay_tools::CallbackPayload;

use crate::config::ReconcilerConfig;

// Pages of the transaction feed scanned per matching pass. Settled transactions land near the head of
// the feed, so anything deeper than this is stale.
const MAX_FEED_PAGES: u32 = 5;

/// What the reconciler did with a settled payment. Mostly useful to tests and the webhook log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The CRM integration is switched off.
    Disabled,
    /// No CRM payment record was captured at checkout and none could be recovered from the lead, so
    /// there is nothing to reconcile against.
    NoPaymentRecord,
    /// A feed transaction matched on amount and an identifying token.
    Attached { transaction_id: i64, confidence: Confidence },
    /// No feed transaction could be matched; the payment was marked paid manually with a synthesized
    /// description so the books still balance.
    MarkedPaid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Low,
}

/// Mirrors every settled payment into the CRM.
///
/// Card creation happens at checkout time (so the funnel shows abandoned carts); reconciliation runs
/// after the webhook settles, inside the request, with a bounded retry schedule because the CRM ingests
/// the gateway's transaction feed on its own clock. Every CRM failure here is logged and swallowed: the
/// payment is already settled and the gateway must get its acknowledgment regardless.
pub struct CrmReconciler<C> {
    api: Option<C>,
    crm: KeyCrmConfig,
    policy: ReconcilerConfig,
}

impl<C> CrmReconciler<C> {
    pub fn new(api: Option<C>, crm: KeyCrmConfig, policy: ReconcilerConfig) -> Self {
        Self { api, crm, policy }
    }

    pub fn is_enabled(&self) -> bool {
        self.api.is_some()
    }
}

impl<C: CrmApi> CrmReconciler<C> {
    /// Creates the pipeline card for a fresh checkout. Failures are logged and reported as `None`; a
    /// checkout never fails because the CRM is down.
    pub async fn create_lead_for_checkout(&self, order: &Order) -> Option<CreatedLead> {
        let api = self.api.as_ref()?;
        let card = self.card_for(order);
        match api.create_pipeline_card(&card).await {
            Ok(lead) => Some(lead),
            Err(e) => {
                warn!("📇️ Could not create a CRM card for order #{}. {e}", order.id);
                None
            },
        }
    }

    fn card_for(&self, order: &Order) -> NewPipelineCard {
        let (title, sku) = match order.kind {
            OrderKind::Ticket => (format!("Ticket order #{}", order.id), "ticket"),
            OrderKind::Subscription => (format!("Subscription order #{}", order.id), "subscription"),
        };
        let reference = order.order_reference.as_ref().map(|r| r.to_string()).unwrap_or_default();
        let amount = order.amount.cents() as f64 / 100.0;
        NewPipelineCard {
            title,
            pipeline_id: self.crm.pipeline_id,
            source_id: self.crm.source_id,
            manager_comment: format!("WayForPay reference: {reference}"),
            contact: CrmContact {
                full_name: order.name.clone(),
                email: order.email.clone(),
                phone: order.phone.clone(),
            },
            products: vec![CrmProduct { sku: sku.to_string(), price: amount, quantity: 1, name: sku.to_string() }],
            payments: vec![NewCrmPayment {
                payment_method: "WayForPay".to_string(),
                amount,
                status: PAYMENT_STATUS_NOT_PAID.to_string(),
                description: Some(reference),
            }],
            custom_fields: vec![],
        }
    }

    /// Reconciles a settled payment against the CRM's external transaction feed.
    ///
    /// Every candidate must carry the callback amount within one kopeck. The first pass additionally
    /// requires the gateway auth code or order reference in the transaction text, retried on the
    /// configured backoff because the feed lags the webhook. When the schedule is exhausted a single
    /// low-confidence pass accepts the order-id token instead, and failing that the payment is marked
    /// paid manually.
    pub async fn reconcile(&self, order: &Order, callback: &CallbackPayload) -> ReconcileOutcome {
        let Some(api) = self.api.as_ref() else {
            return ReconcileOutcome::Disabled;
        };
        let payment_id = match order.crm_payment_id {
            Some(id) => id,
            None => match self.payment_from_lead(api, order).await {
                Some(id) => id,
                None => {
                    warn!("📇️ Order #{} has no CRM payment record; skipping reconciliation", order.id);
                    return ReconcileOutcome::NoPaymentRecord;
                },
            },
        };
        let amount = callback.parsed_amount().unwrap_or(order.amount);
        let mut tokens = Vec::new();
        if let Some(code) = callback.auth_code.get() {
            tokens.push(code.to_string());
        }
        tokens.push(callback.order_reference.clone());
        for attempt in 0..self.policy.attempts {
            if attempt > 0 {
                tokio::time::sleep(self.policy.backoff_for(attempt as usize - 1)).await;
            }
            match self.find_transaction(api, amount, &tokens).await {
                Some(txn_id) => {
                    if let Err(e) = api.attach_external_transaction(payment_id, txn_id).await {
                        warn!("📇️ Could not attach transaction {txn_id} to payment {payment_id}. {e}");
                        break;
                    }
                    return ReconcileOutcome::Attached { transaction_id: txn_id, confidence: Confidence::High };
                },
                None => debug!(
                    "📇️ No transaction for order #{} yet (attempt {}/{})",
                    order.id,
                    attempt + 1,
                    self.policy.attempts
                ),
            }
        }
        // Low-confidence pass: same amount, but only the order-id token ties the transaction to this
        // order. The token match stops at digit boundaries so "#42" never claims "#421".
        let id_token = format!("#{}", order.id);
        if let Some(txn_id) = self.find_by_token(api, amount, &id_token).await {
            warn!("📇️ Low-confidence reconciliation of order #{} via token {id_token}", order.id);
            match api.attach_external_transaction(payment_id, txn_id).await {
                Ok(()) => {
                    return ReconcileOutcome::Attached { transaction_id: txn_id, confidence: Confidence::Low }
                },
                Err(e) => warn!("📇️ Could not attach transaction {txn_id} to payment {payment_id}. {e}"),
            }
        }
        let description = format!(
            "WayForPay {} {} (no CRM transaction matched)",
            callback.order_reference,
            amount.to_decimal_string()
        );
        if let Err(e) = api.update_payment_status(payment_id, PAYMENT_STATUS_PAID, Some(&description)).await {
            warn!("📇️ Could not mark CRM payment {payment_id} as paid. {e}");
        }
        ReconcileOutcome::MarkedPaid
    }

    async fn find_transaction(&self, api: &C, amount: tps_common::Money, tokens: &[String]) -> Option<i64> {
        let mut offset = 0;
        for _ in 0..MAX_FEED_PAGES {
            let page = match api.list_external_transactions(self.policy.page_size, offset).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("📇️ Could not list CRM transactions at offset {offset}. {e}");
                    return None;
                },
            };
            if page.is_empty() {
                return None;
            }
            let hit = page.iter().find(|t| {
                (t.amount_as_money().cents() - amount.cents()).abs() <= 1
                    && tokens.iter().any(|token| t.haystack().contains(token.as_str()))
            });
            if let Some(t) = hit {
                return Some(t.id);
            }
            offset += self.policy.page_size;
        }
        None
    }

    async fn find_by_token(&self, api: &C, amount: tps_common::Money, token: &str) -> Option<i64> {
        let mut offset = 0;
        for _ in 0..MAX_FEED_PAGES {
            let page = match api.list_external_transactions(self.policy.page_size, offset).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("📇️ Could not list CRM transactions at offset {offset}. {e}");
                    return None;
                },
            };
            if page.is_empty() {
                return None;
            }
            let hit = page.iter().find(|t| {
                (t.amount_as_money().cents() - amount.cents()).abs() <= 1
                    && contains_bounded_token(&t.haystack(), token)
            });
            if let Some(t) = hit {
                return Some(t.id);
            }
            offset += self.policy.page_size;
        }
        None
    }

    /// Checkout sometimes records the lead but not its payment (the card response omits the payment id
    /// on some API revisions). The lead's payment list recovers it.
    async fn payment_from_lead(&self, api: &C, order: &Order) -> Option<i64> {
        let lead_id = order.crm_lead_id?;
        match api.get_payments(lead_id).await {
            Ok(payments) => {
                let payment = payments
                    .iter()
                    .find(|p| p.status != PAYMENT_STATUS_PAID)
                    .or_else(|| payments.first());
                match payment {
                    Some(p) => {
                        info!("📇️ Recovered payment {} for order #{} from lead {lead_id}", p.id, order.id);
                        Some(p.id)
                    },
                    None => {
                        warn!("📇️ Lead {lead_id} carries no payment records for order #{}", order.id);
                        None
                    },
                }
            },
            Err(e) => {
                warn!("📇️ Could not list payments on lead {lead_id}. {e}");
                None
            },
        }
    }
}

/// True if `token` occurs in `haystack` and is not immediately followed by another digit, so an
/// order-id token never matches a longer id that merely starts with it.
fn contains_bounded_token(haystack: &str, token: &str) -> bool {
    haystack
        .match_indices(token)
        .any(|(i, m)| haystack[i + m.len()..].chars().next().map_or(true, |c| !c.is_ascii_digit()))
}
