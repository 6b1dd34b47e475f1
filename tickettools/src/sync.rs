use anyhow::{anyhow, Context, Result};
use log::*;
use ticket_payment_engine::{
    db_types::SubscriptionStatus, SqliteDatabase, SubscriptionUpsert, TicketingDatabase,
};
use tps_common::Money;
use wayforpay_tools::{RegularStatus, WayForPayApi, WayForPayConfig};

use crate::dates::parse_gateway_date;

pub const DEFAULT_SYNC_LIMIT: i64 = 50;

/// Refreshes the local subscription mirror from the gateway's STATUS API, one order reference at a
/// time. Failures on individual references are logged and skipped so one broken record never stalls
/// the rest of the sync.
pub async fn sync_subscriptions(limit: Option<i64>) -> Result<()> {
    let db = SqliteDatabase::new(5).await.context("Could not open the ticket database")?;
    let api = WayForPayApi::new(WayForPayConfig::new_from_env_or_default())
        .map_err(|e| anyhow!("Could not create the gateway client. {e}"))?;
    let references =
        db.subscription_order_references(limit).await.context("Could not list subscription orders")?;
    info!("🔁️ Syncing {} subscription reference(s)", references.len());
    let mut synced = 0usize;
    let mut skipped = 0usize;
    for reference in &references {
        let status = match api.status(reference.as_str()).await {
            Ok(status) => status,
            Err(e) => {
                warn!("🔁️ STATUS failed for {reference}. {e}");
                skipped += 1;
                continue;
            },
        };
        if !status.has_meaningful_status() {
            warn!(
                "🔁️ No usable status for {reference} (reason {}: {})",
                status.reason_code.as_str(),
                status.reason.as_str()
            );
            skipped += 1;
            continue;
        }
        let upsert = match build_upsert(&db, reference, &status).await {
            Ok(upsert) => upsert,
            Err(e) => {
                warn!("🔁️ Could not interpret the STATUS response for {reference}. {e}");
                skipped += 1;
                continue;
            },
        };
        match db.upsert_subscription(upsert).await {
            Ok(()) => synced += 1,
            Err(e) => {
                warn!("🔁️ Could not store the subscription state for {reference}. {e}");
                skipped += 1;
            },
        }
    }
    println!("Synced {synced} subscription(s), skipped {skipped}.");
    Ok(())
}

async fn build_upsert(
    db: &SqliteDatabase,
    reference: &ticket_payment_engine::db_types::OrderId,
    status: &RegularStatus,
) -> Result<SubscriptionUpsert> {
    // Prefer the STATUS mode field when present: the gateway reports the live plan state there and
    // leaves `status` on the original checkout value for some plans.
    let raw_status = status.mode.get().or_else(|| status.status.get()).unwrap_or_default();
    let mapped = SubscriptionStatus::from_gateway(raw_status);
    if mapped == SubscriptionStatus::Unknown && !raw_status.is_empty() {
        warn!("🔁️ Unknown gateway subscription status \"{raw_status}\" for {reference}");
    }
    let order = db
        .fetch_order_by_reference(reference)
        .await
        .map_err(|e| anyhow!("Could not look up the source order. {e}"))?;
    let amount = status
        .regular_amount
        .get()
        .or_else(|| status.amount.get())
        .and_then(|s| s.parse::<Money>().ok());
    // An ended plan will never charge again, so a stored next-payment date is stale by definition.
    let next_payment_date =
        if mapped.is_ended() { None } else { parse_gateway_date(&status.next_payment_date) };
    Ok(SubscriptionUpsert {
        order_reference: reference.clone(),
        source_order_id: order.as_ref().map(|o| o.id),
        email: order.as_ref().map(|o| o.email.clone()).filter(|e| !e.is_empty()),
        phone: order.as_ref().map(|o| o.phone.clone()).filter(|p| !p.is_empty()),
        status: mapped,
        mode: status.mode.get().map(String::from),
        amount,
        currency: status.currency.get().map(String::from),
        date_begin: parse_gateway_date(&status.date_begin),
        date_end: parse_gateway_date(&status.date_end),
        next_payment_date,
        last_payed_date: parse_gateway_date(&status.last_payed_date),
        last_payed_status: status.last_payed_status.get().map(String::from),
        last_reason_code: status.reason_code.get().map(String::from),
        last_reason: status.reason.get().map(String::from),
        last_raw: serde_json::to_string(&status.raw).ok(),
    })
}
