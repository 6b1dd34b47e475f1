//! Background sweep for stale pending ticket orders.
//!
//! The reservation path performs the same sweep under its own lock, so this worker is not needed for
//! correctness of the inventory cap. It exists so abandoned checkouts show up as expired between
//! sales, keeping reports and the CRM funnel honest.
use chrono::Duration;
use log::*;
use ticket_payment_engine::{OrderFlowApi, TicketingDatabase};

const SWEEP_INTERVAL_SECONDS: u64 = 60;

pub async fn expiry_worker<B: TicketingDatabase>(api: OrderFlowApi<B>, reservation_ttl: Duration) {
    info!("🕰️ Expiry worker started. Sweeping every {SWEEP_INTERVAL_SECONDS}s, TTL {reservation_ttl}");
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECONDS));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match api.expire_stale_orders(reservation_ttl).await {
            Ok(0) => trace!("🕰️ No stale orders to expire"),
            Ok(n) => info!("🕰️ Expired {n} stale pending order(s)"),
            Err(e) => error!("🕰️ Could not expire stale orders. {e}"),
        }
    }
}
