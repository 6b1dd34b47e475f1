use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use prettytable::{row, Table};
use ticket_payment_engine::{SqliteDatabase, TicketingDatabase};

/// Lists subscribers whose plan has ended, or whose next payment is overdue, by more than the grace
/// period. This is the input to the manual access-removal pass; nothing is removed automatically.
pub async fn removal_report(grace_days: i64) -> Result<()> {
    let db = SqliteDatabase::new(5).await.context("Could not open the ticket database")?;
    let subscriptions = db.fetch_subscriptions().await.context("Could not list subscriptions")?;
    let cutoff = Utc::now() - Duration::days(grace_days);

    let mut table = Table::new();
    table.add_row(row!["Reference", "Email", "Phone", "Status", "Lapsed since", "Days"]);
    let mut count = 0usize;
    for sub in &subscriptions {
        let lapsed_since = if sub.status.is_ended() {
            sub.date_end.or(sub.last_payed_date).unwrap_or(sub.last_sync_at)
        } else {
            // an active plan with an overdue next payment has stopped charging too
            match sub.next_payment_date {
                Some(next) if next < cutoff => next,
                _ => continue,
            }
        };
        if lapsed_since >= cutoff {
            continue;
        }
        let days = (Utc::now() - lapsed_since).num_days();
        table.add_row(row![
            sub.order_reference,
            sub.email.as_deref().unwrap_or("-"),
            sub.phone.as_deref().unwrap_or("-"),
            sub.status,
            lapsed_since.format("%Y-%m-%d"),
            days
        ]);
        count += 1;
    }
    table.printstd();
    println!("{count} subscriber(s) past the {grace_days}-day grace period.");
    Ok(())
}
