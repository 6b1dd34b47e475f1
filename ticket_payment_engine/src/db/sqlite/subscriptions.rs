use log::debug;
use sqlx::SqliteConnection;

use crate::{db::sqlite::SqliteDatabaseError, db_types::Subscription, traits::SubscriptionUpsert};

const SUBSCRIPTION_COLUMNS: &str = r#"
    id, order_reference, source_order_id, email, phone, status, mode, amount, currency,
    date_begin, date_end, next_payment_date, last_payed_date, last_payed_status,
    last_reason_code, last_reason, last_raw, last_sync_at
"#;

/// Inserts or refreshes the mirror row for one order reference. Sync runs repeatedly, so this is an
/// upsert on the unique reference.
pub async fn upsert(sub: &SubscriptionUpsert, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        "INSERT INTO subscriptions ( \
            order_reference, source_order_id, email, phone, status, mode, amount, currency, \
            date_begin, date_end, next_payment_date, last_payed_date, last_payed_status, \
            last_reason_code, last_reason, last_raw, last_sync_at \
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, CURRENT_TIMESTAMP) \
         ON CONFLICT (order_reference) DO UPDATE SET \
            source_order_id = COALESCE(excluded.source_order_id, subscriptions.source_order_id), \
            email = COALESCE(excluded.email, subscriptions.email), \
            phone = COALESCE(excluded.phone, subscriptions.phone), \
            status = excluded.status, \
            mode = COALESCE(excluded.mode, subscriptions.mode), \
            amount = COALESCE(excluded.amount, subscriptions.amount), \
            currency = COALESCE(excluded.currency, subscriptions.currency), \
            date_begin = COALESCE(excluded.date_begin, subscriptions.date_begin), \
            date_end = COALESCE(excluded.date_end, subscriptions.date_end), \
            next_payment_date = excluded.next_payment_date, \
            last_payed_date = COALESCE(excluded.last_payed_date, subscriptions.last_payed_date), \
            last_payed_status = COALESCE(excluded.last_payed_status, subscriptions.last_payed_status), \
            last_reason_code = excluded.last_reason_code, \
            last_reason = excluded.last_reason, \
            last_raw = COALESCE(excluded.last_raw, subscriptions.last_raw), \
            last_sync_at = CURRENT_TIMESTAMP",
    )
    .bind(&sub.order_reference)
    .bind(sub.source_order_id)
    .bind(&sub.email)
    .bind(&sub.phone)
    .bind(sub.status)
    .bind(&sub.mode)
    .bind(sub.amount)
    .bind(&sub.currency)
    .bind(sub.date_begin)
    .bind(sub.date_end)
    .bind(sub.next_payment_date)
    .bind(sub.last_payed_date)
    .bind(&sub.last_payed_status)
    .bind(&sub.last_reason_code)
    .bind(&sub.last_reason)
    .bind(&sub.last_raw)
    .execute(conn)
    .await?;
    debug!("🗃️ Subscription mirror for {} refreshed ({})", sub.order_reference, sub.status);
    Ok(())
}

pub async fn fetch_all(conn: &mut SqliteConnection) -> Result<Vec<Subscription>, SqliteDatabaseError> {
    let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY id");
    let subs = sqlx::query_as::<_, Subscription>(&sql).fetch_all(conn).await?;
    Ok(subs)
}
