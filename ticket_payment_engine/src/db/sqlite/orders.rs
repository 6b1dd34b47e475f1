use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{EmailStatus, NewOrder, Order, OrderId, OrderKind, PaymentStatus},
    traits::{CallbackSettlement, CallbackUpdate},
};

const ORDER_COLUMNS: &str = r#"
    id, kind, event_id, name, email, phone, amount, currency, device_type,
    payment_status, email_status, ticket_status, ticket_number, order_reference,
    callback_processed, auth_code, card_pan, payment_system,
    crm_lead_id, crm_payment_id, crm_contact_id,
    scan_count, used_at, paid_at, created_at, updated_at
"#;

// Sub-second precision matters here: `created_at` defaults to CURRENT_TIMESTAMP (whole seconds), and
// the fractional part keeps a same-second cutoff strictly greater in SQLite's string comparison.
fn sql_timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Inserts a ticket order for an event. Callers are responsible for running this inside the
/// reservation transaction; the ticket number is whatever the caller counted under the write lock.
pub async fn insert_ticket_order(
    event_id: i64,
    order: &NewOrder,
    ticket_number: i64,
    conn: &mut SqliteConnection,
) -> Result<Order, SqliteDatabaseError> {
    let sql = format!(
        "INSERT INTO orders (kind, event_id, name, email, phone, amount, currency, device_type, ticket_number) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {ORDER_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, Order>(&sql)
        .bind(order.kind)
        .bind(event_id)
        .bind(&order.name)
        .bind(&order.email)
        .bind(&order.phone)
        .bind(order.amount)
        .bind(&order.currency)
        .bind(order.device_type)
        .bind(ticket_number)
        .fetch_one(conn)
        .await?;
    debug!("🗃️ Order #{} saved (ticket {ticket_number} for event {event_id})", inserted.id);
    Ok(inserted)
}

pub async fn insert_subscription_order(
    order: &NewOrder,
    conn: &mut SqliteConnection,
) -> Result<Order, SqliteDatabaseError> {
    let sql = format!(
        "INSERT INTO orders (kind, name, email, phone, amount, currency, device_type) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {ORDER_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, Order>(&sql)
        .bind(order.kind)
        .bind(&order.name)
        .bind(&order.email)
        .bind(&order.phone)
        .bind(order.amount)
        .bind(&order.currency)
        .bind(order.device_type)
        .fetch_one(conn)
        .await?;
    debug!("🗃️ Subscription order #{} saved", inserted.id);
    Ok(inserted)
}

pub async fn fetch_order_by_id(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_reference(
    reference: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_reference = $1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(reference).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn assign_order_reference(
    id: i64,
    reference: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let res = sqlx::query("UPDATE orders SET order_reference = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(reference)
        .bind(id)
        .execute(conn)
        .await?;
    if res.rows_affected() == 0 {
        return Err(SqliteDatabaseError::OrderNotFound(id));
    }
    Ok(())
}

pub async fn recent_pending_order_for_email(
    email: &str,
    kind: OrderKind,
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE email = $1 AND kind = $2 AND payment_status = 'Pending' AND created_at >= $3 \
         ORDER BY id DESC LIMIT 1"
    );
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(email)
        .bind(kind)
        .bind(sql_timestamp(cutoff))
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_unmatched_subscription_orders(
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE kind = 'Subscription' AND payment_status = 'Pending' AND callback_processed = 0 \
         ORDER BY id DESC"
    );
    let orders = sqlx::query_as::<_, Order>(&sql).fetch_all(conn).await?;
    Ok(orders)
}

/// The settlement write. The caller holds a transaction; the pre-read and the conditional update
/// together form the compare-and-set on `callback_processed`.
pub async fn settle_callback(
    id: i64,
    update: CallbackUpdate,
    conn: &mut SqliteConnection,
) -> Result<CallbackSettlement, SqliteDatabaseError> {
    let order = fetch_order_by_id(id, conn).await?.ok_or(SqliteDatabaseError::OrderNotFound(id))?;
    if order.callback_processed {
        debug!("🗃️ Order #{id} was already settled as {}. No action to take", order.payment_status);
        return Ok(CallbackSettlement::AlreadyProcessed(order));
    }
    let paid = update.new_status == PaymentStatus::Success;
    // COALESCE keeps values the order already has; callback contact data only fills gaps.
    let sql = format!(
        "UPDATE orders SET \
            payment_status = $1, \
            callback_processed = 1, \
            ticket_status = CASE WHEN $1 = 'Success' THEN ticket_status ELSE 'Invalid' END, \
            auth_code = COALESCE(auth_code, $2), \
            card_pan = COALESCE(card_pan, $3), \
            payment_system = COALESCE(payment_system, $4), \
            name = CASE WHEN name = '' THEN COALESCE($5, name) ELSE name END, \
            email = CASE WHEN email = '' THEN COALESCE($6, email) ELSE email END, \
            phone = CASE WHEN phone = '' THEN COALESCE($7, phone) ELSE phone END, \
            paid_at = CASE WHEN $8 THEN CURRENT_TIMESTAMP ELSE paid_at END, \
            updated_at = CURRENT_TIMESTAMP \
         WHERE id = $9 AND callback_processed = 0 \
         RETURNING {ORDER_COLUMNS}"
    );
    let settled = sqlx::query_as::<_, Order>(&sql)
        .bind(update.new_status)
        .bind(&update.auth_code)
        .bind(&update.card_pan)
        .bind(&update.payment_system)
        .bind(&update.contact.name)
        .bind(&update.contact.email)
        .bind(&update.contact.phone)
        .bind(paid)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    match settled {
        Some(order) => {
            info!("🗃️ Order #{id} settled as {}", order.payment_status);
            Ok(CallbackSettlement::Settled(order))
        },
        // The guard row vanished between the read and the write. Re-read and report the winner's state.
        None => {
            let order = fetch_order_by_id(id, conn).await?.ok_or(SqliteDatabaseError::OrderNotFound(id))?;
            Ok(CallbackSettlement::AlreadyProcessed(order))
        },
    }
}

pub async fn set_email_status(
    id: i64,
    status: EmailStatus,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query("UPDATE orders SET email_status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(status)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_crm_refs(
    id: i64,
    lead_id: Option<i64>,
    payment_id: Option<i64>,
    contact_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        "UPDATE orders SET \
            crm_lead_id = COALESCE($1, crm_lead_id), \
            crm_payment_id = COALESCE($2, crm_payment_id), \
            crm_contact_id = COALESCE($3, crm_contact_id), \
            updated_at = CURRENT_TIMESTAMP \
         WHERE id = $4",
    )
    .bind(lead_id)
    .bind(payment_id)
    .bind(contact_id)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Expires pending ticket orders created before `cutoff`, releasing their inventory slots.
pub async fn expire_stale(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let res = sqlx::query(
        "UPDATE orders SET payment_status = 'Expired', ticket_status = 'Invalid', \
            updated_at = CURRENT_TIMESTAMP \
         WHERE kind = 'Ticket' AND payment_status = 'Pending' AND created_at < $1",
    )
    .bind(sql_timestamp(cutoff))
    .execute(conn)
    .await?;
    Ok(res.rows_affected())
}

/// Counts orders holding an inventory slot for an event: successes plus unexpired pendings.
/// Expected to run after [`expire_stale`] in the same transaction.
pub async fn count_live_orders(event_id: i64, conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders \
         WHERE kind = 'Ticket' AND event_id = $1 AND payment_status IN ('Success', 'Pending')",
    )
    .bind(event_id)
    .fetch_one(conn)
    .await?;
    Ok(count.0)
}

pub async fn mark_ticket_used(id: i64, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let res = sqlx::query(
        "UPDATE orders SET ticket_status = 'Used', used_at = CURRENT_TIMESTAMP, \
            scan_count = scan_count + 1, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $1 AND ticket_status = 'Active' AND payment_status = 'Success'",
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn subscription_order_references(
    limit: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderId>, SqliteDatabaseError> {
    let mut sql = "SELECT DISTINCT order_reference FROM orders \
         WHERE kind = 'Subscription' AND order_reference IS NOT NULL ORDER BY id DESC"
        .to_string();
    if limit.is_some() {
        sql.push_str(" LIMIT $1");
    }
    let mut query = sqlx::query_as::<_, (OrderId,)>(&sql);
    if let Some(n) = limit {
        query = query.bind(n);
    }
    let refs = query.fetch_all(conn).await?.into_iter().map(|r| r.0).collect();
    Ok(refs)
}

pub async fn orders_missing_contacts(conn: &mut SqliteConnection) -> Result<Vec<Order>, SqliteDatabaseError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE name = '' OR email = '' OR phone = '' ORDER BY id"
    );
    let orders = sqlx::query_as::<_, Order>(&sql).fetch_all(conn).await?;
    Ok(orders)
}

pub async fn backfill_contact(
    id: i64,
    name: Option<&str>,
    email: Option<&str>,
    phone: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        "UPDATE orders SET \
            name = CASE WHEN name = '' THEN COALESCE($1, name) ELSE name END, \
            email = CASE WHEN email = '' THEN COALESCE($2, email) ELSE email END, \
            phone = CASE WHEN phone = '' THEN COALESCE($3, phone) ELSE phone END, \
            updated_at = CURRENT_TIMESTAMP \
         WHERE id = $4",
    )
    .bind(name)
    .bind(email)
    .bind(phone)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}
