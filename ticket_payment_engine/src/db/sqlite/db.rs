use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use sqlx::SqlitePool;

use super::{db_url, new_pool, orders, scans, subscriptions, ticket_events, SqliteDatabaseError};
use crate::{
    db_types::{EmailStatus, NewOrder, Order, OrderId, OrderKind, Subscription, TicketEvent},
    traits::{
        CallbackSettlement,
        CallbackUpdate,
        NewScanRecord,
        Reservation,
        SubscriptionUpsert,
        TicketingDatabase,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies any pending schema migrations.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SqliteDatabaseError::QueryError(e.to_string()))?;
        Ok(())
    }
}

impl TicketingDatabase for SqliteDatabase {
    type Error = SqliteDatabaseError;

    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_active_event(&self) -> Result<Option<TicketEvent>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        ticket_events::fetch_active_event(&mut conn).await
    }

    /// The inventory gate. `BEGIN IMMEDIATE` takes SQLite's write lock up front, so concurrent
    /// reservations queue on the busy timeout and each one sees a consistent count: expire the stale
    /// pendings, count the live orders, and either insert at `live + 1` or report sold out.
    async fn reserve_ticket(
        &self,
        event: &TicketEvent,
        order: NewOrder,
        reservation_ttl: Duration,
    ) -> Result<Reservation, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        let result = async {
            let cutoff = Utc::now() - reservation_ttl;
            let reclaimed = orders::expire_stale(cutoff, &mut conn).await?;
            if reclaimed > 0 {
                info!("🗃️ Reservation sweep expired {reclaimed} stale pending orders");
            }
            let live = orders::count_live_orders(event.id, &mut conn).await?;
            if live >= event.max_tickets {
                debug!("🗃️ Event {} is sold out ({live}/{} live orders)", event.id, event.max_tickets);
                return Ok(Reservation::SoldOut);
            }
            let inserted = orders::insert_ticket_order(event.id, &order, live + 1, &mut conn).await?;
            Ok(Reservation::Admitted(inserted))
        }
        .await;
        match &result {
            Ok(_) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
            },
            Err(_) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            },
        }
        result
    }

    async fn insert_subscription_order(&self, order: NewOrder) -> Result<Order, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_subscription_order(&order, &mut conn).await
    }

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_id(id, &mut conn).await
    }

    async fn fetch_order_by_reference(&self, reference: &OrderId) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_reference(reference, &mut conn).await
    }

    async fn assign_order_reference(&self, id: i64, reference: &OrderId) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::assign_order_reference(id, reference, &mut conn).await
    }

    async fn recent_pending_order_for_email(
        &self,
        email: &str,
        kind: OrderKind,
        window: Duration,
    ) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::recent_pending_order_for_email(email, kind, Utc::now() - window, &mut conn).await
    }

    async fn fetch_unmatched_subscription_orders(&self) -> Result<Vec<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_unmatched_subscription_orders(&mut conn).await
    }

    async fn settle_callback(&self, id: i64, update: CallbackUpdate) -> Result<CallbackSettlement, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let settlement = orders::settle_callback(id, update, &mut tx).await?;
        tx.commit().await?;
        Ok(settlement)
    }

    async fn set_email_status(&self, id: i64, status: EmailStatus) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::set_email_status(id, status, &mut conn).await
    }

    async fn set_crm_refs(
        &self,
        id: i64,
        lead_id: Option<i64>,
        payment_id: Option<i64>,
        contact_id: Option<i64>,
    ) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::set_crm_refs(id, lead_id, payment_id, contact_id, &mut conn).await
    }

    async fn expire_stale_orders(&self, reservation_ttl: Duration) -> Result<u64, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::expire_stale(Utc::now() - reservation_ttl, &mut conn).await
    }

    async fn append_scan(&self, scan: NewScanRecord) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        scans::append_scan(&scan, &mut conn).await
    }

    async fn mark_ticket_used(&self, id: i64) -> Result<bool, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::mark_ticket_used(id, &mut conn).await
    }

    async fn upsert_subscription(&self, sub: SubscriptionUpsert) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::upsert(&sub, &mut conn).await
    }

    async fn fetch_subscriptions(&self) -> Result<Vec<Subscription>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::fetch_all(&mut conn).await
    }

    async fn subscription_order_references(&self, limit: Option<i64>) -> Result<Vec<OrderId>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::subscription_order_references(limit, &mut conn).await
    }

    async fn orders_missing_contacts(&self) -> Result<Vec<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::orders_missing_contacts(&mut conn).await
    }

    async fn backfill_contact(
        &self,
        id: i64,
        name: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::backfill_contact(id, name, email, phone, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.pool.close().await;
        Ok(())
    }
}
