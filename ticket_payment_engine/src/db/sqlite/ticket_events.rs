use sqlx::SqliteConnection;

use crate::{db::sqlite::SqliteDatabaseError, db_types::TicketEvent};

const EVENT_COLUMNS: &str =
    "id, title, event_date, price, max_tickets, is_active, created_at, updated_at";

/// The single event currently open for ticket sales. If several rows are flagged active the newest
/// wins, matching how the admin toggles events over.
pub async fn fetch_active_event(
    conn: &mut SqliteConnection,
) -> Result<Option<TicketEvent>, SqliteDatabaseError> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM ticket_events WHERE is_active = 1 ORDER BY id DESC LIMIT 1"
    );
    let event = sqlx::query_as::<_, TicketEvent>(&sql).fetch_optional(conn).await?;
    Ok(event)
}
