use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db_types::Order;

/// Result of a door scan. Every variant except `NotFound` also produced a scan log row.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// The ticket was admissible and has now been marked used.
    Admitted { order: Order, ticket_number: Option<i64> },
    /// The ticket was already scanned. The order is returned for display at the door.
    AlreadyUsed { order: Order, used_at: Option<DateTime<Utc>> },
    /// Unpaid, expired or voided. Not admissible.
    Invalid { order: Order },
    NotFound,
}

/// Read-only ticket status report, used by door staff before committing a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketCheck {
    Valid,
    Used,
    Invalid,
}
