//! Glue between the order flow and the outside world: the CRM reconciler and the ticket issuer.
pub mod keycrm;
pub mod tickets;

pub use keycrm::{CrmReconciler, ReconcileOutcome};
pub use tickets::{IssuedTicket, QrTicketIssuer, TicketIssueError, TicketIssuer};
