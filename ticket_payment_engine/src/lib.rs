//! Ticket Payment Engine
//!
//! Core business logic for the ticketing checkout backend: the order state machine, the
//! concurrency-safe ticket inventory gate, callback matching for subscription charges, and the door
//! scanning workflow.
//!
//! The library is divided into two main sections:
//! 1. Database management ([`mod@db`]). SQLite is the supported backend. You should never need to
//!    access the database directly; use [`OrderFlowApi`] instead. The exception is the data types,
//!    which are defined in the `db_types` module and are public.
//! 2. The order flow API ([`OrderFlowApi`]), generic over any backend implementing
//!    [`TicketingDatabase`]. The server and the operator CLI are both built on it.
//!
//! The engine also provides an order-paid event hook. The server subscribes the ticket issuer to it
//! so delivery failures never touch payment state.
mod db;

pub mod db_types;
pub mod events;
pub mod helpers;
mod api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits;
pub use db::traits::{
    CallbackSettlement,
    CallbackUpdate,
    ContactInfo,
    NewScanRecord,
    Reservation,
    SubscriptionUpsert,
    TicketingDatabase,
};
pub use api::{
    errors::OrderFlowError,
    order_flow_api::OrderFlowApi,
    order_objects::{ScanOutcome, TicketCheck},
};
