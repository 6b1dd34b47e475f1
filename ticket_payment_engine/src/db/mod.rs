//! Database management and control.
//!
//! This module defines the interface contract of the payment engine database backends and provides the
//! SQLite implementation.
//!
//! The [`traits::TicketingDatabase`] trait is the full surface the order flow needs: reservation with
//! the inventory cap, the idempotent callback settlement, scan bookkeeping and the subscription mirror.
//! Server and CLI code talk to [`crate::OrderFlowApi`], not to the backend directly.

pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;
