//! Ticket Payment Server
//!
//! The HTTP face of the ticketing checkout backend. It exposes the checkout endpoints, the payment
//! gateway webhook and the door scanning endpoints, and wires the order flow engine to the WayForPay
//! gateway and the KeyCRM sales funnel.
pub mod callback_routes;
pub mod checkout_routes;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod scan_routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
