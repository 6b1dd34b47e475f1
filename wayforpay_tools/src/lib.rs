//! WayForPay integration tools.
//!
//! This crate holds everything the ticket payment server needs to talk to the WayForPay gateway:
//! * the keyed-hash signature schemes used to sign payment-initiation parameters, verify inbound webhook
//!   callbacks, and sign webhook acknowledgments ([`Signer`]),
//! * typed data objects for the webhook payload, the payment-initiation form parameters and the signed
//!   acknowledgment ([`mod@data_objects`]),
//! * a client for the regular-payments API's `STATUS` endpoint ([`WayForPayApi`]), used by the subscription
//!   sync tooling.

mod api;
mod config;
mod error;
mod signature;

mod data_objects;

pub use api::WayForPayApi;
pub use config::WayForPayConfig;
pub use data_objects::{
    CallbackAck,
    CallbackPayload,
    PaymentRequest,
    PaymentRequestBuilder,
    RegularStatus,
    WireField,
    ACCEPT_STATUS,
    APPROVED_TOKEN,
    DECLINED_TOKEN,
};
pub use error::WayForPayApiError;
pub use signature::{SignatureScheme, Signer};
