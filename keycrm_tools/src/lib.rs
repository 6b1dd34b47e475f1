//! KeyCRM integration tools.
//!
//! The CRM holds the sales funnel view of every checkout: a pipeline card (lead) with an embedded payment
//! record is created at form-submit time, and after the gateway confirms a charge the payment record is
//! linked to the CRM's own copy of the external transaction. This crate provides:
//! * the [`CrmApi`] trait, the surface the payment server consumes, kept narrow so tests can mock it,
//! * [`KeyCrmApi`], the reqwest-backed implementation against the CRM's open API,
//! * typed request/response objects for cards, payments and external transactions.
//!
//! Every call here is network-latent and fallible; callers own the retry policy.

mod api;
mod config;
mod error;

mod data_objects;

pub use api::{CrmApi, KeyCrmApi};
pub use config::KeyCrmConfig;
pub use data_objects::{
    CreatedLead,
    CrmContact,
    CrmPayment,
    CrmProduct,
    CustomField,
    ExternalTransaction,
    NewCrmPayment,
    NewPipelineCard,
    PAYMENT_STATUS_NOT_PAID,
    PAYMENT_STATUS_PAID,
};
pub use error::KeyCrmApiError;
