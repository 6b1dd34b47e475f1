//! The payment gateway webhook.
//!
//! Delivery is at-least-once and the gateway retries until it receives a correctly signed
//! acknowledgment, so the handler is idempotent end to end: signature verification happens before any
//! state change, settlement is a single atomic transition, and duplicate deliveries are acknowledged
//! without touching the order again. CRM reconciliation runs after settlement and can never fail the
//! acknowledgment.
use actix_web::{web, HttpResponse};
use keycrm_tools::CrmApi;
use log::*;
use ticket_payment_engine::{
    db_types::{OrderId, PaymentStatus},
    helpers::{normalize_email, normalize_phone},
    CallbackSettlement, CallbackUpdate, ContactInfo, OrderFlowApi, TicketingDatabase,
};
use wayforpay_tools::{CallbackAck, CallbackPayload, APPROVED_TOKEN, DECLINED_TOKEN};

use crate::{
    config::ServerConfig, errors::{AuthError, ServerError}, integrations::CrmReconciler, route,
};

route!(wayforpay_callback => Post "/callback/wayforpay" impl TicketingDatabase, CrmApi);

fn contact_from(payload: &CallbackPayload) -> ContactInfo {
    ContactInfo {
        name: payload.client_first_name.get().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        email: payload.client_email.get().and_then(normalize_email),
        phone: payload.client_phone.get().and_then(normalize_phone),
    }
}

fn verdict_from(payload: &CallbackPayload) -> PaymentStatus {
    match payload.transaction_status.as_str() {
        APPROVED_TOKEN => PaymentStatus::Success,
        DECLINED_TOKEN => PaymentStatus::Failed,
        other => {
            warn!("💳️ Unknown transaction status \"{other}\" for {}; treating as failed", payload.order_reference);
            PaymentStatus::Failed
        },
    }
}

/// Route handler for the gateway's settlement callback.
pub async fn wayforpay_callback<B, C>(
    config: web::Data<ServerConfig>,
    api: web::Data<OrderFlowApi<B>>,
    reconciler: web::Data<CrmReconciler<C>>,
    body: web::Bytes,
) -> Result<HttpResponse, ServerError>
where
    B: TicketingDatabase,
    C: CrmApi,
{
    let payload: CallbackPayload = serde_json::from_slice(&body).map_err(|e| {
        warn!("💳️ Could not parse gateway callback. {e}");
        ServerError::CouldNotDeserializePayload
    })?;
    debug!("💳️ Callback received for {} ({})", payload.order_reference, payload.transaction_status.as_str());
    // Verification comes first. Locating the order can rebind a fallback-matched order's reference,
    // so nothing below this point runs on a forged callback.
    let signer = config.wayforpay.signer();
    if let Err(e) = signer.verify_fields(&payload.signature_fields(), payload.merchant_signature.as_str()) {
        warn!("💳️ Rejecting callback {} with a bad signature. {e}", payload.order_reference);
        return Err(AuthError::InvalidCallbackSignature.into());
    }
    let reference = OrderId(payload.order_reference.clone());
    let contact = contact_from(&payload);
    let order = api
        .locate_order_for_callback(&reference, &contact, config.match_window)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .ok_or_else(|| {
            warn!("💳️ No order matches callback {}", payload.order_reference);
            ServerError::NoRecordFound(format!("No order for reference {}", payload.order_reference))
        })?;
    let update = CallbackUpdate {
        new_status: verdict_from(&payload),
        auth_code: payload.auth_code.get().map(String::from),
        card_pan: payload.card_pan.get().map(String::from),
        payment_system: payload.payment_system.get().map(String::from),
        contact,
    };
    let settlement =
        api.settle_payment(&order, update).await.map_err(|e| ServerError::BackendError(e.to_string()))?;
    match settlement {
        CallbackSettlement::AlreadyProcessed(order) => {
            info!("💳️ Replayed callback for order #{} acknowledged without changes", order.id);
        },
        CallbackSettlement::Settled(order) if order.payment_status == PaymentStatus::Success => {
            let outcome = reconciler.reconcile(&order, &payload).await;
            debug!("💳️ CRM reconciliation for order #{}: {outcome:?}", order.id);
        },
        CallbackSettlement::Settled(order) => {
            info!("💳️ Order #{} settled as {}; no reconciliation needed", order.id, order.payment_status);
        },
    }
    let ack = CallbackAck::accept(&payload.order_reference, &signer);
    Ok(HttpResponse::Ok().json(ack))
}
