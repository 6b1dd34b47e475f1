//! Checkout handlers for ticket and subscription orders.
//!
//! Both endpoints validate the contact form, guard against double submissions, create the order
//! through the engine and hand back signed gateway parameters for the client-side form post. The CRM
//! card is created here too, before payment, so the funnel shows abandoned checkouts.
use std::collections::BTreeMap;

use actix_web::{web, HttpResponse};
use keycrm_tools::CrmApi;
use log::*;
use ticket_payment_engine::{
    db_types::{NewOrder, Order, OrderKind},
    helpers::{normalize_email, normalize_phone},
    OrderFlowApi, OrderFlowError, Reservation, TicketingDatabase,
};
use wayforpay_tools::{PaymentRequest, PaymentRequestBuilder};

use crate::{
    config::ServerConfig,
    data_objects::{CheckoutForm, CheckoutResponse},
    errors::ServerError,
    integrations::CrmReconciler,
    route,
};

route!(checkout_ticket => Post "/checkout/ticket" impl TicketingDatabase, CrmApi);
route!(checkout_subscription => Post "/checkout/subscription" impl TicketingDatabase, CrmApi);

#[derive(Debug)]
struct ValidContact {
    name: String,
    email: String,
    phone: String,
}

fn validate_form(form: &CheckoutForm) -> Result<ValidContact, BTreeMap<String, String>> {
    let mut errors = BTreeMap::new();
    let name = form.name.trim().to_string();
    if name.is_empty() {
        errors.insert("name".to_string(), "Name is required".to_string());
    }
    let email = match normalize_email(&form.email) {
        Some(email) => email,
        None => {
            errors.insert("email".to_string(), "A valid email address is required".to_string());
            String::new()
        },
    };
    let phone = match normalize_phone(&form.phone) {
        Some(phone) => phone,
        None => {
            errors.insert("phone".to_string(), "A valid phone number is required".to_string());
            String::new()
        },
    };
    if errors.is_empty() {
        Ok(ValidContact { name, email, phone })
    } else {
        Err(errors)
    }
}

fn payment_request(config: &ServerConfig, order: &Order, product_name: &str) -> PaymentRequest {
    let reference = order.order_reference.as_ref().map(|r| r.to_string()).unwrap_or_default();
    PaymentRequestBuilder::new(&config.wayforpay, reference, order.amount)
        .with_product(product_name, 1, order.amount)
        .with_client(order.name.as_str(), order.email.as_str(), order.phone.as_str())
        .build(&config.wayforpay.signer())
}

async fn register_crm_lead<B, C>(
    api: &OrderFlowApi<B>,
    reconciler: &CrmReconciler<C>,
    order: &Order,
) where
    B: TicketingDatabase,
    C: CrmApi,
{
    if let Some(lead) = reconciler.create_lead_for_checkout(order).await {
        if let Err(e) = api.record_crm_refs(order.id, Some(lead.lead_id), lead.payment_id, lead.contact_id).await
        {
            warn!("📬️ Could not store CRM references for order #{}. {e}", order.id);
        }
    }
}

/// Route handler for ticket checkout. Inventory is capped; a full event returns a sold-out response
/// rather than an error.
pub async fn checkout_ticket<B, C>(
    config: web::Data<ServerConfig>,
    api: web::Data<OrderFlowApi<B>>,
    reconciler: web::Data<CrmReconciler<C>>,
    form: web::Json<CheckoutForm>,
) -> Result<HttpResponse, ServerError>
where
    B: TicketingDatabase,
    C: CrmApi,
{
    let contact = match validate_form(&form) {
        Ok(contact) => contact,
        Err(errors) => return Ok(HttpResponse::BadRequest().json(CheckoutResponse::invalid(errors))),
    };
    let event = api
        .active_event()
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .ok_or_else(|| ServerError::NoRecordFound("There is no event on sale right now".to_string()))?;
    // Double submission guard: hand the existing pending order's payment parameters back instead of
    // burning another inventory slot.
    if let Some(existing) = api
        .duplicate_pending_order(&contact.email, OrderKind::Ticket, config.duplicate_window)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
    {
        info!("📬️ Duplicate checkout for {}; reusing order #{}", existing.email, existing.id);
        let payment = payment_request(&config, &existing, &event.title);
        return Ok(HttpResponse::Ok().json(CheckoutResponse::admitted(existing.id, payment)));
    }
    let order = NewOrder::new(OrderKind::Ticket, contact.name, contact.email, contact.phone, event.price)
        .with_device(form.device_type.unwrap_or_default());
    let reservation = match api.checkout_ticket(order, config.reservation_ttl).await {
        Ok(reservation) => reservation,
        Err(OrderFlowError::NoActiveEvent) => {
            return Err(ServerError::NoRecordFound("There is no event on sale right now".to_string()))
        },
        Err(e) => return Err(ServerError::BackendError(e.to_string())),
    };
    match reservation {
        Reservation::SoldOut => {
            info!("📬️ Checkout refused: event \"{}\" is sold out", event.title);
            Ok(HttpResponse::Ok().json(CheckoutResponse::sold_out()))
        },
        Reservation::Admitted(order) => {
            register_crm_lead(&api, &reconciler, &order).await;
            let payment = payment_request(&config, &order, &event.title);
            info!("📬️ Ticket order #{} admitted (ticket {:?})", order.id, order.ticket_number);
            Ok(HttpResponse::Ok().json(CheckoutResponse::admitted(order.id, payment)))
        },
    }
}

/// Route handler for subscription checkout. No inventory cap applies; the price comes from server
/// configuration since subscriptions are not tied to an event.
pub async fn checkout_subscription<B, C>(
    config: web::Data<ServerConfig>,
    api: web::Data<OrderFlowApi<B>>,
    reconciler: web::Data<CrmReconciler<C>>,
    form: web::Json<CheckoutForm>,
) -> Result<HttpResponse, ServerError>
where
    B: TicketingDatabase,
    C: CrmApi,
{
    let contact = match validate_form(&form) {
        Ok(contact) => contact,
        Err(errors) => return Ok(HttpResponse::BadRequest().json(CheckoutResponse::invalid(errors))),
    };
    if let Some(existing) = api
        .duplicate_pending_order(&contact.email, OrderKind::Subscription, config.duplicate_window)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
    {
        info!("📬️ Duplicate checkout for {}; reusing order #{}", existing.email, existing.id);
        let payment = payment_request(&config, &existing, SUBSCRIPTION_PRODUCT);
        return Ok(HttpResponse::Ok().json(CheckoutResponse::admitted(existing.id, payment)));
    }
    let order = NewOrder::new(
        OrderKind::Subscription,
        contact.name,
        contact.email,
        contact.phone,
        config.subscription_price,
    )
    .with_device(form.device_type.unwrap_or_default());
    let order = api.checkout_subscription(order).await.map_err(|e| ServerError::BackendError(e.to_string()))?;
    register_crm_lead(&api, &reconciler, &order).await;
    let payment = payment_request(&config, &order, SUBSCRIPTION_PRODUCT);
    info!("📬️ Subscription order #{} created", order.id);
    Ok(HttpResponse::Ok().json(CheckoutResponse::admitted(order.id, payment)))
}

const SUBSCRIPTION_PRODUCT: &str = "Monthly subscription";

#[cfg(test)]
mod test {
    use super::*;

    fn form(name: &str, email: &str, phone: &str) -> CheckoutForm {
        CheckoutForm {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            device_type: None,
        }
    }

    #[test]
    fn valid_form_is_normalised() {
        let contact = validate_form(&form(" Olena ", " Olena@Example.COM ", "+380 67 123 45 67")).unwrap();
        assert_eq!(contact.name, "Olena");
        assert_eq!(contact.email, "olena@example.com");
        assert_eq!(contact.phone, "380671234567");
    }

    #[test]
    fn every_bad_field_gets_its_own_message() {
        let errors = validate_form(&form("", "nope", "123")).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("phone"));
    }
}
