use std::{future::Future, pin::Pin};

use actix_web::{dev::Server, web, App, HttpServer};
use keycrm_tools::KeyCrmApi;
use log::*;
use ticket_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers, OrderPaidEvent},
    OrderFlowApi, SqliteDatabase, TicketingDatabase,
};

use crate::{
    callback_routes::WayforpayCallbackRoute,
    checkout_routes::{CheckoutSubscriptionRoute, CheckoutTicketRoute},
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::expiry_worker,
    integrations::{CrmReconciler, QrTicketIssuer, TicketIssuer},
    routes::health,
    scan_routes::{ScanTicketRoute, ValidateTicketRoute},
};

/// The hook that runs when an order settles as paid: render the ticket into the outbox and record the
/// delivery status. Failures mark the order for the resend tooling; they never touch payment state.
fn ticket_issue_hook(
    db: SqliteDatabase,
    issuer: QrTicketIssuer,
) -> impl Fn(OrderPaidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    move |event: OrderPaidEvent| {
        let db = db.clone();
        let issuer = issuer.clone();
        Box::pin(async move {
            let order = event.order;
            let api = OrderFlowApi::new(db, EventProducers::default());
            let result = match issuer.issue(&order).await {
                Ok(ticket) => {
                    debug!("🎫️ Ticket for order #{} rendered at {}", order.id, ticket.artifact.display());
                    api.mark_email_sent(order.id).await
                },
                Err(e) => {
                    error!("🎫️ Could not issue a ticket for order #{}. {e}", order.id);
                    api.mark_email_failed(order.id).await
                },
            };
            if let Err(e) = result {
                error!("🎫️ Could not record the delivery status for order #{}. {e}", order.id);
            }
        })
    }
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = if config.database_url.is_empty() {
        SqliteDatabase::new(25).await
    } else {
        SqliteDatabase::new_with_url(&config.database_url, 25).await
    }
    .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🗃️ Database initialised at {}", db.url());

    let issuer = QrTicketIssuer::new(&config.ticket_base_url, &config.ticket_outbox);
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(ticket_issue_hook(db.clone(), issuer));
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let worker_api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let reservation_ttl = config.reservation_ttl;
    tokio::spawn(async move {
        expiry_worker(worker_api, reservation_ttl).await;
    });

    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let api = OrderFlowApi::new(db.clone(), producers.clone());
        let crm_api = match KeyCrmApi::new(config.keycrm.clone()) {
            Ok(api) => Some(api),
            Err(e) => {
                debug!("📇️ CRM client not created. {e}");
                None
            },
        };
        let reconciler = CrmReconciler::new(crm_api, config.keycrm.clone(), config.reconciler.clone());
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(reconciler))
            .service(health)
            .service(CheckoutTicketRoute::<SqliteDatabase, KeyCrmApi>::new())
            .service(CheckoutSubscriptionRoute::<SqliteDatabase, KeyCrmApi>::new())
            .service(WayforpayCallbackRoute::<SqliteDatabase, KeyCrmApi>::new())
            .service(ValidateTicketRoute::<SqliteDatabase>::new())
            .service(ScanTicketRoute::<SqliteDatabase>::new())
    })
    .bind((host.as_str(), port))?;
    info!("🚀️ Server listening on {host}:{port}");
    Ok(srv.run())
}
