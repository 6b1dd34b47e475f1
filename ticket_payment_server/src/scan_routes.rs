//! Door staff endpoints: a read-only ticket status check and the scan itself.
use actix_web::{web, HttpRequest, HttpResponse};
use log::*;
use ticket_payment_engine::{OrderFlowApi, ScanOutcome, TicketCheck, TicketingDatabase};

use crate::{
    config::ServerConfig,
    data_objects::{ScanRequest, ScanResponse},
    errors::ServerError,
    helpers::get_remote_ip,
    route,
};

route!(validate_ticket => Get "/tickets/{order_id}/validate" impl TicketingDatabase);
route!(scan_ticket => Post "/tickets/{order_id}/scan" impl TicketingDatabase);

fn check_label(check: TicketCheck) -> &'static str {
    match check {
        TicketCheck::Valid => "valid",
        TicketCheck::Used => "used",
        TicketCheck::Invalid => "invalid",
    }
}

/// Route handler for the status check a ticket's QR code points at. Read-only: no scan is recorded.
pub async fn validate_ticket<B: TicketingDatabase>(
    api: web::Data<OrderFlowApi<B>>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let check = api
        .validate_ticket(order_id)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No ticket for order {order_id}")))?;
    let response = ScanResponse { status: check_label(check).to_string(), ticket_number: None, name: None, used_at: None };
    Ok(HttpResponse::Ok().json(response))
}

/// Route handler for a door scan. Exactly one of two simultaneous scans of a valid ticket admits.
pub async fn scan_ticket<B: TicketingDatabase>(
    req: HttpRequest,
    config: web::Data<ServerConfig>,
    api: web::Data<OrderFlowApi<B>>,
    path: web::Path<i64>,
    body: web::Json<ScanRequest>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let ip = get_remote_ip(&req, config.use_x_forwarded_for, config.use_forwarded).map(|ip| ip.to_string());
    let outcome = api
        .scan_ticket(order_id, &body.scanned_by, ip)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?;
    let response = match outcome {
        ScanOutcome::NotFound => {
            return Err(ServerError::NoRecordFound(format!("No ticket for order {order_id}")))
        },
        ScanOutcome::Admitted { order, ticket_number } => {
            debug!("🎟️ Order #{order_id} admitted at the door");
            ScanResponse {
                status: "valid".to_string(),
                ticket_number,
                name: Some(order.name),
                used_at: order.used_at,
            }
        },
        ScanOutcome::AlreadyUsed { order, used_at } => ScanResponse {
            status: "used".to_string(),
            ticket_number: order.ticket_number,
            name: Some(order.name),
            used_at,
        },
        ScanOutcome::Invalid { order } => ScanResponse {
            status: "invalid".to_string(),
            ticket_number: order.ticket_number,
            name: Some(order.name),
            used_at: None,
        },
    };
    Ok(HttpResponse::Ok().json(response))
}
