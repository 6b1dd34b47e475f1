use actix_web::test::{call_service, read_body_json, TestRequest};
use serde_json::{json, Value};
use ticket_payment_engine::{
    db_types::PaymentStatus,
    events::EventProducers,
    CallbackSettlement, CallbackUpdate, ContactInfo, OrderFlowApi, Reservation, SqliteDatabase,
};

use crate::endpoint_tests::{
    helpers::{make_app, seed_event, test_config, test_db},
    mocks::MockCrm,
};

async fn paid_ticket_order(db: &SqliteDatabase) -> i64 {
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = ticket_payment_engine::db_types::NewOrder::new(
        ticket_payment_engine::db_types::OrderKind::Ticket,
        "Olena".into(),
        "olena@example.com".into(),
        "380671234567".into(),
        tps_common::Money::from_whole(500),
    );
    let Reservation::Admitted(order) = api.checkout_ticket(order, chrono::Duration::minutes(10)).await.unwrap()
    else {
        panic!("expected admission")
    };
    let update = CallbackUpdate {
        new_status: PaymentStatus::Success,
        auth_code: Some("AUTH1".into()),
        card_pan: None,
        payment_system: None,
        contact: ContactInfo::default(),
    };
    let CallbackSettlement::Settled(order) = api.settle_payment(&order, update).await.unwrap() else {
        panic!("expected settlement")
    };
    order.id
}

#[actix_web::test]
async fn paid_ticket_admits_once_then_reads_used() {
    let db = test_db().await;
    seed_event(&db, 5).await;
    let order_id = paid_ticket_order(&db).await;
    let config = test_config();
    let app = make_app!(db, config, None::<MockCrm>);

    let req = TestRequest::post()
        .uri(&format!("/tickets/{order_id}/scan"))
        .set_json(json!({ "scanned_by": "door-1" }))
        .to_request();
    let body: Value = read_body_json(call_service(&app, req).await).await;
    assert_eq!(body["status"], "valid");
    assert_eq!(body["ticket_number"], 1);
    assert_eq!(body["name"], "Olena");

    let req = TestRequest::post()
        .uri(&format!("/tickets/{order_id}/scan"))
        .set_json(json!({ "scanned_by": "door-2" }))
        .to_request();
    let body: Value = read_body_json(call_service(&app, req).await).await;
    assert_eq!(body["status"], "used");
    assert!(body["used_at"].is_string());
}

#[actix_web::test]
async fn unpaid_ticket_scans_as_invalid() {
    let db = test_db().await;
    seed_event(&db, 5).await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = ticket_payment_engine::db_types::NewOrder::new(
        ticket_payment_engine::db_types::OrderKind::Ticket,
        "Olena".into(),
        "olena@example.com".into(),
        "380671234567".into(),
        tps_common::Money::from_whole(500),
    );
    let Reservation::Admitted(order) = api.checkout_ticket(order, chrono::Duration::minutes(10)).await.unwrap()
    else {
        panic!("expected admission")
    };
    let config = test_config();
    let app = make_app!(db, config, None::<MockCrm>);

    let req = TestRequest::post()
        .uri(&format!("/tickets/{}/scan", order.id))
        .set_json(json!({ "scanned_by": "door-1" }))
        .to_request();
    let body: Value = read_body_json(call_service(&app, req).await).await;
    assert_eq!(body["status"], "invalid");
}

#[actix_web::test]
async fn validate_reports_without_consuming_the_ticket() {
    let db = test_db().await;
    seed_event(&db, 5).await;
    let order_id = paid_ticket_order(&db).await;
    let config = test_config();
    let app = make_app!(db, config, None::<MockCrm>);

    for _ in 0..2 {
        let req = TestRequest::get().uri(&format!("/tickets/{order_id}/validate")).to_request();
        let body: Value = read_body_json(call_service(&app, req).await).await;
        assert_eq!(body["status"], "valid");
    }
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scan_log").fetch_one(db.pool()).await.unwrap();
    assert_eq!(count.0, 0);
}

#[actix_web::test]
async fn unknown_ticket_is_a_404() {
    let db = test_db().await;
    let config = test_config();
    let app = make_app!(db, config, None::<MockCrm>);

    let req = TestRequest::get().uri("/tickets/999/validate").to_request();
    let response = call_service(&app, req).await;
    assert_eq!(response.status(), 404);

    let req = TestRequest::post()
        .uri("/tickets/999/scan")
        .set_json(json!({ "scanned_by": "door-1" }))
        .to_request();
    let response = call_service(&app, req).await;
    assert_eq!(response.status(), 404);
}
