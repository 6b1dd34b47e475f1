use actix_web::test::{call_service, read_body_json, TestRequest};
use keycrm_tools::CreatedLead;
use serde_json::{json, Value};
use ticket_payment_engine::{events::EventProducers, OrderFlowApi};

use crate::endpoint_tests::{
    helpers::{make_app, seed_event, test_config, test_db},
    mocks::MockCrm,
};

fn guest_form() -> Value {
    json!({ "name": "Olena", "email": "olena@example.com", "phone": "+380 67 123 45 67" })
}

#[actix_web::test]
async fn ticket_checkout_returns_signed_payment_params() {
    let db = test_db().await;
    seed_event(&db, 5).await;
    let config = test_config();
    let mut crm = MockCrm::new();
    crm.expect_create_pipeline_card()
        .times(1)
        .returning(|_| Ok(CreatedLead { lead_id: 9, contact_id: Some(3), payment_id: Some(77) }));
    let app = make_app!(db, config, Some(crm));

    let req = TestRequest::post().uri("/checkout/ticket").set_json(guest_form()).to_request();
    let response = call_service(&app, req).await;
    assert_eq!(response.status(), 200);
    let body: Value = read_body_json(response).await;
    assert_eq!(body["success"], true);
    let order_id = body["order_id"].as_i64().expect("order id");
    let payment = &body["payment"];
    assert_eq!(payment["amount"], "500.00");
    assert_eq!(payment["merchantAccount"], "test_merch_n1");
    assert!(payment["orderReference"].as_str().unwrap().starts_with(&format!("TICKET_{order_id}_")));
    assert!(!payment["merchantSignature"].as_str().unwrap().is_empty());

    // the CRM refs from the mocked card creation were stored on the order
    let api = OrderFlowApi::new(db, EventProducers::default());
    let order = api.fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.crm_lead_id, Some(9));
    assert_eq!(order.crm_payment_id, Some(77));
}

#[actix_web::test]
async fn invalid_form_lists_every_field_error() {
    let db = test_db().await;
    seed_event(&db, 5).await;
    let config = test_config();
    // no CRM expectations: a rejected form must not create a lead
    let app = make_app!(db, config, Some(MockCrm::new()));

    let bad = json!({ "name": " ", "email": "nope", "phone": "123" });
    let req = TestRequest::post().uri("/checkout/ticket").set_json(bad).to_request();
    let response = call_service(&app, req).await;
    assert_eq!(response.status(), 400);
    let body: Value = read_body_json(response).await;
    assert_eq!(body["success"], false);
    let errors = body["errors"].as_object().unwrap();
    assert_eq!(errors.len(), 3);
    assert!(errors.contains_key("name") && errors.contains_key("email") && errors.contains_key("phone"));
}

#[actix_web::test]
async fn sold_out_event_redirects_instead_of_erroring() {
    let db = test_db().await;
    seed_event(&db, 0).await;
    let config = test_config();
    let app = make_app!(db, config, Some(MockCrm::new()));

    let req = TestRequest::post().uri("/checkout/ticket").set_json(guest_form()).to_request();
    let response = call_service(&app, req).await;
    assert_eq!(response.status(), 200);
    let body: Value = read_body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["sold_out"], true);
    assert_eq!(body["redirect"], "/sold-out");
}

#[actix_web::test]
async fn double_submission_reuses_the_pending_order() {
    let db = test_db().await;
    seed_event(&db, 5).await;
    let config = test_config();
    let mut crm = MockCrm::new();
    crm.expect_create_pipeline_card().times(1).returning(|_| Ok(CreatedLead::default()));
    let app = make_app!(db, config, Some(crm));

    let req = TestRequest::post().uri("/checkout/ticket").set_json(guest_form()).to_request();
    let first: Value = read_body_json(call_service(&app, req).await).await;
    let req = TestRequest::post().uri("/checkout/ticket").set_json(guest_form()).to_request();
    let second: Value = read_body_json(call_service(&app, req).await).await;
    assert_eq!(first["order_id"], second["order_id"]);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(db.pool()).await.unwrap();
    assert_eq!(count.0, 1);
}

#[actix_web::test]
async fn duplicate_guard_does_not_cross_product_lines() {
    let db = test_db().await;
    seed_event(&db, 5).await;
    let config = test_config();
    let mut crm = MockCrm::new();
    crm.expect_create_pipeline_card().times(2).returning(|_| Ok(CreatedLead::default()));
    let app = make_app!(db, config, Some(crm));

    // A pending subscription must not be handed back to a ticket checkout by the same person.
    let req = TestRequest::post().uri("/checkout/subscription").set_json(guest_form()).to_request();
    let sub: Value = read_body_json(call_service(&app, req).await).await;
    let req = TestRequest::post().uri("/checkout/ticket").set_json(guest_form()).to_request();
    let ticket: Value = read_body_json(call_service(&app, req).await).await;

    assert_ne!(sub["order_id"], ticket["order_id"]);
    assert_eq!(ticket["payment"]["amount"], "500.00");
    assert!(ticket["payment"]["orderReference"].as_str().unwrap().starts_with("TICKET_"));
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(db.pool()).await.unwrap();
    assert_eq!(count.0, 2);
}

#[actix_web::test]
async fn subscription_checkout_uses_the_configured_price() {
    let db = test_db().await;
    let config = test_config();
    let mut crm = MockCrm::new();
    crm.expect_create_pipeline_card().times(1).returning(|_| Ok(CreatedLead::default()));
    let app = make_app!(db, config, Some(crm));

    let req = TestRequest::post().uri("/checkout/subscription").set_json(guest_form()).to_request();
    let response = call_service(&app, req).await;
    assert_eq!(response.status(), 200);
    let body: Value = read_body_json(response).await;
    assert_eq!(body["success"], true);
    let payment = &body["payment"];
    assert_eq!(payment["amount"], "300.00");
    let order_id = body["order_id"].as_i64().unwrap();
    assert!(payment["orderReference"].as_str().unwrap().starts_with(&format!("SUB_{order_id}_")));
}
