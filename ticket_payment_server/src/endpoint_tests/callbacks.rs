use actix_web::test::{call_service, read_body_json, TestRequest};
use keycrm_tools::{CreatedLead, ExternalTransaction};
use serde_json::{json, Value};
use ticket_payment_engine::{
    db_types::PaymentStatus, events::EventProducers, OrderFlowApi,
};

use crate::endpoint_tests::{
    helpers::{make_app, seed_event, signed_callback, test_config, test_db},
    mocks::MockCrm,
};

fn guest_form() -> Value {
    json!({ "name": "Olena", "email": "olena@example.com", "phone": "+380 67 123 45 67" })
}

#[actix_web::test]
async fn approved_callback_settles_reconciles_and_acks() {
    let db = test_db().await;
    seed_event(&db, 5).await;
    let config = test_config();
    let mut crm = MockCrm::new();
    crm.expect_create_pipeline_card()
        .times(1)
        .returning(|_| Ok(CreatedLead { lead_id: 9, contact_id: None, payment_id: Some(77) }));
    crm.expect_list_external_transactions().returning(|_, _| {
        Ok(vec![ExternalTransaction {
            id: 555,
            amount: 500.0,
            description: Some("WayForPay AUTH42".to_string()),
            uuid: None,
        }])
    });
    // The replayed callback below must not attach a second time
    crm.expect_attach_external_transaction().times(1).returning(|_, _| Ok(()));
    let app = make_app!(db, config, Some(crm));

    let req = TestRequest::post().uri("/checkout/ticket").set_json(guest_form()).to_request();
    let checkout: Value = read_body_json(call_service(&app, req).await).await;
    let order_id = checkout["order_id"].as_i64().unwrap();
    let reference = checkout["payment"]["orderReference"].as_str().unwrap().to_string();

    let callback = signed_callback(&config, &reference, "Approved", "500.00", "AUTH42");
    let req = TestRequest::post().uri("/callback/wayforpay").set_json(&callback).to_request();
    let response = call_service(&app, req).await;
    assert_eq!(response.status(), 200);
    let ack: Value = read_body_json(response).await;
    assert_eq!(ack["orderReference"], reference.as_str());
    assert_eq!(ack["status"], "accept");
    assert_eq!(ack["signature"], config.wayforpay.signer().ack_signature(&reference));

    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = api.fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Success);
    assert_eq!(order.auth_code.as_deref(), Some("AUTH42"));

    // replay: acknowledged again, nothing settles twice
    let req = TestRequest::post().uri("/callback/wayforpay").set_json(&callback).to_request();
    let response = call_service(&app, req).await;
    assert_eq!(response.status(), 200);
    let order = api.fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Success);
}

#[actix_web::test]
async fn forged_signature_is_rejected_before_any_state_change() {
    let db = test_db().await;
    seed_event(&db, 5).await;
    let config = test_config();
    let mut crm = MockCrm::new();
    crm.expect_create_pipeline_card().times(1).returning(|_| Ok(CreatedLead::default()));
    let app = make_app!(db, config, Some(crm));

    let req = TestRequest::post().uri("/checkout/ticket").set_json(guest_form()).to_request();
    let checkout: Value = read_body_json(call_service(&app, req).await).await;
    let order_id = checkout["order_id"].as_i64().unwrap();
    let reference = checkout["payment"]["orderReference"].as_str().unwrap().to_string();

    let mut callback = signed_callback(&config, &reference, "Approved", "500.00", "AUTH42");
    callback["merchantSignature"] = Value::String("0000deadbeef0000".to_string());
    let req = TestRequest::post().uri("/callback/wayforpay").set_json(&callback).to_request();
    let response = call_service(&app, req).await;
    assert_eq!(response.status(), 403);

    let api = OrderFlowApi::new(db, EventProducers::default());
    let order = api.fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(order.auth_code.is_none());
}

#[actix_web::test]
async fn forged_callback_cannot_rebind_a_contact_matched_order() {
    let db = test_db().await;
    let config = test_config();
    let mut crm = MockCrm::new();
    crm.expect_create_pipeline_card().times(1).returning(|_| Ok(CreatedLead::default()));
    let app = make_app!(db, config, Some(crm));

    let req = TestRequest::post().uri("/checkout/subscription").set_json(guest_form()).to_request();
    let checkout: Value = read_body_json(call_service(&app, req).await).await;
    let order_id = checkout["order_id"].as_i64().unwrap();
    let original = checkout["payment"]["orderReference"].as_str().unwrap().to_string();

    // Shaped like a recurring charge: an invented reference plus the customer's contact data, which
    // would bind through the contact fallback, but the signature is garbage.
    let mut callback = signed_callback(&config, "WFP_EVIL_999", "Approved", "300.00", "AUTH9");
    callback["clientFirstName"] = json!("Olena");
    callback["clientEmail"] = json!("olena@example.com");
    callback["clientPhone"] = json!("+380 67 123 45 67");
    callback["merchantSignature"] = json!("0000deadbeef0000");
    let req = TestRequest::post().uri("/callback/wayforpay").set_json(&callback).to_request();
    let response = call_service(&app, req).await;
    assert_eq!(response.status(), 403);

    // The order still answers to its own reference, not the attacker's.
    let api = OrderFlowApi::new(db, EventProducers::default());
    let order = api.fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.order_reference.as_ref().map(|r| r.to_string()), Some(original));
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn declined_callback_fails_the_order_without_reconciling() {
    let db = test_db().await;
    seed_event(&db, 5).await;
    let config = test_config();
    let mut crm = MockCrm::new();
    crm.expect_create_pipeline_card()
        .times(1)
        .returning(|_| Ok(CreatedLead { lead_id: 9, contact_id: None, payment_id: Some(77) }));
    // no list/attach expectations: a declined payment never reconciles
    let app = make_app!(db, config, Some(crm));

    let req = TestRequest::post().uri("/checkout/ticket").set_json(guest_form()).to_request();
    let checkout: Value = read_body_json(call_service(&app, req).await).await;
    let order_id = checkout["order_id"].as_i64().unwrap();
    let reference = checkout["payment"]["orderReference"].as_str().unwrap().to_string();

    let callback = signed_callback(&config, &reference, "Declined", "500.00", "");
    let req = TestRequest::post().uri("/callback/wayforpay").set_json(&callback).to_request();
    let response = call_service(&app, req).await;
    assert_eq!(response.status(), 200, "failures are acknowledged too");

    let api = OrderFlowApi::new(db, EventProducers::default());
    let order = api.fetch_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Failed);
}

#[actix_web::test]
async fn callback_for_an_unknown_reference_is_a_404() {
    let db = test_db().await;
    let config = test_config();
    let app = make_app!(db, config, Some(MockCrm::new()));

    let callback = signed_callback(&config, "GHOST_1_1700000000", "Approved", "500.00", "AUTH1");
    let req = TestRequest::post().uri("/callback/wayforpay").set_json(&callback).to_request();
    let response = call_service(&app, req).await;
    assert_eq!(response.status(), 404);
}

#[actix_web::test]
async fn garbage_payload_is_a_400() {
    let db = test_db().await;
    let config = test_config();
    let app = make_app!(db, config, Some(MockCrm::new()));

    let req = TestRequest::post()
        .uri("/callback/wayforpay")
        .insert_header(("content-type", "application/json"))
        .set_payload("not json at all")
        .to_request();
    let response = call_service(&app, req).await;
    assert_eq!(response.status(), 400);
}
