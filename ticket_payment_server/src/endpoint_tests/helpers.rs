use serde_json::Value;
use ticket_payment_engine::{
    test_utils::{prepare_test_env, random_db_path},
    SqliteDatabase,
};
use tps_common::Secret;
use wayforpay_tools::CallbackPayload;

use crate::config::{ReconcilerConfig, ServerConfig};

pub async fn test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 8).await.expect("Error connecting to database")
}

pub async fn seed_event(db: &SqliteDatabase, max_tickets: i64) {
    sqlx::query(
        "INSERT INTO ticket_events (title, event_date, price, max_tickets, is_active) \
         VALUES ('Warehouse Rave', '2026-12-31 22:00:00', 50000, $1, 1)",
    )
    .bind(max_tickets)
    .execute(db.pool())
    .await
    .expect("Error seeding event");
}

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.wayforpay.merchant_account = "test_merch_n1".to_string();
    config.wayforpay.merchant_domain = "www.example.com".to_string();
    config.wayforpay.secret_key = Secret::new("flk3409refn54t54t".to_string());
    // No real CRM feed lag in tests
    config.reconciler =
        ReconcilerConfig { attempts: 1, backoff: vec![std::time::Duration::from_millis(1)], page_size: 50 };
    config
}

/// A gateway callback body with a valid signature for `config`'s signing key.
pub fn signed_callback(
    config: &ServerConfig,
    reference: &str,
    status: &str,
    amount: &str,
    auth_code: &str,
) -> Value {
    let mut payload = CallbackPayload {
        order_reference: reference.to_string(),
        merchant_account: config.wayforpay.merchant_account.as_str().into(),
        amount: amount.into(),
        currency: "UAH".into(),
        auth_code: auth_code.into(),
        card_pan: "44****1111".into(),
        transaction_status: status.into(),
        reason_code: "1100".into(),
        ..Default::default()
    };
    let signature = config.wayforpay.signer().sign_fields(&payload.signature_fields());
    payload.merchant_signature = signature.into();
    serde_json::to_value(&payload).expect("callback should serialize")
}

/// Builds a test service with the full route table, the given database and an optional mocked CRM.
macro_rules! make_app {
    ($db:expr, $config:expr, $crm:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($config.clone()))
                .app_data(actix_web::web::Data::new(ticket_payment_engine::OrderFlowApi::new(
                    $db.clone(),
                    ticket_payment_engine::events::EventProducers::default(),
                )))
                .app_data(actix_web::web::Data::new($crate::integrations::CrmReconciler::new(
                    $crm,
                    keycrm_tools::KeyCrmConfig::default(),
                    $config.reconciler.clone(),
                )))
                .service($crate::routes::health)
                .service($crate::checkout_routes::CheckoutTicketRoute::<
                    ticket_payment_engine::SqliteDatabase,
                    $crate::endpoint_tests::mocks::MockCrm,
                >::new())
                .service($crate::checkout_routes::CheckoutSubscriptionRoute::<
                    ticket_payment_engine::SqliteDatabase,
                    $crate::endpoint_tests::mocks::MockCrm,
                >::new())
                .service($crate::callback_routes::WayforpayCallbackRoute::<
                    ticket_payment_engine::SqliteDatabase,
                    $crate::endpoint_tests::mocks::MockCrm,
                >::new())
                .service($crate::scan_routes::ValidateTicketRoute::<ticket_payment_engine::SqliteDatabase>::new())
                .service($crate::scan_routes::ScanTicketRoute::<ticket_payment_engine::SqliteDatabase>::new()),
        )
        .await
    };
}
pub(crate) use make_app;
