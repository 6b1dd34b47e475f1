use chrono::Duration;
use sqlx::migrate::MigrateDatabase;
use ticket_payment_engine::{
    db_types::{DeviceType, EmailStatus, NewOrder, OrderId, OrderKind, PaymentStatus, TicketStatus},
    events::EventProducers,
    CallbackSettlement,
    CallbackUpdate,
    ContactInfo,
    OrderFlowApi,
    Reservation,
    ScanOutcome,
    SqliteDatabase,
    TicketingDatabase,
};
use tps_common::Money;

async fn new_test_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    let path = std::env::temp_dir().join(format!("ticket_store_{}.db", rand::random::<u64>()));
    let url = format!("sqlite://{}", path.display());
    let _ = sqlx::Sqlite::drop_database(&url).await;
    sqlx::Sqlite::create_database(&url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(&url, 16).await.expect("Error connecting to database");
    sqlx::migrate!("./src/db/sqlite/migrations").run(db.pool()).await.expect("Error running migrations");
    db
}

async fn seed_event(db: &SqliteDatabase, max_tickets: i64) {
    sqlx::query(
        "INSERT INTO ticket_events (title, event_date, price, max_tickets, is_active) \
         VALUES ('Warehouse Rave', '2026-12-31 22:00:00', 50000, $1, 1)",
    )
    .bind(max_tickets)
    .execute(db.pool())
    .await
    .expect("Error seeding event");
}

fn ticket_order(i: u64) -> NewOrder {
    NewOrder::new(
        OrderKind::Ticket,
        format!("Guest {i}"),
        format!("guest{i}@example.com"),
        format!("38067123{i:04}"),
        Money::from_whole(500),
    )
    .with_device(DeviceType::Mobile)
}

fn subscription_order(email: &str, phone: &str) -> NewOrder {
    NewOrder::new(OrderKind::Subscription, "Olena".into(), email.into(), phone.into(), Money::from_whole(300))
}

fn approved_update() -> CallbackUpdate {
    CallbackUpdate {
        new_status: PaymentStatus::Success,
        auth_code: Some("AUTH42".into()),
        card_pan: Some("44****1111".into()),
        payment_system: Some("Visa".into()),
        contact: ContactInfo::default(),
    }
}

#[tokio::test]
async fn burst_reservations_never_oversell() {
    let db = new_test_db().await;
    seed_event(&db, 5).await;
    let api = std::sync::Arc::new(OrderFlowApi::new(db, EventProducers::default()));
    let mut handles = vec![];
    for i in 0..20u64 {
        let api = api.clone();
        handles.push(tokio::spawn(async move {
            api.checkout_ticket(ticket_order(i), Duration::minutes(10)).await.expect("reserve failed")
        }));
    }
    let mut admitted = 0;
    let mut sold_out = 0;
    for h in handles {
        match h.await.unwrap() {
            Reservation::Admitted(_) => admitted += 1,
            Reservation::SoldOut => sold_out += 1,
        }
    }
    assert_eq!(admitted, 5);
    assert_eq!(sold_out, 15);
}

#[tokio::test]
async fn expired_reservation_frees_its_slot() {
    let db = new_test_db().await;
    seed_event(&db, 1).await;
    let api = OrderFlowApi::new(db, EventProducers::default());
    let first = api.checkout_ticket(ticket_order(1), Duration::minutes(10)).await.unwrap();
    let Reservation::Admitted(first) = first else { panic!("first reservation should be admitted") };
    // full house
    let second = api.checkout_ticket(ticket_order(2), Duration::minutes(10)).await.unwrap();
    assert!(matches!(second, Reservation::SoldOut));
    // a zero TTL makes the pending reservation stale, so the next reserve sweeps it out
    let third = api.checkout_ticket(ticket_order(3), Duration::zero()).await.unwrap();
    let Reservation::Admitted(third) = third else { panic!("slot should have been reclaimed") };
    assert_eq!(third.ticket_number, Some(1));
    let first = api.fetch_order(first.id).await.unwrap().unwrap();
    assert_eq!(first.payment_status, PaymentStatus::Expired);
}

#[tokio::test]
async fn duplicate_callbacks_settle_exactly_once() {
    let db = new_test_db().await;
    let api = OrderFlowApi::new(db, EventProducers::default());
    let order = api.checkout_subscription(subscription_order("pat@example.com", "380671112233")).await.unwrap();

    let first = api.settle_payment(&order, approved_update()).await.unwrap();
    let CallbackSettlement::Settled(settled) = first else { panic!("first callback should settle") };
    assert_eq!(settled.payment_status, PaymentStatus::Success);
    assert!(settled.callback_processed);
    assert!(settled.paid_at.is_some());

    // the duplicate must not mutate anything, not even to the same values
    let mut dup = approved_update();
    dup.auth_code = Some("DIFFERENT".into());
    let second = api.settle_payment(&settled, dup).await.unwrap();
    let CallbackSettlement::AlreadyProcessed(unchanged) = second else {
        panic!("second callback should be a no-op")
    };
    assert_eq!(unchanged.auth_code.as_deref(), Some("AUTH42"));
    assert_eq!(unchanged.payment_status, PaymentStatus::Success);
}

#[tokio::test]
async fn declined_callback_fails_the_order_and_voids_the_ticket() {
    let db = new_test_db().await;
    seed_event(&db, 10).await;
    let api = OrderFlowApi::new(db, EventProducers::default());
    let Reservation::Admitted(order) =
        api.checkout_ticket(ticket_order(1), Duration::minutes(10)).await.unwrap()
    else {
        panic!("expected admission")
    };
    let mut update = approved_update();
    update.new_status = PaymentStatus::Failed;
    let CallbackSettlement::Settled(order) = api.settle_payment(&order, update).await.unwrap() else {
        panic!("expected settlement")
    };
    assert_eq!(order.payment_status, PaymentStatus::Failed);
    assert_eq!(order.ticket_status, TicketStatus::Invalid);
    assert!(order.paid_at.is_none());
}

#[tokio::test]
async fn callback_contact_fills_gaps_only() {
    let db = new_test_db().await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let mut new_order = subscription_order("", "380671112233");
    new_order.name = String::new();
    let order = api.checkout_subscription(new_order).await.unwrap();

    let mut update = approved_update();
    update.contact = ContactInfo {
        name: Some("From Callback".into()),
        email: Some("callback@example.com".into()),
        phone: Some("380509998877".into()),
    };
    let CallbackSettlement::Settled(order) = api.settle_payment(&order, update).await.unwrap() else {
        panic!("expected settlement")
    };
    // empty fields filled, the existing phone kept
    assert_eq!(order.name, "From Callback");
    assert_eq!(order.email, "callback@example.com");
    assert_eq!(order.phone, "380671112233");
}

#[tokio::test]
async fn unknown_reference_matches_pending_subscription_by_contact() {
    let db = new_test_db().await;
    let api = OrderFlowApi::new(db, EventProducers::default());
    let order = api.checkout_subscription(subscription_order("pat@example.com", "+380 67 111 22 33")).await.unwrap();

    let gateway_ref = OrderId("WFP_REGULAR_9915".to_string());
    let contact = ContactInfo {
        name: None,
        email: Some("pat@example.com".into()),
        phone: Some("0671112233".into()),
    };
    let matched = api
        .locate_order_for_callback(&gateway_ref, &contact, Duration::minutes(10))
        .await
        .unwrap()
        .expect("contact match should find the order");
    assert_eq!(matched.id, order.id);
    // the reference is rebound so a retry of the same callback matches exactly
    let retry = api
        .locate_order_for_callback(&gateway_ref, &ContactInfo::default(), Duration::minutes(10))
        .await
        .unwrap()
        .expect("rebound reference should match exactly");
    assert_eq!(retry.id, order.id);
}

#[tokio::test]
async fn sole_recent_candidate_is_a_low_confidence_match() {
    let db = new_test_db().await;
    let api = OrderFlowApi::new(db, EventProducers::default());
    let order = api.checkout_subscription(subscription_order("someone@example.com", "380671112233")).await.unwrap();

    // contact data matches nothing, but there is exactly one pending candidate in the window
    let contact =
        ContactInfo { name: None, email: Some("other@example.com".into()), phone: Some("380000000000".into()) };
    let matched = api
        .locate_order_for_callback(&OrderId("WFP_77".into()), &contact, Duration::minutes(10))
        .await
        .unwrap()
        .expect("single candidate fallback should bind");
    assert_eq!(matched.id, order.id);
}

#[tokio::test]
async fn no_match_yields_none_and_creates_nothing() {
    let db = new_test_db().await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let contact = ContactInfo { name: None, email: Some("x@example.com".into()), phone: None };
    let found =
        api.locate_order_for_callback(&OrderId("GHOST_1".into()), &contact, Duration::minutes(10)).await.unwrap();
    assert!(found.is_none());
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(db.pool()).await.unwrap();
    assert_eq!(count.0, 0);
}

#[tokio::test]
async fn ticket_scans_once_and_logs_every_attempt() {
    let db = new_test_db().await;
    seed_event(&db, 10).await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    let Reservation::Admitted(order) =
        api.checkout_ticket(ticket_order(1), Duration::minutes(10)).await.unwrap()
    else {
        panic!("expected admission")
    };

    // unpaid tickets are not admissible
    let outcome = api.scan_ticket(order.id, "door-1", None).await.unwrap();
    assert!(matches!(outcome, ScanOutcome::Invalid { .. }));

    let CallbackSettlement::Settled(order) = api.settle_payment(&order, approved_update()).await.unwrap()
    else {
        panic!("expected settlement")
    };
    let outcome = api.scan_ticket(order.id, "door-1", Some("10.0.0.5".into())).await.unwrap();
    let ScanOutcome::Admitted { ticket_number, .. } = outcome else { panic!("paid ticket should admit") };
    assert_eq!(ticket_number, Some(1));

    let outcome = api.scan_ticket(order.id, "door-2", None).await.unwrap();
    assert!(matches!(outcome, ScanOutcome::AlreadyUsed { .. }));

    assert!(matches!(api.scan_ticket(999, "door-1", None).await.unwrap(), ScanOutcome::NotFound));

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scan_log WHERE order_id = $1")
        .bind(order.id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count.0, 3);
}

#[tokio::test]
async fn email_status_is_independent_of_settlement() {
    let db = new_test_db().await;
    let api = OrderFlowApi::new(db, EventProducers::default());
    let order = api.checkout_subscription(subscription_order("pat@example.com", "380671112233")).await.unwrap();
    let CallbackSettlement::Settled(order) = api.settle_payment(&order, approved_update()).await.unwrap()
    else {
        panic!("expected settlement")
    };
    assert_eq!(order.email_status, EmailStatus::NotSent);
    api.mark_email_failed(order.id).await.unwrap();
    let order = api.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.email_status, EmailStatus::Failed);
    assert_eq!(order.payment_status, PaymentStatus::Success);
}
