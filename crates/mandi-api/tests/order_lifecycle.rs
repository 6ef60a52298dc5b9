use std::sync::Arc;

use uuid::Uuid;

use mandi_api::orders::{apply_order_update, place_order};
use mandi_db::Database;
use mandi_db::models::CropRow;
use mandi_gateway::dispatcher::Dispatcher;
use mandi_gateway::relay::ChatRelay;
use mandi_types::api::{Claims, CreateOrderRequest, OrderUpdateResponse, UpdateOrderRequest};
use mandi_types::error::MarketError;
use mandi_types::models::{NotificationKind, Order, OrderStatus, Role};

struct Fixture {
    db: Arc<Database>,
    relay: ChatRelay,
    farmer: Uuid,
    buyer: Uuid,
    buyer_claims: Claims,
}

fn fixture() -> Fixture {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let relay = ChatRelay::new(db.clone(), Dispatcher::new());

    let farmer = add_user(&db, Role::Farmer, "asha");
    let buyer = add_user(&db, Role::Buyer, "ravi");
    let buyer_claims = Claims {
        sub: buyer,
        username: "ravi".into(),
        role: Role::Buyer,
        exp: 4102444800,
    };

    Fixture {
        db,
        relay,
        farmer,
        buyer,
        buyer_claims,
    }
}

fn add_user(db: &Database, role: Role, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.create_user(
        &id.to_string(),
        name,
        &format!("{name}@example.com"),
        "hash",
        role.as_str(),
        "2026-08-01T08:00:00Z",
    )
    .unwrap();
    id
}

fn add_crop(f: &Fixture, quantity_kg: f64) -> Uuid {
    let id = Uuid::new_v4();
    f.db.insert_crop(&CropRow {
        id: id.to_string(),
        name: "Alphonso".into(),
        kind: "fruit".into(),
        price_per_kg: 150.0,
        quantity_kg,
        location: "Ratnagiri".into(),
        seller_id: f.farmer.to_string(),
        available: true,
        created_at: "2026-08-01T08:05:00Z".into(),
    })
    .unwrap();
    id
}

async fn place(f: &Fixture, crop: Uuid, qty: &str) -> Order {
    place_order(
        &f.db,
        &f.relay,
        &f.buyer_claims,
        CreateOrderRequest {
            crop,
            quantity_ordered: qty.into(),
            proposed_price: 140.0,
            address: "7 Bazaar Lane".into(),
        },
    )
    .await
    .unwrap()
}

fn status_update(status: OrderStatus) -> UpdateOrderRequest {
    UpdateOrderRequest {
        status: Some(status),
        ..Default::default()
    }
}

#[tokio::test]
async fn creating_resolves_farmer_from_crop_and_notifies() {
    let f = fixture();
    let crop = add_crop(&f, 10.0);

    let order = place(&f, crop, "4").await;
    assert_eq!(order.farmer_id, f.farmer);
    assert_eq!(order.status, OrderStatus::Pending);

    let notices = f.db.list_notifications(&f.farmer.to_string()).unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NotificationKind::OrderPlaced.as_str());
}

#[tokio::test]
async fn creating_with_blank_fields_or_unknown_crop_fails() {
    let f = fixture();
    let crop = add_crop(&f, 10.0);

    let err = place_order(
        &f.db,
        &f.relay,
        &f.buyer_claims,
        CreateOrderRequest {
            crop,
            quantity_ordered: "4".into(),
            proposed_price: 140.0,
            address: "  ".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MarketError::InvalidInput(_)));

    let err = place_order(
        &f.db,
        &f.relay,
        &f.buyer_claims,
        CreateOrderRequest {
            crop: Uuid::new_v4(),
            quantity_ordered: "4".into(),
            proposed_price: 140.0,
            address: "7 Bazaar Lane".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MarketError::NotFound("crop")));
}

#[tokio::test]
async fn accepting_deducts_stock_exactly() {
    let f = fixture();
    let crop = add_crop(&f, 10.0);
    let order = place(&f, crop, "4").await;

    let outcome = apply_order_update(
        &f.db,
        &f.relay,
        &order.id.to_string(),
        status_update(OrderStatus::Accepted),
    )
    .await
    .unwrap();

    match outcome {
        OrderUpdateResponse::Updated { order } => assert_eq!(order.status, OrderStatus::Accepted),
        other => panic!("expected update, got {other:?}"),
    }

    let crop_row = f.db.get_crop(&crop.to_string()).unwrap().unwrap();
    assert_eq!(crop_row.quantity_kg, 6.0);
    assert!(crop_row.available);
}

#[tokio::test]
async fn accepting_the_whole_stock_sells_out() {
    let f = fixture();
    let crop = add_crop(&f, 10.0);
    let order = place(&f, crop, "10").await;

    apply_order_update(
        &f.db,
        &f.relay,
        &order.id.to_string(),
        status_update(OrderStatus::Accepted),
    )
    .await
    .unwrap();

    let crop_row = f.db.get_crop(&crop.to_string()).unwrap().unwrap();
    assert_eq!(crop_row.quantity_kg, 0.0);
    assert!(!crop_row.available);
}

#[tokio::test]
async fn accepting_more_than_stock_clamps_to_zero() {
    let f = fixture();
    let crop = add_crop(&f, 10.0);
    let order = place(&f, crop, "15").await;

    apply_order_update(
        &f.db,
        &f.relay,
        &order.id.to_string(),
        status_update(OrderStatus::Accepted),
    )
    .await
    .unwrap();

    let crop_row = f.db.get_crop(&crop.to_string()).unwrap().unwrap();
    assert_eq!(crop_row.quantity_kg, 0.0);
    assert!(!crop_row.available);
}

#[tokio::test]
async fn accepting_requires_a_positive_integer_quantity() {
    let f = fixture();
    let crop = add_crop(&f, 10.0);

    for bad in ["a lot", "0", "-3", "2.5"] {
        let order = place(&f, crop, bad).await;
        let err = apply_order_update(
            &f.db,
            &f.relay,
            &order.id.to_string(),
            status_update(OrderStatus::Accepted),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MarketError::InvalidInput(_)), "quantity {bad:?}");

        // nothing was deducted
        let crop_row = f.db.get_crop(&crop.to_string()).unwrap().unwrap();
        assert_eq!(crop_row.quantity_kg, 10.0);
    }
}

#[tokio::test]
async fn rejecting_notifies_the_buyer_then_removes_the_order() {
    let f = fixture();
    let crop = add_crop(&f, 10.0);
    let order = place(&f, crop, "4").await;

    let outcome = apply_order_update(
        &f.db,
        &f.relay,
        &order.id.to_string(),
        UpdateOrderRequest {
            status: Some(OrderStatus::Rejected),
            reason: Some("Out of stock".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(matches!(outcome, OrderUpdateResponse::Removed { order_id } if order_id == order.id));

    let notices = f.db.list_notifications(&f.buyer.to_string()).unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NotificationKind::OrderRejected.as_str());
    assert!(notices[0].message.contains("Out of stock"));
    assert!(notices[0].message.contains("asha"));
    assert!(notices[0].message.contains("Alphonso"));

    // the row is gone: a second update misses
    let err = apply_order_update(
        &f.db,
        &f.relay,
        &order.id.to_string(),
        status_update(OrderStatus::Cancelled),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MarketError::NotFound("order")));
}

#[tokio::test]
async fn rejecting_without_a_reason_uses_the_default_text() {
    let f = fixture();
    let crop = add_crop(&f, 10.0);
    let order = place(&f, crop, "4").await;

    apply_order_update(
        &f.db,
        &f.relay,
        &order.id.to_string(),
        status_update(OrderStatus::Rejected),
    )
    .await
    .unwrap();

    let notices = f.db.list_notifications(&f.buyer.to_string()).unwrap();
    assert!(notices[0].message.contains("No reason provided."));
}

#[tokio::test]
async fn cancelling_removes_silently() {
    let f = fixture();
    let crop = add_crop(&f, 10.0);
    let order = place(&f, crop, "4").await;

    let outcome = apply_order_update(
        &f.db,
        &f.relay,
        &order.id.to_string(),
        status_update(OrderStatus::Cancelled),
    )
    .await
    .unwrap();
    assert!(matches!(outcome, OrderUpdateResponse::Removed { .. }));

    // no notification for the buyer on cancel
    assert!(f.db.list_notifications(&f.buyer.to_string()).unwrap().is_empty());
    assert!(f.db.get_order(&order.id.to_string()).unwrap().is_none());
}

#[tokio::test]
async fn lifecycle_runs_to_completed_and_stops() {
    let f = fixture();
    let crop = add_crop(&f, 10.0);
    let order = place(&f, crop, "4").await;
    let id = order.id.to_string();

    for status in [
        OrderStatus::Accepted,
        OrderStatus::Delivered,
        OrderStatus::Completed,
    ] {
        apply_order_update(&f.db, &f.relay, &id, status_update(status))
            .await
            .unwrap();
    }

    // completed is terminal and the row is retained
    let row = f.db.get_order(&id).unwrap().unwrap();
    assert_eq!(row.status, "completed");

    let err = apply_order_update(&f.db, &f.relay, &id, status_update(OrderStatus::Cancelled))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidInput(_)));
}

#[tokio::test]
async fn illegal_transitions_are_rejected() {
    let f = fixture();
    let crop = add_crop(&f, 10.0);
    let order = place(&f, crop, "4").await;
    let id = order.id.to_string();

    let err = apply_order_update(&f.db, &f.relay, &id, status_update(OrderStatus::Completed))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidInput(_)));

    apply_order_update(&f.db, &f.relay, &id, status_update(OrderStatus::Accepted))
        .await
        .unwrap();
    let err = apply_order_update(&f.db, &f.relay, &id, status_update(OrderStatus::Rejected))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidInput(_)));
}

#[tokio::test]
async fn plain_field_updates_have_no_side_effects() {
    let f = fixture();
    let crop = add_crop(&f, 10.0);
    let order = place(&f, crop, "4").await;

    let outcome = apply_order_update(
        &f.db,
        &f.relay,
        &order.id.to_string(),
        UpdateOrderRequest {
            quantity_ordered: Some("6".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    match outcome {
        OrderUpdateResponse::Updated { order } => {
            assert_eq!(order.quantity_ordered, "6");
            assert_eq!(order.status, OrderStatus::Pending);
        }
        other => panic!("expected update, got {other:?}"),
    }

    // stock untouched until acceptance
    let crop_row = f.db.get_crop(&crop.to_string()).unwrap().unwrap();
    assert_eq!(crop_row.quantity_kg, 10.0);
}

#[tokio::test]
async fn update_requires_at_least_one_field_and_a_known_id() {
    let f = fixture();

    let err = apply_order_update(
        &f.db,
        &f.relay,
        &Uuid::new_v4().to_string(),
        UpdateOrderRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MarketError::InvalidInput(_)));

    let err = apply_order_update(
        &f.db,
        &f.relay,
        &Uuid::new_v4().to_string(),
        status_update(OrderStatus::Cancelled),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MarketError::NotFound("order")));

    let err = apply_order_update(
        &f.db,
        &f.relay,
        "not-a-uuid",
        status_update(OrderStatus::Cancelled),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MarketError::NotFound("order")));
}
