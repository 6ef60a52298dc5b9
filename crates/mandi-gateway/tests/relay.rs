use std::sync::Arc;

use uuid::Uuid;

use mandi_db::Database;
use mandi_db::models::CropRow;
use mandi_gateway::dispatcher::Dispatcher;
use mandi_gateway::relay::ChatRelay;
use mandi_types::error::MarketError;
use mandi_types::events::GatewayEvent;
use mandi_types::models::{NotificationKind, Role};

struct Fixture {
    db: Arc<Database>,
    relay: ChatRelay,
    dispatcher: Dispatcher,
    farmer: Uuid,
    buyer: Uuid,
    crop: Uuid,
}

fn fixture() -> Fixture {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let dispatcher = Dispatcher::new();
    let relay = ChatRelay::new(db.clone(), dispatcher.clone());

    let farmer = add_user(&db, Role::Farmer);
    let buyer = add_user(&db, Role::Buyer);
    let crop = add_crop(&db, farmer);

    Fixture {
        db,
        relay,
        dispatcher,
        farmer,
        buyer,
        crop,
    }
}

fn add_user(db: &Database, role: Role) -> Uuid {
    let id = Uuid::new_v4();
    db.create_user(
        &id.to_string(),
        &format!("{}-{}", role.as_str(), &id.to_string()[..8]),
        &format!("{}@example.com", &id.to_string()[..8]),
        "hash",
        role.as_str(),
        "2026-08-01T08:00:00Z",
    )
    .unwrap();
    id
}

fn add_crop(db: &Database, seller: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    db.insert_crop(&CropRow {
        id: id.to_string(),
        name: "Basmati".into(),
        kind: "grain".into(),
        price_per_kg: 92.0,
        quantity_kg: 40.0,
        location: "Karnal".into(),
        seller_id: seller.to_string(),
        available: true,
        created_at: "2026-08-01T08:05:00Z".into(),
    })
    .unwrap();
    id
}

#[tokio::test]
async fn offline_receiver_sees_message_via_history() {
    let f = fixture();

    // farmer has no live connection
    let first = f
        .relay
        .send_message(f.buyer, f.farmer, "Is this week's harvest?", None, None, Some(f.crop))
        .await
        .unwrap();
    let second = f
        .relay
        .send_message(f.buyer, f.farmer, "I'd take 20 kg.", None, None, Some(f.crop))
        .await
        .unwrap();

    let history = f
        .relay
        .history(f.farmer, f.farmer, f.buyer, None, None, Some(f.crop))
        .await
        .unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, first.id);
    assert_eq!(history[1].id, second.id);
    assert!(history[0].created_at <= history[1].created_at);
}

#[tokio::test]
async fn send_without_discriminator_persists_nothing() {
    let f = fixture();

    let err = f
        .relay
        .send_message(f.buyer, f.farmer, "hello?", None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidInput(_)));

    // nothing reached storage
    let rows = f
        .db
        .unread_counts(&f.farmer.to_string())
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn same_role_and_self_chat_are_forbidden() {
    let f = fixture();
    let other_buyer = add_user(&f.db, Role::Buyer);

    let err = f
        .relay
        .send_message(f.buyer, other_buyer, "hey", None, None, Some(f.crop))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Forbidden(_)));

    let err = f
        .relay
        .send_message(f.buyer, f.buyer, "me again", None, None, Some(f.crop))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Forbidden(_)));
}

#[tokio::test]
async fn unknown_user_and_unknown_crop_are_not_found() {
    let f = fixture();

    let err = f
        .relay
        .send_message(f.buyer, Uuid::new_v4(), "hi", None, None, Some(f.crop))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::NotFound("user")));

    let err = f
        .relay
        .send_message(f.buyer, f.farmer, "hi", None, None, Some(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::NotFound("crop")));
}

#[tokio::test]
async fn delivery_targets_only_the_latest_channel() {
    let f = fixture();

    let (_old_conn, mut old_rx) = f.dispatcher.register(f.farmer).await;
    let (_new_conn, mut new_rx) = f.dispatcher.register(f.farmer).await;

    f.relay
        .send_message(f.buyer, f.farmer, "fresh stock?", None, None, Some(f.crop))
        .await
        .unwrap();

    let event = new_rx.try_recv().expect("latest channel gets the push");
    assert!(matches!(event, GatewayEvent::ReceiveMessage { .. }));
    assert!(old_rx.try_recv().is_err());
}

#[tokio::test]
async fn sender_receives_an_echo() {
    let f = fixture();

    let (_conn, mut buyer_rx) = f.dispatcher.register(f.buyer).await;

    let sent = f
        .relay
        .send_message(f.buyer, f.farmer, "ping", None, None, Some(f.crop))
        .await
        .unwrap();

    match buyer_rx.try_recv().unwrap() {
        GatewayEvent::ReceiveMessage { message } => assert_eq!(message.id, sent.id),
        other => panic!("expected echo, got {other:?}"),
    }
}

#[tokio::test]
async fn history_requires_a_participant() {
    let f = fixture();
    let stranger = add_user(&f.db, Role::Buyer);

    let err = f
        .relay
        .history(stranger, f.farmer, f.buyer, None, None, Some(f.crop))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Forbidden(_)));
}

#[tokio::test]
async fn typing_is_ephemeral_and_presence_gated() {
    let f = fixture();

    // offline: nothing happens, nothing stored
    f.relay.typing(f.buyer, f.farmer).await;

    let (_conn, mut farmer_rx) = f.dispatcher.register(f.farmer).await;
    f.relay.typing(f.buyer, f.farmer).await;

    match farmer_rx.try_recv().unwrap() {
        GatewayEvent::Typing { sender } => assert_eq!(sender, f.buyer),
        other => panic!("expected typing, got {other:?}"),
    }
}

#[tokio::test]
async fn clear_uses_first_present_discriminator() {
    let f = fixture();
    let order_id = Uuid::new_v4();

    f.relay
        .send_message(f.buyer, f.farmer, "about the crop", None, None, Some(f.crop))
        .await
        .unwrap();
    f.relay
        .send_message(f.buyer, f.farmer, "about the order", Some(order_id), None, None)
        .await
        .unwrap();

    // both discriminators supplied: order wins, crop thread survives
    let deleted = f
        .relay
        .clear(f.buyer, f.farmer, Some(order_id), None, Some(f.crop))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let crop_thread = f
        .relay
        .history(f.buyer, f.buyer, f.farmer, None, None, Some(f.crop))
        .await
        .unwrap();
    assert_eq!(crop_thread.len(), 1);

    let err = f
        .relay
        .clear(f.buyer, f.farmer, None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidInput(_)));
}

#[tokio::test]
async fn unread_counts_and_directional_mark_read() {
    let f = fixture();
    let other_buyer = add_user(&f.db, Role::Buyer);

    f.relay
        .send_message(f.buyer, f.farmer, "one", None, None, Some(f.crop))
        .await
        .unwrap();
    f.relay
        .send_message(f.buyer, f.farmer, "two", None, None, Some(f.crop))
        .await
        .unwrap();
    f.relay
        .send_message(other_buyer, f.farmer, "three", None, None, Some(f.crop))
        .await
        .unwrap();
    f.relay
        .send_message(f.farmer, f.buyer, "reply", None, None, Some(f.crop))
        .await
        .unwrap();

    let counts = f.relay.unread_counts(f.farmer).await.unwrap();
    assert_eq!(counts.get(&f.buyer), Some(&2));
    assert_eq!(counts.get(&other_buyer), Some(&1));

    assert_eq!(f.relay.mark_read(f.farmer, f.buyer).await.unwrap(), 2);

    let counts = f.relay.unread_counts(f.farmer).await.unwrap();
    assert_eq!(counts.get(&f.buyer), None);
    assert_eq!(counts.get(&other_buyer), Some(&1));

    // the farmer's reply to the buyer is still unread
    let history = f
        .relay
        .history(f.buyer, f.buyer, f.farmer, None, None, Some(f.crop))
        .await
        .unwrap();
    let reply = history.iter().find(|m| m.sender_id == f.farmer).unwrap();
    assert!(!reply.read);
}

#[tokio::test]
async fn notify_persists_and_pushes_when_online() {
    let f = fixture();

    // offline: persisted only
    f.relay
        .notify(f.farmer, Some(f.crop), None, NotificationKind::Other, "price updated")
        .await
        .unwrap();

    let (_conn, mut farmer_rx) = f.dispatcher.register(f.farmer).await;
    f.relay
        .notify(f.farmer, None, None, NotificationKind::Message, "new inquiry")
        .await
        .unwrap();

    match farmer_rx.try_recv().unwrap() {
        GatewayEvent::NewNotification { notification } => {
            assert_eq!(notification.message, "new inquiry");
        }
        other => panic!("expected notification, got {other:?}"),
    }

    let stored = f.db.list_notifications(&f.farmer.to_string()).unwrap();
    assert_eq!(stored.len(), 2);
}
