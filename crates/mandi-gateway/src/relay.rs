use std::collections::HashMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::debug;
use uuid::Uuid;

use mandi_db::Database;
use mandi_db::models::{MessageRow, NotificationRow};
use mandi_types::error::{MarketError, MarketResult};
use mandi_types::events::GatewayEvent;
use mandi_types::models::{ChatMessage, ChatScope, Notification, NotificationKind};

use crate::dispatcher::Dispatcher;
use crate::scope;

/// Persists chat traffic and notifications, then pushes them to whoever is
/// online. Storage always happens before any delivery attempt; delivery is
/// best-effort and never queued.
#[derive(Clone)]
pub struct ChatRelay {
    db: Arc<Database>,
    dispatcher: Dispatcher,
}

impl ChatRelay {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher) -> Self {
        Self { db, dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn send_message(
        &self,
        sender: Uuid,
        receiver: Uuid,
        content: &str,
        order_id: Option<Uuid>,
        cart_item_id: Option<String>,
        crop_id: Option<Uuid>,
    ) -> MarketResult<ChatMessage> {
        if content.trim().is_empty() {
            return Err(MarketError::invalid("message content is required"));
        }
        scope::resolve_pair(&self.db, sender, receiver)?;
        let scope = scope::resolve_scope(&self.db, order_id, cart_item_id, crop_id)?;

        let message = build_message(sender, receiver, content, &scope);

        // durability precedes delivery
        self.db.insert_message(&message_row(&message))?;

        let delivered = self
            .dispatcher
            .send_to_user(
                receiver,
                GatewayEvent::ReceiveMessage {
                    message: message.clone(),
                },
            )
            .await;
        if !delivered {
            debug!("receiver {} offline, message kept for history", receiver);
        }

        // echo back so the sender's UI can confirm without a refetch
        self.dispatcher
            .send_to_user(
                sender,
                GatewayEvent::ReceiveMessage {
                    message: message.clone(),
                },
            )
            .await;

        Ok(message)
    }

    /// Ephemeral: nothing is stored and nothing is sent unless the
    /// receiver is online right now.
    pub async fn typing(&self, sender: Uuid, receiver: Uuid) {
        self.dispatcher
            .send_to_user(receiver, GatewayEvent::Typing { sender })
            .await;
    }

    pub async fn history(
        &self,
        requester: Uuid,
        user_id: Uuid,
        other_user_id: Uuid,
        order_id: Option<Uuid>,
        cart_item_id: Option<String>,
        crop_id: Option<Uuid>,
    ) -> MarketResult<Vec<ChatMessage>> {
        if requester != user_id && requester != other_user_id {
            return Err(MarketError::forbidden(
                "only a participant may read this conversation",
            ));
        }
        scope::resolve_pair(&self.db, user_id, other_user_id)?;
        let scope = scope::resolve_scope(&self.db, order_id, cart_item_id, crop_id)?;

        let rows = self
            .db
            .messages_between(&user_id.to_string(), &other_user_id.to_string(), &scope)?;
        let messages = rows
            .into_iter()
            .map(|row| row.into_message())
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(messages)
    }

    /// Deletes the pair's messages matching the first present
    /// discriminator (order, then cart item, then crop).
    pub async fn clear(
        &self,
        user_id: Uuid,
        other_user_id: Uuid,
        order_id: Option<Uuid>,
        cart_item_id: Option<String>,
        crop_id: Option<Uuid>,
    ) -> MarketResult<usize> {
        let scope = ChatScope::from_parts(order_id, cart_item_id, crop_id).ok_or_else(|| {
            MarketError::invalid("one of order_id, cart_item_id, or crop_id is required")
        })?;
        let deleted = self.db.delete_messages_between(
            &user_id.to_string(),
            &other_user_id.to_string(),
            &scope,
        )?;
        Ok(deleted)
    }

    /// Flips buyer → farmer messages to read. The reverse direction is
    /// not this operation's concern.
    pub async fn mark_read(&self, farmer_id: Uuid, buyer_id: Uuid) -> MarketResult<usize> {
        let changed = self
            .db
            .mark_messages_read(&farmer_id.to_string(), &buyer_id.to_string())?;
        Ok(changed)
    }

    /// One count per sender, summed across every conversation scope.
    pub async fn unread_counts(&self, farmer_id: Uuid) -> MarketResult<HashMap<Uuid, i64>> {
        let rows = self.db.unread_counts(&farmer_id.to_string())?;
        let mut counts = HashMap::with_capacity(rows.len());
        for (sender, count) in rows {
            let sender: Uuid = sender
                .parse()
                .map_err(|e| anyhow::anyhow!("bad sender id '{sender}': {e}"))?;
            counts.insert(sender, count);
        }
        Ok(counts)
    }

    /// Persists a notification, then pushes it if the target is online;
    /// otherwise it waits for the next poll.
    pub async fn notify(
        &self,
        user: Uuid,
        crop: Option<Uuid>,
        order: Option<Uuid>,
        kind: NotificationKind,
        message: &str,
    ) -> MarketResult<Notification> {
        if message.trim().is_empty() {
            return Err(MarketError::invalid("notification message is required"));
        }

        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: user,
            crop_id: crop,
            order_id: order,
            kind,
            message: message.to_string(),
            read: false,
            created_at: Utc::now(),
        };
        self.db.insert_notification(&notification_row(&notification))?;

        self.dispatcher
            .send_to_user(
                user,
                GatewayEvent::NewNotification {
                    notification: notification.clone(),
                },
            )
            .await;

        Ok(notification)
    }
}

fn build_message(sender: Uuid, receiver: Uuid, content: &str, scope: &ChatScope) -> ChatMessage {
    let (crop_id, order_id, cart_item_id) = match scope {
        ChatScope::Order(id) => (None, Some(*id), None),
        ChatScope::CartItem(id) => (None, None, Some(id.clone())),
        ChatScope::Crop(id) => (Some(*id), None, None),
    };
    ChatMessage {
        id: Uuid::new_v4(),
        sender_id: sender,
        receiver_id: receiver,
        content: content.to_string(),
        crop_id,
        order_id,
        cart_item_id,
        read: false,
        created_at: Utc::now(),
    }
}

fn message_row(msg: &ChatMessage) -> MessageRow {
    MessageRow {
        id: msg.id.to_string(),
        sender_id: msg.sender_id.to_string(),
        receiver_id: msg.receiver_id.to_string(),
        content: msg.content.clone(),
        crop_id: msg.crop_id.map(|id| id.to_string()),
        order_id: msg.order_id.map(|id| id.to_string()),
        cart_item_id: msg.cart_item_id.clone(),
        read: msg.read,
        created_at: msg.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
    }
}

fn notification_row(n: &Notification) -> NotificationRow {
    NotificationRow {
        id: n.id.to_string(),
        user_id: n.user_id.to_string(),
        crop_id: n.crop_id.map(|id| id.to_string()),
        order_id: n.order_id.map(|id| id.to_string()),
        kind: n.kind.as_str().to_string(),
        message: n.message.clone(),
        read: n.read,
        created_at: n.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
    }
}
