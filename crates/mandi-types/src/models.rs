use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Only these two roles exist; every conversation pairs one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Farmer,
    Buyer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "farmer",
            Role::Buyer => "buyer",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "farmer" => Some(Role::Farmer),
            "buyer" => Some(Role::Buyer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crop {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub price_per_kg: f64,
    pub quantity_kg: f64,
    pub location: String,
    pub seller_id: Uuid,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

/// Order lifecycle states. `Rejected` and `Cancelled` are terminal by
/// deletion — the row is removed rather than kept in that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Delivered,
    Completed,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "accepted" => Some(OrderStatus::Accepted),
            "delivered" => Some(OrderStatus::Delivered),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            "rejected" => Some(OrderStatus::Rejected),
            _ => None,
        }
    }

    /// Whether an order may move from `self` to `next`.
    pub fn can_transition(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Accepted, Delivered)
                | (Accepted, Cancelled)
                | (Delivered, Completed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub farmer_id: Uuid,
    pub crop_id: Uuid,
    /// Kept as submitted; parsed as a positive integer only when the
    /// farmer accepts and stock is adjusted.
    pub quantity_ordered: String,
    pub proposed_price: f64,
    pub address: String,
    pub status: OrderStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The discriminator that partitions a conversation between two users.
/// A message carries exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ChatScope {
    Order(Uuid),
    CartItem(String),
    Crop(Uuid),
}

impl ChatScope {
    /// Picks the first present discriminator, in order → cart item → crop
    /// priority. Never a union of several.
    pub fn from_parts(
        order_id: Option<Uuid>,
        cart_item_id: Option<String>,
        crop_id: Option<Uuid>,
    ) -> Option<ChatScope> {
        if let Some(id) = order_id {
            Some(ChatScope::Order(id))
        } else if let Some(id) = cart_item_id {
            Some(ChatScope::CartItem(id))
        } else {
            crop_id.map(ChatScope::Crop)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub crop_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub cart_item_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderPlaced,
    OrderRejected,
    Message,
    Other,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OrderPlaced => "order_placed",
            NotificationKind::OrderRejected => "order_rejected",
            NotificationKind::Message => "message",
            NotificationKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<NotificationKind> {
        match s {
            "order_placed" => Some(NotificationKind::OrderPlaced),
            "order_rejected" => Some(NotificationKind::OrderRejected),
            "message" => Some(NotificationKind::Message),
            "other" => Some(NotificationKind::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub crop_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_fans_out_to_three_states() {
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Accepted));
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Rejected));
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Cancelled));
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Completed));
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Delivered));
    }

    #[test]
    fn completed_is_terminal() {
        for next in [
            OrderStatus::Pending,
            OrderStatus::Accepted,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Rejected,
        ] {
            assert!(!OrderStatus::Completed.can_transition(next));
        }
    }

    #[test]
    fn accepted_can_only_deliver_or_cancel() {
        assert!(OrderStatus::Accepted.can_transition(OrderStatus::Delivered));
        assert!(OrderStatus::Accepted.can_transition(OrderStatus::Cancelled));
        assert!(!OrderStatus::Accepted.can_transition(OrderStatus::Rejected));
        assert!(!OrderStatus::Accepted.can_transition(OrderStatus::Pending));
    }

    #[test]
    fn scope_priority_is_order_then_cart_item_then_crop() {
        let order = Uuid::new_v4();
        let crop = Uuid::new_v4();

        let scope = ChatScope::from_parts(Some(order), Some("li-1".into()), Some(crop));
        assert_eq!(scope, Some(ChatScope::Order(order)));

        let scope = ChatScope::from_parts(None, Some("li-1".into()), Some(crop));
        assert_eq!(scope, Some(ChatScope::CartItem("li-1".into())));

        let scope = ChatScope::from_parts(None, None, Some(crop));
        assert_eq!(scope, Some(ChatScope::Crop(crop)));

        assert_eq!(ChatScope::from_parts(None, None, None), None);
    }
}
