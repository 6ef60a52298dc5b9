//! Database row types — these map directly to SQLite rows.
//! Distinct from the mandi-types API models to keep the storage layer
//! independent; `into_*` conversions validate ids and timestamps.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use mandi_types::models::{
    ChatMessage, Crop, Notification, NotificationKind, Order, OrderStatus, Role, User,
};
use uuid::Uuid;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub created_at: String,
}

pub struct CropRow {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub price_per_kg: f64,
    pub quantity_kg: f64,
    pub location: String,
    pub seller_id: String,
    pub available: bool,
    pub created_at: String,
}

pub struct OrderRow {
    pub id: String,
    pub buyer_id: String,
    pub farmer_id: String,
    pub crop_id: String,
    pub quantity_ordered: String,
    pub proposed_price: f64,
    pub address: String,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub crop_id: Option<String>,
    pub order_id: Option<String>,
    pub cart_item_id: Option<String>,
    pub read: bool,
    pub created_at: String,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub crop_id: Option<String>,
    pub order_id: Option<String>,
    pub kind: String,
    pub message: String,
    pub read: bool,
    pub created_at: String,
}

/// SQLite's `datetime('now')` default stores "YYYY-MM-DD HH:MM:SS" without
/// a timezone; rows written by this crate carry RFC 3339. Accept both.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("bad timestamp '{raw}'"))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("bad id '{raw}'"))
}

fn parse_opt_id(raw: &Option<String>) -> Result<Option<Uuid>> {
    raw.as_deref().map(parse_id).transpose()
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id)?,
            role: Role::parse(&self.role).ok_or_else(|| anyhow!("bad role '{}'", self.role))?,
            username: self.username,
            email: self.email,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl CropRow {
    pub fn into_crop(self) -> Result<Crop> {
        Ok(Crop {
            id: parse_id(&self.id)?,
            seller_id: parse_id(&self.seller_id)?,
            name: self.name,
            kind: self.kind,
            price_per_kg: self.price_per_kg,
            quantity_kg: self.quantity_kg,
            location: self.location,
            available: self.available,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl OrderRow {
    pub fn into_order(self) -> Result<Order> {
        Ok(Order {
            id: parse_id(&self.id)?,
            buyer_id: parse_id(&self.buyer_id)?,
            farmer_id: parse_id(&self.farmer_id)?,
            crop_id: parse_id(&self.crop_id)?,
            status: OrderStatus::parse(&self.status)
                .ok_or_else(|| anyhow!("bad order status '{}'", self.status))?,
            quantity_ordered: self.quantity_ordered,
            proposed_price: self.proposed_price,
            address: self.address,
            rejection_reason: self.rejection_reason,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl MessageRow {
    pub fn into_message(self) -> Result<ChatMessage> {
        Ok(ChatMessage {
            id: parse_id(&self.id)?,
            sender_id: parse_id(&self.sender_id)?,
            receiver_id: parse_id(&self.receiver_id)?,
            crop_id: parse_opt_id(&self.crop_id)?,
            order_id: parse_opt_id(&self.order_id)?,
            cart_item_id: self.cart_item_id,
            content: self.content,
            read: self.read,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl NotificationRow {
    pub fn into_notification(self) -> Result<Notification> {
        Ok(Notification {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            crop_id: parse_opt_id(&self.crop_id)?,
            order_id: parse_opt_id(&self.order_id)?,
            kind: NotificationKind::parse(&self.kind)
                .ok_or_else(|| anyhow!("bad notification kind '{}'", self.kind))?,
            message: self.message,
            read: self.read,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}
