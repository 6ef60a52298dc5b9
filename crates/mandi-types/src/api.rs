use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{NotificationKind, Order, OrderStatus, Role};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the WebSocket gateway's
/// Identify handshake. Canonical definition lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub token: String,
}

// -- Crops --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCropRequest {
    pub name: String,
    pub kind: String,
    pub price_per_kg: f64,
    pub quantity_kg: f64,
    pub location: String,
}

// -- Orders --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub crop: Uuid,
    pub quantity_ordered: String,
    pub proposed_price: f64,
    pub address: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateOrderRequest {
    pub quantity_ordered: Option<String>,
    pub status: Option<OrderStatus>,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub buyer: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

/// An update either leaves the order in place or removes the row
/// (rejected and cancelled orders are deleted, not archived).
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OrderUpdateResponse {
    Updated { order: Order },
    Removed { order_id: Uuid },
}

#[derive(Debug, Serialize)]
pub struct ClearOrdersResponse {
    pub deleted: usize,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub receiver: Uuid,
    pub content: String,
    pub crop_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub cart_item_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub crop_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub cart_item_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClearMessagesRequest {
    pub user_id: Uuid,
    pub other_user_id: Uuid,
    pub order_id: Option<Uuid>,
    pub cart_item_id: Option<String>,
    pub crop_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ClearMessagesResponse {
    pub deleted: usize,
}

// -- Notifications --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateNotificationRequest {
    pub user: Uuid,
    pub crop: Option<Uuid>,
    pub order: Option<Uuid>,
    pub kind: NotificationKind,
    pub message: String,
}
