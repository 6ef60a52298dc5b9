//! Order lifecycle: creation, status transitions with their inventory and
//! notification side effects, and listings.
//!
//! Transitions: pending → accepted | rejected | cancelled,
//! accepted → delivered | cancelled, delivered → completed. Rejected and
//! cancelled orders are deleted outright; completed orders are kept.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use mandi_db::Database;
use mandi_db::models::OrderRow;
use mandi_gateway::relay::ChatRelay;
use mandi_gateway::scope;
use mandi_types::api::{
    Claims, ClearOrdersResponse, CreateOrderRequest, OrderListQuery, OrderUpdateResponse,
    UpdateOrderRequest,
};
use mandi_types::error::{MarketError, MarketResult};
use mandi_types::models::{NotificationKind, Order, OrderStatus};

use crate::auth::AppState;
use crate::error::ApiResult;

// -- Handlers --

pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<impl IntoResponse> {
    let order = place_order(&state.db, &state.relay, &claims, req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrderRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = apply_order_update(&state.db, &state.relay, &id, req).await?;
    Ok(Json(outcome))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<impl IntoResponse> {
    let buyer = query.buyer.map(|id| id.to_string());
    let status = query.status.map(|s| s.as_str());
    let rows = state.db.list_orders(buyer.as_deref(), status)?;
    let orders = rows
        .into_iter()
        .map(|row| row.into_order())
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(orders))
}

pub async fn list_orders_for_farmer(
    State(state): State<AppState>,
    Path(farmer_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let farmer_id = scope::parse_user_id(&farmer_id)?;
    let rows = state.db.list_orders_for_farmer(&farmer_id.to_string())?;
    let orders = rows
        .into_iter()
        .map(|row| row.into_order())
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(orders))
}

/// Unconditional bulk delete. Destructive and not scoped to a user, so it
/// sits behind authentication and is loud in the log.
pub async fn clear_all_orders(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let deleted = state.db.delete_all_orders()?;
    warn!("cleared all orders ({deleted} deleted)");
    Ok(Json(ClearOrdersResponse { deleted }))
}

// -- Core operations --

pub async fn place_order(
    db: &Database,
    relay: &ChatRelay,
    claims: &Claims,
    req: CreateOrderRequest,
) -> MarketResult<Order> {
    if req.quantity_ordered.trim().is_empty() || req.address.trim().is_empty() {
        return Err(MarketError::invalid("all fields are required"));
    }
    if req.proposed_price <= 0.0 {
        return Err(MarketError::invalid("proposed price must be positive"));
    }

    let crop = db
        .get_crop(&req.crop.to_string())?
        .ok_or(MarketError::NotFound("crop"))?;
    let crop = crop.into_crop()?;

    let order = Order {
        id: Uuid::new_v4(),
        buyer_id: claims.sub,
        farmer_id: crop.seller_id,
        crop_id: crop.id,
        quantity_ordered: req.quantity_ordered,
        proposed_price: req.proposed_price,
        address: req.address,
        status: OrderStatus::Pending,
        rejection_reason: None,
        created_at: Utc::now(),
    };
    db.insert_order(&order_row(&order))?;

    info!("order {} placed by {} for crop {}", order.id, claims.sub, crop.id);

    // let the farmer know without waiting for a poll
    let notice = format!(
        "New order: {} kg of {} at ₹{}/kg from {}",
        order.quantity_ordered, crop.name, order.proposed_price, claims.username
    );
    relay
        .notify(
            crop.seller_id,
            Some(crop.id),
            Some(order.id),
            NotificationKind::OrderPlaced,
            &notice,
        )
        .await?;

    Ok(order)
}

pub async fn apply_order_update(
    db: &Database,
    relay: &ChatRelay,
    id_raw: &str,
    req: UpdateOrderRequest,
) -> MarketResult<OrderUpdateResponse> {
    let id: Uuid = id_raw.parse().map_err(|_| MarketError::NotFound("order"))?;
    if req.quantity_ordered.is_none() && req.status.is_none() && req.reason.is_none() {
        return Err(MarketError::invalid(
            "at least one of quantity_ordered, status, or reason is required",
        ));
    }

    let order = fetch_order(db, id)?;

    let Some(next) = req.status else {
        // plain field update, no side effects
        db.update_order(
            &id.to_string(),
            req.quantity_ordered.as_deref(),
            None,
            req.reason.as_deref(),
        )?;
        return Ok(OrderUpdateResponse::Updated {
            order: fetch_order(db, id)?,
        });
    };

    if !order.status.can_transition(next) {
        return Err(MarketError::invalid(format!(
            "cannot move a {} order to {}",
            order.status.as_str(),
            next.as_str()
        )));
    }

    match next {
        OrderStatus::Accepted => accept(db, &order, req).await,
        OrderStatus::Rejected => reject(db, relay, &order, req).await,
        OrderStatus::Cancelled => {
            db.delete_order(&id.to_string())?;
            info!("order {} cancelled and removed", id);
            Ok(OrderUpdateResponse::Removed { order_id: id })
        }
        _ => {
            db.update_order(
                &id.to_string(),
                req.quantity_ordered.as_deref(),
                Some(next.as_str()),
                req.reason.as_deref(),
            )?;
            Ok(OrderUpdateResponse::Updated {
                order: fetch_order(db, id)?,
            })
        }
    }
}

/// Accepting deducts stock. The quantity must parse as a positive integer;
/// a quantity exceeding the stock clamps it to zero rather than failing.
/// Crop and order commit in one transaction.
async fn accept(
    db: &Database,
    order: &Order,
    req: UpdateOrderRequest,
) -> MarketResult<OrderUpdateResponse> {
    let crop = db
        .get_crop(&order.crop_id.to_string())?
        .ok_or(MarketError::NotFound("crop"))?;

    let quantity_raw = req
        .quantity_ordered
        .as_deref()
        .unwrap_or(&order.quantity_ordered);
    let quantity: i64 = quantity_raw
        .trim()
        .parse()
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| MarketError::invalid("ordered quantity must be a positive integer"))?;

    let remaining = (crop.quantity_kg - quantity as f64).max(0.0);
    let available = remaining > 0.0;

    db.accept_order(
        &order.id.to_string(),
        req.quantity_ordered.as_deref(),
        &crop.id,
        remaining,
        available,
    )?;

    if !available {
        info!("crop {} sold out after order {}", crop.id, order.id);
    }

    Ok(OrderUpdateResponse::Updated {
        order: fetch_order(db, order.id)?,
    })
}

/// Rejection notifies the buyer with the full context, then removes the
/// order row. The notification is written first so it survives the delete.
async fn reject(
    db: &Database,
    relay: &ChatRelay,
    order: &Order,
    req: UpdateOrderRequest,
) -> MarketResult<OrderUpdateResponse> {
    let farmer_name = db
        .get_user_by_id(&order.farmer_id.to_string())?
        .map(|u| u.username)
        .unwrap_or_else(|| "Farmer".to_string());
    let crop_name = db
        .get_crop(&order.crop_id.to_string())?
        .map(|c| c.name)
        .unwrap_or_default();
    let reason = req
        .reason
        .or_else(|| order.rejection_reason.clone())
        .unwrap_or_else(|| "No reason provided.".to_string());

    let notice = format!(
        "Your order for {} kg of {} at ₹{}/kg was rejected by {}. Reason: {}",
        order.quantity_ordered, crop_name, order.proposed_price, farmer_name, reason
    );
    relay
        .notify(
            order.buyer_id,
            Some(order.crop_id),
            Some(order.id),
            NotificationKind::OrderRejected,
            &notice,
        )
        .await?;

    db.delete_order(&order.id.to_string())?;
    info!("order {} rejected and removed", order.id);

    Ok(OrderUpdateResponse::Removed { order_id: order.id })
}

fn fetch_order(db: &Database, id: Uuid) -> MarketResult<Order> {
    let row = db
        .get_order(&id.to_string())?
        .ok_or(MarketError::NotFound("order"))?;
    Ok(row.into_order()?)
}

fn order_row(order: &Order) -> OrderRow {
    OrderRow {
        id: order.id.to_string(),
        buyer_id: order.buyer_id.to_string(),
        farmer_id: order.farmer_id.to_string(),
        crop_id: order.crop_id.to_string(),
        quantity_ordered: order.quantity_ordered.clone(),
        proposed_price: order.proposed_price,
        address: order.address.clone(),
        status: order.status.as_str().to_string(),
        rejection_reason: order.rejection_reason.clone(),
        created_at: order.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
    }
}
