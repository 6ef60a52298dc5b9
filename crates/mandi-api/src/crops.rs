//! Minimal crop surface: enough for farmers to list produce and for the
//! order and chat paths to resolve it. Images, ratings, and the rest of
//! the catalog features live elsewhere.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use mandi_db::models::CropRow;
use mandi_types::api::{Claims, CreateCropRequest};
use mandi_types::error::MarketError;
use mandi_types::models::{Crop, Role};

use crate::auth::AppState;
use crate::error::ApiResult;

pub async fn create_crop(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCropRequest>,
) -> ApiResult<impl IntoResponse> {
    if claims.role != Role::Farmer {
        return Err(MarketError::forbidden("only farmers can list crops").into());
    }
    if req.name.trim().is_empty() || req.kind.trim().is_empty() || req.location.trim().is_empty() {
        return Err(MarketError::invalid("name, kind, and location are required").into());
    }
    if req.price_per_kg <= 0.0 || req.quantity_kg <= 0.0 {
        return Err(MarketError::invalid("price and quantity must be positive").into());
    }

    let crop = Crop {
        id: Uuid::new_v4(),
        name: req.name,
        kind: req.kind,
        price_per_kg: req.price_per_kg,
        quantity_kg: req.quantity_kg,
        location: req.location,
        seller_id: claims.sub,
        available: true,
        created_at: Utc::now(),
    };

    state.db.insert_crop(&CropRow {
        id: crop.id.to_string(),
        name: crop.name.clone(),
        kind: crop.kind.clone(),
        price_per_kg: crop.price_per_kg,
        quantity_kg: crop.quantity_kg,
        location: crop.location.clone(),
        seller_id: crop.seller_id.to_string(),
        available: crop.available,
        created_at: crop.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
    })?;

    Ok((StatusCode::CREATED, Json(crop)))
}

pub async fn list_crops(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let rows = state.db.list_available_crops()?;
    let crops = rows
        .into_iter()
        .map(|row| row.into_crop())
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(crops))
}

pub async fn get_crop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: Uuid = id.parse().map_err(|_| MarketError::NotFound("crop"))?;
    let row = state
        .db
        .get_crop(&id.to_string())?
        .ok_or(MarketError::NotFound("crop"))?;
    Ok(Json(row.into_crop()?))
}
