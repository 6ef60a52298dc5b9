use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use mandi_types::api::{Claims, CreateNotificationRequest};
use mandi_types::error::MarketError;

use crate::auth::AppState;
use crate::error::ApiResult;

pub async fn create_notification(
    State(state): State<AppState>,
    Json(req): Json<CreateNotificationRequest>,
) -> ApiResult<impl IntoResponse> {
    let notification = state
        .relay
        .notify(req.user, req.crop, req.order, req.kind, &req.message)
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

/// Notifications for the authenticated user, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let rows = state.db.list_notifications(&claims.sub.to_string())?;
    let notifications = rows
        .into_iter()
        .map(|row| row.into_notification())
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(notifications))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: Uuid = id
        .parse()
        .map_err(|_| MarketError::NotFound("notification"))?;
    if !state.db.mark_notification_read(&id.to_string())? {
        return Err(MarketError::NotFound("notification").into());
    }
    Ok(StatusCode::NO_CONTENT)
}
