//! REST front for the chat relay. All conversation rules (role pairing,
//! scope selection, persist-before-deliver) live in the relay; handlers
//! only adapt transport.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use mandi_gateway::scope;
use mandi_types::api::{
    Claims, ClearMessagesRequest, ClearMessagesResponse, HistoryQuery, SendMessageRequest,
};

use crate::auth::AppState;
use crate::error::ApiResult;

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let message = state
        .relay
        .send_message(
            claims.sub,
            req.receiver,
            &req.content,
            req.order_id,
            req.cart_item_id,
            req.crop_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path((user_id, other_user_id)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user_id = scope::parse_user_id(&user_id)?;
    let other_user_id = scope::parse_user_id(&other_user_id)?;

    let messages = state
        .relay
        .history(
            claims.sub,
            user_id,
            other_user_id,
            query.order_id,
            query.cart_item_id,
            query.crop_id,
        )
        .await?;
    Ok(Json(messages))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path((farmer_id, buyer_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let farmer_id = scope::parse_user_id(&farmer_id)?;
    let buyer_id = scope::parse_user_id(&buyer_id)?;

    state.relay.mark_read(farmer_id, buyer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unread_counts(
    State(state): State<AppState>,
    Path(farmer_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let farmer_id = scope::parse_user_id(&farmer_id)?;
    let counts = state.relay.unread_counts(farmer_id).await?;
    Ok(Json(counts))
}

pub async fn clear_messages(
    State(state): State<AppState>,
    Json(req): Json<ClearMessagesRequest>,
) -> ApiResult<impl IntoResponse> {
    let deleted = state
        .relay
        .clear(
            req.user_id,
            req.other_user_id,
            req.order_id,
            req.cart_item_id,
            req.crop_id,
        )
        .await?;
    Ok(Json(ClearMessagesResponse { deleted }))
}
