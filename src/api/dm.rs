//! Direct message endpoints
//!
//! Conversations are addressed by the other participant's id.

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use super::dto::{PageParams, SendMessageRequest};
use super::extract::{AppJson, AppPath, AppQuery};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::{ConversationView, MessagePage};

/// GET /api/dm
pub async fn conversations(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ConversationView>>, AppError> {
    Ok(Json(state.messaging().conversations(user.id()).await?))
}

/// GET /api/dm/:user_id/messages
pub async fn messages(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(other_id): AppPath<i64>,
    AppQuery(params): AppQuery<PageParams>,
) -> Result<Json<MessagePage>, AppError> {
    let page = state
        .messaging()
        .messages(user.id(), other_id, params.page(50, 100))
        .await?;
    Ok(Json(page))
}

/// POST /api/dm/:user_id/messages
pub async fn send(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(recipient_id): AppPath<i64>,
    AppJson(request): AppJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let message = state
        .messaging()
        .send(user.id(), recipient_id, &request.content)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": message })),
    ))
}

/// POST /api/dm/:user_id/read
pub async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(other_id): AppPath<i64>,
) -> Result<Json<Value>, AppError> {
    let updated = state.messaging().mark_read(user.id(), other_id).await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

/// DELETE /api/dm/messages/:id
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(message_id): AppPath<i64>,
) -> Result<Json<Value>, AppError> {
    state.messaging().delete(user.id(), message_id).await?;
    Ok(Json(json!({ "success": true })))
}
