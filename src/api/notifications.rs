//! Notification endpoints

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::NotificationView;

/// GET /api/notifications
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<NotificationView>>, AppError> {
    Ok(Json(state.notifications().list(user.id()).await?))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    let count = state.notifications().unread_count(user.id()).await?;
    Ok(Json(json!({ "count": count })))
}

/// POST /api/notifications/mark-read
pub async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    state.notifications().mark_read(user.id()).await?;
    Ok(Json(json!({ "success": true })))
}
