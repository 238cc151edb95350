//! Comment endpoints

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use super::dto::CommentRequest;
use super::extract::{AppJson, AppPath};
use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::error::AppError;
use crate::service::CommentView;

/// GET /api/posts/:id/comments
pub async fn list(
    State(state): State<AppState>,
    viewer: MaybeUser,
    AppPath(post_id): AppPath<i64>,
) -> Result<Json<Vec<CommentView>>, AppError> {
    Ok(Json(state.posts().comments(post_id, viewer.id()).await?))
}

/// POST /api/posts/:id/comments
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(post_id): AppPath<i64>,
    AppJson(request): AppJson<CommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), AppError> {
    let comment = state
        .posts()
        .add_comment(post_id, user.id(), &request.text, request.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// DELETE /api/comments/:id
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(comment_id): AppPath<i64>,
) -> Result<Json<Value>, AppError> {
    state.posts().delete_comment(comment_id, user.id()).await?;
    Ok(Json(json!({ "success": true })))
}
