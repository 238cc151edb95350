//! Profile, follow and block endpoints

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use super::dto::{ChangeEmailRequest, ChangePasswordRequest, PageParams, UpdateProfileRequest};
use super::extract::{AppJson, AppPath, AppQuery};
use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::data::UserSummary;
use crate::error::AppError;
use crate::service::{BlockStatus, FollowOutcome, MeView, ProfileView};

/// GET /api/users/me
pub async fn me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<MeView>, AppError> {
    Ok(Json(state.accounts().me(user.id()).await?))
}

/// PATCH /api/users/me
pub async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(request): AppJson<UpdateProfileRequest>,
) -> Result<Json<MeView>, AppError> {
    let me = state
        .accounts()
        .update_profile(user.id(), request.into())
        .await?;
    Ok(Json(me))
}

/// PATCH /api/users/me/email
pub async fn change_email(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(request): AppJson<ChangeEmailRequest>,
) -> Result<Json<MeView>, AppError> {
    let me = state
        .accounts()
        .change_email(user.id(), &request.new_email, &request.password)
        .await?;
    Ok(Json(me))
}

/// PATCH /api/users/me/password
pub async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(request): AppJson<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .accounts()
        .change_password(user.id(), &request.current_password, &request.new_password)
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /api/users/:user
///
/// `:user` is a username here.
pub async fn profile(
    State(state): State<AppState>,
    viewer: MaybeUser,
    AppPath(username): AppPath<String>,
    AppQuery(params): AppQuery<PageParams>,
) -> Result<Json<ProfileView>, AppError> {
    let profile = state
        .accounts()
        .profile(&username, viewer.id(), params.page(20, 50))
        .await?;
    Ok(Json(profile))
}

/// POST /api/users/:user/follow
pub async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(target_id): AppPath<i64>,
) -> Result<(StatusCode, Json<FollowOutcome>), AppError> {
    let outcome = state.accounts().follow(user.id(), target_id).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// DELETE /api/users/:user/follow
pub async fn unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(target_id): AppPath<i64>,
) -> Result<Json<Value>, AppError> {
    let followers_count = state.accounts().unfollow(user.id(), target_id).await?;
    Ok(Json(json!({ "success": true, "followers_count": followers_count })))
}

/// GET /api/users/me/requests
pub async fn follow_requests(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    Ok(Json(state.accounts().follow_requests(user.id()).await?))
}

/// POST /api/users/requests/:id/approve
pub async fn approve_request(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(requester_id): AppPath<i64>,
) -> Result<Json<Value>, AppError> {
    state
        .accounts()
        .approve_request(user.id(), requester_id)
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/users/requests/:id/reject
pub async fn reject_request(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(requester_id): AppPath<i64>,
) -> Result<Json<Value>, AppError> {
    state
        .accounts()
        .reject_request(user.id(), requester_id)
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /api/users/:user/block
pub async fn block_status(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(other_id): AppPath<i64>,
) -> Result<Json<BlockStatus>, AppError> {
    Ok(Json(state.accounts().block_status(user.id(), other_id).await?))
}

/// POST /api/users/:user/block
pub async fn block(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(other_id): AppPath<i64>,
) -> Result<Json<BlockStatus>, AppError> {
    Ok(Json(state.accounts().block(user.id(), other_id).await?))
}

/// DELETE /api/users/:user/block
pub async fn unblock(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(other_id): AppPath<i64>,
) -> Result<Json<BlockStatus>, AppError> {
    Ok(Json(state.accounts().unblock(user.id(), other_id).await?))
}
