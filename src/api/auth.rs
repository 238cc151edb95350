//! Registration and login endpoints

use axum::{Json, extract::State, http::StatusCode};

use super::dto::{LoginRequest, RegisterRequest};
use super::extract::AppJson;
use crate::AppState;
use crate::error::AppError;
use crate::service::AuthSession;

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    AppJson(request): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthSession>), AppError> {
    let session = state.accounts().register(request.into()).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<Json<AuthSession>, AppError> {
    let session = state
        .accounts()
        .login(&request.email, &request.password)
        .await?;
    Ok(Json(session))
}
