//! Search endpoints

use axum::{Json, extract::State};

use super::dto::SearchParams;
use super::extract::AppQuery;
use crate::AppState;
use crate::auth::MaybeUser;
use crate::data::UserSummary;
use crate::error::AppError;
use crate::service::{PostView, clamp_limit};

/// GET /api/search/users
pub async fn users(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<SearchParams>,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    let limit = clamp_limit(params.limit, 8, 25);
    Ok(Json(state.feed().search_users(&params.q, limit).await?))
}

/// GET /api/search/posts
pub async fn posts(
    State(state): State<AppState>,
    viewer: MaybeUser,
    AppQuery(params): AppQuery<SearchParams>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let limit = clamp_limit(params.limit, 12, 50);
    let posts = state
        .feed()
        .search_posts(viewer.id(), &params.q, limit)
        .await?;
    Ok(Json(posts))
}
