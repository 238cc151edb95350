//! Post endpoints: feed, explore, trends, likes, saves and polls

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use super::dto::{ExploreParams, PageParams, TrendsParams, UpdatePostRequest, VoteRequest};
use super::extract::{AppJson, AppPath, AppQuery};
use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::error::AppError;
use crate::service::{Page, PollResults, PostDraft, PostView, Trends, clamp_limit};

const PAGE_LIMIT: i64 = 20;
const PAGE_LIMIT_MAX: i64 = 50;

/// GET /api/posts
pub async fn feed(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(params): AppQuery<PageParams>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let posts = state
        .feed()
        .home(user.id(), params.page(PAGE_LIMIT, PAGE_LIMIT_MAX))
        .await?;
    Ok(Json(posts))
}

/// POST /api/posts
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(draft): AppJson<PostDraft>,
) -> Result<(StatusCode, Json<PostView>), AppError> {
    let post = state.posts().create(user.id(), draft).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/posts/explore
pub async fn explore(
    State(state): State<AppState>,
    viewer: MaybeUser,
    AppQuery(params): AppQuery<ExploreParams>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let page = Page::new(params.page, params.limit, PAGE_LIMIT, PAGE_LIMIT_MAX);
    let posts = state
        .feed()
        .explore(viewer.id(), params.tag.as_deref(), page)
        .await?;
    Ok(Json(posts))
}

/// GET /api/posts/trends
pub async fn trends(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<TrendsParams>,
) -> Result<Json<Trends>, AppError> {
    let limit = clamp_limit(params.limit, 10, 20);
    let days = params.days.unwrap_or(7).clamp(1, 30);
    let trends = state.feed().trends(days, limit as usize).await?;
    Ok(Json(trends))
}

/// GET /api/posts/saved
pub async fn saved(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(params): AppQuery<PageParams>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let posts = state
        .feed()
        .saved(user.id(), params.page(PAGE_LIMIT, PAGE_LIMIT_MAX))
        .await?;
    Ok(Json(posts))
}

/// GET /api/posts/:id
pub async fn get(
    State(state): State<AppState>,
    viewer: MaybeUser,
    AppPath(post_id): AppPath<i64>,
) -> Result<Json<PostView>, AppError> {
    Ok(Json(state.posts().get(post_id, viewer.id()).await?))
}

/// PUT /api/posts/:id
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(post_id): AppPath<i64>,
    AppJson(request): AppJson<UpdatePostRequest>,
) -> Result<Json<PostView>, AppError> {
    let post = state
        .posts()
        .update_text(post_id, user.id(), request.text)
        .await?;
    Ok(Json(post))
}

/// DELETE /api/posts/:id
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(post_id): AppPath<i64>,
) -> Result<Json<Value>, AppError> {
    state.posts().delete(post_id, user.id()).await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/posts/:id/like
pub async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(post_id): AppPath<i64>,
) -> Result<Json<Value>, AppError> {
    let outcome = state.posts().toggle_like(post_id, user.id()).await?;
    Ok(Json(json!({
        "success": true,
        "liked": outcome.liked,
        "like_count": outcome.like_count,
    })))
}

/// POST /api/posts/:id/save
pub async fn save(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(post_id): AppPath<i64>,
) -> Result<Json<Value>, AppError> {
    state.posts().save(post_id, user.id()).await?;
    Ok(Json(json!({ "success": true, "saved": true })))
}

/// DELETE /api/posts/:id/save
pub async fn unsave(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(post_id): AppPath<i64>,
) -> Result<Json<Value>, AppError> {
    state.posts().unsave(post_id, user.id()).await?;
    Ok(Json(json!({ "success": true, "saved": false })))
}

/// POST /api/posts/:id/poll/vote
pub async fn vote(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(post_id): AppPath<i64>,
    AppJson(request): AppJson<VoteRequest>,
) -> Result<Json<Value>, AppError> {
    let results = state
        .posts()
        .vote(post_id, user.id(), request.option)
        .await?;
    Ok(Json(json!({
        "success": true,
        "selected": results.selected,
        "total": results.total,
        "results": results.results,
    })))
}

/// GET /api/posts/:id/poll/results
pub async fn poll_results(
    State(state): State<AppState>,
    viewer: MaybeUser,
    AppPath(post_id): AppPath<i64>,
) -> Result<Json<PollResults>, AppError> {
    Ok(Json(state.posts().poll_results(post_id, viewer.id()).await?))
}
