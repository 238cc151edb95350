//! API layer
//!
//! REST handlers under `/api`, grouped per resource, plus the
//! Prometheus endpoint.

mod auth;
mod comments;
mod dm;
mod dto;
mod extract;
pub mod metrics;
mod notifications;
mod posts;
mod search;
mod upload;
mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
};
use tower_http::limit::RequestBodyLimitLayer;

pub use dto::*;
pub use metrics::metrics_router;
pub use upload::{MAX_BODY_BYTES as UPLOAD_BODY_LIMIT, MAX_FILES as UPLOAD_MAX_FILES};

use crate::AppState;

/// Routes mounted under `/api`
///
/// Handlers pick their own auth: `CurrentUser` rejects anonymous
/// requests with 401, `MaybeUser` lets them through.
pub fn api_router() -> Router<AppState> {
    let upload_routes = Router::new()
        .route("/upload", post(upload::upload))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload::MAX_BODY_BYTES));

    Router::new()
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        // Users
        .route("/users/me", get(users::me).patch(users::update_me))
        .route("/users/me/email", patch(users::change_email))
        .route("/users/me/password", patch(users::change_password))
        .route("/users/me/requests", get(users::follow_requests))
        .route("/users/requests/:id/approve", post(users::approve_request))
        .route("/users/requests/:id/reject", post(users::reject_request))
        .route("/users/:user", get(users::profile))
        .route(
            "/users/:user/follow",
            post(users::follow).delete(users::unfollow),
        )
        .route(
            "/users/:user/block",
            get(users::block_status)
                .post(users::block)
                .delete(users::unblock),
        )
        // Posts
        .route("/posts", get(posts::feed).post(posts::create))
        .route("/posts/explore", get(posts::explore))
        .route("/posts/trends", get(posts::trends))
        .route("/posts/saved", get(posts::saved))
        .route(
            "/posts/:id",
            get(posts::get).put(posts::update).delete(posts::delete),
        )
        .route("/posts/:id/like", post(posts::toggle_like))
        .route("/posts/:id/save", post(posts::save).delete(posts::unsave))
        .route("/posts/:id/poll/vote", post(posts::vote))
        .route("/posts/:id/poll/results", get(posts::poll_results))
        // Comments
        .route(
            "/posts/:id/comments",
            get(comments::list).post(comments::create),
        )
        .route("/comments/:id", delete(comments::delete))
        // Direct messages
        .route("/dm", get(dm::conversations))
        .route("/dm/messages/:id", delete(dm::delete))
        .route("/dm/:user_id/messages", get(dm::messages).post(dm::send))
        .route("/dm/:user_id/read", post(dm::mark_read))
        // Notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/mark-read", post(notifications::mark_read))
        // Search
        .route("/search/users", get(search::users))
        .route("/search/posts", get(search::posts))
        .merge(upload_routes)
}
