//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate database, storage and token operations.

mod account;
mod feed;
mod messaging;
mod notification;
mod post;

pub use account::{
    AccountService, AuthSession, BlockStatus, FollowOutcome, MeView, ProfileUpdate, ProfileView,
    Registration,
};
pub use feed::{FeedService, TrendingTag, Trends, extract_trends};
pub use messaging::{ConversationView, LastMessage, MessagePage, MessagingService};
pub use notification::{NotificationService, NotificationView, PostPreview};
pub use post::{
    CommentView, LikeOutcome, PollResults, PollView, PostDraft, PostService, PostView,
    present_posts,
};

/// 1-based page window shared by every paginated listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    /// Clamp raw query values: `page >= 1`, `1 <= limit <= max`.
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64, max_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Clamp a bare `limit` query value.
pub fn clamp_limit(limit: Option<i64>, default_limit: i64, max_limit: i64) -> i64 {
    limit.unwrap_or(default_limit).clamp(1, max_limit)
}

/// First `max` characters of `text`, never splitting a code point.
pub(crate) fn excerpt(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
