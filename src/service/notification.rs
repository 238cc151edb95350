//! Notification service
//!
//! Notifications are not stored. They are derived on every read from
//! likes, comments and follows aimed at the user.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::excerpt;
use crate::data::{ActivityRow, Database, MediaType, NotificationKind, UserSummary};
use crate::error::AppError;

/// How far back the list reaches
const LIST_WINDOW_DAYS: i64 = 7;
/// Unread window when the user never marked notifications read
const UNSEEN_FALLBACK_HOURS: i64 = 24;
/// Rows fetched per kind
const PER_KIND_LIMIT: i64 = 200;

const POST_EXCERPT_CHARS: usize = 80;
const COMMENT_EXCERPT_CHARS: usize = 140;

#[derive(Debug, Clone, Serialize)]
pub struct PostPreview {
    pub id: i64,
    pub text_excerpt: Option<String>,
    pub thumb_url: Option<String>,
    pub media_type: Option<MediaType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
    pub post_id: Option<i64>,
    pub actor: UserSummary,
    pub post: Option<PostPreview>,
    /// Comment text, comment notifications only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl NotificationView {
    fn from_activity(kind: NotificationKind, row: ActivityRow) -> Self {
        let actor = row.actor();
        let post = row.post_id.map(|id| PostPreview {
            id,
            text_excerpt: row
                .post_text
                .as_deref()
                .map(|text| excerpt(text, POST_EXCERPT_CHARS)),
            thumb_url: row.post_thumb_url.clone(),
            media_type: row.post_thumb_type,
        });
        let comment_excerpt = match kind {
            NotificationKind::Comment => row
                .comment_text
                .as_deref()
                .map(|text| excerpt(text, COMMENT_EXCERPT_CHARS)),
            _ => None,
        };

        Self {
            kind,
            created_at: row.created_at,
            post_id: row.post_id,
            actor,
            post,
            excerpt: comment_excerpt,
        }
    }
}

/// Notification service
pub struct NotificationService {
    db: Arc<Database>,
}

impl NotificationService {
    /// Create new notification service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Likes, comments and follows from the last week, newest first
    pub async fn list(&self, user_id: i64) -> Result<Vec<NotificationView>, AppError> {
        let since = Utc::now() - Duration::days(LIST_WINDOW_DAYS);

        let likes = self.db.get_like_activity(user_id, since, PER_KIND_LIMIT).await?;
        let comments = self
            .db
            .get_comment_activity(user_id, since, PER_KIND_LIMIT)
            .await?;
        let follows = self
            .db
            .get_follow_activity(user_id, since, PER_KIND_LIMIT)
            .await?;

        let mut items: Vec<NotificationView> = likes
            .into_iter()
            .map(|row| NotificationView::from_activity(NotificationKind::Like, row))
            .chain(
                comments
                    .into_iter()
                    .map(|row| NotificationView::from_activity(NotificationKind::Comment, row)),
            )
            .chain(
                follows
                    .into_iter()
                    .map(|row| NotificationView::from_activity(NotificationKind::Follow, row)),
            )
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    /// Activity newer than the user's last-seen marker
    pub async fn unread_count(&self, user_id: i64) -> Result<i64, AppError> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        let since = user
            .notifications_seen_at
            .unwrap_or_else(|| Utc::now() - Duration::hours(UNSEEN_FALLBACK_HOURS));
        self.db.count_activity_since(user_id, since).await
    }

    pub async fn mark_read(&self, user_id: i64) -> Result<(), AppError> {
        self.db.set_notifications_seen_at(user_id, Utc::now()).await
    }
}
