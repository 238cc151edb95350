//! Data models
//!
//! Rust structs representing database rows.
//! Ids are SQLite integer rowids, timestamps are chrono UTC values
//! stored as RFC 3339 text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Users
// =============================================================================

/// A registered account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub cover_url: Option<String>,
    pub is_private: bool,
    /// Last time the user opened their notifications
    pub notifications_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Public identity of a user, embedded in posts, comments and lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

/// Fields accepted by a partial profile update.
///
/// `Some(None)` clears a nullable column, `None` leaves it untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub display_name: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
    pub cover_url: Option<Option<String>>,
    pub is_private: Option<bool>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.bio.is_none()
            && self.avatar_url.is_none()
            && self.cover_url.is_none()
            && self.is_private.is_none()
    }
}

// =============================================================================
// Follow graph
// =============================================================================

/// State of a follow edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum FollowState {
    /// Waiting for a private account to approve
    Pending,
    Accepted,
}

impl FollowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
        }
    }

    /// New edges towards private accounts start pending.
    pub fn initial_for(target_is_private: bool) -> Self {
        if target_is_private {
            Self::Pending
        } else {
            Self::Accepted
        }
    }
}

// =============================================================================
// Posts
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of a media attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    /// Classify a MIME type, `None` for anything but images and video.
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.starts_with("image/") {
            Some(Self::Image)
        } else if content_type.starts_with("video/") {
            Some(Self::Video)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Attachment {
    #[serde(skip)]
    pub post_id: i64,
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    #[serde(rename = "order")]
    pub position: i64,
}

/// Attachment supplied when creating a post
#[derive(Debug, Clone, Deserialize)]
pub struct NewAttachment {
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

/// Poll supplied when creating a post
#[derive(Debug, Clone, Deserialize)]
pub struct NewPoll {
    pub question: String,
    pub options: Vec<String>,
}

/// Validated input for inserting a post with its dependents
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub text: Option<String>,
    pub attachments: Vec<NewAttachment>,
    pub tag_user_ids: Vec<i64>,
    pub poll: Option<NewPoll>,
}

/// Tagged user of a post
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostTag {
    pub post_id: i64,
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Poll {
    pub id: i64,
    pub post_id: i64,
    pub question: String,
}

/// Poll option with its current vote count
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PollOption {
    pub id: i64,
    #[serde(skip)]
    pub poll_id: i64,
    pub text: String,
    pub position: i64,
    pub votes: i64,
}

// =============================================================================
// Comments
// =============================================================================

/// Comment joined with its author
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_id: i64,
    pub author_username: String,
    pub author_display_name: Option<String>,
    pub author_avatar_url: Option<String>,
}

impl CommentRow {
    pub fn author(&self) -> UserSummary {
        UserSummary {
            id: self.author_id,
            username: self.author_username.clone(),
            display_name: self.author_display_name.clone(),
            avatar_url: self.author_avatar_url.clone(),
        }
    }
}

// =============================================================================
// Conversations
// =============================================================================

/// Unordered pair of users stored as (low, high).
///
/// Both participants resolve to the same key regardless of who asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub low: i64,
    pub high: i64,
}

impl ConversationKey {
    /// `None` when both ids are the same user.
    pub fn new(a: i64, b: i64) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.low == user_id || self.high == user_id
    }

    pub fn other(&self, user_id: i64) -> i64 {
        if self.low == user_id {
            self.high
        } else {
            self.low
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Conversation {
    pub id: i64,
    pub user_low: i64,
    pub user_high: i64,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Conversation {
    pub fn key(&self) -> ConversationKey {
        ConversationKey {
            low: self.user_low,
            high: self.user_high,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// One row of a user's inbox
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConversationSummary {
    pub conversation_id: i64,
    pub last_activity_at: DateTime<Utc>,
    pub other_id: i64,
    pub other_username: String,
    pub other_display_name: Option<String>,
    pub other_avatar_url: Option<String>,
    pub last_message_id: Option<i64>,
    pub last_message_sender_id: Option<i64>,
    pub last_message_content: Option<String>,
    pub last_message_created_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
    pub i_follow: bool,
    pub follows_me: bool,
}

// =============================================================================
// Notifications
// =============================================================================

/// Kind of a derived notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
}

/// Activity row a notification is derived from
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub actor_id: i64,
    pub actor_username: String,
    pub actor_display_name: Option<String>,
    pub actor_avatar_url: Option<String>,
    pub post_id: Option<i64>,
    pub post_text: Option<String>,
    pub post_thumb_url: Option<String>,
    pub post_thumb_type: Option<MediaType>,
    pub comment_id: Option<i64>,
    pub comment_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActivityRow {
    pub fn actor(&self) -> UserSummary {
        UserSummary {
            id: self.actor_id,
            username: self.actor_username.clone(),
            display_name: self.actor_display_name.clone(),
            avatar_url: self.actor_avatar_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_key_is_order_independent() {
        let ab = ConversationKey::new(7, 3).unwrap();
        let ba = ConversationKey::new(3, 7).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.low, 3);
        assert_eq!(ab.high, 7);
        assert_eq!(ab.other(3), 7);
        assert_eq!(ab.other(7), 3);
        assert!(ab.contains(7));
        assert!(!ab.contains(5));
    }

    #[test]
    fn conversation_key_rejects_self_pair() {
        assert!(ConversationKey::new(4, 4).is_none());
    }

    #[test]
    fn media_type_from_mime() {
        assert_eq!(MediaType::from_mime("image/png"), Some(MediaType::Image));
        assert_eq!(MediaType::from_mime("VIDEO/mp4"), Some(MediaType::Video));
        assert_eq!(MediaType::from_mime("application/pdf"), None);
    }

    #[test]
    fn follow_state_depends_on_privacy() {
        assert_eq!(FollowState::initial_for(true), FollowState::Pending);
        assert_eq!(FollowState::initial_for(false), FollowState::Accepted);
        assert_eq!(FollowState::Pending.as_str(), "PENDING");
    }
}
