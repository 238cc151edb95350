//! Messaging service
//!
//! Direct messages between two users. A conversation is addressed by the
//! other participant; storage keys it by the ordered user pair.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::Page;
use crate::config::MessagingConfig;
use crate::data::{ConversationKey, ConversationSummary, Database, Message, UserSummary};
use crate::error::AppError;
use crate::metrics::{MESSAGES_RATE_LIMITED_TOTAL, MESSAGES_SENT_TOTAL};
use crate::storage::MediaStorage;

/// Collapse runs of whitespace into single spaces and trim.
fn normalize_content(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Serialize)]
pub struct LastMessage {
    pub id: i64,
    pub sender_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One inbox entry
#[derive(Debug, Clone, Serialize)]
pub struct ConversationView {
    pub id: i64,
    pub last_activity_at: DateTime<Utc>,
    pub other: UserSummary,
    pub last_message: Option<LastMessage>,
    pub unread_count: i64,
    pub i_follow: bool,
    pub follows_me: bool,
}

impl From<ConversationSummary> for ConversationView {
    fn from(row: ConversationSummary) -> Self {
        let last_message = match (
            row.last_message_id,
            row.last_message_sender_id,
            row.last_message_content,
            row.last_message_created_at,
        ) {
            (Some(id), Some(sender_id), Some(content), Some(created_at)) => Some(LastMessage {
                id,
                sender_id,
                content,
                created_at,
            }),
            _ => None,
        };

        Self {
            id: row.conversation_id,
            last_activity_at: row.last_activity_at,
            other: UserSummary {
                id: row.other_id,
                username: row.other_username,
                display_name: row.other_display_name,
                avatar_url: row.other_avatar_url,
            },
            last_message,
            unread_count: row.unread_count,
            i_follow: row.i_follow,
            follows_me: row.follows_me,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

/// Messaging service
pub struct MessagingService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
    config: MessagingConfig,
}

impl MessagingService {
    /// Create new messaging service
    pub fn new(db: Arc<Database>, storage: Arc<MediaStorage>, config: MessagingConfig) -> Self {
        Self {
            db,
            storage,
            config,
        }
    }

    /// Resolve the conversation key with `other_id`, which must exist.
    async fn key_with(&self, user_id: i64, other_id: i64) -> Result<ConversationKey, AppError> {
        let key = ConversationKey::new(user_id, other_id)
            .ok_or_else(|| AppError::validation("You can't message yourself"))?;
        if self.db.get_user(other_id).await?.is_none() {
            return Err(AppError::not_found("User"));
        }
        Ok(key)
    }

    /// Send a message
    ///
    /// Checks run in order: empty, too long, self, unknown recipient,
    /// rate limit, blocks. A rejected message is never stored.
    pub async fn send(
        &self,
        sender_id: i64,
        recipient_id: i64,
        raw_content: &str,
    ) -> Result<Message, AppError> {
        let content = normalize_content(raw_content);
        if content.is_empty() {
            return Err(AppError::validation("Message cannot be empty"));
        }
        if content.chars().count() > self.config.max_length {
            return Err(AppError::validation(format!(
                "Message is too long (max {} characters)",
                self.config.max_length
            )));
        }

        let key = self.key_with(sender_id, recipient_id).await?;
        let window_start = Utc::now() - Duration::seconds(self.config.rate_limit_window_seconds);

        match self
            .db
            .send_message(
                sender_id,
                key,
                &content,
                window_start,
                self.config.rate_limit_count,
            )
            .await
        {
            Ok(message) => {
                MESSAGES_SENT_TOTAL.inc();
                tracing::debug!(
                    message_id = message.id,
                    conversation_id = message.conversation_id,
                    "Message sent"
                );
                Ok(message)
            }
            Err(AppError::RateLimited) => {
                MESSAGES_RATE_LIMITED_TOTAL.inc();
                tracing::info!(sender_id, "Message rate limit hit");
                Err(AppError::RateLimited)
            }
            Err(error) => Err(error),
        }
    }

    /// Inbox, most recently active first
    pub async fn conversations(&self, user_id: i64) -> Result<Vec<ConversationView>, AppError> {
        let rows = self.db.list_conversations(user_id).await?;
        Ok(rows.into_iter().map(ConversationView::from).collect())
    }

    /// Messages with `other_id`, oldest first
    pub async fn messages(
        &self,
        user_id: i64,
        other_id: i64,
        page: Page,
    ) -> Result<MessagePage, AppError> {
        let key = self.key_with(user_id, other_id).await?;
        let (messages, total) = match self.db.get_conversation(key).await? {
            Some(conversation) => (
                self.db
                    .get_messages(conversation.id, page.limit, page.offset())
                    .await?,
                self.db.count_messages(conversation.id).await?,
            ),
            None => (Vec::new(), 0),
        };

        Ok(MessagePage {
            messages,
            page: page.page,
            limit: page.limit,
            total,
        })
    }

    /// Mark every message from `other_id` as read; returns how many changed
    pub async fn mark_read(&self, user_id: i64, other_id: i64) -> Result<u64, AppError> {
        let key = self.key_with(user_id, other_id).await?;
        match self.db.get_conversation(key).await? {
            Some(conversation) => self.db.mark_conversation_read(conversation.id, user_id).await,
            None => Ok(0),
        }
    }

    /// Delete a message (either participant) and its remote media
    pub async fn delete(&self, user_id: i64, message_id: i64) -> Result<(), AppError> {
        let (message, conversation) = self
            .db
            .get_message_with_conversation(message_id)
            .await?
            .ok_or_else(|| AppError::not_found("Message"))?;
        if !conversation.key().contains(user_id) {
            return Err(AppError::forbidden("You can't delete this message"));
        }

        self.db.delete_message(message.id).await?;
        if self.storage.is_media_url(&message.content) {
            self.storage.delete_url_best_effort(&message.content).await;
        }
        Ok(())
    }
}
