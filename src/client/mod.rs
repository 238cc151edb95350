//! Typed REST client
//!
//! Holds the bearer token and wraps the calls a frontend makes. Any 401
//! clears the stored token and surfaces as [`ClientError::Unauthorized`],
//! which a UI treats as "go to the login page".

pub mod optimistic;
pub mod thread;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::data::{FollowState, UserSummary};

pub use optimistic::{ActionState, Optimistic};
pub use thread::{Poller, ThreadState, ThreadView};

/// Error type for client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Token missing, invalid or expired; the stored token was cleared
    #[error("Not signed in")]
    Unauthorized,

    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http(error) => error.status().map(|status| status.as_u16()),
            ClientError::Unauthorized => Some(401),
            ClientError::Api { status, .. } => Some(*status),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub id: i64,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SaveState {
    pub saved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FollowStatus {
    /// `None` after unfollowing
    #[serde(default)]
    pub state: Option<FollowState>,
    pub followers_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<ChatMessage>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboxEntry {
    pub id: i64,
    pub last_activity_at: DateTime<Utc>,
    pub other: UserSummary,
    pub unread_count: i64,
    pub i_follow: bool,
    pub follows_me: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub post_id: Option<i64>,
    pub actor: UserSummary,
    #[serde(default)]
    pub excerpt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: i64,
}

/// REST client for a Linko server
#[derive(Debug)]
pub struct ApiClient {
    http: Client,
    /// Server origin without trailing slash
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub async fn is_signed_in(&self) -> bool {
        self.token.read().await.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Send a request and decode the JSON response.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let mut request = self.http.request(method, self.url(path));
        if let Some(token) = self.token.read().await.as_deref() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            self.set_token(None).await;
            tracing::debug!(path, "Token rejected; signed out");
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, ClientError> {
        let session: Session = self
            .request(
                Method::POST,
                "/auth/register",
                Some(json!({ "username": username, "email": email, "password": password })),
            )
            .await?;
        self.set_token(Some(session.token.clone())).await;
        Ok(session)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let session: Session = self
            .request(
                Method::POST,
                "/auth/login",
                Some(json!({ "email": email, "password": password })),
            )
            .await?;
        self.set_token(Some(session.token.clone())).await;
        Ok(session)
    }

    pub async fn logout(&self) {
        self.set_token(None).await;
    }

    pub async fn toggle_like(&self, post_id: i64) -> Result<LikeState, ClientError> {
        self.request(Method::POST, &format!("/posts/{post_id}/like"), None)
            .await
    }

    pub async fn save(&self, post_id: i64) -> Result<SaveState, ClientError> {
        self.request(Method::POST, &format!("/posts/{post_id}/save"), None)
            .await
    }

    pub async fn unsave(&self, post_id: i64) -> Result<SaveState, ClientError> {
        self.request(Method::DELETE, &format!("/posts/{post_id}/save"), None)
            .await
    }

    pub async fn follow(&self, user_id: i64) -> Result<FollowStatus, ClientError> {
        self.request(Method::POST, &format!("/users/{user_id}/follow"), None)
            .await
    }

    pub async fn unfollow(&self, user_id: i64) -> Result<FollowStatus, ClientError> {
        self.request(Method::DELETE, &format!("/users/{user_id}/follow"), None)
            .await
    }

    pub async fn conversations(&self) -> Result<Vec<InboxEntry>, ClientError> {
        self.request(Method::GET, "/dm", None).await
    }

    pub async fn messages(
        &self,
        user_id: i64,
        page: i64,
        limit: i64,
    ) -> Result<MessagePage, ClientError> {
        self.request(
            Method::GET,
            &format!("/dm/{user_id}/messages?page={page}&limit={limit}"),
            None,
        )
        .await
    }

    pub async fn send_message(
        &self,
        user_id: i64,
        content: &str,
    ) -> Result<ChatMessage, ClientError> {
        let response: SendResponse = self
            .request(
                Method::POST,
                &format!("/dm/{user_id}/messages"),
                Some(json!({ "content": content })),
            )
            .await?;
        Ok(response.message)
    }

    pub async fn mark_conversation_read(&self, user_id: i64) -> Result<(), ClientError> {
        let _: Value = self
            .request(Method::POST, &format!("/dm/{user_id}/read"), None)
            .await?;
        Ok(())
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>, ClientError> {
        self.request(Method::GET, "/notifications", None).await
    }

    pub async fn unread_notifications(&self) -> Result<i64, ClientError> {
        let response: CountResponse = self
            .request(Method::GET, "/notifications/unread-count", None)
            .await?;
        Ok(response.count)
    }

    pub async fn mark_notifications_read(&self) -> Result<(), ClientError> {
        let _: Value = self
            .request(Method::POST, "/notifications/mark-read", None)
            .await?;
        Ok(())
    }
}
