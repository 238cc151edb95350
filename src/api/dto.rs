//! Request DTOs
//!
//! JSON bodies and query strings accepted by the REST API. Required text
//! fields default to empty so a missing field fails validation with 400.

use serde::{Deserialize, Serialize};

use crate::data::MediaType;
use crate::service::{Page, ProfileUpdate, Registration};

/// `?page=&limit=`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn page(&self, default_limit: i64, max_limit: i64) -> Page {
        Page::new(self.page, self.limit, default_limit, max_limit)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExploreParams {
    pub tag: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TrendsParams {
    pub limit: Option<i64>,
    pub days: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub display_name: Option<String>,
}

impl From<RegisterRequest> for Registration {
    fn from(request: RegisterRequest) -> Self {
        Self {
            username: request.username,
            email: request.email,
            password: request.password,
            display_name: request.display_name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// PATCH /api/users/me
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub cover_url: Option<String>,
    pub is_private: Option<bool>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(request: UpdateProfileRequest) -> Self {
        Self {
            display_name: request.display_name,
            bio: request.bio,
            avatar_url: request.avatar_url,
            cover_url: request.cover_url,
            is_private: request.is_private,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeEmailRequest {
    #[serde(default)]
    pub new_email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePostRequest {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteRequest {
    /// 0-based option position
    pub option: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub text: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
}

/// One stored upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub files: Vec<UploadedFile>,
}
