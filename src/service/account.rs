//! Account service
//!
//! Registration, login, profiles, the follow graph and blocks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::Page;
use super::post::{PostView, present_posts};
use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::{Claims, create_token};
use crate::config::AppConfig;
use crate::data::{Database, FollowState, ProfilePatch, User, UserSummary};
use crate::error::AppError;
use crate::metrics::USERS_REGISTERED_TOTAL;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 30;
const PASSWORD_MIN: usize = 6;
const BIO_MAX: usize = 160;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex");
}

fn normalize_optional_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn validate_username(username: &str) -> Result<(), AppError> {
    let length = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&length)
        || !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AppError::validation(format!(
            "Username must be {USERNAME_MIN}-{USERNAME_MAX} characters of letters, digits or _"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    if !EMAIL.is_match(email) {
        return Err(AppError::validation("Invalid email address"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(AppError::validation(format!(
            "Password must be at least {PASSWORD_MIN} characters"
        )));
    }
    Ok(())
}

/// Registration input
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

/// Issued after register and login
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub id: i64,
    pub username: String,
    pub token: String,
}

/// The signed-in user's own account
#[derive(Debug, Clone, Serialize)]
pub struct MeView {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub email: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub cover_url: Option<String>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for MeView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            email: user.email,
            bio: user.bio,
            avatar_url: user.avatar_url,
            cover_url: user.cover_url,
            is_private: user.is_private,
            created_at: user.created_at,
        }
    }
}

/// A profile as seen by a (possibly anonymous) viewer
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub cover_url: Option<String>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
    pub is_me: bool,
    pub is_following: bool,
    pub follow_state: Option<FollowState>,
    /// Private profile the viewer may not see into
    pub posts_hidden: bool,
    pub posts: Vec<PostView>,
}

/// Profile fields to change; `None` leaves a field alone, a blank string clears it
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub cover_url: Option<String>,
    pub is_private: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FollowOutcome {
    pub state: FollowState,
    pub followers_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockStatus {
    pub blocked_by_me: bool,
    pub blocked_me: bool,
}

/// Account service
pub struct AccountService {
    db: Arc<Database>,
    config: Arc<AppConfig>,
}

impl AccountService {
    /// Create new account service
    pub fn new(db: Arc<Database>, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    fn issue_session(&self, user: &User) -> Result<AuthSession, AppError> {
        let claims = Claims::new(user.id, &user.username, self.config.auth.token_ttl_days);
        let token = create_token(&claims, &self.config.auth.jwt_secret)?;
        Ok(AuthSession {
            id: user.id,
            username: user.username.clone(),
            token,
        })
    }

    async fn require_user(&self, id: i64) -> Result<User, AppError> {
        self.db
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    /// Create an account and sign it in
    ///
    /// # Errors
    /// `Validation` on malformed fields or a taken username/email
    pub async fn register(&self, registration: Registration) -> Result<AuthSession, AppError> {
        let username = registration.username.trim();
        let email = registration.email.trim();
        validate_username(username)?;
        validate_email(email)?;
        validate_password(&registration.password)?;
        let display_name = registration.display_name.and_then(normalize_optional_text);

        let password_hash = hash_password_blocking(registration.password).await?;
        let user = self
            .db
            .insert_user(username, email, &password_hash, display_name.as_deref())
            .await?;

        USERS_REGISTERED_TOTAL.inc();
        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        self.issue_session(&user)
    }

    /// Exchange credentials for a token
    ///
    /// Unknown email and wrong password fail the same way.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        let invalid = || AppError::validation("Invalid credentials");

        let user = self
            .db
            .get_user_by_email(email.trim())
            .await?
            .ok_or_else(invalid)?;
        let valid =
            verify_password_blocking(password.to_string(), user.password_hash.clone()).await?;
        if !valid {
            return Err(invalid());
        }

        self.issue_session(&user)
    }

    pub async fn me(&self, user_id: i64) -> Result<MeView, AppError> {
        Ok(self.require_user(user_id).await?.into())
    }

    /// Profile by username
    ///
    /// Posts of a private account are only listed for the owner and
    /// accepted followers.
    pub async fn profile(
        &self,
        username: &str,
        viewer_id: Option<i64>,
        page: Page,
    ) -> Result<ProfileView, AppError> {
        let user = self
            .db
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        let is_me = viewer_id == Some(user.id);
        let follow_state = match viewer_id {
            Some(viewer) if !is_me => self.db.get_follow_state(viewer, user.id).await?,
            _ => None,
        };
        let can_see_posts =
            is_me || !user.is_private || follow_state == Some(FollowState::Accepted);

        let posts = if can_see_posts {
            let posts = self
                .db
                .get_user_posts(user.id, page.limit, page.offset())
                .await?;
            present_posts(&self.db, viewer_id, posts).await?
        } else {
            Vec::new()
        };

        Ok(ProfileView {
            followers_count: self.db.count_followers(user.id).await?,
            following_count: self.db.count_following(user.id).await?,
            posts_count: self.db.count_user_posts(user.id).await?,
            is_me,
            is_following: follow_state == Some(FollowState::Accepted),
            follow_state,
            posts_hidden: !can_see_posts,
            posts,
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            bio: user.bio,
            avatar_url: user.avatar_url,
            cover_url: user.cover_url,
            is_private: user.is_private,
            created_at: user.created_at,
        })
    }

    /// Partial profile update
    ///
    /// Going public accepts every pending follow request.
    pub async fn update_profile(
        &self,
        user_id: i64,
        update: ProfileUpdate,
    ) -> Result<MeView, AppError> {
        let user = self.require_user(user_id).await?;

        let patch = ProfilePatch {
            display_name: update.display_name.map(normalize_optional_text),
            bio: update.bio.map(normalize_optional_text),
            avatar_url: update.avatar_url.map(normalize_optional_text),
            cover_url: update.cover_url.map(normalize_optional_text),
            is_private: update.is_private,
        };
        if let Some(Some(bio)) = &patch.bio {
            if bio.chars().count() > BIO_MAX {
                return Err(AppError::validation(format!(
                    "Bio must be at most {BIO_MAX} characters"
                )));
            }
        }

        self.db.patch_user_profile(user.id, &patch).await?;
        if user.is_private && patch.is_private == Some(false) {
            let accepted = self.db.accept_all_follow_requests(user.id).await?;
            tracing::info!(user_id, accepted, "Profile made public, pending requests accepted");
        }

        self.me(user_id).await
    }

    pub async fn change_email(
        &self,
        user_id: i64,
        new_email: &str,
        password: &str,
    ) -> Result<MeView, AppError> {
        let user = self.require_user(user_id).await?;
        let new_email = new_email.trim();
        validate_email(new_email)?;

        if !verify_password_blocking(password.to_string(), user.password_hash).await? {
            return Err(AppError::validation("Incorrect password"));
        }

        self.db.update_user_email(user_id, new_email).await?;
        self.me(user_id).await
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self.require_user(user_id).await?;
        validate_password(new_password)?;

        if !verify_password_blocking(current_password.to_string(), user.password_hash).await? {
            return Err(AppError::validation("Current password is incorrect"));
        }

        let password_hash = hash_password_blocking(new_password.to_string()).await?;
        self.db.update_user_password_hash(user_id, &password_hash).await
    }

    /// Follow a user; private targets get a pending request
    pub async fn follow(&self, user_id: i64, target_id: i64) -> Result<FollowOutcome, AppError> {
        if user_id == target_id {
            return Err(AppError::validation("You can't follow yourself"));
        }
        let target = self.require_user(target_id).await?;

        if self.db.get_follow_state(user_id, target.id).await?.is_some() {
            return Err(AppError::validation("Already following or requested"));
        }

        let state = FollowState::initial_for(target.is_private);
        self.db.insert_follow(user_id, target.id, state).await?;
        tracing::debug!(user_id, target_id, state = state.as_str(), "Follow created");

        Ok(FollowOutcome {
            state,
            followers_count: self.db.count_followers(target.id).await?,
        })
    }

    /// Remove a follow edge or request; returns the target's follower count
    pub async fn unfollow(&self, user_id: i64, target_id: i64) -> Result<i64, AppError> {
        self.db.delete_follow(user_id, target_id).await?;
        self.db.count_followers(target_id).await
    }

    pub async fn follow_requests(&self, user_id: i64) -> Result<Vec<UserSummary>, AppError> {
        self.db.get_pending_requesters(user_id).await
    }

    pub async fn approve_request(&self, user_id: i64, requester_id: i64) -> Result<(), AppError> {
        if !self.db.accept_follow_request(user_id, requester_id).await? {
            return Err(AppError::not_found("Follow request"));
        }
        Ok(())
    }

    pub async fn reject_request(&self, user_id: i64, requester_id: i64) -> Result<(), AppError> {
        if !self.db.reject_follow_request(user_id, requester_id).await? {
            return Err(AppError::not_found("Follow request"));
        }
        Ok(())
    }

    pub async fn block_status(&self, user_id: i64, other_id: i64) -> Result<BlockStatus, AppError> {
        let (blocked_by_me, blocked_me) = self.db.get_block_status(user_id, other_id).await?;
        Ok(BlockStatus {
            blocked_by_me,
            blocked_me,
        })
    }

    pub async fn block(&self, user_id: i64, other_id: i64) -> Result<BlockStatus, AppError> {
        if user_id == other_id {
            return Err(AppError::validation("You can't block yourself"));
        }
        self.require_user(other_id).await?;
        self.db.insert_block(user_id, other_id).await?;
        self.block_status(user_id, other_id).await
    }

    pub async fn unblock(&self, user_id: i64, other_id: i64) -> Result<BlockStatus, AppError> {
        self.db.delete_block(user_id, other_id).await?;
        self.block_status(user_id, other_id).await
    }
}
