//! Authentication
//!
//! Handles:
//! - Bearer tokens (HS256 JWT)
//! - Password hashing (Argon2id)
//! - Request extractors for protected and optional-auth routes

mod middleware;
pub mod password;
pub mod token;

pub use middleware::{CurrentUser, MaybeUser};
pub use token::{Claims, create_token, verify_token};
