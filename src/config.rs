//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override, `LINKO__SECTION__KEY`)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub cloudflare: CloudflareConfig,
    pub auth: AuthConfig,
    pub messaging: MessagingConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public base URL of the API (e.g., "https://linko.example.com")
    pub public_url: String,
    /// Allowed browser origin. Permissive CORS when absent.
    #[serde(default)]
    pub cors_origin: Option<String>,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Media storage configuration (Cloudflare R2)
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// R2 bucket name for uploaded media
    pub bucket: String,
    /// Public URL for media (Custom Domain)
    /// e.g., "https://media.example.com"
    pub public_url: String,
}

/// Cloudflare credentials
#[derive(Debug, Clone, Deserialize)]
pub struct CloudflareConfig {
    /// Cloudflare account ID
    pub account_id: String,
    /// R2 access key ID
    pub r2_access_key_id: String,
    /// R2 secret access key
    pub r2_secret_access_key: String,
}

/// Bearer token configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing tokens (32+ bytes)
    pub jwt_secret: String,
    /// Token lifetime in days (default: 30)
    pub token_ttl_days: i64,
}

/// Direct message limits
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingConfig {
    /// Maximum message length in characters
    pub max_length: usize,
    /// Messages a sender may send inside one window
    pub rate_limit_count: i64,
    /// Window length in seconds
    pub rate_limit_window_seconds: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (LINKO__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.public_url", "http://localhost:8080")?
            .set_default("database.path", "data/linko.db")?
            .set_default("auth.token_ttl_days", 30)?
            .set_default("messaging.max_length", 1000)?
            .set_default("messaging.rate_limit_count", 10)?
            .set_default("messaging.rate_limit_window_seconds", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("LINKO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Media storage public URL without a trailing slash
    pub fn media_base_url(&self) -> &str {
        self.storage.public_url.trim_end_matches('/')
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_JWT_SECRET_BYTES: usize = 32;

        if self.auth.jwt_secret.as_bytes().len() < MIN_JWT_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.jwt_secret must be at least {} bytes",
                MIN_JWT_SECRET_BYTES
            )));
        }

        if self.auth.token_ttl_days <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.token_ttl_days must be greater than 0".to_string(),
            ));
        }

        if self.messaging.max_length == 0
            || self.messaging.rate_limit_count <= 0
            || self.messaging.rate_limit_window_seconds <= 0
        {
            return Err(crate::error::AppError::Config(
                "messaging limits must be greater than 0".to_string(),
            ));
        }

        url::Url::parse(&self.storage.public_url).map_err(|e| {
            crate::error::AppError::Config(format!("storage.public_url is not a valid URL: {e}"))
        })?;

        if self.server.cors_origin.is_none() {
            tracing::warn!("server.cors_origin not set; allowing any origin");
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                public_url: "http://localhost:8080".to_string(),
                cors_origin: Some("http://localhost:5173".to_string()),
            },
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/linko-test.db"),
            },
            storage: StorageConfig {
                bucket: "media".to_string(),
                public_url: "https://media.example.com/".to_string(),
            },
            cloudflare: CloudflareConfig {
                account_id: "account".to_string(),
                r2_access_key_id: "access-key".to_string(),
                r2_secret_access_key: "secret-key".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "x".repeat(32),
                token_ttl_days: 30,
            },
            messaging: MessagingConfig {
                max_length: 1000,
                rate_limit_count: 10,
                rate_limit_window_seconds: 10,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.media_base_url(), "https://media.example.com");
    }

    #[test]
    fn validate_rejects_short_jwt_secret() {
        let mut config = valid_config();
        config.auth.jwt_secret = "short-secret".to_string();

        let error = config
            .validate()
            .expect_err("jwt secret shorter than 32 bytes must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("auth.jwt_secret")
        ));
    }

    #[test]
    fn validate_rejects_zero_rate_limit() {
        let mut config = valid_config();
        config.messaging.rate_limit_count = 0;

        let error = config
            .validate()
            .expect_err("zero rate limit must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("messaging")
        ));
    }

    #[test]
    fn validate_rejects_invalid_media_url() {
        let mut config = valid_config();
        config.storage.public_url = "not a url".to_string();

        assert!(config.validate().is_err());
    }
}
