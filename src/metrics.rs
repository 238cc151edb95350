//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{Counter, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("linko_http_requests_total", "Total number of HTTP requests"),
        &["method", "status"]
    ).expect("metric can be created");

    // Domain Metrics
    pub static ref USERS_REGISTERED_TOTAL: IntCounter = IntCounter::new(
        "linko_users_registered_total",
        "Total number of registered users"
    ).expect("metric can be created");
    pub static ref POSTS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "linko_posts_created_total",
        "Total number of posts created"
    ).expect("metric can be created");
    pub static ref MESSAGES_SENT_TOTAL: IntCounter = IntCounter::new(
        "linko_messages_sent_total",
        "Total number of direct messages sent"
    ).expect("metric can be created");
    pub static ref MESSAGES_RATE_LIMITED_TOTAL: IntCounter = IntCounter::new(
        "linko_messages_rate_limited_total",
        "Total number of direct messages rejected by the rate limit"
    ).expect("metric can be created");

    // Storage Metrics
    pub static ref MEDIA_UPLOADS_TOTAL: IntCounter = IntCounter::new(
        "linko_media_uploads_total",
        "Total number of media uploads"
    ).expect("metric can be created");
    pub static ref MEDIA_BYTES_UPLOADED: Counter = Counter::new(
        "linko_media_bytes_uploaded_total",
        "Total bytes of media uploaded"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("linko_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("HTTP_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(USERS_REGISTERED_TOTAL.clone()))
        .expect("USERS_REGISTERED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(POSTS_CREATED_TOTAL.clone()))
        .expect("POSTS_CREATED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(MESSAGES_SENT_TOTAL.clone()))
        .expect("MESSAGES_SENT_TOTAL can be registered");
    REGISTRY
        .register(Box::new(MESSAGES_RATE_LIMITED_TOTAL.clone()))
        .expect("MESSAGES_RATE_LIMITED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(MEDIA_UPLOADS_TOTAL.clone()))
        .expect("MEDIA_UPLOADS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(MEDIA_BYTES_UPLOADED.clone()))
        .expect("MEDIA_BYTES_UPLOADED can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Record a finished HTTP request.
pub fn observe_http_request(method: &str, status: u16) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, &status.to_string()])
        .inc();
}
