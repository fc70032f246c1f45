//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // OAuth flow metrics
    pub static ref AUTH_REDIRECTS_TOTAL: IntCounter = IntCounter::new(
        "codegrant_auth_redirects_total",
        "Total number of authorization redirects issued"
    ).expect("metric can be created");
    pub static ref TOKEN_EXCHANGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("codegrant_token_exchanges_total", "Total number of code-for-token exchanges"),
        &["outcome"]
    ).expect("metric can be created");

    // Session metrics
    pub static ref SESSIONS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "codegrant_sessions_created_total",
        "Total number of sessions created"
    ).expect("metric can be created");
    pub static ref SESSIONS_DESTROYED_TOTAL: IntCounter = IntCounter::new(
        "codegrant_sessions_destroyed_total",
        "Total number of sessions destroyed"
    ).expect("metric can be created");

    // Error metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("codegrant_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(AUTH_REDIRECTS_TOTAL.clone()))
        .expect("AUTH_REDIRECTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(TOKEN_EXCHANGES_TOTAL.clone()))
        .expect("TOKEN_EXCHANGES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SESSIONS_CREATED_TOTAL.clone()))
        .expect("SESSIONS_CREATED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SESSIONS_DESTROYED_TOTAL.clone()))
        .expect("SESSIONS_DESTROYED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
