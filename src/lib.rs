//! Codegrant - a minimal OAuth2 authorization-code relying party
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - /auth, /callback, /logout redirect dance                 │
//! │  - / profile page, /metrics                                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     OAuth2 Client                            │
//! │  - Authorization URL construction                           │
//! │  - Code-for-token exchange                                  │
//! │  - Unverified identity-claim decoding                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Session Store                            │
//! │  - Signed-cookie session identifiers                        │
//! │  - Injected key-value store (in-memory by default)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers for the flow routes and profile page
//! - `auth`: OAuth2 client and identity-claim decoding
//! - `session`: Session records, store interface, cookie handling
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod session;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like the OAuth2 client and session store.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// OAuth2 client for the configured provider
    pub oauth: Arc<auth::OAuthClient>,

    /// Session store, keyed by opaque session ID
    pub sessions: Arc<dyn session::SessionStore>,
}

impl AppState {
    /// Initialize application state
    ///
    /// Builds the shared HTTP client, the OAuth2 client, and the
    /// default in-memory session store.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built or the
    /// provider endpoints cannot be derived from configuration.
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let http_client = reqwest::Client::builder()
            .user_agent("Codegrant/0.1.0")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        let oauth = auth::OAuthClient::new(&config, http_client)?;
        tracing::info!(provider = %config.oauth.token_host, "OAuth2 client initialized");

        Ok(Self {
            config: Arc::new(config),
            oauth: Arc::new(oauth),
            sessions: Arc::new(session::MemoryStore::new()),
        })
    }

    /// Replace the session store
    ///
    /// The store is an injected interface so deployments (and tests)
    /// can substitute another backing implementation.
    pub fn with_session_store(mut self, store: Arc<dyn session::SessionStore>) -> Self {
        self.sessions = store;
        self
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::auth_router())
        .merge(api::home_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}
