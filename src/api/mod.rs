//! API layer
//!
//! HTTP handlers for:
//! - The OAuth2 authorization-code flow (`/auth`, `/callback`, `/logout`)
//! - The profile page (`/`)
//! - Metrics (Prometheus)

mod auth;
mod home;
pub mod metrics;

pub use auth::auth_router;
pub use home::home_router;
pub use metrics::metrics_router;
