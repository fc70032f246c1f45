//! Server-side session management
//!
//! Sessions are small mutable records keyed by an opaque identifier.
//! The identifier travels in an HMAC-signed cookie; the record itself
//! stays server-side behind the [`SessionStore`] interface so the
//! backing store can be swapped without touching the handlers.

mod store;

pub use store::MemoryStore;

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::auth::TokenResponse;
use crate::config::AppConfig;
use crate::error::AppError;

/// Opaque session identifier (cookie-carried, store key)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new random identifier (32 bytes, base64url)
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-session mutable state
///
/// `token` is set only by a successful callback exchange and is the
/// sole logged-in signal. `oauth_state` holds the anti-CSRF nonce for
/// a pending authorization attempt and is cleared once the callback
/// consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Token response from the provider, if authenticated
    pub token: Option<TokenResponse>,
    /// Pending authorization state nonce
    pub oauth_state: Option<String>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session expires
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Create an empty record with the given time-to-live
    pub fn new(max_age_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            token: None,
            oauth_state: None,
            created_at: now,
            expires_at: now + Duration::seconds(max_age_seconds),
        }
    }

    /// Check if the session has outlived its TTL
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Key-value session store interface
///
/// Injected into handlers through `AppState` as `Arc<dyn SessionStore>`
/// so an in-memory, file, or distributed backing store are all valid
/// implementations. Implementations are responsible for their own
/// internal concurrency safety.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a record; expired records count as absent
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, AppError>;

    /// Persist a record under the given identifier
    async fn save(&self, id: &SessionId, record: SessionRecord) -> Result<(), AppError>;

    /// Remove a record; removing an unknown identifier is not an error
    async fn destroy(&self, id: &SessionId) -> Result<(), AppError>;
}

// =============================================================================
// Cookie signing
// =============================================================================

type HmacSha256 = hmac::Hmac<sha2::Sha256>;

/// Sign a session identifier for cookie transport
///
/// Cookie value format: `{id}.{base64url(hmac_sha256(id))}`
pub fn sign_session_id(id: &SessionId, secret: &str) -> Result<String, AppError> {
    use hmac::Mac;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Session(e.to_string()))?;
    mac.update(id.as_str().as_bytes());
    let signature = mac.finalize().into_bytes();

    Ok(format!(
        "{}.{}",
        id.as_str(),
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Verify a signed cookie value and recover the session identifier
///
/// A malformed or tampered value yields `None`; the caller starts a
/// fresh session instead of failing the request.
pub fn verify_session_cookie(value: &str, secret: &str) -> Option<SessionId> {
    use hmac::Mac;

    let (id, signature_b64) = value.rsplit_once('.')?;
    if id.is_empty() {
        return None;
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(id.as_bytes());

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).ok()?;
    mac.verify_slice(&signature).ok()?;

    Some(SessionId(id.to_string()))
}

// =============================================================================
// Request-scoped session handle
// =============================================================================

/// The current request's session
///
/// Resolved from the session cookie; an absent, invalid, or expired
/// cookie silently starts a fresh (not yet persisted) session.
/// Mutations take effect only after an explicit, awaited [`save`].
///
/// [`save`]: SessionHandle::save
pub struct SessionHandle {
    id: SessionId,
    pub record: SessionRecord,
    store: Arc<dyn SessionStore>,
    fresh: bool,
}

impl SessionHandle {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Whether this session has never been persisted
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Persist the current record
    ///
    /// Must complete before a success response is issued, so a redirect
    /// to `/` never reads a session that has not been written yet.
    pub async fn save(&mut self) -> Result<(), AppError> {
        self.store.save(&self.id, self.record.clone()).await?;
        if self.fresh {
            crate::metrics::SESSIONS_CREATED_TOTAL.inc();
            self.fresh = false;
        }
        Ok(())
    }

    /// Remove the record from the store
    pub async fn destroy(&self) -> Result<(), AppError> {
        self.store.destroy(&self.id).await?;
        crate::metrics::SESSIONS_DESTROYED_TOTAL.inc();
        Ok(())
    }

    /// Build the outgoing session cookie for this session
    pub fn cookie(&self, config: &AppConfig) -> Result<Cookie<'static>, AppError> {
        let value = sign_session_id(&self.id, &config.session.secret)?;

        Ok(Cookie::build((config.session.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(config.should_use_secure_cookies())
            .max_age(cookie::time::Duration::seconds(
                config.session.max_age_seconds,
            ))
            .build())
    }

    /// Build a removal cookie clearing the session cookie
    pub fn removal_cookie(config: &AppConfig) -> Cookie<'static> {
        let mut cookie = Cookie::build((config.session.cookie_name.clone(), String::new()))
            .path("/")
            .http_only(true)
            .build();
        cookie.make_removal();
        cookie
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionHandle
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        if let Some(cookie) = jar.get(&state.config.session.cookie_name) {
            match verify_session_cookie(cookie.value(), &state.config.session.secret) {
                Some(id) => {
                    if let Some(record) = state.sessions.load(&id).await? {
                        if !record.is_expired() {
                            return Ok(Self {
                                id,
                                record,
                                store: state.sessions.clone(),
                                fresh: false,
                            });
                        }
                    }
                }
                None => {
                    tracing::debug!("Discarding session cookie with invalid signature");
                }
            }
        }

        Ok(Self {
            id: SessionId::generate(),
            record: SessionRecord::new(state.config.session.max_age_seconds),
            store: state.sessions.clone(),
            fresh: true,
        })
    }
}
