//! Authorization-code flow endpoints
//!
//! The three redirect-dance routes. The profile page lives in
//! [`super::home`].

use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Json, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::AppState;
use crate::auth::generate_state;
use crate::error::AppError;
use crate::metrics::AUTH_REDIRECTS_TOTAL;
use crate::session::SessionHandle;

/// Create the authorization flow router
///
/// Routes:
/// - GET /auth - Redirect to the provider's authorize endpoint
/// - GET /callback - Code-for-token exchange
/// - GET /logout - Local session teardown + provider logout redirect
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth", get(authorize_redirect))
        .route("/callback", get(callback))
        .route("/logout", get(logout))
}

// =============================================================================
// Authorization redirect
// =============================================================================

/// GET /auth
///
/// # Steps
/// 1. Generate a fresh state nonce for this attempt
/// 2. Store it in the session and await the save
/// 3. Redirect to the provider with client_id, redirect_uri, scope, state
async fn authorize_redirect(
    State(app): State<AppState>,
    jar: CookieJar,
    mut session: SessionHandle,
) -> Result<Response, AppError> {
    let nonce = generate_state();
    session.record.oauth_state = Some(nonce.clone());
    session.save().await?;

    let jar = jar.add(session.cookie(&app.config)?);
    let authorization_url = app.oauth.authorize_url(&nonce);
    tracing::debug!(url = %authorization_url, "Issuing authorization redirect");
    AUTH_REDIRECTS_TOTAL.inc();

    Ok((jar, Redirect::to(authorization_url.as_str())).into_response())
}

// =============================================================================
// Callback exchange
// =============================================================================

/// Query parameters from the provider callback
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// Anti-CSRF state nonce, echoed by the provider
    state: Option<String>,
    /// Provider-side authorization error
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /callback
///
/// # Steps
/// 1. Reject provider errors and missing parameters
/// 2. Compare `state` against the pending nonce (before any network call)
/// 3. Exchange the code for tokens
/// 4. Store the token in the session; the save must complete before the
///    success response is issued
/// 5. Redirect to `/`, or return the token JSON in the raw-API variant
async fn callback(
    State(app): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
    mut session: SessionHandle,
) -> Result<Response, AppError> {
    if let Some(error) = &query.error {
        tracing::error!(
            %error,
            description = ?query.error_description,
            "Provider returned an authorization error"
        );
        return Err(AppError::TokenExchange);
    }

    let code = query
        .code
        .as_deref()
        .ok_or_else(|| AppError::Validation("missing code parameter".to_string()))?;

    // The nonce is single-use: taken here, persisted as cleared only on
    // the success path below.
    let pending = session.record.oauth_state.take();
    match (pending.as_deref(), query.state.as_deref()) {
        (Some(pending), Some(state)) if pending == state => {}
        _ => {
            tracing::warn!("Callback state did not match the pending authorization attempt");
            return Err(AppError::StateMismatch);
        }
    }

    let token = app.oauth.exchange_code(code).await?;

    session.record.token = Some(token.clone());
    session
        .save()
        .await
        .map_err(|e| AppError::SessionPersist(e.to_string()))?;

    let jar = jar.add(session.cookie(&app.config)?);
    if app.config.oauth.raw_callback_response {
        Ok((jar, Json(token)).into_response())
    } else {
        Ok((jar, Redirect::to("/")).into_response())
    }
}

// =============================================================================
// Logout
// =============================================================================

/// GET /logout
///
/// Best-effort destroys the local session, then redirects to the
/// provider's logout endpoint regardless of the destroy outcome — the
/// provider-side logout is authoritative.
async fn logout(
    State(app): State<AppState>,
    jar: CookieJar,
    session: SessionHandle,
) -> impl IntoResponse {
    if let Err(error) = session.destroy().await {
        tracing::error!(%error, "Failed to destroy session during logout");
    }

    let jar = jar.add(SessionHandle::removal_cookie(&app.config));
    let logout_url = app.oauth.logout_url();

    (jar, Redirect::to(logout_url.as_str()))
}
