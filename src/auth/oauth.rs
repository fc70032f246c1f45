//! OAuth2 client
//!
//! Implements the relying-party half of the OAuth 2.0 authorization
//! code flow: building the authorization redirect, exchanging the
//! returned code for tokens (confidential client), and composing the
//! provider logout URL.

use std::time::Duration;

use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::metrics::TOKEN_EXCHANGES_TOTAL;

const AUTHORIZE_PATH: &str = "/oauth2/auth";
const TOKEN_PATH: &str = "/oauth2/token";
const LOGOUT_PATH: &str = "/oauth2/sessions/logout";

/// Token response stored in the session
///
/// Built once per successful exchange and never refreshed. `expires_at`
/// is computed at exchange time from the provider's `expires_in`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Wire-format reply from the provider's token endpoint
#[derive(Debug, Deserialize)]
struct TokenReply {
    access_token: String,
    token_type: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    id_token: Option<String>,
    scope: Option<String>,
}

impl TokenResponse {
    fn from_reply(reply: TokenReply, now: DateTime<Utc>) -> Self {
        Self {
            token_type: reply.token_type,
            access_token: reply.access_token,
            refresh_token: reply.refresh_token,
            id_token: reply.id_token,
            scope: reply.scope,
            expires_at: reply
                .expires_in
                .map(|secs| now + chrono::Duration::seconds(secs)),
        }
    }
}

/// Failure modes of a single exchange attempt
#[derive(Debug, thiserror::Error)]
enum ExchangeError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider rejected exchange with status {status}")]
    Provider { status: StatusCode, body: String },
}

impl ExchangeError {
    /// Transient transport failures are worth one retry
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout() || e.is_connect())
    }
}

/// OAuth2 authorization-code client (confidential)
pub struct OAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    authorize_endpoint: Url,
    token_endpoint: Url,
    logout_endpoint: Url,
    redirect_uri: String,
    post_logout_redirect: String,
    scopes: String,
    exchange_timeout: Duration,
}

impl OAuthClient {
    /// Build the client from configuration
    ///
    /// # Errors
    /// Returns error if the provider base URL cannot be joined with the
    /// fixed endpoint paths.
    pub fn new(config: &AppConfig, http: reqwest::Client) -> Result<Self, AppError> {
        let token_host = Url::parse(&config.oauth.token_host)
            .map_err(|e| AppError::Config(format!("oauth.token_host is not a valid URL: {e}")))?;
        let join = |path: &str| {
            token_host
                .join(path)
                .map_err(|e| AppError::Config(format!("cannot derive provider endpoint: {e}")))
        };

        Ok(Self {
            http,
            client_id: config.oauth.client_id.clone(),
            client_secret: config.oauth.client_secret.clone(),
            authorize_endpoint: join(AUTHORIZE_PATH)?,
            token_endpoint: join(TOKEN_PATH)?,
            logout_endpoint: join(LOGOUT_PATH)?,
            redirect_uri: config.server.redirect_uri(),
            post_logout_redirect: config.server.base_path.clone(),
            scopes: config.oauth.scopes.clone(),
            exchange_timeout: Duration::from_secs(config.oauth.exchange_timeout_seconds),
        })
    }

    /// The callback URL sent with authorization and exchange requests
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Build the authorization redirect URL for one attempt
    pub fn authorize_url(&self, state: &str) -> Url {
        let mut url = self.authorize_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scopes)
            .append_pair("state", state);
        url
    }

    /// Build the provider logout URL
    ///
    /// Carries the client id and the URL-encoded post-logout redirect
    /// target back to this service.
    pub fn logout_url(&self) -> Url {
        let mut url = self.logout_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.post_logout_redirect);
        url
    }

    /// Exchange an authorization code for tokens
    ///
    /// Each attempt is bounded by the configured timeout; a transient
    /// transport failure is retried exactly once. Provider rejections
    /// and exhausted retries both surface as the opaque
    /// `AppError::TokenExchange` — the full detail is logged for the
    /// operator and never returned to the client.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.request_token(code).await {
                Ok(reply) => {
                    TOKEN_EXCHANGES_TOTAL.with_label_values(&["success"]).inc();
                    return Ok(TokenResponse::from_reply(reply, Utc::now()));
                }
                Err(error) if attempt == 1 && error.is_transient() => {
                    tracing::warn!(%error, "Token exchange hit transient failure; retrying once");
                }
                Err(error) => {
                    TOKEN_EXCHANGES_TOTAL.with_label_values(&["failure"]).inc();
                    match &error {
                        ExchangeError::Transport(e) => {
                            tracing::error!(error = %e, "Token exchange transport failure")
                        }
                        ExchangeError::Provider { status, body } => {
                            tracing::error!(%status, body = %body, "Provider rejected token exchange")
                        }
                    }
                    return Err(AppError::TokenExchange);
                }
            }
        }
    }

    async fn request_token(&self, code: &str) -> Result<TokenReply, ExchangeError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(self.token_endpoint.clone())
            .form(&params)
            .timeout(self.exchange_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Provider { status, body });
        }

        Ok(response.json::<TokenReply>().await?)
    }
}

/// Generate a random anti-CSRF state nonce for one authorization attempt
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
