//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Form;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use codegrant::session::SessionStore;
use codegrant::{AppState, config};
use tokio::net::TcpListener;

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub provider: StubProvider,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::spawn(|_| {}, None).await
    }

    /// Create a test server with adjusted configuration
    pub async fn with_config(adjust: impl FnOnce(&mut config::AppConfig)) -> Self {
        Self::spawn(adjust, None).await
    }

    /// Create a test server with a substituted session store
    pub async fn with_session_store(store: Arc<dyn SessionStore>) -> Self {
        Self::spawn(|_| {}, Some(store)).await
    }

    async fn spawn(
        adjust: impl FnOnce(&mut config::AppConfig),
        store: Option<Arc<dyn SessionStore>>,
    ) -> Self {
        // Stub authorization server for the code-for-token exchange
        let provider = StubProvider::spawn().await;

        // Create test configuration
        let mut config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                base_path: "http://rp.test.example.com".to_string(),
                production: false,
            },
            oauth: config::OAuthConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                token_host: provider.url.clone(),
                scopes: "openid offline".to_string(),
                exchange_timeout_seconds: 5,
                raw_callback_response: false,
            },
            session: config::SessionConfig {
                secret: "test-secret-key-32-bytes-long!!!".to_string(),
                max_age_seconds: 86_400,
                cookie_name: "session".to_string(),
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };
        adjust(&mut config);

        // Initialize app state
        let mut state = AppState::new(config).unwrap();
        if let Some(store) = store {
            state = state.with_session_store(store);
        }

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = codegrant::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            provider,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }
}

/// HTTP client that surfaces redirects instead of following them
pub fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build no-redirect client")
}

/// Extract the session cookie pair ("session=...") from a response
pub fn session_cookie(response: &reqwest::Response) -> String {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session="))
        .and_then(|v| v.split(';').next())
        .map(ToString::to_string)
        .expect("session cookie set")
}

/// Extract a query parameter from a redirect location
pub fn query_param(location: &str, key: &str) -> Option<String> {
    url::Url::parse(location)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Location header of a redirect response
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

/// Run the full /auth + /callback dance with the given code
///
/// Returns the session cookie pair for follow-up requests.
pub async fn login_with_code(server: &TestServer, code: &str) -> String {
    let client = no_redirect_client();

    let response = client
        .get(server.url("/auth"))
        .send()
        .await
        .expect("auth request succeeds");
    assert!(response.status().is_redirection());
    let cookie = session_cookie(&response);
    let state = query_param(&location(&response), "state").expect("state param");

    let response = client
        .get(server.url(&format!("/callback?code={code}&state={state}")))
        .header("Cookie", &cookie)
        .send()
        .await
        .expect("callback request succeeds");
    assert!(
        response.status().is_redirection() || response.status().is_success(),
        "callback failed with status {}",
        response.status()
    );

    session_cookie(&response)
}

/// Compact-JWS encode claims with a junk header and signature
pub fn encode_id_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Identity claims issued by the stub provider for `valid-code`
pub fn default_id_token_claims() -> serde_json::Value {
    serde_json::json!({
        "sub": "u1",
        "email": "a@b.com",
        "aud": ["x", "y"],
        "exp": 1_700_000_000_i64,
    })
}

// =============================================================================
// Stub authorization server
// =============================================================================

/// In-process authorization server covering the token endpoint
///
/// Recognized codes:
/// - `valid-code`: full token response with an ID token
/// - `no-id-token`: token response without an ID token
/// - `garbled-id-token`: token response with an undecodable ID token
/// - anything else: `invalid_grant` rejection
pub struct StubProvider {
    pub url: String,
}

impl StubProvider {
    pub async fn spawn() -> Self {
        let app = Router::new().route("/oauth2/token", post(stub_token_endpoint));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
        }
    }
}

async fn stub_token_endpoint(Form(params): Form<HashMap<String, String>>) -> Response {
    let get = |key: &str| params.get(key).map(String::as_str).unwrap_or_default();

    if get("grant_type") != "authorization_code"
        || get("client_id") != "test-client-id"
        || get("client_secret") != "test-client-secret"
    {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "invalid_client"})),
        )
            .into_response();
    }

    let token = |id_token: Option<String>| {
        let mut body = serde_json::json!({
            "access_token": "test-access-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "test-refresh-token",
            "scope": "openid offline",
        });
        if let Some(id_token) = id_token {
            body["id_token"] = serde_json::Value::String(id_token);
        }
        Json(body).into_response()
    };

    match get("code") {
        "valid-code" => token(Some(encode_id_token(&default_id_token_claims()))),
        "no-id-token" => token(None),
        "garbled-id-token" => token(Some("not-a-jwt".to_string())),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "invalid_grant"})),
        )
            .into_response(),
    }
}
