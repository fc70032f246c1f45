//! Home / profile page

use axum::{
    Router,
    extract::State,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use html_escape::encode_text;

use crate::AppState;
use crate::auth::{UserDetails, decode_unverified};
use crate::error::AppError;
use crate::session::SessionHandle;

/// Create the home page router
pub fn home_router() -> Router<AppState> {
    Router::new().route("/", get(home))
}

/// GET /
///
/// Renders the profile page. The presence of a session token is the
/// sole logged-in signal; a token without a decodable identity token
/// renders a degraded view instead of failing the request.
async fn home(
    State(app): State<AppState>,
    jar: CookieJar,
    mut session: SessionHandle,
) -> Result<Response, AppError> {
    // Sessions are created implicitly on first request.
    if session.is_fresh() {
        session.save().await?;
    }
    let jar = jar.add(session.cookie(&app.config)?);

    let token = session.record.token.as_ref();
    let user_details = token
        .and_then(|token| token.id_token.as_deref())
        .and_then(|id_token| match decode_unverified(id_token) {
            Ok(claims) => Some(UserDetails::from_claims(&claims)),
            Err(error) => {
                tracing::error!(%error, "Failed to decode identity token");
                None
            }
        });
    let token_json = token
        .map(serde_json::to_string_pretty)
        .transpose()
        .map_err(|e| AppError::Internal(e.into()))?;

    let page = render_home(user_details.as_ref(), token_json.as_deref());
    Ok((jar, Html(page)).into_response())
}

fn render_home(details: Option<&UserDetails>, token_json: Option<&str>) -> String {
    let mut body = String::new();
    body.push_str("<h1>Codegrant</h1>\n");

    match token_json {
        None => {
            body.push_str("<p>You are not signed in.</p>\n");
            body.push_str("<p><a href=\"/auth\">Sign in</a></p>\n");
        }
        Some(token_json) => {
            body.push_str("<p>You are signed in.</p>\n");
            match details {
                Some(details) => body.push_str(&render_details(details)),
                None => {
                    body.push_str("<p>Identity details are unavailable for this session.</p>\n")
                }
            }
            body.push_str("<h2>Token</h2>\n<pre>");
            body.push_str(&encode_text(token_json));
            body.push_str("</pre>\n");
            body.push_str("<p><a href=\"/logout\">Sign out</a></p>\n");
        }
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Codegrant</title></head>\n<body>\n{body}</body>\n</html>\n"
    )
}

fn render_details(details: &UserDetails) -> String {
    let rows = [
        ("Name", &details.name),
        ("Email", &details.email),
        ("Subject", &details.sub),
        ("Authenticated at", &details.auth_time),
        ("Issued at", &details.issued_at),
        ("Expires at", &details.expires_at),
        ("Session", &details.session_id),
        ("Issuer", &details.issuer),
        ("Audience", &details.audience),
        ("Token ID", &details.jti),
    ];

    let mut table = String::from("<h2>Identity</h2>\n<table>\n");
    for (label, value) in rows {
        table.push_str(&format!(
            "<tr><th>{}</th><td>{}</td></tr>\n",
            label,
            encode_text(value)
        ));
    }
    table.push_str("</table>\n");
    table
}
