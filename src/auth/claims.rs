//! Identity token claims
//!
//! Decodes the claims segment of a compact JWS identity token without
//! verifying its signature. The claims are used for display only and
//! never for authorization decisions; verification would slot in here
//! if that ever changes.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{TimeZone, Utc};
use serde::Deserialize;

use crate::error::AppError;

/// Rendered in place of any absent claim
pub const CLAIM_PLACEHOLDER: &str = "(not provided)";

/// Audience claim: a scalar for a single audience, an array otherwise
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    /// Human-readable audience value
    pub fn join(&self) -> String {
        match self {
            Audience::One(aud) => aud.clone(),
            Audience::Many(auds) => auds.join(", "),
        }
    }
}

/// Claims decoded from the identity token
///
/// Every field may be absent; rendering substitutes
/// [`CLAIM_PLACEHOLDER`] rather than failing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityClaims {
    pub sub: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub auth_time: Option<i64>,
    pub iat: Option<i64>,
    pub exp: Option<i64>,
    pub sid: Option<String>,
    pub iss: Option<String>,
    pub aud: Option<Audience>,
    pub jti: Option<String>,
}

/// Decode the claims segment of a compact JWS token
///
/// No signature verification is performed.
///
/// # Errors
/// Returns `AppError::ClaimDecode` for anything that is not three
/// dot-separated segments with a base64url JSON payload.
pub fn decode_unverified(id_token: &str) -> Result<IdentityClaims, AppError> {
    let mut segments = id_token.split('.');
    let payload = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            return Err(AppError::ClaimDecode(
                "token is not in compact JWS form".to_string(),
            ));
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AppError::ClaimDecode(format!("claims segment is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::ClaimDecode(format!("claims are not valid JSON: {e}")))
}

/// Presentation view of the identity claims
///
/// Every field is a ready-to-render string; absent claims carry the
/// placeholder and epoch timestamps are formatted as UTC date-times.
#[derive(Debug, Clone, PartialEq)]
pub struct UserDetails {
    pub name: String,
    pub email: String,
    pub sub: String,
    pub auth_time: String,
    pub issued_at: String,
    pub expires_at: String,
    pub session_id: String,
    pub issuer: String,
    pub audience: String,
    pub jti: String,
}

impl UserDetails {
    pub fn from_claims(claims: &IdentityClaims) -> Self {
        Self {
            name: display_name(claims),
            email: text_or_placeholder(claims.email.as_deref()),
            sub: text_or_placeholder(claims.sub.as_deref()),
            auth_time: format_epoch(claims.auth_time),
            issued_at: format_epoch(claims.iat),
            expires_at: format_epoch(claims.exp),
            session_id: text_or_placeholder(claims.sid.as_deref()),
            issuer: text_or_placeholder(claims.iss.as_deref()),
            audience: claims
                .aud
                .as_ref()
                .map(Audience::join)
                .unwrap_or_else(|| CLAIM_PLACEHOLDER.to_string()),
            jti: text_or_placeholder(claims.jti.as_deref()),
        }
    }
}

fn text_or_placeholder(value: Option<&str>) -> String {
    match value {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => CLAIM_PLACEHOLDER.to_string(),
    }
}

/// Compose a display name from the name claims
///
/// Prefers `first_name`/`last_name`, falls back to the composite
/// `name` claim.
fn display_name(claims: &IdentityClaims) -> String {
    let parts: Vec<&str> = [claims.first_name.as_deref(), claims.last_name.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect();

    if !parts.is_empty() {
        return parts.join(" ");
    }

    text_or_placeholder(claims.name.as_deref())
}

/// Format a UNIX-epoch claim as a UTC date-time string
fn format_epoch(secs: Option<i64>) -> String {
    secs.and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| CLAIM_PLACEHOLDER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Compact-JWS encode claims with a junk header and signature
    fn encode_token(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        format!("{header}.{payload}.c2lnbmF0dXJl")
    }

    #[test]
    fn decodes_claims_without_verifying_signature() {
        let token = encode_token(&serde_json::json!({
            "sub": "u1",
            "email": "a@b.com",
            "aud": ["x", "y"],
            "exp": 1_700_000_000_i64,
        }));

        let claims = decode_unverified(&token).expect("decode succeeds");
        assert_eq!(claims.sub.as_deref(), Some("u1"));
        assert_eq!(claims.email.as_deref(), Some("a@b.com"));
        assert_eq!(
            claims.aud,
            Some(Audience::Many(vec!["x".to_string(), "y".to_string()]))
        );
        assert_eq!(claims.exp, Some(1_700_000_000));
    }

    #[test]
    fn rejects_token_without_three_segments() {
        assert!(decode_unverified("only-one-segment").is_err());
        assert!(decode_unverified("two.segments").is_err());
        assert!(decode_unverified("a.b.c.d").is_err());
    }

    #[test]
    fn rejects_non_base64_payload() {
        let error = decode_unverified("header.!!!.sig").expect_err("must fail");
        assert!(matches!(error, AppError::ClaimDecode(_)));
    }

    #[test]
    fn rejects_non_json_payload() {
        let payload = URL_SAFE_NO_PAD.encode(b"not json");
        let token = format!("header.{payload}.sig");
        assert!(decode_unverified(&token).is_err());
    }

    #[test]
    fn user_details_joins_array_audience_and_formats_expiry() {
        let token = encode_token(&serde_json::json!({
            "sub": "u1",
            "email": "a@b.com",
            "aud": ["x", "y"],
            "exp": 1_700_000_000_i64,
        }));
        let claims = decode_unverified(&token).unwrap();

        let details = UserDetails::from_claims(&claims);
        assert_eq!(details.audience, "x, y");
        assert_eq!(details.expires_at, "2023-11-14 22:13:20 UTC");
        assert_eq!(details.sub, "u1");
        assert_eq!(details.email, "a@b.com");

        // Every other optional claim renders as the placeholder.
        assert_eq!(details.name, CLAIM_PLACEHOLDER);
        assert_eq!(details.auth_time, CLAIM_PLACEHOLDER);
        assert_eq!(details.issued_at, CLAIM_PLACEHOLDER);
        assert_eq!(details.session_id, CLAIM_PLACEHOLDER);
        assert_eq!(details.issuer, CLAIM_PLACEHOLDER);
        assert_eq!(details.jti, CLAIM_PLACEHOLDER);
    }

    #[test]
    fn scalar_audience_is_used_as_is() {
        let claims = IdentityClaims {
            aud: Some(Audience::One("single-client".to_string())),
            ..Default::default()
        };

        let details = UserDetails::from_claims(&claims);
        assert_eq!(details.audience, "single-client");
    }

    #[test]
    fn display_name_prefers_first_and_last_name() {
        let claims = IdentityClaims {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            name: Some("ignored".to_string()),
            ..Default::default()
        };
        assert_eq!(UserDetails::from_claims(&claims).name, "Ada Lovelace");
    }

    #[test]
    fn display_name_falls_back_to_name_claim() {
        let claims = IdentityClaims {
            name: Some("Ada Lovelace".to_string()),
            ..Default::default()
        };
        assert_eq!(UserDetails::from_claims(&claims).name, "Ada Lovelace");
    }

    #[test]
    fn partial_name_does_not_render_placeholder_half() {
        let claims = IdentityClaims {
            first_name: Some("Ada".to_string()),
            ..Default::default()
        };
        assert_eq!(UserDetails::from_claims(&claims).name, "Ada");
    }

    #[test]
    fn out_of_range_epoch_renders_placeholder() {
        let claims = IdentityClaims {
            exp: Some(i64::MAX),
            ..Default::default()
        };
        assert_eq!(UserDetails::from_claims(&claims).expires_at, CLAIM_PLACEHOLDER);
    }
}
