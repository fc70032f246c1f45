//! OAuth2 authorization-code client
//!
//! Handles:
//! - Authorization redirect URL construction
//! - Code-for-token exchange against the provider
//! - Unverified identity-claim decoding for display

mod claims;
mod oauth;

pub use claims::{Audience, CLAIM_PLACEHOLDER, IdentityClaims, UserDetails, decode_unverified};
pub use oauth::{OAuthClient, TokenResponse, generate_state};
