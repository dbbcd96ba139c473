//! PKCE (Proof Key for Code Exchange) per RFC 7636
//!
//! The verifier stays in server-side session state; only its S256 challenge
//! leaves the server in the authorization URL. The provider re-derives the
//! challenge from the verifier sent at token exchange and rejects a mismatch,
//! so an intercepted authorization code is useless on its own.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};
use url::Url;

use crate::constants::{CODE_CHALLENGE_METHOD, RESPONSE_TYPE};
use crate::error::{Error, Result};

/// Random bytes behind each verifier (RFC 7636 requires at least 32).
const VERIFIER_BYTES: usize = 64;

/// Random bytes behind each anti-forgery state token.
const STATE_BYTES: usize = 32;

/// Generate a cryptographically random PKCE code verifier.
///
/// 64 random bytes encode to 86 URL-safe base64 characters, inside the
/// 43-128 character range RFC 7636 allows.
pub fn generate_verifier() -> String {
    random_token::<VERIFIER_BYTES>()
}

/// Compute the S256 code challenge: `BASE64URL(SHA256(verifier))`.
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate the anti-forgery `state` token round-tripped through the provider.
pub fn generate_state() -> String {
    random_token::<STATE_BYTES>()
}

fn random_token<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Query parameters of one authorization request.
///
/// Built once per sign-in attempt and rendered straight into the redirect
/// URL; nothing here is persisted except the state, which the flow stores
/// alongside the verifier.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest<'a> {
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scope: &'a str,
    pub state: &'a str,
    pub code_challenge: &'a str,
}

impl AuthorizationRequest<'_> {
    /// Render the full authorization URL against `authorize_endpoint`.
    pub fn authorization_url(&self, authorize_endpoint: &str) -> Result<String> {
        let mut url = Url::parse(authorize_endpoint).map_err(|e| {
            Error::Configuration(format!(
                "invalid authorization endpoint {authorize_endpoint}: {e}"
            ))
        })?;

        url.query_pairs_mut()
            .append_pair("response_type", RESPONSE_TYPE)
            .append_pair("client_id", self.client_id)
            .append_pair("redirect_uri", self.redirect_uri)
            .append_pair("scope", self.scope)
            .append_pair("state", self.state)
            .append_pair("code_challenge", self.code_challenge)
            .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD);

        Ok(url.into())
    }
}
