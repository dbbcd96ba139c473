//! Authorization-code exchange against the token endpoint
//!
//! One form-encoded POST per callback. No retries and no caching: a timed
//! out or rejected exchange is reported and the user restarts the sign-in.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};

/// Form fields for the `authorization_code` grant.
///
/// `redirect_uri` must be byte-identical to the one sent in the
/// authorization request; the provider rejects the exchange otherwise.
pub struct ExchangeRequest<'a> {
    pub code: &'a str,
    pub code_verifier: &'a str,
    pub client_id: &'a str,
    /// Omitted for public clients that rely on PKCE alone.
    pub client_secret: Option<&'a str>,
    pub redirect_uri: &'a str,
}

/// Successful token endpoint response.
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Instance host for REST calls made with this token
    pub instance_url: String,
    /// Issued when the `refresh_token` scope is granted; never used here
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// Identity URL of the authenticated user
    #[serde(default)]
    pub id: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("instance_url", &self.instance_url)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("id", &self.id)
            .finish()
    }
}

/// OAuth error body (`{"error": "...", "error_description": "..."}`).
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// Exchange an authorization code and PKCE verifier for an access token.
#[instrument(skip_all, fields(endpoint = %token_endpoint))]
pub async fn exchange_code(
    client: &reqwest::Client,
    token_endpoint: &str,
    request: &ExchangeRequest<'_>,
    timeout: Duration,
) -> Result<TokenResponse> {
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("code", request.code),
        ("client_id", request.client_id),
        ("redirect_uri", request.redirect_uri),
        ("code_verifier", request.code_verifier),
    ];
    if let Some(secret) = request.client_secret {
        form.push(("client_secret", secret));
    }

    let response = client
        .post(token_endpoint)
        .timeout(timeout)
        .form(&form)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                warn!(timeout_secs = timeout.as_secs_f64(), "token exchange timed out");
                Error::TokenExchange(format!(
                    "token endpoint did not respond within {}s",
                    timeout.as_secs_f64()
                ))
            } else {
                warn!(error = %e, "token exchange request failed");
                Error::TokenExchange(format!("request to token endpoint failed: {e}"))
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        let details = upstream_error_details(&body);
        warn!(%status, details, "token endpoint rejected exchange");
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {details}"
        )));
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;

    if token.access_token.is_empty() || token.instance_url.is_empty() {
        return Err(Error::TokenExchange(
            "token response missing access_token or instance_url".into(),
        ));
    }

    info!(instance_url = %token.instance_url, "authorization code exchanged");
    Ok(token)
}

/// Prefer the OAuth `error: error_description` pair; fall back to the raw body.
fn upstream_error_details(body: &str) -> String {
    match serde_json::from_str::<TokenErrorBody>(body) {
        Ok(TokenErrorBody {
            error: Some(error),
            error_description: Some(description),
        }) => format!("{error}: {description}"),
        Ok(TokenErrorBody {
            error: Some(error),
            error_description: None,
        }) => error,
        _ if body.is_empty() => String::from("<no body>"),
        _ => body.to_owned(),
    }
}
