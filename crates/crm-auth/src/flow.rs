//! Authorization flow controller
//!
//! Drives one session through `Unauthenticated -> PendingCallback ->
//! Authenticated`. The two externally triggered steps are `initiate` (build
//! the redirect) and `callback` (validate and exchange). Session state lives
//! in the injected `SessionStore`; this type holds no per-user data itself.

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use serde::Deserialize;
use tracing::{info, warn};

use crate::constants::{
    AUTHORIZE_PATH, DEFAULT_LOGIN_URL, DEFAULT_SCOPE, DEFAULT_TOKEN_TIMEOUT_SECS, TOKEN_PATH,
};
use crate::error::{Error, Result};
use crate::pkce::{self, AuthorizationRequest};
use crate::session::{AccessCredentials, SessionState, SessionStore};
use crate::token::{self, ExchangeRequest};

/// Static OAuth client settings.
///
/// Client id and callback URL are optional here so the service can start
/// (and answer health checks) without them; `initiate` refuses to run
/// until both are set.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<Secret<String>>,
    pub callback_url: Option<String>,
    pub login_url: String,
    pub scope: String,
    pub token_timeout: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            callback_url: None,
            login_url: DEFAULT_LOGIN_URL.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            token_timeout: Duration::from_secs(DEFAULT_TOKEN_TIMEOUT_SECS),
        }
    }
}

impl OAuthConfig {
    pub fn authorize_endpoint(&self) -> String {
        format!("{}{AUTHORIZE_PATH}", self.login_url.trim_end_matches('/'))
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}{TOKEN_PATH}", self.login_url.trim_end_matches('/'))
    }

    /// Whether initiation can proceed.
    pub fn is_complete(&self) -> bool {
        self.identity().is_ok()
    }

    /// `(client_id, callback_url)`, both non-empty.
    fn identity(&self) -> Result<(&str, &str)> {
        let client_id = self
            .client_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::Configuration("client_id is not set".into()))?;
        let callback_url = self
            .callback_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| Error::Configuration("callback_url is not set".into()))?;
        Ok((client_id, callback_url))
    }
}

/// Query parameters the provider appends when redirecting back.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

pub struct AuthFlow<S> {
    config: OAuthConfig,
    store: Arc<S>,
    http: reqwest::Client,
}

impl<S: SessionStore> AuthFlow<S> {
    pub fn new(config: OAuthConfig, store: Arc<S>, http: reqwest::Client) -> Self {
        Self {
            config,
            store,
            http,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Start a sign-in for `session_id` and return the provider URL to
    /// redirect the browser to.
    ///
    /// Overwrites any incomplete flow on the same session; only the most
    /// recent verifier/state pair can complete.
    pub async fn initiate(&self, session_id: &str) -> Result<String> {
        let (client_id, callback_url) = self.config.identity()?;

        let code_verifier = pkce::generate_verifier();
        let code_challenge = pkce::compute_challenge(&code_verifier);
        let oauth_state = pkce::generate_state();

        let url = AuthorizationRequest {
            client_id,
            redirect_uri: callback_url,
            scope: &self.config.scope,
            state: &oauth_state,
            code_challenge: &code_challenge,
        }
        .authorization_url(&self.config.authorize_endpoint())?;

        self.store
            .put(
                session_id,
                SessionState::PendingCallback {
                    code_verifier,
                    oauth_state,
                },
            )
            .await?;

        info!("authorization flow initiated");
        Ok(url)
    }

    /// Complete the flow from the provider's redirect.
    ///
    /// Checks run in a fixed order: provider error, missing code, missing
    /// pending flow, state mismatch. Only then is the token endpoint called.
    /// The pending verifier/state are erased before the exchange, so they are
    /// gone whether the exchange succeeds or fails. The token is stored only
    /// if the session is still there, untouched, when the exchange returns.
    pub async fn callback(&self, session_id: &str, params: CallbackParams) -> Result<()> {
        if let Some(error) = params.error {
            let description = params
                .error_description
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| error.clone());
            warn!(error = %error, description = %description, "provider returned authorization error");
            return Err(Error::UpstreamAuthorization { error, description });
        }

        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or(Error::MissingAuthorizationCode)?;

        let pending = self.store.get(session_id).await?;
        let (code_verifier, oauth_state) = match &pending {
            SessionState::PendingCallback {
                code_verifier,
                oauth_state,
            } => (code_verifier.clone(), oauth_state.clone()),
            _ => {
                warn!("callback without a pending authorization");
                return Err(Error::SessionExpired);
            }
        };

        // Consume the pending flow; a retry must start from initiate. Losing
        // the swap means a concurrent callback, initiate or logout got there
        // first.
        if !self
            .store
            .replace_if(session_id, &pending, SessionState::Unauthenticated)
            .await?
        {
            warn!("pending authorization was consumed concurrently");
            return Err(Error::SessionExpired);
        }

        if params.state.as_deref() != Some(oauth_state.as_str()) {
            warn!(
                state_present = params.state.is_some(),
                "OAuth state mismatch, aborting flow"
            );
            return Err(Error::StateMismatch);
        }

        let (client_id, callback_url) = self.config.identity()?;
        let request = ExchangeRequest {
            code: &code,
            code_verifier: &code_verifier,
            client_id,
            client_secret: self
                .config
                .client_secret
                .as_ref()
                .map(|s| s.expose().as_str()),
            redirect_uri: callback_url,
        };

        let token = token::exchange_code(
            &self.http,
            &self.config.token_endpoint(),
            &request,
            self.config.token_timeout,
        )
        .await?;

        let stored = self
            .store
            .replace_if(
                session_id,
                &SessionState::Unauthenticated,
                SessionState::Authenticated(AccessCredentials {
                    access_token: token.access_token,
                    instance_url: token.instance_url,
                }),
            )
            .await?;
        if !stored {
            // Logged out, expired or re-initiated during the exchange.
            warn!("session changed during token exchange, discarding token");
            return Err(Error::SessionExpired);
        }

        info!("session authenticated");
        Ok(())
    }

    /// Destroy the session. Succeeds for sessions that were never
    /// authenticated or no longer exist.
    pub async fn logout(&self, session_id: &str) -> Result<()> {
        self.store.delete(session_id).await?;
        info!("session logged out");
        Ok(())
    }

    /// Auth guard: credentials when the session holds a non-empty token.
    pub async fn credentials(&self, session_id: &str) -> Result<Option<AccessCredentials>> {
        let state = self.store.get(session_id).await?;
        Ok(state.credentials().cloned())
    }

    pub async fn is_authenticated(&self, session_id: &str) -> Result<bool> {
        Ok(self.credentials(session_id).await?.is_some())
    }
}
