//! Error types for the authorization flow

/// Failures of the OAuth authorization-code flow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("OAuth configuration incomplete: {0}")]
    Configuration(String),

    #[error("authorization rejected by provider ({error}): {description}")]
    UpstreamAuthorization { error: String, description: String },

    #[error("callback did not include an authorization code")]
    MissingAuthorizationCode,

    #[error("no pending authorization for this session; start the sign-in again")]
    SessionExpired,

    #[error("OAuth state parameter does not match this session")]
    StateMismatch,

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("session store error: {0}")]
    SessionStore(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
