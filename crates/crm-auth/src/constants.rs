//! CRM OAuth endpoint layout and defaults
//!
//! Paths are relative to the configured login base URL (production, sandbox,
//! or a My Domain host). Only the base URL varies between deployments.

/// Production login host used when no login URL is configured
pub const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com";

/// Authorization endpoint, relative to the login base URL
pub const AUTHORIZE_PATH: &str = "/services/oauth2/authorize";

/// Token endpoint for the authorization-code exchange
pub const TOKEN_PATH: &str = "/services/oauth2/token";

/// Identity scope plus REST API access.
pub const DEFAULT_SCOPE: &str = "openid api";

/// `response_type` for the authorization-code grant
pub const RESPONSE_TYPE: &str = "code";

/// PKCE challenge method; plain challenges are never sent
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Token exchange timeout when none is configured
pub const DEFAULT_TOKEN_TIMEOUT_SECS: u64 = 10;
