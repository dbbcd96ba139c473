//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults.
//! Secrets (client secret, session secret) are loaded from env vars or from
//! files named in the config, never stored in the TOML directly.

use common::{Secret, resolve_secret};
use crm_auth::{DEFAULT_LOGIN_URL, DEFAULT_SCOPE, DEFAULT_TOKEN_TIMEOUT_SECS, OAuthConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "lead-portal.toml";

/// Minimum session secret length, matching the 256-bit key it stands in for.
const MIN_SESSION_SECRET_LEN: usize = 32;

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub oauth: OAuthSettings,
    pub session: SessionConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// OAuth client and CRM API settings
#[derive(Debug, Deserialize)]
pub struct OAuthSettings {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_token_timeout")]
    pub token_timeout_secs: u64,
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
    /// Path to a file containing the client secret (alternative to CRM_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
}

/// Session lifetime and cookie settings
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub secure_cookies: bool,
    /// Path to a file containing the cookie signing secret (alternative to SESSION_SECRET)
    #[serde(default)]
    pub session_secret_file: Option<PathBuf>,
    #[serde(skip)]
    pub secret: Option<Secret<String>>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_max_connections() -> usize {
    1000
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_string()
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_api_version() -> String {
    crm_api::DEFAULT_API_VERSION.to_string()
}

fn default_token_timeout() -> u64 {
    DEFAULT_TOKEN_TIMEOUT_SECS
}

fn default_api_timeout() -> u64 {
    30
}

fn default_session_ttl() -> u64 {
    3600
}

fn default_cookie_name() -> String {
    "lead_portal_session".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            callback_url: None,
            login_url: default_login_url(),
            scope: default_scope(),
            api_version: default_api_version(),
            token_timeout_secs: default_token_timeout(),
            api_timeout_secs: default_api_timeout(),
            client_secret_file: None,
            client_secret: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            cookie_name: default_cookie_name(),
            secure_cookies: false,
            session_secret_file: None,
            secret: None,
        }
    }
}

/// Where the config file comes from.
#[derive(Debug, PartialEq, Eq)]
pub struct ConfigPath {
    pub path: PathBuf,
    /// Named via `--config` or `CONFIG_PATH`; a missing file is then an error.
    pub explicit: bool,
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// A missing file is tolerated only when the path is the implicit default,
    /// so the service can run from env vars alone.
    ///
    /// Secret resolution order (for both client and session secrets):
    /// 1. env var (`CRM_CLIENT_SECRET`, `SESSION_SECRET`)
    /// 2. `*_file` path from config
    pub fn load(source: &ConfigPath) -> common::Result<Self> {
        let mut config: Config = match std::fs::read_to_string(&source.path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !source.explicit => {
                Config::default()
            }
            Err(e) => return Err(e.into()),
        };

        config.apply_env()?;

        config.oauth.client_secret = resolve_secret(
            "CRM_CLIENT_SECRET",
            config.oauth.client_secret_file.as_deref(),
        )?;
        config.session.secret = resolve_secret(
            "SESSION_SECRET",
            config.session.session_secret_file.as_deref(),
        )?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> common::Result<()> {
        if let Some(client_id) = env_value("CRM_CLIENT_ID") {
            self.oauth.client_id = Some(client_id);
        }
        if let Some(callback_url) = env_value("CRM_CALLBACK_URL") {
            self.oauth.callback_url = Some(callback_url);
        }
        if let Some(login_url) = env_value("CRM_LOGIN_URL") {
            self.oauth.login_url = login_url;
        }
        if let Some(scope) = env_value("CRM_SCOPE") {
            self.oauth.scope = scope;
        }
        if let Some(addr) = env_value("LISTEN_ADDR") {
            self.server.listen_addr = addr.parse().map_err(|e| {
                common::Error::Config(format!("LISTEN_ADDR is not a socket address ({addr}): {e}"))
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> common::Result<()> {
        require_http_url("login_url", &self.oauth.login_url)?;
        if let Some(callback_url) = &self.oauth.callback_url {
            require_http_url("callback_url", callback_url)?;
        }

        if self.oauth.token_timeout_secs == 0 {
            return Err(common::Error::Config(
                "token_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.oauth.api_timeout_secs == 0 {
            return Err(common::Error::Config(
                "api_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.oauth.api_version.trim().is_empty() {
            return Err(common::Error::Config("api_version must not be empty".into()));
        }
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.session.ttl_secs == 0 {
            return Err(common::Error::Config(
                "session ttl_secs must be greater than 0".into(),
            ));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(common::Error::Config("cookie_name must not be empty".into()));
        }
        if let Some(secret) = &self.session.secret {
            if secret.len() < MIN_SESSION_SECRET_LEN {
                return Err(common::Error::Config(format!(
                    "session secret must be at least {MIN_SESSION_SECRET_LEN} bytes, got {}",
                    secret.len()
                )));
            }
        }
        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> ConfigPath {
        if let Some(p) = cli_path {
            return ConfigPath {
                path: PathBuf::from(p),
                explicit: true,
            };
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return ConfigPath {
                path: PathBuf::from(p),
                explicit: true,
            };
        }
        ConfigPath {
            path: PathBuf::from(DEFAULT_CONFIG_PATH),
            explicit: false,
        }
    }

    pub fn oauth_config(&self) -> OAuthConfig {
        OAuthConfig {
            client_id: self.oauth.client_id.clone(),
            client_secret: self.oauth.client_secret.clone(),
            callback_url: self.oauth.callback_url.clone(),
            login_url: self.oauth.login_url.clone(),
            scope: self.oauth.scope.clone(),
            token_timeout: Duration::from_secs(self.oauth.token_timeout_secs),
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.oauth.api_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session.ttl_secs)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn require_http_url(field: &str, value: &str) -> common::Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )))
    }
}
