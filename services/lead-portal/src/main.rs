//! Lead Portal
//!
//! Single-binary web service that:
//! 1. Signs users in against a CRM identity provider (Authorization Code + PKCE)
//! 2. Keeps the resulting access token in a server-side session
//! 3. Creates Lead records through the CRM REST API on the user's behalf

mod config;
mod cookies;
mod error;
mod metrics;
mod routes;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{FromRef, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum_extra::extract::cookie::Key;
use crm_api::CrmClient;
use crm_auth::{AuthFlow, MemorySessionStore, SessionStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::cookies::SessionCookie;

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
struct AppState<S> {
    auth: Arc<AuthFlow<S>>,
    crm: CrmClient,
    cookie: SessionCookie,
    key: Key,
    prometheus: PrometheusHandle,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            auth: self.auth.clone(),
            crm: self.crm.clone(),
            cookie: self.cookie.clone(),
            key: self.key.clone(),
            prometheus: self.prometheus.clone(),
        }
    }
}

/// Lets `SignedCookieJar` find the signing key in the router state.
impl<S> FromRef<AppState<S>> for Key {
    fn from_ref(state: &AppState<S>) -> Self {
        state.key.clone()
    }
}

/// Build the axum router with all routes and shared state.
///
/// A concurrency limit layer caps in-flight requests at `max_connections`.
fn build_router<S: SessionStore>(state: AppState<S>, max_connections: usize) -> Router {
    Router::new()
        .route("/", get(routes::landing::<S>))
        .route("/auth/provider", get(routes::initiate::<S>))
        .route("/oauth/callback", get(routes::callback::<S>))
        .route(routes::PROTECTED_VIEW, get(routes::protected_view::<S>))
        .route("/api/user", get(routes::user_info::<S>))
        .route("/api/lead", post(routes::create_lead::<S>))
        .route("/api/logout", post(routes::logout::<S>))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler::<S>))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting lead-portal");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder()?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(
        path = %config_path.path.display(),
        explicit = config_path.explicit,
        "loading configuration"
    );

    let config = Config::load(&config_path).with_context(|| {
        format!("failed to load config from {}", config_path.path.display())
    })?;

    let oauth = config.oauth_config();
    if !oauth.is_complete() {
        warn!("client_id or callback_url not set; sign-in is disabled until configured");
    }

    info!(
        listen_addr = %config.server.listen_addr,
        login_url = %config.oauth.login_url,
        api_version = %config.oauth.api_version,
        session_ttl_secs = config.session.ttl_secs,
        client_secret = config.oauth.client_secret.is_some(),
        "configuration loaded"
    );

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let store = Arc::new(MemorySessionStore::new(config.session_ttl()));

    let state = AppState {
        auth: Arc::new(AuthFlow::new(oauth, store, http.clone())),
        crm: CrmClient::new(
            http,
            config.oauth.api_version.clone(),
            config.api_timeout(),
        ),
        cookie: SessionCookie::new(
            config.session.cookie_name.clone(),
            config.session.secure_cookies,
            config.session_ttl(),
        ),
        key: cookies::signing_key(config.session.secret.as_ref()),
        prometheus,
    };

    let app = build_router(state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts: notify the server to drain, then race it against the timer.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Liveness only: no session, config or upstream dependency.
async fn health_handler() -> impl IntoResponse {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "status": "healthy",
            "timestamp": timestamp,
        })
        .to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler<S: SessionStore>(State(state): State<AppState<S>>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
