//! Page, auth and API handlers
//!
//! Each handler resolves the session id from the signed cookie and hands it
//! to the flow controller; no handler keeps per-user data of its own.

use std::time::Instant;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::SignedCookieJar;
use crm_api::NewLead;
use crm_auth::{AccessCredentials, CallbackParams, SessionStore};
use tracing::{info, warn};

use crate::AppState;
use crate::cookies::new_session_id;
use crate::error::ApiError;
use crate::metrics;

const INDEX_HTML: &str = include_str!("../static/index.html");
const DASHBOARD_HTML: &str = include_str!("../static/dashboard.html");

/// Where a completed sign-in lands.
pub const PROTECTED_VIEW: &str = "/protected-view";

async fn current_credentials<S: SessionStore>(
    state: &AppState<S>,
    jar: &SignedCookieJar,
) -> Result<Option<AccessCredentials>, ApiError> {
    match state.cookie.session_id(jar) {
        Some(session_id) => Ok(state.auth.credentials(&session_id).await?),
        None => Ok(None),
    }
}

async fn require_credentials<S: SessionStore>(
    state: &AppState<S>,
    jar: &SignedCookieJar,
) -> Result<AccessCredentials, ApiError> {
    current_credentials(state, jar)
        .await?
        .ok_or(ApiError::NotAuthenticated)
}

async fn signed_in<S: SessionStore>(
    state: &AppState<S>,
    jar: &SignedCookieJar,
) -> Result<bool, ApiError> {
    match state.cookie.session_id(jar) {
        Some(session_id) => Ok(state.auth.is_authenticated(&session_id).await?),
        None => Ok(false),
    }
}

/// `GET /`
pub async fn landing<S: SessionStore>(
    State(state): State<AppState<S>>,
    jar: SignedCookieJar,
) -> Result<Response, ApiError> {
    if signed_in(&state, &jar).await? {
        return Ok(Redirect::to(PROTECTED_VIEW).into_response());
    }
    Ok(Html(INDEX_HTML).into_response())
}

/// `GET /auth/provider`: start sign-in and redirect to the provider.
pub async fn initiate<S: SessionStore>(
    State(state): State<AppState<S>>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Redirect), ApiError> {
    let (jar, session_id) = state.cookie.ensure_session(jar);
    let url = state.auth.initiate(&session_id).await?;
    Ok((jar, Redirect::to(&url)))
}

/// `GET /oauth/callback`: the provider's redirect back.
pub async fn callback<S: SessionStore>(
    State(state): State<AppState<S>>,
    jar: SignedCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, ApiError> {
    // No cookie means no pending flow; an unknown id reads as unauthenticated.
    let session_id = state
        .cookie
        .session_id(&jar)
        .unwrap_or_else(new_session_id);

    let started = Instant::now();
    let result = state.auth.callback(&session_id, params).await;
    let outcome = callback_outcome(&result);
    if matches!(outcome, "success" | "exchange_failed") {
        metrics::record_upstream("token_exchange", started.elapsed().as_secs_f64());
    }
    metrics::record_callback(outcome);

    result?;
    Ok(Redirect::to(PROTECTED_VIEW))
}

fn callback_outcome(result: &crm_auth::Result<()>) -> &'static str {
    match result {
        Ok(()) => "success",
        Err(crm_auth::Error::UpstreamAuthorization { .. }) => "provider_error",
        Err(crm_auth::Error::MissingAuthorizationCode) => "missing_code",
        Err(crm_auth::Error::SessionExpired) => "session_expired",
        Err(crm_auth::Error::StateMismatch) => "state_mismatch",
        Err(crm_auth::Error::TokenExchange(_)) => "exchange_failed",
        Err(crm_auth::Error::Configuration(_) | crm_auth::Error::SessionStore(_)) => "error",
    }
}

/// `GET /protected-view`
pub async fn protected_view<S: SessionStore>(
    State(state): State<AppState<S>>,
    jar: SignedCookieJar,
) -> Result<Response, ApiError> {
    if !signed_in(&state, &jar).await? {
        return Ok(Redirect::to("/").into_response());
    }
    Ok(Html(DASHBOARD_HTML).into_response())
}

/// `GET /api/user`
pub async fn user_info<S: SessionStore>(
    State(state): State<AppState<S>>,
    jar: SignedCookieJar,
) -> Result<Json<serde_json::Value>, ApiError> {
    let credentials = require_credentials(&state, &jar).await?;

    let started = Instant::now();
    let result = state.crm.get_user_info(&credentials).await;
    metrics::record_upstream("user_info", started.elapsed().as_secs_f64());

    Ok(Json(result?))
}

/// `POST /api/lead`
///
/// The auth check runs before the body is looked at, so an unauthenticated
/// caller gets 401 even with a malformed body.
pub async fn create_lead<S: SessionStore>(
    State(state): State<AppState<S>>,
    jar: SignedCookieJar,
    body: Result<Json<NewLead>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let credentials = match require_credentials(&state, &jar).await {
        Ok(credentials) => credentials,
        Err(e) => {
            metrics::record_lead("unauthenticated");
            return Err(e);
        }
    };

    let Json(lead) = body.map_err(|rejection| {
        metrics::record_lead("invalid_body");
        ApiError::InvalidBody(rejection.body_text())
    })?;

    let started = Instant::now();
    match state.crm.create_lead(&credentials, &lead).await {
        Ok(record) => {
            metrics::record_upstream("create_lead", started.elapsed().as_secs_f64());
            metrics::record_lead("created");
            Ok(Json(serde_json::json!({
                "success": true,
                "id": record.id,
                "message": "Lead created successfully",
            })))
        }
        Err(e @ crm_api::Error::Validation(_)) => {
            metrics::record_lead("validation_failed");
            Err(e.into())
        }
        Err(e) => {
            metrics::record_upstream("create_lead", started.elapsed().as_secs_f64());
            metrics::record_lead("upstream_error");
            warn!(error = %e, "lead creation failed");
            Err(e.into())
        }
    }
}

/// `POST /api/logout`
pub async fn logout<S: SessionStore>(
    State(state): State<AppState<S>>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Json<serde_json::Value>), ApiError> {
    if let Some(session_id) = state.cookie.session_id(&jar) {
        state.auth.logout(&session_id).await?;
    } else {
        info!("logout without a session");
    }
    let jar = state.cookie.clear(jar);
    Ok((jar, Json(serde_json::json!({ "success": true }))))
}
