//! Route-level error type
//!
//! Every handler failure ends up here and leaves as a JSON body
//! `{"error": .., "details": ..}` with the status the portal API promises.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] crm_auth::Error),

    #[error(transparent)]
    Crm(#[from] crm_api::Error),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, &'static str) {
        use crm_auth::Error as Auth;

        match self {
            ApiError::Auth(e) => match e {
                Auth::Configuration(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "OAuth client is not configured",
                ),
                Auth::UpstreamAuthorization { .. } => {
                    (StatusCode::BAD_REQUEST, "Authorization failed")
                }
                Auth::MissingAuthorizationCode => {
                    (StatusCode::BAD_REQUEST, "Missing authorization code")
                }
                Auth::SessionExpired => (StatusCode::BAD_REQUEST, "Session expired"),
                Auth::StateMismatch => (StatusCode::BAD_REQUEST, "Invalid state parameter"),
                Auth::TokenExchange(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to exchange authorization code",
                ),
                Auth::SessionStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Session error"),
            },
            ApiError::Crm(e) => match e {
                crm_api::Error::Validation(_) => {
                    (StatusCode::BAD_REQUEST, "Last name and company are required")
                }
                _ if e.is_unauthorized() => {
                    (StatusCode::UNAUTHORIZED, "Session expired or invalid")
                }
                crm_api::Error::RecordCreation { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create lead")
                }
                crm_api::Error::UserInfo { .. } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to fetch user info",
                ),
            },
            ApiError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "Not authenticated"),
            ApiError::InvalidBody(_) => (StatusCode::BAD_REQUEST, "Invalid request body"),
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            ApiError::Auth(crm_auth::Error::UpstreamAuthorization { description, .. }) => {
                Some(description.clone())
            }
            ApiError::Auth(crm_auth::Error::TokenExchange(details)) => Some(details.clone()),
            ApiError::Auth(crm_auth::Error::Configuration(details)) => Some(details.clone()),
            ApiError::Auth(crm_auth::Error::SessionExpired) => Some(self.to_string()),
            ApiError::Auth(_) | ApiError::NotAuthenticated => None,
            ApiError::Crm(e) => Some(e.details().to_owned()),
            ApiError::InvalidBody(details) => Some(details.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = match self.details() {
            Some(details) => serde_json::json!({ "error": message, "details": details }),
            None => serde_json::json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}
