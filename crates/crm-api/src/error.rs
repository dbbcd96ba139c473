//! Errors from authenticated CRM REST calls

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rejected locally; the network was never contacted.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("record creation failed: {details}")]
    RecordCreation { status: Option<u16>, details: String },

    #[error("user info request failed: {details}")]
    UserInfo { status: Option<u16>, details: String },
}

impl Error {
    /// Upstream rejected the bearer token (expired or revoked session).
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Error::RecordCreation { status, .. } | Error::UserInfo { status, .. } => {
                *status == Some(401)
            }
            Error::Validation(_) => false,
        }
    }

    pub fn details(&self) -> &str {
        match self {
            Error::Validation(details)
            | Error::RecordCreation { details, .. }
            | Error::UserInfo { details, .. } => details,
        }
    }
}

/// Result alias for CRM API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// One entry of the REST API's error array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorItem {
    message: String,
    #[serde(default)]
    error_code: Option<String>,
}

/// Flatten an upstream error body into one line.
///
/// REST errors come as `[{"message": .., "errorCode": ..}, ..]`; the OAuth
/// endpoints (userinfo) use `{"error": .., "error_description": ..}`.
pub(crate) fn upstream_details(body: &str) -> String {
    if let Ok(items) = serde_json::from_str::<Vec<ApiErrorItem>>(body) {
        if !items.is_empty() {
            return items
                .iter()
                .map(|item| match &item.error_code {
                    Some(code) => format!("{code}: {}", item.message),
                    None => item.message.clone(),
                })
                .collect::<Vec<_>>()
                .join("; ");
        }
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
            return match value.get("error_description").and_then(|d| d.as_str()) {
                Some(description) => format!("{error}: {description}"),
                None => error.to_owned(),
            };
        }
    }

    if body.is_empty() {
        String::from("<no body>")
    } else {
        body.to_owned()
    }
}
