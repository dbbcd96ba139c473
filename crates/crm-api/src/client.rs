//! Authenticated REST client
//!
//! Every call is a single attempt with the session's bearer token against
//! the session's instance URL. Failures carry the upstream status so the
//! caller can tell an expired token (401) from everything else.

use std::time::Duration;

use crm_auth::AccessCredentials;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result, upstream_details};
use crate::lead::{CreatedRecord, NewLead};

/// REST API version used when none is configured
pub const DEFAULT_API_VERSION: &str = "v59.0";

/// Identity endpoint, relative to the instance URL
pub const USERINFO_PATH: &str = "/services/oauth2/userinfo";

#[derive(Debug, Clone)]
pub struct CrmClient {
    http: reqwest::Client,
    api_version: String,
    timeout: Duration,
}

impl CrmClient {
    pub fn new(http: reqwest::Client, api_version: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            api_version: api_version.into(),
            timeout,
        }
    }

    fn lead_endpoint(&self, instance_url: &str) -> String {
        format!(
            "{}/services/data/{}/sobjects/Lead/",
            instance_url.trim_end_matches('/'),
            self.api_version
        )
    }

    /// Validate and create one Lead. Validation failures never touch the network.
    #[instrument(skip_all, fields(instance = %credentials.instance_url))]
    pub async fn create_lead(
        &self,
        credentials: &AccessCredentials,
        lead: &NewLead,
    ) -> Result<CreatedRecord> {
        lead.validate()?;

        let response = self
            .http
            .post(self.lead_endpoint(&credentials.instance_url))
            .bearer_auth(&credentials.access_token)
            .timeout(self.timeout)
            .json(&lead.to_record())
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "lead creation request failed");
                Error::RecordCreation {
                    status: None,
                    details: format!("request failed: {e}"),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let details = upstream_details(&body);
            warn!(%status, details, "lead creation rejected");
            return Err(Error::RecordCreation {
                status: Some(status.as_u16()),
                details,
            });
        }

        let record = response
            .json::<CreatedRecord>()
            .await
            .map_err(|e| Error::RecordCreation {
                status: Some(status.as_u16()),
                details: format!("invalid create response: {e}"),
            })?;

        info!(lead_id = %record.id, "lead created");
        Ok(record)
    }

    /// Fetch the signed-in user's identity claims, passed through unchanged.
    #[instrument(skip_all, fields(instance = %credentials.instance_url))]
    pub async fn get_user_info(
        &self,
        credentials: &AccessCredentials,
    ) -> Result<serde_json::Value> {
        let url = format!(
            "{}{USERINFO_PATH}",
            credentials.instance_url.trim_end_matches('/')
        );

        let response = self
            .http
            .get(url)
            .bearer_auth(&credentials.access_token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "user info request failed");
                Error::UserInfo {
                    status: None,
                    details: format!("request failed: {e}"),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let details = upstream_details(&body);
            warn!(%status, details, "user info rejected");
            return Err(Error::UserInfo {
                status: Some(status.as_u16()),
                details,
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::UserInfo {
                status: Some(status.as_u16()),
                details: format!("invalid user info response: {e}"),
            })
    }
}
