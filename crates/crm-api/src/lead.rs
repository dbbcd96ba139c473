//! Lead records: validation and wire mapping

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// `LeadSource` stamped on every record created through the portal.
pub const LEAD_SOURCE: &str = "Web";

/// Lead fields as submitted by the portal form.
///
/// Every field is optional at the deserialization layer so a partial body
/// reaches `validate` and gets a field-level message instead of a generic
/// parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLead {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl NewLead {
    /// Last name and company are required by the Lead object.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [("lastName", &self.last_name), ("company", &self.company)]
            .into_iter()
            .filter(|(_, value)| non_blank(value).is_none())
            .map(|(name, _)| name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// REST payload. Call after `validate`; blank optional fields are omitted.
    pub(crate) fn to_record(&self) -> LeadRecord<'_> {
        LeadRecord {
            first_name: non_blank(&self.first_name),
            last_name: non_blank(&self.last_name).unwrap_or_default(),
            company: non_blank(&self.company).unwrap_or_default(),
            email: non_blank(&self.email),
            phone: non_blank(&self.phone),
            lead_source: LEAD_SOURCE,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LeadRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,
    last_name: &'a str,
    company: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
    lead_source: &'static str,
}

/// Create response: `{"id": "00Q...", "success": true, "errors": []}`
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedRecord {
    pub id: String,
}
