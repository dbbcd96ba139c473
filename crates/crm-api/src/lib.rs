//! CRM REST API client
//!
//! Authenticated calls made on behalf of a signed-in session: Lead creation
//! and identity lookup. Credentials come from `crm_auth`; this crate never
//! touches the session store.

pub mod client;
pub mod error;
pub mod lead;

#[cfg(test)]
mod testing;

pub use client::{CrmClient, DEFAULT_API_VERSION, USERINFO_PATH};
pub use error::{Error, Result};
pub use lead::{CreatedRecord, LEAD_SOURCE, NewLead};
