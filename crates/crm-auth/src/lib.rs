//! CRM OAuth authentication library
//!
//! Authorization Code flow with PKCE against a Salesforce-style identity
//! provider. Standalone: no dependency on the web service, so the flow can be
//! driven and tested with any `SessionStore`.
//!
//! Flow:
//! 1. `AuthFlow::initiate` generates verifier, challenge and state, stores
//!    the verifier/state in the session, returns the authorization URL
//! 2. The provider redirects back; `AuthFlow::callback` validates `state`
//!    and calls `token::exchange_code` with the stored verifier
//! 3. The access token and instance URL replace the pending flow in the
//!    session; `AuthFlow::credentials` is the auth guard from then on

pub mod constants;
pub mod error;
pub mod flow;
pub mod pkce;
pub mod session;
pub mod token;

#[cfg(test)]
mod testing;

pub use constants::*;
pub use error::{Error, Result};
pub use flow::{AuthFlow, CallbackParams, OAuthConfig};
pub use pkce::{AuthorizationRequest, compute_challenge, generate_state, generate_verifier};
pub use session::{AccessCredentials, MemorySessionStore, SessionState, SessionStore};
pub use token::{ExchangeRequest, TokenResponse, exchange_code};
