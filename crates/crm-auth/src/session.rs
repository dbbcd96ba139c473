//! Per-session OAuth state and its storage
//!
//! Session state is an enum so the pending-flow secrets (verifier, state)
//! and the access token can never be held at the same time. The HTTP layer
//! identifies a session by an opaque id carried in a cookie; the store maps
//! that id to one `SessionState`.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;

/// Where one browser session stands in the authorization flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    /// Fresh session, failed callback, or logged out.
    #[default]
    Unauthenticated,
    /// Initiated, waiting for the provider to redirect back.
    PendingCallback {
        code_verifier: String,
        oauth_state: String,
    },
    Authenticated(AccessCredentials),
}

impl SessionState {
    /// Credentials if the session holds a non-empty access token.
    pub fn credentials(&self) -> Option<&AccessCredentials> {
        match self {
            SessionState::Authenticated(creds) if !creds.access_token.is_empty() => Some(creds),
            _ => None,
        }
    }
}

/// Bearer token plus the instance host it is valid against.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCredentials {
    pub access_token: String,
    pub instance_url: String,
}

impl fmt::Debug for AccessCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredentials")
            .field("access_token", &"[REDACTED]")
            .field("instance_url", &self.instance_url)
            .finish()
    }
}

/// Storage for session state keyed by opaque session id.
///
/// Implementations decide expiry. A missing or expired id reads as
/// `SessionState::Unauthenticated`.
pub trait SessionStore: Send + Sync + 'static {
    fn get(&self, session_id: &str) -> impl Future<Output = Result<SessionState>> + Send;

    /// Replace the state for `session_id`, creating the session if needed.
    fn put(
        &self,
        session_id: &str,
        state: SessionState,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Swap in `new` only if the session exists and currently holds
    /// `expected`. Returns whether the swap happened. Never creates a session.
    fn replace_if(
        &self,
        session_id: &str,
        expected: &SessionState,
        new: SessionState,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Destroy the session. Deleting an unknown id succeeds.
    fn delete(&self, session_id: &str) -> impl Future<Output = Result<()>> + Send;
}

struct Entry {
    state: SessionState,
    created_at: Instant,
}

/// In-process session store with a fixed time-to-live.
///
/// The TTL runs from session creation and is not extended by activity.
/// Expired entries are evicted lazily whenever the map is touched.
pub struct MemorySessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Entry>>,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        self.evict_expired(&mut sessions);
        sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn evict_expired(&self, sessions: &mut HashMap<String, Entry>) {
        let ttl = self.ttl;
        sessions.retain(|_, entry| entry.created_at.elapsed() < ttl);
    }
}

impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<SessionState> {
        let mut sessions = self.sessions.lock().await;
        self.evict_expired(&mut sessions);
        Ok(sessions
            .get(session_id)
            .map(|entry| entry.state.clone())
            .unwrap_or_default())
    }

    async fn put(&self, session_id: &str, state: SessionState) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        self.evict_expired(&mut sessions);
        match sessions.get_mut(session_id) {
            Some(entry) => entry.state = state,
            None => {
                debug!("session created");
                sessions.insert(
                    session_id.to_owned(),
                    Entry {
                        state,
                        created_at: Instant::now(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn replace_if(
        &self,
        session_id: &str,
        expected: &SessionState,
        new: SessionState,
    ) -> Result<bool> {
        let mut sessions = self.sessions.lock().await;
        self.evict_expired(&mut sessions);
        match sessions.get_mut(session_id) {
            Some(entry) if entry.state == *expected => {
                entry.state = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        if sessions.remove(session_id).is_some() {
            debug!("session destroyed");
        }
        Ok(())
    }
}
