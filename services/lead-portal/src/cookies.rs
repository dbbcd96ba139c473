//! Signed session cookie
//!
//! The cookie carries only an opaque session id (UUID v4). Its value is
//! signed with a key derived from the session secret, so a forged or
//! tampered id is dropped by `SignedCookieJar` and reads as no session.

use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use common::Secret;
use sha2::{Digest, Sha512};
use tracing::warn;

/// Cookie signing key: SHA-512 of the configured secret, or a random
/// per-process key when none is configured.
pub fn signing_key(secret: Option<&Secret<String>>) -> Key {
    match secret {
        Some(secret) => {
            let digest = Sha512::digest(secret.expose().as_bytes());
            Key::from(digest.as_slice())
        }
        None => {
            warn!("no session secret configured; sessions will not survive a restart");
            Key::generate()
        }
    }
}

/// Session cookie attributes.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
    secure: bool,
    max_age: Duration,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, secure: bool, max_age: Duration) -> Self {
        Self {
            name: name.into(),
            secure,
            max_age,
        }
    }

    /// Verified session id from the request, if any.
    pub fn session_id(&self, jar: &SignedCookieJar) -> Option<String> {
        jar.get(&self.name)
            .map(|cookie| cookie.value().to_owned())
            .filter(|id| !id.is_empty())
    }

    /// Existing session id, or a fresh one with the cookie added to the jar.
    pub fn ensure_session(&self, jar: SignedCookieJar) -> (SignedCookieJar, String) {
        match self.session_id(&jar) {
            Some(id) => (jar, id),
            None => {
                let id = new_session_id();
                (jar.add(self.build(id.clone())), id)
            }
        }
    }

    pub fn build(&self, session_id: String) -> Cookie<'static> {
        Cookie::build((self.name.clone(), session_id))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .secure(self.secure)
            .max_age(time::Duration::seconds(
                i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX),
            ))
            .build()
    }

    /// Expire the cookie in the browser.
    pub fn clear(&self, jar: SignedCookieJar) -> SignedCookieJar {
        jar.remove(Cookie::build(self.name.clone()).path("/"))
    }
}

pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
