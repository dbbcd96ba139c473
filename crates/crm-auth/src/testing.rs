//! Mock identity provider for exchange and flow tests
//!
//! A real axum server on `127.0.0.1:0` serving the token endpoint. Every call
//! is counted so tests can assert that a code path never reached the network.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::constants::TOKEN_PATH;

/// How the mock token endpoint answers.
pub(crate) enum TokenReply {
    Success { access_token: String },
    Error {
        status: u16,
        error: String,
        description: String,
    },
    /// 200 with this exact JSON body
    Raw(String),
    /// Success, answered after a delay
    Slow {
        access_token: String,
        delay: Duration,
    },
    /// Accept the request and never answer
    Hang,
}

impl TokenReply {
    pub(crate) fn success(access_token: &str) -> Self {
        Self::Success {
            access_token: access_token.into(),
        }
    }

    pub(crate) fn error(status: u16, error: &str, description: &str) -> Self {
        Self::Error {
            status,
            error: error.into(),
            description: description.into(),
        }
    }
}

#[derive(Clone)]
struct MockState {
    reply: Arc<TokenReply>,
    base_url: String,
    calls: Arc<AtomicU64>,
    last_form: Arc<Mutex<Option<HashMap<String, String>>>>,
}

pub(crate) struct MockProvider {
    /// Also returned as `instance_url` on success
    pub(crate) base_url: String,
    calls: Arc<AtomicU64>,
    last_form: Arc<Mutex<Option<HashMap<String, String>>>>,
    _server: tokio::task::JoinHandle<()>,
}

impl MockProvider {
    pub(crate) async fn start(reply: TokenReply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let calls = Arc::new(AtomicU64::new(0));
        let last_form = Arc::new(Mutex::new(None));

        let state = MockState {
            reply: Arc::new(reply),
            base_url: base_url.clone(),
            calls: calls.clone(),
            last_form: last_form.clone(),
        };
        let app = Router::new()
            .route(TOKEN_PATH, post(token_handler))
            .with_state(state);

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            calls,
            last_form,
            _server: server,
        }
    }

    pub(crate) fn token_endpoint(&self) -> String {
        format!("{}{TOKEN_PATH}", self.base_url)
    }

    pub(crate) fn token_calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) async fn last_token_form(&self) -> Option<HashMap<String, String>> {
        self.last_form.lock().await.clone()
    }
}

async fn token_handler(
    State(state): State<MockState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.calls.fetch_add(1, Ordering::SeqCst);
    *state.last_form.lock().await = Some(form);

    match state.reply.as_ref() {
        TokenReply::Success { access_token } => success_body(access_token, &state.base_url),
        TokenReply::Slow {
            access_token,
            delay,
        } => {
            tokio::time::sleep(*delay).await;
            success_body(access_token, &state.base_url)
        }
        TokenReply::Error {
            status,
            error,
            description,
        } => (
            StatusCode::from_u16(*status).unwrap(),
            Json(serde_json::json!({
                "error": error,
                "error_description": description,
            })),
        )
            .into_response(),
        TokenReply::Raw(body) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.clone(),
        )
            .into_response(),
        TokenReply::Hang => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::OK.into_response()
        }
    }
}

fn success_body(access_token: &str, instance_url: &str) -> Response {
    Json(serde_json::json!({
        "access_token": access_token,
        "instance_url": instance_url,
        "token_type": "Bearer",
        "scope": "openid api",
    }))
    .into_response()
}
