//! Mock CRM instance for REST client tests
//!
//! Serves the Lead create endpoint and userinfo on `127.0.0.1:0`. Only
//! `VALID_TOKEN` is accepted; anything else gets the REST API's
//! `INVALID_SESSION_ID` rejection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::client::{DEFAULT_API_VERSION, USERINFO_PATH};

pub(crate) const VALID_TOKEN: &str = "00Dxx!valid-access-token";

/// How the mock Lead endpoint answers an authorized request.
pub(crate) enum LeadReply {
    /// 201 with this record id
    Created(String),
    /// This status with this raw body
    Status(u16, String),
}

#[derive(Clone)]
struct MockState {
    reply: Arc<LeadReply>,
    lead_calls: Arc<AtomicU64>,
    last_body: Arc<Mutex<Option<serde_json::Value>>>,
}

pub(crate) struct MockCrm {
    pub(crate) base_url: String,
    lead_calls: Arc<AtomicU64>,
    last_body: Arc<Mutex<Option<serde_json::Value>>>,
    _server: tokio::task::JoinHandle<()>,
}

impl MockCrm {
    pub(crate) async fn start(reply: LeadReply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let lead_calls = Arc::new(AtomicU64::new(0));
        let last_body = Arc::new(Mutex::new(None));

        let state = MockState {
            reply: Arc::new(reply),
            lead_calls: lead_calls.clone(),
            last_body: last_body.clone(),
        };
        let app = Router::new()
            .route(
                &format!("/services/data/{DEFAULT_API_VERSION}/sobjects/Lead/"),
                post(lead_handler),
            )
            .route(USERINFO_PATH, get(userinfo_handler))
            .with_state(state);

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            lead_calls,
            last_body,
            _server: server,
        }
    }

    pub(crate) fn lead_calls(&self) -> u64 {
        self.lead_calls.load(Ordering::SeqCst)
    }

    pub(crate) async fn last_lead_body(&self) -> Option<serde_json::Value> {
        self.last_body.lock().await.clone()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {VALID_TOKEN}"))
}

fn invalid_session() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!([{
            "message": "Session expired or invalid",
            "errorCode": "INVALID_SESSION_ID",
        }])),
    )
        .into_response()
}

async fn lead_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.lead_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_body.lock().await = Some(body);

    if !authorized(&headers) {
        return invalid_session();
    }

    match state.reply.as_ref() {
        LeadReply::Created(id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": id, "success": true, "errors": [] })),
        )
            .into_response(),
        LeadReply::Status(status, body) => (
            StatusCode::from_u16(*status).unwrap(),
            [(header::CONTENT_TYPE, "application/json")],
            body.clone(),
        )
            .into_response(),
    }
}

async fn userinfo_handler(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return invalid_session();
    }
    Json(serde_json::json!({
        "sub": "https://login.example.com/id/00Dxx/005xx",
        "preferred_username": "jane@acme.test",
        "name": "Jane Doe",
        "email": "jane@acme.test",
    }))
    .into_response()
}
