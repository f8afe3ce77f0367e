use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use angohost_api::{
    auth,
    cart::InMemoryCartStorage,
    config::AppConfig,
    events::{self, EventSender},
    services::{commerce::SimulatedGateway, test_support, AppServices},
    AppState,
};

pub const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef0123456789abcdef";

/// Full application wired to an in-memory database, an in-memory cart
/// store and the simulated payment gateway. The configured Redis
/// endpoint is unreachable on purpose: callback claiming must degrade
/// to single-instance behavior without it.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = test_support::sqlite_db().await;

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "redis://127.0.0.1:1".to_string(),
            JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.bank_transfer_iban = Some("AO06004000001234567890123".to_string());
        let config = Arc::new(cfg);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let redis = Arc::new(
            redis::Client::open(config.redis_url.clone()).expect("invalid redis url for tests"),
        );

        let services = AppServices::build(
            db.clone(),
            config.clone(),
            event_sender.clone(),
            Arc::new(InMemoryCartStorage::new()),
            Arc::new(SimulatedGateway),
        );

        let state = Arc::new(AppState {
            db,
            config,
            event_sender,
            services,
            redis,
        });
        let router = angohost_api::app(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Bearer token for an arbitrary customer identity. The customer row
    /// itself is created lazily by the handlers that need it.
    pub fn token_for(&self, customer_id: Uuid, name: &str, email: &str) -> String {
        auth::issue_token(
            customer_id,
            Some(name.to_string()),
            Some(email.to_string()),
            &self.state.config.jwt_secret,
            3600,
        )
        .expect("issue test token")
    }

    /// Send a request; session and token headers are attached when given.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        session: Option<&str>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(session_id) = session {
            builder = builder.header("x-session-id", session_id);
        }
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Collect a response body into JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("response body is not valid json")
}
