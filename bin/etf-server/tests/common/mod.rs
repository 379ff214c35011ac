#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{header, HeaderValue};
use axum_test::{TestRequest, TestServer};
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};

use etf_server::config::Config;
use etf_server::entities::{EtfStore, SqliteStore};
use etf_server::routes;
use etf_server::services::ai::{Advisor, AdvisorError, AnalysisRequest, TextStream};
use etf_server::state::AppState;

pub const PASSWORD: &str = "secret123";

/// Canned advisor that records every request it sees.
#[derive(Debug)]
pub struct StubAdvisor {
    pub reply: String,
    pub fail: AtomicBool,
    pub requests: Mutex<Vec<AnalysisRequest>>,
}

impl StubAdvisor {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_owned(),
            fail: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn last_request(&self) -> AnalysisRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("advisor was called")
    }

    fn record(&self, request: &AnalysisRequest) -> Result<(), AdvisorError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(AdvisorError::Rejected("stub is down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Advisor for StubAdvisor {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AdvisorError> {
        self.record(request)?;
        Ok(self.reply.clone())
    }

    async fn analyze_stream(&self, request: &AnalysisRequest) -> Result<TextStream, AdvisorError> {
        self.record(request)?;
        let chunks: Vec<Result<String, AdvisorError>> = self
            .reply
            .split_inclusive(' ')
            .map(|chunk| Ok(chunk.to_owned()))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub advisor: Arc<StubAdvisor>,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_reply("SPY 비중을 유지하세요.").await
}

pub async fn spawn_app_with_reply(reply: &str) -> TestApp {
    let store = SqliteStore::connect("sqlite::memory:")
        .await
        .expect("in-memory store");
    store.seed_etfs().await.expect("seed catalogue");
    let advisor = Arc::new(StubAdvisor::new(reply));
    let state = Arc::new(
        AppState::new(Config::for_tests(), store, advisor.clone()).expect("app state"),
    );
    let server = TestServer::new(routes::build(state.clone())).expect("test server");
    TestApp {
        server,
        state,
        advisor,
    }
}

impl TestApp {
    /// Sign up and log in `username`; returns the bearer token.
    pub async fn register(&self, username: &str) -> String {
        self.server
            .post("/signup")
            .json(&json!({
                "username": username,
                "password": PASSWORD,
                "name": format!("{username} 님"),
                "email": format!("{username}@example.com"),
            }))
            .await
            .assert_status_ok();

        let body: Value = self
            .server
            .post("/login")
            .json(&json!({ "username": username, "password": PASSWORD }))
            .await
            .json();
        body["access_token"]
            .as_str()
            .expect("access token")
            .to_owned()
    }

    /// Register `username` and give them default investment settings.
    pub async fn register_with_settings(&self, username: &str) -> String {
        let token = self.register(username).await;
        authed(self.server.post("/users/me/settings"), &token)
            .json(&json!({}))
            .await
            .assert_status_ok();
        token
    }
}

pub fn authed(request: TestRequest, token: &str) -> TestRequest {
    let value = HeaderValue::from_str(&format!("Bearer {token}")).expect("header value");
    request.add_header(header::AUTHORIZATION, value)
}
