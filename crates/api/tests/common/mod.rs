#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::{FixedOffset, TimeZone, Utc};
use http_body_util::BodyExt;
use lapwatch_api::auth::jwt::{generate_access_token, JwtConfig};
use lapwatch_api::config::ServerConfig;
use lapwatch_api::router::build_app_router;
use lapwatch_api::state::AppState;
use lapwatch_core::clock::ManualClock;
use lapwatch_core::types::Timestamp;
use lapwatch_db::MemoryRaceStore;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const OWNER: &str = "runner-1";
pub const OTHER_OWNER: &str = "runner-2";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        schedule_offset: FixedOffset::east_opt(0).unwrap(),
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2025, 4, 26, 7, 0, 0).unwrap()
}

/// The full application over an in-memory store and a manual clock.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryRaceStore>,
    pub clock: Arc<ManualClock>,
}

/// Build the application router with the production middleware stack.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryRaceStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let state = AppState::new(store.clone(), config.clone(), clock.clone());
    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        store,
        clock,
    }
}

pub fn token_for(owner_id: &str) -> String {
    generate_access_token(owner_id, &test_config().jwt).unwrap()
}

impl TestApp {
    /// Send a request as `owner` (or anonymously with `None`).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        owner: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(owner) = owner {
            builder = builder.header("Authorization", format!("Bearer {}", token_for(owner)));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Method::GET, uri, Some(OWNER), None).await
    }

    pub async fn post(&self, uri: &str, body: Option<Value>) -> Response<Body> {
        self.send(Method::POST, uri, Some(OWNER), body).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(Method::PATCH, uri, Some(OWNER), Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send(Method::DELETE, uri, Some(OWNER), None).await
    }

    /// Create a race as [`OWNER`] and return its `data` object.
    pub async fn create_race(&self, body: Value) -> Value {
        let response = self.post("/api/v1/races", Some(body)).await;
        assert_eq!(response.status(), axum::http::StatusCode::CREATED);
        body_json(response).await["data"].clone()
    }
}

pub fn backyard_body(name: &str) -> Value {
    json!({
        "name": name,
        "kind": "backyard",
        "lap_distance_meters": 6706,
        "base_interval_minutes": 60,
    })
}

pub fn frontyard_body(name: &str) -> Value {
    json!({
        "name": name,
        "kind": "frontyard",
        "lap_distance_meters": 1000,
        "base_interval_minutes": 5,
        "lap_reduction_minutes": 1,
    })
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
