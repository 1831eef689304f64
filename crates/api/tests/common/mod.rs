#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use rwa_core::config::MarketConfig;
use rwa_core::market::Market;
use rwa_core::types::Identity;
use rwa_events::{EventBus, EventRecorder};
use tower::ServiceExt;

use rwa_api::auth::jwt::{generate_access_token, JwtConfig};
use rwa_api::config::ServerConfig;
use rwa_api::router::build_app_router;
use rwa_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

pub fn who(name: &str) -> Identity {
    Identity::new(name).unwrap()
}

/// Market wired with `controller` holding every admin role, `collector`
/// receiving fees at 2.5% and `appraiser` allowed to submit prices.
pub fn test_market() -> Market {
    let mut config = MarketConfig::with_controller(who("controller"));
    config.fee_collector = who("collector");
    config.fee_bps = 250;
    config.min_confidence = 70;
    config.submitters = vec![who("appraiser")];
    Market::new(config).unwrap()
}

/// Build the full application router with a fresh market and a running
/// event recorder.
pub fn build_test_app() -> Router {
    let config = test_config();
    let event_bus = Arc::new(EventBus::default());
    let recorder = EventRecorder::default();
    tokio::spawn(recorder.clone().run(event_bus.subscribe()));

    let state = AppState::new(test_market(), config.clone(), event_bus, recorder);
    build_app_router(state, &config)
}

/// Bearer token for `identity` signed with the test secret.
pub fn token(identity: &str) -> String {
    generate_access_token(identity, &test_config().jwt).unwrap()
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    caller: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder.header("authorization", format!("Bearer {}", token(caller)));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str, caller: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(caller), None).await
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    caller: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(caller), Some(body)).await
}

pub async fn put_json(
    app: &Router,
    uri: &str,
    caller: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::PUT, uri, Some(caller), Some(body)).await
}

pub async fn delete(app: &Router, uri: &str, caller: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(caller), None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
