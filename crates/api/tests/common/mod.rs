//! Common test utilities for integration tests.
//!
//! Every test builds its own in-process app with mock notification channels,
//! so tests are independent and need no external services.

// Helpers are shared across test binaries; not every binary uses all of them.
#![allow(dead_code)]

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use domain::models::ChannelKind;
use domain::services::{AlertDispatcher, MockNotificationChannel};
use geofence_api::{
    app::{create_app, AppState},
    config::Config,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

/// Milliseconds since epoch used as the base time in tests (a minute boundary).
pub const BASE_TS_MS: i64 = 1_700_000_040_000;

/// Test configuration built from embedded defaults.
pub fn test_config() -> Config {
    Config::load_for_test(&[]).expect("Failed to load test config")
}

/// An in-process app wired to recording notification channels.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub webhook: MockNotificationChannel,
    pub email: MockNotificationChannel,
    pub sms: MockNotificationChannel,
}

impl TestApp {
    /// Sends one request through the router.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Sends one request and returns the status with the parsed JSON body.
    pub async fn call(&self, request: Request<Body>) -> (axum::http::StatusCode, Value) {
        let response = self.send(request).await;
        let status = response.status();
        (status, parse_response_body(response).await)
    }

    /// Waits until every spawned delivery has finished.
    pub async fn wait_for_deliveries(&self) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.state.dispatcher.in_flight() > 0 {
            assert!(
                tokio::time::Instant::now() < deadline,
                "deliveries did not settle in time"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Build a test app from `config`, with mock channels for every kind.
pub fn create_test_app(config: Config) -> TestApp {
    create_test_app_with(
        config,
        MockNotificationChannel::new(ChannelKind::Webhook),
        MockNotificationChannel::new(ChannelKind::Email),
        MockNotificationChannel::new(ChannelKind::Sms),
    )
}

/// Build a test app with caller supplied mock channels.
pub fn create_test_app_with(
    config: Config,
    webhook: MockNotificationChannel,
    email: MockNotificationChannel,
    sms: MockNotificationChannel,
) -> TestApp {
    let dispatcher = AlertDispatcher::new(config.dispatcher.clone())
        .with_channel(Arc::new(webhook.clone()))
        .with_channel(Arc::new(email.clone()))
        .with_channel(Arc::new(sms.clone()));
    let state = AppState::new(config, dispatcher);
    let router = create_app(state.clone());

    TestApp {
        state,
        router,
        webhook,
        email,
        sms,
    }
}

/// Build a JSON request.
pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build a GET request.
pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Build a DELETE request.
pub fn delete_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Helper to parse JSON response body.
pub async fn parse_response_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

/// Circle geofence payload notifying one webhook.
pub fn circle_geofence(name: &str, lat: f64, lon: f64, radius_meters: f64) -> Value {
    json!({
        "name": name,
        "shape": {
            "type": "circle",
            "center": { "latitude": lat, "longitude": lon },
            "radiusMeters": radius_meters
        },
        "notifications": [
            { "channel": "webhook", "url": "https://hooks.example.com/geofence" }
        ]
    })
}

/// Location upload payload.
pub fn location(device_id: Uuid, timestamp_ms: i64, lat: f64, lon: f64) -> Value {
    json!({
        "deviceId": device_id,
        "timestamp": timestamp_ms,
        "latitude": lat,
        "longitude": lon
    })
}

/// Create a geofence and return its id.
pub async fn create_geofence(app: &TestApp, body: Value) -> String {
    let (status, body) = app
        .call(json_request(Method::POST, "/api/v1/geofences", body))
        .await;
    assert_eq!(status, axum::http::StatusCode::CREATED, "body: {}", body);
    body["id"].as_str().unwrap().to_string()
}

/// Upload one location and return the status with the parsed body.
pub async fn upload(app: &TestApp, body: Value) -> (axum::http::StatusCode, Value) {
    app.call(json_request(Method::POST, "/api/v1/locations", body))
        .await
}

/// Transitions in an upload response as `(geofenceId, transition)` pairs.
pub fn transitions(body: &Value) -> Vec<(String, String)> {
    body["alerts"]
        .as_array()
        .map(|alerts| {
            alerts
                .iter()
                .map(|a| {
                    (
                        a["geofenceId"].as_str().unwrap_or_default().to_string(),
                        a["transition"].as_str().unwrap_or_default().to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}
