#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use payment_gateway::{build_router, AppState, GatewayConfig};
use serde_json::Value;
use tower::ServiceExt; // oneshot

pub const INTEGRATION_KEY: &str = "integration-key";

pub fn state(config: GatewayConfig) -> AppState {
    AppState::new(config, reqwest::Client::new()).unwrap()
}

pub fn app(config: GatewayConfig) -> Router {
    build_router(state(config))
}

pub fn json_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn raw_request(method: &str, uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder().uri(uri).method(method).body(body.into()).unwrap()
}

/// Status, headers and body; non-JSON bodies come back as a string value.
pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, headers, body)
}

/// Line-delimited provider reply with a valid trailing hash.
pub fn signed_reply(fields: &[(&str, &str)]) -> String {
    let hash = payment_gateway::paynow_hash(fields.iter().map(|(_, v)| *v), INTEGRATION_KEY);
    let mut body: String = fields.iter().map(|(k, v)| format!("{k}={v}\n")).collect();
    body.push_str(&format!("hash={hash}\n"));
    body
}
