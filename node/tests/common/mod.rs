// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use loop_node::config::NodeConfig;
use loop_node::server::{build_router, AppState};
use loop_node::store::LoopStore;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt; // for oneshot

/// In-memory node with keepalives off and generous rate limits.
pub fn test_config() -> NodeConfig {
    let mut cfg = NodeConfig::default();
    cfg.hub.keepalive = Duration::ZERO;
    cfg.rate_limit.read_max = 0;
    cfg.rate_limit.write_max = 0;
    cfg.node.node_id = "lab-hub.loop".to_string();
    cfg
}

pub fn test_app(cfg: &NodeConfig) -> (Router, AppState) {
    test_app_with_store(cfg, LoopStore::open_in_memory().unwrap())
}

pub fn test_app_with_store(cfg: &NodeConfig, store: LoopStore) -> (Router, AppState) {
    let state = AppState::new(cfg, store, None);
    (build_router(state.clone(), cfg), state)
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

pub fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    send(app, post(uri, body)).await
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, get(uri)).await
}

pub fn material(id: &str) -> Value {
    json!({
        "@context": "https://loop-protocol.org/v0.1.1",
        "@type": "MaterialDNA",
        "schema_version": "0.1.1",
        "id": id,
        "category": "plastic-pet",
        "quantity": { "value": 140, "unit": "kg" },
        "quality": 0.92,
        "origin_city": "Munich",
        "current_city": "Munich",
        "available_from": "2025-06-01T10:00:00Z",
        "batch_ref": "lot-7"
    })
}

pub fn offer(id: &str, material_id: &str) -> Value {
    json!({
        "@type": "Offer",
        "schema_version": "0.1.1",
        "id": id,
        "material_id": material_id,
        "from_city": "Munich",
        "to_city": "Berlin",
        "quantity": { "value": 100, "unit": "kg" },
        "status": "open",
        "available_until": "2025-06-05T10:00:00Z"
    })
}

pub fn match_for(id: &str, material_id: &str, offer_id: &str) -> Value {
    json!({
        "@type": "Match",
        "schema_version": "0.1.1",
        "id": id,
        "material_id": material_id,
        "offer_id": offer_id,
        "from_city": "Munich",
        "to_city": "Berlin",
        "status": "accepted",
        "matched_at": "2025-06-02T12:15:00Z"
    })
}

pub fn transfer(id: &str, material_id: &str, match_id: &str) -> Value {
    json!({
        "@type": "Transfer",
        "schema_version": "0.1.1",
        "id": id,
        "material_id": material_id,
        "match_id": match_id,
        "status": "completed",
        "handoff_at": "2025-06-02T14:00:00Z"
    })
}

pub fn handshake(node_id: &str) -> Value {
    json!({
        "@context": "https://loop-protocol.org/v0.1.1",
        "@type": "NodeHandshake",
        "schema_version": "0.1.1",
        "node_id": node_id,
        "name": "DEMO Munich Node",
        "endpoint": "https://demo-munich.loop/api",
        "capabilities": ["material-registry", "lab-relay"],
        "timestamp": "2025-12-20T10:00:00Z"
    })
}
