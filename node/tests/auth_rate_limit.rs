// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use serde_json::Value;
use tower::ServiceExt;

fn keyed_config(key: Option<&str>) -> loop_node::config::NodeConfig {
    let mut cfg = test_config();
    cfg.auth.enabled = true;
    cfg.auth.api_key = key.map(str::to_string);
    cfg
}

fn post_with(uri: &str, body: &Value, header: (&str, &str)) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(header.0, header.1)
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_guard_without_key_is_unavailable() {
    let (app, _) = test_app(&keyed_config(None));

    let (status, body) = post_json(&app, "/api/loop/materials", &material("M1")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "not_configured");
}

#[tokio::test]
async fn test_missing_or_wrong_key_unauthorized() {
    let (app, _) = test_app(&keyed_config(Some("s3cret")));

    let (status, body) = post_json(&app, "/api/loop/materials", &material("M1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let req = post_with("/api/loop/materials", &material("M1"), ("x-api-key", "nope"));
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = post_with("/api/loop/relay", &material("M1"), ("authorization", "Bearer nope"));
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = get_json(&app, "/api/loop/events").await;
    assert!(body["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_valid_key_accepted_in_either_header() {
    let (app, _) = test_app(&keyed_config(Some("s3cret")));

    let req = post_with("/api/loop/materials", &material("M1"), ("x-api-key", "s3cret"));
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let req = post_with("/api/loop/materials", &material("M2"), ("authorization", "bearer s3cret"));
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let req = post_with("/api/federation/handshake", &handshake("munich.loop"), ("x-api-key", "s3cret"));
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_reads_are_not_guarded() {
    let (app, _) = test_app(&keyed_config(Some("s3cret")));

    for uri in ["/api/loop/events", "/api/federation/nodes", "/health"] {
        let (status, _) = get_json(&app, uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
    }
}

#[tokio::test]
async fn test_write_rate_limit() {
    let mut cfg = test_config();
    cfg.rate_limit.write_max = 1;
    let (app, _) = test_app(&cfg);

    let response = app.clone().oneshot(post("/api/loop/materials", &material("M1"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-ratelimit-limit"], "1");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

    let response = app.clone().oneshot(post("/api/loop/materials", &material("M2"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));

    let (_, body) = send(&app, post("/api/loop/materials", &material("M3"))).await;
    assert_eq!(body["kind"], "rate_limited");
    assert_eq!(body["retryable"], true);

    // Reads have their own budget.
    let (status, body) = get_json(&app, "/api/loop/events").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rate_limit_keyed_by_forwarded_client() {
    let mut cfg = test_config();
    cfg.rate_limit.read_max = 1;
    let (app, _) = test_app(&cfg);

    let from = |ip: &str| {
        Request::builder()
            .uri("/api/loop/events")
            .header("x-forwarded-for", format!("{}, 10.0.0.1", ip))
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(send(&app, from("203.0.113.7")).await.0, StatusCode::OK);
    assert_eq!(send(&app, from("203.0.113.7")).await.0, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(send(&app, from("198.51.100.2")).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_assigned_and_propagated() {
    let (app, _) = test_app(&test_config());

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));

    let req = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-me")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-me");
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let mut cfg = test_config();
    cfg.body_limit = 256;
    let (app, _) = test_app(&cfg);

    let mut big = material("M1");
    big["notes"] = Value::String("x".repeat(1024));
    let (status, _) = post_json(&app, "/api/loop/materials", &big).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_cors_allows_credentials_and_exposes_request_id() {
    let mut cfg = test_config();
    cfg.allowed_origins = vec!["https://lab.loop".to_string()];
    let (app, _) = test_app(&cfg);

    let req = Request::builder()
        .uri("/api/loop/events")
        .header("origin", "https://lab.loop")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "https://lab.loop");
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert_eq!(headers["access-control-expose-headers"], "x-request-id");

    let req = Request::builder()
        .uri("/api/loop/events")
        .header("origin", "https://elsewhere.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_unknown_route_uses_error_shape() {
    let (app, _) = test_app(&test_config());

    let (status, body) = get_json(&app, "/api/loop/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
    assert_eq!(body["kind"], "not_found");

    let response = app.oneshot(get("/nope")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
