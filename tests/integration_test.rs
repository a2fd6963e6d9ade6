//! Integration tests for the HTTP surface that need no upstream.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use llm_chat_relay::{
    core::{
        config::{AppConfig, CorsConfig, RateLimitConfig},
        init_metrics,
    },
    create_router, AppState, ModelRegistry,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower::ServiceExt;

fn create_app_with(config: AppConfig) -> Router {
    init_metrics();
    let state = AppState::new(config, ModelRegistry::builtin()).unwrap();
    create_router(Arc::new(state))
}

fn create_test_app() -> Router {
    create_app_with(AppConfig::default())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_raw(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// POST arriving over a connection from `caller`.
fn post_from(uri: &str, caller: &str, body: &Value) -> Request<Body> {
    post_via(uri, caller, None, body)
}

fn post_via(uri: &str, peer: &str, forwarded_for: Option<&str>, body: &Value) -> Request<Body> {
    let peer = SocketAddr::new(peer.parse::<IpAddr>().unwrap(), 52_000);
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .extension(ConnectInfo(peer));
    if let Some(client) = forwarded_for {
        builder = builder.header("x-forwarded-for", client);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = app.oneshot(get("/api/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "llm-chat-relay");
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_models_endpoint_lists_registry_in_order() {
    let app = create_test_app();

    let response = app.oneshot(get("/api/models")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["defaultModel"], "gpt-4o-mini");

    let keys: Vec<&str> = body["models"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, ModelRegistry::builtin().keys());

    let first = &body["models"][0];
    assert_eq!(first["upstreamId"], "openai/gpt-4o-mini");
    assert_eq!(first["multimodal"], true);
    assert!(first["expectedLatencyHint"].is_string());
}

#[tokio::test]
async fn test_missing_model_lists_available_models() {
    let app = create_test_app();

    let response = app
        .oneshot(post_raw(
            "/api/chat",
            r#"{"messages":[{"role":"user","content":"hi"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Model is required");
    assert_eq!(
        body["availableModels"].as_array().unwrap().len(),
        ModelRegistry::builtin().list().len()
    );
}

#[tokio::test]
async fn test_empty_messages_rejected() {
    let app = create_test_app();

    let response = app
        .oneshot(post_raw("/api/chat", r#"{"model":"gpt-4o","messages":[]}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Messages are required");
    assert!(body.get("availableModels").is_none());
}

#[tokio::test]
async fn test_missing_role_rejected() {
    let app = create_test_app();

    let response = app
        .oneshot(post_raw(
            "/api/chat",
            r#"{"model":"gpt-4o","messages":[{"content":"hi"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let app = create_test_app();

    for body in [
        "{not json",
        r#"{"model":"gpt-4o","messages":[{"role":"wizard","content":"hi"}]}"#,
        r#"{"model":"gpt-4o","messages":"hello"}"#,
    ] {
        let response = app.clone().oneshot(post_raw("/api/chat", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        let json = read_json(response).await;
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid request body"));
    }
}

#[tokio::test]
async fn test_rate_limit_rejects_over_cap() {
    let app = create_app_with(AppConfig {
        rate_limit: RateLimitConfig {
            window_ms: 60_000,
            max_requests: 3,
            ..RateLimitConfig::default()
        },
        ..AppConfig::default()
    });
    let body = json!({"model": "gpt-4o-mini", "messages": []});

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(post_from("/api/chat", "203.0.113.7", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .clone()
        .oneshot(post_from("/api/stream", "203.0.113.7", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");
    let json = read_json(response).await;
    assert_eq!(json["retryAfter"], 60);
    assert!(json["error"].is_string());

    // Another caller has its own budget.
    let response = app
        .clone()
        .oneshot(post_from("/api/chat", "198.51.100.1", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Catalogue endpoints are never limited.
    let response = app.oneshot(get("/api/models")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_spoofed_forwarded_for_shares_the_peer_budget() {
    let app = create_app_with(AppConfig {
        rate_limit: RateLimitConfig {
            window_ms: 60_000,
            max_requests: 2,
            ..RateLimitConfig::default()
        },
        ..AppConfig::default()
    });
    let body = json!({"model": "gpt-4o-mini", "messages": []});

    for spoofed in ["10.0.0.1", "10.0.0.2"] {
        let response = app
            .clone()
            .oneshot(post_via("/api/chat", "203.0.113.50", Some(spoofed), &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .oneshot(post_via("/api/chat", "203.0.113.50", Some("10.0.0.3"), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_trusted_proxy_limits_each_forwarded_client() {
    let app = create_app_with(AppConfig {
        rate_limit: RateLimitConfig {
            window_ms: 60_000,
            max_requests: 1,
            trust_proxy: true,
        },
        ..AppConfig::default()
    });
    let body = json!({"model": "gpt-4o-mini", "messages": []});
    let proxy = "10.0.0.254";

    let first = app
        .clone()
        .oneshot(post_via("/api/chat", proxy, Some("198.51.100.1"), &body))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);

    let repeat = app
        .clone()
        .oneshot(post_via("/api/chat", proxy, Some("198.51.100.1"), &body))
        .await
        .unwrap();
    assert_eq!(repeat.status(), StatusCode::TOO_MANY_REQUESTS);

    let other = app
        .oneshot(post_via("/api/chat", proxy, Some("198.51.100.2"), &body))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_default_rate_limit_is_thirty_per_window() {
    let app = create_test_app();
    let body = json!({"model": "gpt-4o-mini", "messages": []});

    for _ in 0..30 {
        let response = app
            .clone()
            .oneshot(post_from("/api/chat", "192.0.2.44", &body))
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let response = app
        .oneshot(post_from("/api/chat", "192.0.2.44", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_request_id_generated_and_echoed() {
    let app = create_test_app();

    let response = app.clone().oneshot(get("/api/health")).await.unwrap();
    let generated = response.headers().get("x-request-id").unwrap();
    assert_eq!(generated.to_str().unwrap().len(), 36);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header("x-request-id", "client-supplied-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "client-supplied-id"
    );
}

#[tokio::test]
async fn test_cors_allow_list() {
    let app = create_app_with(AppConfig {
        cors: CorsConfig {
            allowed_origins: vec!["https://chat.example.com".to_string()],
        },
        ..AppConfig::default()
    });

    let allowed = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header(header::ORIGIN, "https://chat.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        allowed
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "https://chat.example.com"
    );

    let denied = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header(header::ORIGIN, "https://evil.example.net")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(denied
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_cors_permissive_without_allow_list() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/models")
                .header(header::ORIGIN, "https://anywhere.example.org")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_unknown_route_without_front_end_is_json_404() {
    let app = create_test_app();

    let response = app.oneshot(get("/some/page")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["error"], "Not found");
}

#[tokio::test]
async fn test_static_front_end_with_spa_fallback() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>chat</html>").unwrap();
    std::fs::write(dir.path().join("app.js"), "console.log('hi')").unwrap();

    let app = create_app_with(AppConfig {
        static_dir: Some(dir.path().to_string_lossy().into_owned()),
        ..AppConfig::default()
    });

    let asset = app.clone().oneshot(get("/app.js")).await.unwrap();
    assert_eq!(asset.status(), StatusCode::OK);

    let deep_link = app.clone().oneshot(get("/conversations/42")).await.unwrap();
    let bytes = axum::body::to_bytes(deep_link.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"<html>chat</html>");

    // API routes still win over the front-end.
    let health = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(read_json(health).await["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = create_test_app();

    let _ = app.clone().oneshot(get("/api/health")).await.unwrap();
    let response = app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("chat_relay_requests_total"));
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let app = create_test_app();

    let response = app.oneshot(get("/api-docs/openapi.json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc = read_json(response).await;
    for route in ["/api/health", "/api/models", "/api/chat", "/api/stream"] {
        assert!(doc["paths"].get(route).is_some(), "missing {}", route);
    }
}
