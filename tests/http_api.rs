//! HTTP API tests, driving the router in-process with a spy engine

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{png_size, SpyEngine, FAIL_MARKER};
use http_body_util::BodyExt;
use quotecard::server::{router, MAX_BODY_BYTES};
use quotecard::{RenderService, RenderTarget};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> (Router, Arc<RenderService<SpyEngine>>) {
    let service = Arc::new(RenderService::new(SpyEngine::new(), RenderTarget::QUOTE_CARD));
    (router(service.clone()), service)
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/generate-tweet")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    resp.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).expect("json body")
}

#[tokio::test]
async fn health_describes_the_service() {
    let (app, _) = app();
    let resp = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["endpoints"]["generate"], "POST /api/generate-tweet");
}

#[tokio::test]
async fn generate_returns_png_with_headers() {
    let (app, service) = app();
    let resp = app
        .oneshot(post_json(
            &json!({"name": "Ada Lovelace", "handle": "ada", "tweet": "Hello\nWorld"}).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");

    let bytes = body_bytes(resp).await;
    assert_eq!(headers[header::CONTENT_LENGTH], bytes.len().to_string().as_str());
    assert_eq!(png_size(&bytes), (3000, 3000));
    assert_eq!(service.engine().calls(), 1);
}

#[tokio::test]
async fn empty_name_is_a_400_without_rendering() {
    let (app, service) = app();
    let resp = app
        .oneshot(post_json(&json!({"name": "", "handle": "ada", "tweet": "hi"}).to_string()))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(resp).await,
        json!({"error": "Missing required fields", "required": ["name", "handle", "tweet"]})
    );
    assert_eq!(service.engine().calls(), 0);
}

#[tokio::test]
async fn absent_fields_are_a_400() {
    let (app, service) = app();
    let resp = app.oneshot(post_json("{}")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "Missing required fields");
    assert_eq!(service.engine().calls(), 0);
}

#[tokio::test]
async fn invalid_image_reference_is_a_400() {
    let (app, service) = app();
    let resp = app
        .oneshot(post_json(
            &json!({"name": "Ada", "handle": "ada", "tweet": "hi", "background": "javascript:alert(1)"})
                .to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Invalid image reference");
    assert_eq!(body["field"], "background");
    assert_eq!(service.engine().calls(), 0);
}

#[tokio::test]
async fn malformed_json_is_a_400() {
    let (app, _) = app();
    let resp = app.oneshot(post_json("{\"name\": ")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "Invalid JSON body");
}

#[tokio::test]
async fn body_over_the_limit_is_a_413() {
    let (app, service) = app();
    let avatar = format!("data:image/png;base64,{}", "A".repeat(MAX_BODY_BYTES));
    let resp = app
        .oneshot(post_json(
            &json!({"name": "Ada", "handle": "ada", "tweet": "hi", "profileImage": avatar}).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(resp).await["error"], "Invalid JSON body");
    assert_eq!(service.engine().calls(), 0);
}

#[tokio::test]
async fn missing_content_type_is_a_415() {
    let (app, _) = app();
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate-tweet")
                .body(Body::from(json!({"name": "Ada", "handle": "ada", "tweet": "hi"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body_json(resp).await["error"], "Invalid JSON body");
}

#[tokio::test]
async fn bare_at_handle_is_a_400() {
    let (app, service) = app();
    let resp = app
        .oneshot(post_json(&json!({"name": "Ada", "handle": " @ ", "tweet": "hi"}).to_string()))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "Missing required fields");
    assert_eq!(service.engine().calls(), 0);
}

#[tokio::test]
async fn render_failure_is_a_500() {
    let (app, _) = app();
    let resp = app
        .oneshot(post_json(
            &json!({"name": "Ada", "handle": "ada", "tweet": FAIL_MARKER}).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Failed to generate quote image");
    assert!(body["message"].as_str().unwrap().contains("capture"));
}

#[tokio::test]
async fn unknown_path_is_a_404() {
    let (app, _) = app();
    let resp = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(resp).await,
        json!({"error": "Not found", "path": "/nope", "method": "GET"})
    );
}

#[tokio::test]
async fn wrong_method_is_a_404() {
    let (app, _) = app();
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/generate-tweet")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["path"], "/api/generate-tweet");
    assert_eq!(body["method"], "GET");
}

#[tokio::test]
async fn large_data_uri_bodies_are_accepted() {
    let (app, service) = app();
    let avatar = format!("data:image/png;base64,{}", "A".repeat(3 * 1024 * 1024));
    let resp = app
        .oneshot(post_json(
            &json!({"name": "Ada", "handle": "ada", "tweet": "hi", "profileImage": avatar}).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(service.engine().calls(), 1);
}
