//! HTTP surface of the card renderer

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info};
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};

use crate::error::{ServiceError, ValidationError};
use crate::service::REQUIRED_FIELDS;
use crate::{RenderEngine, RenderRequest, RenderService};

/// Largest accepted request body; profile images often arrive as data URIs.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Errors a handler can answer with
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Render(#[from] crate::Error),

    #[error("Invalid JSON body: {message}")]
    InvalidBody { status: StatusCode, message: String },
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // 413 for an oversized body, 415 for a missing content type, else 400/422
        ApiError::InvalidBody {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(e) => ApiError::Validation(e),
            ServiceError::Render(e) => ApiError::Render(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(ValidationError::MissingFields { .. }) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Missing required fields",
                    "required": REQUIRED_FIELDS,
                }),
            ),
            ApiError::Validation(ValidationError::InvalidImageRef { field, reason }) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Invalid image reference",
                    "field": field,
                    "message": reason,
                }),
            ),
            ApiError::InvalidBody { status, message } => (
                *status,
                json!({
                    "error": "Invalid JSON body",
                    "message": message,
                }),
            ),
            ApiError::Render(e) => {
                error!("Failed to generate quote image: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "Failed to generate quote image",
                        "message": e.to_string(),
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Build the application router around `service`.
pub fn router<E: RenderEngine>(service: Arc<RenderService<E>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods(cors::Any)
        .allow_headers(cors::Any);

    Router::new()
        .route("/", get(health).fallback(not_found))
        .route(
            "/api/generate-tweet",
            post(generate_tweet::<E>).fallback(not_found),
        )
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(log_requests))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .with_state(service)
}

/// Service descriptor
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Quote Card API",
        "endpoints": {
            "health": "GET /",
            "generate": "POST /api/generate-tweet",
        },
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Render a card and answer with the PNG
pub async fn generate_tweet<E: RenderEngine>(
    State(service): State<Arc<RenderService<E>>>,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let image = service.handle(request).await?;

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
        (header::CONTENT_LENGTH, HeaderValue::from(image.len())),
        (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        (
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"twitter-quote.png\""),
        ),
    ];
    Ok((StatusCode::OK, headers, image.into_bytes()).into_response())
}

async fn not_found(method: Method, uri: Uri) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found",
            "path": uri.path(),
            "method": method.as_str(),
        })),
    )
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    info!(
        "{} {} -> {} ({:?})",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!("Request handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Internal server error",
            "message": "An unexpected error occurred",
        })),
    )
        .into_response()
}
