//! Response envelopes and error mapping.
//!
//! # Responsibilities
//! - Map relay errors to status codes and JSON error bodies
//! - Build the blocking success envelope
//! - Build the chunked text response for streaming mode
//! - Turn handler panics into a terminating 500
//!
//! # Design Decisions
//! - 405 answers in plain text with `Allow: POST`; every other error is JSON
//! - Internal errors carry the underlying message under `details`

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::stream::TryStream;
use serde::Serialize;
use serde_json::{json, Value};
use std::any::Any;

use crate::relay::error::RelayError;

/// Content type of streamed responses.
pub const STREAM_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Generic message for internal failures.
pub const INTERNAL_ERROR: &str = "Internal server error";

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            RelayError::MethodNotAllowed(method) => (
                status,
                [(header::ALLOW, HeaderValue::from_static("POST"))],
                RelayError::MethodNotAllowed(method).to_string(),
            )
                .into_response(),
            RelayError::Internal(details) => (
                status,
                Json(ErrorBody {
                    error: INTERNAL_ERROR.to_string(),
                    details: Some(details),
                }),
            )
                .into_response(),
            other => (
                status,
                Json(ErrorBody {
                    error: other.to_string(),
                    details: None,
                }),
            )
                .into_response(),
        }
    }
}

/// `200 {success: true, data}` for blocking mode.
pub fn success(data: Value) -> Response {
    (StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response()
}

/// `200` chunked text response for streaming mode.
pub fn text_stream<S>(stream: S) -> Response
where
    S: TryStream + Send + 'static,
    S::Ok: Into<axum::body::Bytes>,
    S::Error: Into<axum::BoxError>,
{
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(STREAM_CONTENT_TYPE)),
            (header::TRANSFER_ENCODING, HeaderValue::from_static("chunked")),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Panic handler for the catch-panic layer.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };

    tracing::error!(details = %details, "Handler error");
    RelayError::Internal(details).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_bad_request_body() {
        let response = RelayError::BadRequest.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Bad Request: emotion, event, and behavior are required." })
        );
    }

    #[tokio::test]
    async fn test_method_not_allowed_sets_allow() {
        let response = RelayError::MethodNotAllowed(axum::http::Method::GET).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "POST");
    }

    #[tokio::test]
    async fn test_upstream_error_forwards_status() {
        let response = RelayError::Upstream {
            status: StatusCode::TOO_MANY_REQUESTS,
            reason: None,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Dify API error: 429 Too Many Requests" })
        );
    }

    #[tokio::test]
    async fn test_internal_error_has_details() {
        let response = RelayError::Internal("dns failure".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Internal server error", "details": "dns failure" })
        );
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let response = success(json!({ "result": "ok" }));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "success": true, "data": { "result": "ok" } })
        );
    }

    #[tokio::test]
    async fn test_panic_response() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["details"], "boom");
    }
}
