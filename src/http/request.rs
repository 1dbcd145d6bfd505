//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) when the caller sent none
//! - Parse the inbound note body
//! - Validate required fields before anything reaches the upstream
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A body that does not parse is treated like one with missing fields
//! - Empty strings count as missing, including for `userName`

use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use serde::Deserialize;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::relay::error::{RelayError, RelayResult};

/// Request ID header name.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates a UUID v4 request ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Read the request ID set by the request ID layer.
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

/// Inbound note body as sent by the caller.
#[derive(Debug, Default, Deserialize)]
pub struct NoteRequest {
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub behavior: Option<String>,
    #[serde(default, rename = "userName")]
    pub user_name: Option<String>,
}

/// A note with all required fields present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidNote {
    pub emotion: String,
    pub event: String,
    pub behavior: String,
    pub user_name: Option<String>,
}

impl NoteRequest {
    /// Parse a JSON body. Anything that is not a note object is a bad request.
    pub fn from_body(body: &[u8]) -> RelayResult<Self> {
        serde_json::from_slice(body).map_err(|e| {
            tracing::debug!(error = %e, "Unparseable note body");
            RelayError::BadRequest
        })
    }

    pub fn validate(self) -> RelayResult<ValidNote> {
        fn present(field: Option<String>) -> Option<String> {
            field.filter(|v| !v.is_empty())
        }

        match (present(self.emotion), present(self.event), present(self.behavior)) {
            (Some(emotion), Some(event), Some(behavior)) => Ok(ValidNote {
                emotion,
                event,
                behavior,
                user_name: present(self.user_name),
            }),
            _ => Err(RelayError::BadRequest),
        }
    }
}
