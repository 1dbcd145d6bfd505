//! Relay error definitions.

use axum::http::{Method, StatusCode};
use thiserror::Error;

/// Errors that end a relay request before any body has been sent.
///
/// Failures after streaming starts are not represented here; the status is
/// already committed, so they are reported in-band by the relay stream.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Anything other than POST.
    #[error("Method {0} Not Allowed")]
    MethodNotAllowed(Method),

    /// A required field is missing or empty, or the body is not a JSON object.
    #[error("Bad Request: emotion, event, and behavior are required.")]
    BadRequest,

    /// The upstream API key is not configured.
    #[error("Server configuration error: API key is missing.")]
    ServerConfiguration,

    /// Upstream answered with a non-success status.
    ///
    /// `reason` is upstream's own reason phrase when it differs from the
    /// canonical one for `status`.
    #[error("Dify API error: {}", status_line(.status, .reason.as_deref()))]
    Upstream {
        status: StatusCode,
        reason: Option<String>,
    },

    /// Blocking response without `data.outputs`.
    #[error("Unexpected response format from Dify API.")]
    UnexpectedUpstreamFormat,

    /// Transport failures and anything else not classified above.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl RelayError {
    /// HTTP status reported to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::BadRequest => StatusCode::BAD_REQUEST,
            RelayError::Upstream { status, .. } => *status,
            RelayError::ServerConfiguration
            | RelayError::UnexpectedUpstreamFormat
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        RelayError::Internal(e.to_string())
    }
}

/// `"<code> <reason>"`, or just the code when there is no reason phrase.
///
/// Prefers the phrase upstream sent, then the canonical one.
fn status_line(status: &StatusCode, reason: Option<&str>) -> String {
    match reason.or_else(|| status.canonical_reason()) {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
