//! Client classification and transfer-mode selection.
//!
//! Some embedded mini-program runtimes cannot consume chunked responses.
//! They are detected from the user-agent and served in blocking mode.

use axum::http::{header::USER_AGENT, HeaderMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// User-agent markers of mini-program runtimes.
pub const CONSTRAINED_MARKERS: [&str; 2] = ["miniProgram", "MicroMessenger"];

/// Caller category derived from the user-agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCategory {
    /// Cannot consume chunked transfer.
    Constrained,
    /// Everything else.
    Standard,
}

/// Upstream `response_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    Blocking,
    Streaming,
}

impl ClientCategory {
    pub fn response_mode(self) -> ResponseMode {
        match self {
            ClientCategory::Constrained => ResponseMode::Blocking,
            ClientCategory::Standard => ResponseMode::Streaming,
        }
    }
}

impl ResponseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseMode::Blocking => "blocking",
            ResponseMode::Streaming => "streaming",
        }
    }
}

impl fmt::Display for ClientCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientCategory::Constrained => f.write_str("mini-program"),
            ClientCategory::Standard => f.write_str("standard"),
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a caller by its user-agent. A missing header is a standard client.
pub fn classify(user_agent: Option<&str>) -> ClientCategory {
    match user_agent {
        Some(ua) if CONSTRAINED_MARKERS.iter().any(|m| ua.contains(m)) => {
            ClientCategory::Constrained
        }
        _ => ClientCategory::Standard,
    }
}

/// Classify a caller from its request headers.
///
/// The user-agent is decoded lossily: agents carrying non-ASCII text
/// (localized device names) still match the ASCII markers.
pub fn classify_headers(headers: &HeaderMap) -> ClientCategory {
    let user_agent = headers
        .get(USER_AGENT)
        .map(|v| String::from_utf8_lossy(v.as_bytes()));
    classify(user_agent.as_deref())
}
