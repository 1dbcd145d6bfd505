//! Note relay subsystem.
//!
//! # Data Flow
//! ```text
//! POST /api/create-note
//!     → handler.rs (body validation, key check; non-POST goes to method_not_allowed)
//!     → classify.rs (user-agent → ClientCategory → ResponseMode)
//!     → upstream.rs (workflow run, single attempt)
//!     → blocking:  upstream.rs (data.outputs) → {success, data}
//!     → streaming: stream.rs + decoder.rs → chunked text
//! ```
//!
//! # Design Decisions
//! - No retries: one inbound call is one upstream call
//! - Upstream status codes are forwarded as-is
//! - Streaming failures are reported in-band once headers are sent

pub mod classify;
pub mod decoder;
pub mod error;
pub mod handler;
pub mod stream;
pub mod upstream;

pub use classify::{classify, ClientCategory, ResponseMode};
pub use error::{RelayError, RelayResult};
pub use upstream::{WorkflowClient, WorkflowRequest};
