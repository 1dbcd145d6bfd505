//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, parse and validate the note body)
//!     → relay handler (upstream call, mode selection)
//!     → response.rs (JSON envelope or chunked text)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuidV4, NoteRequest, RequestIdExt, ValidNote, X_REQUEST_ID};
pub use server::{AppState, HttpServer, CREATE_NOTE_PATH};
