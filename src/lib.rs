//! Note Relay Library
//!
//! Forwards structured notes to a Dify workflow and relays the result,
//! buffered for mini-program clients and streamed for everyone else.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
