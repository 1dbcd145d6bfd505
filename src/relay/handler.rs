//! The create-note relay handler.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
};
use std::time::Instant;

use crate::http::request::{NoteRequest, RequestIdExt};
use crate::http::response;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::relay::classify::{classify_headers, ResponseMode};
use crate::relay::error::{RelayError, RelayResult};
use crate::relay::stream::RelayStream;
use crate::relay::upstream::{blocking_outputs, WorkflowRequest};

/// `POST /api/create-note`.
///
/// Every outcome, including errors, ends in a response here.
pub async fn create_note(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start_time = Instant::now();
    let request_id = headers.request_id().to_string();
    let mut mode = None;

    let response = match relay(&state, &headers, body, &request_id, &mut mode).await {
        Ok(response) => response,
        Err(err) => {
            match &err {
                RelayError::Internal(details) => {
                    tracing::error!(request_id = %request_id, details = %details, "Handler error");
                }
                RelayError::BadRequest => {
                    tracing::warn!(request_id = %request_id, error = %err, "Rejected request");
                }
                _ => {
                    tracing::error!(request_id = %request_id, error = %err, "Relay failed");
                }
            }
            err.into_response()
        }
    };

    let mode = mode.map(ResponseMode::as_str).unwrap_or("none");
    metrics::record_request(mode, response.status().as_u16(), start_time);
    response
}

/// Any other method on the relay path.
///
/// Runs as the route's method fallback, outside the body limit, so the
/// body is never read.
pub async fn method_not_allowed(method: Method, headers: HeaderMap) -> Response {
    let start_time = Instant::now();
    let err = RelayError::MethodNotAllowed(method);
    tracing::warn!(request_id = %headers.request_id(), error = %err, "Rejected request");

    let response = err.into_response();
    metrics::record_request("none", response.status().as_u16(), start_time);
    response
}

async fn relay(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
    request_id: &str,
    mode_out: &mut Option<ResponseMode>,
) -> RelayResult<Response> {
    let note = NoteRequest::from_body(&body)?.validate()?;

    let client = state.workflow.as_deref().ok_or_else(|| {
        tracing::error!(request_id = %request_id, "API key is not set");
        RelayError::ServerConfiguration
    })?;

    let category = classify_headers(headers);
    let mode = category.response_mode();
    *mode_out = Some(mode);

    let request = WorkflowRequest::new(note, mode, client.fallback_prefix());

    tracing::debug!(
        request_id = %request_id,
        inputs = ?request.inputs,
        user = %request.user,
        "Workflow inputs"
    );
    tracing::info!(
        request_id = %request_id,
        mode = %mode,
        client = %category,
        "Relaying note"
    );

    let upstream = client.run(&request).await?;

    match mode {
        ResponseMode::Blocking => {
            let outputs = blocking_outputs(upstream).await?;
            tracing::info!(request_id = %request_id, "Blocking response received");
            Ok(response::success(outputs))
        }
        ResponseMode::Streaming => {
            let stream = RelayStream::new(Box::pin(upstream.bytes_stream()), request_id);
            Ok(response::text_stream(stream))
        }
    }
}
