//! Streaming relay: upstream byte stream → caller text stream.
//!
//! # State Machine
//! ```text
//! Idle → HeadersSent → Streaming(n) → Closed
//!                         ↺ chunk
//! ```
//! `Idle` is the handler before it builds the response. Once the response
//! is handed to the server the headers are committed and the stream starts
//! in `HeadersSent`. Upstream end or an upstream error both lead to
//! `Closed`, after which the stream yields nothing.
//!
//! # Design Decisions
//! - The stream is pulled by the response body: no spawned task, no buffer.
//!   Dropping it (caller disconnect) drops the upstream body as well.
//! - Errors after headers cannot change the status, so they are reported
//!   in-band by appending [`STREAM_ERROR_NOTICE`].

use axum::body::Bytes;
use futures_util::{ready, Stream, StreamExt};
use std::convert::Infallible;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::observability::metrics;
use crate::relay::decoder::Utf8Decoder;

/// Appended to the caller's stream when the upstream stream fails.
pub const STREAM_ERROR_NOTICE: &str = "\n\nStreaming error occurred.";

/// Relay stream state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    HeadersSent,
    /// Number of upstream chunks received so far.
    Streaming(u64),
    Closed,
}

/// Forwards decoded upstream chunks to the caller in arrival order.
pub struct RelayStream<S> {
    upstream: S,
    decoder: Utf8Decoder,
    state: RelayState,
    request_id: String,
}

impl<S> RelayStream<S> {
    pub fn new(upstream: S, request_id: impl Into<String>) -> Self {
        Self {
            upstream,
            decoder: Utf8Decoder::new(),
            state: RelayState::HeadersSent,
            request_id: request_id.into(),
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    fn chunk_count(&self) -> u64 {
        match self.state {
            RelayState::Streaming(n) => n,
            _ => 0,
        }
    }
}

impl<S, E> Stream for RelayStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.state == RelayState::Closed {
                return Poll::Ready(None);
            }

            match ready!(this.upstream.poll_next_unpin(cx)) {
                Some(Ok(bytes)) => {
                    let n = this.chunk_count() + 1;
                    this.state = RelayState::Streaming(n);
                    metrics::record_stream_chunk();

                    tracing::trace!(
                        request_id = %this.request_id,
                        chunk = n,
                        bytes = bytes.len(),
                        "Relaying chunk"
                    );

                    let text = this.decoder.decode(&bytes);
                    if text.is_empty() {
                        continue;
                    }
                    return Poll::Ready(Some(Ok(Bytes::from(text))));
                }
                Some(Err(e)) => {
                    tracing::error!(
                        request_id = %this.request_id,
                        chunks = this.chunk_count(),
                        error = %e,
                        "Streaming error"
                    );
                    metrics::record_stream_error();
                    this.state = RelayState::Closed;

                    let mut tail = this.decoder.finish();
                    tail.push_str(STREAM_ERROR_NOTICE);
                    return Poll::Ready(Some(Ok(Bytes::from(tail))));
                }
                None => {
                    tracing::debug!(
                        request_id = %this.request_id,
                        chunks = this.chunk_count(),
                        "Upstream stream complete"
                    );
                    this.state = RelayState::Closed;

                    let tail = this.decoder.finish();
                    if tail.is_empty() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(Ok(Bytes::from(tail))));
                }
            }
        }
    }
}
