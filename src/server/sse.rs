//! Server-Sent Events response carrying UI chunks.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{self, HeaderName};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::DropGuard;

use crate::protocol::{done_frame, encode_sse, UiChunk, STREAM_PROTOCOL_HEADER, STREAM_PROTOCOL_VERSION};

/// Streams encoded frames and ends with the done marker.
///
/// Holds the turn's drop guard, so a client that goes away cancels the turn.
pub struct SseResponse {
    rx: ReceiverStream<UiChunk>,
    done: bool,
    _guard: Option<DropGuard>,
}

impl SseResponse {
    pub fn new(rx: ReceiverStream<UiChunk>, guard: Option<DropGuard>) -> Self {
        Self {
            rx,
            done: false,
            _guard: guard,
        }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.done {
                return Poll::Ready(None);
            }
            match Pin::new(&mut self.rx).poll_next(cx) {
                Poll::Ready(Some(chunk)) => match encode_sse(&chunk) {
                    Ok(bytes) => return Poll::Ready(Some(Ok(bytes))),
                    Err(err) => tracing::warn!(error = %err, "dropping unencodable frame"),
                },
                Poll::Ready(None) => {
                    self.done = true;
                    return Poll::Ready(Some(Ok(done_frame())));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        let headers = [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
            (
                HeaderName::from_static(STREAM_PROTOCOL_HEADER),
                STREAM_PROTOCOL_VERSION,
            ),
        ];
        (headers, Body::from_stream(self)).into_response()
    }
}
