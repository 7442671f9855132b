use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::protocol::{AbortSignal, ErrorCode, ResetCause, StreamError};
use crate::stream::{ResponseHead, StreamLifecycle, StreamState};
use crate::transport::StreamId;

/// The application's handle on one request stream.
///
/// Writes must be serialized by the caller. Once the stream is reset or
/// closed every write fails with [`StreamError::Reset`] or
/// [`StreamError::Closed`], except [`append_trailer`](Self::append_trailer)
/// which drops the pair silently.
///
/// # Example
///
/// ```no_run
/// # use micro_h3::stream::ResponseStream;
/// # use micro_h3::protocol::StreamError;
/// use http::{HeaderName, HeaderValue, StatusCode};
///
/// async fn respond(stream: &mut ResponseStream) -> Result<(), StreamError> {
///     stream.set_status(StatusCode::OK)?;
///     stream.send_data("hello").await?;
///     stream.append_trailer(HeaderName::from_static("custom"), HeaderValue::from_static("value"));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct ResponseStream {
    lifecycle: Arc<StreamLifecycle>,
}

impl ResponseStream {
    pub(crate) fn new(lifecycle: Arc<StreamLifecycle>) -> Self {
        Self { lifecycle }
    }

    pub fn id(&self) -> StreamId {
        self.lifecycle.id()
    }

    pub fn state(&self) -> StreamState {
        self.lifecycle.state()
    }

    pub fn headers_sent(&self) -> bool {
        self.lifecycle.headers_sent()
    }

    /// The abort accepted for this stream, from whichever origin won.
    pub fn abort_signal(&self) -> Option<AbortSignal> {
        self.lifecycle.abort_signal()
    }

    /// Cancelled the instant the stream is reset, by us or by the peer.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.lifecycle.cancellation_token()
    }

    pub fn set_status(&mut self, status: StatusCode) -> Result<(), StreamError> {
        self.lifecycle.with_head(|head| *head.status_mut() = status)
    }

    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), StreamError> {
        self.lifecycle.with_head(|head| {
            head.headers_mut().insert(name, value);
        })
    }

    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), StreamError> {
        self.lifecycle.with_head(|head| {
            head.headers_mut().append(name, value);
        })
    }

    /// Replaces the pending head with `response` and sends it.
    pub async fn send_response(&mut self, response: ResponseHead) -> Result<(), StreamError> {
        self.lifecycle.set_head(response)?;
        self.lifecycle.send_headers().await
    }

    /// Sends the pending head as is.
    pub async fn send_headers(&mut self) -> Result<(), StreamError> {
        self.lifecycle.send_headers().await
    }

    /// Writes a body chunk; headers go out first if they have not yet.
    pub async fn send_data<B: Into<Bytes>>(&mut self, data: B) -> Result<(), StreamError> {
        self.lifecycle.send_data(data.into()).await
    }

    /// Commits headers without writing body bytes.
    pub async fn flush(&mut self) -> Result<(), StreamError> {
        self.lifecycle.flush().await
    }

    /// Buffers a trailer sent after the body. Returns `false` if the stream
    /// was already finished and the pair was dropped.
    pub fn append_trailer(&mut self, name: HeaderName, value: HeaderValue) -> bool {
        self.lifecycle.append_trailer(name, value)
    }

    /// Resets the stream with `code`. Has no effect if the stream was already
    /// reset or completed; the first accepted code stays in force.
    pub async fn reset<C: Into<ErrorCode>>(&self, code: C) {
        self.lifecycle.reset(ResetCause::Explicit(code.into())).await;
    }
}
