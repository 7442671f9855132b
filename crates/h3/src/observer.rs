//! Diagnostics capability injected into the dispatcher.
//!
//! Observers are handed to [`H3Connection`](crate::connection::H3Connection)
//! explicitly; there is no process-wide listener registry.

use http::request::Parts;

use crate::connection::StreamOutcome;
use crate::transport::StreamId;

/// Receives stream lifecycle events. Calls happen on the stream's task and
/// should return quickly.
#[cfg_attr(test, mockall::automock)]
pub trait StreamObserver: Send + Sync {
    /// The dispatcher accepted a request and is about to run the handler.
    fn on_stream_start(&self, _id: StreamId, _request: &Parts) {}

    /// The stream reached its terminal state.
    fn on_stream_finish(&self, _id: StreamId, _outcome: &StreamOutcome) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StreamObserver for NoopObserver {}
