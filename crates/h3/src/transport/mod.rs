//! The QUIC transport contract consumed by the server core.
//!
//! The core never touches packets. It sees a connection as a source of
//! request streams, each split into a send half ([`SendStream`]), a receive
//! half ([`RecvStream`]) and a one-shot notification fired when the peer
//! aborts the stream ([`PeerAbort`]). Request headers arrive already decoded.
//!
//! [`memory`] provides an in-process implementation together with a client
//! end, used by tests, benches and demos.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Request};
use tokio::sync::oneshot;

use crate::protocol::{ErrorCode, TransportError};
use crate::stream::ResponseHead;

pub mod memory;

/// QUIC stream identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self.0)
    }
}

/// Sending half of a request stream.
///
/// `close` and `abort` are terminal; the lifecycle issues exactly one of them
/// and nothing afterwards.
#[async_trait]
pub trait SendStream: Send {
    fn id(&self) -> StreamId;

    async fn write_headers(&mut self, head: ResponseHead) -> Result<(), TransportError>;

    async fn write_body(&mut self, data: Bytes) -> Result<(), TransportError>;

    async fn write_trailers(&mut self, trailers: HeaderMap) -> Result<(), TransportError>;

    /// Finishes the stream cleanly (QUIC `FIN`).
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Abandons the stream with `RESET_STREAM` carrying `code`.
    fn abort(&mut self, code: ErrorCode);
}

/// Receiving half of a request stream, carrying the request body.
#[async_trait]
pub trait RecvStream: Send {
    /// Next body chunk, `None` once the peer finished the body.
    async fn recv_data(&mut self) -> Result<Option<Bytes>, TransportError>;

    /// Asks the peer to stop sending with `STOP_SENDING` carrying `code`.
    fn stop_sending(&mut self, code: ErrorCode);
}

/// A QUIC connection as seen by the server: a source of request streams.
#[async_trait]
pub trait Connection: Send {
    type SendStream: SendStream + 'static;
    type RecvStream: RecvStream + 'static;

    /// Waits for the next request stream; `None` once the peer is gone.
    async fn accept_stream(&mut self) -> Result<Option<IncomingStream<Self::SendStream, Self::RecvStream>>, TransportError>;
}

/// A newly accepted request stream with its decoded request head.
#[derive(Debug)]
pub struct IncomingStream<S, R> {
    pub id: StreamId,
    pub request: Request<()>,
    pub send: S,
    pub recv: R,
    pub peer_abort: PeerAbort,
}

/// Creates the transport-side notifier and the core-side listener for one
/// stream's peer abort.
pub fn peer_abort_channel() -> (PeerAbortNotifier, PeerAbort) {
    let (sender, receiver) = oneshot::channel();
    (PeerAbortNotifier { sender }, PeerAbort { receiver })
}

/// Held by the transport; fired when the peer resets the stream or sends
/// `STOP_SENDING`. Dropping it without firing means no abort will come.
#[derive(Debug)]
pub struct PeerAbortNotifier {
    sender: oneshot::Sender<ErrorCode>,
}

impl PeerAbortNotifier {
    /// Returns `false` when the stream is already gone on the server side.
    pub fn notify(self, code: ErrorCode) -> bool {
        self.sender.send(code).is_ok()
    }
}

/// Held by the core; resolves with the peer's code.
#[derive(Debug)]
pub struct PeerAbort {
    receiver: oneshot::Receiver<ErrorCode>,
}

impl PeerAbort {
    /// Resolves with the peer's code. Never resolves if the notifier was
    /// dropped without firing.
    pub async fn aborted(self) -> ErrorCode {
        match self.receiver.await {
            Ok(code) => code,
            Err(_) => std::future::pending().await,
        }
    }
}
