//! In-process transport: a server-side [`Connection`] wired to a
//! [`MemoryClient`] through channels.
//!
//! Every operation the server performs on a send half is recorded as a
//! [`SendOp`] so callers can check what actually reached the "wire".

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Request, StatusCode};
use tokio::select;
use tokio::sync::{mpsc, watch};
use tracing::trace;

use crate::protocol::{ErrorCode, TransportError};
use crate::stream::ResponseHead;
use crate::transport::{
    Connection, IncomingStream, PeerAbortNotifier, RecvStream, SendStream, StreamId, peer_abort_channel,
};

/// Default number of frames buffered per stream direction before writers wait.
pub const DEFAULT_CAPACITY: usize = 16;

/// Creates a connected server/client pair.
pub fn connection() -> (MemoryConnection, MemoryClient) {
    connection_with_capacity(DEFAULT_CAPACITY)
}

/// Like [`connection`], with `capacity` frames of buffering per stream.
pub fn connection_with_capacity(capacity: usize) -> (MemoryConnection, MemoryClient) {
    let capacity = capacity.max(1);
    let (sender, incoming) = mpsc::channel(capacity);
    (MemoryConnection { incoming }, MemoryClient { sender, next_id: 0, capacity })
}

/// One operation performed on a server send half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOp {
    Headers(StatusCode),
    Body(usize),
    Trailers(usize),
    Close,
    Abort(ErrorCode),
}

impl SendOp {
    /// `Close` or `Abort`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SendOp::Close | SendOp::Abort(_))
    }
}

#[derive(Debug)]
enum ResponseFrame {
    Headers(ResponseHead),
    Data(Bytes),
    Trailers(HeaderMap),
    Fin,
    Reset(ErrorCode),
}

#[derive(Debug)]
enum RequestFrame {
    Data(Bytes),
    Fin,
    Reset(ErrorCode),
}

#[derive(Debug, Default)]
struct Shared {
    ops: Vec<SendOp>,
    reset: Option<ErrorCode>,
    stop_sending: Option<ErrorCode>,
}

type SharedState = Arc<Mutex<Shared>>;

fn lock(shared: &SharedState) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Server end of an in-memory connection.
#[derive(Debug)]
pub struct MemoryConnection {
    incoming: mpsc::Receiver<IncomingStream<MemorySendStream, MemoryRecvStream>>,
}

#[async_trait]
impl Connection for MemoryConnection {
    type SendStream = MemorySendStream;
    type RecvStream = MemoryRecvStream;

    async fn accept_stream(&mut self) -> Result<Option<IncomingStream<Self::SendStream, Self::RecvStream>>, TransportError> {
        Ok(self.incoming.recv().await)
    }
}

/// Client end of an in-memory connection. Dropping it ends the server's
/// accept loop.
#[derive(Debug)]
pub struct MemoryClient {
    sender: mpsc::Sender<IncomingStream<MemorySendStream, MemoryRecvStream>>,
    next_id: u64,
    capacity: usize,
}

impl MemoryClient {
    /// Opens a request stream whose body stays open until
    /// [`ClientStream::finish`].
    pub async fn open_stream(&mut self, request: Request<()>) -> Result<ClientStream, TransportError> {
        // client-initiated bidirectional streams: 0, 4, 8, ...
        let id = StreamId::new(self.next_id);
        self.next_id += 4;

        let shared = SharedState::default();
        let (response_tx, response_rx) = mpsc::channel(self.capacity);
        let (request_tx, request_rx) = mpsc::channel(self.capacity);
        let (notifier, peer_abort) = peer_abort_channel();
        let (stopped_tx, stopped) = watch::channel(None);

        let incoming = IncomingStream {
            id,
            request,
            send: MemorySendStream { id, frames: response_tx, stopped, shared: Arc::clone(&shared) },
            recv: MemoryRecvStream { frames: request_rx, shared: Arc::clone(&shared) },
            peer_abort,
        };
        self.sender.send(incoming).await.map_err(|_| TransportError::ConnectionClosed)?;

        Ok(ClientStream {
            id,
            frames: response_rx,
            body: Some(request_tx),
            notifier: Some(notifier),
            stopped: stopped_tx,
            shared,
            trailers: None,
        })
    }

    /// Opens a request stream with an empty, already finished body.
    pub async fn send_request(&mut self, request: Request<()>) -> Result<ClientStream, TransportError> {
        let mut stream = self.open_stream(request).await?;
        stream.finish().await?;
        Ok(stream)
    }
}

/// Server send half.
#[derive(Debug)]
pub struct MemorySendStream {
    id: StreamId,
    frames: mpsc::Sender<ResponseFrame>,
    // set once by the client's cancel
    stopped: watch::Receiver<Option<ErrorCode>>,
    shared: SharedState,
}

impl MemorySendStream {
    /// Waits for the frame to fit in the channel. A cancel from the client
    /// fails the write even while it waits.
    async fn push(&mut self, op: SendOp, frame: ResponseFrame) -> Result<(), TransportError> {
        if let Some(code) = *self.stopped.borrow() {
            return Err(TransportError::stop_sending(code));
        }
        trace!(stream_id = %self.id, ?op, "memory send");

        select! {
            biased;
            code = stopped(&mut self.stopped) => Err(TransportError::stop_sending(code)),
            sent = self.frames.send(frame) => {
                sent.map_err(|_| TransportError::ConnectionClosed)?;
                lock(&self.shared).ops.push(op);
                Ok(())
            }
        }
    }
}

/// Resolves with the client's cancel code; never resolves if the client went
/// away without cancelling.
async fn stopped(stopped: &mut watch::Receiver<Option<ErrorCode>>) -> ErrorCode {
    let code = stopped.wait_for(Option::is_some).await.ok().and_then(|code| *code);
    match code {
        Some(code) => code,
        None => std::future::pending().await,
    }
}

#[async_trait]
impl SendStream for MemorySendStream {
    fn id(&self) -> StreamId {
        self.id
    }

    async fn write_headers(&mut self, head: ResponseHead) -> Result<(), TransportError> {
        self.push(SendOp::Headers(head.status()), ResponseFrame::Headers(head)).await
    }

    async fn write_body(&mut self, data: Bytes) -> Result<(), TransportError> {
        self.push(SendOp::Body(data.len()), ResponseFrame::Data(data)).await
    }

    async fn write_trailers(&mut self, trailers: HeaderMap) -> Result<(), TransportError> {
        self.push(SendOp::Trailers(trailers.len()), ResponseFrame::Trailers(trailers)).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.push(SendOp::Close, ResponseFrame::Fin).await
    }

    fn abort(&mut self, code: ErrorCode) {
        {
            let mut shared = lock(&self.shared);
            shared.ops.push(SendOp::Abort(code));
            shared.reset = Some(code);
        }
        // the slot above covers a full channel; the client checks it once
        // the channel closes
        let _ = self.frames.try_send(ResponseFrame::Reset(code));
    }
}

/// Server receive half.
#[derive(Debug)]
pub struct MemoryRecvStream {
    frames: mpsc::Receiver<RequestFrame>,
    shared: SharedState,
}

#[async_trait]
impl RecvStream for MemoryRecvStream {
    async fn recv_data(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.frames.recv().await {
            Some(RequestFrame::Data(data)) => Ok(Some(data)),
            Some(RequestFrame::Fin) => Ok(None),
            Some(RequestFrame::Reset(code)) => Err(TransportError::stream_reset(code)),
            None => Err(TransportError::ConnectionClosed),
        }
    }

    fn stop_sending(&mut self, code: ErrorCode) {
        lock(&self.shared).stop_sending = Some(code);
        self.frames.close();
    }
}

/// Client view of one request stream.
#[derive(Debug)]
pub struct ClientStream {
    id: StreamId,
    frames: mpsc::Receiver<ResponseFrame>,
    body: Option<mpsc::Sender<RequestFrame>>,
    notifier: Option<PeerAbortNotifier>,
    stopped: watch::Sender<Option<ErrorCode>>,
    shared: SharedState,
    trailers: Option<HeaderMap>,
}

impl ClientStream {
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Writes a request body chunk.
    pub async fn send_data<B: Into<Bytes>>(&mut self, data: B) -> Result<(), TransportError> {
        let body = self.body.as_ref().ok_or(TransportError::ConnectionClosed)?;
        body.send(RequestFrame::Data(data.into())).await.map_err(|_| TransportError::ConnectionClosed)
    }

    /// Ends the request body.
    pub async fn finish(&mut self) -> Result<(), TransportError> {
        let body = self.body.take().ok_or(TransportError::ConnectionClosed)?;
        body.send(RequestFrame::Fin).await.map_err(|_| TransportError::ConnectionClosed)
    }

    /// Aborts the stream from the client side: resets the request body and
    /// stops the server from sending further data.
    pub fn cancel<C: Into<ErrorCode>>(&mut self, code: C) {
        let code = code.into();
        self.stopped.send_replace(Some(code));
        if let Some(body) = self.body.take() {
            let _ = body.try_send(RequestFrame::Reset(code));
        }
        if let Some(notifier) = self.notifier.take() {
            notifier.notify(code);
        }
    }

    async fn next_frame(&mut self) -> Result<ResponseFrame, TransportError> {
        match self.frames.recv().await {
            Some(ResponseFrame::Reset(code)) => Err(TransportError::stream_reset(code)),
            Some(frame) => Ok(frame),
            None => match lock(&self.shared).reset {
                Some(code) => Err(TransportError::stream_reset(code)),
                None => Err(TransportError::ConnectionClosed),
            },
        }
    }

    /// Waits for the response head.
    pub async fn response(&mut self) -> Result<ResponseHead, TransportError> {
        match self.next_frame().await? {
            ResponseFrame::Headers(head) => Ok(head),
            other => Err(unexpected(&other)),
        }
    }

    /// Next body chunk, `None` at the end of the response. Trailers are
    /// collected on the way and available through [`trailers`](Self::trailers).
    pub async fn data(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            match self.next_frame().await? {
                ResponseFrame::Data(data) => return Ok(Some(data)),
                ResponseFrame::Trailers(trailers) => self.trailers = Some(trailers),
                ResponseFrame::Fin => return Ok(None),
                other => return Err(unexpected(&other)),
            }
        }
    }

    /// Reads the remaining body.
    pub async fn body(&mut self) -> Result<Bytes, TransportError> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.data().await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }

    /// Trailers received after the body, if any.
    pub fn trailers(&self) -> Option<&HeaderMap> {
        self.trailers.as_ref()
    }

    /// Everything the server did to its send half so far.
    pub fn send_ops(&self) -> Vec<SendOp> {
        lock(&self.shared).ops.clone()
    }

    /// The code of the server's `STOP_SENDING`, if it sent one.
    pub fn stop_sending_code(&self) -> Option<ErrorCode> {
        lock(&self.shared).stop_sending
    }
}

fn unexpected(frame: &ResponseFrame) -> TransportError {
    TransportError::io(std::io::Error::new(std::io::ErrorKind::InvalidData, format!("unexpected frame {frame:?}")))
}
