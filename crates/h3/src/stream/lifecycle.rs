use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Version};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ensure;
use crate::protocol::{AbortSignal, ErrorCode, ResetCause, StreamError, TransportError};
use crate::stream::{ResponseHead, StreamState, TrailerChannel, TrailerFlush};
use crate::transport::{SendStream, StreamId};

/// Owns the state machine of one request stream and is the only component
/// that issues terminal transport operations on it.
///
/// Bookkeeping lives behind a short-held blocking mutex so that a peer abort
/// can be recorded while a write is suspended on transport backpressure; the
/// send half sits behind an async mutex held across the write. Every write
/// races the cancellation token, so an accepted abort releases a suspended
/// writer and with it the send half.
///
/// Exactly one of `close` or `abort` reaches the transport, and nothing
/// reaches it afterwards.
pub struct StreamLifecycle {
    id: StreamId,
    core: Mutex<Core>,
    send: tokio::sync::Mutex<Box<dyn SendStream>>,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct Core {
    state: StreamState,
    head: Option<ResponseHead>,
    headers_sent: bool,
    trailers: TrailerChannel,
    abort: Option<AbortSignal>,
    terminal_issued: bool,
    // a write failed for a reason other than a peer abort
    broken: bool,
}

impl Core {
    fn check_writable(&self) -> Result<(), StreamError> {
        if let Some(signal) = self.abort {
            return Err(StreamError::reset(signal.code()));
        }
        ensure!(!self.state.is_finished() && !self.broken, StreamError::Closed);
        Ok(())
    }

    fn abort_error(&self) -> StreamError {
        match self.abort {
            Some(signal) => StreamError::reset(signal.code()),
            None => StreamError::Closed,
        }
    }

    fn pending_head(&mut self) -> Result<&mut ResponseHead, StreamError> {
        self.check_writable()?;
        ensure!(!self.headers_sent && self.state.accepts_headers(), StreamError::HeadersAlreadySent);
        Ok(self.head.get_or_insert_with(|| ResponseHead::new(())))
    }
}

impl std::fmt::Debug for StreamLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamLifecycle").field("id", &self.id).field("core", &self.core).finish_non_exhaustive()
    }
}

impl StreamLifecycle {
    pub fn new(send: Box<dyn SendStream>) -> Self {
        let id = send.id();
        Self {
            id,
            core: Mutex::new(Core {
                state: StreamState::Idle,
                head: None,
                headers_sent: false,
                trailers: TrailerChannel::new(),
                abort: None,
                terminal_issued: false,
                broken: false,
            }),
            send: tokio::sync::Mutex::new(send),
            cancel: CancellationToken::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn state(&self) -> StreamState {
        self.core().state
    }

    pub fn headers_sent(&self) -> bool {
        self.core().headers_sent
    }

    /// The accepted abort, if any.
    pub fn abort_signal(&self) -> Option<AbortSignal> {
        self.core().abort
    }

    /// Token cancelled the moment an abort is accepted.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// `Idle -> HeadersPending`.
    pub fn begin(&self) {
        let mut core = self.core();
        if core.state == StreamState::Idle {
            core.state = StreamState::HeadersPending;
        }
    }

    /// Runs `f` on the response head while it can still change.
    pub fn with_head<F, R>(&self, f: F) -> Result<R, StreamError>
    where
        F: FnOnce(&mut ResponseHead) -> R,
    {
        let mut core = self.core();
        let head = core.pending_head()?;
        Ok(f(head))
    }

    /// Replaces the pending response head.
    pub fn set_head(&self, head: ResponseHead) -> Result<(), StreamError> {
        self.with_head(|pending| *pending = head)
    }

    /// Delivers the response head to the transport and freezes it.
    pub async fn send_headers(&self) -> Result<(), StreamError> {
        let mut head = {
            let mut core = self.core();
            core.pending_head()?;
            core.head.take().unwrap_or_default()
        };
        *head.version_mut() = Version::HTTP_3;
        let status = head.status();

        let mut send = self.send.lock().await;
        self.core().check_writable()?;
        self.write(send.write_headers(head)).await?;
        drop(send);

        let mut core = self.core();
        core.headers_sent = true;
        if core.state.accepts_headers() {
            core.state = StreamState::HeadersSent;
        }
        debug!(stream_id = %self.id, %status, "response headers sent");
        Ok(())
    }

    async fn ensure_headers(&self) -> Result<(), StreamError> {
        let sent = {
            let core = self.core();
            core.check_writable()?;
            core.headers_sent
        };
        if sent { Ok(()) } else { self.send_headers().await }
    }

    /// Writes a body chunk, sending pending headers first.
    pub async fn send_data(&self, data: Bytes) -> Result<(), StreamError> {
        self.ensure_headers().await?;

        let mut send = self.send.lock().await;
        self.core().check_writable()?;
        self.write(send.write_body(data)).await?;
        drop(send);

        self.mark_streaming();
        Ok(())
    }

    /// Commits pending headers and enters `BodyStreaming` without a body byte.
    pub async fn flush(&self) -> Result<(), StreamError> {
        self.ensure_headers().await?;
        self.core().check_writable()?;
        self.mark_streaming();
        Ok(())
    }

    fn mark_streaming(&self) {
        let mut core = self.core();
        if core.state == StreamState::HeadersSent {
            core.state = StreamState::BodyStreaming;
        }
    }

    /// Buffers a trailer; dropped silently once the stream is finished.
    pub fn append_trailer(&self, name: HeaderName, value: HeaderValue) -> bool {
        let mut core = self.core();
        let state = core.state;
        core.trailers.append(state, name, value)
    }

    /// Completes the response normally: pending headers (default `200`),
    /// buffered trailers, then a clean close.
    ///
    /// A stream that was already reset is left alone.
    pub async fn finish(&self) -> Result<(), StreamError> {
        self.flush().await?;

        let mut send = self.send.lock().await;
        let flush = {
            let mut core = self.core();
            core.check_writable()?;
            let state = core.state;
            core.trailers.flush(state)
        };

        match flush {
            TrailerFlush::Send(trailers) => {
                let count = trailers.len();
                self.write(send.write_trailers(trailers)).await?;
                debug!(stream_id = %self.id, count, "trailers sent");
            }
            TrailerFlush::Empty => {}
            TrailerFlush::Dropped => return Err(StreamError::Closed),
        }

        {
            let mut core = self.core();
            core.check_writable()?;
            core.state = StreamState::TrailersSent;
            core.terminal_issued = true;
        }

        send.close().await.map_err(|e| self.on_transport_error(e))?;
        drop(send);

        self.core().state = StreamState::Closed;
        debug!(stream_id = %self.id, "stream closed");
        Ok(())
    }

    /// Accepts `cause` unless another abort or a clean completion came
    /// first, then issues the transport abort it maps to.
    ///
    /// Returns the signal in effect for the stream: the newly accepted one or
    /// the earlier winner. `None` means the stream had already completed.
    pub async fn reset(&self, cause: ResetCause) -> Option<AbortSignal> {
        let (signal, outgoing) = match self.accept(cause) {
            Accepted::New(signal, outgoing) => (signal, outgoing),
            Accepted::Existing(signal) => return Some(signal),
            Accepted::Completed => return None,
        };

        if let Some(code) = outgoing {
            let mut send = self.send.lock().await;
            send.abort(code);
            info!(stream_id = %self.id, %code, "stream aborted");
        }
        Some(signal)
    }

    /// Records a peer abort reported by the transport. Nothing is sent back.
    pub fn on_peer_abort(&self, code: ErrorCode) -> Option<AbortSignal> {
        match self.accept(ResetCause::Peer(code)) {
            Accepted::New(signal, _) | Accepted::Existing(signal) => Some(signal),
            Accepted::Completed => None,
        }
    }

    /// `Reset -> Closed` once the transport no longer references the stream.
    pub fn release(&self) {
        let mut core = self.core();
        if core.state == StreamState::Reset {
            core.state = StreamState::Closed;
        }
    }

    fn accept(&self, cause: ResetCause) -> Accepted {
        let mut core = self.core();
        if let Some(existing) = core.abort {
            debug!(stream_id = %self.id, ?cause, winner = %existing, "ignore reset, stream already aborted");
            return Accepted::Existing(existing);
        }
        if core.terminal_issued || core.state == StreamState::Closed {
            debug!(stream_id = %self.id, ?cause, "ignore reset, stream already completed");
            return Accepted::Completed;
        }

        let signal = cause.into_signal();
        core.abort = Some(signal);
        core.state = StreamState::Reset;

        let outgoing = cause.outgoing_code();
        if outgoing.is_some() {
            core.terminal_issued = true;
        }
        core.trailers.flush(StreamState::Reset);
        let dropped = core.trailers.dropped();
        drop(core);

        // recorded first, then observable through the token
        self.cancel.cancel();
        if signal.is_peer() {
            warn!(stream_id = %self.id, code = %signal.code(), "stream aborted by peer");
        }
        debug!(stream_id = %self.id, %signal, dropped_trailers = dropped, "reset accepted");
        Accepted::New(signal, outgoing)
    }

    /// Runs one transport write, giving up as soon as an abort is accepted.
    async fn write<F>(&self, write: F) -> Result<(), StreamError>
    where
        F: Future<Output = Result<(), TransportError>>,
    {
        select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!(stream_id = %self.id, "write interrupted by abort");
                Err(self.core().abort_error())
            }
            result = write => result.map_err(|e| self.on_transport_error(e)),
        }
    }

    fn on_transport_error(&self, e: TransportError) -> StreamError {
        match e.peer_abort_code() {
            Some(code) => match self.on_peer_abort(code) {
                Some(signal) => StreamError::reset(signal.code()),
                None => StreamError::Closed,
            },
            None => {
                // the head or body may be half written; nothing else goes out
                // except the abort
                self.core().broken = true;
                e.into()
            }
        }
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        // a poisoned lock only means another task panicked mid-update; the
        // state itself is always left consistent
        self.core.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

enum Accepted {
    New(AbortSignal, Option<ErrorCode>),
    Existing(AbortSignal),
    Completed,
}
