use std::any::Any;
use std::error::Error;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http::header::CONTENT_LENGTH;
use http::{StatusCode, Version};
use tokio::select;
use tracing::{debug, error, info, warn};

use crate::body::body_channel;
use crate::config::ServerConfig;
use crate::handler::Handler;
use crate::observer::StreamObserver;
use crate::protocol::{AbortSignal, ErrorCode, ResetCause};
use crate::stream::{ResponseHead, ResponseStream, StreamLifecycle};
use crate::transport::{IncomingStream, RecvStream, SendStream};

/// How a stream ended. A stream never completes and carries an abort code
/// at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Response sent and the stream closed cleanly.
    Completed,
    /// The stream was reset; the signal says by whom and with which code.
    Reset(AbortSignal),
}

impl StreamOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StreamOutcome::Completed)
    }

    pub fn abort_signal(&self) -> Option<AbortSignal> {
        match self {
            StreamOutcome::Completed => None,
            StreamOutcome::Reset(signal) => Some(*signal),
        }
    }
}

/// Runs the application handler for one request stream and turns whatever
/// happens into the stream's single terminal operation.
pub struct RequestDispatcher<H> {
    handler: Arc<H>,
    config: Arc<ServerConfig>,
    observer: Arc<dyn StreamObserver>,
}

impl<H> std::fmt::Debug for RequestDispatcher<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<H: Handler> RequestDispatcher<H> {
    pub fn new(handler: Arc<H>, config: Arc<ServerConfig>, observer: Arc<dyn StreamObserver>) -> Self {
        Self { handler, config, observer }
    }

    pub async fn dispatch<S, R>(&self, incoming: IncomingStream<S, R>) -> StreamOutcome
    where
        S: SendStream + 'static,
        R: RecvStream,
    {
        let IncomingStream { id, request, send, recv, peer_abort } = incoming;

        let lifecycle = Arc::new(StreamLifecycle::new(Box::new(send)));
        lifecycle.begin();

        let (mut parts, ()) = request.into_parts();
        parts.version = Version::HTTP_3;
        self.observer.on_stream_start(id, &parts);
        info!(stream_id = %id, method = %parts.method, uri = %parts.uri, "request stream accepted");

        let content_length = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        let (mut body_sender, req_body) = body_channel(recv, content_length);
        let request = http::Request::from_parts(parts, req_body);
        let stream = ResponseStream::new(Arc::clone(&lifecycle));

        // The handler runs next to the body sender and the peer abort watcher:
        // the handler may wait on body data that only the sender produces, and
        // a peer abort must cancel the handler while it is suspended. Only the
        // failure message leaves this block.
        let failure = {
            let handler_result = {
                tokio::pin! {
                    let handler_future = AssertUnwindSafe(self.handler.call(request, stream)).catch_unwind();
                    let body_sender_future = body_sender.start();
                    let peer_abort_future = peer_abort.aborted();
                }

                let mut body_done = false;
                let mut abort_done = false;
                loop {
                    select! {
                        // biased: a finished handler wins over late events
                        biased;
                        result = &mut handler_future => {
                            break result;
                        }
                        code = &mut peer_abort_future, if !abort_done => {
                            abort_done = true;
                            lifecycle.on_peer_abort(code);
                        }
                        pumped = &mut body_sender_future, if !body_done => {
                            body_done = true;
                            if let Some(code) = pumped.err().and_then(|e| e.peer_abort_code()) {
                                lifecycle.on_peer_abort(code);
                            }
                        }
                    }
                }
            };

            match handler_result {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(Into::<Box<dyn Error + Send + Sync>>::into(e).to_string()),
                Err(panic) => Some(panic_message(&*panic)),
            }
        };
        match failure {
            None => self.complete(&lifecycle).await,
            Some(cause) => self.fail(&lifecycle, &cause).await,
        }

        let outcome = match lifecycle.abort_signal() {
            Some(signal) => StreamOutcome::Reset(signal),
            None => StreamOutcome::Completed,
        };

        if !body_sender.is_eof() {
            match outcome {
                StreamOutcome::Completed if self.config.stop_unread_body() => {
                    debug!(stream_id = %id, "response complete, stop unread request body");
                    body_sender.recv_mut().stop_sending(ErrorCode::H3_NO_ERROR);
                }
                StreamOutcome::Reset(signal) if !signal.is_peer() => {
                    body_sender.recv_mut().stop_sending(signal.code());
                }
                _ => {}
            }
        }

        lifecycle.release();
        self.observer.on_stream_finish(id, &outcome);
        match outcome {
            StreamOutcome::Completed => info!(stream_id = %id, "stream completed"),
            StreamOutcome::Reset(signal) => info!(stream_id = %id, %signal, "stream reset"),
        }
        outcome
    }

    /// Refuses a stream without running the handler.
    pub async fn reject<S, R>(&self, incoming: IncomingStream<S, R>) -> StreamOutcome
    where
        S: SendStream + 'static,
        R: RecvStream,
    {
        let IncomingStream { id, request, send, mut recv, .. } = incoming;
        let code = self.config.reject_code();
        warn!(stream_id = %id, %code, "refuse request stream");

        let lifecycle = StreamLifecycle::new(Box::new(send));
        let (parts, ()) = request.into_parts();
        self.observer.on_stream_start(id, &parts);

        let outcome = match lifecycle.reset(ResetCause::Internal(code)).await {
            Some(signal) => StreamOutcome::Reset(signal),
            None => StreamOutcome::Completed,
        };
        recv.stop_sending(code);
        lifecycle.release();
        self.observer.on_stream_finish(id, &outcome);
        outcome
    }

    async fn complete(&self, lifecycle: &StreamLifecycle) {
        let Err(e) = lifecycle.finish().await else {
            return;
        };
        if let Some(signal) = lifecycle.abort_signal() {
            debug!(stream_id = %lifecycle.id(), %signal, "stream ended before completion: {}", e);
            return;
        }
        error!(stream_id = %lifecycle.id(), "failed to complete response, cause: {}", e);
        // no-op when the clean close was already issued
        lifecycle.reset(ResetCause::Internal(ErrorCode::H3_INTERNAL_ERROR)).await;
    }

    /// Handler failure: a `500` while headers are still pending, otherwise a
    /// reset with `H3_INTERNAL_ERROR`. An earlier reset stays in force.
    async fn fail(&self, lifecycle: &StreamLifecycle, cause: &str) {
        let id = lifecycle.id();
        if let Some(signal) = lifecycle.abort_signal() {
            debug!(stream_id = %id, %signal, "handler failed after reset, cause: {}", cause);
            return;
        }
        error!(stream_id = %id, "handle request error, cause: {}", cause);

        if !lifecycle.headers_sent() {
            match lifecycle.set_head(build_error_response(StatusCode::INTERNAL_SERVER_ERROR)) {
                Ok(()) => return self.complete(lifecycle).await,
                Err(e) => debug!(stream_id = %id, "can't send error response: {}", e),
            }
        }

        lifecycle.reset(ResetCause::ApplicationFailure).await;
    }
}

fn build_error_response(status_code: StatusCode) -> ResponseHead {
    let mut response = ResponseHead::new(());
    *response.status_mut() = status_code;
    response
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}
