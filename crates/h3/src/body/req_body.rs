use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Sink, SinkExt, StreamExt, channel::mpsc};
use http_body::{Body, Frame, SizeHint};
use tracing::{debug, error};

use crate::protocol::TransportError;
use crate::transport::RecvStream;

/// Pairs the transport receive half with the [`ReqBody`] handed to the
/// application.
///
/// The body pulls: each poll that finds no buffered chunk signals the sender,
/// which then reads exactly one chunk from the transport. Nothing is read
/// from the peer unless the application asks for it.
pub(crate) fn body_channel<R: RecvStream>(recv: R, content_length: Option<u64>) -> (BodySender<R>, ReqBody) {
    let (signal_sender, signal_receiver) = mpsc::channel(1);
    let (data_sender, data_receiver) = mpsc::channel(1);

    (BodySender::new(recv, signal_receiver, data_sender), ReqBody::new(signal_sender, data_receiver, content_length))
}

#[derive(Debug)]
pub(crate) struct BodyRequestSignal;

pub(crate) struct BodySender<R> {
    recv: R,
    signal_receiver: mpsc::Receiver<BodyRequestSignal>,
    data_sender: mpsc::Sender<Result<Option<Bytes>, TransportError>>,
    eof: bool,
}

impl<R: RecvStream> BodySender<R> {
    fn new(
        recv: R,
        signal_receiver: mpsc::Receiver<BodyRequestSignal>,
        data_sender: mpsc::Sender<Result<Option<Bytes>, TransportError>>,
    ) -> Self {
        Self { recv, signal_receiver, data_sender, eof: false }
    }

    /// Serves body requests until the body ends or the [`ReqBody`] is dropped.
    ///
    /// A transport error is forwarded to the body and also returned, so the
    /// caller can record a peer abort.
    pub(crate) async fn start(&mut self) -> Result<(), TransportError> {
        while !self.eof {
            if self.signal_receiver.next().await.is_none() {
                debug!("request body dropped before end of stream");
                return Ok(());
            }

            match self.recv.recv_data().await {
                Ok(chunk) => {
                    self.eof = chunk.is_none();
                    if let Err(e) = self.data_sender.send(Ok(chunk)).await {
                        debug!("request body receiver gone, {}", e);
                        return Ok(());
                    }
                }
                Err(e) => {
                    error!("failed to read request body from stream, {}", e);
                    let code = e.peer_abort_code();
                    let _ = self.data_sender.send(Err(e)).await;
                    return Err(match code {
                        Some(code) => TransportError::stream_reset(code),
                        None => TransportError::ConnectionClosed,
                    });
                }
            }
        }
        Ok(())
    }

    /// Whether the peer's body was read to its end.
    pub(crate) fn is_eof(&self) -> bool {
        self.eof
    }

    pub(crate) fn recv_mut(&mut self) -> &mut R {
        &mut self.recv
    }
}

/// Request body streamed from the QUIC receive half.
#[derive(Debug)]
pub struct ReqBody {
    signal_sender: mpsc::Sender<BodyRequestSignal>,
    data_receiver: mpsc::Receiver<Result<Option<Bytes>, TransportError>>,
    content_length: Option<u64>,
    in_flight: bool,
    eof: bool,
}

impl ReqBody {
    fn new(
        signal_sender: mpsc::Sender<BodyRequestSignal>,
        data_receiver: mpsc::Receiver<Result<Option<Bytes>, TransportError>>,
        content_length: Option<u64>,
    ) -> Self {
        Self { signal_sender, data_receiver, content_length, in_flight: false, eof: content_length == Some(0) }
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = TransportError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.eof {
            return Poll::Ready(None);
        }

        if !this.in_flight {
            match Pin::new(&mut this.signal_sender).poll_ready(cx) {
                Poll::Ready(Ok(())) => {
                    if Pin::new(&mut this.signal_sender).start_send(BodyRequestSignal).is_err() {
                        this.eof = true;
                        return Poll::Ready(Some(Err(TransportError::ConnectionClosed)));
                    }
                    this.in_flight = true;
                }
                Poll::Ready(Err(_)) => {
                    this.eof = true;
                    return Poll::Ready(Some(Err(TransportError::ConnectionClosed)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        match this.data_receiver.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(Some(bytes)))) => {
                this.in_flight = false;
                Poll::Ready(Some(Ok(Frame::data(bytes))))
            }
            Poll::Ready(Some(Ok(None))) => {
                this.in_flight = false;
                this.eof = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                this.in_flight = false;
                this.eof = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.eof = true;
                Poll::Ready(Some(Err(TransportError::ConnectionClosed)))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.eof
    }

    fn size_hint(&self) -> SizeHint {
        match self.content_length {
            Some(length) => SizeHint::with_exact(length),
            None => SizeHint::new(),
        }
    }
}
