use bytes::Bytes;
use http::{HeaderName, HeaderValue, Request, StatusCode};

use crate::protocol::{AbortOrigin, ErrorCode, ResetCause, StreamError};
use crate::stream::{ResponseHead, StreamLifecycle, StreamState};
use crate::transport::memory::{self, ClientStream, MemoryClient, MemoryConnection, SendOp};
use crate::transport::Connection;

struct Fixture {
    lifecycle: StreamLifecycle,
    client: ClientStream,
    // keeps the connection open
    _conn: (MemoryConnection, MemoryClient),
}

async fn fixture() -> Fixture {
    fixture_with_capacity(memory::DEFAULT_CAPACITY).await
}

async fn fixture_with_capacity(capacity: usize) -> Fixture {
    let (mut server, mut client) = memory::connection_with_capacity(capacity);
    let stream = client.send_request(Request::new(())).await.unwrap();
    let incoming = server.accept_stream().await.unwrap().unwrap();

    let lifecycle = StreamLifecycle::new(Box::new(incoming.send));
    lifecycle.begin();
    Fixture { lifecycle, client: stream, _conn: (server, client) }
}

fn custom_trailer() -> (HeaderName, HeaderValue) {
    (HeaderName::from_static("custom"), HeaderValue::from_static("value"))
}

fn terminal_ops(ops: &[SendOp]) -> usize {
    ops.iter().filter(|op| op.is_terminal()).count()
}

#[tokio::test]
async fn begin_moves_to_headers_pending() {
    let Fixture { lifecycle, .. } = fixture().await;
    assert_eq!(lifecycle.state(), StreamState::HeadersPending);
    assert!(!lifecycle.headers_sent());
}

#[tokio::test]
async fn headers_are_sent_once() {
    let Fixture { lifecycle, client, .. } = fixture().await;

    lifecycle.with_head(|head| *head.status_mut() = StatusCode::ACCEPTED).unwrap();
    lifecycle.send_headers().await.unwrap();
    assert_eq!(lifecycle.state(), StreamState::HeadersSent);

    assert!(matches!(lifecycle.send_headers().await, Err(StreamError::HeadersAlreadySent)));
    assert!(matches!(lifecycle.set_head(ResponseHead::new(())), Err(StreamError::HeadersAlreadySent)));
    assert_eq!(client.send_ops(), vec![SendOp::Headers(StatusCode::ACCEPTED)]);
}

#[tokio::test]
async fn data_sends_default_headers_first() {
    let Fixture { lifecycle, mut client, .. } = fixture().await;

    lifecycle.send_data(Bytes::from_static(b"hello")).await.unwrap();
    assert_eq!(lifecycle.state(), StreamState::BodyStreaming);

    let head = client.response().await.unwrap();
    assert_eq!(head.status(), StatusCode::OK);
    assert_eq!(head.version(), http::Version::HTTP_3);
    assert_eq!(client.data().await.unwrap(), Some(Bytes::from_static(b"hello")));
}

#[tokio::test]
async fn finish_sends_trailers_then_closes() {
    let Fixture { lifecycle, mut client, .. } = fixture().await;

    lifecycle.send_data(Bytes::from_static(b"body")).await.unwrap();
    let (name, value) = custom_trailer();
    assert!(lifecycle.append_trailer(name, value));
    lifecycle.finish().await.unwrap();
    assert_eq!(lifecycle.state(), StreamState::Closed);

    client.response().await.unwrap();
    assert_eq!(client.body().await.unwrap(), Bytes::from_static(b"body"));
    assert_eq!(client.trailers().unwrap()["custom"], "value");
    assert_eq!(
        client.send_ops(),
        vec![SendOp::Headers(StatusCode::OK), SendOp::Body(4), SendOp::Trailers(1), SendOp::Close]
    );
}

#[tokio::test]
async fn finish_without_trailers_writes_no_trailer_frame() {
    let Fixture { lifecycle, client, .. } = fixture().await;

    lifecycle.finish().await.unwrap();
    assert_eq!(client.send_ops(), vec![SendOp::Headers(StatusCode::OK), SendOp::Close]);
}

#[tokio::test]
async fn reset_before_headers_sends_only_the_abort() {
    let Fixture { lifecycle, mut client, .. } = fixture().await;
    let token = lifecycle.cancellation_token();

    let signal = lifecycle.reset(ResetCause::Explicit(ErrorCode::H3_REQUEST_REJECTED)).await.unwrap();
    assert_eq!(signal.origin(), AbortOrigin::Application);
    assert_eq!(signal.code(), ErrorCode::H3_REQUEST_REJECTED);
    assert_eq!(lifecycle.state(), StreamState::Reset);
    assert!(token.is_cancelled());

    let err = lifecycle.send_data(Bytes::from_static(b"late")).await.unwrap_err();
    assert!(matches!(err, StreamError::Reset { code } if code == ErrorCode::H3_REQUEST_REJECTED));
    assert!(matches!(lifecycle.finish().await, Err(StreamError::Reset { .. })));

    let err = client.response().await.unwrap_err();
    assert_eq!(err.peer_abort_code(), Some(ErrorCode::H3_REQUEST_REJECTED));
    assert_eq!(client.send_ops(), vec![SendOp::Abort(ErrorCode::H3_REQUEST_REJECTED)]);
}

#[tokio::test]
async fn first_reset_wins() {
    let Fixture { lifecycle, client, .. } = fixture().await;

    lifecycle.reset(ResetCause::Explicit(ErrorCode::H3_REQUEST_CANCELLED)).await;
    let signal = lifecycle.reset(ResetCause::ApplicationFailure).await.unwrap();
    assert_eq!(signal.code(), ErrorCode::H3_REQUEST_CANCELLED);

    let signal = lifecycle.on_peer_abort(ErrorCode::H3_NO_ERROR).unwrap();
    assert_eq!(signal.origin(), AbortOrigin::Application);

    assert_eq!(lifecycle.abort_signal().unwrap().code(), ErrorCode::H3_REQUEST_CANCELLED);
    assert_eq!(client.send_ops(), vec![SendOp::Abort(ErrorCode::H3_REQUEST_CANCELLED)]);
}

#[tokio::test]
async fn reset_after_close_is_ignored() {
    let Fixture { lifecycle, client, .. } = fixture().await;

    lifecycle.finish().await.unwrap();
    assert!(lifecycle.reset(ResetCause::Explicit(ErrorCode::H3_REQUEST_CANCELLED)).await.is_none());
    assert!(lifecycle.on_peer_abort(ErrorCode::H3_REQUEST_CANCELLED).is_none());
    assert!(!lifecycle.cancellation_token().is_cancelled());

    assert_eq!(lifecycle.state(), StreamState::Closed);
    assert_eq!(terminal_ops(&client.send_ops()), 1);
}

#[tokio::test]
async fn peer_abort_sends_nothing_back() {
    let Fixture { lifecycle, client, .. } = fixture().await;
    lifecycle.send_headers().await.unwrap();

    let signal = lifecycle.on_peer_abort(ErrorCode::H3_REQUEST_CANCELLED).unwrap();
    assert!(signal.is_peer());
    assert!(lifecycle.cancellation_token().is_cancelled());

    // a later application reset neither replaces the code nor aborts
    let signal = lifecycle.reset(ResetCause::ApplicationFailure).await.unwrap();
    assert!(signal.is_peer());
    assert_eq!(signal.code(), ErrorCode::H3_REQUEST_CANCELLED);
    assert_eq!(client.send_ops(), vec![SendOp::Headers(StatusCode::OK)]);
}

#[tokio::test]
async fn write_failure_from_peer_stop_records_peer_abort() {
    let Fixture { lifecycle, mut client, .. } = fixture().await;
    lifecycle.send_headers().await.unwrap();

    client.cancel(ErrorCode::H3_REQUEST_CANCELLED);

    let err = lifecycle.send_data(Bytes::from_static(b"data")).await.unwrap_err();
    assert!(matches!(err, StreamError::Reset { code } if code == ErrorCode::H3_REQUEST_CANCELLED));
    assert!(lifecycle.abort_signal().unwrap().is_peer());
    assert_eq!(terminal_ops(&client.send_ops()), 0);
}

#[tokio::test]
async fn trailers_after_reset_are_dropped() {
    let Fixture { lifecycle, mut client, .. } = fixture().await;
    lifecycle.send_headers().await.unwrap();
    let (name, value) = custom_trailer();
    assert!(lifecycle.append_trailer(name, value));

    lifecycle.reset(ResetCause::Explicit(ErrorCode::H3_REQUEST_CANCELLED)).await;
    let (name, value) = custom_trailer();
    assert!(!lifecycle.append_trailer(name, value));

    client.response().await.unwrap();
    assert!(client.data().await.is_err());
    assert!(client.trailers().is_none());
    assert!(!client.send_ops().iter().any(|op| matches!(op, SendOp::Trailers(_))));
}

#[tokio::test]
async fn release_closes_a_reset_stream() {
    let Fixture { lifecycle, .. } = fixture().await;

    lifecycle.release();
    assert_eq!(lifecycle.state(), StreamState::HeadersPending);

    lifecycle.reset(ResetCause::Internal(ErrorCode::H3_REQUEST_REJECTED)).await;
    lifecycle.release();
    assert_eq!(lifecycle.state(), StreamState::Closed);
    assert!(matches!(lifecycle.send_data(Bytes::new()).await, Err(StreamError::Reset { .. })));
}

#[tokio::test]
async fn reset_releases_a_write_waiting_for_capacity() {
    // one frame of buffering: the headers fill it
    let Fixture { lifecycle, client, .. } = fixture_with_capacity(1).await;
    lifecycle.send_headers().await.unwrap();

    let (written, signal) = tokio::join!(lifecycle.send_data(Bytes::from_static(b"stuck")), async {
        tokio::task::yield_now().await;
        lifecycle.reset(ResetCause::Explicit(ErrorCode::H3_REQUEST_CANCELLED)).await
    });

    assert!(matches!(written, Err(StreamError::Reset { code }) if code == ErrorCode::H3_REQUEST_CANCELLED));
    assert_eq!(signal.unwrap().code(), ErrorCode::H3_REQUEST_CANCELLED);
    assert_eq!(
        client.send_ops(),
        vec![SendOp::Headers(StatusCode::OK), SendOp::Abort(ErrorCode::H3_REQUEST_CANCELLED)]
    );
}
