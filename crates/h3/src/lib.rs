//! The request stream lifecycle core of an asynchronous micro HTTP/3 server
//!
//! This crate sits between a QUIC transport and application request handlers.
//! For every request stream it owns the response state machine and guarantees
//! that a stream ends with exactly one terminal transport operation: a clean
//! close or an abort carrying an HTTP/3 error code. Resets may come from the
//! application, from the peer or from the server itself; the first one
//! accepted wins and later ones are ignored.
//!
//! # Features
//!
//! - Explicit per-stream state machine with first-wins reset arbitration
//! - HTTP/3 application error codes (RFC 9114) on every abort
//! - Streaming request bodies through `http_body::Body`
//! - Response trailers, silently dropped once a stream is finished
//! - Cancellation token fired when a stream is reset
//! - Handler failures and panics contained to their own stream
//! - `Alt-Svc` advertisement for HTTP/1.1 and HTTP/2 responses
//! - Pluggable transport, with an in-memory implementation
//!
//! # Example
//!
//! ```no_run
//! use http::{HeaderName, HeaderValue, Request, StatusCode};
//! use http_body_util::BodyExt;
//! use std::error::Error;
//! use std::sync::Arc;
//! use tracing::{error, info};
//! use micro_h3::body::ReqBody;
//! use micro_h3::connection::H3Connection;
//! use micro_h3::handler::make_handler;
//! use micro_h3::stream::ResponseStream;
//! use micro_h3::transport::memory;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (server, mut client) = memory::connection();
//!
//!     let handler = Arc::new(make_handler(echo));
//!     tokio::spawn(async move {
//!         match H3Connection::new(server).process(handler).await {
//!             Ok(()) => info!("finished process, connection shutdown"),
//!             Err(e) => error!("service has error, cause {}, connection shutdown", e),
//!         }
//!     });
//!
//!     let mut stream = client.send_request(Request::new(())).await.unwrap();
//!     let response = stream.response().await.unwrap();
//!     info!(status = %response.status(), "got response");
//! }
//!
//! async fn echo(request: Request<ReqBody>, mut stream: ResponseStream) -> Result<(), Box<dyn Error + Send + Sync>> {
//!     let body = request.into_body().collect().await?.to_bytes();
//!
//!     stream.set_status(StatusCode::OK)?;
//!     stream.send_data(body).await?;
//!     stream.append_trailer(HeaderName::from_static("x-echo"), HeaderValue::from_static("done"));
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: accepting request streams and dispatching them to handlers
//! - [`stream`]: the per-stream state machine and the application's handle
//! - [`body`]: request body streaming
//! - [`handler`]: request handler traits and utilities
//! - [`transport`]: the QUIC transport contract and an in-memory transport
//! - [`protocol`]: error codes, reset causes and error types
//! - [`alt_svc`]: `Alt-Svc` header generation
//! - [`config`] and [`observer`]: per-connection settings and diagnostics
//!
//! # Error Handling
//!
//! - [`protocol::H3Error`]: connection-level failure
//! - [`protocol::StreamError`]: failures of writes on a single stream
//! - [`protocol::TransportError`]: failures reported by the transport
//!
//! Handler errors never reach the peer verbatim. They become a `500` response
//! while headers are still pending, and an `H3_INTERNAL_ERROR` reset after.
//!
//! # Limitations
//!
//! - No QUIC, QPACK or HTTP/3 frame implementation; those belong to the
//!   transport
//! - No server push, no WebTransport, no `CONNECT`
//! - No priorities

pub mod alt_svc;
pub mod body;
pub mod config;
pub mod connection;
pub mod handler;
pub mod observer;
pub mod protocol;
pub mod stream;
pub mod transport;

mod utils;
pub(crate) use utils::ensure;
