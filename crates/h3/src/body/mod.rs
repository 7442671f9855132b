//! Request body streaming.
//!
//! [`ReqBody`] implements `http_body::Body` on top of the stream's receive
//! half. It is driven by a sender that runs next to the application handler
//! inside the dispatcher, reading from the transport only when the body is
//! polled.

mod req_body;

pub(crate) use req_body::body_channel;
pub use req_body::ReqBody;
