//! Per-stream response lifecycle.
//!
//! - [`StreamLifecycle`]: the state machine, sole issuer of terminal
//!   transport operations
//! - [`StreamState`]: its states
//! - [`TrailerChannel`]: trailer buffering with late-append dropping
//! - [`ResponseStream`]: the handle given to application code

mod state;
pub use state::StreamState;

mod trailers;
pub use trailers::TrailerChannel;
pub use trailers::TrailerFlush;

mod lifecycle;
pub use lifecycle::StreamLifecycle;

mod response;
pub use response::ResponseStream;

/// Response status and headers, before any body.
pub type ResponseHead = http::Response<()>;

#[cfg(test)]
mod tests;
