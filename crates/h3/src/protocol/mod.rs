//! Protocol-level building blocks shared by the stream and connection layers.
//!
//! - [`ErrorCode`]: HTTP/3 application error codes (RFC 9114 §8.1)
//! - [`ResetCause`] and [`AbortSignal`]: what asked for a reset and what was
//!   accepted, including the mapping to the outgoing code
//! - Error types: [`H3Error`], [`TransportError`], [`StreamError`],
//!   [`ConfigError`], [`AltSvcError`]

mod error_code;
pub use error_code::ErrorCode;

mod abort;
pub use abort::AbortOrigin;
pub use abort::AbortSignal;
pub use abort::ResetCause;

mod error;
pub use error::AltSvcError;
pub use error::ConfigError;
pub use error::H3Error;
pub use error::StreamError;
pub use error::TransportError;
