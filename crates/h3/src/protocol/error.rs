use std::io;
use thiserror::Error;

use crate::protocol::ErrorCode;

/// Connection-level failure: fatal to every stream of the connection.
#[derive(Debug, Error)]
pub enum H3Error {
    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },
}

/// Failures reported by the QUIC transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("stream reset by peer with {code}")]
    StreamReset { code: ErrorCode },

    #[error("peer stopped reading with {code}")]
    StopSending { code: ErrorCode },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl TransportError {
    pub fn stream_reset<C: Into<ErrorCode>>(code: C) -> Self {
        Self::StreamReset { code: code.into() }
    }

    pub fn stop_sending<C: Into<ErrorCode>>(code: C) -> Self {
        Self::StopSending { code: code.into() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// The peer's code when this error means the peer aborted the stream.
    pub fn peer_abort_code(&self) -> Option<ErrorCode> {
        match self {
            Self::StreamReset { code } | Self::StopSending { code } => Some(*code),
            Self::ConnectionClosed | Self::Io { .. } => None,
        }
    }
}

/// Errors returned to the application by [`ResponseStream`](crate::stream::ResponseStream).
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("response headers already sent")]
    HeadersAlreadySent,

    #[error("stream was reset with {code}")]
    Reset { code: ErrorCode },

    #[error("stream already closed")]
    Closed,

    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },
}

impl StreamError {
    pub fn reset<C: Into<ErrorCode>>(code: C) -> Self {
        Self::Reset { code: code.into() }
    }

    /// Whether the stream can no longer carry data.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Reset { .. } | Self::Closed)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("max concurrent streams must be greater than zero")]
    ZeroStreamLimit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AltSvcError {
    #[error("invalid alt-svc value: {reason}")]
    InvalidValue { reason: String },

    #[error("invalid alt-svc port: {port}")]
    InvalidPort { port: String },
}

impl AltSvcError {
    pub fn invalid_value<S: ToString>(str: S) -> Self {
        Self::InvalidValue { reason: str.to_string() }
    }

    pub fn invalid_port<S: ToString>(str: S) -> Self {
        Self::InvalidPort { port: str.to_string() }
    }
}
