//! Reset causes and the error code mapping applied to them.

use std::fmt;

use crate::protocol::ErrorCode;

/// Where an accepted abort came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortOrigin {
    /// The application reset the stream, explicitly or by failing.
    Application,
    /// The peer reset the stream or asked us to stop sending.
    Peer,
    /// The server itself refused the stream, for example over a stream limit.
    Internal,
}

/// The abort accepted for a stream: at most one per stream, first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortSignal {
    origin: AbortOrigin,
    code: ErrorCode,
}

impl AbortSignal {
    pub fn new(origin: AbortOrigin, code: ErrorCode) -> Self {
        Self { origin, code }
    }

    #[inline]
    pub fn origin(&self) -> AbortOrigin {
        self.origin
    }

    /// The recorded code. For peer aborts this is the peer's code, kept for
    /// diagnostics; it is never sent back.
    #[inline]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    #[inline]
    pub fn is_peer(&self) -> bool {
        self.origin == AbortOrigin::Peer
    }
}

impl fmt::Display for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match self.origin {
            AbortOrigin::Application => "application",
            AbortOrigin::Peer => "peer",
            AbortOrigin::Internal => "internal",
        };
        write!(f, "{origin} abort with {}", self.code)
    }
}

/// An event that asks for a stream to be reset.
///
/// The variant is resolved into an [`AbortSignal`] once, when the lifecycle
/// accepts it. Later causes for the same stream are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    /// `reset(code)` called by the application; the code is authoritative.
    Explicit(ErrorCode),
    /// The application returned an error or panicked after headers went out.
    ApplicationFailure,
    /// The transport reported that the peer aborted the stream.
    Peer(ErrorCode),
    /// The server refused the stream on its own behalf.
    Internal(ErrorCode),
}

impl ResetCause {
    pub fn origin(&self) -> AbortOrigin {
        match self {
            ResetCause::Explicit(_) | ResetCause::ApplicationFailure => AbortOrigin::Application,
            ResetCause::Peer(_) => AbortOrigin::Peer,
            ResetCause::Internal(_) => AbortOrigin::Internal,
        }
    }

    /// The code to put in our own `RESET_STREAM`, if one has to be sent.
    ///
    /// A peer abort yields `None`: the stream is already torn down on the
    /// peer's side and nothing is signalled back.
    pub fn outgoing_code(&self) -> Option<ErrorCode> {
        match *self {
            ResetCause::Explicit(code) | ResetCause::Internal(code) => Some(code),
            ResetCause::ApplicationFailure => Some(ErrorCode::H3_INTERNAL_ERROR),
            ResetCause::Peer(_) => None,
        }
    }

    /// Resolves the cause into the signal recorded on the stream.
    pub fn into_signal(self) -> AbortSignal {
        let code = match self {
            ResetCause::Peer(code) => code,
            other => other.outgoing_code().unwrap_or(ErrorCode::H3_INTERNAL_ERROR),
        };
        AbortSignal::new(self.origin(), code)
    }
}
