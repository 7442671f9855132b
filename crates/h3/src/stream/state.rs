use std::fmt;

/// Lifecycle state of a request stream, seen from the response side.
///
/// ```text
/// Idle -> HeadersPending -> HeadersSent -> BodyStreaming -> TrailersSent -> Closed
///   \____________\______________\______________\_________________> Reset -> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Stream accepted, dispatcher has not started the response yet.
    Idle,
    /// Response head is being built; headers may still change.
    HeadersPending,
    /// Headers went to the transport and are frozen.
    HeadersSent,
    /// At least one body write or flush happened.
    BodyStreaming,
    /// Response finalized, with or without trailers.
    TrailersSent,
    /// An abort was accepted.
    Reset,
    /// Transport released the stream.
    Closed,
}

impl StreamState {
    /// No further data can be written in this state.
    #[inline]
    pub fn is_finished(self) -> bool {
        matches!(self, StreamState::TrailersSent | StreamState::Reset | StreamState::Closed)
    }

    /// Reset or Closed.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Reset | StreamState::Closed)
    }

    /// The response head may still be modified.
    #[inline]
    pub fn accepts_headers(self) -> bool {
        matches!(self, StreamState::Idle | StreamState::HeadersPending)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamState::Idle => "idle",
            StreamState::HeadersPending => "headers pending",
            StreamState::HeadersSent => "headers sent",
            StreamState::BodyStreaming => "body streaming",
            StreamState::TrailersSent => "trailers sent",
            StreamState::Reset => "reset",
            StreamState::Closed => "closed",
        };
        f.write_str(name)
    }
}
