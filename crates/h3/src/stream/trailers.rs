use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::stream::StreamState;

/// Buffers trailing headers until the response is finalized.
///
/// Appending never fails: once the stream can no longer carry data the pair
/// is dropped silently.
#[derive(Debug, Default)]
pub struct TrailerChannel {
    trailers: HeaderMap,
    dropped: usize,
}

/// What finalizing the trailer channel produced.
#[derive(Debug, PartialEq, Eq)]
pub enum TrailerFlush {
    /// Trailers to put in a HEADERS frame after the body.
    Send(HeaderMap),
    /// Response completes without a trailer frame.
    Empty,
    /// Stream was reset; whatever was buffered is discarded.
    Dropped,
}

impl TrailerChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers `name: value`, keeping earlier values of the same name.
    /// Returns `false` when the pair was dropped because of `state`.
    pub fn append(&mut self, state: StreamState, name: HeaderName, value: HeaderValue) -> bool {
        if state.is_finished() {
            self.dropped += 1;
            debug!(%state, trailer = %name, "drop trailer on finished stream");
            return false;
        }
        self.trailers.append(name, value);
        true
    }

    pub fn len(&self) -> usize {
        self.trailers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trailers.is_empty()
    }

    /// Number of pairs dropped because they arrived too late.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Finalizes the channel for a stream currently in `state`.
    pub fn flush(&mut self, state: StreamState) -> TrailerFlush {
        let trailers = std::mem::take(&mut self.trailers);
        if state.is_terminal() {
            self.dropped += trailers.len();
            return TrailerFlush::Dropped;
        }
        if trailers.is_empty() { TrailerFlush::Empty } else { TrailerFlush::Send(trailers) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom() -> (HeaderName, HeaderValue) {
        (HeaderName::from_static("custom"), HeaderValue::from_static("value"))
    }

    #[test]
    fn buffered_trailers_are_sent_in_order() {
        let mut channel = TrailerChannel::new();
        let (name, value) = custom();
        assert!(channel.append(StreamState::BodyStreaming, name.clone(), value));
        assert!(channel.append(StreamState::BodyStreaming, name.clone(), HeaderValue::from_static("again")));

        let TrailerFlush::Send(trailers) = channel.flush(StreamState::BodyStreaming) else {
            panic!("expected trailers to be sent");
        };
        let values: Vec<_> = trailers.get_all(&name).iter().collect();
        assert_eq!(values, vec!["value", "again"]);
        assert!(channel.is_empty());
    }

    #[test]
    fn no_trailers_is_distinct_from_dropped() {
        let mut channel = TrailerChannel::new();
        assert_eq!(channel.flush(StreamState::BodyStreaming), TrailerFlush::Empty);

        let (name, value) = custom();
        channel.append(StreamState::HeadersSent, name, value);
        assert_eq!(channel.flush(StreamState::Reset), TrailerFlush::Dropped);
        assert_eq!(channel.dropped(), 1);
    }

    #[test]
    fn append_after_reset_is_silently_dropped() {
        let mut channel = TrailerChannel::new();
        let (name, value) = custom();
        assert!(!channel.append(StreamState::Reset, name, value));
        assert_eq!(channel.len(), 0);
        assert_eq!(channel.dropped(), 1);
    }
}
