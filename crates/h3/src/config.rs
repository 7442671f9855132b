//! Server configuration.

use crate::protocol::{ConfigError, ErrorCode};

/// Default bound on request streams handled at the same time per connection.
pub const DEFAULT_MAX_CONCURRENT_STREAMS: usize = 100;

/// Per-connection settings of the HTTP/3 server core.
///
/// ```
/// use micro_h3::config::ServerConfig;
///
/// let config = ServerConfig::builder().max_concurrent_streams(16).build().unwrap();
/// assert_eq!(config.max_concurrent_streams(), 16);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    max_concurrent_streams: usize,
    stop_unread_body: bool,
    reject_code: ErrorCode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS,
            stop_unread_body: true,
            reject_code: ErrorCode::H3_REQUEST_REJECTED,
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Streams beyond this many in flight are refused before the handler runs.
    pub fn max_concurrent_streams(&self) -> usize {
        self.max_concurrent_streams
    }

    /// Whether a cleanly completed response stops the peer from sending a
    /// request body the handler never read.
    pub fn stop_unread_body(&self) -> bool {
        self.stop_unread_body
    }

    /// Code used to refuse streams over the limit.
    pub fn reject_code(&self) -> ErrorCode {
        self.reject_code
    }
}

#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    fn new() -> Self {
        Self { config: ServerConfig::default() }
    }

    #[must_use]
    pub fn max_concurrent_streams(mut self, max: usize) -> Self {
        self.config.max_concurrent_streams = max;
        self
    }

    #[must_use]
    pub fn stop_unread_body(mut self, stop: bool) -> Self {
        self.config.stop_unread_body = stop;
        self
    }

    #[must_use]
    pub fn reject_code<C: Into<ErrorCode>>(mut self, code: C) -> Self {
        self.config.reject_code = code.into();
        self
    }

    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        if self.config.max_concurrent_streams == 0 {
            return Err(ConfigError::ZeroStreamLimit);
        }
        Ok(self.config)
    }
}
