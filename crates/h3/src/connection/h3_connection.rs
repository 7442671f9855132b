use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::connection::{RequestDispatcher, StreamOutcome};
use crate::handler::Handler;
use crate::observer::{NoopObserver, StreamObserver};
use crate::protocol::H3Error;
use crate::transport::Connection;

/// An HTTP/3 connection that accepts request streams and runs each one on
/// its own task.
///
/// Streams are independent: a reset, a failing handler or a panic on one
/// stream never touches another. Only a failure of the connection itself
/// ends [`process`](Self::process) with an error.
///
/// # Type Parameters
///
/// * `C`: the QUIC connection providing request streams
pub struct H3Connection<C> {
    conn: C,
    config: Arc<ServerConfig>,
    observer: Arc<dyn StreamObserver>,
}

impl<C> std::fmt::Debug for H3Connection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("H3Connection").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<C: Connection> H3Connection<C> {
    pub fn new(conn: C) -> Self {
        Self::with_config(conn, ServerConfig::default())
    }

    pub fn with_config(conn: C, config: ServerConfig) -> Self {
        Self { conn, config: Arc::new(config), observer: Arc::new(NoopObserver) }
    }

    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn StreamObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Serves request streams until the peer goes away.
    ///
    /// Returns once every accepted stream has reached its terminal state.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), H3Error>
    where
        H: Handler + 'static,
    {
        let dispatcher = Arc::new(RequestDispatcher::new(handler, Arc::clone(&self.config), Arc::clone(&self.observer)));
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_streams()));
        let mut tasks = JoinSet::new();

        let result = loop {
            while let Some(joined) = tasks.try_join_next() {
                log_joined(joined);
            }

            match self.conn.accept_stream().await {
                Ok(Some(incoming)) => {
                    let dispatcher = Arc::clone(&dispatcher);
                    match Arc::clone(&permits).try_acquire_owned() {
                        Ok(permit) => {
                            tasks.spawn(async move {
                                let outcome = dispatcher.dispatch(incoming).await;
                                drop(permit);
                                outcome
                            });
                        }
                        Err(_) => {
                            debug!(stream_id = %incoming.id, "stream limit reached");
                            tasks.spawn(async move { dispatcher.reject(incoming).await });
                        }
                    }
                }

                Ok(None) => {
                    info!("cant accept more request streams, break this connection down");
                    break Ok(());
                }

                Err(e) => {
                    error!("can't accept next request stream, cause {}", e);
                    break Err(e.into());
                }
            }
        };

        while let Some(joined) = tasks.join_next().await {
            log_joined(joined);
        }
        result
    }
}

fn log_joined(joined: Result<StreamOutcome, tokio::task::JoinError>) {
    // handler panics are caught by the dispatcher; this only sees panics of
    // the transport or the observer
    if let Err(e) = joined {
        error!("stream task failed, cause {}", e);
    }
}
