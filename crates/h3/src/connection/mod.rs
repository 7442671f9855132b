//! Connection handling module.
//!
//! - [`H3Connection`]: accepts request streams and spawns one task per stream
//! - [`RequestDispatcher`]: runs the handler for a stream and maps its result
//!   to the stream's terminal operation
//! - [`StreamOutcome`]: how a stream ended

mod dispatcher;
mod h3_connection;

pub use dispatcher::RequestDispatcher;
pub use dispatcher::StreamOutcome;
pub use h3_connection::H3Connection;
