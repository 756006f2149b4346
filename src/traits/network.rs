//! Boundary to the local network stack used as the fallback transport.
//!
//! The stack associates with a preconfigured network, serves the status
//! document on a fixed route, and reports link state. HTTP internals are the
//! implementor's concern.
//!
//! # Query flow
//!
//! ```text
//! client ──GET /status──► responder ──queue──► poll(render) ──► response
//! ```
//!
//! Queries are answered from [`NetworkStack::poll`], on the loop, with a
//! body rendered fresh for each query. The responder itself never touches
//! node state.

use crate::config::WifiConfig;
use crate::error::{ConnectFailure, NetworkError};
use crate::status::StatusBody;

/// Driving interface of a local network stack.
pub trait NetworkStack {
    /// Associate with the configured network.
    ///
    /// May block, bounded by `config.connect_timeout_ms`.
    fn connect(&mut self, config: &WifiConfig) -> Result<(), ConnectFailure>;

    /// Drop the association and release the interface. Idempotent.
    fn disconnect(&mut self);

    /// Whether the link is currently up.
    fn is_connected(&self) -> bool;

    /// Start serving status queries on `route`.
    fn start_responder(&mut self, route: &str) -> Result<(), NetworkError>;

    /// Stop serving status queries. Idempotent.
    fn stop_responder(&mut self);

    /// Answer every pending status query with a body from `render`.
    ///
    /// Returns the number of queries served. Must not block.
    fn poll(&mut self, render: &mut dyn FnMut() -> StatusBody) -> usize;
}
