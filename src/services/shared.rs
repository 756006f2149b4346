//! Bridge between HTTP handler threads and the node loop.
//!
//! Status documents are rendered in the loop, never in a handler: the handler
//! posts a [`StatusQuery`] and waits (bounded) for the loop to answer it from
//! `NetworkStack::poll`. Both the desktop and ESP32 network stacks use this.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use allsky_node::services::query_channel;
//! use allsky_node::status::StatusBody;
//!
//! let (client, server) = query_channel(4, Duration::from_secs(1));
//!
//! let handler = std::thread::spawn(move || client.request());
//!
//! // Loop side
//! let mut served = 0;
//! while served == 0 {
//!     served = server.serve_pending(&mut || {
//!         let mut body = StatusBody::new();
//!         body.push_str("{\"ok\":true}").unwrap();
//!         body
//!     });
//! }
//!
//! assert_eq!(handler.join().unwrap().unwrap().as_str(), "{\"ok\":true}");
//! ```

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

use thiserror::Error;

use crate::status::StatusBody;

/// Why a handler could not obtain a status document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The loop side is gone or its queue is full.
    #[error("status responder unavailable")]
    Unavailable,
    /// The loop did not answer within the handler timeout.
    #[error("status query timed out")]
    Timeout,
}

/// One pending status request.
pub struct StatusQuery {
    reply: SyncSender<StatusBody>,
}

impl StatusQuery {
    /// Answer the request. Returns `false` if the requester gave up.
    pub fn respond(self, body: StatusBody) -> bool {
        self.reply.send(body).is_ok()
    }
}

// ============================================================================
// Handler side
// ============================================================================

/// Handler-side endpoint; cheap to clone into each handler.
#[derive(Clone, Debug)]
pub struct QueryClient {
    tx: SyncSender<StatusQuery>,
    timeout: Duration,
}

impl QueryClient {
    /// Ask the loop for a fresh status document and wait for it.
    ///
    /// Blocks the calling thread for at most the configured timeout.
    pub fn request(&self) -> Result<StatusBody, QueryError> {
        let (reply, answer) = mpsc::sync_channel(1);
        match self.tx.try_send(StatusQuery { reply }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                return Err(QueryError::Unavailable)
            }
        }
        answer.recv_timeout(self.timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => QueryError::Timeout,
            RecvTimeoutError::Disconnected => QueryError::Unavailable,
        })
    }
}

// ============================================================================
// Loop side
// ============================================================================

/// Loop-side endpoint.
#[derive(Debug)]
pub struct QueryServer {
    rx: Receiver<StatusQuery>,
}

impl QueryServer {
    /// Answer every queued request with a body from `render`.
    ///
    /// Never blocks. Returns the number of requests answered.
    pub fn serve_pending(&self, render: &mut dyn FnMut() -> StatusBody) -> usize {
        let mut served = 0;
        while let Ok(query) = self.rx.try_recv() {
            if query.respond(render()) {
                served += 1;
            }
        }
        served
    }
}

impl core::fmt::Debug for StatusQuery {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StatusQuery").finish_non_exhaustive()
    }
}

/// Create a bounded request queue.
///
/// `capacity` limits requests waiting for the loop; beyond it handlers fail
/// fast with [`QueryError::Unavailable`].
pub fn query_channel(capacity: usize, timeout: Duration) -> (QueryClient, QueryServer) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    (QueryClient { tx, timeout }, QueryServer { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(text: &str) -> StatusBody {
        let mut b = StatusBody::new();
        b.push_str(text).unwrap();
        b
    }

    #[test]
    fn unanswered_query_times_out() {
        let (client, _server) = query_channel(1, Duration::from_millis(20));
        assert_eq!(client.request(), Err(QueryError::Timeout));
    }

    #[test]
    fn dropped_loop_is_unavailable() {
        let (client, server) = query_channel(1, Duration::from_millis(20));
        drop(server);
        assert_eq!(client.request(), Err(QueryError::Unavailable));
    }

    #[test]
    fn abandoned_query_not_counted() {
        let (client, server) = query_channel(2, Duration::from_millis(1));
        assert_eq!(client.request(), Err(QueryError::Timeout));
        assert_eq!(server.serve_pending(&mut || body("{}")), 0);
    }

    #[test]
    fn each_query_rendered_separately() {
        let (client, server) = query_channel(4, Duration::from_secs(2));
        let a = client.clone();
        let b = client;
        let ta = std::thread::spawn(move || a.request());
        let tb = std::thread::spawn(move || b.request());

        let mut n = 0;
        let mut served = 0;
        while served < 2 {
            served += server.serve_pending(&mut || {
                n += 1;
                body(if n == 1 { "{\"n\":1}" } else { "{\"n\":2}" })
            });
        }

        let mut got = [
            ta.join().unwrap().unwrap().as_str().to_owned(),
            tb.join().unwrap().unwrap().as_str().to_owned(),
        ];
        got.sort();
        assert_eq!(got, ["{\"n\":1}", "{\"n\":2}"]);
    }
}
