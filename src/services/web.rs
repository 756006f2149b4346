//! Axum-based status responder and desktop network stack.
//!
//! Provides:
//! - GET `<route>` - Current status document (route from [`StatusConfig`])
//! - anything else - 404 with a JSON error body
//!
//! [`DesktopNetwork`] implements [`NetworkStack`] on a host machine: the
//! "association" is a simulated access point flag, and the responder is a
//! real HTTP server on a private tokio runtime. Handlers never render the
//! document themselves; they ask the loop through the query bridge.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::config::{is_valid_route, StatusConfig, WifiConfig};
use crate::error::{ConnectFailure, NetworkError};
use crate::status::StatusBody;
use crate::traits::NetworkStack;

use super::shared::{query_channel, QueryClient, QueryServer};

/// Requests allowed to wait for the loop.
const QUERY_CAPACITY: usize = 8;

// ============================================================================
// Route Handlers
// ============================================================================

/// GET <route> - Returns a status document rendered by the loop
async fn get_status(State(client): State<QueryClient>) -> Response {
    match tokio::task::spawn_blocking(move || client.request()).await {
        Ok(Ok(body)) => (
            [(header::CONTENT_TYPE, "application/json")],
            String::from(body.as_str()),
        )
            .into_response(),
        Ok(Err(err)) => {
            debug!(%err, "status query not answered");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "status handler failed" })),
        )
            .into_response(),
    }
}

/// Fallback handler for 404
async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

// ============================================================================
// Server Builder
// ============================================================================

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Address to bind to
    pub addr: SocketAddr,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
    /// How long a handler waits for the loop to answer
    pub query_timeout: Duration,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            cors_permissive: true,
            query_timeout: Duration::from_secs(5),
        }
    }
}

impl WebServerConfig {
    /// Create a new config with the given address
    pub fn new(addr: impl Into<SocketAddr>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Set whether CORS should be permissive
    pub fn cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }

    /// Set the handler wait bound
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Create from the node's status responder config
    pub fn from_config(config: &StatusConfig) -> Self {
        Self {
            addr: ([0, 0, 0, 0], config.port).into(),
            cors_permissive: config.cors_permissive,
            ..Default::default()
        }
    }
}

/// Build the Axum router serving the status document on `route`.
///
/// # Panics
///
/// Panics if `route` does not start with `/`. Routes from a validated
/// [`NodeConfig`](crate::NodeConfig) always do; see
/// [`is_valid_route`](crate::config::is_valid_route).
pub fn build_router(client: QueryClient, route: &str, config: &WebServerConfig) -> Router {
    let mut router = Router::new()
        .route(route, get(get_status))
        .fallback(not_found)
        .with_state(client);

    if config.cors_permissive {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

// ============================================================================
// Desktop Network Stack
// ============================================================================

/// Host-side [`NetworkStack`] for simulation and integration tests.
///
/// # Example
///
/// ```no_run
/// use allsky_node::config::WifiConfig;
/// use allsky_node::services::{DesktopNetwork, WebServerConfig};
/// use allsky_node::traits::NetworkStack;
///
/// let mut net = DesktopNetwork::new(WebServerConfig::new(([127, 0, 0, 1], 8080)))?;
/// net.connect(&WifiConfig::default().with_ssid("observatory")).unwrap();
/// net.start_responder("/status").unwrap();
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct DesktopNetwork {
    runtime: Runtime,
    config: WebServerConfig,
    access_point: Arc<AtomicBool>,
    connected: bool,
    shutdown: Option<oneshot::Sender<()>>,
    queries: Option<QueryServer>,
}

impl DesktopNetwork {
    /// Create the stack and its runtime. The access point starts up.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built.
    pub fn new(config: WebServerConfig) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("status-http")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            config,
            access_point: Arc::new(AtomicBool::new(true)),
            connected: false,
            shutdown: None,
            queries: None,
        })
    }

    /// Shared flag standing in for the access point's presence.
    ///
    /// Clearing it drops the link on the next `is_connected()` and makes
    /// `connect()` fail with [`ConnectFailure::TargetNotFound`].
    pub fn access_point(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.access_point)
    }

    /// Address the responder is (or will be) bound to.
    ///
    /// After the first bind to port 0 this is the port actually assigned,
    /// and later restarts reuse it.
    pub fn local_addr(&self) -> SocketAddr {
        self.config.addr
    }

    /// Whether the HTTP server is running.
    pub fn is_serving(&self) -> bool {
        self.shutdown.is_some()
    }
}

impl NetworkStack for DesktopNetwork {
    fn connect(&mut self, config: &WifiConfig) -> Result<(), ConnectFailure> {
        if !config.is_configured() || !self.access_point.load(Ordering::Acquire) {
            self.connected = false;
            return Err(ConnectFailure::TargetNotFound);
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.stop_responder();
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected && self.access_point.load(Ordering::Acquire)
    }

    fn start_responder(&mut self, route: &str) -> Result<(), NetworkError> {
        self.stop_responder();
        if !is_valid_route(route) {
            return Err(NetworkError::ResponderUnavailable);
        }

        let listener = std::net::TcpListener::bind(self.config.addr).map_err(|err| {
            warn!(%err, addr = %self.config.addr, "status responder bind failed");
            NetworkError::ResponderUnavailable
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|_| NetworkError::ResponderUnavailable)?;
        if let Ok(addr) = listener.local_addr() {
            self.config.addr = addr;
        }

        let (client, queries) = query_channel(QUERY_CAPACITY, self.config.query_timeout);
        let router = build_router(client, route, &self.config);
        let (tx, rx) = oneshot::channel::<()>();

        let _guard = self.runtime.enter();
        let listener = tokio::net::TcpListener::from_std(listener)
            .map_err(|_| NetworkError::ResponderUnavailable)?;
        self.runtime.spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(err) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                warn!(%err, "status responder stopped");
            }
        });

        info!(addr = %self.config.addr, route, "status responder listening");
        self.shutdown = Some(tx);
        self.queries = Some(queries);
        Ok(())
    }

    fn stop_responder(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
            debug!("status responder stopping");
        }
        self.queries = None;
    }

    fn poll(&mut self, render: &mut dyn FnMut() -> StatusBody) -> usize {
        self.queries
            .as_ref()
            .map_or(0, |queries| queries.serve_pending(render))
    }
}

impl Drop for DesktopNetwork {
    fn drop(&mut self) {
        self.stop_responder();
    }
}
