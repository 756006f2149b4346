//! Local network fallback transport.
//!
//! Connects to the configured network, serves the status document, and
//! watches the link. A lost link gets a bounded reconnect before the failure
//! is reported to the controller.

use tracing::{error, info, warn};

use crate::config::{NodeConfig, ShortString, WifiConfig};
use crate::error::{ConnectFailure, NetworkError};
use crate::status::StatusBody;
use crate::traits::NetworkStack;

/// Drives a [`NetworkStack`] through connect/serve/reconnect.
pub struct NetworkFallbackManager<N: NetworkStack> {
    net: N,
    wifi: WifiConfig,
    route: ShortString,
    armed: bool,
    responder_up: bool,
    queries_served: u32,
}

impl<N: NetworkStack> NetworkFallbackManager<N> {
    /// Creates a disarmed manager.
    pub fn new(net: N, config: &NodeConfig) -> Self {
        Self {
            net,
            wifi: config.wifi.clone(),
            route: config.status.route.clone(),
            armed: false,
            responder_up: false,
            queries_served: 0,
        }
    }

    /// Associate and start the status responder.
    ///
    /// Blocks for at most the configured connection timeout. On failure the
    /// interface is released and the manager stays disarmed.
    pub fn connect(&mut self) -> Result<(), ConnectFailure> {
        info!(ssid = %self.wifi.ssid, "connecting fallback network");
        if let Err(reason) = self.net.connect(&self.wifi) {
            warn!(%reason, "fallback network connect failed");
            self.net.disconnect();
            return Err(reason);
        }

        self.armed = true;
        self.start_responder();
        info!(route = %self.route, "fallback network up");
        Ok(())
    }

    /// Serve pending status queries and watch the link.
    ///
    /// `render` is called once per query. On link loss one bounded
    /// reconnect per configured attempt is made; if all fail the interface
    /// is released and [`NetworkError::LinkLost`] is returned.
    pub fn poll(&mut self, render: &mut dyn FnMut() -> StatusBody) -> Result<usize, NetworkError> {
        if !self.armed {
            return Ok(0);
        }

        if !self.net.is_connected() {
            warn!("fallback link lost");
            self.net.stop_responder();
            self.responder_up = false;
            if let Err(reason) = self.reconnect() {
                error!(%reason, "fallback reconnect failed");
                self.disconnect();
                return Err(NetworkError::LinkLost(reason));
            }
        }

        if !self.responder_up {
            self.start_responder();
        }

        let served = self.net.poll(render);
        self.queries_served = self
            .queries_served
            .saturating_add(u32::try_from(served).unwrap_or(u32::MAX));
        Ok(served)
    }

    fn reconnect(&mut self) -> Result<(), ConnectFailure> {
        let mut last = ConnectFailure::Timeout;
        for attempt in 1..=self.wifi.reconnect_attempts {
            info!(attempt, "reconnecting fallback network");
            match self.net.connect(&self.wifi) {
                Ok(()) => return Ok(()),
                Err(reason) => last = reason,
            }
        }
        Err(last)
    }

    fn start_responder(&mut self) {
        match self.net.start_responder(self.route.as_str()) {
            Ok(()) => self.responder_up = true,
            Err(err) => {
                warn!(%err, "status responder failed to start, will retry");
                self.responder_up = false;
            }
        }
    }

    /// Stop the responder and release the interface. Idempotent.
    pub fn disconnect(&mut self) {
        if self.armed {
            info!("stopping fallback network");
        }
        self.net.stop_responder();
        self.net.disconnect();
        self.responder_up = false;
        self.armed = false;
    }

    /// Whether the manager may perform network I/O.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Configured network name.
    pub fn ssid(&self) -> &str {
        self.wifi.ssid.as_str()
    }

    /// Route the status document is served on.
    pub fn route(&self) -> &str {
        self.route.as_str()
    }

    /// Status queries answered since boot.
    pub fn queries_served(&self) -> u32 {
        self.queries_served
    }

    /// The underlying network stack.
    pub fn net(&self) -> &N {
        &self.net
    }

    /// Mutable access to the underlying network stack.
    pub fn net_mut(&mut self) -> &mut N {
        &mut self.net
    }
}
