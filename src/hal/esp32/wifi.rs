//! Station-mode Wi-Fi and status responder for ESP32.
//!
//! Implements [`NetworkStack`] with esp-idf-svc: `BlockingWifi` for the
//! association and `EspHttpServer` for the status route. HTTP handlers run
//! on the server's own task and obtain documents from the loop through the
//! query bridge in [`crate::services::shared`].
//!
//! # Example
//!
//! ```ignore
//! use allsky_node::hal::esp32::Esp32Network;
//!
//! let net = Esp32Network::new(peripherals.modem, sysloop, Some(nvs), 80)?;
//! let fallback = NetworkFallbackManager::new(net, &config);
//! ```

use std::time::{Duration, Instant};

use esp_idf_hal::io::Write;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::http::server::{Configuration as HttpConfiguration, EspHttpServer};
use esp_idf_svc::http::Method;
use esp_idf_svc::io::EspIOError;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use tracing::{info, warn};

use crate::config::WifiConfig;
use crate::error::{ConnectFailure, NetworkError};
use crate::services::shared::{query_channel, QueryServer};
use crate::status::StatusBody;
use crate::traits::NetworkStack;

/// Requests allowed to wait for the loop.
const QUERY_CAPACITY: usize = 4;

/// How long a handler waits for the loop to answer.
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for association.
const CONNECT_POLL: Duration = Duration::from_millis(100);

/// ESP32 Wi-Fi network stack.
pub struct Esp32Network<'a> {
    wifi: BlockingWifi<EspWifi<'a>>,
    http_port: u16,
    server: Option<EspHttpServer<'static>>,
    queries: Option<QueryServer>,
}

impl<'a> Esp32Network<'a> {
    /// Initialize the driver without associating.
    ///
    /// # Errors
    ///
    /// Returns an error if the Wi-Fi driver cannot be created.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        http_port: u16,
    ) -> anyhow::Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;
        Ok(Self {
            wifi,
            http_port,
            server: None,
            queries: None,
        })
    }

    fn configure(&mut self, config: &WifiConfig) -> Result<(), ConnectFailure> {
        let mut ssid: heapless::String<32> = heapless::String::new();
        let _ = ssid.push_str(config.ssid.as_str());
        let mut password: heapless::String<64> = heapless::String::new();
        let _ = password.push_str(config.password.as_str());

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid,
                password,
                ..Default::default()
            }))
            .map_err(|_| ConnectFailure::TargetNotFound)?;

        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|_| ConnectFailure::Timeout)?;
        }
        Ok(())
    }

    fn target_visible(&mut self, ssid: &str) -> bool {
        match self.wifi.scan() {
            Ok(aps) => aps.iter().any(|ap| ap.ssid.as_str() == ssid),
            // A failed scan is not proof of absence; let the association decide.
            Err(_) => true,
        }
    }
}

impl NetworkStack for Esp32Network<'_> {
    fn connect(&mut self, config: &WifiConfig) -> Result<(), ConnectFailure> {
        let deadline = Instant::now() + Duration::from_millis(u64::from(config.connect_timeout_ms));

        self.configure(config)?;
        if !self.target_visible(config.ssid.as_str()) {
            return Err(ConnectFailure::TargetNotFound);
        }

        info!(ssid = %config.ssid, "associating");
        self.wifi
            .wifi_mut()
            .connect()
            .map_err(|_| ConnectFailure::AuthenticationFailed)?;

        loop {
            if self.wifi.is_up().unwrap_or(false) {
                break;
            }
            if Instant::now() >= deadline {
                let _ = self.wifi.wifi_mut().disconnect();
                return Err(if self.wifi.is_connected().unwrap_or(false) {
                    ConnectFailure::Timeout
                } else {
                    ConnectFailure::AuthenticationFailed
                });
            }
            std::thread::sleep(CONNECT_POLL);
        }

        if let Ok(ip) = self.wifi.wifi().sta_netif().get_ip_info() {
            info!(ip = %ip.ip, "network up");
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.stop_responder();
        if let Err(err) = self.wifi.disconnect() {
            warn!(%err, "wifi disconnect failed");
        }
        if let Err(err) = self.wifi.stop() {
            warn!(%err, "wifi stop failed");
        }
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn start_responder(&mut self, route: &str) -> Result<(), NetworkError> {
        self.stop_responder();

        let (client, queries) = query_channel(QUERY_CAPACITY, QUERY_TIMEOUT);
        let config = HttpConfiguration {
            http_port: self.http_port,
            ..Default::default()
        };
        let mut server =
            EspHttpServer::new(&config).map_err(|_| NetworkError::ResponderUnavailable)?;

        server
            .fn_handler(route, Method::Get, move |req| {
                match client.request() {
                    Ok(body) => {
                        let mut resp = req.into_response(
                            200,
                            None,
                            &[("Content-Type", "application/json")],
                        )?;
                        resp.write_all(body.as_bytes())?;
                    }
                    Err(_) => {
                        let mut resp = req.into_response(
                            503,
                            None,
                            &[("Content-Type", "application/json")],
                        )?;
                        resp.write_all(b"{\"error\":\"status unavailable\"}")?;
                    }
                }
                Ok::<_, EspIOError>(())
            })
            .map_err(|_| NetworkError::ResponderUnavailable)?;

        self.server = Some(server);
        self.queries = Some(queries);
        Ok(())
    }

    fn stop_responder(&mut self) {
        self.server = None;
        self.queries = None;
    }

    fn poll(&mut self, render: &mut dyn FnMut() -> StatusBody) -> usize {
        self.queries
            .as_ref()
            .map_or(0, |queries| queries.serve_pending(render))
    }
}
