//! Shared configuration system for desktop and ESP32.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`. Every tunable named by the
//! transport controller lives here: transmission interval, cycle timeout,
//! join backoff bounds, failure threshold, network connection timeout and
//! the button duration bands.
//!
//! # Example
//!
//! ```rust
//! use allsky_node::config::{NodeConfig, RadioConfig, WifiConfig};
//!
//! let config = NodeConfig::default()
//!     .with_radio(
//!         RadioConfig::default()
//!             .with_dev_eui_hex("70B3D57ED005A1B2")
//!             .unwrap(),
//!     )
//!     .with_wifi(WifiConfig::default().with_ssid("observatory"));
//!
//! assert!(config.radio.is_configured());
//! assert!(config.validate().is_ok());
//! ```

use heapless::String as HString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Maximum length for short config strings (SSIDs, device names)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer config strings (routes, passwords)
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

fn truncated<const N: usize>(s: &str) -> HString<N> {
    let mut hs = HString::new();
    // Find valid UTF-8 boundary
    let valid_end = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= N)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    truncated(s)
}

/// Create a LongString from a &str, truncating if too long
pub fn long_string(s: &str) -> LongString {
    truncated(s)
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete node configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Radio (OTAA) identity
    pub radio: RadioConfig,
    /// Transmission cycle timing and failure policy
    pub cycle: CycleConfig,
    /// Join retry backoff
    pub backoff: BackoffConfig,
    /// Fallback network identity
    pub wifi: WifiConfig,
    /// Status query responder
    pub status: StatusConfig,
    /// Button duration bands
    pub button: ButtonConfig,
    /// Status display behaviour
    pub display: DisplayConfig,
    /// Device identification
    pub device: DeviceConfig,
}

impl NodeConfig {
    /// Set radio configuration
    pub fn with_radio(mut self, radio: RadioConfig) -> Self {
        self.radio = radio;
        self
    }

    /// Set cycle configuration
    pub fn with_cycle(mut self, cycle: CycleConfig) -> Self {
        self.cycle = cycle;
        self
    }

    /// Set backoff configuration
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set WiFi configuration
    pub fn with_wifi(mut self, wifi: WifiConfig) -> Self {
        self.wifi = wifi;
        self
    }

    /// Set status responder configuration
    pub fn with_status(mut self, status: StatusConfig) -> Self {
        self.status = status;
        self
    }

    /// Set button configuration
    pub fn with_button(mut self, button: ButtonConfig) -> Self {
        self.button = button;
        self
    }

    /// Set display configuration
    pub fn with_display(mut self, display: DisplayConfig) -> Self {
        self.display = display;
        self
    }

    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Check internal consistency.
    ///
    /// Credentials are not checked here; a missing radio identity is a boot
    /// condition reported by the controller, not a config error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.button.validate()?;
        self.backoff.validate()?;
        self.status.validate()?;
        if self.cycle.failure_threshold == 0 {
            return Err(ConfigError::InvalidThreshold);
        }
        Ok(())
    }
}

// ============================================================================
// Radio Config
// ============================================================================

/// OTAA identity for the wide-area radio.
///
/// All-zero credentials mean "not provisioned".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Device EUI
    pub dev_eui: [u8; 8],
    /// Application (join) EUI
    pub app_eui: [u8; 8],
    /// Application root key
    pub app_key: [u8; 16],
}

impl RadioConfig {
    /// Set the device EUI from a hex string
    pub fn with_dev_eui_hex(mut self, hex_str: &str) -> Result<Self, ConfigError> {
        decode_hex(hex_str, &mut self.dev_eui)?;
        Ok(self)
    }

    /// Set the application EUI from a hex string
    pub fn with_app_eui_hex(mut self, hex_str: &str) -> Result<Self, ConfigError> {
        decode_hex(hex_str, &mut self.app_eui)?;
        Ok(self)
    }

    /// Set the application key from a hex string
    pub fn with_app_key_hex(mut self, hex_str: &str) -> Result<Self, ConfigError> {
        decode_hex(hex_str, &mut self.app_key)?;
        Ok(self)
    }

    /// Set all three credentials from raw bytes
    pub fn with_keys(mut self, dev_eui: [u8; 8], app_eui: [u8; 8], app_key: [u8; 16]) -> Self {
        self.dev_eui = dev_eui;
        self.app_eui = app_eui;
        self.app_key = app_key;
        self
    }

    /// Check if any credential has been provisioned
    pub fn is_configured(&self) -> bool {
        self.dev_eui
            .iter()
            .chain(self.app_eui.iter())
            .chain(self.app_key.iter())
            .any(|b| *b != 0)
    }
}

fn decode_hex(hex_str: &str, out: &mut [u8]) -> Result<(), ConfigError> {
    hex::decode_to_slice(hex_str.trim(), out).map_err(|_| ConfigError::InvalidHex {
        expected: out.len(),
    })
}

// ============================================================================
// Cycle Config
// ============================================================================

/// Transmission cycle timing and failure policy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Interval between uplinks once joined
    pub tx_interval_ms: u64,
    /// Delay between a successful join and the first uplink
    pub settle_delay_ms: u64,
    /// A cycle with no completion event after this long counts as failed
    pub cycle_timeout_ms: u64,
    /// Consecutive failed cycles before automatic fallback
    pub failure_threshold: u32,
    /// How long a fallback request waits for an in-flight uplink
    pub quiesce_grace_ms: u64,
    /// Sensor refresh period while the fallback transport is active
    pub fallback_sensor_refresh_ms: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            tx_interval_ms: 60_000,
            settle_delay_ms: 5_000,
            cycle_timeout_ms: 120_000,
            failure_threshold: crate::failure::DEFAULT_FAILURE_THRESHOLD,
            quiesce_grace_ms: 10_000,
            fallback_sensor_refresh_ms: 60_000,
        }
    }
}

impl CycleConfig {
    /// Set the uplink interval
    pub fn with_tx_interval_ms(mut self, ms: u64) -> Self {
        self.tx_interval_ms = ms;
        self
    }

    /// Set the post-join settle delay
    pub fn with_settle_delay_ms(mut self, ms: u64) -> Self {
        self.settle_delay_ms = ms;
        self
    }

    /// Set the per-cycle timeout
    pub fn with_cycle_timeout_ms(mut self, ms: u64) -> Self {
        self.cycle_timeout_ms = ms;
        self
    }

    /// Set the consecutive failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the quiesce grace period
    pub fn with_quiesce_grace_ms(mut self, ms: u64) -> Self {
        self.quiesce_grace_ms = ms;
        self
    }

    /// Set the sensor refresh period used while in fallback
    pub fn with_fallback_sensor_refresh_ms(mut self, ms: u64) -> Self {
        self.fallback_sensor_refresh_ms = ms;
        self
    }
}

// ============================================================================
// Backoff Config
// ============================================================================

/// Capped exponential backoff between join attempts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub initial_ms: u64,
    /// Growth factor per consecutive failure
    pub multiplier: u32,
    /// Upper bound on any single delay
    pub cap_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 10_000,
            multiplier: 2,
            cap_ms: 600_000,
        }
    }
}

impl BackoffConfig {
    /// Set the initial delay
    pub fn with_initial_ms(mut self, ms: u64) -> Self {
        self.initial_ms = ms;
        self
    }

    /// Set the multiplier
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the cap
    pub fn with_cap_ms(mut self, ms: u64) -> Self {
        self.cap_ms = ms;
        self
    }

    /// Check the policy is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_ms == 0 || self.multiplier == 0 || self.cap_ms < self.initial_ms {
            return Err(ConfigError::InvalidBackoff);
        }
        Ok(())
    }
}

// ============================================================================
// WiFi Config
// ============================================================================

/// WiFi connection configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WifiConfig {
    /// WiFi network SSID
    pub ssid: ShortString,
    /// WiFi password
    pub password: LongString,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u32,
    /// Reconnect attempts after link loss before giving up
    pub reconnect_attempts: u8,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: ShortString::new(),
            password: LongString::new(),
            connect_timeout_ms: 60_000,
            reconnect_attempts: 1,
        }
    }
}

impl WifiConfig {
    /// Set the SSID
    pub fn with_ssid(mut self, ssid: &str) -> Self {
        self.ssid = short_string(ssid);
        self
    }

    /// Set the password
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = long_string(password);
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout_ms(mut self, ms: u32) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Set the reconnect attempt count
    pub fn with_reconnect_attempts(mut self, attempts: u8) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    /// Check if WiFi credentials are configured
    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty()
    }
}

// ============================================================================
// Status Config
// ============================================================================

/// Status query responder configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Route the status document is served on
    pub route: ShortString,
    /// Port to listen on
    pub port: u16,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            route: short_string("/status"),
            port: 80,
            cors_permissive: true,
        }
    }
}

impl StatusConfig {
    /// Set the route
    pub fn with_route(mut self, route: &str) -> Self {
        self.route = short_string(route);
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set CORS mode
    pub fn with_cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }

    /// Check the route can be mounted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if is_valid_route(&self.route) {
            Ok(())
        } else {
            Err(ConfigError::InvalidRoute)
        }
    }
}

/// True if `route` is an absolute path with no whitespace.
pub fn is_valid_route(route: &str) -> bool {
    route.starts_with('/') && !route.chars().any(char::is_whitespace)
}

// ============================================================================
// Button Config
// ============================================================================

/// Debounce and press duration bands
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonConfig {
    /// Minimum time between accepted raw edges
    pub debounce_ms: u32,
    /// Presses shorter than this are ignored
    pub min_press_ms: u32,
    /// Upper bound (inclusive) of the short band
    pub short_max_ms: u32,
    /// Lower bound (inclusive) of the long band
    pub long_ms: u32,
    /// Lower bound (inclusive) of the very long band
    pub very_long_ms: u32,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            min_press_ms: 100,
            short_max_ms: 999,
            long_ms: 3_000,
            very_long_ms: 8_000,
        }
    }
}

impl ButtonConfig {
    /// Set the debounce interval
    pub fn with_debounce_ms(mut self, ms: u32) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set all four duration bands
    pub fn with_bands(mut self, min: u32, short_max: u32, long: u32, very_long: u32) -> Self {
        self.min_press_ms = min;
        self.short_max_ms = short_max;
        self.long_ms = long;
        self.very_long_ms = very_long;
        self
    }

    /// Check that bands are ordered and do not overlap
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.debounce_ms < self.min_press_ms
            && self.min_press_ms <= self.short_max_ms
            && self.short_max_ms < self.long_ms
            && self.long_ms < self.very_long_ms;
        if ordered {
            Ok(())
        } else {
            Err(ConfigError::InvalidButtonBands)
        }
    }
}

// ============================================================================
// Display Config
// ============================================================================

/// Status display behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Blank the display after this long without activity
    pub timeout_ms: u64,
    /// Minimum interval between diagnostics redraws
    pub refresh_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            refresh_ms: 500,
        }
    }
}

impl DisplayConfig {
    /// Set the sleep timeout
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the redraw interval
    pub fn with_refresh_ms(mut self, ms: u64) -> Self {
        self.refresh_ms = ms;
        self
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Device identification configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Human-readable device name
    pub name: ShortString,
    /// Firmware build tag shown at boot
    pub build: ShortString,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: short_string("allsky-node"),
            build: short_string(env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DeviceConfig {
    /// Set the device name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }

    /// Set the build tag
    pub fn with_build(mut self, build: &str) -> Self {
        self.build = short_string(build);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.cycle.tx_interval_ms, 60_000);
        assert_eq!(config.cycle.settle_delay_ms, 5_000);
        assert_eq!(config.cycle.cycle_timeout_ms, 120_000);
        assert_eq!(config.cycle.failure_threshold, 10);
        assert_eq!(config.wifi.connect_timeout_ms, 60_000);
        assert_eq!(config.status.route.as_str(), "/status");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn short_string_truncation() {
        let long_input = "a".repeat(100);
        let s = short_string(&long_input);
        assert_eq!(s.len(), MAX_SHORT_STRING);
    }

    #[test]
    fn short_string_respects_utf8_boundary() {
        let input = "é".repeat(40);
        let s = short_string(&input);
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c == 'é'));
    }

    #[test]
    fn builder_pattern() {
        let config = NodeConfig::default()
            .with_cycle(CycleConfig::default().with_tx_interval_ms(30_000))
            .with_status(StatusConfig::default().with_port(8080))
            .with_device(DeviceConfig::default().with_name("roof-east"));

        assert_eq!(config.cycle.tx_interval_ms, 30_000);
        assert_eq!(config.status.port, 8080);
        assert_eq!(config.device.name.as_str(), "roof-east");
    }

    // =========================================================================
    // RadioConfig Tests
    // =========================================================================

    #[test]
    fn radio_unconfigured_by_default() {
        assert!(!RadioConfig::default().is_configured());
    }

    #[test]
    fn radio_hex_credentials() {
        let radio = RadioConfig::default()
            .with_dev_eui_hex("70B3D57ED005A1B2")
            .unwrap()
            .with_app_key_hex("000102030405060708090a0b0c0d0e0f")
            .unwrap();
        assert_eq!(radio.dev_eui[0], 0x70);
        assert_eq!(radio.dev_eui[7], 0xB2);
        assert_eq!(radio.app_key[15], 0x0F);
        assert!(radio.is_configured());
    }

    #[test]
    fn radio_hex_rejects_wrong_length() {
        let err = RadioConfig::default().with_app_eui_hex("0102").unwrap_err();
        assert_eq!(err, ConfigError::InvalidHex { expected: 8 });
    }

    #[test]
    fn radio_hex_rejects_garbage() {
        assert!(RadioConfig::default()
            .with_dev_eui_hex("zz00000000000000")
            .is_err());
    }

    // =========================================================================
    // ButtonConfig Tests
    // =========================================================================

    #[test]
    fn button_defaults_valid() {
        assert!(ButtonConfig::default().validate().is_ok());
    }

    #[test]
    fn button_overlapping_bands_rejected() {
        let bands = ButtonConfig::default().with_bands(100, 3_000, 3_000, 8_000);
        assert_eq!(bands.validate(), Err(ConfigError::InvalidButtonBands));
    }

    #[test]
    fn button_debounce_must_be_below_min() {
        let bands = ButtonConfig::default().with_debounce_ms(100);
        assert!(bands.validate().is_err());
    }

    // =========================================================================
    // Backoff / threshold Tests
    // =========================================================================

    #[test]
    fn backoff_validation() {
        assert!(BackoffConfig::default().validate().is_ok());
        assert!(BackoffConfig::default().with_initial_ms(0).validate().is_err());
        assert!(BackoffConfig::default().with_multiplier(0).validate().is_err());
        assert!(BackoffConfig::default()
            .with_initial_ms(5_000)
            .with_cap_ms(1_000)
            .validate()
            .is_err());
    }

    #[test]
    fn zero_threshold_rejected() {
        let config =
            NodeConfig::default().with_cycle(CycleConfig::default().with_failure_threshold(0));
        assert_eq!(config.validate(), Err(ConfigError::InvalidThreshold));
    }

    #[test]
    fn status_route_must_be_absolute() {
        for route in ["status", "", "/sta tus"] {
            let config = NodeConfig::default().with_status(StatusConfig::default().with_route(route));
            assert_eq!(config.validate(), Err(ConfigError::InvalidRoute), "{route:?}");
        }
        let config = NodeConfig::default().with_status(StatusConfig::default().with_route("/api/sky"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn wifi_config_builder() {
        let wifi = WifiConfig::default()
            .with_ssid("TestNetwork")
            .with_password("secret123")
            .with_connect_timeout_ms(15_000)
            .with_reconnect_attempts(3);

        assert_eq!(wifi.ssid.as_str(), "TestNetwork");
        assert_eq!(wifi.password.as_str(), "secret123");
        assert_eq!(wifi.connect_timeout_ms, 15_000);
        assert_eq!(wifi.reconnect_attempts, 3);
        assert!(wifi.is_configured());
        assert!(!WifiConfig::default().is_configured());
    }
}
