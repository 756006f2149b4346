//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for all hardware and network traits,
//! enabling development and testing on desktop without a radio module,
//! Wi-Fi interface or sensors.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockRadio`] | [`RadioMac`] | Scripted join/transmit outcomes, records frames |
//! | [`MockNetwork`] | [`NetworkStack`] | Scripted connect results and status queries |
//! | [`MockSensors`] | [`SensorSource`] | Fixed snapshot template |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`MockDisplay`] | [`StatusDisplay`] | Records rendered frames |
//!
//! # Example
//!
//! ```rust
//! use allsky_node::hal::MockRadio;
//! use allsky_node::traits::{RadioEvent, RadioMac};
//!
//! let mut mac = MockRadio::new();
//! mac.auto_join = Some(true);
//! mac.join().unwrap();
//!
//! // Events are released by the MAC's own scheduler.
//! assert_eq!(mac.poll_event(), None);
//! mac.run_once();
//! assert_eq!(mac.poll_event(), Some(RadioEvent::JoinStarted));
//! assert_eq!(mac.poll_event(), Some(RadioEvent::Joined));
//! ```
//!
//! [`RadioMac`]: crate::traits::RadioMac
//! [`NetworkStack`]: crate::traits::NetworkStack
//! [`SensorSource`]: crate::traits::SensorSource
//! [`Clock`]: crate::traits::Clock
//! [`StatusDisplay`]: crate::traits::StatusDisplay

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use crate::config::WifiConfig;
use crate::error::{ConnectFailure, NetworkError, RadioError};
use crate::snapshot::{SensorSnapshot, SensorValidity, SkyQuality};
use crate::status::StatusBody;
use crate::traits::{
    Clock, NetworkStack, RadioEvent, RadioMac, SensorSource, StatusDisplay, TxReport,
};

// ============================================================================
// Radio
// ============================================================================

/// Mock radio MAC.
///
/// Operations stage their resulting events; [`run_once`](RadioMac::run_once)
/// releases them, the way a real MAC only reports progress from inside its
/// scheduler. Use [`push_event`](Self::push_event) to inject events such as
/// `TxComplete` by hand.
#[derive(Debug, Default)]
pub struct MockRadio {
    /// Outcome staged after each `join()`: `Some(true)` joins,
    /// `Some(false)` fails, `None` leaves the join pending.
    pub auto_join: Option<bool>,
    /// Completion staged after each accepted `transmit()`.
    pub auto_complete: Option<TxReport>,
    /// A transmit is pending inside the MAC.
    pub busy: bool,
    /// Error returned by every `transmit()` while set.
    pub fail_transmit: Option<RadioError>,
    /// Error returned by every `join()` while set.
    pub fail_join: Option<RadioError>,
    /// Number of `reset()` calls.
    pub resets: usize,
    /// Number of `join()` calls.
    pub joins: usize,
    /// Number of `run_once()` calls.
    pub run_calls: usize,
    /// Frames accepted by `transmit()`.
    pub frames: Vec<Vec<u8>>,
    staged: VecDeque<RadioEvent>,
    ready: VecDeque<RadioEvent>,
}

impl MockRadio {
    /// Creates an idle mock MAC.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an event for the next `run_once()`.
    pub fn push_event(&mut self, event: RadioEvent) {
        self.staged.push_back(event);
    }
}

impl RadioMac for MockRadio {
    fn reset(&mut self) -> Result<(), RadioError> {
        self.resets += 1;
        self.busy = false;
        self.staged.clear();
        self.ready.clear();
        Ok(())
    }

    fn join(&mut self) -> Result<(), RadioError> {
        self.joins += 1;
        if let Some(err) = self.fail_join {
            return Err(err);
        }
        self.staged.push_back(RadioEvent::JoinStarted);
        match self.auto_join {
            Some(true) => self.staged.push_back(RadioEvent::Joined),
            Some(false) => self.staged.push_back(RadioEvent::JoinFailed),
            None => {}
        }
        Ok(())
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        if let Some(err) = self.fail_transmit {
            return Err(err);
        }
        if self.busy {
            return Err(RadioError::Busy);
        }
        self.frames.push(frame.to_vec());
        self.busy = true;
        self.staged.push_back(RadioEvent::TxStarted);
        if let Some(report) = self.auto_complete {
            self.staged.push_back(RadioEvent::TxComplete(report));
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.busy
    }

    fn run_once(&mut self) {
        self.run_calls += 1;
        self.ready.extend(self.staged.drain(..));
    }

    fn poll_event(&mut self) -> Option<RadioEvent> {
        let event = self.ready.pop_front()?;
        if matches!(event, RadioEvent::TxComplete(_) | RadioEvent::TxCanceled) {
            self.busy = false;
        }
        Some(event)
    }
}

// ============================================================================
// Network
// ============================================================================

/// Mock network stack.
///
/// # Example
///
/// ```rust
/// use allsky_node::config::WifiConfig;
/// use allsky_node::error::ConnectFailure;
/// use allsky_node::hal::MockNetwork;
/// use allsky_node::traits::NetworkStack;
///
/// let mut net = MockNetwork::new();
/// net.connect_results.push_back(Err(ConnectFailure::Timeout));
/// assert_eq!(net.connect(&WifiConfig::default()), Err(ConnectFailure::Timeout));
/// assert_eq!(net.connect(&WifiConfig::default()), Ok(()));
/// assert_eq!(net.connects, 2);
/// ```
#[derive(Debug, Default)]
pub struct MockNetwork {
    /// Results returned by successive `connect()` calls; `Ok` once empty.
    pub connect_results: VecDeque<Result<(), ConnectFailure>>,
    /// Link state.
    pub connected: bool,
    /// Route currently served, if the responder is running.
    pub responder: Option<String>,
    /// Make `start_responder()` fail while set.
    pub fail_responder: bool,
    /// Number of `connect()` calls.
    pub connects: usize,
    /// Number of `disconnect()` calls.
    pub disconnects: usize,
    /// Bodies returned to clients, in order.
    pub responses: Vec<String>,
    pending_queries: usize,
}

impl MockNetwork {
    /// Creates a disconnected mock stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a client requesting the status route.
    pub fn queue_query(&mut self) {
        self.pending_queries += 1;
    }

    /// Simulate the access point going away.
    pub fn drop_link(&mut self) {
        self.connected = false;
    }

    /// Queries waiting to be answered.
    pub fn pending_queries(&self) -> usize {
        self.pending_queries
    }
}

impl NetworkStack for MockNetwork {
    fn connect(&mut self, _config: &WifiConfig) -> Result<(), ConnectFailure> {
        self.connects += 1;
        let result = self.connect_results.pop_front().unwrap_or(Ok(()));
        self.connected = result.is_ok();
        result
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn start_responder(&mut self, route: &str) -> Result<(), NetworkError> {
        if self.fail_responder {
            return Err(NetworkError::ResponderUnavailable);
        }
        self.responder = Some(route.into());
        Ok(())
    }

    fn stop_responder(&mut self) {
        self.responder = None;
    }

    fn poll(&mut self, render: &mut dyn FnMut() -> StatusBody) -> usize {
        if !self.connected || self.responder.is_none() {
            return 0;
        }
        let served = core::mem::take(&mut self.pending_queries);
        for _ in 0..served {
            self.responses.push(render().as_str().into());
        }
        served
    }
}

// ============================================================================
// Sensors, clock and display
// ============================================================================

/// Mock sensor subsystem returning a fixed template.
#[derive(Debug)]
pub struct MockSensors {
    /// Returned by every capture, with `uptime_seconds` overwritten.
    pub snapshot: SensorSnapshot,
    /// Number of captures taken.
    pub captures: usize,
}

impl MockSensors {
    /// Creates a source with plausible night-time readings, all valid.
    pub fn new() -> Self {
        Self {
            snapshot: SensorSnapshot {
                rain_intensity: 0,
                wind_speed: 2.5,
                sky_temperature: -18.5,
                ambient_temperature: 9.25,
                sky_quality: SkyQuality::new(120, 480, 0.75),
                uptime_seconds: 0,
                battery_mv: 3_950,
                validity: SensorValidity::all(),
            },
            captures: 0,
        }
    }

    /// Use `snapshot` as the template.
    pub fn with_snapshot(mut self, snapshot: SensorSnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }
}

impl Default for MockSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for MockSensors {
    fn capture(&mut self, uptime_seconds: u32) -> SensorSnapshot {
        self.captures += 1;
        SensorSnapshot {
            uptime_seconds,
            ..self.snapshot
        }
    }
}

/// Mock clock for testing.
///
/// ```rust
/// use allsky_node::hal::MockClock;
/// use allsky_node::traits::Clock;
///
/// let mut clock = MockClock::new();
/// clock.set(1000);
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

/// Mock display recording every frame pushed to it.
#[derive(Debug)]
pub struct MockDisplay {
    /// Every `show()` call, oldest first.
    pub frames: Vec<Vec<String>>,
    /// Panel power state.
    pub awake: bool,
}

impl MockDisplay {
    /// Creates a powered-on display with no frames.
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            awake: true,
        }
    }

    /// The most recent frame.
    pub fn last_frame(&self) -> Option<&[String]> {
        self.frames.last().map(Vec::as_slice)
    }
}

impl Default for MockDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusDisplay for MockDisplay {
    type Error = ();

    fn show(&mut self, lines: &[&str]) -> Result<(), ()> {
        self.frames.push(lines.iter().map(|l| String::from(*l)).collect());
        Ok(())
    }

    fn set_awake(&mut self, awake: bool) -> Result<(), ()> {
        self.awake = awake;
        Ok(())
    }
}
