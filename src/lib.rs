//! # allsky-node
//!
//! Firmware core for an all-sky weather telemetry node that reports over a
//! LoRaWAN radio link and falls back to a local Wi-Fi status endpoint.
//!
//! ## Features
//!
//! - **Hardware abstraction**: Traits for the radio MAC, network stack, sensors and display
//! - **Mutually exclusive transports**: Radio and Wi-Fi never touch the shared hardware at once
//! - **Automatic fallback**: Consecutive failed uplink cycles hand over to Wi-Fi
//! - **Single-button control**: Short press joins, long press enables Wi-Fi, very long press restarts
//! - **Compact uplink**: 30-byte big-endian telemetry frame
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Radio, network, sensor and display abstractions
//! - `radio` - Join/uplink session lifecycle with retry and quiesce
//! - `fallback` - Wi-Fi connection, status responder and link watch
//! - `controller` - Mode state machine that ties everything together
//! - `hal` - Concrete implementations (mock for testing, esp32 for hardware)
//! - `services` - Query bridge and desktop HTTP responder (std only)
//!
//! ## Example
//!
//! ```rust
//! use allsky_node::{
//!     ButtonPressEvent, DeviceContext, NodeConfig, RadioConfig, SystemMode,
//!     TransportModeController,
//!     hal::{MockNetwork, MockRadio, MockSensors},
//! };
//!
//! let config = NodeConfig::default()
//!     .with_radio(RadioConfig::default().with_keys([1; 8], [2; 8], [3; 16]));
//! let mut ctx = DeviceContext::from_config(&config, 0);
//!
//! let mut radio = MockRadio::new();
//! radio.auto_join = Some(true);
//! let mut node = TransportModeController::new(
//!     &config,
//!     radio,
//!     MockNetwork::new(),
//!     MockSensors::new(),
//!     &mut ctx,
//!     0,
//! )
//! .unwrap();
//!
//! // Short press: join the radio network
//! node.tick(&mut ctx, 10, Some(ButtonPressEvent::new(400)));
//! node.tick(&mut ctx, 20, None);
//! assert_eq!(node.mode(), SystemMode::RadioActive);
//! assert!(ctx.stats.joined);
//!
//! // Long press: hand over to Wi-Fi
//! node.tick(&mut ctx, 30, Some(ButtonPressEvent::new(3_500)));
//! assert_eq!(node.mode(), SystemMode::NetworkFallback);
//! assert_eq!(node.armed_transports(), 1);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Capped exponential backoff for join retries.
pub mod backoff;
/// Button press classification into node commands.
pub mod button;
/// Shared configuration system for desktop and ESP32.
pub mod config;
/// Process-wide session state and the status display buffer.
pub mod context;
/// Top-level transport mode controller.
pub mod controller;
/// Status screens derived from controller and session state.
pub mod diagnostics;
/// Error types.
pub mod error;
/// Consecutive cycle failure accounting.
pub mod failure;
/// Wi-Fi fallback transport manager.
pub mod fallback;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Interrupt-side input capture (button edges, wind pulses).
pub mod isr;
/// Telemetry frame encoding and decoding.
pub mod payload;
/// Radio session lifecycle.
pub mod radio;
/// Sensor snapshot types.
pub mod snapshot;
/// Status document served over the fallback transport.
pub mod status;
/// Core traits for hardware, radio and network abstraction.
pub mod traits;

/// Query bridge and desktop status responder (std only).
#[cfg(feature = "std")]
pub mod services;

// Re-exports for convenience
pub use button::{ButtonCommandInterpreter, ButtonPressEvent, NodeCommand};
pub use context::{DeviceContext, DisplayBuffer, SessionStats};
pub use controller::{CommandOutcome, SystemMode, TickReport, TransportModeController};
pub use error::{ConfigError, ConnectFailure, FrameError, NetworkError, NodeError, RadioError};
pub use failure::{FailureSignal, FailureTracker};
pub use fallback::NetworkFallbackManager;
pub use payload::{PayloadCodec, TelemetryFrame, FRAME_LEN};
pub use radio::{QuiesceStatus, RadioSessionManager, RadioSessionState};
pub use snapshot::{LinkQuality, SensorSnapshot, SensorValidity, SkyQuality};
pub use status::{StatusBody, StatusReport};
pub use traits::{
    // Hardware
    Clock,
    // Network
    NetworkStack,
    // Radio
    RadioEvent,
    RadioMac,
    SensorSource,
    // Display
    StatusDisplay,
    TxReport,
};

// Config re-exports
pub use config::{
    BackoffConfig, ButtonConfig, CycleConfig, DeviceConfig, DisplayConfig, NodeConfig,
    RadioConfig, StatusConfig, WifiConfig,
};
