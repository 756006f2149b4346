//! Trait definitions for hardware, radio and network abstraction.
//!
//! This module defines the core abstractions that allow the node to:
//! - Run on different hardware (ESP32, desktop mock)
//! - Drive any radio MAC that exposes join/transmit and an event stream
//! - Use different network stacks for the fallback transport
//!
//! # Submodules
//!
//! - `hardware`: Clock and sensor subsystem
//! - `radio`: Radio MAC stack and its events
//! - `network`: Fallback network stack
//! - `display`: Status display

pub mod display;
pub mod hardware;
pub mod network;
pub mod radio;

pub use display::*;
pub use hardware::*;
pub use network::*;
pub use radio::*;
