//! ESP32 hardware abstraction layer for the all-sky node.
//!
//! # Hardware Configuration
//!
//! - **Board**: Heltec WiFi LoRa 32 V2 (ESP32 + SX1276)
//! - **Button**: single push button, active low, internal pull-up
//! - **Anemometer**: reed-switch pulse output, one pulse per 0.1 m/s per second
//! - **Display**: SSD1306 128x64 OLED (I2C)
//!
//! # Pin Assignments
//!
//! See the [`pins`] module for GPIO assignments.

mod button;
mod clock;

pub use button::{Esp32Anemometer, Esp32Button};
pub use clock::Esp32Clock;

#[cfg(feature = "display")]
mod display;
#[cfg(feature = "display")]
pub use display::{DisplayError, Esp32Display};

#[cfg(feature = "wifi")]
mod wifi;
#[cfg(feature = "wifi")]
pub use wifi::Esp32Network;

/// Pin assignments for the Heltec WiFi LoRa 32 V2 board.
///
/// The LoRa transceiver pins (SPI on GPIO5/19/27, CS 18, RST 14, DIO 26/33)
/// are hardwired and owned by the MAC stack.
pub mod pins {
    // =========================================================================
    // Inputs
    // =========================================================================

    /// PRG button (active low)
    pub const BUTTON: i32 = 0;

    /// Anemometer pulse input (input-only pin, optocoupled)
    pub const WIND: i32 = 34;

    /// Rain sensor analog output (ADC1_CH0, behind a divider)
    pub const RAIN_ADC: i32 = 36;

    // =========================================================================
    // Display (internal I2C bus)
    // =========================================================================

    /// OLED data line
    pub const OLED_SDA: i32 = 4;

    /// OLED clock line
    pub const OLED_SCL: i32 = 15;

    /// OLED reset line
    pub const OLED_RST: i32 = 16;

    /// Default I2C address for SSD1306 OLED
    pub const OLED_I2C_ADDR: u8 = 0x3C;

    // =========================================================================
    // Sensors (external I2C bus)
    // =========================================================================

    /// Sensor bus data line
    pub const SENSOR_SDA: i32 = 21;

    /// Sensor bus clock line
    pub const SENSOR_SCL: i32 = 22;
}
