//! SSD1306 OLED display implementation for ESP32.
//!
//! Renders the four status lines produced by the node's display buffer.
//!
//! # Wiring
//!
//! - SDA → GPIO4
//! - SCL → GPIO15
//! - RST → GPIO16 (pulse low before init)

use crate::traits::{StatusDisplay, DISPLAY_LINES};
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use esp_idf_hal::i2c::I2cDriver;
use ssd1306::{mode::BufferedGraphicsMode, prelude::*, I2CDisplayInterface, Ssd1306};

/// SSD1306 display type alias for cleaner code.
type DisplayDriver<'d> = Ssd1306<
    I2CInterface<I2cDriver<'d>>,
    DisplaySize128x64,
    BufferedGraphicsMode<DisplaySize128x64>,
>;

/// Vertical distance between text lines, in pixels.
const LINE_PITCH: i32 = 16;

/// SSD1306 OLED display for ESP32.
///
/// # Display Layout
///
/// ```text
/// ┌────────────────────────────┐
/// │JOINED!                     │
/// │TX Count: 42                │
/// │RSSI: -97 dBm               │
/// │Fails: 0                    │
/// └────────────────────────────┘
/// ```
pub struct Esp32Display<'d> {
    display: DisplayDriver<'d>,
}

impl<'d> Esp32Display<'d> {
    /// Creates and initializes a display on `i2c`.
    ///
    /// # Errors
    ///
    /// Returns an error if display initialization fails.
    pub fn new(i2c: I2cDriver<'d>) -> Result<Self, DisplayError> {
        let interface = I2CDisplayInterface::new(i2c);
        let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        display.init()?;
        display.clear(BinaryColor::Off)?;
        display.flush()?;

        Ok(Self { display })
    }
}

impl StatusDisplay for Esp32Display<'_> {
    type Error = DisplayError;

    fn show(&mut self, lines: &[&str]) -> Result<(), Self::Error> {
        self.display.clear(BinaryColor::Off)?;

        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        for (row, line) in lines.iter().take(DISPLAY_LINES).enumerate() {
            let y = row as i32 * LINE_PITCH;
            Text::with_baseline(line, Point::new(0, y), style, Baseline::Top)
                .draw(&mut self.display)?;
        }

        self.display.flush()?;
        Ok(())
    }

    fn set_awake(&mut self, awake: bool) -> Result<(), Self::Error> {
        self.display.set_display_on(awake)?;
        Ok(())
    }
}

/// Display error type.
#[derive(Debug)]
pub struct DisplayError;

impl From<display_interface::DisplayError> for DisplayError {
    fn from(_: display_interface::DisplayError) -> Self {
        DisplayError
    }
}
