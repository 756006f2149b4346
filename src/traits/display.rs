//! Display abstraction for short status text.
//!
//! The node only ever shows a handful of short lines (state, counters, link
//! quality), so the trait is text-only. Layout is the implementor's choice.

/// Maximum number of lines the node sends in one update.
pub const DISPLAY_LINES: usize = 4;

/// Display trait for rendering status text.
///
/// Implementors provide hardware-specific rendering for displays like
/// SSD1306 OLED, character LCDs, or simulated displays for testing.
///
/// # Example
///
/// ```ignore
/// use allsky_node::traits::StatusDisplay;
///
/// struct SerialConsole;
///
/// impl StatusDisplay for SerialConsole {
///     type Error = ();
///
///     fn show(&mut self, lines: &[&str]) -> Result<(), ()> {
///         for line in lines {
///             println!("{line}");
///         }
///         Ok(())
///     }
///     fn set_awake(&mut self, _awake: bool) -> Result<(), ()> { Ok(()) }
/// }
/// ```
pub trait StatusDisplay {
    /// Error type for display operations.
    type Error;

    /// Replace the screen contents with up to [`DISPLAY_LINES`] lines.
    fn show(&mut self, lines: &[&str]) -> Result<(), Self::Error>;

    /// Power the panel up or down. Contents survive a sleep.
    fn set_awake(&mut self, awake: bool) -> Result<(), Self::Error>;
}
