//! Button press classification.
//!
//! Held duration maps onto four non-overlapping bands (defaults shown):
//!
//! ```text
//!   0 ──── 100 ─────────── 999 ─── 3000 ─────────── 8000 ──── ∞
//!   ignored │ ForceRadioJoin │ (none) │ EnableFallback │ Restart
//! ```
//!
//! Both edges of the short band and the lower edge of the long and very long
//! bands are inclusive. Durations between the short and long bands yield no
//! command, so a hesitant press never triggers the wrong action.

use tracing::debug;

use crate::config::ButtonConfig;

/// Discrete command produced by a button press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeCommand {
    /// Join the wide-area radio network now.
    ForceRadioJoin,
    /// Switch to the local network transport.
    EnableNetworkFallback,
    /// Reboot the device.
    Restart,
}

/// Duration between a debounced press and the matching debounced release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonPressEvent {
    /// Held time in milliseconds.
    pub duration_ms: u32,
}

impl ButtonPressEvent {
    /// Creates an event from a held duration.
    pub const fn new(duration_ms: u32) -> Self {
        Self { duration_ms }
    }
}

/// Synchronous, non-blocking press classifier.
///
/// # Example
///
/// ```rust
/// use allsky_node::button::{ButtonCommandInterpreter, ButtonPressEvent, NodeCommand};
/// use allsky_node::config::ButtonConfig;
///
/// let interp = ButtonCommandInterpreter::new(ButtonConfig::default());
/// assert_eq!(
///     interp.classify(ButtonPressEvent::new(500)),
///     Some(NodeCommand::ForceRadioJoin)
/// );
/// assert_eq!(interp.classify(ButtonPressEvent::new(40)), None);
/// ```
#[derive(Clone, Debug)]
pub struct ButtonCommandInterpreter {
    bands: ButtonConfig,
}

impl Default for ButtonCommandInterpreter {
    fn default() -> Self {
        Self::new(ButtonConfig::default())
    }
}

impl ButtonCommandInterpreter {
    /// Creates an interpreter for the given bands.
    ///
    /// Bands are expected to be validated with [`ButtonConfig::validate`].
    pub fn new(bands: ButtonConfig) -> Self {
        Self { bands }
    }

    /// Classify one completed press.
    pub fn classify(&self, press: ButtonPressEvent) -> Option<NodeCommand> {
        let d = press.duration_ms;
        let b = &self.bands;

        let command = if d < b.min_press_ms {
            None
        } else if d <= b.short_max_ms {
            Some(NodeCommand::ForceRadioJoin)
        } else if d < b.long_ms {
            None
        } else if d < b.very_long_ms {
            Some(NodeCommand::EnableNetworkFallback)
        } else {
            Some(NodeCommand::Restart)
        };

        debug!(duration_ms = d, ?command, "button press classified");
        command
    }

    /// Bands in use.
    pub fn bands(&self) -> &ButtonConfig {
        &self.bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(ms: u32) -> Option<NodeCommand> {
        ButtonCommandInterpreter::default().classify(ButtonPressEvent::new(ms))
    }

    #[test]
    fn short_press_forces_join() {
        assert_eq!(classify(500), Some(NodeCommand::ForceRadioJoin));
    }

    #[test]
    fn long_press_enables_fallback() {
        assert_eq!(classify(4_000), Some(NodeCommand::EnableNetworkFallback));
    }

    #[test]
    fn very_long_press_restarts() {
        assert_eq!(classify(9_000), Some(NodeCommand::Restart));
    }

    #[test]
    fn below_minimum_ignored() {
        for ms in [0, 1, 50, 99] {
            assert_eq!(classify(ms), None, "{ms} ms");
        }
    }

    #[test]
    fn band_edges() {
        assert_eq!(classify(100), Some(NodeCommand::ForceRadioJoin));
        assert_eq!(classify(999), Some(NodeCommand::ForceRadioJoin));
        assert_eq!(classify(1_000), None);
        assert_eq!(classify(2_999), None);
        assert_eq!(classify(3_000), Some(NodeCommand::EnableNetworkFallback));
        assert_eq!(classify(7_999), Some(NodeCommand::EnableNetworkFallback));
        assert_eq!(classify(8_000), Some(NodeCommand::Restart));
        assert_eq!(classify(u32::MAX), Some(NodeCommand::Restart));
    }

    #[test]
    fn custom_bands() {
        let interp =
            ButtonCommandInterpreter::new(ButtonConfig::default().with_bands(20, 500, 501, 2_000));
        assert_eq!(
            interp.classify(ButtonPressEvent::new(501)),
            Some(NodeCommand::EnableNetworkFallback)
        );
    }
}
