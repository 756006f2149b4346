//! Hardware abstraction traits for timekeeping and sensor acquisition.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`Clock`] | Monotonic millisecond time source |
//! | [`SensorSource`] | Produces a [`SensorSnapshot`] on demand |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. For ESP32 hardware, use the
//! implementations from `hal::esp32` (requires `esp32` feature).

use crate::snapshot::SensorSnapshot;

/// Time source trait for `no_std` compatibility.
///
/// Provides monotonic time in milliseconds for cycle scheduling and
/// timeouts. On desktop, this can wrap `std::time::Instant`. On embedded,
/// use a hardware timer.
///
/// # Example
///
/// ```rust
/// use allsky_node::traits::Clock;
/// use allsky_node::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}

/// The sensor subsystem, seen from the transport core.
///
/// Acquisition and calibration are entirely the implementor's concern.
/// A probe that fails to respond must not return an error: clear its bit in
/// [`SensorSnapshot::validity`] and carry on.
///
/// # Example
///
/// ```rust
/// use allsky_node::traits::SensorSource;
/// use allsky_node::hal::MockSensors;
///
/// let mut sensors = MockSensors::new();
/// let snapshot = sensors.capture(42);
/// assert_eq!(snapshot.uptime_seconds, 42);
/// ```
pub trait SensorSource {
    /// Read every sensor and return an immutable snapshot stamped with
    /// `uptime_seconds`.
    fn capture(&mut self, uptime_seconds: u32) -> SensorSnapshot;
}

impl<T: SensorSource + ?Sized> SensorSource for &mut T {
    fn capture(&mut self, uptime_seconds: u32) -> SensorSnapshot {
        (**self).capture(uptime_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u16);

    impl SensorSource for Fixed {
        fn capture(&mut self, uptime_seconds: u32) -> SensorSnapshot {
            SensorSnapshot {
                rain_intensity: self.0,
                uptime_seconds,
                ..Default::default()
            }
        }
    }

    #[test]
    fn sensor_source_through_mut_ref() {
        let mut inner = Fixed(7);
        let mut by_ref = &mut inner;
        let s = SensorSource::capture(&mut by_ref, 3);
        assert_eq!(s.rain_intensity, 7);
        assert_eq!(s.uptime_seconds, 3);
    }
}
