//! Consecutive transmission-cycle failure accounting.

use tracing::{debug, warn};

/// Default number of consecutive failed cycles before fallback is requested.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 10;

/// Signal raised when the consecutive-failure run reaches the threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureSignal {
    /// Request an automatic switch to the network fallback transport.
    CycleFailureThresholdReached {
        /// Counter value at the time of the crossing.
        failures: u32,
    },
}

/// Counts consecutive failed transmission cycles.
///
/// A join failure, a transmit cancellation and a transmit timeout all count
/// as failed cycles. The threshold signal fires once per uninterrupted run:
/// after it fires, further failures keep counting but stay silent until a
/// success or an explicit [`reset`](Self::reset) starts a new run.
///
/// # Example
///
/// ```rust
/// use allsky_node::failure::{FailureTracker, FailureSignal};
///
/// let mut tracker = FailureTracker::new(3);
/// assert_eq!(tracker.record_outcome(false), None);
/// assert_eq!(tracker.record_outcome(false), None);
/// assert_eq!(
///     tracker.record_outcome(false),
///     Some(FailureSignal::CycleFailureThresholdReached { failures: 3 })
/// );
/// assert_eq!(tracker.record_outcome(false), None);
/// ```
#[derive(Clone, Debug)]
pub struct FailureTracker {
    count: u32,
    threshold: u32,
    latched: bool,
    fallback_active: bool,
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

impl FailureTracker {
    /// Creates a tracker with the given threshold. A threshold of zero is
    /// treated as one.
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold: threshold.max(1),
            latched: false,
            fallback_active: false,
        }
    }

    /// Record the outcome of one cycle.
    ///
    /// Returns a signal only on the failure that first reaches the threshold
    /// while fallback is not already active.
    pub fn record_outcome(&mut self, success: bool) -> Option<FailureSignal> {
        if success {
            if self.count > 0 {
                debug!(previous = self.count, "cycle succeeded, failure run cleared");
            }
            self.count = 0;
            self.latched = false;
            return None;
        }

        self.count = self.count.saturating_add(1);
        debug!(failures = self.count, threshold = self.threshold, "cycle failed");

        if self.latched || self.fallback_active || self.count < self.threshold {
            return None;
        }

        self.latched = true;
        warn!(failures = self.count, "consecutive failure threshold reached");
        Some(FailureSignal::CycleFailureThresholdReached {
            failures: self.count,
        })
    }

    /// Clear the counter and re-arm the signal.
    pub fn reset(&mut self) {
        self.count = 0;
        self.latched = false;
    }

    /// Tell the tracker whether fallback is currently active so it does not
    /// request it twice.
    pub fn set_fallback_active(&mut self, active: bool) {
        self.fallback_active = active;
    }

    /// Consecutive failures since the last success or reset.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Configured threshold.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Whether fallback is flagged as active.
    pub fn fallback_active(&self) -> bool {
        self.fallback_active
    }
}
