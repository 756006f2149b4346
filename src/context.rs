//! Owned device state passed to every component's `tick`.
//!
//! Counters, the latest snapshot and the display buffer live here instead of
//! in globals. The context is volatile: everything is reinitialized on boot.

use heapless::{String, Vec};

use crate::config::NodeConfig;
use crate::failure::FailureTracker;
use crate::snapshot::{LinkQuality, SensorSnapshot};
use crate::traits::{StatusDisplay, DISPLAY_LINES};

/// Characters per display line.
pub const LINE_LEN: usize = 24;

/// One display line.
pub type Line = String<LINE_LEN>;

/// Radio session counters surfaced on the display and in the status document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionStats {
    /// Session currently joined.
    pub joined: bool,
    /// Join attempts started since boot.
    pub join_attempts: u32,
    /// Timestamp of the most recent join attempt.
    pub last_join_attempt_ms: Option<u64>,
    /// Completed uplinks since boot.
    pub tx_count: u32,
    /// Link quality reported with the last completed uplink.
    pub last_link: Option<LinkQuality>,
    /// Uplinks acknowledged by the network.
    pub acks: u32,
    /// Total downlink payload bytes received.
    pub downlink_bytes: u32,
}

/// Pending screen contents plus wake/sleep bookkeeping.
///
/// Producers write lines here; a [`StatusDisplay`] is updated only from
/// [`flush`](Self::flush), so rendering never happens inside a component.
#[derive(Clone, Debug)]
pub struct DisplayBuffer {
    lines: Vec<Line, DISPLAY_LINES>,
    dirty: bool,
    awake: bool,
    power_changed: bool,
    keep_awake: bool,
    pinned: bool,
    last_activity_ms: u64,
    timeout_ms: u64,
}

impl DisplayBuffer {
    /// Creates an awake, empty buffer.
    pub fn new(timeout_ms: u64, now_ms: u64) -> Self {
        Self {
            lines: Vec::new(),
            dirty: false,
            awake: true,
            power_changed: false,
            keep_awake: false,
            pinned: false,
            last_activity_ms: now_ms,
            timeout_ms,
        }
    }

    /// Show a user-facing message and wake the display.
    pub fn show(&mut self, lines: &[&str], now_ms: u64) {
        if self.set_lines(lines) {
            self.wake(now_ms);
        }
    }

    /// Refresh contents without counting as activity.
    ///
    /// Used by the periodic diagnostics redraw so it does not keep the panel
    /// lit forever.
    pub fn refresh(&mut self, lines: &[&str]) {
        self.set_lines(lines);
    }

    /// Show a message that nothing can overwrite and keep the panel on.
    pub fn pin(&mut self, lines: &[&str], now_ms: u64) {
        self.set_lines(lines);
        self.pinned = true;
        self.keep_awake = true;
        self.wake(now_ms);
    }

    /// Register activity (button press, uplink start).
    pub fn wake(&mut self, now_ms: u64) {
        self.last_activity_ms = now_ms;
        if !self.awake {
            self.awake = true;
            self.power_changed = true;
        }
    }

    /// Disable the sleep timeout (used while the fallback transport is up).
    pub fn set_keep_awake(&mut self, keep: bool, now_ms: u64) {
        self.keep_awake = keep || self.pinned;
        if keep {
            self.wake(now_ms);
        }
    }

    /// Apply the sleep timeout.
    pub fn tick(&mut self, now_ms: u64) {
        if self.awake
            && !self.keep_awake
            && now_ms.saturating_sub(self.last_activity_ms) >= self.timeout_ms
        {
            self.awake = false;
            self.power_changed = true;
        }
    }

    /// Push pending changes to `display`.
    pub fn flush<D: StatusDisplay>(&mut self, display: &mut D) -> Result<(), D::Error> {
        if self.power_changed {
            display.set_awake(self.awake)?;
            self.power_changed = false;
        }
        if self.dirty && self.awake {
            let lines: Vec<&str, DISPLAY_LINES> = self.lines.iter().map(|l| l.as_str()).collect();
            display.show(&lines)?;
            self.dirty = false;
        }
        Ok(())
    }

    /// Current lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.as_str())
    }

    /// Whether the panel should be on.
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Whether a fatal message is pinned.
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    fn set_lines(&mut self, lines: &[&str]) -> bool {
        if self.pinned {
            return false;
        }
        let mut next: Vec<Line, DISPLAY_LINES> = Vec::new();
        for line in lines.iter().take(DISPLAY_LINES) {
            let _ = next.push(truncate_line(line));
        }
        if next != self.lines {
            self.lines = next;
            self.dirty = true;
        }
        true
    }
}

/// Clip a string to one display line on a char boundary.
pub fn truncate_line(s: &str) -> Line {
    let mut line = Line::new();
    for c in s.chars() {
        if line.push(c).is_err() {
            break;
        }
    }
    line
}

/// All mutable node state outside the transport managers.
#[derive(Clone, Debug)]
pub struct DeviceContext {
    /// Consecutive cycle failure accounting.
    pub failures: FailureTracker,
    /// Radio session counters.
    pub stats: SessionStats,
    /// Most recent sensor capture.
    pub latest: Option<SensorSnapshot>,
    /// Screen contents and power state.
    pub display: DisplayBuffer,
    boot_ms: u64,
}

impl DeviceContext {
    /// Fresh boot-time context.
    pub fn new(failure_threshold: u32, boot_ms: u64) -> Self {
        Self {
            failures: FailureTracker::new(failure_threshold),
            stats: SessionStats::default(),
            latest: None,
            display: DisplayBuffer::new(crate::config::DisplayConfig::default().timeout_ms, boot_ms),
            boot_ms,
        }
    }

    /// Context sized from configuration.
    pub fn from_config(config: &NodeConfig, boot_ms: u64) -> Self {
        Self {
            failures: FailureTracker::new(config.cycle.failure_threshold),
            stats: SessionStats::default(),
            latest: None,
            display: DisplayBuffer::new(config.display.timeout_ms, boot_ms),
            boot_ms,
        }
    }

    /// Whole seconds since boot, saturating.
    pub fn uptime_seconds(&self, now_ms: u64) -> u32 {
        u32::try_from(now_ms.saturating_sub(self.boot_ms) / 1000).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockDisplay;

    #[test]
    fn show_marks_dirty_and_flushes_once() {
        let mut buf = DisplayBuffer::new(10_000, 0);
        let mut display = MockDisplay::new();
        buf.show(&["JOINED!", "TX Count: 0"], 0);
        buf.flush(&mut display).unwrap();
        buf.flush(&mut display).unwrap();
        assert_eq!(display.frames.len(), 1);
        assert_eq!(display.frames[0], ["JOINED!", "TX Count: 0"]);
    }

    #[test]
    fn identical_lines_not_redrawn() {
        let mut buf = DisplayBuffer::new(10_000, 0);
        let mut display = MockDisplay::new();
        buf.show(&["A"], 0);
        buf.flush(&mut display).unwrap();
        buf.refresh(&["A"]);
        buf.flush(&mut display).unwrap();
        assert_eq!(display.frames.len(), 1);
    }

    #[test]
    fn sleeps_after_timeout_and_wakes_on_activity() {
        let mut buf = DisplayBuffer::new(10_000, 0);
        let mut display = MockDisplay::new();
        buf.tick(9_999);
        assert!(buf.is_awake());
        buf.tick(10_000);
        assert!(!buf.is_awake());
        buf.flush(&mut display).unwrap();
        assert!(!display.awake);

        buf.wake(12_000);
        buf.flush(&mut display).unwrap();
        assert!(display.awake);
        buf.tick(21_999);
        assert!(buf.is_awake());
    }

    #[test]
    fn refresh_does_not_extend_timeout() {
        let mut buf = DisplayBuffer::new(1_000, 0);
        buf.refresh(&["x"]);
        buf.tick(1_000);
        assert!(!buf.is_awake());
    }

    #[test]
    fn keep_awake_suppresses_timeout() {
        let mut buf = DisplayBuffer::new(1_000, 0);
        buf.set_keep_awake(true, 0);
        buf.tick(50_000);
        assert!(buf.is_awake());
        buf.set_keep_awake(false, 50_000);
        buf.tick(51_000);
        assert!(!buf.is_awake());
    }

    #[test]
    fn pinned_message_cannot_be_replaced() {
        let mut buf = DisplayBuffer::new(1_000, 0);
        buf.pin(&["ERROR", "No radio config"], 0);
        buf.show(&["JOINED!"], 10);
        buf.set_keep_awake(false, 10);
        buf.tick(100_000);
        assert!(buf.is_awake());
        assert_eq!(buf.lines().next(), Some("ERROR"));
    }

    #[test]
    fn long_lines_truncated() {
        let line = truncate_line("0123456789012345678901234567890");
        assert_eq!(line.len(), LINE_LEN);
    }

    #[test]
    fn uptime_relative_to_boot() {
        let ctx = DeviceContext::new(10, 5_000);
        assert_eq!(ctx.uptime_seconds(4_000), 0);
        assert_eq!(ctx.uptime_seconds(65_999), 60);
    }
}
