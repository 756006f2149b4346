//! Field-test screens: what the node is doing, at a glance.
//!
//! Redrawn at a bounded rate (`display.refresh_ms`, 2 Hz by default) and
//! immediately whenever the mode or radio state changes. Action feedback
//! shown by the controller holds the screen for a short while before the
//! diagnostics take over again.

use core::fmt::Write;

use crate::context::{truncate_line, DeviceContext, Line};
use crate::controller::SystemMode;
use crate::radio::RadioSessionState;
use crate::traits::DISPLAY_LINES;

/// How long action feedback stays on screen.
pub const MESSAGE_HOLD_MS: u64 = 2_000;

/// Inputs to one diagnostics screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenKey {
    /// Transport mode.
    pub mode: SystemMode,
    /// Radio session state.
    pub radio: RadioSessionState,
    /// Whether the fallback transport is serving.
    pub fallback_up: bool,
}

/// Rate-limited diagnostics renderer.
#[derive(Clone, Debug)]
pub struct Diagnostics {
    refresh_ms: u64,
    last_refresh_ms: Option<u64>,
    last_key: Option<ScreenKey>,
    hold_until_ms: u64,
}

impl Diagnostics {
    /// Creates a renderer with the given redraw interval.
    pub fn new(refresh_ms: u64) -> Self {
        Self {
            refresh_ms,
            last_refresh_ms: None,
            last_key: None,
            hold_until_ms: 0,
        }
    }

    /// Keep diagnostics off the screen until `now_ms + MESSAGE_HOLD_MS`.
    pub fn hold(&mut self, now_ms: u64) {
        self.hold_until_ms = now_ms.saturating_add(MESSAGE_HOLD_MS);
        self.last_key = None;
    }

    /// Redraw into the context's display buffer if due.
    pub fn update(&mut self, ctx: &mut DeviceContext, key: ScreenKey, now_ms: u64, ssid: &str) {
        if now_ms < self.hold_until_ms {
            return;
        }
        let changed = self.last_key != Some(key);
        let due = self
            .last_refresh_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.refresh_ms);
        if !changed && !due {
            return;
        }

        self.last_key = Some(key);
        self.last_refresh_ms = Some(now_ms);

        let lines = screen(ctx, key, ssid);
        let refs: heapless::Vec<&str, DISPLAY_LINES> =
            lines.iter().map(|l| l.as_str()).filter(|l| !l.is_empty()).collect();
        if changed {
            ctx.display.show(&refs, now_ms);
        } else {
            ctx.display.refresh(&refs);
        }
    }
}

macro_rules! fmt_line {
    ($($arg:tt)*) => {{
        let mut l = Line::new();
        let _ = write!(l, $($arg)*);
        l
    }};
}

/// Build the four lines for `key`.
pub fn screen(ctx: &DeviceContext, key: ScreenKey, ssid: &str) -> [Line; DISPLAY_LINES] {
    let stats = &ctx.stats;
    let rssi = stats.last_link.map(|l| l.rssi);

    match key.mode {
        SystemMode::Switching => [
            fmt_line!("SWITCHING"),
            fmt_line!("Stopping transport"),
            Line::new(),
            Line::new(),
        ],
        SystemMode::NetworkFallback if key.fallback_up => [
            fmt_line!("WIFI FALLBACK"),
            truncate_line(ssid),
            fmt_line!("Fails: {}", ctx.failures.count()),
            fmt_line!("BTN: radio join"),
        ],
        SystemMode::NetworkFallback => [
            fmt_line!("WIFI FALLBACK MODE"),
            fmt_line!("Radio idle"),
            fmt_line!("BTN: Force join"),
            fmt_line!("Hold 3s: WiFi"),
        ],
        SystemMode::RadioActive => match key.radio {
            RadioSessionState::Idle => [
                fmt_line!("RADIO IDLE"),
                fmt_line!("BTN: Force join"),
                Line::new(),
                Line::new(),
            ],
            RadioSessionState::Joining => [
                fmt_line!("JOINING ({})", stats.join_attempts),
                fmt_line!("Attempting OTAA..."),
                Line::new(),
                Line::new(),
            ],
            RadioSessionState::JoinFailed => [
                fmt_line!("JOIN FAIL"),
                fmt_line!("Retry {}", stats.join_attempts),
                fmt_line!("Check credentials"),
                Line::new(),
            ],
            RadioSessionState::Joined => [
                fmt_line!("JOINED!"),
                fmt_line!("TX Count: {}", stats.tx_count),
                match rssi {
                    Some(rssi) => fmt_line!("RSSI: {} dBm", rssi),
                    None => Line::new(),
                },
                fmt_line!("Fails: {}", ctx.failures.count()),
            ],
            RadioSessionState::Transmitting => [
                fmt_line!("UPLINK #{}", stats.tx_count.saturating_add(1)),
                fmt_line!("TX in progress..."),
                match rssi {
                    Some(rssi) => fmt_line!("RSSI: {} dBm", rssi),
                    None => Line::new(),
                },
                Line::new(),
            ],
            RadioSessionState::LinkDead => [
                fmt_line!("LINK DEAD"),
                fmt_line!("Reconnecting..."),
                fmt_line!("TX Count: {}", stats.tx_count),
                Line::new(),
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::LinkQuality;

    fn key(mode: SystemMode, radio: RadioSessionState) -> ScreenKey {
        ScreenKey {
            mode,
            radio,
            fallback_up: false,
        }
    }

    #[test]
    fn joining_shows_attempt_count() {
        let mut ctx = DeviceContext::new(10, 0);
        ctx.stats.join_attempts = 4;
        let lines = screen(&ctx, key(SystemMode::RadioActive, RadioSessionState::Joining), "");
        assert_eq!(lines[0].as_str(), "JOINING (4)");
    }

    #[test]
    fn transmitting_shows_next_uplink_and_rssi() {
        let mut ctx = DeviceContext::new(10, 0);
        ctx.stats.tx_count = 11;
        ctx.stats.last_link = Some(LinkQuality { rssi: -101, snr: 3 });
        let lines = screen(
            &ctx,
            key(SystemMode::RadioActive, RadioSessionState::Transmitting),
            "",
        );
        assert_eq!(lines[0].as_str(), "UPLINK #12");
        assert_eq!(lines[2].as_str(), "RSSI: -101 dBm");
    }

    #[test]
    fn fallback_shows_network() {
        let ctx = DeviceContext::new(10, 0);
        let k = ScreenKey {
            mode: SystemMode::NetworkFallback,
            radio: RadioSessionState::Idle,
            fallback_up: true,
        };
        let lines = screen(&ctx, k, "observatory");
        assert_eq!(lines[1].as_str(), "observatory");
    }

    #[test]
    fn refresh_is_rate_limited() {
        let mut ctx = DeviceContext::new(10, 0);
        let mut diag = Diagnostics::new(500);
        let k = key(SystemMode::RadioActive, RadioSessionState::Joined);

        diag.update(&mut ctx, k, 0, "");
        assert_eq!(ctx.display.lines().next(), Some("JOINED!"));

        ctx.stats.tx_count = 1;
        diag.update(&mut ctx, k, 499, "");
        assert_eq!(ctx.display.lines().nth(1), Some("TX Count: 0"));
        diag.update(&mut ctx, k, 500, "");
        assert_eq!(ctx.display.lines().nth(1), Some("TX Count: 1"));
    }

    #[test]
    fn state_change_redraws_immediately() {
        let mut ctx = DeviceContext::new(10, 0);
        let mut diag = Diagnostics::new(500);
        diag.update(&mut ctx, key(SystemMode::RadioActive, RadioSessionState::Joined), 0, "");
        diag.update(&mut ctx, key(SystemMode::RadioActive, RadioSessionState::LinkDead), 1, "");
        assert_eq!(ctx.display.lines().next(), Some("LINK DEAD"));
    }

    #[test]
    fn hold_keeps_message_on_screen() {
        let mut ctx = DeviceContext::new(10, 0);
        let mut diag = Diagnostics::new(500);
        ctx.display.show(&["BUTTON", "Already joined!"], 0);
        diag.hold(0);
        let k = key(SystemMode::RadioActive, RadioSessionState::Joined);
        diag.update(&mut ctx, k, 1_999, "");
        assert_eq!(ctx.display.lines().next(), Some("BUTTON"));
        diag.update(&mut ctx, k, 2_000, "");
        assert_eq!(ctx.display.lines().next(), Some("JOINED!"));
    }
}
