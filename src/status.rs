//! Status document served by the fallback transport.
//!
//! Built fresh for every query from the latest [`SensorSnapshot`] and the
//! counters in [`DeviceContext`]; rendering is pure and allocation-free
//! (`serde-json-core` into a fixed-capacity string).
//!
//! ```json
//! {
//!   "mode": "networkFallback",
//!   "uptimeSeconds": 812,
//!   "radioJoined": false,
//!   "lastJoinAttemptSeconds": 0,
//!   "joinAttempts": 0,
//!   "consecutiveCycleFailures": 0,
//!   "transmitCount": 0,
//!   "sensors": { "rainIntensity": 12, "windSpeed": null, ... }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::context::DeviceContext;
use crate::controller::SystemMode;
use crate::snapshot::SensorSnapshot;

/// Capacity of a rendered status body.
pub const STATUS_BODY_LEN: usize = 768;

/// Rendered status document.
pub type StatusBody = heapless::String<STATUS_BODY_LEN>;

/// Sensor readings with invalid fields as `None` (serialized as `null`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReport {
    /// Rain intensity, 0-1023.
    pub rain_intensity: Option<u16>,
    /// Wind speed in m/s.
    pub wind_speed: Option<f32>,
    /// Sky temperature in °C.
    pub sky_temperature: Option<f32>,
    /// Ambient temperature in °C.
    pub ambient_temperature: Option<f32>,
    /// Sky quality IR channel.
    pub sky_quality_ir: Option<u16>,
    /// Sky quality full-spectrum channel.
    pub sky_quality_full: Option<u16>,
    /// Sky quality visible channel.
    pub sky_quality_visible: Option<u16>,
    /// Illuminance in lux.
    pub illuminance: Option<f32>,
    /// Battery voltage in millivolts. Always measured.
    pub battery_mv: Option<u16>,
}

impl From<&SensorSnapshot> for SensorReport {
    fn from(s: &SensorSnapshot) -> Self {
        let v = s.validity;
        let sq = s.sky_quality;
        Self {
            rain_intensity: v.rain.then_some(s.rain_intensity),
            wind_speed: v.wind.then_some(s.wind_speed),
            sky_temperature: v.temperature.then_some(s.sky_temperature),
            ambient_temperature: v.temperature.then_some(s.ambient_temperature),
            sky_quality_ir: v.light.then_some(sq.ir),
            sky_quality_full: v.light.then_some(sq.full),
            sky_quality_visible: v.light.then_some(sq.visible),
            illuminance: v.light.then_some(sq.lux),
            battery_mv: Some(s.battery_mv),
        }
    }
}

/// Structured status snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Current transport mode.
    pub mode: SystemMode,
    /// Seconds since boot.
    pub uptime_seconds: u32,
    /// Whether the radio session is joined.
    pub radio_joined: bool,
    /// Uptime in seconds when the last join started (0 if never).
    pub last_join_attempt_seconds: u32,
    /// Join attempts since boot.
    pub join_attempts: u32,
    /// Consecutive failed transmission cycles.
    pub consecutive_cycle_failures: u32,
    /// Completed uplinks since boot.
    pub transmit_count: u32,
    /// Latest sensor readings; all `null` before the first capture.
    pub sensors: SensorReport,
}

impl StatusReport {
    /// Snapshot the context at `now_ms`.
    pub fn from_context(ctx: &DeviceContext, mode: SystemMode, now_ms: u64) -> Self {
        let stats = &ctx.stats;
        Self {
            mode,
            uptime_seconds: ctx.uptime_seconds(now_ms),
            radio_joined: stats.joined,
            last_join_attempt_seconds: stats
                .last_join_attempt_ms
                .map(|ms| ctx.uptime_seconds(ms))
                .unwrap_or(0),
            join_attempts: stats.join_attempts,
            consecutive_cycle_failures: ctx.failures.count(),
            transmit_count: stats.tx_count,
            sensors: ctx.latest.as_ref().map(SensorReport::from).unwrap_or_default(),
        }
    }

    /// Serialize to JSON.
    pub fn render(&self) -> StatusBody {
        serde_json_core::to_string(self).unwrap_or_else(|_| {
            let mut body = StatusBody::new();
            let _ = body.push_str("{}");
            body
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{SensorValidity, SkyQuality};

    fn snapshot() -> SensorSnapshot {
        SensorSnapshot {
            rain_intensity: 12,
            wind_speed: 3.5,
            sky_temperature: -18.75,
            ambient_temperature: 11.25,
            sky_quality: SkyQuality::new(100, 400, 2.5),
            uptime_seconds: 90,
            battery_mv: 3_900,
            validity: SensorValidity {
                temperature: true,
                light: true,
                rain: true,
                wind: false,
            },
        }
    }

    #[test]
    fn invalid_fields_are_null() {
        let report = SensorReport::from(&snapshot());
        assert_eq!(report.wind_speed, None);
        assert_eq!(report.rain_intensity, Some(12));
        assert_eq!(report.sky_quality_visible, Some(300));
    }

    #[test]
    fn renders_camel_case_json() {
        let mut ctx = DeviceContext::new(10, 0);
        ctx.latest = Some(snapshot());
        ctx.stats.join_attempts = 3;
        ctx.stats.last_join_attempt_ms = Some(42_500);
        ctx.stats.tx_count = 7;
        ctx.failures.record_outcome(false);

        let body = StatusReport::from_context(&ctx, SystemMode::NetworkFallback, 120_000).render();
        let json: serde_json::Value = serde_json::from_str(body.as_str()).unwrap();

        assert_eq!(json["mode"], "networkFallback");
        assert_eq!(json["uptimeSeconds"], 120);
        assert_eq!(json["radioJoined"], false);
        assert_eq!(json["lastJoinAttemptSeconds"], 42);
        assert_eq!(json["joinAttempts"], 3);
        assert_eq!(json["consecutiveCycleFailures"], 1);
        assert_eq!(json["transmitCount"], 7);
        assert_eq!(json["sensors"]["rainIntensity"], 12);
        assert!(json["sensors"]["windSpeed"].is_null());
        assert_eq!(json["sensors"]["skyTemperature"], -18.75);
        assert_eq!(json["sensors"]["batteryMv"], 3_900);
    }

    #[test]
    fn sensors_null_before_first_capture() {
        let ctx = DeviceContext::new(10, 0);
        let body = StatusReport::from_context(&ctx, SystemMode::RadioActive, 0).render();
        let json: serde_json::Value = serde_json::from_str(body.as_str()).unwrap();
        for (_, value) in json["sensors"].as_object().unwrap() {
            assert!(value.is_null());
        }
    }

    #[test]
    fn full_report_fits_body() {
        let mut ctx = DeviceContext::new(10, 0);
        let mut s = snapshot();
        s.validity = SensorValidity::all();
        s.wind_speed = -0.000_012_345_678;
        s.sky_quality.lux = f32::MAX;
        ctx.latest = Some(s);
        ctx.stats.join_attempts = u32::MAX;
        ctx.stats.tx_count = u32::MAX;
        let body = StatusReport::from_context(&ctx, SystemMode::Switching, u64::MAX).render();
        assert!(body.len() > 2);
        assert!(body.ends_with('}'));
    }
}
