//! Fixed 30-byte big-endian telemetry frame.
//!
//! # Layout
//!
//! | Bytes | Field | Encoding |
//! |-------|-------|----------|
//! | 0-1   | rain intensity | `u16` |
//! | 2-3   | wind speed | `i16`, m/s × 100 |
//! | 4-5   | sky temperature | `i16`, °C × 100 |
//! | 6-7   | ambient temperature | `i16`, °C × 100 |
//! | 8-9   | sky quality IR | `u16` |
//! | 10-11 | sky quality full spectrum | `u16` |
//! | 12-13 | sky quality visible | `u16` |
//! | 14-17 | illuminance | IEEE-754 `f32` |
//! | 18-21 | uptime seconds | `u32` |
//! | 22-23 | battery millivolts | `u16` |
//! | 24    | validity bitmask | bit0 temp, bit1 light, bit2 rain, bit3 wind |
//! | 25-26 | RSSI | `i16` dBm, zero at encode time |
//! | 27    | SNR | `i8`, zero at encode time |
//! | 28-29 | reserved | zero |
//!
//! Scaled fields keep two decimals; anything finer is rounded half away from
//! zero and lost on decode. Values outside the `i16` range saturate.
//!
//! # Example
//!
//! ```rust
//! use allsky_node::payload::{PayloadCodec, FRAME_LEN};
//! use allsky_node::snapshot::SensorSnapshot;
//!
//! let snapshot = SensorSnapshot {
//!     rain_intensity: 1023,
//!     wind_speed: 12.34,
//!     sky_temperature: -12.5,
//!     ..Default::default()
//! };
//! let frame = PayloadCodec::encode(&snapshot);
//! assert_eq!(frame.as_bytes().len(), FRAME_LEN);
//! assert_eq!(&frame.as_bytes()[..6], &[0x03, 0xFF, 0x04, 0xD2, 0xFA, 0x06]);
//! ```

use crate::error::FrameError;
use crate::snapshot::{LinkQuality, SensorSnapshot, SensorValidity, SkyQuality};

/// Length of every telemetry frame.
pub const FRAME_LEN: usize = 30;

mod offset {
    pub const RAIN: usize = 0;
    pub const WIND: usize = 2;
    pub const SKY_TEMP: usize = 4;
    pub const AMBIENT_TEMP: usize = 6;
    pub const SQ_IR: usize = 8;
    pub const SQ_FULL: usize = 10;
    pub const SQ_VISIBLE: usize = 12;
    pub const LUX: usize = 14;
    pub const UPTIME: usize = 18;
    pub const BATTERY: usize = 22;
    pub const VALIDITY: usize = 24;
    pub const RSSI: usize = 25;
    pub const SNR: usize = 27;
}

/// An encoded telemetry frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TelemetryFrame([u8; FRAME_LEN]);

impl TelemetryFrame {
    /// Raw frame bytes, ready for the radio.
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Copy of this frame with the post-transmission link quality filled in.
    pub fn with_link_quality(mut self, link: LinkQuality) -> Self {
        self.put(offset::RSSI, &link.rssi.to_be_bytes());
        self.0[offset::SNR] = link.snr.to_be_bytes()[0];
        self
    }

    fn put(&mut self, at: usize, bytes: &[u8]) {
        self.0[at..at + bytes.len()].copy_from_slice(bytes);
    }
}

impl AsRef<[u8]> for TelemetryFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Stateless encoder/decoder for [`TelemetryFrame`].
pub struct PayloadCodec;

impl PayloadCodec {
    /// Encode a snapshot. RSSI and SNR are left at zero.
    pub fn encode(snapshot: &SensorSnapshot) -> TelemetryFrame {
        let mut frame = TelemetryFrame([0; FRAME_LEN]);
        let sq = &snapshot.sky_quality;

        frame.put(offset::RAIN, &snapshot.rain_intensity.to_be_bytes());
        frame.put(offset::WIND, &to_centi(snapshot.wind_speed).to_be_bytes());
        frame.put(
            offset::SKY_TEMP,
            &to_centi(snapshot.sky_temperature).to_be_bytes(),
        );
        frame.put(
            offset::AMBIENT_TEMP,
            &to_centi(snapshot.ambient_temperature).to_be_bytes(),
        );
        frame.put(offset::SQ_IR, &sq.ir.to_be_bytes());
        frame.put(offset::SQ_FULL, &sq.full.to_be_bytes());
        frame.put(offset::SQ_VISIBLE, &sq.visible.to_be_bytes());
        frame.put(offset::LUX, &sq.lux.to_be_bytes());
        frame.put(offset::UPTIME, &snapshot.uptime_seconds.to_be_bytes());
        frame.put(offset::BATTERY, &snapshot.battery_mv.to_be_bytes());
        frame.0[offset::VALIDITY] = snapshot.validity.bits();

        frame
    }

    /// Decode a frame back into a snapshot and the link quality it carries.
    ///
    /// # Errors
    ///
    /// [`FrameError::Length`] if `bytes` is not exactly [`FRAME_LEN`] long.
    pub fn decode(bytes: &[u8]) -> Result<(SensorSnapshot, LinkQuality), FrameError> {
        let b: &[u8; FRAME_LEN] = bytes.try_into().map_err(|_| FrameError::Length {
            expected: FRAME_LEN,
            actual: bytes.len(),
        })?;

        let u16_at = |at: usize| u16::from_be_bytes([b[at], b[at + 1]]);
        let i16_at = |at: usize| i16::from_be_bytes([b[at], b[at + 1]]);

        let snapshot = SensorSnapshot {
            rain_intensity: u16_at(offset::RAIN),
            wind_speed: from_centi(i16_at(offset::WIND)),
            sky_temperature: from_centi(i16_at(offset::SKY_TEMP)),
            ambient_temperature: from_centi(i16_at(offset::AMBIENT_TEMP)),
            sky_quality: SkyQuality {
                ir: u16_at(offset::SQ_IR),
                full: u16_at(offset::SQ_FULL),
                visible: u16_at(offset::SQ_VISIBLE),
                lux: f32::from_be_bytes([
                    b[offset::LUX],
                    b[offset::LUX + 1],
                    b[offset::LUX + 2],
                    b[offset::LUX + 3],
                ]),
            },
            uptime_seconds: u32::from_be_bytes([
                b[offset::UPTIME],
                b[offset::UPTIME + 1],
                b[offset::UPTIME + 2],
                b[offset::UPTIME + 3],
            ]),
            battery_mv: u16_at(offset::BATTERY),
            validity: SensorValidity::from_bits(b[offset::VALIDITY]),
        };
        let link = LinkQuality {
            rssi: i16_at(offset::RSSI),
            snr: b[offset::SNR] as i8,
        };

        Ok((snapshot, link))
    }
}

/// Scale by 100 and round half away from zero. `as` saturates and maps NaN to 0.
fn to_centi(value: f32) -> i16 {
    let scaled = value * 100.0;
    let rounded = if scaled >= 0.0 {
        scaled + 0.5
    } else {
        scaled - 0.5
    };
    rounded as i16
}

fn from_centi(raw: i16) -> f32 {
    raw as f32 / 100.0
}
