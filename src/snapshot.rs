//! Sensor readings captured for one transmission cycle.
//!
//! A [`SensorSnapshot`] is produced by the sensor subsystem on request and is
//! immutable once captured. Faulty probes do not produce errors: the
//! corresponding bit in [`SensorValidity`] is cleared and the reading is
//! carried as whatever the driver returned (usually zero).

/// Per-subsystem validity flags.
///
/// The bit layout is shared with byte 24 of the telemetry frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SensorValidity {
    /// Sky/ambient infrared thermometer responded.
    pub temperature: bool,
    /// Light (sky quality) sensor responded.
    pub light: bool,
    /// Rain sensor reading is in range.
    pub rain: bool,
    /// Wind pulse counter produced a plausible speed.
    pub wind: bool,
}

impl SensorValidity {
    /// Bit for the temperature probe.
    pub const TEMPERATURE: u8 = 1 << 0;
    /// Bit for the light sensor.
    pub const LIGHT: u8 = 1 << 1;
    /// Bit for the rain sensor.
    pub const RAIN: u8 = 1 << 2;
    /// Bit for the wind sensor.
    pub const WIND: u8 = 1 << 3;

    /// All four subsystems valid.
    pub const fn all() -> Self {
        Self {
            temperature: true,
            light: true,
            rain: true,
            wind: true,
        }
    }

    /// Pack into the frame bitmask. Bits 4-7 are always zero.
    pub const fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.temperature {
            bits |= Self::TEMPERATURE;
        }
        if self.light {
            bits |= Self::LIGHT;
        }
        if self.rain {
            bits |= Self::RAIN;
        }
        if self.wind {
            bits |= Self::WIND;
        }
        bits
    }

    /// Unpack from a frame bitmask, ignoring reserved bits.
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            temperature: bits & Self::TEMPERATURE != 0,
            light: bits & Self::LIGHT != 0,
            rain: bits & Self::RAIN != 0,
            wind: bits & Self::WIND != 0,
        }
    }
}

/// Sky quality channels from the light sensor.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct SkyQuality {
    /// Infrared channel raw count.
    pub ir: u16,
    /// Full-spectrum channel raw count.
    pub full: u16,
    /// Visible channel, `full - ir`.
    pub visible: u16,
    /// Computed illuminance in lux.
    pub lux: f32,
}

impl SkyQuality {
    /// Build from the two raw channels, deriving the visible channel.
    ///
    /// A noisy sensor can report `ir > full`; the visible channel then
    /// saturates at zero instead of wrapping.
    pub fn new(ir: u16, full: u16, lux: f32) -> Self {
        Self {
            ir,
            full,
            visible: full.saturating_sub(ir),
            lux,
        }
    }
}

/// One immutable set of environmental readings.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct SensorSnapshot {
    /// Rain intensity, 0 (dry) to 1023 (saturated).
    pub rain_intensity: u16,
    /// Wind speed in m/s.
    pub wind_speed: f32,
    /// Sky (object) temperature in °C.
    pub sky_temperature: f32,
    /// Ambient temperature in °C.
    pub ambient_temperature: f32,
    /// Sky quality channels and illuminance.
    pub sky_quality: SkyQuality,
    /// Node uptime at capture, in seconds.
    pub uptime_seconds: u32,
    /// Battery voltage in millivolts.
    pub battery_mv: u16,
    /// Which subsystems produced trustworthy data.
    pub validity: SensorValidity,
}

impl SensorSnapshot {
    /// Maximum raw rain reading (10-bit ADC).
    pub const RAIN_MAX: u16 = 1023;

    /// Clamp the rain reading into the ADC range.
    pub fn with_rain_intensity(mut self, raw: u16) -> Self {
        self.rain_intensity = raw.min(Self::RAIN_MAX);
        self
    }
}

/// Link quality of the last completed uplink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LinkQuality {
    /// Received signal strength in dBm.
    pub rssi: i16,
    /// Signal-to-noise ratio in dB.
    pub snr: i8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_bits_layout() {
        let v = SensorValidity {
            temperature: true,
            light: false,
            rain: true,
            wind: false,
        };
        assert_eq!(v.bits(), 0b0101);
        assert_eq!(SensorValidity::all().bits(), 0x0F);
        assert_eq!(SensorValidity::default().bits(), 0);
    }

    #[test]
    fn validity_ignores_reserved_bits() {
        assert_eq!(SensorValidity::from_bits(0xF0), SensorValidity::default());
        assert_eq!(SensorValidity::from_bits(0xFF), SensorValidity::all());
    }

    #[test]
    fn visible_channel_is_full_minus_ir() {
        let sq = SkyQuality::new(120, 500, 3.5);
        assert_eq!(sq.visible, 380);
    }

    #[test]
    fn visible_channel_saturates() {
        let sq = SkyQuality::new(600, 500, 0.0);
        assert_eq!(sq.visible, 0);
    }

    #[test]
    fn rain_clamped_to_adc_range() {
        let s = SensorSnapshot::default().with_rain_intensity(4000);
        assert_eq!(s.rain_intensity, 1023);
    }
}
