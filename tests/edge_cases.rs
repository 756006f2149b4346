//! Edge case and boundary condition tests for the node core

use allsky_node::backoff::JoinBackoff;
use allsky_node::config::{BackoffConfig, ButtonConfig, CycleConfig};
use allsky_node::hal::{MockRadio, MockSensors};
use allsky_node::snapshot::{LinkQuality, SensorSnapshot, SensorValidity, SkyQuality};
use allsky_node::{
    ButtonCommandInterpreter, ButtonPressEvent, ConfigError, DeviceContext, FailureSignal,
    FailureTracker, FrameError, NodeCommand, NodeConfig, PayloadCodec, RadioSessionManager,
    RadioSessionState, FRAME_LEN,
};

fn classify(ms: u32) -> Option<NodeCommand> {
    ButtonCommandInterpreter::new(ButtonConfig::default()).classify(ButtonPressEvent::new(ms))
}

// ============================================================================
// Button Bands
// ============================================================================

#[test]
fn press_500ms_forces_join() {
    assert_eq!(classify(500), Some(NodeCommand::ForceRadioJoin));
}

#[test]
fn press_4000ms_enables_fallback() {
    assert_eq!(classify(4_000), Some(NodeCommand::EnableNetworkFallback));
}

#[test]
fn press_9000ms_restarts() {
    assert_eq!(classify(9_000), Some(NodeCommand::Restart));
}

#[test]
fn band_edges_are_inclusive() {
    assert_eq!(classify(99), None);
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
fn overlapping_bands_rejected() {
    let bands = ButtonConfig::default().with_bands(100, 3_000, 3_000, 8_000);
    assert_eq!(bands.validate(), Err(ConfigError::InvalidButtonBands));

    let bands = ButtonConfig::default().with_debounce_ms(200);
    assert_eq!(bands.validate(), Err(ConfigError::InvalidButtonBands));
}

// ============================================================================
// Failure Threshold
// ============================================================================

#[test]
fn tenth_failure_signals_once() {
    let mut tracker = FailureTracker::new(10);
    for _ in 0..9 {
        assert_eq!(tracker.record_outcome(false), None);
    }
    assert_eq!(
        tracker.record_outcome(false),
        Some(FailureSignal::CycleFailureThresholdReached { failures: 10 })
    );
    for _ in 0..20 {
        assert_eq!(tracker.record_outcome(false), None);
    }
    assert_eq!(tracker.count(), 30);
}

#[test]
fn success_restarts_the_run() {
    let mut tracker = FailureTracker::new(3);
    tracker.record_outcome(false);
    tracker.record_outcome(false);
    tracker.record_outcome(true);
    assert_eq!(tracker.count(), 0);
    tracker.record_outcome(false);
    tracker.record_outcome(false);
    assert!(tracker.record_outcome(false).is_some());
}

#[test]
fn no_signal_while_fallback_active() {
    let mut tracker = FailureTracker::new(2);
    tracker.set_fallback_active(true);
    for _ in 0..5 {
        assert_eq!(tracker.record_outcome(false), None);
    }
}

#[test]
fn zero_threshold_config_rejected() {
    let config = NodeConfig::default().with_cycle(CycleConfig::default().with_failure_threshold(0));
    assert_eq!(config.validate(), Err(ConfigError::InvalidThreshold));
}

// ============================================================================
// Backoff
// ============================================================================

#[test]
fn backoff_never_exceeds_cap() {
    let mut backoff = JoinBackoff::new(&BackoffConfig::default());
    let mut last = 0;
    for _ in 0..64 {
        let delay = backoff.next_delay();
        assert!(delay >= last);
        assert!(delay <= 600_000);
        last = delay;
    }
    assert_eq!(last, 600_000);
}

#[test]
fn invalid_backoff_rejected() {
    let backoff = BackoffConfig::default().with_initial_ms(10_000).with_cap_ms(5_000);
    assert_eq!(backoff.validate(), Err(ConfigError::InvalidBackoff));
}

// ============================================================================
// Payload Frame
// ============================================================================

#[test]
fn encodes_scaled_big_endian_fields() {
    let snapshot = SensorSnapshot {
        rain_intensity: 1023,
        wind_speed: 12.34,
        sky_temperature: -12.50,
        ..Default::default()
    };
    let frame = PayloadCodec::encode(&snapshot);
    let bytes = frame.as_bytes();

    assert_eq!(bytes.len(), FRAME_LEN);
    assert_eq!(&bytes[0..2], &[0x03, 0xFF]);
    assert_eq!(&bytes[2..4], &[0x04, 0xD2]);
    assert_eq!(&bytes[4..6], &[0xFA, 0x06]);
    assert_eq!(&bytes[25..30], &[0; 5]);
}

#[test]
fn out_of_range_values_saturate() {
    let snapshot = SensorSnapshot {
        sky_temperature: 1_000.0,
        ambient_temperature: -1_000.0,
        ..Default::default()
    };
    let bytes = *PayloadCodec::encode(&snapshot).as_bytes();
    assert_eq!(i16::from_be_bytes([bytes[4], bytes[5]]), i16::MAX);
    assert_eq!(i16::from_be_bytes([bytes[6], bytes[7]]), i16::MIN);
}

#[test]
fn decode_recovers_fields_and_link() {
    let snapshot = SensorSnapshot {
        rain_intensity: 40,
        wind_speed: 7.5,
        sky_temperature: -21.25,
        ambient_temperature: 3.75,
        sky_quality: SkyQuality::new(55, 300, 0.125),
        uptime_seconds: 3_600,
        battery_mv: 4_100,
        validity: SensorValidity {
            temperature: true,
            light: false,
            rain: true,
            wind: true,
        },
    };
    let link = LinkQuality { rssi: -112, snr: -7 };
    let frame = PayloadCodec::encode(&snapshot).with_link_quality(link);

    let (decoded, decoded_link) = PayloadCodec::decode(frame.as_bytes()).unwrap();
    assert_eq!(decoded, snapshot);
    assert_eq!(decoded_link, link);
}

#[test]
fn decode_rejects_wrong_length() {
    assert_eq!(
        PayloadCodec::decode(&[0; 29]),
        Err(FrameError::Length {
            expected: FRAME_LEN,
            actual: 29
        })
    );
    assert!(PayloadCodec::decode(&[0; 31]).is_err());
    assert!(PayloadCodec::decode(&[]).is_err());
}

// ============================================================================
// Radio Session Timing
// ============================================================================

fn joined_session(
    config: &NodeConfig,
) -> (RadioSessionManager<MockRadio>, DeviceContext, MockSensors) {
    let mut mac = MockRadio::new();
    mac.auto_join = Some(true);
    let mut radio = RadioSessionManager::new(mac, config);
    let mut ctx = DeviceContext::from_config(config, 0);
    let mut sensors = MockSensors::new();
    radio.arm();
    radio.start_join(&mut ctx, 0).unwrap();
    radio.tick(&mut ctx, &mut sensors, 0);
    assert!(radio.is_joined());
    (radio, ctx, sensors)
}

#[test]
fn silent_uplink_times_out_as_failure() {
    let config = NodeConfig::default().with_cycle(
        CycleConfig::default()
            .with_settle_delay_ms(1_000)
            .with_cycle_timeout_ms(30_000),
    );
    let (mut radio, mut ctx, mut sensors) = joined_session(&config);

    radio.tick(&mut ctx, &mut sensors, 1_000);
    assert_eq!(radio.state(), RadioSessionState::Transmitting);

    radio.tick(&mut ctx, &mut sensors, 30_999);
    assert_eq!(ctx.failures.count(), 0);

    radio.tick(&mut ctx, &mut sensors, 31_000);
    assert_eq!(ctx.failures.count(), 1);
    assert_eq!(radio.state(), RadioSessionState::Joined);
    assert!(!radio.has_pending_cycle());
}

#[test]
fn busy_mac_skips_cycle_without_failure() {
    let config = NodeConfig::default().with_cycle(
        CycleConfig::default()
            .with_settle_delay_ms(1_000)
            .with_tx_interval_ms(60_000),
    );
    let (mut radio, mut ctx, mut sensors) = joined_session(&config);
    radio.mac_mut().busy = true;

    radio.tick(&mut ctx, &mut sensors, 1_000);

    assert!(radio.mac().frames.is_empty());
    assert_eq!(ctx.failures.count(), 0);
    assert_eq!(radio.next_cycle_ms(), Some(61_000));
}

#[test]
fn uptime_saturates() {
    let ctx = DeviceContext::new(10, 0);
    assert_eq!(ctx.uptime_seconds(u64::MAX), u32::MAX);
}
