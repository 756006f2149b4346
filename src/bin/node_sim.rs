//! Desktop simulation of the all-sky node.
//!
//! Runs the real controller loop against a scripted radio MAC, fixed sensor
//! readings and the desktop network stack, which serves the status document
//! over HTTP on localhost. Button presses come from stdin:
//!
//! | Input | Effect |
//! |-------|--------|
//! | `j` | short press (force radio join) |
//! | `f` | long press (enable Wi-Fi fallback) |
//! | `r` | very long press (restart, exits the simulation) |
//! | `<ms>` | press held for `<ms>` milliseconds |
//! | `w` | toggle the simulated access point |
//! | `n` | toggle radio coverage (uplinks fail while off) |
//!
//! # Run
//!
//! ```bash
//! RUST_LOG=debug cargo run --features sim --bin node_sim
//! curl http://127.0.0.1:8080/status
//! ```

use std::io::BufRead;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use allsky_node::config::{CycleConfig, DeviceConfig, StatusConfig, WifiConfig};
use allsky_node::hal::{MockRadio, MockSensors};
use allsky_node::services::{DesktopNetwork, WebServerConfig};
use allsky_node::traits::{Clock, StatusDisplay, TxReport};
use allsky_node::{
    ButtonPressEvent, DeviceContext, NodeConfig, RadioConfig, RadioError, TransportModeController,
};
use tracing::{info, warn};

/// Main loop interval in milliseconds
const LOOP_INTERVAL_MS: u64 = 20;

/// Port the status responder listens on
const STATUS_PORT: u16 = 8080;

/// Wall-clock time since the simulation started.
struct SimClock {
    start: Instant,
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Prints every frame pushed to the panel.
struct ConsoleDisplay;

impl StatusDisplay for ConsoleDisplay {
    type Error = std::convert::Infallible;

    fn show(&mut self, lines: &[&str]) -> Result<(), Self::Error> {
        info!(target: "display", "{}", lines.join(" | "));
        Ok(())
    }

    fn set_awake(&mut self, awake: bool) -> Result<(), Self::Error> {
        info!(target: "display", awake, "panel power");
        Ok(())
    }
}

enum SimInput {
    Press(u32),
    ToggleAccessPoint,
    ToggleCoverage,
}

fn parse_input(line: &str) -> Option<SimInput> {
    match line.trim() {
        "j" => Some(SimInput::Press(500)),
        "f" => Some(SimInput::Press(4_000)),
        "r" => Some(SimInput::Press(9_000)),
        "w" => Some(SimInput::ToggleAccessPoint),
        "n" => Some(SimInput::ToggleCoverage),
        other => other.parse().ok().map(SimInput::Press),
    }
}

fn spawn_stdin_reader() -> Receiver<SimInput> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_input(&line) {
                Some(input) => {
                    if tx.send(input).is_err() {
                        break;
                    }
                }
                None => warn!(input = %line.trim(), "unrecognised input"),
            }
        }
    });
    rx
}

fn scripted_radio() -> MockRadio {
    let mut radio = MockRadio::new();
    radio.auto_join = Some(true);
    radio.auto_complete = Some(TxReport {
        rssi: -97,
        snr: 7,
        ack: false,
        downlink_len: 0,
    });
    radio
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("allsky-node simulator v{} starting", env!("CARGO_PKG_VERSION"));

    // =========================================================================
    // Configuration
    // =========================================================================
    let config = NodeConfig::default()
        .with_radio(
            RadioConfig::default()
                .with_dev_eui_hex("70B3D57ED005A1B2")?
                .with_app_eui_hex("0000000000000001")?
                .with_app_key_hex("2B7E151628AED2A6ABF7158809CF4F3C")?,
        )
        .with_cycle(
            CycleConfig::default()
                .with_tx_interval_ms(10_000)
                .with_settle_delay_ms(2_000)
                .with_cycle_timeout_ms(15_000)
                .with_failure_threshold(3)
                .with_fallback_sensor_refresh_ms(5_000),
        )
        .with_wifi(
            WifiConfig::default()
                .with_ssid("observatory")
                .with_connect_timeout_ms(5_000),
        )
        .with_status(StatusConfig::default().with_port(STATUS_PORT))
        .with_device(DeviceConfig::default().with_name("allsky-sim").with_build("sim"));

    let web = WebServerConfig::new(([127, 0, 0, 1], config.status.port))
        .cors(config.status.cors_permissive);
    let net = DesktopNetwork::new(web)?;
    let access_point = net.access_point();

    let clock = SimClock {
        start: Instant::now(),
    };
    let mut display = ConsoleDisplay;
    let mut ctx = DeviceContext::from_config(&config, clock.now_ms());

    let mut node = match TransportModeController::new(
        &config,
        scripted_radio(),
        net,
        MockSensors::new(),
        &mut ctx,
        clock.now_ms(),
    ) {
        Ok(node) => node,
        Err(err) => {
            let _ = ctx.display.flush(&mut display);
            return Err(err.into());
        }
    };

    let inputs = spawn_stdin_reader();
    let mut coverage = true;
    info!(port = STATUS_PORT, "ready: j/f/r press, w toggles AP, n toggles coverage");

    // =========================================================================
    // Main Loop
    // =========================================================================
    loop {
        let now = clock.now_ms();

        let mut press = None;
        match inputs.try_recv() {
            Ok(SimInput::Press(ms)) => press = Some(ButtonPressEvent::new(ms)),
            Ok(SimInput::ToggleAccessPoint) => {
                let up = !access_point.load(Ordering::Acquire);
                access_point.store(up, Ordering::Release);
                info!(up, "access point toggled");
            }
            Ok(SimInput::ToggleCoverage) => {
                coverage = !coverage;
                let mac = node.radio_mut().mac_mut();
                mac.fail_transmit = if coverage {
                    None
                } else {
                    Some(RadioError::Hardware)
                };
                mac.auto_join = Some(coverage);
                info!(coverage, "radio coverage toggled");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }

        let report = node.tick(&mut ctx, now, press);
        let _ = ctx.display.flush(&mut display);

        if report.restart_requested() {
            info!("restart requested, exiting simulation");
            break;
        }

        thread::sleep(Duration::from_millis(LOOP_INTERVAL_MS));
    }

    Ok(())
}
