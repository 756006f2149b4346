//! Top-level transport mode state machine.
//!
//! [`TransportModeController`] owns both transports and decides which one
//! may perform I/O. Hand-off always passes through [`SystemMode::Switching`],
//! during which the outgoing transport is quiesced before the incoming one
//! is armed, so the two never touch the shared hardware at once.
//!
//! # Example
//!
//! ```rust
//! use allsky_node::{
//!     ButtonPressEvent, DeviceContext, NodeConfig, RadioConfig, SystemMode,
//!     TransportModeController,
//!     hal::{MockNetwork, MockRadio, MockSensors},
//! };
//!
//! let config = NodeConfig::default()
//!     .with_radio(RadioConfig::default().with_keys([1; 8], [2; 8], [3; 16]));
//! let mut ctx = DeviceContext::from_config(&config, 0);
//! let mut node = TransportModeController::new(
//!     &config,
//!     MockRadio::new(),
//!     MockNetwork::new(),
//!     MockSensors::new(),
//!     &mut ctx,
//!     0,
//! )
//! .unwrap();
//!
//! // Boots with the radio idle.
//! assert_eq!(node.mode(), SystemMode::NetworkFallback);
//!
//! // A short press forces a radio join.
//! node.tick(&mut ctx, 100, Some(ButtonPressEvent::new(500)));
//! assert_eq!(node.mode(), SystemMode::RadioActive);
//! assert_eq!(ctx.stats.join_attempts, 1);
//! ```

use core::fmt::Write;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::button::{ButtonCommandInterpreter, ButtonPressEvent, NodeCommand};
use crate::config::{NodeConfig, ShortString};
use crate::context::{DeviceContext, Line};
use crate::diagnostics::{Diagnostics, ScreenKey};
use crate::error::{ConnectFailure, NetworkError, NodeError};
use crate::failure::FailureSignal;
use crate::fallback::NetworkFallbackManager;
use crate::radio::{QuiesceStatus, RadioSessionManager};
use crate::status::StatusReport;
use crate::traits::{NetworkStack, RadioMac, SensorSource};

/// Which transport currently owns the shared hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SystemMode {
    /// The radio session is armed.
    RadioActive,
    /// The network fallback owns the hardware (or nothing does, at boot).
    NetworkFallback,
    /// Hand-off in progress; neither transport starts new I/O.
    Switching,
}

/// What a button command did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command started a transition or join.
    Accepted,
    /// Join requested while the radio session is already joined.
    AlreadyJoined,
    /// Fallback requested while it is already serving.
    AlreadyActive,
    /// A hand-off is in progress; the command was dropped.
    Busy,
    /// The caller should reboot the device.
    RestartRequested,
}

/// Summary of one controller tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickReport {
    /// Command classified from this tick's button press.
    pub command: Option<NodeCommand>,
    /// Outcome of that command.
    pub outcome: Option<CommandOutcome>,
    /// Mode after the tick.
    pub mode: SystemMode,
    /// Status queries answered this tick.
    pub served: usize,
}

impl TickReport {
    /// Whether the caller must reboot the device.
    pub fn restart_requested(&self) -> bool {
        self.outcome == Some(CommandOutcome::RestartRequested)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SwitchTarget {
    ToFallback,
    ToRadio,
}

/// Owns both transports and arbitrates between them.
///
/// # Type Parameters
///
/// - `R`: radio MAC ([`RadioMac`])
/// - `N`: network stack ([`NetworkStack`])
/// - `S`: sensor subsystem ([`SensorSource`])
pub struct TransportModeController<R: RadioMac, N: NetworkStack, S: SensorSource> {
    mode: SystemMode,
    target: Option<SwitchTarget>,
    radio: RadioSessionManager<R>,
    fallback: NetworkFallbackManager<N>,
    sensors: S,
    interpreter: ButtonCommandInterpreter,
    diagnostics: Diagnostics,
    build: ShortString,
    sensor_refresh_ms: u64,
    next_refresh_ms: Option<u64>,
    last_connect_failure: Option<ConnectFailure>,
}

impl<R: RadioMac, N: NetworkStack, S: SensorSource> TransportModeController<R, N, S> {
    /// Validate configuration and boot into idle fallback mode.
    ///
    /// Nothing is armed at boot: the radio waits for an explicit join and
    /// the network waits for an explicit fallback request.
    ///
    /// # Errors
    ///
    /// [`NodeError::ConfigurationMissing`] when the radio identity is unset.
    /// A persistent error screen is pinned to the display before returning.
    pub fn new(
        config: &NodeConfig,
        mac: R,
        net: N,
        sensors: S,
        ctx: &mut DeviceContext,
        now_ms: u64,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        if !config.radio.is_configured() {
            error!("radio identity not configured, refusing to start");
            ctx.display
                .pin(&["ERROR", "No radio config", "Check credentials"], now_ms);
            return Err(NodeError::ConfigurationMissing);
        }

        let mut diagnostics = Diagnostics::new(config.display.refresh_ms);
        let mut build_line = Line::new();
        let _ = write!(build_line, "BUILD: {}", config.device.build);
        ctx.display.show(
            &[build_line.as_str(), "WIFI FALLBACK MODE", "BTN: Force join"],
            now_ms,
        );
        diagnostics.hold(now_ms);

        info!(
            device = %config.device.name,
            build = %config.device.build,
            "node booted, radio idle"
        );

        Ok(Self {
            mode: SystemMode::NetworkFallback,
            target: None,
            radio: RadioSessionManager::new(mac, config),
            fallback: NetworkFallbackManager::new(net, config),
            sensors,
            interpreter: ButtonCommandInterpreter::new(config.button.clone()),
            diagnostics,
            build: config.device.build.clone(),
            sensor_refresh_ms: config.cycle.fallback_sensor_refresh_ms,
            next_refresh_ms: None,
            last_connect_failure: None,
        })
    }

    // ========================================================================
    // Loop
    // ========================================================================

    /// Run one loop iteration.
    ///
    /// Order: classify `press`, apply the command, advance any hand-off,
    /// then service whichever transport is armed.
    pub fn tick(
        &mut self,
        ctx: &mut DeviceContext,
        now_ms: u64,
        press: Option<ButtonPressEvent>,
    ) -> TickReport {
        let mut report = TickReport {
            command: None,
            outcome: None,
            mode: self.mode,
            served: 0,
        };

        if let Some(press) = press {
            ctx.display.wake(now_ms);
            if let Some(command) = self.interpreter.classify(press) {
                let outcome = self.handle_command(command, ctx, now_ms);
                info!(?command, ?outcome, "button command");
                report.command = Some(command);
                report.outcome = Some(outcome);
            }
        }

        self.advance_switch(ctx, now_ms);

        match self.mode {
            SystemMode::RadioActive => {
                let signal = self.radio.tick(ctx, &mut self.sensors, now_ms);
                if let Some(FailureSignal::CycleFailureThresholdReached { failures }) = signal {
                    if self.target.is_none() {
                        warn!(failures, "cycle failure threshold reached, enabling fallback");
                        self.notify(ctx, &["WIFI FALLBACK", "Auto: radio failing"], now_ms);
                        self.begin_fallback(ctx, now_ms);
                    }
                }
            }
            SystemMode::NetworkFallback => {
                report.served = self.serve(ctx, now_ms);
            }
            SystemMode::Switching => {}
        }

        let key = ScreenKey {
            mode: self.mode,
            radio: self.radio.state(),
            fallback_up: self.fallback.is_armed(),
        };
        self.diagnostics.update(ctx, key, now_ms, self.fallback.ssid());
        ctx.display.tick(now_ms);

        debug_assert!(self.armed_transports() <= 1, "both transports armed");
        report.mode = self.mode;
        report
    }

    fn handle_command(
        &mut self,
        command: NodeCommand,
        ctx: &mut DeviceContext,
        now_ms: u64,
    ) -> CommandOutcome {
        match command {
            NodeCommand::ForceRadioJoin => self.force_radio_join(ctx, now_ms),
            NodeCommand::EnableNetworkFallback => self.enable_network_fallback(ctx, now_ms),
            NodeCommand::Restart => {
                self.notify(ctx, &["RESTART", "Rebooting..."], now_ms);
                CommandOutcome::RestartRequested
            }
        }
    }

    fn force_radio_join(&mut self, ctx: &mut DeviceContext, now_ms: u64) -> CommandOutcome {
        match self.mode {
            SystemMode::Switching => CommandOutcome::Busy,
            SystemMode::RadioActive if self.radio.is_joined() => {
                self.notify(ctx, &["BUTTON", "Already joined!"], now_ms);
                CommandOutcome::AlreadyJoined
            }
            SystemMode::RadioActive => {
                self.notify(ctx, &["BUTTON", "Forcing join..."], now_ms);
                // Rejections are counted by the session and signalled from its tick.
                if let Err(err) = self.radio.start_join(ctx, now_ms) {
                    warn!(%err, "forced join rejected, retry scheduled");
                }
                CommandOutcome::Accepted
            }
            SystemMode::NetworkFallback => {
                self.notify(ctx, &["RADIO JOIN", "Stopping WiFi..."], now_ms);
                self.fallback.disconnect();
                self.target = Some(SwitchTarget::ToRadio);
                self.set_mode(SystemMode::Switching);
                CommandOutcome::Accepted
            }
        }
    }

    fn enable_network_fallback(&mut self, ctx: &mut DeviceContext, now_ms: u64) -> CommandOutcome {
        match self.mode {
            SystemMode::Switching => CommandOutcome::Busy,
            SystemMode::NetworkFallback if self.fallback.is_armed() => {
                self.notify(ctx, &["WIFI FALLBACK", "Already active"], now_ms);
                CommandOutcome::AlreadyActive
            }
            SystemMode::NetworkFallback | SystemMode::RadioActive => {
                self.notify(ctx, &["WIFI FALLBACK", "Activating..."], now_ms);
                self.begin_fallback(ctx, now_ms);
                CommandOutcome::Accepted
            }
        }
    }

    fn begin_fallback(&mut self, ctx: &mut DeviceContext, now_ms: u64) {
        ctx.failures.set_fallback_active(true);
        self.radio.quiesce(ctx, now_ms);
        self.target = Some(SwitchTarget::ToFallback);
        self.set_mode(SystemMode::Switching);
    }

    fn advance_switch(&mut self, ctx: &mut DeviceContext, now_ms: u64) {
        let Some(target) = self.target else {
            return;
        };

        match target {
            SwitchTarget::ToFallback => {
                // Keep servicing the MAC so an in-flight uplink can finish.
                let _ = self.radio.tick(ctx, &mut self.sensors, now_ms);
                if self.radio.quiesce(ctx, now_ms) == QuiesceStatus::Draining {
                    return;
                }
                self.target = None;

                match self.fallback.connect() {
                    Ok(()) => {
                        self.last_connect_failure = None;
                        self.set_mode(SystemMode::NetworkFallback);
                        ctx.display.set_keep_awake(true, now_ms);
                        self.next_refresh_ms = Some(now_ms);
                    }
                    Err(reason) => {
                        warn!(%reason, "fallback connect failed, reverting to radio");
                        self.last_connect_failure = Some(reason);
                        self.notify(ctx, &["WIFI FAILED", "Retrying radio..."], now_ms);
                        self.enter_radio(ctx, now_ms);
                    }
                }
            }
            SwitchTarget::ToRadio => {
                self.target = None;
                self.fallback.disconnect();
                self.enter_radio(ctx, now_ms);
            }
        }
    }

    fn enter_radio(&mut self, ctx: &mut DeviceContext, now_ms: u64) {
        debug_assert!(!self.fallback.is_armed());
        ctx.failures.reset();
        ctx.failures.set_fallback_active(false);
        ctx.display.set_keep_awake(false, now_ms);
        self.next_refresh_ms = None;

        self.radio.arm();
        self.set_mode(SystemMode::RadioActive);
        if let Err(err) = self.radio.start_join(ctx, now_ms) {
            warn!(%err, "join rejected on radio entry, retry scheduled");
        }
    }

    fn serve(&mut self, ctx: &mut DeviceContext, now_ms: u64) -> usize {
        if !self.fallback.is_armed() {
            return 0;
        }

        if self.next_refresh_ms.is_some_and(|at| now_ms >= at) {
            let snapshot = self.sensors.capture(ctx.uptime_seconds(now_ms));
            ctx.latest = Some(snapshot);
            self.next_refresh_ms = Some(now_ms.saturating_add(self.sensor_refresh_ms));
        }

        let mode = self.mode;
        let snapshot_ctx: &DeviceContext = ctx;
        let result = self
            .fallback
            .poll(&mut || StatusReport::from_context(snapshot_ctx, mode, now_ms).render());

        match result {
            Ok(served) => served,
            Err(NetworkError::LinkLost(reason)) => {
                warn!(%reason, "fallback link lost, reverting to radio");
                self.last_connect_failure = Some(reason);
                self.notify(ctx, &["WIFI LOST", "Retrying radio..."], now_ms);
                self.enter_radio(ctx, now_ms);
                0
            }
            Err(err) => {
                warn!(%err, "fallback poll failed");
                0
            }
        }
    }

    fn notify(&mut self, ctx: &mut DeviceContext, lines: &[&str], now_ms: u64) {
        ctx.display.show(lines, now_ms);
        self.diagnostics.hold(now_ms);
    }

    fn set_mode(&mut self, mode: SystemMode) {
        if self.mode != mode {
            info!(from = ?self.mode, to = ?mode, "mode transition");
            self.mode = mode;
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current mode.
    pub fn mode(&self) -> SystemMode {
        self.mode
    }

    /// Number of transports currently permitted to perform I/O (0 or 1).
    pub fn armed_transports(&self) -> usize {
        usize::from(self.radio.is_armed()) + usize::from(self.fallback.is_armed())
    }

    /// Reason the most recent fallback connect or reconnect failed.
    pub fn last_connect_failure(&self) -> Option<ConnectFailure> {
        self.last_connect_failure
    }

    /// Status document for the current state.
    pub fn status(&self, ctx: &DeviceContext, now_ms: u64) -> StatusReport {
        StatusReport::from_context(ctx, self.mode, now_ms)
    }

    /// Firmware build identifier.
    pub fn build(&self) -> &str {
        self.build.as_str()
    }

    /// The radio session manager.
    pub fn radio(&self) -> &RadioSessionManager<R> {
        &self.radio
    }

    /// Mutable access to the radio session manager.
    pub fn radio_mut(&mut self) -> &mut RadioSessionManager<R> {
        &mut self.radio
    }

    /// The network fallback manager.
    pub fn fallback(&self) -> &NetworkFallbackManager<N> {
        &self.fallback
    }

    /// Mutable access to the network fallback manager.
    pub fn fallback_mut(&mut self) -> &mut NetworkFallbackManager<N> {
        &mut self.fallback
    }

    /// Mutable access to the sensor subsystem.
    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RadioConfig;
    use crate::hal::{MockNetwork, MockRadio, MockSensors};

    type Node = TransportModeController<MockRadio, MockNetwork, MockSensors>;

    fn configured() -> NodeConfig {
        NodeConfig::default().with_radio(RadioConfig::default().with_keys([1; 8], [2; 8], [3; 16]))
    }

    fn boot(config: &NodeConfig) -> (Node, DeviceContext) {
        let mut ctx = DeviceContext::from_config(config, 0);
        let node = TransportModeController::new(
            config,
            MockRadio::new(),
            MockNetwork::new(),
            MockSensors::new(),
            &mut ctx,
            0,
        )
        .unwrap();
        (node, ctx)
    }

    #[test]
    fn boots_idle_in_fallback_mode() {
        let (node, ctx) = boot(&configured());
        assert_eq!(node.mode(), SystemMode::NetworkFallback);
        assert_eq!(node.armed_transports(), 0);
        assert_eq!(ctx.stats.join_attempts, 0);
        assert!(ctx.display.lines().next().unwrap().starts_with("BUILD: "));
    }

    #[test]
    fn missing_credentials_pin_error() {
        let config = NodeConfig::default();
        let mut ctx = DeviceContext::from_config(&config, 0);
        let result = TransportModeController::new(
            &config,
            MockRadio::new(),
            MockNetwork::new(),
            MockSensors::new(),
            &mut ctx,
            0,
        );
        assert_eq!(result.err(), Some(NodeError::ConfigurationMissing));
        assert!(ctx.display.is_pinned());
        let lines: alloc::vec::Vec<&str> = ctx.display.lines().collect();
        assert_eq!(lines, ["ERROR", "No radio config", "Check credentials"]);
    }

    #[test]
    fn invalid_bands_rejected() {
        let config = configured().with_button(
            crate::config::ButtonConfig::default().with_bands(100, 5_000, 3_000, 8_000),
        );
        let mut ctx = DeviceContext::from_config(&config, 0);
        let result = TransportModeController::new(
            &config,
            MockRadio::new(),
            MockNetwork::new(),
            MockSensors::new(),
            &mut ctx,
            0,
        );
        assert!(matches!(result, Err(NodeError::InvalidConfig(_))));
    }

    #[test]
    fn gap_press_is_ignored() {
        let (mut node, mut ctx) = boot(&configured());
        let report = node.tick(&mut ctx, 10, Some(ButtonPressEvent::new(2_000)));
        assert_eq!(report.command, None);
        assert_eq!(node.mode(), SystemMode::NetworkFallback);
    }

    #[test]
    fn restart_is_reported_to_caller() {
        let (mut node, mut ctx) = boot(&configured());
        let report = node.tick(&mut ctx, 10, Some(ButtonPressEvent::new(9_000)));
        assert!(report.restart_requested());
        assert_eq!(ctx.display.lines().next(), Some("RESTART"));
    }

    #[test]
    fn status_reports_mode() {
        let (node, ctx) = boot(&configured());
        assert_eq!(node.status(&ctx, 5_000).mode, SystemMode::NetworkFallback);
        assert_eq!(node.status(&ctx, 5_000).uptime_seconds, 5);
    }
}
