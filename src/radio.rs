//! Radio session lifecycle: join, periodic uplinks, retry and quiesce.
//!
//! ```text
//!            start_join              Joined
//!   Idle ─────────────► Joining ───────────► Joined ◄──────────┐
//!                          │                   │ cycle due      │ TxComplete
//!                 JoinFailed (backoff retry)   ▼                │ TxCanceled
//!                          └──► JoinFailed   Transmitting ──────┘ timeout
//! ```
//!
//! The manager only drives the MAC while *armed*, or while *draining* an
//! in-flight uplink after a quiesce request. Once quiesced it never calls
//! into the MAC again until re-armed.

use tracing::{debug, info, warn};

use crate::backoff::JoinBackoff;
use crate::config::NodeConfig;
use crate::context::DeviceContext;
use crate::error::RadioError;
use crate::failure::FailureSignal;
use crate::payload::{PayloadCodec, TelemetryFrame};
use crate::snapshot::LinkQuality;
use crate::traits::{RadioEvent, RadioMac, SensorSource, TxReport};

/// Radio session state, driven by MAC events and internal timeouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RadioSessionState {
    /// Not joined and not trying to.
    #[default]
    Idle,
    /// Join in progress.
    Joining,
    /// Joined; waiting for the next cycle.
    Joined,
    /// An uplink is in flight.
    Transmitting,
    /// Last join failed; a retry is scheduled.
    JoinFailed,
    /// The MAC reported the link dead. Uplinks continue.
    LinkDead,
}

/// Result of a quiesce request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuiesceStatus {
    /// No radio I/O will happen until re-armed.
    Quiesced,
    /// Waiting for an in-flight uplink to finish.
    Draining,
}

/// Bookkeeping for the uplink currently in flight.
#[derive(Clone, Copy, Debug)]
struct PendingCycle {
    started_ms: u64,
    frame: TelemetryFrame,
}

/// Drives a [`RadioMac`] through join/transmit cycles.
pub struct RadioSessionManager<R: RadioMac> {
    mac: R,
    state: RadioSessionState,
    armed: bool,
    drain_deadline_ms: Option<u64>,
    joined: bool,
    link_dead: bool,
    pending: Option<PendingCycle>,
    next_cycle_ms: Option<u64>,
    next_join_ms: Option<u64>,
    backoff: JoinBackoff,
    tx_interval_ms: u64,
    settle_delay_ms: u64,
    cycle_timeout_ms: u64,
    quiesce_grace_ms: u64,
    last_frame: Option<TelemetryFrame>,
    /// Threshold signal from a rejected join, handed out by the next `tick`.
    rejected_join_signal: Option<FailureSignal>,
}

impl<R: RadioMac> RadioSessionManager<R> {
    /// Creates a disarmed, idle manager.
    pub fn new(mac: R, config: &NodeConfig) -> Self {
        Self {
            mac,
            state: RadioSessionState::Idle,
            armed: false,
            drain_deadline_ms: None,
            joined: false,
            link_dead: false,
            pending: None,
            next_cycle_ms: None,
            next_join_ms: None,
            backoff: JoinBackoff::new(&config.backoff),
            tx_interval_ms: config.cycle.tx_interval_ms,
            settle_delay_ms: config.cycle.settle_delay_ms,
            cycle_timeout_ms: config.cycle.cycle_timeout_ms,
            quiesce_grace_ms: config.cycle.quiesce_grace_ms,
            last_frame: None,
            rejected_join_signal: None,
        }
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Permit the manager to drive the MAC.
    pub fn arm(&mut self) {
        self.armed = true;
        self.drain_deadline_ms = None;
    }

    /// Reset the MAC and start a fresh over-the-air join.
    ///
    /// Counts as a join attempt whether or not the MAC accepts it. A MAC
    /// error counts as a failed join and schedules a backoff retry; if that
    /// failure crosses the threshold, the next [`tick`](Self::tick) returns
    /// the signal.
    pub fn start_join(&mut self, ctx: &mut DeviceContext, now_ms: u64) -> Result<(), RadioError> {
        if !self.armed {
            return Err(RadioError::NotArmed);
        }

        ctx.stats.join_attempts = ctx.stats.join_attempts.saturating_add(1);
        ctx.stats.last_join_attempt_ms = Some(now_ms);
        ctx.stats.joined = false;
        self.joined = false;
        self.link_dead = false;
        self.pending = None;
        self.next_cycle_ms = None;
        self.next_join_ms = None;
        self.state = RadioSessionState::Joining;

        info!(attempt = ctx.stats.join_attempts, "starting radio join");

        let result = self.mac.reset().and_then(|()| self.mac.join());
        if let Err(err) = result {
            warn!(%err, "radio join request rejected");
            self.state = RadioSessionState::JoinFailed;
            self.next_join_ms = Some(now_ms.saturating_add(self.backoff.next_delay()));
            if let Some(signal) = ctx.failures.record_outcome(false) {
                self.rejected_join_signal = Some(signal);
            }
        }
        result
    }

    /// Stop scheduling work and release the MAC.
    ///
    /// Call repeatedly until it returns [`QuiesceStatus::Quiesced`]. An
    /// uplink in flight is given `quiesce_grace_ms` to finish (keep calling
    /// [`tick`](Self::tick) meanwhile); after that the MAC is force-stopped.
    /// A force-stopped uplink is not counted as a failed cycle.
    pub fn quiesce(&mut self, ctx: &mut DeviceContext, now_ms: u64) -> QuiesceStatus {
        if self.armed {
            self.armed = false;
            self.next_cycle_ms = None;
            self.next_join_ms = None;
            if self.pending.is_some() {
                let deadline = now_ms.saturating_add(self.quiesce_grace_ms);
                self.drain_deadline_ms = Some(deadline);
                info!(deadline_ms = deadline, "radio draining in-flight uplink");
            }
        }

        match (self.pending, self.drain_deadline_ms) {
            (Some(_), Some(deadline)) if now_ms < deadline => QuiesceStatus::Draining,
            (Some(_), _) => {
                warn!("quiesce grace expired, force-stopping radio");
                self.pending = None;
                self.release(ctx);
                QuiesceStatus::Quiesced
            }
            (None, _) => {
                if self.drain_deadline_ms.is_some() || self.state != RadioSessionState::Idle {
                    self.release(ctx);
                }
                QuiesceStatus::Quiesced
            }
        }
    }

    fn release(&mut self, ctx: &mut DeviceContext) {
        if let Err(err) = self.mac.reset() {
            warn!(%err, "radio reset failed during quiesce");
        }
        self.drain_deadline_ms = None;
        self.rejected_join_signal = None;
        self.joined = false;
        self.link_dead = false;
        ctx.stats.joined = false;
        self.state = RadioSessionState::Idle;
        self.backoff.reset();
        info!("radio quiesced");
    }

    // ========================================================================
    // Loop
    // ========================================================================

    /// Service the MAC, apply timeouts and start due work.
    ///
    /// Does nothing at all unless armed or draining.
    pub fn tick<S: SensorSource>(
        &mut self,
        ctx: &mut DeviceContext,
        sensors: &mut S,
        now_ms: u64,
    ) -> Option<FailureSignal> {
        let rejected = self.rejected_join_signal.take();
        if !self.is_armed() {
            return None;
        }

        self.mac.run_once();

        let mut signal = rejected;
        while let Some(event) = self.mac.poll_event() {
            signal = signal.or(self.handle_event(event, ctx, now_ms));
        }

        if let Some(cycle) = self.pending {
            if now_ms.saturating_sub(cycle.started_ms) >= self.cycle_timeout_ms {
                warn!(
                    started_ms = cycle.started_ms,
                    timeout_ms = self.cycle_timeout_ms,
                    "uplink timed out"
                );
                self.pending = None;
                self.state = self.settled_state();
                self.schedule_next_cycle(now_ms);
                signal = signal.or(ctx.failures.record_outcome(false));
            }
        }

        if !self.armed {
            return signal;
        }

        if self.next_join_ms.is_some_and(|at| now_ms >= at) {
            if self.start_join(ctx, now_ms).is_err() {
                signal = signal.or(self.rejected_join_signal.take());
            }
        }

        if self.joined && self.pending.is_none() && self.next_cycle_ms.is_some_and(|at| now_ms >= at)
        {
            signal = signal.or(self.start_cycle(ctx, sensors, now_ms));
        }

        signal
    }

    fn handle_event(
        &mut self,
        event: RadioEvent,
        ctx: &mut DeviceContext,
        now_ms: u64,
    ) -> Option<FailureSignal> {
        debug!(?event, "radio event");
        match event {
            RadioEvent::JoinStarted => {
                self.state = RadioSessionState::Joining;
                None
            }
            RadioEvent::Joined => {
                info!(attempts = ctx.stats.join_attempts, "radio joined");
                self.joined = true;
                ctx.stats.joined = true;
                self.state = RadioSessionState::Joined;
                self.backoff.reset();
                self.next_join_ms = None;
                self.next_cycle_ms = Some(now_ms.saturating_add(self.settle_delay_ms));
                None
            }
            RadioEvent::JoinFailed => {
                self.joined = false;
                ctx.stats.joined = false;
                self.state = RadioSessionState::JoinFailed;
                if self.armed {
                    let delay = self.backoff.next_delay();
                    info!(retry_in_ms = delay, "radio join failed");
                    self.next_join_ms = Some(now_ms.saturating_add(delay));
                }
                ctx.failures.record_outcome(false)
            }
            RadioEvent::TxStarted => {
                ctx.display.wake(now_ms);
                None
            }
            RadioEvent::TxComplete(report) => self.complete_cycle(report, ctx, now_ms),
            RadioEvent::TxCanceled => {
                if self.pending.take().is_none() {
                    return None;
                }
                warn!("uplink canceled by MAC");
                self.state = self.settled_state();
                self.schedule_next_cycle(now_ms);
                ctx.failures.record_outcome(false)
            }
            RadioEvent::LinkDead => {
                warn!("radio link dead");
                self.link_dead = true;
                if self.pending.is_none() {
                    self.state = self.settled_state();
                }
                None
            }
            RadioEvent::LinkAlive => {
                info!("radio link alive");
                self.link_dead = false;
                if self.pending.is_none() {
                    self.state = self.settled_state();
                }
                None
            }
        }
    }

    fn complete_cycle(
        &mut self,
        report: TxReport,
        ctx: &mut DeviceContext,
        now_ms: u64,
    ) -> Option<FailureSignal> {
        let link = LinkQuality {
            rssi: report.rssi,
            snr: report.snr,
        };
        ctx.stats.last_link = Some(link);

        let Some(cycle) = self.pending.take() else {
            debug!("completion for an uplink no longer tracked");
            return None;
        };

        let stats = &mut ctx.stats;
        stats.tx_count = stats.tx_count.saturating_add(1);
        if report.ack {
            stats.acks = stats.acks.saturating_add(1);
        }
        stats.downlink_bytes = stats
            .downlink_bytes
            .saturating_add(u32::from(report.downlink_len));
        self.last_frame = Some(cycle.frame.with_link_quality(link));

        info!(
            tx_count = stats.tx_count,
            rssi = report.rssi,
            snr = report.snr,
            ack = report.ack,
            downlink_len = report.downlink_len,
            "uplink complete"
        );

        if report.ack || report.downlink_len > 0 {
            self.link_dead = false;
        }
        self.state = self.settled_state();
        self.schedule_next_cycle(now_ms);
        ctx.failures.record_outcome(true)
    }

    fn start_cycle<S: SensorSource>(
        &mut self,
        ctx: &mut DeviceContext,
        sensors: &mut S,
        now_ms: u64,
    ) -> Option<FailureSignal> {
        if self.mac.is_busy() {
            debug!("radio MAC busy, skipping cycle");
            self.schedule_next_cycle(now_ms);
            return None;
        }

        let snapshot = sensors.capture(ctx.uptime_seconds(now_ms));
        ctx.latest = Some(snapshot);
        let frame = PayloadCodec::encode(&snapshot);

        match self.mac.transmit(frame.as_bytes()) {
            Ok(()) => {
                debug!(uptime = snapshot.uptime_seconds, "uplink queued");
                self.pending = Some(PendingCycle {
                    started_ms: now_ms,
                    frame,
                });
                self.next_cycle_ms = None;
                self.state = RadioSessionState::Transmitting;
                None
            }
            Err(err) => {
                warn!(%err, "uplink rejected by MAC");
                self.schedule_next_cycle(now_ms);
                ctx.failures.record_outcome(false)
            }
        }
    }

    fn schedule_next_cycle(&mut self, now_ms: u64) {
        self.next_cycle_ms = Some(now_ms.saturating_add(self.tx_interval_ms));
    }

    fn settled_state(&self) -> RadioSessionState {
        match (self.joined, self.link_dead) {
            (true, true) => RadioSessionState::LinkDead,
            (true, false) => RadioSessionState::Joined,
            (false, _) => RadioSessionState::Idle,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Whether the manager may perform radio I/O (armed or draining).
    pub fn is_armed(&self) -> bool {
        self.armed || self.drain_deadline_ms.is_some()
    }

    /// Whether the session is joined.
    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// Current session state.
    pub fn state(&self) -> RadioSessionState {
        self.state
    }

    /// Whether an uplink is in flight.
    pub fn has_pending_cycle(&self) -> bool {
        self.pending.is_some()
    }

    /// When the next cycle is due, if scheduled.
    pub fn next_cycle_ms(&self) -> Option<u64> {
        self.next_cycle_ms
    }

    /// When the next join retry is due, if scheduled.
    pub fn next_join_ms(&self) -> Option<u64> {
        self.next_join_ms
    }

    /// Last completed frame with its link quality filled in.
    pub fn last_frame(&self) -> Option<&TelemetryFrame> {
        self.last_frame.as_ref()
    }

    /// The underlying MAC.
    pub fn mac(&self) -> &R {
        &self.mac
    }

    /// Mutable access to the underlying MAC.
    pub fn mac_mut(&mut self) -> &mut R {
        &mut self.mac
    }
}
