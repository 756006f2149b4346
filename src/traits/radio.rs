//! Boundary to the wide-area radio MAC stack.
//!
//! The MAC (LoRaWAN on the reference hardware) is a black box: the node asks
//! it to join or transmit and learns the outcome from an event stream. The
//! MAC is latency-sensitive, so its event loop is serviced through
//! [`RadioMac::run_once`] from the cooperative loop and must never be called
//! from a path that blocks.

use crate::error::RadioError;

/// Outcome details of a completed uplink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TxReport {
    /// RSSI of the last received frame, in dBm.
    pub rssi: i16,
    /// SNR of the last received frame, in dB.
    pub snr: i8,
    /// The network acknowledged a confirmed uplink.
    pub ack: bool,
    /// Bytes of downlink payload received in the RX windows.
    pub downlink_len: u8,
}

/// Asynchronous events reported by the MAC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadioEvent {
    /// The MAC started an over-the-air join.
    JoinStarted,
    /// Join accepted; session keys are in place.
    Joined,
    /// Join attempt failed.
    JoinFailed,
    /// An uplink left the radio.
    TxStarted,
    /// Uplink finished, including RX windows.
    TxComplete(TxReport),
    /// The MAC dropped a queued uplink.
    TxCanceled,
    /// The MAC declared the link dead (no downlinks for a long time).
    LinkDead,
    /// A downlink arrived after the link was declared dead.
    LinkAlive,
}

/// Driving interface of a radio MAC stack.
///
/// Implementations queue events internally; [`poll_event`](Self::poll_event)
/// hands them out one at a time in order.
pub trait RadioMac {
    /// Reset MAC state, discarding any session and pending uplink.
    fn reset(&mut self) -> Result<(), RadioError>;

    /// Begin an over-the-air join.
    fn join(&mut self) -> Result<(), RadioError>;

    /// Queue one uplink. Fails with [`RadioError::Busy`] if one is pending.
    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError>;

    /// Whether a transmit or receive is pending.
    fn is_busy(&self) -> bool;

    /// Service the MAC's internal scheduler once. Must not block.
    fn run_once(&mut self);

    /// Next queued event, if any.
    fn poll_event(&mut self) -> Option<RadioEvent>;
}
