//! Interrupt-to-loop handoff for the button and the wind anemometer.
//!
//! Each shared value has exactly one writer in interrupt context and one
//! reader in loop context:
//!
//! - Button edges go through a `heapless::spsc` queue. The interrupt side
//!   owns the [`EdgeRecorder`] (producer) and applies the debounce; the loop
//!   owns the [`PressTracker`] (consumer) and pairs edges into presses.
//! - Wind pulses are counted in a [`PulseCounter`] built on 32-bit atomics,
//!   so no critical section is needed on a 32-bit target. The loop reads and
//!   clears the count in one `swap`.
//!
//! Timestamps are `u32` milliseconds and compared with wrapping arithmetic.

use core::sync::atomic::{AtomicU32, Ordering};

use heapless::spsc::{Consumer, Producer};

use crate::button::ButtonPressEvent;

/// Default edge queue capacity (the queue holds `N - 1` edges).
pub const EDGE_QUEUE_LEN: usize = 8;

/// One debounced button transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonEdge {
    /// `true` on press, `false` on release.
    pub pressed: bool,
    /// Timestamp of the edge.
    pub at_ms: u32,
}

// ============================================================================
// Button
// ============================================================================

/// Interrupt-side button edge recorder.
///
/// # Example
///
/// ```rust
/// use heapless::spsc::Queue;
/// use allsky_node::isr::{EdgeRecorder, PressTracker, EDGE_QUEUE_LEN};
///
/// let mut queue: Queue<_, EDGE_QUEUE_LEN> = Queue::new();
/// let (producer, consumer) = queue.split();
/// let mut recorder = EdgeRecorder::new(producer, 50);
/// let mut tracker = PressTracker::new(consumer);
///
/// recorder.on_edge(true, 1_000);
/// recorder.on_edge(false, 1_500);
/// assert_eq!(tracker.poll().map(|p| p.duration_ms), Some(500));
/// ```
pub struct EdgeRecorder<'q, const N: usize> {
    producer: Producer<'q, ButtonEdge, N>,
    debounce_ms: u32,
    last_edge_ms: Option<u32>,
    last_level: Option<bool>,
    dropped: u32,
}

impl<'q, const N: usize> EdgeRecorder<'q, N> {
    /// Creates a recorder feeding `producer`.
    pub fn new(producer: Producer<'q, ButtonEdge, N>, debounce_ms: u32) -> Self {
        Self {
            producer,
            debounce_ms,
            last_edge_ms: None,
            last_level: None,
            dropped: 0,
        }
    }

    /// Record a raw edge. Returns `true` if the edge was accepted.
    ///
    /// Edges arriving within the debounce interval of the last accepted
    /// edge, or repeating the current level, are discarded. Never blocks.
    pub fn on_edge(&mut self, pressed: bool, now_ms: u32) -> bool {
        if self.last_level == Some(pressed) {
            return false;
        }
        if let Some(last) = self.last_edge_ms {
            if now_ms.wrapping_sub(last) < self.debounce_ms {
                return false;
            }
        }

        let edge = ButtonEdge {
            pressed,
            at_ms: now_ms,
        };
        if self.producer.enqueue(edge).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            return false;
        }
        self.last_edge_ms = Some(now_ms);
        self.last_level = Some(pressed);
        true
    }

    /// Edges lost because the loop fell behind.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

/// Loop-side pairing of button edges into completed presses.
pub struct PressTracker<'q, const N: usize> {
    consumer: Consumer<'q, ButtonEdge, N>,
    pressed_at: Option<u32>,
}

impl<'q, const N: usize> PressTracker<'q, N> {
    /// Creates a tracker draining `consumer`.
    pub fn new(consumer: Consumer<'q, ButtonEdge, N>) -> Self {
        Self {
            consumer,
            pressed_at: None,
        }
    }

    /// Drain queued edges until a press completes.
    ///
    /// Edges after the completed press stay queued for the next call. A
    /// release with no preceding press is dropped.
    pub fn poll(&mut self) -> Option<ButtonPressEvent> {
        while let Some(edge) = self.consumer.dequeue() {
            if edge.pressed {
                self.pressed_at = Some(edge.at_ms);
            } else if let Some(start) = self.pressed_at.take() {
                return Some(ButtonPressEvent::new(edge.at_ms.wrapping_sub(start)));
            }
        }
        None
    }

    /// Whether the button is currently held.
    pub fn is_held(&self) -> bool {
        self.pressed_at.is_some()
    }
}

// ============================================================================
// Wind
// ============================================================================

/// Wind speed represented by one pulse per second.
pub const WIND_MS_PER_HZ: f32 = 0.1;

/// Upper bound of a plausible wind reading.
pub const WIND_MAX_MS: f32 = 70.0;

/// Default minimum spacing between counted pulses.
pub const WIND_DEBOUNCE_MS: u32 = 10;

/// Debounced pulse counter shared between the anemometer interrupt and the loop.
///
/// Can live in a `static`.
#[derive(Debug)]
pub struct PulseCounter {
    count: AtomicU32,
    last_pulse_ms: AtomicU32,
    debounce_ms: u32,
}

impl PulseCounter {
    /// Creates a counter with the given debounce interval.
    pub const fn new(debounce_ms: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            last_pulse_ms: AtomicU32::new(0),
            debounce_ms,
        }
    }

    /// Count one pulse. Call from interrupt context only.
    pub fn on_pulse(&self, now_ms: u32) {
        let last = self.last_pulse_ms.load(Ordering::Relaxed);
        if now_ms.wrapping_sub(last) > self.debounce_ms {
            self.count.fetch_add(1, Ordering::Relaxed);
            self.last_pulse_ms.store(now_ms, Ordering::Relaxed);
        }
    }

    /// Read and clear the pulse count. Call from loop context only.
    pub fn take(&self) -> u32 {
        self.count.swap(0, Ordering::AcqRel)
    }
}

/// Convert pulses counted over `window_ms` into a wind speed.
///
/// Returns `None` for an empty window or an implausible speed, which the
/// sensor subsystem reports as an invalid wind reading.
pub fn wind_speed(pulses: u32, window_ms: u32) -> Option<f32> {
    if window_ms == 0 {
        return None;
    }
    let speed = pulses as f32 * WIND_MS_PER_HZ * 1000.0 / window_ms as f32;
    (0.0..=WIND_MAX_MS).contains(&speed).then_some(speed)
}
