//! Capped exponential backoff between join attempts.

use crate::config::BackoffConfig;

/// Join retry policy: `initial * multiplier^n`, never above `cap`.
///
/// # Example
///
/// ```rust
/// use allsky_node::backoff::JoinBackoff;
/// use allsky_node::config::BackoffConfig;
///
/// let mut backoff = JoinBackoff::new(&BackoffConfig::default());
/// assert_eq!(backoff.next_delay(), 10_000);
/// assert_eq!(backoff.next_delay(), 20_000);
/// assert_eq!(backoff.next_delay(), 40_000);
/// backoff.reset();
/// assert_eq!(backoff.next_delay(), 10_000);
/// ```
#[derive(Clone, Debug)]
pub struct JoinBackoff {
    initial_ms: u64,
    multiplier: u64,
    cap_ms: u64,
    current_ms: u64,
    retries: u32,
}

impl JoinBackoff {
    /// Creates a policy from configuration.
    pub fn new(config: &BackoffConfig) -> Self {
        let initial_ms = config.initial_ms.max(1);
        Self {
            initial_ms,
            multiplier: u64::from(config.multiplier.max(1)),
            cap_ms: config.cap_ms.max(initial_ms),
            current_ms: initial_ms,
            retries: 0,
        }
    }

    /// Delay before the next retry, advancing the policy.
    pub fn next_delay(&mut self) -> u64 {
        let delay = self.current_ms;
        self.current_ms = self
            .current_ms
            .saturating_mul(self.multiplier)
            .min(self.cap_ms);
        self.retries = self.retries.saturating_add(1);
        delay
    }

    /// Return to the initial delay after a successful join.
    pub fn reset(&mut self) {
        self.current_ms = self.initial_ms;
        self.retries = 0;
    }

    /// Retries scheduled since the last reset.
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_to_cap_and_stays() {
        let mut b = JoinBackoff::new(
            &BackoffConfig::default()
                .with_initial_ms(1_000)
                .with_multiplier(3)
                .with_cap_ms(10_000),
        );
        let delays: [u64; 5] = core::array::from_fn(|_| b.next_delay());
        assert_eq!(delays, [1_000, 3_000, 9_000, 10_000, 10_000]);
        assert_eq!(b.retries(), 5);
    }

    #[test]
    fn default_policy_reaches_ten_minutes() {
        let mut b = JoinBackoff::new(&BackoffConfig::default());
        let mut last = 0;
        for _ in 0..20 {
            last = b.next_delay();
        }
        assert_eq!(last, 600_000);
    }

    #[test]
    fn multiplier_one_is_constant() {
        let mut b = JoinBackoff::new(&BackoffConfig::default().with_multiplier(1));
        assert_eq!(b.next_delay(), 10_000);
        assert_eq!(b.next_delay(), 10_000);
    }

    #[test]
    fn does_not_overflow() {
        let mut b = JoinBackoff::new(
            &BackoffConfig::default()
                .with_multiplier(u32::MAX)
                .with_cap_ms(u64::MAX),
        );
        for _ in 0..10 {
            b.next_delay();
        }
        assert_eq!(b.next_delay(), u64::MAX);
    }
}
