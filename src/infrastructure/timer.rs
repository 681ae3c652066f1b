use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Exponential backoff for reconnection attempts.
///
/// Delays double from `base` up to `max`; with jitter enabled each delay is
/// scaled by a random factor in `[0.5, 1.0]` so a fleet of clients does not
/// reconnect in lockstep.
pub struct Backoff {
    attempts: u32,
    base: Duration,
    max: Duration,
    jitter: bool,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter: bool) -> Self {
        Self {
            attempts: 0,
            base,
            max,
            jitter,
        }
    }

    /// Attempts consumed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Get the next delay duration, advancing the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self
            .base
            .saturating_mul(1u32.checked_shl(self.attempts).unwrap_or(u32::MAX))
            .min(self.max);
        self.attempts += 1;

        if self.jitter {
            let millis = exp.as_millis() as u64;
            let jittered = rand::thread_rng().gen_range(millis / 2..=millis.max(1));
            Duration::from_millis(jittered)
        } else {
            exp
        }
    }

    /// Reset the attempt counter (after a successful connection).
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Sleep for the next backoff delay.
    pub async fn wait(&mut self) {
        let delay = self.next_delay();
        tracing::debug!("Backing off for {:?}", delay);
        sleep(delay).await;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(crate::types::constants::RECONNECT_BASE_DELAY),
            Duration::from_millis(crate::types::constants::RECONNECT_MAX_DELAY),
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_up_to_max() {
        let mut backoff = Backoff::new(
            Duration::from_millis(100),
            Duration::from_millis(1000),
            false,
        );

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.next_delay(), Duration::from_millis(800));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.attempts(), 6);
    }

    #[test]
    fn test_reset_restarts_the_sequence() {
        let mut backoff = Backoff::new(
            Duration::from_millis(100),
            Duration::from_millis(1000),
            false,
        );

        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut backoff = Backoff::new(
            Duration::from_millis(1000),
            Duration::from_millis(4000),
            true,
        );

        for expected_cap in [1000u64, 2000, 4000, 4000] {
            let delay = backoff.next_delay().as_millis() as u64;
            assert!(delay >= expected_cap / 2, "delay {} too small", delay);
            assert!(delay <= expected_cap, "delay {} too large", delay);
        }
    }
}
