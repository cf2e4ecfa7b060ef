//! Exponential-backoff policy for re-establishing a dropped channel.
//!
//! An unexpected close schedules reconnect attempts with growing delays
//! until either a connection succeeds, the attempt budget is exhausted, or
//! the session is intentionally closed. An intentional `disconnect()` never
//! triggers reconnection.

use std::time::Duration;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Attempts before giving up and staying disconnected.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    /// A config that never reconnects (for tests and one-shot tools).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles() {
        let config = ReconnectConfig::default();
        assert_eq!(
            next_delay(Duration::from_secs(1), &config),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_delay_clamps_at_max() {
        let config = ReconnectConfig::default();
        assert_eq!(
            next_delay(Duration::from_secs(20), &config),
            Duration::from_secs(30)
        );
        assert_eq!(
            next_delay(Duration::from_secs(30), &config),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_full_backoff_sequence() {
        let config = ReconnectConfig::default();
        let mut delay = config.initial_delay;
        for expected_secs in [1, 2, 4, 8, 16, 30, 30] {
            assert_eq!(delay.as_secs(), expected_secs);
            delay = next_delay(delay, &config);
        }
    }

    #[test]
    fn test_disabled_config() {
        assert_eq!(ReconnectConfig::disabled().max_attempts, 0);
    }
}
