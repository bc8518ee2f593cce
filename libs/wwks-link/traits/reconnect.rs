use async_trait::async_trait;
use std::time::Duration;

/// Trait for defining reconnection strategies
///
/// Implement this trait to control how the reconnect supervisor paces
/// its attempts and when it gives up.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the wait that follows a failed attempt
    ///
    /// # Arguments
    /// * `attempt` - Zero-based index of the attempt that just failed
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before continuing
    /// * `None` - No such attempt is allowed
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Check if another attempt is allowed
    ///
    /// # Arguments
    /// * `attempt` - Number of attempts already made
    fn should_reconnect(&self, attempt: usize) -> bool;

    /// Upper bound on attempts, if any
    fn max_attempts(&self) -> Option<usize>;
}

/// Fixed delay reconnection strategy
///
/// Always waits the same amount of time between reconnection attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    /// Create a new fixed delay strategy
    ///
    /// # Arguments
    /// * `delay` - The fixed delay between reconnects
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self { delay, max_attempts }
    }

    /// The robot link policy: every 5 seconds, at most 10 attempts
    pub fn robot_default() -> Self {
        Self::new(Duration::from_secs(5), Some(10))
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay)
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }

    fn max_attempts(&self) -> Option<usize> {
        self.max_attempts
    }
}

/// Something the reconnect supervisor can drive
///
/// Implemented by [`crate::PickupClient`]; tests substitute scripted fakes.
#[async_trait]
pub trait Reconnectable: Send + Sync + 'static {
    /// Whether a connection is currently established
    fn is_connected(&self) -> bool;

    /// Attempt a connection, reporting success
    async fn connect(&self, host: &str, port: i32) -> bool;

    /// Called once when the strategy is exhausted without success
    fn on_exhausted(&self, attempts: usize);

    /// Diagnostic output
    fn log(&self, text: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay_with_max_attempts() {
        let strategy = FixedDelay::new(Duration::from_millis(500), Some(3));

        assert!(strategy.next_delay(0).is_some());
        assert!(strategy.next_delay(1).is_some());
        assert!(strategy.next_delay(2).is_some());
        assert!(strategy.next_delay(3).is_none());
        assert_eq!(strategy.max_attempts(), Some(3));
    }

    #[test]
    fn test_fixed_delay_unlimited() {
        let strategy = FixedDelay::new(Duration::from_millis(750), None);

        for attempt in 0..100 {
            assert_eq!(strategy.next_delay(attempt), Some(Duration::from_millis(750)));
        }
    }

    #[test]
    fn test_robot_default_policy() {
        let strategy = FixedDelay::robot_default();
        assert_eq!(strategy.next_delay(0), Some(Duration::from_secs(5)));
        assert!(strategy.should_reconnect(9));
        assert!(!strategy.should_reconnect(10));
    }
}
