//! Reconnection bookkeeping.
//!
//! Provides exponential backoff with jitter for transports that replace a
//! dropped connection. The default is unlimited attempts; the subscription
//! path keeps a connection alive for the lifetime of the process.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::{StreamError, StreamResult, DEFAULT_RECONNECT_DELAY, MAX_RECONNECT_DELAY};

/// Reconnection configuration.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnection attempts. `None` means unlimited.
    pub max_attempts: Option<u32>,
    /// Initial delay before first reconnection.
    pub initial_delay: Duration,
    /// Maximum delay between reconnections.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
    /// Whether to add jitter.
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: DEFAULT_RECONNECT_DELAY,
            max_delay: MAX_RECONNECT_DELAY,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ReconnectConfig {
    /// Create a new reconnection configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub const fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Calculate delay for a given attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let delay = if self.jitter {
            // 0.5x to 1.5x
            capped * (0.5 + rand::random::<f64>())
        } else {
            capped
        };

        Duration::from_secs_f64(delay)
    }
}

/// Reconnection handler.
#[derive(Debug)]
pub struct ReconnectHandler {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectHandler {
    /// Create a new reconnection handler.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Reset the reconnection state after a successful connection.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Get the current attempt count.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Check if reconnection is allowed.
    #[must_use]
    pub fn can_reconnect(&self) -> bool {
        match self.config.max_attempts {
            Some(max) => self.attempts < max,
            None => true,
        }
    }

    /// Wait for the next reconnection attempt.
    ///
    /// # Errors
    /// Returns an error once the configured attempt limit is exceeded.
    pub async fn wait_for_reconnect(&mut self) -> StreamResult<()> {
        if !self.can_reconnect() {
            return Err(StreamError::ReconnectLimitExceeded {
                attempts: self.attempts,
            });
        }

        let delay = self.config.delay_for_attempt(self.attempts);
        debug!(
            attempt = self.attempts,
            delay_ms = delay.as_millis(),
            "Waiting before reconnection"
        );

        sleep(delay).await;
        self.attempts += 1;

        Ok(())
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ReconnectConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_config_default_is_unlimited() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_attempts, None);
        assert_eq!(config.initial_delay, DEFAULT_RECONNECT_DELAY);
        assert!(config.jitter);
    }

    #[test]
    fn test_delay_calculation_no_jitter() {
        let config = ReconnectConfig::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(60))
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        // Capped at max
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(60));
    }

    #[test]
    fn test_reconnect_handler_can_reconnect() {
        let config = ReconnectConfig::new().with_max_attempts(3);
        let mut handler = ReconnectHandler::new(config);

        assert!(handler.can_reconnect());
        handler.attempts = 2;
        assert!(handler.can_reconnect());
        handler.attempts = 3;
        assert!(!handler.can_reconnect());
    }

    #[test]
    fn test_reconnect_handler_unlimited() {
        let mut handler = ReconnectHandler::new(ReconnectConfig::default());

        handler.attempts = 1000;
        assert!(handler.can_reconnect());
    }

    #[test]
    fn test_reconnect_handler_reset() {
        let mut handler = ReconnectHandler::new(ReconnectConfig::new());

        handler.attempts = 5;
        handler.reset();
        assert_eq!(handler.attempts(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_reconnect_exhausted() {
        let config = ReconnectConfig::new()
            .with_max_attempts(1)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false);
        let mut handler = ReconnectHandler::new(config);

        handler.wait_for_reconnect().await.unwrap();
        let result = handler.wait_for_reconnect().await;
        assert!(matches!(
            result,
            Err(StreamError::ReconnectLimitExceeded { attempts: 1 })
        ));
    }
}
