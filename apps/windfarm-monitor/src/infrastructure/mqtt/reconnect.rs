//! Reconnection Policy
//!
//! Bounded retry schedule for the broker connection. The farm broker is
//! retried at a fixed interval by default; a multiplier above `1.0` turns the
//! schedule into exponential backoff capped at `max_delay`, and a jitter
//! factor spreads simultaneous clients apart.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::MqttSettings;

/// Default wait before each automatic reconnect.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default bound on consecutive automatic reconnects.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Reconnection schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Wait before the first automatic attempt.
    pub initial_delay: Duration,
    /// Upper bound on the wait.
    pub max_delay: Duration,
    /// Growth factor per attempt (`1.0` keeps the delay fixed).
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (`0.1` = ±10%).
    pub jitter_factor: f64,
    /// Attempts allowed before giving up (`0` = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY, DEFAULT_MAX_RECONNECT_ATTEMPTS)
    }
}

impl ReconnectConfig {
    /// Fixed delay between at most `max_attempts` attempts.
    #[must_use]
    pub const fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter_factor: 0.0,
            max_attempts,
        }
    }

    /// Schedule configured for the broker connection.
    #[must_use]
    pub const fn from_mqtt_settings(settings: &MqttSettings) -> Self {
        Self {
            initial_delay: settings.reconnect_delay,
            max_delay: settings.reconnect_max_delay,
            multiplier: settings.reconnect_multiplier,
            jitter_factor: settings.reconnect_jitter,
            max_attempts: settings.max_reconnect_attempts,
        }
    }
}

/// Tracks consecutive reconnect attempts and hands out the wait before each.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    next_base: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy with no attempts consumed.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let next_base = config.initial_delay;
        Self {
            config,
            next_base,
            attempts: 0,
        }
    }

    /// Consume one attempt and return the wait before it, or `None` once the
    /// bound is reached.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }
        self.attempts += 1;

        let delay = self.with_jitter(self.next_base);
        self.next_base = self
            .next_base
            .mul_f64(self.config.multiplier.max(1.0))
            .min(self.config.max_delay.max(self.config.initial_delay));
        Some(delay)
    }

    /// Forget consumed attempts after a successful connect.
    pub const fn reset(&mut self) {
        self.next_base = self.config.initial_delay;
        self.attempts = 0;
    }

    /// Attempts consumed since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempts
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempts < self.config.max_attempts
    }

    fn with_jitter(&self, base: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 || base.is_zero() {
            return base;
        }
        let spread = self.config.jitter_factor.min(1.0);
        let factor = rand::rng().random_range((1.0 - spread)..=(1.0 + spread));
        base.mul_f64(factor)
    }
}

/// Terminal reconnection failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconnectError {
    /// Every allowed attempt failed.
    #[error("maximum reconnection attempts ({0}) exceeded")]
    MaxAttemptsExceeded(u32),
}
