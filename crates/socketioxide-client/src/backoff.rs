use std::time::Duration;

use crate::config::ReconnectionConfig;

/// Exponential backoff between reconnection attempts.
///
/// The n-th delay is `delay * 2^n`, randomly deviated by up to `randomization_factor`
/// of itself and then capped to `max_delay`.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    delay: Duration,
    max_delay: Duration,
    factor: f64,
    max_attempts: Option<u32>,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: &ReconnectionConfig) -> Self {
        Self {
            delay: config.delay,
            max_delay: config.max_delay,
            factor: config.randomization_factor.clamp(0.0, 1.0),
            // A disabled reconnection is a backoff without any attempt.
            max_attempts: if config.enabled {
                config.max_attempts
            } else {
                Some(0)
            },
            attempts: 0,
        }
    }

    /// The delay before the next attempt, `None` once every attempt was made.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| self.attempts >= max) {
            return None;
        }
        let exp = 2f64.powi(self.attempts.min(32) as i32);
        let mut ms = self.delay.as_millis() as f64 * exp;
        if self.factor > 0.0 {
            let deviation = rand::random::<f64>() * self.factor * ms;
            if rand::random::<bool>() {
                ms += deviation;
            } else {
                ms -= deviation;
            }
        }
        self.attempts += 1;
        let ms = ms.min(self.max_delay.as_millis() as f64).max(0.0);
        Some(Duration::from_millis(ms as u64))
    }

    /// The number of attempts made since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
