//! Reconnection policy: a pure decision object over a configured backoff
//! table. It owns no timers and performs no I/O; the coordinator asks it
//! whether to retry and how long to wait, and drives the clock itself.

use crate::config::ConnectionConfig;

/// Snapshot of where the retry budget currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectProgress {
    pub current_attempts: u32,
    pub max_attempts: u32,
    /// `round(current / max * 100)`.
    pub percentage: u32,
    pub next_delay_ms: u64,
    pub can_reconnect: bool,
}

/// Partial update merged into the existing policy configuration.
/// `None` fields keep their current value; merging never resets the
/// attempt counter.
#[derive(Debug, Clone, Default)]
pub struct ReconnectConfigUpdate {
    pub max_attempts: Option<u32>,
    pub intervals_ms: Option<Vec<u64>>,
    pub disabled: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ReconnectStrategy {
    max_attempts: u32,
    intervals_ms: Vec<u64>,
    disabled: bool,
    attempts: u32,
}

impl ReconnectStrategy {
    pub fn new(config: &ConnectionConfig) -> Self {
        Self {
            max_attempts: config.max_reconnect_attempts,
            intervals_ms: config.reconnect_intervals_ms.clone(),
            disabled: config.disable_reconnect,
            attempts: 0,
        }
    }

    /// `false` once the policy is disabled or the budget is spent.
    pub fn should_reconnect(&self) -> bool {
        !self.disabled && self.attempts < self.max_attempts
    }

    /// `true` unless the policy has been disabled (budget ignored).
    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// Advances the counter and returns the new attempt number (1-based).
    pub fn increment_attempts(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Delay for the upcoming attempt: the table indexed by the current
    /// counter, clamped to the last entry so the backoff plateaus instead of
    /// erroring or wrapping.
    pub fn get_next_delay(&self) -> u64 {
        delay_at(&self.intervals_ms, self.attempts)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn current_attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn progress(&self) -> ReconnectProgress {
        let percentage = if self.max_attempts == 0 {
            0
        } else {
            ((self.attempts as f64 / self.max_attempts as f64) * 100.0).round() as u32
        };
        ReconnectProgress {
            current_attempts: self.attempts,
            max_attempts: self.max_attempts,
            percentage,
            next_delay_ms: self.get_next_delay(),
            can_reconnect: self.should_reconnect(),
        }
    }

    /// Worst-case total wait across the whole retry budget, using the
    /// clamped tail value for attempts beyond the table length.
    pub fn estimated_total_reconnect_time(&self) -> u64 {
        (0..self.max_attempts)
            .map(|attempt| delay_at(&self.intervals_ms, attempt))
            .sum()
    }

    pub fn update_config(&mut self, update: ReconnectConfigUpdate) {
        if let Some(max_attempts) = update.max_attempts {
            self.max_attempts = max_attempts;
        }
        if let Some(intervals_ms) = update.intervals_ms {
            self.intervals_ms = intervals_ms;
        }
        if let Some(disabled) = update.disabled {
            self.disabled = disabled;
        }
    }
}

fn delay_at(intervals_ms: &[u64], attempt: u32) -> u64 {
    if intervals_ms.is_empty() {
        return 0;
    }
    let index = (attempt as usize).min(intervals_ms.len() - 1);
    intervals_ms[index]
}
