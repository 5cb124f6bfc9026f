use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-producer reconnection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Consecutive failures before the extended backoff kicks in.
    pub max_retries: u32,
    /// Pause between successful iterations (rate limiting).
    pub poll_interval_ms: u64,
    /// Pause after a single failed read.
    pub failure_backoff_ms: u64,
    /// Pause once the retry ceiling is reached.
    pub extended_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            poll_interval_ms: 10,
            failure_backoff_ms: 1000,
            extended_backoff_ms: 5000,
        }
    }
}

impl RetryPolicy {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_millis(self.failure_backoff_ms)
    }

    pub fn extended_backoff(&self) -> Duration {
        Duration::from_millis(self.extended_backoff_ms)
    }
}

/// What a producer loop does after one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Ordinary retry; `attempt` counts from 1.
    Retry { attempt: u32 },
    /// Ceiling reached: long sleep, counter already reset.
    Extended,
}

/// Bounded failure counter. Reaching the ceiling escalates once and resets,
/// so reconnection logging stays bounded without ever giving up.
#[derive(Debug, Clone)]
pub struct RetryCounter {
    count: u32,
    ceiling: u32,
}

impl RetryCounter {
    pub fn new(ceiling: u32) -> Self {
        Self {
            count: 0,
            ceiling: ceiling.max(1),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn record_failure(&mut self) -> Escalation {
        self.count += 1;
        if self.count >= self.ceiling {
            self.count = 0;
            Escalation::Extended
        } else {
            Escalation::Retry {
                attempt: self.count,
            }
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Outcome of one producer-loop iteration, mapped to the pause that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStep {
    /// A sample/frame was processed and published.
    Published,
    /// Collaborator connected but had nothing ready.
    Idle,
    /// Read failed; short backoff.
    Retrying { attempt: u32 },
    /// Retry ceiling reached; long backoff.
    ExtendedBackoff,
}

impl LoopStep {
    pub fn from_escalation(escalation: Escalation) -> Self {
        match escalation {
            Escalation::Retry { attempt } => LoopStep::Retrying { attempt },
            Escalation::Extended => LoopStep::ExtendedBackoff,
        }
    }

    pub fn pause(&self, policy: &RetryPolicy) -> Duration {
        match self {
            LoopStep::Published | LoopStep::Idle => policy.poll_interval(),
            LoopStep::Retrying { .. } => policy.failure_backoff(),
            LoopStep::ExtendedBackoff => policy.extended_backoff(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_escalates_once_and_resets() {
        let mut counter = RetryCounter::new(5);
        let steps: Vec<Escalation> = (0..5).map(|_| counter.record_failure()).collect();
        assert_eq!(
            steps[..4],
            [
                Escalation::Retry { attempt: 1 },
                Escalation::Retry { attempt: 2 },
                Escalation::Retry { attempt: 3 },
                Escalation::Retry { attempt: 4 },
            ]
        );
        assert_eq!(steps[4], Escalation::Extended);
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.record_failure(), Escalation::Retry { attempt: 1 });
    }

    #[test]
    fn pauses_follow_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(LoopStep::Published.pause(&policy), Duration::from_millis(10));
        assert_eq!(
            LoopStep::Retrying { attempt: 2 }.pause(&policy),
            Duration::from_secs(1)
        );
        assert_eq!(LoopStep::ExtendedBackoff.pause(&policy), Duration::from_secs(5));
    }
}
