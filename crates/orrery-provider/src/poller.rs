//! Poll interval policy.

use std::time::Duration;

/// Shortest delay [`Backoff`] will yield, whatever the policy says.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Capped exponential backoff between status polls.
///
/// The first wait is `initial_interval`; each following wait is the
/// previous one times `multiplier`, never exceeding `max_interval`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            multiplier: 1.5,
        }
    }
}

impl PollPolicy {
    /// Exponential policy with the default multiplier.
    pub fn new(initial_interval: Duration, max_interval: Duration) -> Self {
        Self {
            initial_interval,
            max_interval,
            ..Self::default()
        }
    }

    /// Poll at a constant interval.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1.0,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Start a fresh delay sequence.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self
                .initial_interval
                .min(self.max_interval)
                .max(MIN_POLL_INTERVAL),
            policy: *self,
        }
    }
}

/// Iterator over successive poll delays.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    policy: PollPolicy,
}

impl Backoff {
    /// Delay before the next poll.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next;
        let grown = Duration::try_from_secs_f64(current.as_secs_f64() * self.policy.multiplier)
            .unwrap_or(self.policy.max_interval);
        self.next = grown.clamp(current, self.policy.max_interval.max(current));
        current
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}
