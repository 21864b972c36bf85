use std::time::Duration;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the delay
    RetryAfter(Duration),
    /// Retries exhausted after this many attempts
    GiveUp { attempts: u32 },
}

/// Fixed-backoff retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }
}

/// Failure counter scoped to a single operation
#[derive(Debug, Clone)]
pub struct RetryCounter {
    policy: RetryPolicy,
    failures: u32,
}

impl RetryCounter {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Record a failure and decide whether to try again
    pub fn record_failure(&mut self) -> RetryDecision {
        self.failures += 1;
        if self.failures > self.policy.max_retries {
            RetryDecision::GiveUp {
                attempts: self.failures,
            }
        } else {
            RetryDecision::RetryAfter(self.policy.delay)
        }
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gives_up_after_max_retries() {
        let mut counter = RetryCounter::new(RetryPolicy::fixed(3, Duration::from_millis(500)));

        for _ in 0..3 {
            assert_eq!(
                counter.record_failure(),
                RetryDecision::RetryAfter(Duration::from_millis(500))
            );
        }
        assert_eq!(counter.record_failure(), RetryDecision::GiveUp { attempts: 4 });
    }

    #[test]
    fn test_reset_restores_budget() {
        let mut counter = RetryCounter::new(RetryPolicy::fixed(1, Duration::from_secs(1)));
        assert!(matches!(counter.record_failure(), RetryDecision::RetryAfter(_)));
        counter.reset();
        assert_eq!(counter.failures(), 0);
        assert!(matches!(counter.record_failure(), RetryDecision::RetryAfter(_)));
    }

    #[test]
    fn test_zero_retries_gives_up_immediately() {
        let mut counter = RetryCounter::new(RetryPolicy::fixed(0, Duration::from_secs(1)));
        assert_eq!(counter.record_failure(), RetryDecision::GiveUp { attempts: 1 });
    }
}
