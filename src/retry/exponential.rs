use super::RetryPolicy;
use crate::error::SignupError;
use std::time::Duration;

/// 指数退避重试策略
pub struct ExponentialBackoffPolicy {
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoffPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }
}

impl RetryPolicy for ExponentialBackoffPolicy {
    fn should_retry(&self, attempt: usize, error: &SignupError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    fn backoff_duration(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(10) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn policy() -> ExponentialBackoffPolicy {
        ExponentialBackoffPolicy::new(4, Duration::from_millis(100), Duration::from_millis(500))
    }

    #[test]
    fn delay_doubles_until_capped() {
        let p = policy();
        assert_eq!(p.backoff_duration(1), Duration::from_millis(100));
        assert_eq!(p.backoff_duration(2), Duration::from_millis(200));
        assert_eq!(p.backoff_duration(3), Duration::from_millis(400));
        assert_eq!(p.backoff_duration(4), Duration::from_millis(500));
        assert_eq!(p.backoff_duration(60), Duration::from_millis(500));
    }

    #[test]
    fn retries_only_retryable_errors_within_budget() {
        let p = policy();
        let transient = SignupError::localized(ErrorCode::MessageReceiveFailed, "poll failed");
        let fatal = SignupError::config("bad group id");

        assert!(p.should_retry(1, &transient));
        assert!(p.should_retry(3, &transient));
        assert!(!p.should_retry(4, &transient));
        assert!(!p.should_retry(1, &fatal));
    }
}
