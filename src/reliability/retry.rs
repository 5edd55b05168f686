//! Retry policy: exponential backoff with a hard cap, plus error-code
//! allow/deny lists.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `{max_attempts, initial_delay, max_delay, backoff_multiplier, retry_on,
/// do_not_retry_on}` as named in the engine's retry vocabulary.
///
/// Delay for retry `n` (1-based, `n` = `retry_count` after incrementing) is
/// `min(initial_delay * backoff_multiplier^(n-1), max_delay)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_attempts: u32,

    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,

    #[serde(with = "duration_millis")]
    pub max_delay: Duration,

    pub backoff_multiplier: f64,

    /// If non-empty, only these error codes are retried.
    #[serde(default)]
    pub retry_on: Vec<String>,

    /// These error codes are never retried, regardless of `retry_on`.
    #[serde(default)]
    pub do_not_retry_on: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // engine.default_retry_policy from the external interface contract.
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5 * 60),
            backoff_multiplier: 2.0,
            retry_on: Vec::new(),
            do_not_retry_on: Vec::new(),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            retry_on: Vec::new(),
            do_not_retry_on: Vec::new(),
        }
    }

    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: interval,
            max_delay: interval,
            backoff_multiplier: 1.0,
            retry_on: Vec::new(),
            do_not_retry_on: Vec::new(),
        }
    }

    /// Delay before the `retry_count`-th retry (1-based: called with the
    /// post-increment `retry_count`).
    pub fn delay_for_retry(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::ZERO;
        }
        let base =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(retry_count as i32 - 1);
        let capped = base.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Whether `retry_count < max_attempts` and the error's `code` clears
    /// the `retry_on`/`do_not_retry_on` filters.
    pub fn permits_retry(&self, retry_count: u32, retriable: bool, code: &str) -> bool {
        if !retriable || retry_count >= self.max_attempts {
            return false;
        }
        if self.do_not_retry_on.iter().any(|c| c == code) {
            return false;
        }
        if !self.retry_on.is_empty() && !self.retry_on.iter().any(|c| c == code) {
            return false;
        }
        true
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_engine_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
        assert_eq!(policy.backoff_multiplier, 2.0);
    }

    #[test]
    fn delay_doubles_then_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(30),
            backoff_multiplier: 2.0,
            retry_on: Vec::new(),
            do_not_retry_on: Vec::new(),
        };
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(30)); // capped, would be 40
    }

    #[test]
    fn do_not_retry_on_wins_over_retry_on() {
        let policy = RetryPolicy {
            retry_on: vec!["X".into()],
            do_not_retry_on: vec!["X".into()],
            ..RetryPolicy::default()
        };
        assert!(!policy.permits_retry(0, true, "X"));
    }

    #[test]
    fn retry_on_allowlist_excludes_other_codes() {
        let policy = RetryPolicy {
            retry_on: vec!["X".into()],
            ..RetryPolicy::default()
        };
        assert!(policy.permits_retry(0, true, "X"));
        assert!(!policy.permits_retry(0, true, "Y"));
    }

    #[test]
    fn exhausted_attempts_never_retries() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        assert!(!policy.permits_retry(3, true, "X"));
    }

    #[test]
    fn non_retriable_error_never_retries() {
        let policy = RetryPolicy::default();
        assert!(!policy.permits_retry(0, false, "X"));
    }
}
