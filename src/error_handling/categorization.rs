//! Error categorization and retry strategy.
//!
//! This module turns failed Airtable responses into `RemoteError`s and defines
//! the bounded retry policy the client applies to retryable ones.

use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;

use super::types::RemoteError;
use crate::config::{
    HTTP_STATUS_TOO_MANY_REQUESTS, ITERATOR_NOT_AVAILABLE, RETRY_INITIAL_DELAY_MS,
    RETRY_MAX_ATTEMPTS, RETRY_MAX_DELAY_SECS,
};

/// Airtable error types that mean a record id is unknown to the store.
const RECORD_NOT_FOUND_TYPES: &[&str] = &["ROW_DOES_NOT_EXIST", "MODEL_ID_NOT_FOUND"];

/// Bounded exponential backoff: `initial_delay`, doubled per retry, capped at
/// `max_delay`, for at most `max_attempts` attempts (initial attempt included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
        }
    }

    /// Delays to wait before each retry, ready for use with `tokio_retry`.
    ///
    /// Yields `max_attempts - 1` delays.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        // ExponentialBackoff yields base^n * factor; base 2 with factor
        // initial/2 gives initial, 2*initial, 4*initial, ...
        let initial_ms = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX);
        ExponentialBackoff::from_millis(2)
            .factor((initial_ms / 2).max(1))
            .max_delay(self.max_delay)
            .map(move |delay| if initial_ms == 0 { Duration::ZERO } else { delay })
            .take(self.max_attempts - 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            RETRY_MAX_ATTEMPTS,
            Duration::from_millis(RETRY_INITIAL_DELAY_MS),
            Duration::from_secs(RETRY_MAX_DELAY_SECS),
        )
    }
}

/// Categorizes a failed Airtable response.
///
/// - 429 and 5xx are retryable `Api` errors
/// - 422 `LIST_RECORDS_ITERATOR_NOT_AVAILABLE` is `IteratorExpired`
/// - unknown record ids are `RecordNotFound`
/// - every other status is a non-retryable `Api` error
pub fn categorize_response(status: u16, error_type: Option<&str>, message: &str) -> RemoteError {
    if let Some(error_type) = error_type {
        if error_type == ITERATOR_NOT_AVAILABLE || message.contains(ITERATOR_NOT_AVAILABLE) {
            return RemoteError::IteratorExpired;
        }
        if RECORD_NOT_FOUND_TYPES.contains(&error_type) {
            return RemoteError::RecordNotFound(message.to_string());
        }
    }

    let retryable = status == HTTP_STATUS_TOO_MANY_REQUESTS || (500..600).contains(&status);
    let message = match error_type {
        Some(error_type) if !message.is_empty() && message != error_type => {
            format!("{error_type}: {message}")
        }
        Some(error_type) => error_type.to_string(),
        None => message.to_string(),
    };
    RemoteError::Api {
        status,
        retryable,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_schedule() {
        let delays: Vec<Duration> = RetryPolicy::default().delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[test]
    fn test_policy_caps_delay() {
        let policy = RetryPolicy::new(6, Duration::from_secs(1), Duration::from_secs(3));
        let delays: Vec<Duration> = policy.delays().collect();
        assert_eq!(delays.len(), 5);
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(3)));
        assert_eq!(delays[4], Duration::from_secs(3));
    }

    #[test]
    fn test_policy_delays_increase() {
        let delays: Vec<Duration> = RetryPolicy::default().delays().collect();
        for pair in delays.windows(2) {
            assert!(pair[1] >= pair[0], "{:?} should not exceed {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_single_attempt_policy() {
        assert_eq!(RetryPolicy::new(1, Duration::ZERO, Duration::ZERO).delays().count(), 0);
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_zero_initial_delay() {
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::from_secs(1));
        assert!(policy.delays().all(|d| d.is_zero()));
    }

    #[test]
    fn test_categorize_rate_limit() {
        let err = categorize_response(429, Some("RATE_LIMIT_REACHED"), "slow down");
        assert!(err.is_retryable());
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn test_categorize_server_errors() {
        assert!(categorize_response(500, None, "boom").is_retryable());
        assert!(categorize_response(503, None, "").is_retryable());
    }

    #[test]
    fn test_categorize_client_errors() {
        let err = categorize_response(422, Some("INVALID_VALUE_FOR_COLUMN"), "bad value");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("INVALID_VALUE_FOR_COLUMN: bad value"));
        assert!(!categorize_response(401, Some("AUTHENTICATION_REQUIRED"), "").is_retryable());
    }

    #[test]
    fn test_categorize_iterator_expired() {
        let err = categorize_response(422, Some("LIST_RECORDS_ITERATOR_NOT_AVAILABLE"), "");
        assert!(matches!(err, RemoteError::IteratorExpired));
    }

    #[test]
    fn test_categorize_record_not_found() {
        let err = categorize_response(404, Some("MODEL_ID_NOT_FOUND"), "recXYZ");
        assert!(matches!(err, RemoteError::RecordNotFound(_)));
        let err = categorize_response(422, Some("ROW_DOES_NOT_EXIST"), "recXYZ");
        assert!(matches!(err, RemoteError::RecordNotFound(_)));
    }
}
