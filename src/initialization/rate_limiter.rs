//! Rate limiter initialization.
//!
//! Airtable allows a fixed number of requests per second per base. The client
//! acquires a slot from a [`Throttle`] before every request; the default
//! implementation spaces requests evenly so no one-second window ever holds
//! more than the configured number of dispatches.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Duration, Instant};

/// Gate every outgoing request passes through.
///
/// Implementations must be safe to share between concurrent callers.
#[async_trait]
pub trait Throttle: Send + Sync {
    /// Waits until the next request may be dispatched.
    async fn acquire(&self);
}

/// Evenly spaced request limiter.
///
/// Each caller reserves the next free dispatch slot under a mutex and then
/// sleeps until that slot outside the lock, so concurrent callers are
/// serialized into slots `1 / rps` apart.
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
    rps: u32,
}

impl RateLimiter {
    /// Creates a limiter allowing `rps` requests per second (`rps` must be > 0).
    pub fn new(rps: u32) -> Self {
        let rps = rps.max(1);
        RateLimiter {
            interval: Duration::from_secs(1) / rps,
            next_slot: Mutex::new(None),
            rps,
        }
    }

    /// Gets the configured requests-per-second ceiling.
    pub fn requests_per_second(&self) -> u32 {
        self.rps
    }

    async fn reserve(&self) -> Instant {
        let mut next_slot = self.next_slot.lock().await;
        let now = Instant::now();
        let slot = match *next_slot {
            Some(reserved) if reserved > now => reserved,
            _ => now,
        };
        *next_slot = Some(slot + self.interval);
        slot
    }
}

#[async_trait]
impl Throttle for RateLimiter {
    async fn acquire(&self) {
        let slot = self.reserve().await;
        sleep_until(slot).await;
    }
}

/// Throttle that never waits. Used when rate limiting is disabled and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unthrottled;

#[async_trait]
impl Throttle for Unthrottled {
    async fn acquire(&self) {}
}

/// Initializes the request throttle.
///
/// If `rps` is 0, rate limiting is disabled and an [`Unthrottled`] gate is returned.
pub fn init_rate_limiter(rps: u32) -> Arc<dyn Throttle> {
    if rps == 0 {
        log::debug!("Rate limiting disabled");
        return Arc::new(Unthrottled);
    }
    let limiter = RateLimiter::new(rps);
    log::debug!("Rate limiting requests to {}/s", limiter.requests_per_second());
    Arc::new(limiter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_within_ceiling(stamps: &[Instant], rps: usize) {
        for window in stamps.windows(rps + 1) {
            let span = window[rps] - window[0];
            assert!(
                span >= Duration::from_secs(1),
                "{} requests dispatched within {:?}",
                rps + 1,
                span
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_callers_never_exceed_ceiling() {
        let limiter = RateLimiter::new(5);
        let mut stamps = Vec::new();
        for _ in 0..23 {
            limiter.acquire().await;
            stamps.push(Instant::now());
        }
        assert_within_ceiling(&stamps, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_never_exceed_ceiling() {
        let limiter = Arc::new(RateLimiter::new(4));
        let stamps = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let limiter = Arc::clone(&limiter);
            let stamps = Arc::clone(&stamps);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                stamps.lock().await.push(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.expect("task should not panic");
        }

        let mut stamps = stamps.lock().await.clone();
        stamps.sort();
        assert_eq!(stamps.len(), 16);
        assert_within_ceiling(&stamps, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new(5);
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_is_not_banked() {
        let limiter = RateLimiter::new(2);
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        // After idling, the next two requests still come 500ms apart.
        limiter.acquire().await;
        let first = Instant::now();
        limiter.acquire().await;
        assert_eq!(Instant::now() - first, Duration::from_millis(500));
    }

    #[test]
    fn test_zero_rps_clamps_to_one() {
        assert_eq!(RateLimiter::new(0).requests_per_second(), 1);
    }

    #[tokio::test]
    async fn test_init_rate_limiter_disabled() {
        let throttle = init_rate_limiter(0);
        let start = std::time::Instant::now();
        for _ in 0..100 {
            throttle.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
