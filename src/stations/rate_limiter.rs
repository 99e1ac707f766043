use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

const DEFAULT_INTERVAL: Duration = Duration::from_millis(300);

/// Process-wide limiters, one per interval.
static SHARED: LazyLock<std::sync::Mutex<HashMap<Duration, Arc<RateLimiter>>>> =
    LazyLock::new(|| std::sync::Mutex::new(HashMap::new()));

/// Keeps consecutive requests at least `min_interval` apart.
///
/// Share one instance through an `Arc` between every client hitting the same service.
/// [`RateLimiter::shared`] hands out the process-wide one.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// The process-wide limiter with the default 300 ms interval.
    pub fn shared() -> Arc<RateLimiter> {
        Self::shared_with(DEFAULT_INTERVAL)
    }

    /// The process-wide limiter for `min_interval`. Every caller asking for the same interval
    /// gets the same gate.
    pub fn shared_with(min_interval: Duration) -> Arc<RateLimiter> {
        let mut limiters = SHARED.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            limiters
                .entry(min_interval)
                .or_insert_with(|| Arc::new(RateLimiter::new(min_interval))),
        )
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the next request may be issued and records it as issued.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                debug!("Rate limiting: waiting {:?}", ready_at - Instant::now());
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requests_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(40));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_shared_limiter_serializes_tasks() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(30)));
        let start = Instant::now();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.wait().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_shared_limiters_are_process_wide() {
        let first = RateLimiter::shared();
        let second = RateLimiter::shared();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.min_interval(), Duration::from_millis(300));

        let slow = RateLimiter::shared_with(Duration::from_secs(1));
        assert!(!Arc::ptr_eq(&first, &slow));
        assert!(Arc::ptr_eq(&slow, &RateLimiter::shared_with(Duration::from_secs(1))));
    }

    #[tokio::test]
    async fn test_unlimited_does_not_wait() {
        let limiter = RateLimiter::unlimited();
        let start = Instant::now();
        for _ in 0..100 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
