use crate::errors::{Error, Result};
use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One token bucket per (player, remote-base-url) key. Waiters block on
/// token availability with no ordering guarantee; the wait is cancellable.
pub struct RateLimiterPool {
    per_second: u32,
    limiters: DashMap<String, Arc<DefaultDirectRateLimiter>>,
}

impl RateLimiterPool {
    pub fn new(per_second: u32) -> RateLimiterPool {
        RateLimiterPool {
            per_second: per_second.max(1),
            limiters: DashMap::new(),
        }
    }

    fn limiter(&self, key: &str) -> Arc<DefaultDirectRateLimiter> {
        self.limiters
            .entry(key.to_string())
            .or_insert_with(|| {
                let quota = Quota::per_second(
                    NonZeroU32::new(self.per_second).expect("per_second is non-zero"),
                );
                Arc::new(RateLimiter::direct(quota))
            })
            .clone()
    }

    pub async fn acquire(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        let limiter = self.limiter(key);
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::OperationCanceled),
            _ = limiter.until_ready() => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_burst_then_throttle() {
        let pool = RateLimiterPool::new(2);
        let cancel = CancellationToken::new();
        let start = Instant::now();
        // burst capacity lets the first two through immediately
        pool.acquire("p1", &cancel).await.unwrap();
        pool.acquire("p1", &cancel).await.unwrap();
        assert!(start.elapsed().as_millis() < 100);
        // the third has to wait for a replenished token
        pool.acquire("p1", &cancel).await.unwrap();
        assert!(start.elapsed().as_millis() >= 400);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let pool = RateLimiterPool::new(2);
        let cancel = CancellationToken::new();
        let start = Instant::now();
        pool.acquire("p1", &cancel).await.unwrap();
        pool.acquire("p1", &cancel).await.unwrap();
        pool.acquire("p2", &cancel).await.unwrap();
        pool.acquire("p2", &cancel).await.unwrap();
        assert!(start.elapsed().as_millis() < 100);
    }

    #[tokio::test]
    async fn test_wait_is_cancellable() {
        let pool = RateLimiterPool::new(2);
        let cancel = CancellationToken::new();
        pool.acquire("p1", &cancel).await.unwrap();
        pool.acquire("p1", &cancel).await.unwrap();
        cancel.cancel();
        let err = pool.acquire("p1", &cancel).await.unwrap_err();
        assert!(err.is_canceled());
    }
}
