//! Per-connection operation pacing
//!
//! Keeps a minimum interval between successive operations on the same
//! connection identity. Identities are independent of each other.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use super::config::ConnectionIdentity;

/// Default spacing between operations on one identity
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

pub struct RateLimiter {
    min_interval: Duration,
    last_operation: DashMap<ConnectionIdentity, Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_operation: DashMap::new(),
        }
    }

    /// Wait until `min_interval` has passed since the last operation on
    /// `identity`, then record the current instant.
    pub async fn throttle(&self, identity: &ConnectionIdentity) {
        // Copy out so no shard lock is held across the sleep
        let last = self.last_operation.get(identity).map(|entry| *entry.value());

        if let Some(last) = last {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("Throttling {} for {:?}", identity, wait);
                tokio::time::sleep(wait).await;
            }
        }

        self.last_operation.insert(identity.clone(), Instant::now());
    }

    /// Drop the timestamp of a disconnected identity
    pub fn forget(&self, identity: &ConnectionIdentity) {
        self.last_operation.remove(identity);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_operation_is_not_delayed() {
        let limiter = RateLimiter::default();
        let start = Instant::now();

        limiter.throttle(&ConnectionIdentity::from("a:22:u")).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_operations_are_spaced() {
        let limiter = RateLimiter::default();
        let id = ConnectionIdentity::from("a:22:u");
        let start = Instant::now();

        limiter.throttle(&id).await;
        limiter.throttle(&id).await;
        limiter.throttle(&id).await;

        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_remainder_is_waited() {
        let limiter = RateLimiter::default();
        let id = ConnectionIdentity::from("a:22:u");

        limiter.throttle(&id).await;
        tokio::time::advance(Duration::from_millis(70)).await;
        let before = Instant::now();
        limiter.throttle(&id).await;

        let waited = before.elapsed();
        assert!(waited >= Duration::from_millis(30));
        assert!(waited < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_identities_do_not_delay_each_other() {
        let limiter = RateLimiter::default();
        limiter.throttle(&ConnectionIdentity::from("a:22:u")).await;

        let start = Instant::now();
        limiter.throttle(&ConnectionIdentity::from("b:22:u")).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_resets_spacing() {
        let limiter = RateLimiter::default();
        let id = ConnectionIdentity::from("a:22:u");
        limiter.throttle(&id).await;

        limiter.forget(&id);
        let start = Instant::now();
        limiter.throttle(&id).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
