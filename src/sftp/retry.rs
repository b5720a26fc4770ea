//! Retry with exponential backoff
//!
//! Used for remote listings, which routinely fail once right after a
//! reconnection while the server is still setting up the subsystem.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff multiplier for each retry
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Set custom backoff parameters
    pub fn with_backoff(mut self, initial_ms: u64, multiplier: f64, max_ms: u64) -> Self {
        self.initial_backoff_ms = initial_ms;
        self.backoff_multiplier = multiplier;
        self.max_backoff_ms = max_ms;
        self
    }
}

fn default_max_attempts() -> usize {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

/// Backoff before retry number `attempt` (0-based)
pub fn calculate_backoff(attempt: usize, config: &RetryConfig) -> Duration {
    let delay_ms = (config.initial_backoff_ms as f64
        * config.backoff_multiplier.powi(attempt as i32))
    .min(config.max_backoff_ms as f64);

    Duration::from_millis(delay_ms as u64)
}

/// Run `op` until it succeeds or `config.max_attempts` attempts have failed.
/// The last error is returned.
pub async fn retry_with_backoff<T, E, F, Fut>(
    what: &str,
    config: &RetryConfig,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    info!("{} succeeded on attempt {}", what, attempt + 1);
                }
                return Ok(value);
            }
            Err(e) if attempt + 1 < attempts => {
                let delay = calculate_backoff(attempt, config);
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    what,
                    attempt + 1,
                    attempts,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!("{} failed after {} attempts: {}", what, attempts, e);
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_calculate_backoff() {
        let config = RetryConfig::default();

        assert_eq!(calculate_backoff(0, &config), Duration::from_secs(1));
        assert_eq!(calculate_backoff(1, &config), Duration::from_secs(2));
        assert_eq!(calculate_backoff(2, &config), Duration::from_secs(4));
        assert_eq!(calculate_backoff(10, &config), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_config_custom() {
        let config = RetryConfig::new(5).with_backoff(200, 3.0, 1000);

        assert_eq!(config.max_attempts, 5);
        assert_eq!(calculate_backoff(1, &config), Duration::from_millis(600));
        assert_eq!(calculate_backoff(2, &config), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let start = tokio::time::Instant::now();

        let result: Result<u32, String> =
            retry_with_backoff("listing", &RetryConfig::default(), || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(1 + 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_with_last_error() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<(), String> =
            retry_with_backoff("listing", &RetryConfig::new(2), || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(format!("failure {}", n))
            })
            .await;

        assert_eq!(result, Err("failure 1".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
