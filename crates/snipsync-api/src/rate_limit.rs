use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::AppError;

/// Fixed-window limiter per endpoint class and API key
#[derive(Clone)]
pub struct EndpointRateLimiter {
    state: Arc<Mutex<HashMap<(ProtectedEndpoint, u64), RateWindow>>>,
    window: Duration,
    push_limit: u32,
    pull_limit: u32,
    metrics: Arc<RateLimitMetrics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectedEndpoint {
    Push,
    /// Pull and full sync share a budget
    Pull,
}

#[derive(Default)]
struct RateLimitMetrics {
    push_allowed: AtomicU64,
    push_limited: AtomicU64,
    pull_allowed: AtomicU64,
    pull_limited: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RateLimitMetricsSnapshot {
    pub push_allowed: u64,
    pub push_limited: u64,
    pub pull_allowed: u64,
    pub pull_limited: u64,
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    started_at: Instant,
    count: u32,
}

impl EndpointRateLimiter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.rate_limit_window,
            config.push_rate_limit_per_window,
            config.pull_rate_limit_per_window,
        )
    }

    fn new(window: Duration, push_limit: u32, pull_limit: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            window,
            push_limit,
            pull_limit,
            metrics: Arc::new(RateLimitMetrics::default()),
        }
    }

    pub async fn check(&self, endpoint: ProtectedEndpoint, client: u64) -> Result<(), AppError> {
        let limit = match endpoint {
            ProtectedEndpoint::Push => self.push_limit,
            ProtectedEndpoint::Pull => self.pull_limit,
        };

        let now = Instant::now();
        let mut guard = self.state.lock().await;
        let entry = guard.entry((endpoint, client)).or_insert(RateWindow {
            started_at: now,
            count: 0,
        });

        if now.duration_since(entry.started_at) >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= limit {
            let retry_after_secs = self
                .window
                .saturating_sub(now.duration_since(entry.started_at))
                .as_secs();
            self.mark(endpoint, false);
            tracing::warn!(
                endpoint = endpoint.label(),
                client,
                retry_after_secs,
                "Rate limit exceeded"
            );
            return Err(AppError::too_many_requests(
                format!("Rate limit exceeded for {}", endpoint.label()),
                retry_after_secs,
            ));
        }

        entry.count += 1;
        self.mark(endpoint, true);
        Ok(())
    }

    pub fn metrics_snapshot(&self) -> RateLimitMetricsSnapshot {
        RateLimitMetricsSnapshot {
            push_allowed: self.metrics.push_allowed.load(Ordering::Relaxed),
            push_limited: self.metrics.push_limited.load(Ordering::Relaxed),
            pull_allowed: self.metrics.pull_allowed.load(Ordering::Relaxed),
            pull_limited: self.metrics.pull_limited.load(Ordering::Relaxed),
        }
    }

    fn mark(&self, endpoint: ProtectedEndpoint, allowed: bool) {
        let counter = match (endpoint, allowed) {
            (ProtectedEndpoint::Push, true) => &self.metrics.push_allowed,
            (ProtectedEndpoint::Push, false) => &self.metrics.push_limited,
            (ProtectedEndpoint::Pull, true) => &self.metrics.pull_allowed,
            (ProtectedEndpoint::Pull, false) => &self.metrics.pull_limited,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl ProtectedEndpoint {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_blocks_after_limit() {
        let limiter = EndpointRateLimiter::new(Duration::from_secs(60), 2, 5);

        limiter.check(ProtectedEndpoint::Push, 1).await.unwrap();
        limiter.check(ProtectedEndpoint::Push, 1).await.unwrap();

        let err = limiter.check(ProtectedEndpoint::Push, 1).await.unwrap_err();
        assert!(matches!(err, AppError::TooManyRequests(_, secs) if secs <= 60));

        let metrics = limiter.metrics_snapshot();
        assert_eq!(metrics.push_allowed, 2);
        assert_eq!(metrics.push_limited, 1);
    }

    #[tokio::test]
    async fn budgets_are_separate_per_endpoint_and_client() {
        let limiter = EndpointRateLimiter::new(Duration::from_secs(60), 1, 1);

        limiter.check(ProtectedEndpoint::Push, 1).await.unwrap();
        limiter.check(ProtectedEndpoint::Pull, 1).await.unwrap();
        limiter.check(ProtectedEndpoint::Push, 2).await.unwrap();
        assert!(limiter.check(ProtectedEndpoint::Pull, 1).await.is_err());

        let metrics = limiter.metrics_snapshot();
        assert_eq!(metrics.push_allowed, 2);
        assert_eq!(metrics.pull_allowed, 1);
        assert_eq!(metrics.pull_limited, 1);
    }
}
