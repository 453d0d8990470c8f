//! Request spacing
//!
//! Uses the governor crate to keep a fixed minimum interval between
//! consecutive upstream requests (a single-token bucket).

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::sync::Arc;
use std::time::Duration;

/// Enforces a minimum delay between requests, independent of retry backoff
#[derive(Clone)]
pub struct RequestSpacer {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
    interval: Duration,
}

impl RequestSpacer {
    /// Create a spacer; a zero interval disables spacing
    pub fn new(interval: Duration) -> Option<Self> {
        let quota = Quota::with_period(interval)?;
        Some(Self {
            limiter: Arc::new(Governor::direct(quota)),
            interval,
        })
    }

    /// Create a spacer from milliseconds
    pub fn from_millis(ms: u64) -> Option<Self> {
        Self::new(Duration::from_millis(ms))
    }

    /// Wait until the next request may be sent
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Check if a request could be sent immediately (consumes the slot)
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Configured minimum interval
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl std::fmt::Debug for RequestSpacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSpacer")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
