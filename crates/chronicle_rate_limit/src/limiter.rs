//! Backend request limiter using governor and Tokio Semaphore.
//!
//! - Governor (GCRA algorithm) enforces requests per minute
//! - A Tokio Semaphore enforces concurrent requests

use crate::RateLimitSettings;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Throttles generation calls to the configured limits.
///
/// # Example
///
/// ```rust,ignore
/// use chronicle_rate_limit::{RateLimitSettings, RequestLimiter};
///
/// let limiter = RequestLimiter::new(&RateLimitSettings { rpm: Some(30), max_concurrent: Some(1) });
/// let permit = limiter.acquire().await;
/// // Call the backend...
/// drop(permit); // Releases concurrent slot
/// ```
#[derive(Debug, Clone)]
pub struct RequestLimiter {
    rpm_limiter: Option<Arc<DirectRateLimiter>>,
    concurrent_semaphore: Option<Arc<Semaphore>>,
}

/// Holds a concurrency slot until dropped.
#[derive(Debug)]
pub struct RequestPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl RequestLimiter {
    /// Build a limiter from settings; absent or zero limits are not enforced.
    pub fn new(settings: &RateLimitSettings) -> Self {
        let rpm_limiter = settings.rpm.and_then(NonZeroU32::new).map(|n| {
            let quota = Quota::per_minute(n);
            Arc::new(GovernorRateLimiter::direct(quota))
        });

        let concurrent_semaphore = settings
            .max_concurrent
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n as usize)));

        Self {
            rpm_limiter,
            concurrent_semaphore,
        }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(&RateLimitSettings::default())
    }

    /// Wait until a request is allowed.
    pub async fn acquire(&self) -> RequestPermit {
        if let Some(limiter) = &self.rpm_limiter {
            limiter.until_ready().await;
        }

        // Acquire the slot last to avoid holding it while waiting on quota
        let permit = match &self.concurrent_semaphore {
            Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
            None => None,
        };

        RequestPermit { _permit: permit }
    }
}
