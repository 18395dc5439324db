use std::{num::NonZeroU32, time::Duration};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Spaces out the start of provider fetches.
///
/// Hands out one permit per `interval` with a burst of one, so a fan-out of
/// any width issues its requests at a steady cadence. Concurrency of the
/// requests themselves is not limited.
pub struct LaunchPacer {
    limiter: DefaultDirectRateLimiter,
}

impl LaunchPacer {
    /// Returns `None` for a zero interval.
    pub fn new(interval: Duration) -> Option<Self> {
        let quota = Quota::with_period(interval)?.allow_burst(NonZeroU32::MIN);
        Some(Self {
            limiter: RateLimiter::direct(quota),
        })
    }

    pub async fn ready(&self) {
        self.limiter.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Instant};

    use super::*;

    #[test]
    fn zero_interval_is_rejected() {
        assert!(LaunchPacer::new(Duration::ZERO).is_none());
        assert!(LaunchPacer::new(Duration::from_millis(50)).is_some());
    }

    #[tokio::test]
    async fn spaces_out_concurrent_permits() {
        let pacer = Arc::new(LaunchPacer::new(Duration::from_millis(40)).unwrap());
        let started = Instant::now();

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let pacer = Arc::clone(&pacer);
                tokio::spawn(async move { pacer.ready().await })
            })
            .collect();
        for waiter in waiters {
            waiter.await.unwrap();
        }

        // First permit is immediate, the remaining three wait one interval each.
        assert!(started.elapsed() >= Duration::from_millis(110));
    }
}
