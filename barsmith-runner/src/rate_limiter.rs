//! Sliding-window rate limiter for provider requests.
//!
//! At most `calls` acquisitions succeed inside any `period`-long window.
//! One limiter belongs to one provider instance; threads share it by
//! reference and the window state stays private behind a `Mutex`.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
pub struct RateLimiter {
    calls: usize,
    period: Duration,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// `calls` is clamped to at least one.
    pub fn new(calls: usize, period: Duration) -> Self {
        let calls = calls.max(1);
        Self {
            calls,
            period,
            window: Mutex::new(VecDeque::with_capacity(calls)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut window = self.lock();
        self.evict(&mut window, now);
        if window.len() < self.calls {
            window.push_back(now);
            true
        } else {
            false
        }
    }

    /// Block until a slot frees, then take it.
    pub fn acquire(&self) {
        loop {
            let wait = {
                let now = Instant::now();
                let mut window = self.lock();
                self.evict(&mut window, now);
                if window.len() < self.calls {
                    window.push_back(now);
                    return;
                }
                self.wait_in(&window, now)
            };
            // The lock is released while sleeping so other threads can
            // observe the window.
            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            std::thread::sleep(wait);
        }
    }

    /// How long until `try_acquire` would succeed. Zero when a slot is free.
    pub fn wait_time(&self) -> Duration {
        let now = Instant::now();
        let mut window = self.lock();
        self.evict(&mut window, now);
        if window.len() < self.calls {
            Duration::ZERO
        } else {
            self.wait_in(&window, now)
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        // A panic while holding the lock cannot leave the deque inconsistent.
        self.window.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn evict(&self, window: &mut VecDeque<Instant>, now: Instant) {
        while window
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.period)
        {
            window.pop_front();
        }
    }

    fn wait_in(&self, window: &VecDeque<Instant>, now: Instant) -> Duration {
        window
            .front()
            .map_or(Duration::ZERO, |&oldest| {
                (oldest + self.period).saturating_duration_since(now)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn allows_up_to_calls_per_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        let wait = limiter.wait_time();
        assert!(wait > Duration::from_secs(59) && wait <= Duration::from_secs(60));
    }

    #[test]
    fn slots_free_after_period() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(limiter.wait_time(), Duration::ZERO);
        assert!(limiter.try_acquire());
    }

    #[test]
    fn acquire_blocks_until_window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_millis(40));
        let start = Instant::now();
        limiter.acquire();
        limiter.acquire();
        limiter.acquire();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn zero_calls_is_clamped() {
        let limiter = RateLimiter::new(0, Duration::from_secs(1));
        assert_eq!(limiter.calls(), 1);
        assert!(limiter.try_acquire());
    }

    #[test]
    fn shared_across_threads() {
        let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(60)));
        let granted: usize = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || (0..5).filter(|_| limiter.try_acquire()).count())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .sum();
        assert_eq!(granted, 5);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn never_grants_more_than_calls(calls in 1usize..50, attempts in 0usize..120) {
                let limiter = RateLimiter::new(calls, Duration::from_secs(3600));
                let granted = (0..attempts).filter(|_| limiter.try_acquire()).count();
                prop_assert_eq!(granted, attempts.min(calls));
                prop_assert_eq!(limiter.wait_time().is_zero(), attempts < calls);
            }
        }
    }
}
