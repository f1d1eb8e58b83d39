//! Request Rate Limiter
//!
//! Process-wide fixed-window throttling for the API routes, keyed by
//! client identity. Buckets expire lazily when touched after their window
//! closes. State lives in this process only, which is acceptable for a
//! single-instance deployment and explicitly not viable behind a load
//! balancer without an external shared store.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::infrastructure::metrics;

/// Rate limiter settings.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed-window rate limiter keyed by client identity.
#[derive(Debug)]
pub struct RateLimiter {
    settings: RateLimitSettings,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    /// Create a limiter with the given settings.
    #[must_use]
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request for `key` and report whether it is allowed.
    #[must_use]
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock();

        // Lazy expiry: sweep closed windows once the map grows.
        if windows.len() > 1024 {
            windows.retain(|_, w| now.duration_since(w.started_at) < self.settings.window);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now.duration_since(window.started_at) >= self.settings.window {
            window.started_at = now;
            window.count = 0;
        }

        window.count += 1;
        let allowed = window.count <= self.settings.max_requests;
        if !allowed {
            metrics::record_rate_limited();
        }
        allowed
    }

    /// Number of tracked client windows, stale included.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new(RateLimitSettings {
            max_requests: 3,
            window: Duration::from_secs(60),
        });

        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(RateLimitSettings {
            max_requests: 1,
            window: Duration::from_secs(60),
        });

        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.2"));
    }

    #[test]
    fn window_resets_after_elapsing() {
        let limiter = RateLimiter::new(RateLimitSettings {
            max_requests: 1,
            window: Duration::ZERO,
        });

        // A zero-length window has always elapsed, so every request opens
        // a fresh one.
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
    }
}
