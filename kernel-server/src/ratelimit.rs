//! Sliding-window rate limiting at the HTTP boundary (spec §5
//! "Backpressure": "Rate limits at the HTTP boundary (sliding-window
//! counters keyed by client id) serve as cross-turn load shedding.").

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Caps calls per key to `max_calls` within `window`, evicting timestamps
/// older than the window on every check.
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    hits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    /// A limiter allowing `max_calls` per `window` per key.
    #[must_use]
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self { max_calls, window, hits: Mutex::new(HashMap::new()) }
    }

    /// Record a call attempt for `key`; `true` if it's within budget.
    pub async fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().await;
        let entry = hits.entry(key.to_string()).or_default();
        entry.retain(|ts| now.duration_since(*ts) < self.window);
        if entry.len() >= self.max_calls {
            return false;
        }
        entry.push(now);
        true
    }
}
