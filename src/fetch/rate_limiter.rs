//! Token bucket rate limiter for result-site requests.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::config::FetchConfig;

/// Token bucket limiter with a jittered pause between requests
#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<BucketState>>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
    capacity: f64,
    refill_per_sec: f64,
    min_delay: Duration,
    max_delay: Duration,
}

impl RateLimiter {
    /// # Arguments
    /// * `requests_per_minute` - Bucket capacity and refill rate
    /// * `min_delay_secs` - Lower bound of the pause after each grant
    /// * `max_delay_secs` - Upper bound of the pause after each grant
    pub fn new(requests_per_minute: u32, min_delay_secs: f64, max_delay_secs: f64) -> Self {
        let capacity = requests_per_minute.max(1) as f64;
        let min_delay = Duration::from_secs_f64(min_delay_secs.max(0.0));
        let max_delay = Duration::from_secs_f64(max_delay_secs.max(0.0)).max(min_delay);

        Self {
            state: Arc::new(Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
                capacity,
                refill_per_sec: capacity / 60.0,
                min_delay,
                max_delay,
            })),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            config.requests_per_minute,
            config.min_delay_secs,
            config.max_delay_secs,
        )
    }

    /// Take a token, sleeping until one is available
    pub async fn acquire(&self) {
        let delay = {
            let mut state = self.state.lock().await;
            state.next_delay(Instant::now(), jitter())
        };
        tokio::time::sleep(delay).await;
    }
}

impl BucketState {
    fn next_delay(&mut self, now: Instant, jitter: f64) -> Duration {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            self.min_delay + (self.max_delay - self.min_delay).mul_f64(jitter)
        } else {
            let wait = (1.0 - self.tokens) / self.refill_per_sec;
            self.tokens = 0.0;
            Duration::from_secs_f64(wait) + self.min_delay
        }
    }
}

/// Pseudo-random factor in [0, 1)
fn jitter() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}
