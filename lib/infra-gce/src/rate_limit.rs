//! Throttling for long-running operation polls
//!
//! Every poll waits at least `minimum` and also takes a token from a shared
//! bucket. Other calls are not throttled.

use infra_core::{CallContext, Result};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_MINIMUM_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_QPS: f64 = 5.0;
pub const DEFAULT_BURST: u32 = 5;

#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    per_second: f64,
    last: Instant,
}

impl TokenBucket {
    fn new(per_second: f64, burst: u32) -> Self {
        Self {
            capacity: f64::from(burst),
            tokens: f64::from(burst),
            per_second,
            last: Instant::now(),
        }
    }

    /// Takes a token and returns how long the caller has to wait for it.
    /// Tokens may go negative, which queues later callers behind this one.
    fn reserve(&mut self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.per_second).min(self.capacity);
        self.last = now;
        self.tokens -= 1.0;

        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.per_second)
        }
    }
}

#[derive(Debug)]
pub struct OperationRateLimiter {
    minimum: Duration,
    bucket: Mutex<TokenBucket>,
}

impl Default for OperationRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MINIMUM_INTERVAL, DEFAULT_QPS, DEFAULT_BURST)
    }
}

impl OperationRateLimiter {
    pub fn new(minimum: Duration, qps: f64, burst: u32) -> Self {
        Self {
            minimum,
            bucket: Mutex::new(TokenBucket::new(qps, burst.max(1))),
        }
    }

    /// Blocks until the next poll may go out, or the context ends
    pub async fn accept(&self, ctx: &CallContext) -> Result<()> {
        ctx.check()?;
        let started = Instant::now();

        let wait = self.bucket.lock().await.reserve(started);
        if !wait.is_zero() {
            ctx.sleep(wait).await?;
        }

        let floor = started + self.minimum;
        let now = Instant::now();
        if floor > now {
            ctx.sleep(floor - now).await?;
        }
        Ok(())
    }
}
