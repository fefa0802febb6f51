//! # Rate limiting
//! Sliding-window limiter per named pool.
//!
//! Each pool keeps the timestamps of accepted calls within the trailing
//! `period`. `acquire` prunes expired entries and either records a slot or
//! sleeps until the oldest entry leaves the window. Calls are never dropped.
//! Pools are independent: every pool has its own lock, so waiting on one
//! never blocks another.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use metrics::histogram;
use serde::Deserialize;
use tokio::time::Instant;

/// Time source for the limiter. Swappable so tests can run on virtual time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep_until<'a>(&'a self, deadline: Instant) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Tokio's clock. Honors `tokio::time::pause()` in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until<'a>(&'a self, deadline: Instant) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(tokio::time::sleep_until(deadline))
    }
}

/// Manually driven clock: sleeping jumps straight to the deadline.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new(start: Instant) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut g = self.now.lock().expect("manual clock mutex poisoned");
        *g += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().expect("manual clock mutex poisoned")
    }

    fn sleep_until<'a>(&'a self, deadline: Instant) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        let mut g = self.now.lock().expect("manual clock mutex poisoned");
        if deadline > *g {
            *g = deadline;
        }
        Box::pin(async {})
    }
}

/// Capacity of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PoolLimits {
    pub max_requests: usize,
    pub period_secs: u64,
}

impl PoolLimits {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_requests: 50,
            period_secs: 60,
        }
    }
}

/// Proof that a slot was granted.
#[derive(Debug, Clone)]
pub struct Permit {
    pub pool: String,
    pub granted_at: Instant,
    pub waited: Duration,
}

/// Limiter for a single pool.
pub struct RateLimiter {
    pool: String,
    limits: PoolLimits,
    clock: Arc<dyn Clock>,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(pool: impl Into<String>, limits: PoolLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool: pool.into(),
            limits,
            clock,
            window: Mutex::new(VecDeque::new()),
        }
    }

    pub fn pool(&self) -> &str {
        &self.pool
    }

    pub fn limits(&self) -> PoolLimits {
        self.limits
    }

    /// Wait for a free slot, record it, and return the permit.
    pub async fn acquire(&self) -> Permit {
        let started = self.clock.now();
        loop {
            let wait_until = {
                let now = self.clock.now();
                let mut window = self.window.lock().expect("rate window mutex poisoned");
                prune(&mut window, now, self.limits.period());

                if window.len() < self.limits.max_requests.max(1) {
                    window.push_back(now);
                    let waited = now.saturating_duration_since(started);
                    if !waited.is_zero() {
                        histogram!("rate_limit_wait_ms", "pool" => self.pool.clone())
                            .record(waited.as_secs_f64() * 1_000.0);
                    }
                    return Permit {
                        pool: self.pool.clone(),
                        granted_at: now,
                        waited,
                    };
                }

                // Oldest entry leaves the window at `oldest + period`.
                match window.front() {
                    Some(&oldest) => oldest + self.limits.period(),
                    None => now,
                }
            };

            tracing::debug!(pool = %self.pool, "rate limit reached, waiting for a slot");
            self.clock.sleep_until(wait_until).await;
        }
    }

    /// Accepted calls currently inside the window.
    pub fn in_window(&self) -> usize {
        let now = self.clock.now();
        let mut window = self.window.lock().expect("rate window mutex poisoned");
        prune(&mut window, now, self.limits.period());
        window.len()
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant, period: Duration) {
    while let Some(&t) = window.front() {
        if now.saturating_duration_since(t) >= period {
            window.pop_front();
        } else {
            break;
        }
    }
}

/// Process-wide registry of pools. Pools are created lazily on first use.
pub struct RateLimiters {
    default_limits: PoolLimits,
    overrides: HashMap<String, PoolLimits>,
    clock: Arc<dyn Clock>,
    pools: RwLock<HashMap<String, Arc<RateLimiter>>>,
}

impl RateLimiters {
    pub fn new(default_limits: PoolLimits) -> Self {
        Self::with_clock(default_limits, Arc::new(TokioClock))
    }

    pub fn with_clock(default_limits: PoolLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            default_limits,
            overrides: HashMap::new(),
            clock,
            pools: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_pool(mut self, pool: impl Into<String>, limits: PoolLimits) -> Self {
        self.overrides.insert(pool.into(), limits);
        self
    }

    /// Limiter for `pool`, created with its configured limits if absent.
    pub fn limiter(&self, pool: &str) -> Arc<RateLimiter> {
        if let Some(l) = self.pools.read().expect("pools rwlock poisoned").get(pool) {
            return l.clone();
        }
        let mut pools = self.pools.write().expect("pools rwlock poisoned");
        pools
            .entry(pool.to_string())
            .or_insert_with(|| {
                let limits = self
                    .overrides
                    .get(pool)
                    .copied()
                    .unwrap_or(self.default_limits);
                Arc::new(RateLimiter::new(pool, limits, self.clock.clone()))
            })
            .clone()
    }

    pub async fn acquire(&self, pool: &str) -> Permit {
        let limiter = self.limiter(pool);
        limiter.acquire().await
    }
}
