use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::warn;

/// Upper bound on tracked identifiers before idle buckets are pruned.
pub const DEFAULT_MAX_BUCKETS: usize = 10_000;

/// Shared bucket for callers that arrive while the table is full of active ones.
const OVERFLOW_KEY: &str = "~overflow";

/// A simple token-bucket instance.
///
/// Checking and recording are separate steps: a request is first asked
/// whether it should be throttled and only charged once it has been handled.
#[derive(Clone)]
pub struct TokenBucket {
    inner: Arc<Mutex<TokenBucketInner>>,
}

struct TokenBucketInner {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_check: Instant,
}

impl TokenBucketInner {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_check).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            self.last_check = now;
        }
    }
}

impl TokenBucket {
    pub fn new(capacity: usize, refill_per_sec: f64) -> Self {
        let inner = TokenBucketInner {
            capacity: capacity as f64,
            tokens: capacity as f64,
            refill_per_sec,
            last_check: Instant::now(),
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// True while at least one whole token is available.
    pub async fn has_capacity(&self) -> bool {
        let mut inner = self.inner.lock().await;
        inner.refill();
        inner.tokens >= 1.0
    }

    /// Charge one token. The balance may go negative, which delays recovery.
    pub async fn consume(&self) {
        let mut inner = self.inner.lock().await;
        inner.refill();
        inner.tokens -= 1.0;
    }

    /// Fully refilled, so forgetting it changes nothing for the caller.
    /// A bucket that is locked right now counts as busy.
    fn is_idle(&self) -> bool {
        match self.inner.try_lock() {
            Ok(mut inner) => {
                inner.refill();
                inner.tokens >= inner.capacity
            }
            Err(_) => false,
        }
    }
}

/// Per-identifier throttle holding one token bucket per caller.
#[derive(Clone)]
pub struct RateLimiterManager {
    buckets: Arc<DashMap<String, TokenBucket>>,
    pub enabled: bool,
    pub per_user: bool,
    pub rate_per_sec: f64,
    pub burst: usize,
    /// Resource paths below the API mount, e.g. `/documents`.
    pub exempt_paths: Arc<Vec<String>>,
    pub max_buckets: usize,
}

impl RateLimiterManager {
    pub fn from_config(
        enabled: bool,
        per_user: bool,
        rate_per_sec: f64,
        burst: usize,
        exempt_paths: Vec<String>,
    ) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            enabled,
            per_user,
            rate_per_sec,
            burst,
            exempt_paths: Arc::new(exempt_paths),
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }

    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets.max(1);
        self
    }

    /// Number of identifiers currently holding a bucket.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    /// A limiter that never throttles.
    pub fn disabled() -> Self {
        Self::from_config(false, true, 100.0, 200, Vec::new())
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|p| p == path)
    }

    fn bucket(&self, key: &str) -> TokenBucket {
        if let Some(existing) = self.buckets.get(key) {
            return existing.clone();
        }
        let mut key = key;
        if self.buckets.len() >= self.max_buckets {
            self.buckets.retain(|_, b| !b.is_idle());
            if self.buckets.len() >= self.max_buckets {
                warn!(
                    tracked = self.buckets.len(),
                    key, "throttle table full, charging shared overflow bucket"
                );
                key = OVERFLOW_KEY;
            }
        }
        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst, self.rate_per_sec))
            .clone()
    }

    /// Whether the next request for `key` must be refused.
    pub async fn should_be_throttled(&self, key: &str) -> bool {
        if !self.enabled {
            return false;
        }
        !self.bucket(key).has_capacity().await
    }

    /// Record one handled request for `key`.
    pub async fn accessed(&self, key: &str) {
        if !self.enabled {
            return;
        }
        self.bucket(key).consume().await;
    }
}
