//! Per-client token bucket rate limiting.
//!
//! # Responsibilities
//! - Keep exactly one bucket per client identity
//! - Provision buckets lazily (first contact) or explicitly (management API)
//! - Refill every bucket on a fixed cadence from a background worker
//!
//! # Locking
//! Two levels: the sharded map guards bucket membership, and each bucket has
//! its own mutex guarding its tokens. Admission only holds a shard lock long
//! enough to clone the bucket handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time;

use crate::config::RateLimitConfig;

/// Fallback capacity when none (or zero) is configured.
pub const DEFAULT_CAPACITY: u32 = 100;
/// Fallback refill rate when none (or zero) is configured.
pub const DEFAULT_REFILL_RATE: u32 = 10;
/// Fallback refill cadence when none (or zero) is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Parameters of a single client's bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketConfig {
    pub capacity: u32,
    /// Tokens added on every refill tick.
    pub refill_rate: u32,
    /// Initial token count, capped at `capacity`.
    pub tokens: u32,
}

/// Limiter-wide defaults used for lazily provisioned buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    pub default_interval: Duration,
    pub default_capacity: u32,
    pub default_refill_rate: u32,
}

impl LimiterConfig {
    /// Replace zero values with the built-in defaults.
    pub fn with_fallbacks(mut self) -> Self {
        if self.default_interval.is_zero() {
            self.default_interval = DEFAULT_INTERVAL;
        }
        if self.default_capacity == 0 {
            self.default_capacity = DEFAULT_CAPACITY;
        }
        if self.default_refill_rate == 0 {
            self.default_refill_rate = DEFAULT_REFILL_RATE;
        }
        self
    }

    /// A full bucket with the default parameters.
    pub fn default_bucket(&self) -> BucketConfig {
        BucketConfig {
            capacity: self.default_capacity,
            refill_rate: self.default_refill_rate,
            tokens: self.default_capacity,
        }
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            default_interval: DEFAULT_INTERVAL,
            default_capacity: DEFAULT_CAPACITY,
            default_refill_rate: DEFAULT_REFILL_RATE,
        }
    }
}

impl From<&RateLimitConfig> for LimiterConfig {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            default_interval: Duration::from_millis(config.default_interval_ms),
            default_capacity: config.default_capacity,
            default_refill_rate: config.default_refill_rate,
        }
    }
}

/// Outcome of [`RateLimiter::check_and_add_default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEntry {
    /// A bucket already existed and was left untouched.
    Existing,
    /// No bucket existed; one was created with this configuration.
    Created(BucketConfig),
}

impl ClientEntry {
    pub fn existed(&self) -> bool {
        matches!(self, ClientEntry::Existing)
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    capacity: u32,
    refill_rate: u32,
}

impl Bucket {
    fn new(config: BucketConfig) -> Self {
        Self {
            tokens: config.tokens.min(config.capacity),
            capacity: config.capacity,
            refill_rate: config.refill_rate,
        }
    }

    fn try_acquire(&mut self) -> bool {
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        self.tokens = self.tokens.saturating_add(self.refill_rate).min(self.capacity);
    }
}

type SharedBucket = Arc<Mutex<Bucket>>;
type BucketMap = DashMap<String, SharedBucket>;

/// Token bucket limiter keyed by client identity.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Arc<BucketMap>,
    config: LimiterConfig,
    stop_tx: watch::Sender<bool>,
}

impl RateLimiter {
    /// Create a limiter refilling on the configured default interval.
    ///
    /// The refill worker is spawned on the current Tokio runtime.
    pub fn new(config: LimiterConfig) -> Self {
        let config = config.with_fallbacks();
        Self::with_refill_interval(config, config.default_interval)
    }

    /// Create a limiter with an explicit refill cadence.
    pub fn with_refill_interval(config: LimiterConfig, refill_interval: Duration) -> Self {
        let config = config.with_fallbacks();
        let refill_interval = if refill_interval.is_zero() {
            config.default_interval
        } else {
            refill_interval
        };

        let buckets = Arc::new(BucketMap::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(refill_worker(buckets.clone(), refill_interval, stop_rx));
            }
            Err(_) => {
                tracing::warn!("No Tokio runtime available, bucket refill worker not started");
            }
        }

        tracing::info!(
            capacity = config.default_capacity,
            refill_rate = config.default_refill_rate,
            refill_interval = ?refill_interval,
            "Rate limiter created"
        );

        Self {
            buckets,
            config,
            stop_tx,
        }
    }

    pub fn config(&self) -> LimiterConfig {
        self.config
    }

    /// Whether a bucket exists for `client`. No side effect.
    pub fn check(&self, client: &str) -> bool {
        self.buckets.contains_key(client)
    }

    /// Create a default bucket for `client` unless one exists.
    pub fn check_and_add_default(&self, client: &str) -> ClientEntry {
        if self.buckets.contains_key(client) {
            return ClientEntry::Existing;
        }

        match self.buckets.entry(client.to_string()) {
            Entry::Occupied(_) => ClientEntry::Existing,
            Entry::Vacant(slot) => {
                let config = self.config.default_bucket();
                slot.insert(Arc::new(Mutex::new(Bucket::new(config))));
                ClientEntry::Created(config)
            }
        }
    }

    /// Provision `client` with `config`, replacing any existing bucket.
    pub fn add_client(&self, client: &str, config: BucketConfig) {
        self.buckets
            .insert(client.to_string(), Arc::new(Mutex::new(Bucket::new(config))));
        tracing::debug!(
            client = %client,
            capacity = config.capacity,
            refill_rate = config.refill_rate,
            tokens = config.tokens,
            "Client bucket provisioned"
        );
    }

    /// Take one token for `client`, provisioning a default bucket if needed.
    pub fn allow(&self, client: &str) -> bool {
        let bucket = self.bucket_or_default(client);
        let allowed = lock(&bucket).try_acquire();
        allowed
    }

    /// Current token count for `client`, if it has a bucket.
    pub fn tokens(&self, client: &str) -> Option<u32> {
        let bucket = self.buckets.get(client)?.value().clone();
        let tokens = lock(&bucket).tokens;
        Some(tokens)
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Run one refill tick over every bucket.
    pub fn refill_all(&self) {
        refill(&self.buckets);
    }

    /// Stop the refill worker. Safe to call any number of times.
    pub fn stop(&self) {
        let was_stopped = self.stop_tx.send_replace(true);
        if !was_stopped {
            tracing::info!("Rate limiter refill worker stopping");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    fn bucket_or_default(&self, client: &str) -> SharedBucket {
        if let Some(bucket) = self.buckets.get(client) {
            return bucket.value().clone();
        }

        self.buckets
            .entry(client.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Bucket::new(self.config.default_bucket()))))
            .value()
            .clone()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(bucket: &Mutex<Bucket>) -> MutexGuard<'_, Bucket> {
    // bucket state stays valid even if a holder panicked
    bucket.lock().unwrap_or_else(PoisonError::into_inner)
}

fn refill(buckets: &BucketMap) {
    let handles: Vec<SharedBucket> = buckets.iter().map(|entry| entry.value().clone()).collect();
    for bucket in handles {
        lock(&bucket).refill();
    }
}

async fn refill_worker(
    buckets: Arc<BucketMap>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(time::Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = ticker.tick() => refill(&buckets),
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }

    tracing::debug!("Rate limiter refill worker stopped");
}
