//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`CacheOrchestrator`](crate::CacheOrchestrator).
///
/// Deserializable from configuration files; duration fields accept
/// humantime strings (`"60s"`, `"5m"`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Largest response body, in bytes, that will be stored. Bigger bodies
    /// pass through uncached.
    pub max_object_size_bytes: usize,

    /// Whether this cache serves multiple users. A shared cache honors
    /// `s-maxage`, refuses `Cache-Control: private` responses and respects
    /// `proxy-revalidate`.
    pub shared_cache: bool,

    /// Enables heuristic freshness (RFC 2616 §13.2.4) for responses without
    /// explicit freshness information.
    pub heuristic_caching_enabled: bool,

    /// Fraction of the `Date` − `Last-Modified` interval used as heuristic
    /// freshness lifetime.
    pub heuristic_coefficient: f64,

    /// Heuristic freshness lifetime when no `Last-Modified` validator is
    /// available.
    #[serde(with = "humantime_serde")]
    pub heuristic_default_lifetime: Duration,

    /// Retry budget for stores whose update primitive is a read-modify-write
    /// cycle rather than an atomic in-place mutation.
    pub max_update_retries: usize,

    /// Upper bound on concurrent background revalidation workers. Zero
    /// disables asynchronous revalidation entirely.
    pub asynchronous_workers_max: usize,

    /// Workers kept alive when idle; workers above this count exit after
    /// [`asynchronous_worker_idle_lifetime`](Self::asynchronous_worker_idle_lifetime).
    pub asynchronous_workers_core: usize,

    /// How long a surplus idle worker waits for work before exiting.
    #[serde(with = "humantime_serde")]
    pub asynchronous_worker_idle_lifetime: Duration,

    /// Pending revalidations beyond this count are dropped (the stale
    /// response is still served).
    pub revalidation_queue_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_object_size_bytes: 8192,
            shared_cache: true,
            heuristic_caching_enabled: false,
            heuristic_coefficient: 0.1,
            heuristic_default_lifetime: Duration::ZERO,
            max_update_retries: 1,
            asynchronous_workers_max: 1,
            asynchronous_workers_core: 1,
            asynchronous_worker_idle_lifetime: Duration::from_secs(60),
            revalidation_queue_size: 100,
        }
    }
}

impl CacheConfig {
    /// Creates a builder seeded with the defaults.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder {
            config: CacheConfig::default(),
        }
    }
}

/// Builder for [`CacheConfig`].
#[derive(Debug, Clone, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Sets the maximum storable body size in bytes.
    pub fn max_object_size_bytes(mut self, bytes: usize) -> Self {
        self.config.max_object_size_bytes = bytes;
        self
    }

    /// Marks the cache as shared or private.
    pub fn shared_cache(mut self, shared: bool) -> Self {
        self.config.shared_cache = shared;
        self
    }

    /// Enables heuristic freshness.
    pub fn heuristic_caching_enabled(mut self, enabled: bool) -> Self {
        self.config.heuristic_caching_enabled = enabled;
        self
    }

    /// Sets the heuristic freshness coefficient.
    pub fn heuristic_coefficient(mut self, coefficient: f64) -> Self {
        self.config.heuristic_coefficient = coefficient;
        self
    }

    /// Sets the heuristic fallback lifetime.
    pub fn heuristic_default_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.heuristic_default_lifetime = lifetime;
        self
    }

    /// Sets the update retry budget.
    pub fn max_update_retries(mut self, retries: usize) -> Self {
        self.config.max_update_retries = retries;
        self
    }

    /// Sets the background worker cap. Zero disables background
    /// revalidation.
    pub fn asynchronous_workers_max(mut self, workers: usize) -> Self {
        self.config.asynchronous_workers_max = workers;
        self
    }

    /// Sets the number of workers kept alive when idle.
    pub fn asynchronous_workers_core(mut self, workers: usize) -> Self {
        self.config.asynchronous_workers_core = workers;
        self
    }

    /// Sets how long surplus idle workers linger.
    pub fn asynchronous_worker_idle_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.asynchronous_worker_idle_lifetime = lifetime;
        self
    }

    /// Sets the pending revalidation queue bound.
    pub fn revalidation_queue_size(mut self, size: usize) -> Self {
        self.config.revalidation_queue_size = size;
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
