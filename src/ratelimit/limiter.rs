//! Core rate limiter implementation.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use super::clock::{Clock, SystemClock};
use super::decision::Admission;
use super::key::TokenKey;
use super::policy::Policy;
use super::store::TokenStore;
use crate::error::{LimiterError, Result};

/// Construction-time settings for a [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    /// Maximum number of distinct tokens tracked at once
    pub capacity: usize,
    /// Time-to-live of each token's counter
    pub window: Duration,
}

impl LimiterConfig {
    /// Create a limiter configuration.
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self { capacity, window }
    }

    fn validate(&self) -> Result<NonZeroUsize> {
        if self.window.is_zero() {
            return Err(LimiterError::InvalidConfig(
                "window must be greater than zero".to_string(),
            ));
        }
        NonZeroUsize::new(self.capacity).ok_or_else(|| {
            LimiterError::InvalidConfig("capacity must be greater than zero".to_string())
        })
    }
}

/// Per-token admission control over a bounded counter store.
///
/// Every check runs under one lock: look up or create the counter, bump it,
/// compare against the caller's limit. The section is O(log n) and never
/// blocks on I/O, so concurrent requests for the same token are all counted
/// and cannot both observe the same pre-increment value.
///
/// Counts live in this process only. Replicas behind a load balancer each
/// enforce the limit independently.
pub struct RateLimiter {
    config: LimiterConfig,
    store: Mutex<TokenStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter using the system clock.
    pub fn new(config: LimiterConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a rate limiter with an explicit time source.
    pub fn with_clock(config: LimiterConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let capacity = config.validate()?;

        info!(
            capacity = capacity.get(),
            window_ms = config.window.as_millis() as u64,
            "Rate limiter initialized"
        );

        Ok(Self {
            config,
            store: Mutex::new(TokenStore::new(capacity, config.window)),
            clock,
        })
    }

    /// Count a request against `token` and decide whether it may proceed.
    ///
    /// The request is rejected once the token's count within the window
    /// reaches `limit`. A zero limit is a caller error.
    pub fn check(&self, token: &str, limit: u32) -> Result<Admission> {
        if limit == 0 {
            return Err(LimiterError::InvalidArgument(
                "limit must be greater than zero".to_string(),
            ));
        }

        let admission = {
            let mut store = self.store.lock();
            let now = self.clock.now();
            let count = store.touch(token, now).increment();
            Admission::evaluate(count, limit)
        };

        trace!(
            token = %token,
            limit = limit,
            count = admission.count,
            remaining = admission.remaining,
            "Checked rate limit"
        );

        if !admission.is_admitted() {
            debug!(
                token = %token,
                limit = limit,
                count = admission.count,
                "Rate limit exceeded"
            );
        }

        Ok(admission)
    }

    /// Check a request against a structured token key.
    pub fn check_key(&self, key: &TokenKey, limit: u32) -> Result<Admission> {
        self.check(&key.to_token(), limit)
    }

    /// Check a request under a named call-site policy.
    pub fn check_policy(&self, policy: &Policy, client: Option<&str>) -> Result<Admission> {
        let key = policy.key(client)?;
        self.check_key(&key, policy.limit)
    }

    /// Get the current count for a token.
    ///
    /// Returns `None` if the token has no live counter.
    pub fn counter_value(&self, token: &str) -> Option<u64> {
        let store = self.store.lock();
        store.peek(token, self.clock.now())
    }

    /// Get the number of counters held.
    pub fn counter_count(&self) -> usize {
        let mut store = self.store.lock();
        store.purge_expired(self.clock.now());
        store.len()
    }

    /// Clear all counters.
    pub fn clear(&self) {
        self.store.lock().clear();
    }

    /// The configuration this limiter was built with.
    pub fn config(&self) -> LimiterConfig {
        self.config
    }
}
