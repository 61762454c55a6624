//! Async admission trait used by request handlers.

use async_trait::async_trait;

use super::decision::Admission;
use super::limiter::RateLimiter;
use crate::error::Result;

/// Trait for admission check implementations.
///
/// Request handlers hold an `Arc<dyn AdmissionBackend>` so tests can swap in
/// a fresh limiter per case.
#[async_trait]
pub trait AdmissionBackend: Send + Sync {
    /// Count a request against `token` and decide whether it may proceed.
    async fn check(&self, token: &str, limit: u32) -> Result<Admission>;
}

#[async_trait]
impl AdmissionBackend for RateLimiter {
    async fn check(&self, token: &str, limit: u32) -> Result<Admission> {
        // The check never suspends; the async signature is for the caller.
        RateLimiter::check(self, token, limit)
    }
}
