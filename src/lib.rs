//! Catalog Rate Limiter
//!
//! This crate implements the admission check that guards the course catalog
//! search API. Counters are kept per token in a bounded, memory-resident
//! store with least-recently-used eviction and a fixed time-to-live, so a
//! high-cardinality token space cannot grow memory without bound.
//!
//! State is per process: a deployment with several replicas enforces its
//! limits per replica, not globally.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod replay;
