//! Retry policies.
//!
//! ## Contents
//! - [`RetryBackoff`] how long to wait between attempts (delay + step × attempt, capped)
//! - [`JitterPolicy`]  randomization to avoid synchronized retries
//!
//! ## Quick wiring
//! ```text
//! PoolConfig.job (JobDefaults) ─┐
//!                               ├─► JobSpec::resolve() ─► RetryBackoff
//! Job::retry_delay() ... ───────┘        └─► core::runner uses backoff.next(attempt)
//! ```
//!
//! ## Defaults
//! - `RetryBackoff::default()` → delay=100ms, step=100ms, max=30s, jitter=None.

mod backoff;
mod jitter;

pub use backoff::RetryBackoff;
pub use jitter::JitterPolicy;
