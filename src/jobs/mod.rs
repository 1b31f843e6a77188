//! # Job abstractions.
//!
//! This module provides the job-related types:
//! - [`Job`] - trait for async units of work with retry/timeout policy
//! - [`JobFn`] - closure-backed job implementation
//! - [`JobRef`] - shared reference to a job (`Arc<dyn Job>`)
//! - [`JobSpec`] - a job's effective policy after applying pool defaults

mod job;
mod job_fn;
mod spec;

pub use job::{Job, JobRef};
pub use job_fn::JobFn;
pub use spec::JobSpec;
