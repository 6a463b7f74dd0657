//! # gcrcleaner-core
//!
//! Shared runtime primitives for the registry cleaner:
//!
//! - [`worker`]: an ordered, bounded-concurrency task pool
//! - [`cache`]: a time-bounded membership cache for message deduplication
//! - [`observability`]: logging initialization helpers

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod observability;
pub mod worker;

pub use cache::{DedupCache, TimerCache};
pub use worker::{PoolStopped, WorkerPool};
