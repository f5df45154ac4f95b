//! In-memory query cache for server state.
//!
//! This module provides a TanStack Query style cache that:
//! - Keys reads by structured [`CacheKey`]s
//! - Deduplicates concurrent reads of the same key
//! - Serves fresh values from cache and refetches stale ones
//! - Retries failed reads, except authorization failures
//! - Keeps the last good value when a refetch fails (stale-while-error)
//! - Lets mutations invalidate keys on success
//! - Collects entries nobody has used for a while

mod client;
mod key;
mod options;
mod traits;

pub use client::{QueryClient, Subscription};
pub use key::CacheKey;
pub use options::{QueryOptions, RetryPolicy};
#[allow(unused_imports)]
pub use traits::{CacheResult, CacheSource, QuerySnapshot};
