//! Per-key bucket registry.
//!
//! Maps a key (the resolved client IP) to its own [`TokenBucket`], creating
//! the bucket on first sight of the key.
//!
//! # Locking
//!
//! A single [`Mutex`] guards the whole map. Lookup-or-create and the token
//! check happen under one acquisition, so two concurrent first requests
//! for the same key can never end up with two different buckets, and no
//! token is handed out twice. Every critical section is O(1) and never
//! blocks on I/O.
//!
//! # Growth
//!
//! Buckets are never evicted. A process that sees many distinct keys keeps
//! one bucket per key for its whole lifetime; watch the
//! `throttle_tracked_keys` gauge.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::bucket::{BucketFactory, GovernorBucketFactory, TokenBucket};
use crate::metrics;

/// Key → bucket map with lazy bucket creation.
pub struct Registry<F: BucketFactory = GovernorBucketFactory> {
    factory: F,
    buckets: Mutex<HashMap<String, F::Bucket>>,
}

impl<F: BucketFactory> Registry<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Decide whether one more event for `key` is allowed right now.
    ///
    /// Creates a full bucket for `key` if none exists yet. The empty string
    /// is a valid key like any other.
    pub fn allow(&self, key: &str) -> bool {
        let mut buckets = self.lock();

        if let Some(bucket) = buckets.get(key) {
            return bucket.try_acquire();
        }

        let bucket = self.factory.create();
        let allowed = bucket.try_acquire();
        buckets.insert(key.to_owned(), bucket);

        let tracked = buckets.len();
        drop(buckets);

        debug!(key = %key, tracked, "Created rate limit bucket for new key");
        metrics::set_tracked_keys(tracked);

        allowed
    }

    /// Number of keys that currently own a bucket.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    // Bucket state stays consistent even if another thread panicked while
    // holding the lock, so a poisoned mutex is simply reused.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, F::Bucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
