//! Token bucket abstraction and its Governor-backed implementation.
//!
//! # Algorithm
//!
//! [`GovernorBucket`] wraps a direct (single-key) Governor limiter, which
//! implements the Generic Cell Rate Algorithm (GCRA). For a limit of `max`
//! events per `window` it behaves as a bucket of `max` tokens refilled
//! continuously at one token every `window / max`:
//!
//! - A fresh bucket is full, so `max` events pass immediately
//! - Refill is continuous, so a 20-per-minute limit regains one token
//!   every 3 seconds rather than all 20 at the minute boundary
//! - Idle time never accumulates more than `max` tokens
//!
//! The registry only depends on the [`TokenBucket`] and [`BucketFactory`]
//! traits, so a different limiting strategy can be plugged in without
//! touching key management.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::error::{ThrottleError, ThrottleResult};

/// A single rate-limit bucket.
pub trait TokenBucket: Send + Sync {
    /// Try to consume one token now. Returns `false` when the bucket is empty.
    fn try_acquire(&self) -> bool;
}

/// Builds a fresh, full bucket for a newly seen key.
pub trait BucketFactory: Send + Sync {
    type Bucket: TokenBucket;

    fn create(&self) -> Self::Bucket;
}

type DirectLimiter<C> =
    RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Token bucket backed by a direct Governor rate limiter.
pub struct GovernorBucket<C: Clock = DefaultClock> {
    limiter: DirectLimiter<C>,
}

impl<C> TokenBucket for GovernorBucket<C>
where
    C: Clock + Send + Sync,
    C::Instant: Send + Sync,
{
    #[inline]
    fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Creates [`GovernorBucket`]s sharing one quota and one clock.
#[derive(Clone)]
pub struct GovernorBucketFactory<C: Clock = DefaultClock> {
    quota: Quota,
    clock: C,
}

impl GovernorBucketFactory<DefaultClock> {
    /// Create a factory for buckets allowing `max` events per `window`.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::ZeroMax`] if `max` is 0, or
    /// [`ThrottleError::ZeroInterval`] if `window / max` rounds to zero.
    pub fn new(max: u32, window: Duration) -> ThrottleResult<Self> {
        Self::with_clock(max, window, DefaultClock::default())
    }
}

impl<C> GovernorBucketFactory<C>
where
    C: Clock + Clone,
{
    /// Same as [`GovernorBucketFactory::new`], driven by an explicit clock.
    pub fn with_clock(max: u32, window: Duration, clock: C) -> ThrottleResult<Self> {
        let burst = NonZeroU32::new(max).ok_or(ThrottleError::ZeroMax)?;
        let quota = Quota::with_period(window / max)
            .ok_or(ThrottleError::ZeroInterval { max, window })?
            .allow_burst(burst);

        Ok(Self { quota, clock })
    }

    /// The quota every bucket is created with.
    pub fn quota(&self) -> Quota {
        self.quota
    }
}

impl<C> BucketFactory for GovernorBucketFactory<C>
where
    C: Clock + Clone + Send + Sync,
    C::Instant: Send + Sync,
{
    type Bucket = GovernorBucket<C>;

    fn create(&self) -> Self::Bucket {
        GovernorBucket {
            limiter: RateLimiter::direct_with_clock(self.quota, self.clock.clone()),
        }
    }
}
