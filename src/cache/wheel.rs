//! Expiration Wheel Module
//!
//! A fixed ring of time buckets slicing the TTL window. Entries are referred
//! to by their tracker slot. Each sweep tick drains a single bucket, so the
//! cost of a tick is bounded by that bucket's occupancy rather than the size
//! of the cache.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::CacheConfig;

#[derive(Debug, Default)]
struct Bucket {
    slots: HashSet<usize>,
    /// Latest expiration scheduled into this bucket since it was last swept
    newest: Option<Instant>,
}

// == Expiration Wheel ==
/// Circular set of buckets with a cursor pointing at the next bucket to sweep.
///
/// An entry scheduled while the cursor is at `c` lands in bucket `c - 1`, the
/// bucket swept last among the next `num_buckets` sweeps. Sweeps run once per
/// bucket width, so that bucket comes due after roughly one full TTL.
#[derive(Debug)]
pub struct ExpirationWheel {
    buckets: Vec<Bucket>,
    cursor: usize,
    ttl: Duration,
    width: Duration,
}

impl ExpirationWheel {
    // == Constructor ==
    /// Builds a wheel for the configured TTL.
    ///
    /// The bucket count and width come from [`CacheConfig::effective_buckets`]
    /// and [`CacheConfig::bucket_width`], so one rotation spans the TTL.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            buckets: (0..config.effective_buckets())
                .map(|_| Bucket::default())
                .collect(),
            cursor: 0,
            ttl: config.effective_ttl(),
            width: config.bucket_width(),
        }
    }

    /// Sweep period.
    pub fn bucket_width(&self) -> Duration {
        self.width
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Index of the next bucket to sweep.
    #[cfg(test)]
    fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of scheduled slots across all buckets.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.slots.len()).sum()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.slots.is_empty())
    }

    // == Schedule ==
    /// Places `slot` in the bucket swept last, moving it out of `previous`.
    ///
    /// Returns the owning bucket and the instant the entry expires.
    pub fn schedule(&mut self, slot: usize, previous: Option<usize>, now: Instant) -> (usize, Instant) {
        if let Some(bucket) = previous {
            self.unschedule(slot, bucket);
        }

        let count = self.buckets.len();
        let target = (self.cursor + count - 1) % count;
        let expires_at = now + self.ttl;

        let bucket = &mut self.buckets[target];
        bucket.slots.insert(slot);
        bucket.newest = Some(bucket.newest.map_or(expires_at, |n| n.max(expires_at)));

        (target, expires_at)
    }

    /// Moves `slot` into the cursor bucket as expiring at `now`, so the next
    /// sweep removes it.
    pub fn schedule_now(&mut self, slot: usize, previous: Option<usize>, now: Instant) -> usize {
        if let Some(bucket) = previous {
            self.unschedule(slot, bucket);
        }

        let target = self.cursor;
        let bucket = &mut self.buckets[target];
        bucket.slots.insert(slot);
        bucket.newest = Some(bucket.newest.map_or(now, |n| n.max(now)));

        target
    }

    // == Unschedule ==
    /// Drops `slot` from `bucket`. Unknown slots are ignored.
    pub fn unschedule(&mut self, slot: usize, bucket: usize) {
        if let Some(b) = self.buckets.get_mut(bucket) {
            b.slots.remove(&slot);
        }
    }

    // == Next Due ==
    /// Instant at which every entry in the cursor bucket has expired.
    ///
    /// None when the cursor bucket is empty.
    pub fn next_due(&self) -> Option<Instant> {
        let bucket = &self.buckets[self.cursor];
        if bucket.slots.is_empty() {
            None
        } else {
            bucket.newest
        }
    }

    // == Advance ==
    /// Drains the cursor bucket and moves the cursor forward.
    ///
    /// Returns the slots that were still linked in the drained bucket; the
    /// caller detaches them from the tracker.
    pub fn advance(&mut self) -> Vec<usize> {
        let bucket = &mut self.buckets[self.cursor];
        let expired: Vec<usize> = bucket.slots.drain().collect();
        bucket.newest = None;

        self.cursor = (self.cursor + 1) % self.buckets.len();
        expired
    }

    // == Clear ==
    /// Empties every bucket, keeping the cursor position.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.slots.clear();
            bucket.newest = None;
        }
    }
}
