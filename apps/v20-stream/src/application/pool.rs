//! Record Pool
//!
//! A small pool of reusable records lent to stream handlers. The pricing
//! router acquires one record per frame and hands it to the handler as a
//! [`Pooled`] guard; the record goes back to its pool when the guard is
//! dropped or [`Pooled::release`]d. Because the guard owns the record,
//! using it after release does not compile.
//!
//! Each router owns its own pool (usually injected as an `Arc`) so sessions
//! never share records.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Default number of idle records kept per pool.
pub const DEFAULT_MAX_IDLE: usize = 64;

/// Pool of reusable `T` records.
#[derive(Debug)]
pub struct RecordPool<T> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
    outstanding: AtomicUsize,
}

impl<T: Default> Default for RecordPool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}

impl<T: Default> RecordPool<T> {
    /// Create a pool that keeps at most `max_idle` released records.
    #[must_use]
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Create a shared pool.
    #[must_use]
    pub fn shared(max_idle: usize) -> Arc<Self> {
        Arc::new(Self::new(max_idle))
    }

    /// Take a record from the pool, or a fresh default one if it is empty.
    #[must_use]
    pub fn acquire(self: &Arc<Self>) -> Pooled<T> {
        let item = self.idle.lock().pop().unwrap_or_default();
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        Pooled {
            item,
            pool: Arc::clone(self),
        }
    }

    /// Number of idle records ready for reuse.
    #[must_use]
    pub fn available(&self) -> usize {
        self.idle.lock().len()
    }

    /// Number of records currently lent out.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    fn put_back(&self, item: T) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(item);
        }
    }
}

/// A record borrowed from a [`RecordPool`].
///
/// Dereferences to the record. Dropping the guard returns the record.
pub struct Pooled<T: Default> {
    item: T,
    pool: Arc<RecordPool<T>>,
}

impl<T: Default> Pooled<T> {
    /// Return the record to its pool now.
    pub fn release(self) {
        drop(self);
    }

    /// Copy the record out so it can outlive the guard.
    #[must_use]
    pub fn to_owned_record(&self) -> T
    where
        T: Clone,
    {
        self.item.clone()
    }
}

impl<T: Default> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T: Default> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.item
    }
}

impl<T: Default + std::fmt::Debug> std::fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Pooled").field(&self.item).finish()
    }
}

impl<T: Default> Drop for Pooled<T> {
    fn drop(&mut self) {
        let item = std::mem::take(&mut self.item);
        self.pool.put_back(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release_tracks_counts() {
        let pool: Arc<RecordPool<Vec<u8>>> = RecordPool::shared(4);

        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(pool.outstanding(), 2);
        assert_eq!(pool.available(), 0);

        a.release();
        assert_eq!(pool.outstanding(), 1);
        assert_eq!(pool.available(), 1);

        drop(b);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn released_record_is_reused() {
        let pool: Arc<RecordPool<Vec<u8>>> = RecordPool::shared(4);

        let mut record = pool.acquire();
        record.reserve(1024);
        let capacity = record.capacity();
        drop(record);

        let reused = pool.acquire();
        assert!(reused.capacity() >= capacity);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn idle_records_are_capped() {
        let pool: Arc<RecordPool<String>> = RecordPool::shared(1);

        let records: Vec<_> = (0..3).map(|_| pool.acquire()).collect();
        drop(records);

        assert_eq!(pool.available(), 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn pools_are_independent() {
        let first: Arc<RecordPool<String>> = RecordPool::shared(4);
        let second: Arc<RecordPool<String>> = RecordPool::shared(4);

        let record = first.acquire();
        assert_eq!(first.outstanding(), 1);
        assert_eq!(second.outstanding(), 0);
        drop(record);
        assert_eq!(second.available(), 0);
    }
}
