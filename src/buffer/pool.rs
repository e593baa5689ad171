//! Elastic buffer pool (spec.md §4.2), grounded on the original's
//! `toolkit/buffer/pool.go` for the grow/shrink thresholds and on the
//! teacher's `daq-pool::BufferPool` for the Rust shape: a `Clone`-able
//! handle over an `Arc`-ed inner state, pre-allocated at construction,
//! reporting its activity through `tracing`.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_queue::SegQueue;
use parking_lot::RwLock;
use tracing::info;

use crate::buffer::{Buffer, PutOutcome};
use crate::error::{CrawlError, CrawlResult};

/// Carrier of [`Buffer`] handles plus the bookkeeping needed to grow and
/// shrink it. `structure_lock` gives put/get shared (read) access so they
/// run concurrently, while growing a new buffer or closing the pool takes
/// the exclusive (write) side — the same shared-reader/exclusive-closer
/// discipline as [`Buffer`] itself, one level up.
pub struct BufferPool<T> {
    carrier: SegQueue<Arc<Buffer<T>>>,
    buffer_capacity: usize,
    max_buffer_count: usize,
    live_buffer_count: AtomicUsize,
    length: AtomicI64,
    closed: AtomicBool,
    structure_lock: RwLock<()>,
}

impl<T> BufferPool<T> {
    /// # Panics
    /// Panics if any of `initial_buffer_count`, `buffer_capacity`, or
    /// `max_buffer_count` is 0, or if `initial_buffer_count` exceeds
    /// `max_buffer_count`.
    pub fn new(initial_buffer_count: usize, buffer_capacity: usize, max_buffer_count: usize) -> Self {
        assert!(initial_buffer_count > 0, "initial_buffer_count must be > 0");
        assert!(buffer_capacity > 0, "buffer_capacity must be > 0");
        assert!(max_buffer_count > 0, "max_buffer_count must be > 0");
        assert!(
            initial_buffer_count <= max_buffer_count,
            "initial_buffer_count must not exceed max_buffer_count"
        );

        let carrier = SegQueue::new();
        for _ in 0..initial_buffer_count {
            carrier.push(Arc::new(Buffer::new(buffer_capacity)));
        }

        info!(
            initial_buffer_count,
            buffer_capacity, max_buffer_count, "BufferPool created"
        );

        BufferPool {
            carrier,
            buffer_capacity,
            max_buffer_count,
            live_buffer_count: AtomicUsize::new(initial_buffer_count),
            length: AtomicI64::new(0),
            closed: AtomicBool::new(false),
            structure_lock: RwLock::new(()),
        }
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    pub fn max_buffer_count(&self) -> usize {
        self.max_buffer_count
    }

    pub fn live_buffer_count(&self) -> usize {
        self.live_buffer_count.load(Ordering::Relaxed)
    }

    /// Total number of items currently held across every live buffer.
    pub fn len(&self) -> i64 {
        self.length.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn next_buffer(&self) -> Arc<Buffer<T>> {
        self.carrier
            .pop()
            .expect("carrier must never be empty while the pool is open")
    }

    /// Puts `item` into the pool, rotating through the carrier and growing
    /// when contention is sustained (spec.md §4.2 steps 1-6).
    ///
    /// Each rotation attempt takes and releases `structure_lock`'s read
    /// side individually rather than holding it for the whole call: a pool
    /// saturated at `max_buffer_count` with no consumer draining it retries
    /// indefinitely (spec.md §8 S1 "implementer MAY retry-block"), and a
    /// version of this loop that held the guard across that retry would
    /// starve `close()`'s writer forever. Dropping the guard between
    /// attempts — and yielding once saturation is detected — guarantees
    /// `close()` always finds a gap to acquire the exclusive side.
    pub fn put(&self, item: T) -> CrawlResult<()> {
        let mut item = item;
        let mut attempts: usize = 0;
        loop {
            let guard = self.structure_lock.read();
            if self.closed() {
                return Err(CrawlError::ClosedPool);
            }
            let live = self.live_buffer_count().max(1);
            let buf = self.next_buffer();
            let outcome = buf
                .put(item)
                .expect("buffer drained from an open pool must itself be open");
            match outcome {
                PutOutcome::Accepted => {
                    self.carrier.push(buf);
                    self.length.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                PutOutcome::Full(returned) => {
                    item = returned;
                    self.carrier.push(buf);
                    attempts += 1;
                    let should_grow = attempts > 5 * live && live < self.max_buffer_count;
                    drop(guard);
                    if should_grow {
                        return self.grow_and_put(item);
                    }
                    if live >= self.max_buffer_count {
                        // Pool saturated at its ceiling with nobody draining
                        // it: nothing left to do but wait for room, without
                        // starving a concurrent close().
                        std::thread::yield_now();
                    }
                }
            }
        }
    }

    /// Double-checked-locked growth: re-validates both the live/max bound
    /// and the closed flag under the exclusive lock before allocating a
    /// new buffer, so a racing `close()` or another grower is never missed
    /// (spec.md §4.2 "Growth uses double-checked locking").
    fn grow_and_put(&self, item: T) -> CrawlResult<()> {
        let guard = self.structure_lock.write();
        if self.closed() {
            return Err(CrawlError::ClosedPool);
        }
        if self.live_buffer_count() >= self.max_buffer_count {
            drop(guard);
            return self.put(item);
        }

        let fresh = Arc::new(Buffer::new(self.buffer_capacity));
        match fresh
            .put(item)
            .expect("a freshly constructed buffer cannot be closed")
        {
            PutOutcome::Accepted => {}
            PutOutcome::Full(_) => unreachable!("a fresh buffer always has a free slot"),
        }
        self.carrier.push(fresh);
        self.live_buffer_count.fetch_add(1, Ordering::Relaxed);
        self.length.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Gets an item from the pool, rotating through the carrier and
    /// shrinking the buffer it drained from when contention on an empty
    /// buffer has been sustained (spec.md §4.2 steps 1-5).
    ///
    /// Bounds its internal attempt budget at `10 * live_buffer_count`
    /// attempts so a fully-drained pool returns `Ok(None)` rather than
    /// spinning — the non-blocking contract (spec.md §4.1) requires this
    /// call to return promptly; the scheduler's worker loops own retry and
    /// idle detection (spec.md §4.6) above this layer.
    pub fn get(&self) -> CrawlResult<Option<T>> {
        let guard = self.structure_lock.read();
        if self.closed() && self.is_empty() {
            return Err(CrawlError::ClosedPool);
        }
        let mut attempts: usize = 0;
        loop {
            let live = self.live_buffer_count().max(1);
            let buf = self.next_buffer();
            match buf
                .get()
                .expect("buffer drained from an open pool must itself be open")
            {
                Some(item) => {
                    self.length.fetch_sub(1, Ordering::Relaxed);
                    if attempts >= 10 * live && buf.is_empty() && live > 1 {
                        buf.close();
                        self.live_buffer_count.fetch_sub(1, Ordering::Relaxed);
                    } else {
                        self.carrier.push(buf);
                    }
                    return Ok(Some(item));
                }
                None => {
                    self.carrier.push(buf);
                    attempts += 1;
                    if attempts > 10 * live {
                        drop(guard);
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// CAS closed flag 0→1; drains and closes every live buffer under the
    /// exclusive lock. Idempotent; exactly one caller observes `true`.
    pub fn close(&self) -> bool {
        let _guard = self.structure_lock.write();
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        while let Some(buf) = self.carrier.pop() {
            buf.close();
        }
        true
    }
}
