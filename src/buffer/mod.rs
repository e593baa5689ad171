//! Closable, fixed-capacity FIFO buffer (spec.md §4.1).
//!
//! Backed by `crossbeam_queue::ArrayQueue` for non-blocking, lock-free
//! push/pop. The only thing guarded by an actual lock is the transition to
//! closed: puts take the lock's read side so any number of them can run
//! concurrently, while `close` takes the write side so it can only observe
//! the buffer either fully before or fully after an in-flight put, never a
//! torn state (spec.md §4.1 "shared-reader / exclusive-closer").

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_queue::ArrayQueue;
use parking_lot::RwLock;

use crate::error::{CrawlError, CrawlResult};

pub mod pool;
pub use pool::BufferPool;

/// Outcome of a non-blocking [`Buffer::put`].
pub enum PutOutcome<T> {
    /// The item was accepted.
    Accepted,
    /// The buffer was full; the item is handed back to the caller.
    Full(T),
}

pub struct Buffer<T> {
    queue: ArrayQueue<T>,
    closed: AtomicBool,
    close_lock: RwLock<()>,
}

impl<T> Buffer<T> {
    /// # Panics
    /// Panics if `capacity` is 0 — a zero-capacity FIFO can never accept a
    /// put and the pool's growth math assumes every buffer can.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be > 0");
        Buffer {
            queue: ArrayQueue::new(capacity),
            closed: AtomicBool::new(false),
            close_lock: RwLock::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn size(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Non-blocking insert. Fails with [`CrawlError::ClosedBuffer`] if the
    /// buffer is closed; returns [`PutOutcome::Full`] (not an error) if the
    /// buffer has no free slot.
    pub fn put(&self, item: T) -> CrawlResult<PutOutcome<T>> {
        let _guard = self.close_lock.read();
        if self.closed() {
            return Err(CrawlError::ClosedBuffer);
        }
        match self.queue.push(item) {
            Ok(()) => Ok(PutOutcome::Accepted),
            Err(item) => Ok(PutOutcome::Full(item)),
        }
    }

    /// Non-blocking removal of the head. `Ok(None)` means empty-but-open;
    /// `Err(ClosedBuffer)` means closed and drained.
    pub fn get(&self) -> CrawlResult<Option<T>> {
        match self.queue.pop() {
            Some(item) => Ok(Some(item)),
            None if self.closed() => Err(CrawlError::ClosedBuffer),
            None => Ok(None),
        }
    }

    /// CAS closed flag 0→1 under the exclusive lock. Idempotent; exactly
    /// one caller observes `true`.
    pub fn close(&self) -> bool {
        let _guard = self.close_lock.write();
        self.closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get_round_trip() {
        let buf: Buffer<u32> = Buffer::new(2);
        assert!(matches!(buf.put(1).unwrap(), PutOutcome::Accepted));
        assert_eq!(buf.size(), 1);
        assert_eq!(buf.get().unwrap(), Some(1));
        assert_eq!(buf.get().unwrap(), None);
    }

    #[test]
    fn put_reports_full_without_error() {
        let buf: Buffer<u32> = Buffer::new(1);
        assert!(matches!(buf.put(1).unwrap(), PutOutcome::Accepted));
        match buf.put(2).unwrap() {
            PutOutcome::Full(item) => assert_eq!(item, 2),
            PutOutcome::Accepted => panic!("buffer should have been full"),
        }
    }

    #[test]
    fn close_is_idempotent_and_single_winner() {
        let buf: Buffer<u32> = Buffer::new(1);
        assert!(buf.close());
        assert!(!buf.close());
        assert!(buf.closed());
    }

    #[test]
    fn put_after_close_fails() {
        let buf: Buffer<u32> = Buffer::new(1);
        buf.close();
        assert!(matches!(buf.put(1), Err(CrawlError::ClosedBuffer)));
    }

    #[test]
    fn get_after_close_drains_then_fails() {
        let buf: Buffer<u32> = Buffer::new(2);
        buf.put(1).unwrap();
        buf.close();
        assert_eq!(buf.get().unwrap(), Some(1));
        assert!(matches!(buf.get(), Err(CrawlError::ClosedBuffer)));
    }
}
