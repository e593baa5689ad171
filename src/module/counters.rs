//! Atomic per-module counters and the score function they feed.
//!
//! Every module exposes four monotonic/bounded counts —
//! `called`, `accepted`, `completed`, `handling_now` — all read and written
//! with a single atomic op (spec.md §4.3). `HandlingGuard` enforces the
//! invariant that `handling_now` is decremented on every exit path,
//! success or failure, by tying the decrement to `Drop` instead of trusting
//! every call site to remember it.

use std::sync::atomic::{AtomicU64, Ordering};

/// A snapshot of a module's counters, used for reporting (spec.md §4.8)
/// and score calculation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub called: u64,
    pub accepted: u64,
    pub completed: u64,
    pub handling_now: u64,
}

/// A module's score summarizes its current load; lower is picked first by
/// the registry. `CalculateScore` is a pure function of `Counts` supplied
/// at module-construction time.
pub type CalculateScore = fn(Counts) -> u64;

/// Default scoring function (spec.md §3):
/// `called + 2*accepted + 4*completed + 16*handling_now`.
pub fn default_score(counts: Counts) -> u64 {
    counts
        .called
        .wrapping_add(counts.accepted.wrapping_mul(2))
        .wrapping_add(counts.completed.wrapping_mul(4))
        .wrapping_add(counts.handling_now.wrapping_mul(16))
}

/// Atomic counter block embedded in every module implementation.
#[derive(Debug, Default)]
pub struct ModuleCounters {
    called: AtomicU64,
    accepted: AtomicU64,
    completed: AtomicU64,
    handling_now: AtomicU64,
    score: AtomicU64,
}

impl ModuleCounters {
    pub fn new() -> Self {
        ModuleCounters::default()
    }

    pub fn called(&self) -> u64 {
        self.called.load(Ordering::Relaxed)
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn handling_now(&self) -> u64 {
        self.handling_now.load(Ordering::Relaxed)
    }

    pub fn incr_called(&self) {
        self.called.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Begin a unit of handling; returns a guard that decrements
    /// `handling_now` when dropped, covering every exit path including
    /// early `return`s and panics unwound through the call.
    pub fn begin_handling(&self) -> HandlingGuard<'_> {
        self.handling_now.fetch_add(1, Ordering::Relaxed);
        HandlingGuard { counters: self }
    }

    /// Four independent atomic loads; snapshot consistency across the four
    /// fields is not promised, only used for reporting (spec.md §4.3).
    pub fn snapshot(&self) -> Counts {
        Counts {
            called: self.called(),
            accepted: self.accepted(),
            completed: self.completed(),
            handling_now: self.handling_now(),
        }
    }

    pub fn score(&self) -> u64 {
        self.score.load(Ordering::Relaxed)
    }

    pub fn set_score(&self, score: u64) {
        self.score.store(score, Ordering::Relaxed);
    }

    /// Recompute and cache the score from the current counts using the
    /// supplied calculator. Returns `true` if the cached value changed.
    pub fn refresh_score(&self, calculate: CalculateScore) -> bool {
        let new_score = calculate(self.snapshot());
        if new_score == self.score() {
            return false;
        }
        self.set_score(new_score);
        true
    }

    pub fn clear(&self) {
        self.called.store(0, Ordering::Relaxed);
        self.accepted.store(0, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        self.handling_now.store(0, Ordering::Relaxed);
        self.score.store(0, Ordering::Relaxed);
    }
}

/// RAII guard returned by [`ModuleCounters::begin_handling`]. Decrements
/// `handling_now` on drop so callers cannot forget the exit-path bookkeeping
/// spec.md §3 requires ("decremented on every exit path").
pub struct HandlingGuard<'a> {
    counters: &'a ModuleCounters,
}

impl HandlingGuard<'_> {
    /// Mark this invocation as having completed successfully, incrementing
    /// `completed`. Call on the success path only; errors simply drop the
    /// guard without calling this.
    pub fn mark_completed(&self) {
        self.counters.incr_completed();
    }

    pub fn mark_accepted(&self) {
        self.counters.incr_accepted();
    }
}

impl Drop for HandlingGuard<'_> {
    fn drop(&mut self) {
        self.counters.handling_now.fetch_add(u64::MAX, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handling_guard_returns_to_zero_on_success() {
        let counters = ModuleCounters::new();
        counters.incr_called();
        {
            let guard = counters.begin_handling();
            assert_eq!(counters.handling_now(), 1);
            guard.mark_accepted();
            guard.mark_completed();
        }
        assert_eq!(counters.handling_now(), 0);
        assert_eq!(counters.accepted(), 1);
        assert_eq!(counters.completed(), 1);
    }

    #[test]
    fn handling_guard_returns_to_zero_on_early_return() {
        let counters = ModuleCounters::new();
        fn fallible(counters: &ModuleCounters, fail: bool) -> Result<(), ()> {
            let _guard = counters.begin_handling();
            if fail {
                return Err(());
            }
            Ok(())
        }
        assert!(fallible(&counters, true).is_err());
        assert_eq!(counters.handling_now(), 0);
        assert_eq!(counters.completed(), 0);
    }

    #[test]
    fn default_score_matches_spec_formula() {
        let counts = Counts {
            called: 3,
            accepted: 2,
            completed: 1,
            handling_now: 4,
        };
        assert_eq!(default_score(counts), 3 + 2 * 2 + 4 * 1 + 16 * 4);
    }

    #[test]
    fn refresh_score_reports_change() {
        let counters = ModuleCounters::new();
        assert!(!counters.refresh_score(default_score)); // 0 == 0, no change
        counters.incr_called();
        assert!(counters.refresh_score(default_score));
        assert!(!counters.refresh_score(default_score)); // stable now
    }
}
