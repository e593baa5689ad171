//! Snapshot aggregator (spec.md §4.8), grounded on the original's
//! `SchedSummary`/`SummaryStruct` and consumed by [`crate::monitor`] the
//! same way `recordSummary` consumes `sched.Summary().Struct()`.

use serde::Serialize;

use crate::args::ModuleArgsSummary;
use crate::fsm::State;
use crate::id::ModuleId;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PoolStats {
    pub buffer_capacity: usize,
    pub live_buffer_count: usize,
    pub len: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModuleCounterSummary {
    pub id: String,
    pub called: u64,
    pub accepted: u64,
    pub completed: u64,
    pub handling_now: u64,
    pub score: u64,
}

impl ModuleCounterSummary {
    pub fn new(id: &ModuleId, counts: crate::module::Counts, score: u64) -> Self {
        ModuleCounterSummary {
            id: id.to_string(),
            called: counts.called,
            accepted: counts.accepted,
            completed: counts.completed,
            handling_now: counts.handling_now,
            score,
        }
    }
}

/// Best-effort, non-locking snapshot of the whole scheduler (spec.md §4.8
/// "must be safe to call in any state"). `PartialEq` gives
/// [`crate::monitor`] the change-detection the original does with
/// `SchedSummaryStruct.Same`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Summary {
    pub state: String,
    pub max_depth: u32,
    pub accepted_domains: Vec<String>,
    pub module_args: Option<ModuleArgsSummary>,
    pub request_pool: Option<PoolStats>,
    pub response_pool: Option<PoolStats>,
    pub item_pool: Option<PoolStats>,
    pub error_pool: Option<PoolStats>,
    pub modules: Vec<ModuleCounterSummary>,
    pub total_urls_seen: usize,
}

impl Summary {
    pub fn state_name(state: State) -> String {
        state.to_string()
    }
}
