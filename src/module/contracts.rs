//! The module base trait and the three kind-specific capability traits the
//! scheduler dispatches to (spec.md §6). These are the contracts imposed on
//! external collaborators; the scheduler core never implements them itself,
//! only calls through them.
//!
//! Every concrete implementation must be safe for concurrent invocation by
//! multiple worker loops (spec.md §3) — the `Send + Sync` bound on each
//! trait is load-bearing, not decorative.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CrawlError;
use crate::id::{ModuleId, ModuleKind};
use crate::item::Data;
use crate::module::counters::{CalculateScore, Counts, ModuleCounters};
use crate::request::Request;
use crate::response::Response;

/// Fields and operations every module exposes regardless of kind
/// (spec.md §3: "an opaque value exposing {id, address, counters, score,
/// score-calculator} plus one kind-specific operation").
pub trait Module: Send + Sync {
    fn id(&self) -> &ModuleId;

    fn address(&self) -> &str;

    fn counters(&self) -> &ModuleCounters;

    fn score_calculator(&self) -> CalculateScore;

    /// Cached score; the registry recomputes and caches it before picking
    /// (spec.md §4.4), so reading it elsewhere may observe a stale value.
    fn score(&self) -> u64 {
        self.counters().score()
    }

    fn counts(&self) -> Counts {
        self.counters().snapshot()
    }
}

/// Downloads a request into a response. Equivalent to the original's
/// `Downloader` interface (`module/base.go`).
#[async_trait]
pub trait Fetcher: Module {
    async fn fetch(&self, request: &Request) -> Result<Response, CrawlError>;
}

/// Analyzes a response into new requests and items, or errors.
#[async_trait]
pub trait Analyzer: Module {
    async fn analyze(&self, response: &Response) -> (Vec<Data>, Vec<CrawlError>);
}

/// Sends an item through a chain of item processors. `fail_fast` controls
/// whether the first failing step aborts the remaining steps (spec.md §6).
#[async_trait]
pub trait Processor: Module {
    async fn send(&self, item: crate::item::Item) -> Vec<CrawlError>;

    fn fail_fast(&self) -> bool;
}

/// A type-erased module kept in the [`crate::module::Registry`]'s unified
/// map. The registry picks by score through the common `Module` surface;
/// worker loops match back down to the concrete capability they need to
/// invoke (spec.md §4.4's "kind → id → module map" realized as one map
/// holding one tagged union instead of three parallel maps).
#[derive(Clone)]
pub enum ModuleHandle {
    Fetcher(Arc<dyn Fetcher>),
    Analyzer(Arc<dyn Analyzer>),
    Processor(Arc<dyn Processor>),
}

impl ModuleHandle {
    pub fn kind(&self) -> ModuleKind {
        match self {
            ModuleHandle::Fetcher(_) => ModuleKind::Fetcher,
            ModuleHandle::Analyzer(_) => ModuleKind::Analyzer,
            ModuleHandle::Processor(_) => ModuleKind::Processor,
        }
    }

    pub fn as_fetcher(&self) -> Option<&Arc<dyn Fetcher>> {
        match self {
            ModuleHandle::Fetcher(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_analyzer(&self) -> Option<&Arc<dyn Analyzer>> {
        match self {
            ModuleHandle::Analyzer(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_processor(&self) -> Option<&Arc<dyn Processor>> {
        match self {
            ModuleHandle::Processor(p) => Some(p),
            _ => None,
        }
    }
}

impl Module for ModuleHandle {
    fn id(&self) -> &ModuleId {
        match self {
            ModuleHandle::Fetcher(m) => m.id(),
            ModuleHandle::Analyzer(m) => m.id(),
            ModuleHandle::Processor(m) => m.id(),
        }
    }

    fn address(&self) -> &str {
        match self {
            ModuleHandle::Fetcher(m) => m.address(),
            ModuleHandle::Analyzer(m) => m.address(),
            ModuleHandle::Processor(m) => m.address(),
        }
    }

    fn counters(&self) -> &ModuleCounters {
        match self {
            ModuleHandle::Fetcher(m) => m.counters(),
            ModuleHandle::Analyzer(m) => m.counters(),
            ModuleHandle::Processor(m) => m.counters(),
        }
    }

    fn score_calculator(&self) -> CalculateScore {
        match self {
            ModuleHandle::Fetcher(m) => m.score_calculator(),
            ModuleHandle::Analyzer(m) => m.score_calculator(),
            ModuleHandle::Processor(m) => m.score_calculator(),
        }
    }
}
