//! Module contracts, counters, and the registry that picks among
//! registered instances (spec.md §3, §4.3, §4.4).

pub mod contracts;
pub mod counters;
pub mod registry;

pub use contracts::{Analyzer, Fetcher, Module, ModuleHandle, Processor};
pub use counters::{default_score, CalculateScore, Counts, HandlingGuard, ModuleCounters};
pub use registry::Registry;
