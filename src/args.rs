//! Argument containers passed to `Scheduler::init` (spec.md §6), grounded
//! on the original's `scheduler/args.go`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{CrawlError, CrawlResult};
use crate::module::{Analyzer, Fetcher, Processor};

/// Controls crawl breadth and depth (spec.md §6 "RequestArgs").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestArgs {
    pub accepted_domains: Vec<String>,
    pub max_depth: u32,
}

impl RequestArgs {
    pub fn check(&self) -> CrawlResult<()> {
        if self.accepted_domains.is_empty() {
            return Err(CrawlError::IllegalParameter(
                "empty accepted primary domain list".to_string(),
            ));
        }
        Ok(())
    }

    /// Structural equality used by callers deciding whether a re-`init`
    /// actually changes anything (mirrors the original's `Same`).
    pub fn same(&self, other: &RequestArgs) -> bool {
        self.max_depth == other.max_depth && self.accepted_domains == other.accepted_domains
    }
}

/// Buffer-pool sizing knobs, one capacity/max-count pair per pool
/// (spec.md §6 "DataArgs"). All eight fields must be non-zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DataArgs {
    pub req_buffer_cap: u32,
    pub req_max_buffer_number: u32,
    pub resp_buffer_cap: u32,
    pub resp_max_buffer_number: u32,
    pub item_buffer_cap: u32,
    pub item_max_buffer_number: u32,
    pub error_buffer_cap: u32,
    pub error_max_buffer_number: u32,
}

impl DataArgs {
    pub fn check(&self) -> CrawlResult<()> {
        let fields: [(&str, u32); 8] = [
            ("request buffer capacity", self.req_buffer_cap),
            ("max request buffer number", self.req_max_buffer_number),
            ("response buffer capacity", self.resp_buffer_cap),
            ("max response buffer number", self.resp_max_buffer_number),
            ("item buffer capacity", self.item_buffer_cap),
            ("max item buffer number", self.item_max_buffer_number),
            ("error buffer capacity", self.error_buffer_cap),
            ("max error buffer number", self.error_max_buffer_number),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(CrawlError::IllegalParameter(format!("zero {name}")));
            }
        }
        Ok(())
    }
}

/// The registered module instances a scheduler run is constructed from
/// (spec.md §6 "ModuleArgs"). All three lists must be non-empty.
#[derive(Clone)]
pub struct ModuleArgs {
    pub fetchers: Vec<Arc<dyn Fetcher>>,
    pub analyzers: Vec<Arc<dyn Analyzer>>,
    pub processors: Vec<Arc<dyn Processor>>,
}

impl ModuleArgs {
    pub fn check(&self) -> CrawlResult<()> {
        if self.fetchers.is_empty() {
            return Err(CrawlError::IllegalParameter("empty fetcher list".to_string()));
        }
        if self.analyzers.is_empty() {
            return Err(CrawlError::IllegalParameter("empty analyzer list".to_string()));
        }
        if self.processors.is_empty() {
            return Err(CrawlError::IllegalParameter("empty processor list".to_string()));
        }
        Ok(())
    }

    pub fn summary(&self) -> ModuleArgsSummary {
        ModuleArgsSummary {
            fetcher_list_size: self.fetchers.len(),
            analyzer_list_size: self.analyzers.len(),
            processor_list_size: self.processors.len(),
        }
    }
}

/// Sizes of a [`ModuleArgs`], reported without exposing the modules
/// themselves (spec.md §9, `ModuleArgsSummary`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleArgsSummary {
    pub fetcher_list_size: usize,
    pub analyzer_list_size: usize,
    pub processor_list_size: usize,
}
