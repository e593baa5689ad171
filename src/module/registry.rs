//! Type-indexed store of module instances (spec.md §4.4), grounded on the
//! original's `module/registrar.go` and reworked on top of the teacher's
//! `parking_lot::RwLock` + nested-map registry shape
//! (`hardware/registry.rs`'s `DeviceRegistry`).

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{CrawlError, CrawlResult};
use crate::id::{ModuleId, ModuleKind};
use crate::module::contracts::{Module, ModuleHandle};

/// One rw-lock covering the kind → id → module map (spec.md §4.9 "Locking
/// order"). Each entry is a [`ModuleHandle`], a tagged union over the
/// three capability traits, so one map can hold all three kinds while
/// still letting a worker loop recover the concrete trait it needs to
/// call.
pub struct Registry {
    modules: RwLock<HashMap<ModuleKind, HashMap<ModuleId, ModuleHandle>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            modules: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts `handle` keyed by its own id. Verifies the id's kind tag
    /// matches the handle's actual variant (spec.md §4.4 "verify the id's
    /// kind tag matches the module's actual kind"). A duplicate id is not
    /// an error — it returns `Ok(false)` and leaves the existing entry in
    /// place, mirroring the original's `(false, nil)` return.
    pub fn register(&self, handle: ModuleHandle) -> CrawlResult<bool> {
        let id = handle.id().clone();
        if id.kind() != handle.kind() {
            return Err(CrawlError::IllegalParameter(format!(
                "module id {id} declares kind {:?} but handle is {:?}",
                id.kind(),
                handle.kind()
            )));
        }
        let mut modules = self.modules.write();
        let submap = modules.entry(handle.kind()).or_default();
        if submap.contains_key(&id) {
            return Ok(false);
        }
        submap.insert(id, handle);
        Ok(true)
    }

    pub fn unregister(&self, kind: ModuleKind, id: &ModuleId) -> bool {
        let mut modules = self.modules.write();
        modules
            .get_mut(&kind)
            .map(|submap| submap.remove(id).is_some())
            .unwrap_or(false)
    }

    /// Recomputes and caches every candidate's score, then returns the one
    /// with the minimum score, breaking ties on the smaller id string
    /// (spec.md §4.4: "any deterministic rule... stable within one call").
    ///
    /// Recomputing on every `get` rather than trusting the cached value is
    /// what lets `handling_now` — which dominates the default score — pull
    /// load away from modules that are mid-request right now.
    pub fn get(&self, kind: ModuleKind) -> CrawlResult<ModuleHandle> {
        let modules = self.modules.read();
        let submap = modules.get(&kind).ok_or(CrawlError::NotFound(kind))?;
        if submap.is_empty() {
            return Err(CrawlError::NotFound(kind));
        }
        let mut best: Option<&ModuleHandle> = None;
        for candidate in submap.values() {
            candidate.counters().refresh_score(candidate.score_calculator());
            best = match best {
                None => Some(candidate),
                Some(current) if candidate.score() < current.score() => Some(candidate),
                Some(current)
                    if candidate.score() == current.score()
                        && candidate.id().to_string() < current.id().to_string() =>
                {
                    Some(candidate)
                }
                Some(current) => Some(current),
            };
        }
        best.cloned().ok_or(CrawlError::NotFound(kind))
    }

    pub fn get_all_by_kind(&self, kind: ModuleKind) -> Vec<ModuleHandle> {
        self.modules
            .read()
            .get(&kind)
            .map(|submap| submap.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_all(&self) -> Vec<ModuleHandle> {
        self.modules
            .read()
            .values()
            .flat_map(|submap| submap.values().cloned())
            .collect()
    }

    pub fn clear(&self) {
        self.modules.write().clear();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::module::contracts::Fetcher;
    use crate::module::counters::{default_score, CalculateScore, ModuleCounters};
    use crate::request::Request;
    use crate::response::Response;

    struct StubFetcher {
        id: ModuleId,
        counters: ModuleCounters,
    }

    impl Module for StubFetcher {
        fn id(&self) -> &ModuleId {
            &self.id
        }

        fn address(&self) -> &str {
            ""
        }

        fn counters(&self) -> &ModuleCounters {
            &self.counters
        }

        fn score_calculator(&self) -> CalculateScore {
            default_score
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, _request: &Request) -> Result<Response, CrawlError> {
            unimplemented!("not exercised by registry tests")
        }
    }

    fn stub(id: &str) -> ModuleHandle {
        ModuleHandle::Fetcher(Arc::new(StubFetcher {
            id: id.parse().expect("valid id"),
            counters: ModuleCounters::new(),
        }))
    }

    #[test]
    fn register_rejects_duplicate_id_without_error() {
        let registry = Registry::new();
        let a = stub("D|1|");
        let b = stub("D|1|");
        assert!(registry.register(a).expect("first registers"));
        assert!(!registry.register(b).expect("duplicate is not an error"));
        assert_eq!(registry.get_all_by_kind(ModuleKind::Fetcher).len(), 1);
    }

    #[test]
    fn register_rejects_mismatched_kind_tag() {
        let registry = Registry::new();
        let mismatched = ModuleHandle::Fetcher(Arc::new(StubFetcher {
            id: "A|1|".parse().expect("valid id"),
            counters: ModuleCounters::new(),
        }));
        assert!(matches!(
            registry.register(mismatched),
            Err(CrawlError::IllegalParameter(_))
        ));
    }

    #[test]
    fn get_fails_not_found_on_empty_kind() {
        let registry = Registry::new();
        let err = registry.get(ModuleKind::Analyzer).unwrap_err();
        assert!(matches!(err, CrawlError::NotFound(ModuleKind::Analyzer)));
    }

    #[test]
    fn get_picks_least_loaded_module() {
        let registry = Registry::new();
        let f1 = stub("D|1|");
        let f2 = stub("D|2|");
        // held for the whole test so handling_now stays at 2 on f2
        let _guards = (f2.counters().begin_handling(), f2.counters().begin_handling());
        registry.register(f1.clone()).unwrap();
        registry.register(f2.clone()).unwrap();

        let picked = registry.get(ModuleKind::Fetcher).expect("has candidates");
        assert_eq!(picked.id(), f1.id());
    }

    #[test]
    fn get_breaks_ties_on_smaller_id_string() {
        let registry = Registry::new();
        registry.register(stub("D|2|")).unwrap();
        registry.register(stub("D|10|")).unwrap();
        let picked = registry.get(ModuleKind::Fetcher).expect("has candidates");
        assert_eq!(picked.id().to_string(), "D|10|");
    }

    #[test]
    fn unregister_removes_entry() {
        let registry = Registry::new();
        let module = stub("D|1|");
        registry.register(module.clone()).unwrap();
        assert!(registry.unregister(ModuleKind::Fetcher, module.id()));
        assert!(registry.get(ModuleKind::Fetcher).is_err());
    }
}
