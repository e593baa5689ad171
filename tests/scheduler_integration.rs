//! End-to-end exercises of a wired-up [`rust_crawler::Scheduler`] against
//! stub modules, covering spec.md §8 scenarios S4 (admission) and S7
//! (idle-after-drain).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, StatusCode, Uri};
use parking_lot::Mutex;

use rust_crawler::args::{DataArgs, ModuleArgs, RequestArgs};
use rust_crawler::error::CrawlError;
use rust_crawler::fsm::State;
use rust_crawler::id::{ModuleId, ModuleKind};
use rust_crawler::item::{Data, Item};
use rust_crawler::module::{Analyzer, CalculateScore, Fetcher, Module, ModuleCounters, Processor, default_score};
use rust_crawler::request::Request;
use rust_crawler::response::Response;
use rust_crawler::Scheduler;

struct EchoFetcher {
    id: ModuleId,
    counters: ModuleCounters,
}

impl Module for EchoFetcher {
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
impl Fetcher for EchoFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, CrawlError> {
        let guard = self.counters.begin_handling();
        self.counters.incr_called();
        let response = Response::new(
            request.uri().clone(),
            StatusCode::OK,
            HeaderMap::new(),
            bytes::Bytes::from_static(b"ok"),
            request.depth(),
        );
        guard.mark_accepted();
        guard.mark_completed();
        Ok(response)
    }
}

/// Produces exactly one item per response and no derived requests, so a
/// single seed drains to idle after one full pipeline pass.
struct OneShotAnalyzer {
    id: ModuleId,
    counters: ModuleCounters,
}

impl Module for OneShotAnalyzer {
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
impl Analyzer for OneShotAnalyzer {
    async fn analyze(&self, response: &Response) -> (Vec<Data>, Vec<CrawlError>) {
        let guard = self.counters.begin_handling();
        self.counters.incr_called();
        let mut item = Item::new();
        item.insert("uri", response.uri().to_string());
        guard.mark_accepted();
        guard.mark_completed();
        (vec![Data::Item(item)], vec![])
    }
}

struct CountingProcessor {
    id: ModuleId,
    counters: ModuleCounters,
    seen: Arc<Mutex<Vec<Item>>>,
}

impl Module for CountingProcessor {
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
impl Processor for CountingProcessor {
    async fn send(&self, item: Item) -> Vec<CrawlError> {
        let guard = self.counters.begin_handling();
        self.counters.incr_called();
        self.seen.lock().push(item);
        guard.mark_accepted();
        guard.mark_completed();
        vec![]
    }

    fn fail_fast(&self) -> bool {
        false
    }
}

fn small_data_args() -> DataArgs {
    DataArgs {
        req_buffer_cap: 4,
        req_max_buffer_number: 4,
        resp_buffer_cap: 4,
        resp_max_buffer_number: 4,
        item_buffer_cap: 4,
        item_max_buffer_number: 4,
        error_buffer_cap: 4,
        error_max_buffer_number: 4,
    }
}

#[tokio::test]
async fn seed_drains_through_full_pipeline_then_reports_idle() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let modules = ModuleArgs {
        fetchers: vec![Arc::new(EchoFetcher {
            id: ModuleId::new(ModuleKind::Fetcher, 1, ""),
            counters: ModuleCounters::new(),
        })],
        analyzers: vec![Arc::new(OneShotAnalyzer {
            id: ModuleId::new(ModuleKind::Analyzer, 1, ""),
            counters: ModuleCounters::new(),
        })],
        processors: vec![Arc::new(CountingProcessor {
            id: ModuleId::new(ModuleKind::Processor, 1, ""),
            counters: ModuleCounters::new(),
            seen: seen.clone(),
        })],
    };

    let scheduler = Scheduler::new();
    scheduler
        .init(
            RequestArgs {
                accepted_domains: vec!["example.com".to_string()],
                max_depth: 1,
            },
            small_data_args(),
            modules,
        )
        .expect("init succeeds with non-empty module lists");

    scheduler
        .start(Request::new(Uri::from_static("http://example.com/"), 0))
        .await
        .expect("start succeeds once initialized");
    assert_eq!(scheduler.status(), State::Started);

    let became_idle = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if scheduler.idle() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(became_idle.is_ok(), "scheduler never drained to idle");
    assert_eq!(seen.lock().len(), 1, "processor should have received exactly one item");

    scheduler.stop().await.expect("stop succeeds once started");
    assert_eq!(scheduler.status(), State::Stopped);
}

#[tokio::test]
async fn seed_rejected_by_domain_filter_leaves_scheduler_idle() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let modules = ModuleArgs {
        fetchers: vec![Arc::new(EchoFetcher {
            id: ModuleId::new(ModuleKind::Fetcher, 1, ""),
            counters: ModuleCounters::new(),
        })],
        analyzers: vec![Arc::new(OneShotAnalyzer {
            id: ModuleId::new(ModuleKind::Analyzer, 1, ""),
            counters: ModuleCounters::new(),
        })],
        processors: vec![Arc::new(CountingProcessor {
            id: ModuleId::new(ModuleKind::Processor, 1, ""),
            counters: ModuleCounters::new(),
            seen: seen.clone(),
        })],
    };

    let scheduler = Scheduler::new();
    scheduler
        .init(
            RequestArgs {
                accepted_domains: vec!["example.com".to_string()],
                max_depth: 1,
            },
            small_data_args(),
            modules,
        )
        .expect("init succeeds");

    // out-of-set domain: admission must reject the seed outright
    scheduler
        .start(Request::new(Uri::from_static("http://other.com/"), 0))
        .await
        .expect("start succeeds even when the seed itself is rejected");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(scheduler.idle(), "rejected seed must never occupy a pool");
    assert_eq!(seen.lock().len(), 0);

    scheduler.stop().await.expect("stop succeeds");
}

#[tokio::test]
async fn double_init_without_stop_is_rejected_by_the_fsm() {
    let modules = || ModuleArgs {
        fetchers: vec![Arc::new(EchoFetcher {
            id: ModuleId::new(ModuleKind::Fetcher, 1, ""),
            counters: ModuleCounters::new(),
        }) as Arc<dyn Fetcher>],
        analyzers: vec![Arc::new(OneShotAnalyzer {
            id: ModuleId::new(ModuleKind::Analyzer, 1, ""),
            counters: ModuleCounters::new(),
        }) as Arc<dyn Analyzer>],
        processors: vec![Arc::new(CountingProcessor {
            id: ModuleId::new(ModuleKind::Processor, 1, ""),
            counters: ModuleCounters::new(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }) as Arc<dyn Processor>],
    };

    let scheduler = Scheduler::new();
    let args = RequestArgs {
        accepted_domains: vec!["example.com".to_string()],
        max_depth: 1,
    };
    scheduler.init(args.clone(), small_data_args(), modules()).unwrap();
    scheduler
        .start(Request::new(Uri::from_static("http://example.com/"), 0))
        .await
        .unwrap();

    let err = scheduler.init(args, small_data_args(), modules()).unwrap_err();
    assert!(matches!(err, CrawlError::IllegalState { .. }));

    scheduler.stop().await.unwrap();
}
