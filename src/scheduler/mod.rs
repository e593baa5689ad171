//! The scheduler itself (spec.md §4.7, §6 "Scheduler API"): owns the four
//! data pools, the module registry, the lifecycle FSM, and the admission
//! pipeline, and drives the fetch/analyze/pick worker loops.

pub mod summary;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::args::{DataArgs, ModuleArgs, ModuleArgsSummary, RequestArgs};
use crate::buffer::BufferPool;
use crate::dedup::UrlDedup;
use crate::domain::DomainFilter;
use crate::error::{CrawlError, CrawlResult};
use crate::fsm::{LifecycleFsm, State, Transition};
use crate::id::ModuleKind;
use crate::item::{Data, Item};
use crate::module::{Module, ModuleHandle, Registry};
use crate::request::Request;
use crate::response::Response;
use crate::scheduler::summary::{ModuleCounterSummary, PoolStats, Summary};

const WORKER_IDLE_POLL: Duration = Duration::from_millis(20);

struct Pools {
    request: Arc<BufferPool<Request>>,
    response: Arc<BufferPool<Response>>,
    item: Arc<BufferPool<Item>>,
    error: Arc<BufferPool<CrawlError>>,
}

/// Admission rules captured at `init` time, shared into the worker loops
/// (spec.md §4.6). Rebuilt wholesale on every `init`.
struct Admission {
    domain_filter: DomainFilter,
    max_depth: u32,
    dedup: UrlDedup,
}

impl Admission {
    fn admit(&self, request: &Request) -> bool {
        let Some(scheme) = request.uri().scheme_str() else {
            return false;
        };
        if scheme != "http" && scheme != "https" {
            return false;
        }
        let Some(host) = request.uri().host() else {
            return false;
        };
        if request.depth() > self.max_depth {
            return false;
        }
        if !self.domain_filter.accepts_domain(host) {
            return false;
        }
        self.dedup.insert(request.uri().to_string())
    }
}

struct RunState {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

fn pool_stats<T>(pool: &BufferPool<T>) -> PoolStats {
    PoolStats {
        buffer_capacity: pool.buffer_capacity(),
        live_buffer_count: pool.live_buffer_count(),
        len: pool.len(),
    }
}

/// Owns everything spec.md §3 calls out under "Lifecycle ownership": the
/// four pools, the registry, and the URL/domain sets. Modules themselves
/// are shared `Arc`s registered into [`Registry`]; their state is mutated
/// only through their own atomic counters.
pub struct Scheduler {
    fsm: LifecycleFsm,
    registry: Arc<Registry>,
    admission: Arc<RwLock<Option<Admission>>>,
    request_args: RwLock<Option<RequestArgs>>,
    module_args_summary: RwLock<Option<ModuleArgsSummary>>,
    pools: RwLock<Option<Pools>>,
    run: RwLock<Option<RunState>>,
    error_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<CrawlError>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            fsm: LifecycleFsm::new(),
            registry: Arc::new(Registry::new()),
            admission: Arc::new(RwLock::new(None)),
            request_args: RwLock::new(None),
            module_args_summary: RwLock::new(None),
            pools: RwLock::new(None),
            run: RwLock::new(None),
            error_rx: parking_lot::Mutex::new(None),
        }
    }

    pub fn status(&self) -> State {
        self.fsm.state()
    }

    /// Validates arguments, (re)builds the registry/domain filter/pools,
    /// and registers every supplied module (spec.md §6 `init`).
    pub fn init(
        &self,
        request_args: RequestArgs,
        data_args: DataArgs,
        module_args: ModuleArgs,
    ) -> CrawlResult<()> {
        let prior = self.fsm.begin(Transition::Init)?;

        if let Err(err) = self.try_init(request_args, data_args, module_args) {
            self.fsm.rollback(prior);
            return Err(err);
        }
        self.fsm.commit(Transition::Init);
        Ok(())
    }

    fn try_init(
        &self,
        request_args: RequestArgs,
        data_args: DataArgs,
        module_args: ModuleArgs,
    ) -> CrawlResult<()> {
        request_args.check()?;
        data_args.check()?;
        module_args.check()?;

        self.registry.clear();
        for fetcher in &module_args.fetchers {
            self.registry.register(ModuleHandle::Fetcher(fetcher.clone()))?;
        }
        for analyzer in &module_args.analyzers {
            self.registry.register(ModuleHandle::Analyzer(analyzer.clone()))?;
        }
        for processor in &module_args.processors {
            self.registry.register(ModuleHandle::Processor(processor.clone()))?;
        }

        *self.admission.write() = Some(Admission {
            domain_filter: DomainFilter::new(request_args.accepted_domains.clone()),
            max_depth: request_args.max_depth,
            dedup: UrlDedup::new(),
        });

        *self.pools.write() = Some(Pools {
            request: Arc::new(BufferPool::new(
                1,
                data_args.req_buffer_cap as usize,
                data_args.req_max_buffer_number as usize,
            )),
            response: Arc::new(BufferPool::new(
                1,
                data_args.resp_buffer_cap as usize,
                data_args.resp_max_buffer_number as usize,
            )),
            item: Arc::new(BufferPool::new(
                1,
                data_args.item_buffer_cap as usize,
                data_args.item_max_buffer_number as usize,
            )),
            error: Arc::new(BufferPool::new(
                1,
                data_args.error_buffer_cap as usize,
                data_args.error_max_buffer_number as usize,
            )),
        });

        *self.module_args_summary.write() = Some(module_args.summary());
        *self.request_args.write() = Some(request_args);
        Ok(())
    }

    /// Admits `seed` and launches the fetch/analyze/pick worker loops
    /// (spec.md §6 `start`, §4.7).
    pub async fn start(&self, seed: Request) -> CrawlResult<()> {
        let prior = self.fsm.begin(Transition::Start)?;

        match self.try_start(seed).await {
            Ok(()) => {
                self.fsm.commit(Transition::Start);
                Ok(())
            }
            Err(err) => {
                self.fsm.rollback(prior);
                Err(err)
            }
        }
    }

    async fn try_start(&self, seed: Request) -> CrawlResult<()> {
        let pools = self.cloned_pools()?;
        if self.admission.read().is_none() {
            return Err(CrawlError::SchedulerError("scheduler not initialized".into()));
        }

        // Resolve the seed before spawning anything: if the request pool
        // turns out to be closed, bail out here with no loops running and
        // no `RunState` recorded, so the FSM rollback below leaves nothing
        // live to tear down.
        let admitted = self
            .admission
            .read()
            .as_ref()
            .map(|admission| admission.admit(&seed))
            .unwrap_or(false);
        if !admitted {
            warn!(uri = %seed.uri(), "seed request rejected by admission pipeline");
        } else if pools.request.put(seed).is_err() {
            return Err(CrawlError::SchedulerError(
                "request pool closed immediately after start".into(),
            ));
        }

        let (error_tx, error_rx) = mpsc::unbounded_channel();
        *self.error_rx.lock() = Some(error_rx);

        let cancel = CancellationToken::new();
        let handles = vec![
            tokio::spawn(fetch_loop(
                pools.request.clone(),
                pools.response.clone(),
                pools.error.clone(),
                self.registry.clone(),
                cancel.clone(),
            )),
            tokio::spawn(analyze_loop(
                pools.response.clone(),
                pools.request.clone(),
                pools.item.clone(),
                pools.error.clone(),
                self.registry.clone(),
                self.admission.clone(),
                cancel.clone(),
            )),
            tokio::spawn(pick_loop(
                pools.item.clone(),
                pools.error.clone(),
                self.registry.clone(),
                cancel.clone(),
            )),
            tokio::spawn(forward_errors(pools.error.clone(), error_tx, cancel.clone())),
        ];

        *self.run.write() = Some(RunState { cancel, handles });
        Ok(())
    }

    /// Cancels the worker loops, closes all four pools, and waits for
    /// every loop to terminate (spec.md §6 `stop`, §5 "cancellation
    /// semantics", §8 invariant 7).
    pub async fn stop(&self) -> CrawlResult<()> {
        self.fsm.begin(Transition::Stop)?;

        let run = self.run.write().take();
        if let Some(pools) = self.pools.read().as_ref() {
            pools.request.close();
            pools.response.close();
            pools.item.close();
            pools.error.close();
        }

        if let Some(run) = run {
            run.cancel.cancel();
            for handle in run.handles {
                let _ = handle.await;
            }
        }

        self.fsm.commit(Transition::Stop);
        Ok(())
    }

    /// Takes the error channel's receiving half. Returns `None` if already
    /// taken or if `start` has not been called yet (spec.md §6
    /// `errorChannel`).
    pub fn error_channel(&self) -> Option<mpsc::UnboundedReceiver<CrawlError>> {
        self.error_rx.lock().take()
    }

    /// True iff no registered module is mid-request and the request/
    /// response/item pools are all empty; the error pool is excluded
    /// (spec.md §5 "Idle detection").
    pub fn idle(&self) -> bool {
        let no_module_busy = self
            .registry
            .get_all()
            .iter()
            .all(|module| module.counters().handling_now() == 0);
        if !no_module_busy {
            return false;
        }
        match self.pools.read().as_ref() {
            Some(pools) => {
                pools.request.is_empty() && pools.response.is_empty() && pools.item.is_empty()
            }
            None => true,
        }
    }

    pub fn summary(&self) -> Summary {
        let request_args = self.request_args.read().clone();
        let pools = self.pools.read();
        let modules = self
            .registry
            .get_all()
            .iter()
            .map(|module| ModuleCounterSummary::new(module.id(), module.counts(), module.score()))
            .collect();
        let total_urls_seen = self
            .admission
            .read()
            .as_ref()
            .map(|admission| admission.dedup.len())
            .unwrap_or(0);

        Summary {
            state: Summary::state_name(self.status()),
            max_depth: request_args.as_ref().map(|a| a.max_depth).unwrap_or(0),
            accepted_domains: request_args
                .as_ref()
                .map(|a| a.accepted_domains.clone())
                .unwrap_or_default(),
            module_args: *self.module_args_summary.read(),
            request_pool: pools.as_ref().map(|p| pool_stats(&p.request)),
            response_pool: pools.as_ref().map(|p| pool_stats(&p.response)),
            item_pool: pools.as_ref().map(|p| pool_stats(&p.item)),
            error_pool: pools.as_ref().map(|p| pool_stats(&p.error)),
            modules,
            total_urls_seen,
        }
    }

    fn cloned_pools(&self) -> CrawlResult<Pools> {
        let guard = self.pools.read();
        let pools = guard
            .as_ref()
            .ok_or_else(|| CrawlError::SchedulerError("scheduler not initialized".into()))?;
        Ok(Pools {
            request: pools.request.clone(),
            response: pools.response.clone(),
            item: pools.item.clone(),
            error: pools.error.clone(),
        })
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

/// `registry.get(FETCHER)`, `fetcher.fetch(request)`, then routes the
/// response or tags-and-forwards the error (spec.md §4.7 `fetchLoop`). A
/// missing fetcher both reports an error and re-enqueues the request.
async fn fetch_loop(
    request_pool: Arc<BufferPool<Request>>,
    response_pool: Arc<BufferPool<Response>>,
    error_pool: Arc<BufferPool<CrawlError>>,
    registry: Arc<Registry>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let request = match request_pool.get() {
            Ok(Some(request)) => request,
            Ok(None) => {
                if wait_or_cancelled(&cancel).await {
                    break;
                }
                continue;
            }
            Err(_) => break,
        };

        match registry.get(ModuleKind::Fetcher) {
            Ok(handle) => {
                let fetcher = handle
                    .as_fetcher()
                    .expect("registry kind map only holds Fetcher handles under ModuleKind::Fetcher")
                    .clone();
                match fetcher.fetch(&request).await {
                    Ok(response) => {
                        if response_pool.put(response).is_err() {
                            debug!("dropped fetched response: response pool closed");
                        }
                    }
                    Err(err) => {
                        let tagged = CrawlError::from_module(handle.kind(), handle.id().clone(), err.to_string());
                        if error_pool.put(tagged).is_err() {
                            debug!("dropped fetch error: error pool closed");
                        }
                    }
                }
            }
            Err(err) => {
                let _ = error_pool.put(err);
                if request_pool.put(request).is_err() {
                    debug!("dropped re-enqueued request: request pool closed");
                }
            }
        }
    }
    debug!("fetch loop terminated");
}

/// `registry.get(ANALYZER)`, `analyzer.analyze(response)`, then dispatches
/// each datum — requests re-enter admission, items enter the item pool
/// (spec.md §4.7 `analyzeLoop`).
async fn analyze_loop(
    response_pool: Arc<BufferPool<Response>>,
    request_pool: Arc<BufferPool<Request>>,
    item_pool: Arc<BufferPool<Item>>,
    error_pool: Arc<BufferPool<CrawlError>>,
    registry: Arc<Registry>,
    admission: Arc<RwLock<Option<Admission>>>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let response = match response_pool.get() {
            Ok(Some(response)) => response,
            Ok(None) => {
                if wait_or_cancelled(&cancel).await {
                    break;
                }
                continue;
            }
            Err(_) => break,
        };

        match registry.get(ModuleKind::Analyzer) {
            Ok(handle) => {
                let analyzer = handle
                    .as_analyzer()
                    .expect("registry kind map only holds Analyzer handles under ModuleKind::Analyzer")
                    .clone();
                let (data, errors) = analyzer.analyze(&response).await;
                for datum in data {
                    match datum {
                        Data::Request(derived) => {
                            let admitted = admission
                                .read()
                                .as_ref()
                                .map(|a| a.admit(&derived))
                                .unwrap_or(false);
                            if admitted && request_pool.put(derived).is_err() {
                                debug!("dropped derived request: request pool closed");
                            }
                        }
                        Data::Item(item) => {
                            if item_pool.put(item).is_err() {
                                debug!("dropped analyzed item: item pool closed");
                            }
                        }
                    }
                }
                for err in errors {
                    let tagged = CrawlError::from_module(handle.kind(), handle.id().clone(), err.to_string());
                    let _ = error_pool.put(tagged);
                }
            }
            Err(err) => {
                let _ = error_pool.put(err);
                if response_pool.put(response).is_err() {
                    debug!("dropped re-enqueued response: response pool closed");
                }
            }
        }
    }
    debug!("analyze loop terminated");
}

/// `registry.get(PROCESSOR)`, `processor.send(item)`, forwarding any
/// errors it reports (spec.md §4.7 `pickLoop`).
async fn pick_loop(
    item_pool: Arc<BufferPool<Item>>,
    error_pool: Arc<BufferPool<CrawlError>>,
    registry: Arc<Registry>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let item = match item_pool.get() {
            Ok(Some(item)) => item,
            Ok(None) => {
                if wait_or_cancelled(&cancel).await {
                    break;
                }
                continue;
            }
            Err(_) => break,
        };

        match registry.get(ModuleKind::Processor) {
            Ok(handle) => {
                let processor = handle
                    .as_processor()
                    .expect("registry kind map only holds Processor handles under ModuleKind::Processor")
                    .clone();
                for err in processor.send(item).await {
                    let tagged = CrawlError::from_module(handle.kind(), handle.id().clone(), err.to_string());
                    let _ = error_pool.put(tagged);
                }
            }
            Err(err) => {
                let _ = error_pool.put(err);
                if item_pool.put(item).is_err() {
                    debug!("dropped re-enqueued item: item pool closed");
                }
            }
        }
    }
    debug!("pick loop terminated");
}

async fn forward_errors(
    error_pool: Arc<BufferPool<CrawlError>>,
    sink: mpsc::UnboundedSender<CrawlError>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        match error_pool.get() {
            Ok(Some(err)) => {
                if sink.send(err).is_err() {
                    break;
                }
            }
            Ok(None) => {
                if wait_or_cancelled(&cancel).await {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

/// Waits out one idle-poll tick, but wakes immediately on cancellation.
/// Returns `true` if cancellation fired during the wait.
async fn wait_or_cancelled(cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(WORKER_IDLE_POLL) => false,
    }
}
