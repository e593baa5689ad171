//! Background monitoring for a running [`crate::scheduler::Scheduler`]:
//! idle detection with optional auto-stop, summary-change logging, and
//! error-channel draining (spec.md §9 ambient-stack expansion), grounded
//! on the original's `programs/finder/monitor/monitor.go`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::fsm::State;
use crate::scheduler::Scheduler;

/// Tuning knobs for [`monitor`], each clamped to a sane floor the same way
/// the original clamps `checkInterval`/`summarizeInterval`/`maxIdleCount`
/// so a misconfigured caller can't thrash or prematurely stop the crawl.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    pub check_interval: Duration,
    pub summarize_interval: Duration,
    pub max_idle_count: u32,
    pub auto_stop: bool,
}

impl MonitorConfig {
    const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(100);
    const MIN_SUMMARIZE_INTERVAL: Duration = Duration::from_secs(1);
    const MIN_MAX_IDLE_COUNT: u32 = 10;

    fn clamped(mut self) -> Self {
        if self.check_interval < Self::MIN_CHECK_INTERVAL {
            self.check_interval = Self::MIN_CHECK_INTERVAL;
        }
        if self.summarize_interval < Self::MIN_SUMMARIZE_INTERVAL {
            self.summarize_interval = Self::MIN_SUMMARIZE_INTERVAL;
        }
        if self.max_idle_count < Self::MIN_MAX_IDLE_COUNT {
            self.max_idle_count = Self::MIN_MAX_IDLE_COUNT;
        }
        self
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            check_interval: Duration::from_millis(500),
            summarize_interval: Duration::from_secs(5),
            max_idle_count: 100,
            auto_stop: false,
        }
    }
}

/// The three background tasks [`monitor`] spawns, kept so a caller can
/// await or abort them explicitly instead of only reading the check-count
/// channel.
pub struct MonitorHandle {
    pub check_status: JoinHandle<()>,
    pub record_summary: JoinHandle<()>,
    pub report_errors: JoinHandle<()>,
}

/// Spawns the three monitoring tasks and returns a channel that receives
/// exactly one value — the number of status-check ticks performed — once
/// the status-checking task exits (spec.md §9; mirrors the original's
/// single-value `<-chan uint64` result).
pub fn monitor(scheduler: Arc<Scheduler>, config: MonitorConfig) -> (mpsc::Receiver<u64>, MonitorHandle) {
    let config = config.clamped();
    info!(
        check_interval = ?config.check_interval,
        summarize_interval = ?config.summarize_interval,
        max_idle_count = config.max_idle_count,
        auto_stop = config.auto_stop,
        "starting scheduler monitor"
    );

    let (check_count_tx, check_count_rx) = mpsc::channel(2);

    let report_errors = tokio::spawn(report_errors(scheduler.clone()));
    let record_summary = tokio::spawn(record_summary(scheduler.clone(), config.summarize_interval));
    let check_status = tokio::spawn(check_status(scheduler, config, check_count_tx));

    (
        check_count_rx,
        MonitorHandle {
            check_status,
            record_summary,
            report_errors,
        },
    )
}

/// Polls [`Scheduler::idle`], and once it has stayed idle for
/// `max_idle_count` consecutive ticks, optionally stops the scheduler
/// (spec.md §9; mirrors the original's `checkStatus`).
async fn check_status(scheduler: Arc<Scheduler>, config: MonitorConfig, check_count_tx: mpsc::Sender<u64>) {
    wait_for_scheduler_start(&scheduler).await;

    let mut check_count: u64 = 0;
    let mut idle_count: u32 = 0;
    let mut first_idle_time: Option<Instant> = None;

    loop {
        if scheduler.idle() {
            idle_count += 1;
            if idle_count == 1 {
                first_idle_time = Some(Instant::now());
            }
            if idle_count >= config.max_idle_count {
                let elapsed = first_idle_time.map(|t| t.elapsed()).unwrap_or_default();
                info!(?elapsed, "scheduler has been idle for a while, reconsidering");
                if scheduler.idle() {
                    if config.auto_stop {
                        match scheduler.stop().await {
                            Ok(()) => info!("auto-stopped idle scheduler"),
                            Err(err) => warn!(%err, "failed to auto-stop idle scheduler"),
                        }
                    }
                    break;
                } else {
                    idle_count = 0;
                }
            }
        } else {
            idle_count = 0;
        }
        check_count += 1;
        tokio::time::sleep(config.check_interval).await;
    }

    let _ = check_count_tx.send(check_count).await;
}

/// Logs a summary snapshot whenever it differs from the previous one,
/// on a fixed interval (spec.md §9; mirrors `recordSummary`, substituting
/// a running-task count for the original's goroutine count since the
/// async runtime has no equivalent of `runtime.NumGoroutine`).
async fn record_summary(scheduler: Arc<Scheduler>, summarize_interval: Duration) {
    wait_for_scheduler_start(&scheduler).await;

    let start = Instant::now();
    let mut previous = None;
    let mut record_count: u64 = 1;

    loop {
        let current = scheduler.summary();
        if previous.as_ref() != Some(&current) {
            match serde_json::to_string_pretty(&current) {
                Ok(json) => info!(record_count, elapsed = ?start.elapsed(), "monitor summary\n{json}"),
                Err(err) => warn!(%err, "failed to serialize scheduler summary"),
            }
            previous = Some(current);
            record_count += 1;
        }
        tokio::time::sleep(summarize_interval).await;
    }
}

/// Drains the scheduler's error channel and logs each error as it arrives
/// (spec.md §9; mirrors `reportError`). Exits once the channel closes.
async fn report_errors(scheduler: Arc<Scheduler>) {
    wait_for_scheduler_start(&scheduler).await;

    let Some(mut errors) = scheduler.error_channel() else {
        warn!("error channel already taken; monitor cannot report errors");
        return;
    };
    while let Some(err) = errors.recv().await {
        warn!(%err, "received an error from the error channel");
    }
}

async fn wait_for_scheduler_start(scheduler: &Scheduler) {
    while scheduler.status() != State::Started {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_clamps_undersized_values() {
        let config = MonitorConfig {
            check_interval: Duration::from_millis(1),
            summarize_interval: Duration::from_millis(1),
            max_idle_count: 0,
            auto_stop: false,
        }
        .clamped();
        assert_eq!(config.check_interval, MonitorConfig::MIN_CHECK_INTERVAL);
        assert_eq!(config.summarize_interval, MonitorConfig::MIN_SUMMARIZE_INTERVAL);
        assert_eq!(config.max_idle_count, MonitorConfig::MIN_MAX_IDLE_COUNT);
    }

    #[test]
    fn config_leaves_already_sane_values_untouched() {
        let config = MonitorConfig {
            check_interval: Duration::from_secs(1),
            summarize_interval: Duration::from_secs(10),
            max_idle_count: 50,
            auto_stop: true,
        };
        let clamped = config.clamped();
        assert_eq!(clamped.check_interval, config.check_interval);
        assert_eq!(clamped.summarize_interval, config.summarize_interval);
        assert_eq!(clamped.max_idle_count, config.max_idle_count);
    }
}
