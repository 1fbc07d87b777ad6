use chrono::Local;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::poller::{CycleReport, Error, Pipeline};
use crate::reporter::Channel;

/// Console timestamps around each cycle.
pub const CONSOLE_TIME_FORMAT: &str = "%H:%M:%S";

/// Flag shared between the timer and the running cycle.
#[derive(Clone, Default)]
pub struct CycleGuard {
    running: Arc<AtomicBool>,
}

impl CycleGuard {
    /// Returns a permit unless a cycle already holds one.
    pub fn try_acquire(&self) -> Option<CyclePermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CyclePermit {
                running: self.running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Marks a cycle in progress until dropped, including on panic.
pub struct CyclePermit {
    running: Arc<AtomicBool>,
}

impl Drop for CyclePermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Fires one pipeline cycle per interval until shutdown.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    period: Duration,
    guard: CycleGuard,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, period: Duration) -> Self {
        Self {
            pipeline,
            period,
            guard: CycleGuard::default(),
        }
    }

    pub fn guard(&self) -> &CycleGuard {
        &self.guard
    }

    /// Runs a single cycle immediately, outside the timer.
    pub async fn run_once(&self) -> Option<CycleReport> {
        let permit = self.guard.try_acquire()?;
        Some(run_guarded_cycle(self.pipeline.clone(), permit).await)
    }

    /// Ticks every `period`, starting one period from now. A firing that
    /// lands while a cycle is still running is skipped. A cycle task is
    /// collected as soon as it ends, so a panic is reported right away. On
    /// shutdown the in-flight cycle, if any, runs to completion before this
    /// returns.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<JoinHandle<CycleReport>> = None;

        info!("Scheduler started with a {:?} interval", self.period);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(joined) = join_in_flight(&mut in_flight) => {
                    in_flight = None;
                    self.report_join(joined).await;
                }
                _ = ticker.tick() => {
                    let Some(permit) = self.guard.try_acquire() else {
                        warn!("Previous cycle still running, skipping this firing");
                        if let Some(metrics) = self.pipeline.metrics() {
                            metrics.cycles_skipped_total.inc();
                        }
                        continue;
                    };
                    if let Some(previous) = in_flight.take() {
                        self.settle(previous).await;
                    }
                    in_flight = Some(tokio::spawn(run_guarded_cycle(
                        self.pipeline.clone(),
                        permit,
                    )));
                }
            }
        }

        if let Some(handle) = in_flight {
            info!("Shutdown requested, waiting for the running cycle to finish");
            self.settle(handle).await;
        }
        info!("Scheduler stopped");
    }

    /// Collects a finished cycle task, reporting it if it panicked.
    async fn settle(&self, handle: JoinHandle<CycleReport>) {
        self.report_join(handle.await).await;
    }

    async fn report_join(&self, joined: Result<CycleReport, JoinError>) {
        if let Err(join_err) = joined {
            let err = Error::from(join_err);
            self.pipeline
                .reporter()
                .report(Channel::Pipeline, &err)
                .await;
        }
    }
}

/// Resolves when the in-flight cycle task ends; `None` when there is none.
async fn join_in_flight(
    in_flight: &mut Option<JoinHandle<CycleReport>>,
) -> Option<Result<CycleReport, JoinError>> {
    match in_flight {
        Some(handle) => Some(handle.await),
        None => None,
    }
}

async fn run_guarded_cycle(pipeline: Arc<Pipeline>, permit: CyclePermit) -> CycleReport {
    let _permit = permit;
    let started = Local::now();
    println!("Poller entering at {}", started.format(CONSOLE_TIME_FORMAT));
    if let Some(metrics) = pipeline.metrics() {
        metrics.cycles_total.inc();
    }

    let report = pipeline.run_cycle(started.naive_local()).await;

    if let Some(metrics) = pipeline.metrics() {
        metrics.last_cycle_failures.set(report.failures() as i64);
    }
    println!("Poller exiting at {}", Local::now().format(CONSOLE_TIME_FORMAT));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{CommentLine, StagedComment};
    use crate::db::{CallStore, DbError, Dialect};
    use crate::poller::Windows;
    use crate::reporter::test_support::RecordingNotifier;
    use crate::reporter::{ErrorLog, ErrorReporter, LogOnlyNotifier};
    use crate::server::monitoring::PollerMetrics;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Store whose statements take a fixed amount of (virtual) time.
    struct SlowStore {
        delay: Duration,
        executed: AtomicUsize,
    }

    #[async_trait]
    impl CallStore for SlowStore {
        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }

        async fn execute(&self, _statement: &str) -> Result<usize, DbError> {
            tokio::time::sleep(self.delay).await;
            self.executed.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }

        async fn load_comment_lines(&self, _statement: &str) -> Result<Vec<CommentLine>, DbError> {
            Ok(Vec::new())
        }

        async fn stage_comments(&self, _rows: &[StagedComment]) -> Result<usize, DbError> {
            Ok(0)
        }
    }

    fn pipeline(store: Arc<SlowStore>, dir: &tempfile::TempDir) -> (Arc<Pipeline>, PollerMetrics) {
        let reporter = Arc::new(ErrorReporter::new(
            Box::new(LogOnlyNotifier),
            ErrorLog::new(dir.path().join("errors.txt")),
        ));
        let metrics = PollerMetrics::default();
        let pipeline = Pipeline::new(store, reporter, Windows::default()).with_metrics(metrics.clone());
        (Arc::new(pipeline), metrics)
    }

    #[test]
    fn guard_allows_one_permit_at_a_time() {
        let guard = CycleGuard::default();
        let permit = guard.try_acquire().expect("first acquire should succeed");
        assert!(guard.is_running());
        assert!(guard.try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_some());
    }

    #[tokio::test]
    async fn run_once_runs_all_statements() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SlowStore {
            delay: Duration::ZERO,
            executed: AtomicUsize::new(0),
        });
        let (pipeline, metrics) = pipeline(store.clone(), &dir);
        let scheduler = Scheduler::new(pipeline, Duration::from_secs(120));

        let report = scheduler.run_once().await.expect("guard should be free");

        assert_eq!(report.failures(), 0);
        // Every operation except comment collection is a single statement.
        assert_eq!(store.executed.load(Ordering::SeqCst), 10);
        assert_eq!(metrics.cycles_total.get(), 1);
        assert!(!scheduler.guard().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_firings_are_skipped_and_shutdown_waits_for_the_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SlowStore {
            delay: Duration::from_millis(35),
            executed: AtomicUsize::new(0),
        });
        let (pipeline, metrics) = pipeline(store.clone(), &dir);
        let scheduler = Scheduler::new(pipeline, Duration::from_millis(100));
        let shutdown = CancellationToken::new();

        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1000)).await;
            canceller.cancel();
        });
        scheduler.run(shutdown).await;

        let cycles = metrics.cycles_total.get();
        assert!(cycles >= 2, "expected at least two cycles, got {cycles}");
        assert!(metrics.cycles_skipped_total.get() >= 1);
        // No cycle was cut short.
        assert_eq!(store.executed.load(Ordering::SeqCst) as u64, cycles * 10);
        assert!(!scheduler.guard().is_running());
    }

    /// Store whose first statement panics.
    struct PanickingStore;

    #[async_trait]
    impl CallStore for PanickingStore {
        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }

        async fn execute(&self, _statement: &str) -> Result<usize, DbError> {
            panic!("driver crashed");
        }

        async fn load_comment_lines(&self, _statement: &str) -> Result<Vec<CommentLine>, DbError> {
            Ok(Vec::new())
        }

        async fn stage_comments(&self, _rows: &[StagedComment]) -> Result<usize, DbError> {
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicked_cycle_is_reported_before_the_next_firing() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = RecordingNotifier::default();
        let reporter = Arc::new(ErrorReporter::new(
            Box::new(notifier.clone()),
            ErrorLog::new(dir.path().join("errors.txt")),
        ));
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(PanickingStore),
            reporter,
            Windows::default(),
        ));
        let scheduler = Arc::new(Scheduler::new(pipeline, Duration::from_millis(1000)));
        let shutdown = CancellationToken::new();

        let running = {
            let scheduler = scheduler.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { scheduler.run(shutdown).await })
        };

        // First firing at 1s; the next would be at 2s.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let alerts = notifier.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].channel, Channel::Pipeline);
        assert!(alerts[0].body.contains("Cycle task failed"));
        assert!(!scheduler.guard().is_running());

        shutdown.cancel();
        running.await.unwrap();
        assert_eq!(notifier.alerts().len(), 1);
    }
}
