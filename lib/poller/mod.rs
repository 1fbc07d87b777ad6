pub mod collector;
pub mod comments;
pub mod error;
pub mod merger;
pub mod purger;
pub mod retention;
pub mod windows;

use chrono::NaiveDateTime;
use log::{debug, info};
use std::sync::Arc;

use crate::db::CallStore;
use crate::reporter::{Channel, ErrorReporter};
use crate::server::monitoring::PollerMetrics;
pub use error::Error;
pub use windows::Windows;

/// The eleven steps of a cycle, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CollectCalls,
    CollectComments,
    CollectCounts,
    MergeCalls,
    MergeComments,
    MergeCounts,
    PurgeCalls,
    PurgeComments,
    PurgeCounts,
    DeleteResolved,
    DeleteExpired,
}

impl Operation {
    pub const CYCLE: [Operation; 11] = [
        Operation::CollectCalls,
        Operation::CollectComments,
        Operation::CollectCounts,
        Operation::MergeCalls,
        Operation::MergeComments,
        Operation::MergeCounts,
        Operation::PurgeCalls,
        Operation::PurgeComments,
        Operation::PurgeCounts,
        Operation::DeleteResolved,
        Operation::DeleteExpired,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::CollectCalls => "collect_calls",
            Operation::CollectComments => "collect_comments",
            Operation::CollectCounts => "collect_counts",
            Operation::MergeCalls => "merge_calls",
            Operation::MergeComments => "merge_comments",
            Operation::MergeCounts => "merge_counts",
            Operation::PurgeCalls => "purge_calls",
            Operation::PurgeComments => "purge_comments",
            Operation::PurgeCounts => "purge_counts",
            Operation::DeleteResolved => "delete_resolved",
            Operation::DeleteExpired => "delete_expired",
        }
    }
}

/// What one operation did during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Completed { rows: usize },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub started_at: NaiveDateTime,
    pub outcomes: Vec<(Operation, OperationOutcome)>,
}

impl CycleReport {
    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, OperationOutcome::Failed { .. }))
            .count()
    }

    pub fn outcome(&self, op: Operation) -> Option<&OperationOutcome> {
        self.outcomes
            .iter()
            .find(|(candidate, _)| *candidate == op)
            .map(|(_, outcome)| outcome)
    }
}

/// Runs collect, merge, purge and retire against one store.
///
/// Each operation is isolated: its failure is reported and the next
/// operation runs regardless.
pub struct Pipeline {
    store: Arc<dyn CallStore>,
    reporter: Arc<ErrorReporter>,
    windows: Windows,
    metrics: Option<PollerMetrics>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn CallStore>, reporter: Arc<ErrorReporter>, windows: Windows) -> Self {
        Self {
            store,
            reporter,
            windows,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: PollerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn reporter(&self) -> &Arc<ErrorReporter> {
        &self.reporter
    }

    pub fn metrics(&self) -> Option<&PollerMetrics> {
        self.metrics.as_ref()
    }

    /// Runs every operation once, in order, with cutoffs taken from `now`.
    pub async fn run_cycle(&self, now: NaiveDateTime) -> CycleReport {
        let mut outcomes = Vec::with_capacity(Operation::CYCLE.len());
        for op in Operation::CYCLE {
            let outcome = match self.run_operation(op, now).await {
                Ok(rows) => {
                    debug!("{} affected {} rows", op.name(), rows);
                    OperationOutcome::Completed { rows }
                }
                Err(err) => {
                    let channel = if err.is_database() {
                        Channel::Database
                    } else {
                        Channel::Pipeline
                    };
                    self.reporter.report(channel, &err).await;
                    OperationOutcome::Failed {
                        message: err.to_string(),
                    }
                }
            };
            if let Some(metrics) = &self.metrics {
                metrics.record_operation(op, &outcome);
            }
            outcomes.push((op, outcome));
        }

        let report = CycleReport {
            started_at: now,
            outcomes,
        };
        info!(
            "Cycle finished with {} of {} operations failed",
            report.failures(),
            Operation::CYCLE.len()
        );
        report
    }

    pub async fn run_operation(&self, op: Operation, now: NaiveDateTime) -> Result<usize, Error> {
        let store = self.store.as_ref();
        match op {
            Operation::CollectCalls => collector::collect_calls(store, now, &self.windows).await,
            Operation::CollectComments => {
                collector::collect_comments(store, now, &self.windows).await
            }
            Operation::CollectCounts => collector::collect_counts(store, now, &self.windows).await,
            Operation::MergeCalls => merger::merge_calls(store).await,
            Operation::MergeComments => merger::merge_comments(store).await,
            Operation::MergeCounts => merger::merge_counts(store).await,
            Operation::PurgeCalls => purger::purge_calls(store).await,
            Operation::PurgeComments => purger::purge_comments(store).await,
            Operation::PurgeCounts => purger::purge_counts(store).await,
            Operation::DeleteResolved => retention::delete_resolved(store).await,
            Operation::DeleteExpired => retention::delete_expired(store, now, &self.windows).await,
        }
    }
}
