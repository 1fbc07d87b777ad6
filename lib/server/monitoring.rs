use crate::build_info;
use crate::poller::{Operation, OperationOutcome};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::{counter::Counter, gauge::Gauge};
use prometheus_client::registry::Registry;

pub const METRICS_PREFIX: &str = "poller";

/// Registers immutable build metadata as a labeled gauge with value `1`.
pub fn register_build_info_metric(registry: &mut Registry, prefix: &str) {
    let build_info_metric = Family::<BuildInfoLabels, Gauge>::default();
    build_info_metric
        .get_or_create(&BuildInfoLabels {
            service: "hot_calls_poller",
            version: build_info::VERSION,
            commit: build_info::short_commit_hash(),
        })
        .set(1);
    let sub_registry = registry.sub_registry_with_prefix(prefix);
    sub_registry.register(
        "build_info",
        "Build identity labels for this process",
        build_info_metric,
    );
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct BuildInfoLabels {
    service: &'static str,
    version: &'static str,
    commit: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationLabels {
    pub operation: &'static str,
}

#[derive(Clone, Default)]
pub struct PollerMetrics {
    /// Cycles started by the scheduler.
    pub cycles_total: Counter,
    /// Timer firings skipped because a cycle was still running.
    pub cycles_skipped_total: Counter,
    pub operation_failures_total: Family<OperationLabels, Counter>,
    pub rows_affected_total: Family<OperationLabels, Counter>,
    /// Failed operations in the most recent cycle.
    pub last_cycle_failures: Gauge,
}

impl PollerMetrics {
    pub fn register(registry: &mut Registry, prefix: &str) -> Self {
        let metrics = Self::default();
        let sub_registry = registry.sub_registry_with_prefix(prefix);

        sub_registry.register(
            "cycles",
            "Total number of pipeline cycles started",
            metrics.cycles_total.clone(),
        );
        sub_registry.register(
            "cycles_skipped",
            "Timer firings skipped while a cycle was in progress",
            metrics.cycles_skipped_total.clone(),
        );
        sub_registry.register(
            "operation_failures",
            "Failed pipeline operations by operation",
            metrics.operation_failures_total.clone(),
        );
        sub_registry.register(
            "rows_affected",
            "Rows affected by pipeline operations",
            metrics.rows_affected_total.clone(),
        );
        sub_registry.register(
            "last_cycle_failures",
            "Failed operations in the most recent cycle",
            metrics.last_cycle_failures.clone(),
        );

        metrics
    }

    pub fn record_operation(&self, op: Operation, outcome: &OperationOutcome) {
        let labels = OperationLabels {
            operation: op.name(),
        };
        match outcome {
            OperationOutcome::Completed { rows } => {
                self.rows_affected_total
                    .get_or_create(&labels)
                    .inc_by(*rows as u64);
            }
            OperationOutcome::Failed { .. } => {
                self.operation_failures_total.get_or_create(&labels).inc();
            }
        }
    }
}
