use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, warn};

use crate::errors::EngineError;

/// Process engine counters
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub instances_started: AtomicU64,
    pub actions_handled: AtomicU64,
    pub denials: AtomicU64,
    pub audit_entries: AtomicU64,
    pub gateway_hops: AtomicU64,
    failures: Mutex<BTreeMap<&'static str, u64>>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_start(&self, entries: usize, gateway_hops: usize) {
        self.instances_started.fetch_add(1, Ordering::Relaxed);
        self.record_entries(entries, gateway_hops);
    }

    pub fn record_handle(&self, entries: usize, gateway_hops: usize) {
        self.actions_handled.fetch_add(1, Ordering::Relaxed);
        self.record_entries(entries, gateway_hops);
    }

    pub fn record_deny(&self, entries: usize) {
        self.denials.fetch_add(1, Ordering::Relaxed);
        self.record_entries(entries, 0);
    }

    fn record_entries(&self, entries: usize, gateway_hops: usize) {
        self.audit_entries
            .fetch_add(entries as u64, Ordering::Relaxed);
        self.gateway_hops
            .fetch_add(gateway_hops as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, error: &EngineError) {
        if let Ok(mut failures) = self.failures.lock() {
            *failures.entry(error.kind()).or_insert(0) += 1;
        }
        warn!(kind = error.kind(), "Process engine operation failed");
    }

    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            instances_started: self.instances_started.load(Ordering::Relaxed),
            actions_handled: self.actions_handled.load(Ordering::Relaxed),
            denials: self.denials.load(Ordering::Relaxed),
            audit_entries: self.audit_entries.load(Ordering::Relaxed),
            gateway_hops: self.gateway_hops.load(Ordering::Relaxed),
            failures: self
                .failures
                .lock()
                .map(|failures| failures.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub instances_started: u64,
    pub actions_handled: u64,
    pub denials: u64,
    pub audit_entries: u64,
    pub gateway_hops: u64,
    pub failures: BTreeMap<&'static str, u64>,
}

impl EngineStats {
    pub fn total_failures(&self) -> u64 {
        self.failures.values().sum()
    }
}

/// Global metrics instance
static ENGINE_METRICS: std::sync::LazyLock<EngineMetrics> =
    std::sync::LazyLock::new(EngineMetrics::new);

pub fn engine_metrics() -> &'static EngineMetrics {
    &ENGINE_METRICS
}

/// Time an operation and log its duration
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}

#[macro_export]
macro_rules! time_operation {
    ($operation:expr, $body:expr) => {{
        let timer = $crate::observability::OperationTimer::new($operation);
        let result = $body;
        timer.finish();
        result
    }};
}
