// Coordination metrics
//
// Purpose: make lock traffic and lifecycle health measurable.
// Invariant: suspensions, callback re-entries, lock contention, and
// allocation rollbacks are all counted.
//
// Counters and gauges are hand-rolled atomics; the Prometheus exposition
// is plain text built with format!.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Counter metric (monotonically increasing)
#[derive(Debug)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

/// Gauge metric (can go up or down)
#[derive(Debug)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

/// Every metric the coordination layer tracks.
#[derive(Debug, Default)]
pub struct CoordMetrics {
    /// Blocking-call brackets entered
    pub contexts_suspended: Counter,
    /// Blocking-call brackets completed
    pub contexts_resumed: Counter,
    /// Brackets currently open
    pub active_suspended: Gauge,
    /// Execution lock acquisitions
    pub execution_lock_acquisitions: Counter,
    /// Execution lock acquisitions that had to wait
    pub execution_lock_contentions: Counter,
    /// Callback guards that resolved a context and took the lock
    pub callback_guards: Counter,
    /// Callback entries outside any blocking operation
    pub callback_guards_denied: Counter,
    /// Share category lock acquisitions
    pub share_lock_acquisitions: Counter,
    /// Share category acquisitions that had to wait
    pub share_lock_contentions: Counter,
    /// Crypto lock acquisitions (table or call-site)
    pub crypto_lock_acquisitions: Counter,
    /// Crypto tables installed over the process lifetime
    pub crypto_tables_installed: Counter,
    /// Live call-site mutexes created through the callback table
    pub active_call_site_locks: Gauge,
    /// Lock-structure allocation failures (each one fully rolled back)
    pub allocation_failures: Counter,
}

/// Point-in-time copy of every metric, for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub contexts_suspended: u64,
    pub contexts_resumed: u64,
    pub active_suspended: u64,
    pub execution_lock_acquisitions: u64,
    pub execution_lock_contentions: u64,
    pub callback_guards: u64,
    pub callback_guards_denied: u64,
    pub share_lock_acquisitions: u64,
    pub share_lock_contentions: u64,
    pub crypto_lock_acquisitions: u64,
    pub crypto_tables_installed: u64,
    pub active_call_site_locks: u64,
    pub allocation_failures: u64,
}

impl CoordMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            contexts_suspended: self.contexts_suspended.get(),
            contexts_resumed: self.contexts_resumed.get(),
            active_suspended: self.active_suspended.get(),
            execution_lock_acquisitions: self.execution_lock_acquisitions.get(),
            execution_lock_contentions: self.execution_lock_contentions.get(),
            callback_guards: self.callback_guards.get(),
            callback_guards_denied: self.callback_guards_denied.get(),
            share_lock_acquisitions: self.share_lock_acquisitions.get(),
            share_lock_contentions: self.share_lock_contentions.get(),
            crypto_lock_acquisitions: self.crypto_lock_acquisitions.get(),
            crypto_tables_installed: self.crypto_tables_installed.get(),
            active_call_site_locks: self.active_call_site_locks.get(),
            allocation_failures: self.allocation_failures.get(),
        }
    }

    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP gilbridge_contexts_total Blocking-call brackets by phase\n");
        output.push_str("# TYPE gilbridge_contexts_total counter\n");
        output.push_str(&format!(
            "gilbridge_contexts_total{{phase=\"suspended\"}} {}\n",
            self.contexts_suspended.get()
        ));
        output.push_str(&format!(
            "gilbridge_contexts_total{{phase=\"resumed\"}} {}\n",
            self.contexts_resumed.get()
        ));

        output.push_str("# HELP gilbridge_active_suspended Blocking-call brackets currently open\n");
        output.push_str("# TYPE gilbridge_active_suspended gauge\n");
        output.push_str(&format!(
            "gilbridge_active_suspended {}\n",
            self.active_suspended.get()
        ));

        output.push_str("# HELP gilbridge_execution_lock_total Execution lock acquisitions\n");
        output.push_str("# TYPE gilbridge_execution_lock_total counter\n");
        output.push_str(&format!(
            "gilbridge_execution_lock_total{{outcome=\"acquired\"}} {}\n",
            self.execution_lock_acquisitions.get()
        ));
        output.push_str(&format!(
            "gilbridge_execution_lock_total{{outcome=\"contended\"}} {}\n",
            self.execution_lock_contentions.get()
        ));

        output.push_str("# HELP gilbridge_callback_guards_total Callback re-entries by outcome\n");
        output.push_str("# TYPE gilbridge_callback_guards_total counter\n");
        output.push_str(&format!(
            "gilbridge_callback_guards_total{{outcome=\"acquired\"}} {}\n",
            self.callback_guards.get()
        ));
        output.push_str(&format!(
            "gilbridge_callback_guards_total{{outcome=\"denied\"}} {}\n",
            self.callback_guards_denied.get()
        ));

        output.push_str("# HELP gilbridge_share_locks_total Share category lock traffic\n");
        output.push_str("# TYPE gilbridge_share_locks_total counter\n");
        output.push_str(&format!(
            "gilbridge_share_locks_total{{outcome=\"acquired\"}} {}\n",
            self.share_lock_acquisitions.get()
        ));
        output.push_str(&format!(
            "gilbridge_share_locks_total{{outcome=\"contended\"}} {}\n",
            self.share_lock_contentions.get()
        ));

        output.push_str("# HELP gilbridge_crypto_locks_total Crypto lock acquisitions\n");
        output.push_str("# TYPE gilbridge_crypto_locks_total counter\n");
        output.push_str(&format!(
            "gilbridge_crypto_locks_total {}\n",
            self.crypto_lock_acquisitions.get()
        ));

        output.push_str("# HELP gilbridge_crypto_tables_installed_total Crypto tables installed\n");
        output.push_str("# TYPE gilbridge_crypto_tables_installed_total counter\n");
        output.push_str(&format!(
            "gilbridge_crypto_tables_installed_total {}\n",
            self.crypto_tables_installed.get()
        ));

        output.push_str("# HELP gilbridge_active_call_site_locks Live call-site crypto mutexes\n");
        output.push_str("# TYPE gilbridge_active_call_site_locks gauge\n");
        output.push_str(&format!(
            "gilbridge_active_call_site_locks {}\n",
            self.active_call_site_locks.get()
        ));

        output.push_str("# HELP gilbridge_allocation_failures_total Rolled-back lock allocations\n");
        output.push_str("# TYPE gilbridge_allocation_failures_total counter\n");
        output.push_str(&format!(
            "gilbridge_allocation_failures_total {}\n",
            self.allocation_failures.get()
        ));

        output
    }
}

static METRICS: OnceLock<CoordMetrics> = OnceLock::new();

/// The process-wide metrics registry.
pub fn metrics() -> &'static CoordMetrics {
    METRICS.get_or_init(CoordMetrics::new)
}
