//! Prometheus counters and latency histograms for bindb table operations
//! (§2 "Metrics", a collaborator of the table runtime per §1).
//!
//! A single process-wide [`prometheus::Registry`] is lazily built the first
//! time a counter or histogram is touched; the out-of-scope HTTP transport
//! (`GET /v1/metrics`) is the only consumer expected to gather it.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static OP_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("bindb_table_ops_total", "Total table operations by table and kind"),
        &["table", "op"],
    )
    .expect("bindb_table_ops_total has a valid metric name");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("bindb_table_ops_total registers exactly once");
    counter
});

static OP_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("bindb_table_op_errors_total", "Failed table operations by table, kind and error kind"),
        &["table", "op", "kind"],
    )
    .expect("bindb_table_op_errors_total has a valid metric name");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("bindb_table_op_errors_total registers exactly once");
    counter
});

static OP_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new("bindb_table_op_latency_seconds", "Table operation latency in seconds"),
        &["table", "op"],
    )
    .expect("bindb_table_op_latency_seconds has a valid metric name");
    REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("bindb_table_op_latency_seconds registers exactly once");
    histogram
});

static AUTO_FLUSH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("bindb_write_buffer_auto_flush_total", "Write buffer auto-flushes by table and trigger"),
        &["table", "trigger"],
    )
    .expect("bindb_write_buffer_auto_flush_total has a valid metric name");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("bindb_write_buffer_auto_flush_total registers exactly once");
    counter
});

/// Returns the process-wide registry, for the HTTP transport's `/v1/metrics`
/// exposition endpoint.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Records one successful invocation of `op` on `table`.
pub fn record_op(table: &str, op: &str) {
    OP_TOTAL.with_label_values(&[table, op]).inc();
}

/// Records one failed invocation of `op` on `table`, tagged with the
/// failure's error kind name (e.g. `"STORAGE_ERROR"`).
pub fn record_op_error(table: &str, op: &str, error_kind: &str) {
    OP_ERRORS_TOTAL.with_label_values(&[table, op, error_kind]).inc();
}

/// Records the latency of one invocation of `op` on `table`.
pub fn record_latency(table: &str, op: &str, seconds: f64) {
    OP_LATENCY.with_label_values(&[table, op]).observe(seconds);
}

/// Records one write-buffer auto-flush, tagged by the threshold that tripped
/// it (`"records"` or `"bytes"`).
pub fn record_auto_flush(table: &str, trigger: &str) {
    AUTO_FLUSH_TOTAL.with_label_values(&[table, trigger]).inc();
}

/// RAII guard that records an operation's latency when dropped; construct
/// with [`op_timer`] at the top of an instrumented table operation.
pub struct OpTimer {
    table: String,
    op: &'static str,
    start: std::time::Instant,
}

impl OpTimer {
    pub fn start(table: &str, op: &'static str) -> Self {
        Self {
            table: table.to_owned(),
            op,
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for OpTimer {
    fn drop(&mut self) {
        record_latency(&self.table, self.op, self.start.elapsed().as_secs_f64());
    }
}

pub fn op_timer(table: &str, op: &'static str) -> OpTimer {
    OpTimer::start(table, op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_independently_per_label_set() {
        record_op("users", "get");
        record_op("users", "get");
        record_op("orders", "get");
        let metric = OP_TOTAL.with_label_values(&["users", "get"]).get();
        assert!(metric >= 2);
    }

    #[test]
    fn timer_records_on_drop() {
        {
            let _t = op_timer("users", "insert");
        }
        // no panic, and the histogram has at least one observation
        let m = OP_LATENCY.with_label_values(&["users", "insert"]).get_sample_count();
        assert!(m >= 1);
    }
}
