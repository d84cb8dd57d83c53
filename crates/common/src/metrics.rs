use std::sync::Arc;

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

use crate::ids::QueryId;

/// Per-session metrics registry.
///
/// Cheap to clone; all handles share one underlying prometheus registry.
#[derive(Clone, Debug)]
pub struct MetricsRegistry {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    registry: Registry,
    operator_rows_out: CounterVec,
    operator_batches_out: CounterVec,
    operator_time_seconds: HistogramVec,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::new()),
        }
    }

    /// Record one produced batch for an operator.
    pub fn record_operator(&self, query_id: QueryId, operator: &str, rows_out: u64, secs: f64) {
        let qid = query_id.to_string();
        let labels = [qid.as_str(), operator];
        self.inner
            .operator_rows_out
            .with_label_values(&labels)
            .inc_by(rows_out as f64);
        self.inner
            .operator_batches_out
            .with_label_values(&labels)
            .inc();
        self.inner
            .operator_time_seconds
            .with_label_values(&labels)
            .observe(secs.max(0.0));
    }

    pub fn render_prometheus(&self) -> String {
        let metric_families = self.inner.registry.gather();
        let mut out = Vec::new();
        let enc = TextEncoder::new();
        if enc.encode(&metric_families, &mut out).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&out).to_string()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsInner {
    fn new() -> Self {
        let registry = Registry::new();

        let operator_rows_out = counter_vec(
            &registry,
            "veq_operator_rows_out_total",
            "Output rows produced per operator",
            &["query_id", "operator"],
        );
        let operator_batches_out = counter_vec(
            &registry,
            "veq_operator_batches_out_total",
            "Output batches produced per operator",
            &["query_id", "operator"],
        );
        let operator_time_seconds = histogram_vec(
            &registry,
            "veq_operator_time_seconds",
            "Time spent producing each batch per operator",
            &["query_id", "operator"],
        );

        Self {
            registry,
            operator_rows_out,
            operator_batches_out,
            operator_time_seconds,
        }
    }
}

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let c = CounterVec::new(Opts::new(name, help), labels).expect("counter vec");
    registry
        .register(Box::new(c.clone()))
        .expect("register counter");
    c
}

fn histogram_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> HistogramVec {
    let h = HistogramVec::new(HistogramOpts::new(name, help), labels).expect("histogram vec");
    registry
        .register(Box::new(h.clone()))
        .expect("register histogram");
    h
}

#[cfg(test)]
mod tests {
    use super::MetricsRegistry;
    use crate::ids::QueryId;

    #[test]
    fn renders_prometheus_text() {
        let m = MetricsRegistry::new();
        m.record_operator(QueryId(1), "MemScan", 10, 0.01);
        let text = m.render_prometheus();
        assert!(text.contains("veq_operator_rows_out_total"));
        assert!(text.contains("MemScan"));
    }

    #[test]
    fn renders_all_metric_families() {
        let m = MetricsRegistry::new();
        m.record_operator(QueryId(7), "Projection", 4, 0.002);
        m.record_operator(QueryId(7), "Projection", 4, 0.001);
        let text = m.render_prometheus();

        assert!(text.contains("veq_operator_rows_out_total"));
        assert!(text.contains("veq_operator_batches_out_total"));
        assert!(text.contains("veq_operator_time_seconds"));
        assert!(text.contains("query_id=\"7\""));
    }
}
