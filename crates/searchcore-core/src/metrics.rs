use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Counters, histograms, and gauges shared across every component (§4.10).
/// Constructed once per process and handed out as an `Arc` so every
/// component records into the same `Registry`; exported as Prometheus text
/// exposition format by the ambient CLI/HTTP facade.
pub struct Metrics {
    registry: Registry,

    pub cache_hits: IntCounterVec,
    pub cache_misses: IntCounter,
    pub cache_evictions: IntCounterVec,

    pub embedding_latency_ms: Histogram,
    pub embedding_errors_total: IntCounter,

    pub search_latency_ms: Histogram,
    pub search_projects_searched: Histogram,

    pub index_queue_depth: IntGauge,
    pub index_errors_total: IntCounterVec,

    pub invalidation_lag_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let cache_hits = IntCounterVec::new(
            Opts::new("cache_hits_total", "cache hits by tier"),
            &["tier"],
        )
        .unwrap();
        let cache_misses = IntCounter::new("cache_misses_total", "cache misses").unwrap();
        let cache_evictions = IntCounterVec::new(
            Opts::new("cache_evictions_total", "cache evictions by tier"),
            &["tier"],
        )
        .unwrap();

        let embedding_latency_ms = Histogram::with_opts(HistogramOpts::new(
            "embedding_latency_ms",
            "embedding call latency in milliseconds",
        ))
        .unwrap();
        let embedding_errors_total =
            IntCounter::new("embedding_errors_total", "embedding call failures").unwrap();

        let search_latency_ms = Histogram::with_opts(HistogramOpts::new(
            "search_latency_ms",
            "per-project search latency in milliseconds",
        ))
        .unwrap();
        let search_projects_searched = Histogram::with_opts(HistogramOpts::new(
            "search_projects_searched",
            "number of projects searched per request",
        ))
        .unwrap();

        let index_queue_depth =
            IntGauge::new("index_queue_depth", "pending indexing tasks").unwrap();
        let index_errors_total = IntCounterVec::new(
            Opts::new("index_errors_total", "indexing failures by project"),
            &["project_id"],
        )
        .unwrap();

        let invalidation_lag_ms = Histogram::with_opts(HistogramOpts::new(
            "invalidation_lag_ms",
            "time from file event to cache invalidation, in milliseconds",
        ))
        .unwrap();

        for c in [
            Box::new(cache_hits.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(cache_misses.clone()),
            Box::new(cache_evictions.clone()),
            Box::new(embedding_latency_ms.clone()),
            Box::new(embedding_errors_total.clone()),
            Box::new(search_latency_ms.clone()),
            Box::new(search_projects_searched.clone()),
            Box::new(index_queue_depth.clone()),
            Box::new(index_errors_total.clone()),
            Box::new(invalidation_lag_ms.clone()),
        ] {
            let _ = registry.register(c);
        }

        Self {
            registry,
            cache_hits,
            cache_misses,
            cache_evictions,
            embedding_latency_ms,
            embedding_errors_total,
            search_latency_ms,
            search_projects_searched,
            index_queue_depth,
            index_errors_total,
            invalidation_lag_ms,
        }
    }

    /// Renders the registry in Prometheus text exposition format, the body of
    /// `metrics.export()` (§6).
    pub fn export(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode(&metric_families, &mut buf).unwrap();
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_contains_registered_metric_names() {
        let m = Metrics::new();
        m.cache_misses.inc();
        let text = m.export();
        assert!(text.contains("cache_misses_total"));
    }
}
