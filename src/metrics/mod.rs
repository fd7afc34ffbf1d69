// Prometheus metrics export
//
// Read-only snapshot toward an external collector. Counters and gauges
// only; the engine keeps no historical series itself.

use prometheus::{
    Counter, Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};

#[derive(Clone)]
pub struct EngineMetrics {
    registry: Registry,
    pub requests_total: IntCounter,
    pub rejected_total: IntCounter,
    pub detections_total: IntCounterVec,
    pub alerts_emitted_total: IntCounter,
    pub cost_dollars_total: Counter,
    pub drift_percentage: GaugeVec,
    pub latency_seconds: HistogramVec,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    // Registration only fails on duplicate metric names within the private
    // registry, so the expects here cannot trip at runtime.
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounter::new(
            "sentra_requests_total",
            "Telemetry records ingested",
        )
        .expect("metric definition");
        let rejected_total = IntCounter::new(
            "sentra_rejected_total",
            "Telemetry records rejected as invalid",
        )
        .expect("metric definition");
        let detections_total = IntCounterVec::new(
            Opts::new("sentra_detections_total", "Threat rule matches"),
            &["category"],
        )
        .expect("metric definition");
        let alerts_emitted_total = IntCounter::new(
            "sentra_alerts_emitted_total",
            "Alerts emitted toward the sink",
        )
        .expect("metric definition");
        let cost_dollars_total = Counter::new(
            "sentra_cost_dollars_total",
            "Accumulated request cost in dollars",
        )
        .expect("metric definition");
        let drift_percentage = GaugeVec::new(
            Opts::new(
                "sentra_drift_percentage",
                "Latest confidence drift percentage per model",
            ),
            &["model"],
        )
        .expect("metric definition");
        let latency_seconds = HistogramVec::new(
            HistogramOpts::new("sentra_latency_seconds", "Reported model call latency")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["model"],
        )
        .expect("metric definition");

        for collector in [
            Box::new(requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(rejected_total.clone()),
            Box::new(detections_total.clone()),
            Box::new(alerts_emitted_total.clone()),
            Box::new(cost_dollars_total.clone()),
            Box::new(drift_percentage.clone()),
            Box::new(latency_seconds.clone()),
        ] {
            registry.register(collector).expect("metric registration");
        }

        Self {
            registry,
            requests_total,
            rejected_total,
            detections_total,
            alerts_emitted_total,
            cost_dollars_total,
            drift_percentage,
            latency_seconds,
        }
    }

    /// Text-format snapshot for an external scraper.
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(err) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %err, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_appear_in_export() {
        let metrics = EngineMetrics::new();
        metrics.requests_total.inc();
        metrics.requests_total.inc();
        metrics
            .detections_total
            .with_label_values(&["prompt_injection"])
            .inc();
        metrics.cost_dollars_total.inc_by(0.06);
        metrics
            .drift_percentage
            .with_label_values(&["gpt-4"])
            .set(12.09);

        let exported = metrics.export();
        assert!(exported.contains("sentra_requests_total 2"));
        assert!(exported.contains("prompt_injection"));
        assert!(exported.contains("sentra_drift_percentage"));
    }

    #[test]
    fn test_latency_histogram_observes() {
        let metrics = EngineMetrics::new();
        metrics
            .latency_seconds
            .with_label_values(&["gpt-4"])
            .observe(0.42);
        assert!(metrics.export().contains("sentra_latency_seconds_bucket"));
    }
}
