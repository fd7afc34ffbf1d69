// Ingestion pipeline
//
// Concurrency-safe entry point for the serving layer. All analysis happens
// synchronously inside the caller's invocation; only alert delivery runs in
// the background. Many producers share one pipeline through `&self`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::alerts::{
    Alert, AlertDispatcher, AlertKey, AlertManager, AlertSeverity, DispatchConfig, Notifier,
};
use crate::config::EngineConfig;
use crate::cost::{CostModel, PricingTable};
use crate::drift::{DriftDetector, DriftSeverity, DriftSignal};
use crate::errors::EngineError;
use crate::metrics::EngineMetrics;
use crate::risk::{HallucinationRiskScorer, RiskLevel};
use crate::telemetry::TelemetryRecord;
use crate::threat::{Detection, ThreatCategory, ThreatScanner, ThreatSeverity};

/// Alert-state sweep cadence, in ingested records.
const GC_INTERVAL: u64 = 256;

/// Everything the caller needs to decide whether to serve or block the
/// response for one record.
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub record_id: Uuid,
    /// Dollar cost; absent when the model has no pricing entry.
    pub cost: Option<f64>,
    pub risk_level: RiskLevel,
    pub adjusted_confidence: f64,
    pub detections: Vec<Detection>,
    /// Absent while the model's window is still collecting, or on
    /// degenerate statistics.
    pub drift_signal: Option<DriftSignal>,
    pub alerts: Vec<Alert>,
}

/// Cheap aggregate snapshot for the caller's health surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStats {
    pub requests: u64,
    pub rejected: u64,
    pub detections: u64,
    pub total_cost: f64,
    pub alerts_emitted: u64,
    pub alerts_suppressed: u64,
    pub tracked_models: usize,
    pub tracked_alert_keys: usize,
}

pub struct IngestPipeline {
    config: EngineConfig,
    cost: CostModel,
    scanner: ThreatScanner,
    risk: HallucinationRiskScorer,
    drift: DriftDetector,
    alerts: AlertManager,
    dispatcher: Option<AlertDispatcher>,
    metrics: EngineMetrics,
    ingested: AtomicU64,
    detections_seen: AtomicU64,
}

impl IngestPipeline {
    /// Build the engine from validated settings, loading pricing and threat
    /// rules from the configured files. Load failures here are deployment
    /// errors and abort startup.
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let pricing = match &config.pricing_path {
            Some(path) => PricingTable::load_from_file(path)?,
            None => PricingTable::default(),
        };
        let scanner = match &config.threat_rules_path {
            Some(path) => ThreatScanner::load_from_file(path)?,
            None => ThreatScanner::with_default_rules(),
        };

        Ok(Self::from_parts(config, pricing, scanner))
    }

    /// Assemble from already-loaded parts. Used by tests and by callers that
    /// manage configuration themselves.
    pub fn from_parts(config: EngineConfig, pricing: PricingTable, scanner: ThreatScanner) -> Self {
        let drift = DriftDetector::new(config.drift_config());
        let alerts = AlertManager::new(config.alert_config());
        let risk = HallucinationRiskScorer::new(config.risk_policy);
        Self {
            config,
            cost: CostModel::new(pricing),
            scanner,
            risk,
            drift,
            alerts,
            dispatcher: None,
            metrics: EngineMetrics::new(),
            ingested: AtomicU64::new(0),
            detections_seen: AtomicU64::new(0),
        }
    }

    /// Attach an external sink. Must be called on a tokio runtime; spawns
    /// the fire-and-forget delivery task.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        let dispatch: DispatchConfig = self.config.dispatch_config();
        self.dispatcher = Some(AlertDispatcher::spawn(notifier, dispatch));
        self
    }

    /// Ingest one telemetry record and return the composite analysis.
    pub fn record(&self, record: TelemetryRecord) -> Result<IngestResult, EngineError> {
        if let Err(err) = record.validate() {
            self.metrics.rejected_total.inc();
            return Err(err);
        }

        self.metrics.requests_total.inc();
        self.ingested.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .latency_seconds
            .with_label_values(&[record.model.as_str()])
            .observe(record.latency_ms as f64 / 1000.0);

        // Threat scan on the raw input, synchronous and bounded-time.
        let detections = self.scanner.scan(&record.raw_input);
        self.detections_seen
            .fetch_add(detections.len() as u64, Ordering::Relaxed);
        for detection in &detections {
            self.metrics
                .detections_total
                .with_label_values(&[detection.category.as_str()])
                .inc();
        }

        // Cost: an unmapped model degrades to "no cost", never a failure.
        let cost = match self.cost.compute(&record) {
            Ok(cost) => {
                self.cost.accumulate(cost);
                self.metrics.cost_dollars_total.inc_by(cost);
                Some(cost)
            }
            Err(EngineError::UnknownModel(model)) => {
                tracing::warn!(model = %model, "No pricing entry, omitting cost");
                None
            }
            Err(err) => return Err(err),
        };

        // Window update, then best-effort drift evaluation.
        self.drift
            .record_confidence(&record.model, record.confidence_score);
        let drift_signal = match self.drift.evaluate(&record.model) {
            Ok(signal) => {
                self.metrics
                    .drift_percentage
                    .with_label_values(&[record.model.as_str()])
                    .set(signal.drift_percentage);
                Some(signal)
            }
            Err(EngineError::InsufficientData { .. }) => None,
            Err(EngineError::UndefinedDrift { model }) => {
                // Data-quality event, not a drift signal.
                tracing::warn!(model = %model, "Drift undefined: previous window averages zero");
                None
            }
            Err(err) => return Err(err),
        };

        // Risk classification and the single-point confidence adjustment.
        let risk_level = self.risk.classify(record.domain_tag, &record.raw_input);
        let adjusted_confidence = self.risk.adjust(record.confidence_score, risk_level);

        let alerts = self.raise_alerts(&record.model, drift_signal.as_ref(), &detections);
        self.maybe_gc();

        Ok(IngestResult {
            record_id: record.id,
            cost,
            risk_level,
            adjusted_confidence,
            detections,
            drift_signal,
            alerts,
        })
    }

    /// Forward all severities to the alert manager and dispatch emissions.
    fn raise_alerts(
        &self,
        model: &str,
        drift_signal: Option<&DriftSignal>,
        detections: &[Detection],
    ) -> Vec<Alert> {
        let mut raised = Vec::new();

        if let Some(signal) = drift_signal {
            let key = AlertKey::new("drift", model, "confidence");
            let severity = match signal.severity {
                DriftSeverity::None => None,
                DriftSeverity::Warning => Some(AlertSeverity::Warning),
                DriftSeverity::Critical => Some(AlertSeverity::Critical),
            };
            let message = format!(
                "confidence drift {:.2}% on {} (previous avg {:.3}, recent avg {:.3})",
                signal.drift_percentage, model, signal.previous_avg, signal.recent_avg
            );
            if let Some(alert) = self.alerts.evaluate(&key, severity, &message) {
                raised.push(alert);
            }
        }

        // One key per category so distinct attack kinds never suppress each
        // other; categories absent from this record clear toward quiet.
        for category in ThreatCategory::ALL {
            let strongest = detections
                .iter()
                .filter(|d| d.category == category)
                .map(|d| d.severity)
                .max();
            let severity = match strongest {
                Some(ThreatSeverity::High) => Some(AlertSeverity::Critical),
                Some(ThreatSeverity::Medium) => Some(AlertSeverity::Warning),
                Some(ThreatSeverity::Low) | None => None,
            };
            let key = AlertKey::new("threat", model, category.as_str());
            let message = format!("{} pattern matched on {}", category.as_str(), model);
            if let Some(alert) = self.alerts.evaluate(&key, severity, &message) {
                raised.push(alert);
            }
        }

        for alert in &raised {
            self.metrics.alerts_emitted_total.inc();
            if let Some(dispatcher) = &self.dispatcher {
                dispatcher.dispatch(alert.clone());
            }
        }
        raised
    }

    fn maybe_gc(&self) {
        if self.ingested.load(Ordering::Relaxed) % GC_INTERVAL == 0 {
            self.alerts.gc(chrono::Utc::now());
        }
    }

    /// Replace the pricing table at runtime.
    pub fn reload_pricing(&self, path: &std::path::Path) -> anyhow::Result<()> {
        self.cost.reload_from_file(path)
    }

    /// Replace the threat rule set at runtime.
    pub fn reload_threat_rules(&self, path: &std::path::Path) -> anyhow::Result<()> {
        self.scanner.reload_from_file(path)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            requests: self.metrics.requests_total.get(),
            rejected: self.metrics.rejected_total.get(),
            detections: self.detections_seen.load(Ordering::Relaxed),
            total_cost: self.cost.total_cost(),
            alerts_emitted: self.alerts.emitted_count(),
            alerts_suppressed: self.alerts.suppressed_count(),
            tracked_models: self.drift.tracked_models(),
            tracked_alert_keys: self.alerts.tracked_keys(),
        }
    }

    /// Prometheus text snapshot for an external scraper.
    pub fn metrics_export(&self) -> String {
        self.metrics.export()
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn alert_manager(&self) -> &AlertManager {
        &self.alerts
    }
}
