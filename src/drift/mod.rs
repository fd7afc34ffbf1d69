// Confidence drift detection
//
// Compares the two most recent halves of a per-model rolling window of
// confidence scores. Self-referential by design: no ground-truth labels,
// which trades false-negative risk on uniformly degraded models for
// operability with zero labeling infrastructure.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::window::RingWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftSeverity {
    None,
    Warning,
    Critical,
}

/// Per-model lifecycle: collecting until the window can be split into two
/// full halves, then monitoring for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftState {
    Collecting,
    Monitoring,
}

/// One drift evaluation. Ephemeral; produced per call, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftSignal {
    pub model: String,
    /// Positive values mean confidence is falling.
    pub drift_percentage: f64,
    pub severity: DriftSeverity,
    pub recent_avg: f64,
    pub previous_avg: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Ring window capacity per model.
    pub window_capacity: usize,
    /// Half-window size M; evaluation needs 2×M samples.
    pub min_samples: usize,
    /// Drift percentage at which severity becomes warning.
    pub warning_threshold_pct: f64,
    /// Drift percentage at which severity becomes critical.
    pub critical_threshold_pct: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            window_capacity: 200,
            min_samples: 100,
            warning_threshold_pct: 10.0,
            critical_threshold_pct: 20.0,
        }
    }
}

/// Drift detector over lazily created per-model windows.
pub struct DriftDetector {
    config: DriftConfig,
    windows: DashMap<String, RingWindow>,
}

impl DriftDetector {
    pub fn new(config: DriftConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Push one confidence score into the model's window, creating the
    /// window on first sight of the model.
    pub fn record_confidence(&self, model: &str, score: f64) {
        self.windows
            .entry(model.to_string())
            .or_insert_with(|| RingWindow::new(self.config.window_capacity))
            .push(score);
    }

    pub fn state(&self, model: &str) -> DriftState {
        let needed = self.config.min_samples * 2;
        match self.windows.get(model) {
            Some(window) if window.len() >= needed => DriftState::Monitoring,
            _ => DriftState::Collecting,
        }
    }

    /// Compare the two most recent half-windows for the model. Idempotent:
    /// with no new telemetry in between, two calls yield identical signals.
    pub fn evaluate(&self, model: &str) -> Result<DriftSignal, EngineError> {
        let needed = self.config.min_samples * 2;
        let window = self
            .windows
            .get(model)
            .ok_or(EngineError::InsufficientData {
                have: 0,
                need: needed,
            })?;

        let scores = window.snapshot(needed)?;
        let (previous, recent) = scores.split_at(self.config.min_samples);

        let previous_avg = mean(previous);
        let recent_avg = mean(recent);

        if previous_avg == 0.0 {
            return Err(EngineError::UndefinedDrift {
                model: model.to_string(),
            });
        }

        let drift_percentage = (previous_avg - recent_avg) / previous_avg * 100.0;
        let severity = self.classify(drift_percentage);

        Ok(DriftSignal {
            model: model.to_string(),
            drift_percentage,
            severity,
            recent_avg,
            previous_avg,
            sample_size: needed,
        })
    }

    fn classify(&self, drift_percentage: f64) -> DriftSeverity {
        if drift_percentage >= self.config.critical_threshold_pct {
            DriftSeverity::Critical
        } else if drift_percentage >= self.config.warning_threshold_pct {
            DriftSeverity::Warning
        } else {
            DriftSeverity::None
        }
    }

    /// Number of models currently tracked.
    pub fn tracked_models(&self) -> usize {
        self.windows.len()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> DriftConfig {
        DriftConfig {
            window_capacity: 20,
            min_samples: 5,
            warning_threshold_pct: 10.0,
            critical_threshold_pct: 20.0,
        }
    }

    fn fill(detector: &DriftDetector, model: &str, scores: &[f64]) {
        for &score in scores {
            detector.record_confidence(model, score);
        }
    }

    #[test]
    fn test_insufficient_data_before_two_halves() {
        let detector = DriftDetector::new(small_config());
        fill(&detector, "gpt-4", &[0.9; 9]);
        assert!(matches!(
            detector.evaluate("gpt-4"),
            Err(EngineError::InsufficientData { .. })
        ));
        assert_eq!(detector.state("gpt-4"), DriftState::Collecting);
    }

    #[test]
    fn test_unknown_model_is_insufficient_data() {
        let detector = DriftDetector::new(small_config());
        assert!(matches!(
            detector.evaluate("never-seen"),
            Err(EngineError::InsufficientData { have: 0, .. })
        ));
    }

    #[test]
    fn test_warning_drift_percentage() {
        let detector = DriftDetector::new(small_config());
        // Previous half averages 0.91, recent half 0.80.
        fill(&detector, "gpt-4", &[0.91; 5]);
        fill(&detector, "gpt-4", &[0.80; 5]);

        let signal = detector.evaluate("gpt-4").unwrap();
        assert!((signal.drift_percentage - 12.087912).abs() < 1e-3);
        assert_eq!(signal.severity, DriftSeverity::Warning);
        assert!((signal.previous_avg - 0.91).abs() < 1e-12);
        assert!((signal.recent_avg - 0.80).abs() < 1e-12);
        assert_eq!(signal.sample_size, 10);
        assert_eq!(detector.state("gpt-4"), DriftState::Monitoring);
    }

    #[test]
    fn test_critical_drift() {
        let detector = DriftDetector::new(small_config());
        fill(&detector, "gpt-4", &[0.90; 5]);
        fill(&detector, "gpt-4", &[0.60; 5]);

        let signal = detector.evaluate("gpt-4").unwrap();
        assert!(signal.drift_percentage > 30.0);
        assert_eq!(signal.severity, DriftSeverity::Critical);
    }

    #[test]
    fn test_stable_confidence_no_drift() {
        let detector = DriftDetector::new(small_config());
        fill(&detector, "gpt-4", &[0.88; 10]);
        let signal = detector.evaluate("gpt-4").unwrap();
        assert_eq!(signal.severity, DriftSeverity::None);
        assert!(signal.drift_percentage.abs() < 1e-9);
    }

    #[test]
    fn test_improving_confidence_is_not_drift() {
        let detector = DriftDetector::new(small_config());
        fill(&detector, "gpt-4", &[0.70; 5]);
        fill(&detector, "gpt-4", &[0.95; 5]);
        let signal = detector.evaluate("gpt-4").unwrap();
        assert!(signal.drift_percentage < 0.0);
        assert_eq!(signal.severity, DriftSeverity::None);
    }

    #[test]
    fn test_zero_previous_average_undefined() {
        let detector = DriftDetector::new(small_config());
        fill(&detector, "degenerate", &[0.0; 5]);
        fill(&detector, "degenerate", &[0.5; 5]);
        assert!(matches!(
            detector.evaluate("degenerate"),
            Err(EngineError::UndefinedDrift { .. })
        ));
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let detector = DriftDetector::new(small_config());
        fill(&detector, "gpt-4", &[0.91; 5]);
        fill(&detector, "gpt-4", &[0.80; 5]);

        let first = detector.evaluate("gpt-4").unwrap();
        let second = detector.evaluate("gpt-4").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_models_tracked_independently() {
        let detector = DriftDetector::new(small_config());
        fill(&detector, "gpt-4", &[0.9; 10]);
        fill(&detector, "claude-3", &[0.9; 3]);

        assert!(detector.evaluate("gpt-4").is_ok());
        assert!(detector.evaluate("claude-3").is_err());
        assert_eq!(detector.tracked_models(), 2);
    }
}
