// Per-call telemetry types
//
// One TelemetryRecord per generative-model call, supplied by the serving
// layer. Records are immutable once created and are not retained beyond the
// analysis window except in aggregate form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::EngineError;

/// Sensitive-domain tag supplied by the caller, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainTag {
    Financial,
    Medical,
    Legal,
    General,
}

impl DomainTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainTag::Financial => "financial",
            DomainTag::Medical => "medical",
            DomainTag::Legal => "legal",
            DomainTag::General => "general",
        }
    }
}

/// Telemetry for a single model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Model-reported confidence, expected in [0, 1].
    pub confidence_score: f64,
    pub latency_ms: u64,
    /// Raw input text, scanned for adversarial patterns.
    pub raw_input: String,
    pub domain_tag: Option<DomainTag>,
}

impl TelemetryRecord {
    pub fn new(
        model: impl Into<String>,
        prompt_tokens: u64,
        completion_tokens: u64,
        confidence_score: f64,
        latency_ms: u64,
        raw_input: impl Into<String>,
        domain_tag: Option<DomainTag>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            model: model.into(),
            prompt_tokens,
            completion_tokens,
            confidence_score,
            latency_ms,
            raw_input: raw_input.into(),
            domain_tag,
        }
    }

    /// Validate the record before any processing. Token counts are
    /// non-negative by construction; confidence must be a real number in
    /// [0, 1] and the model name must be present.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.model.trim().is_empty() {
            return Err(EngineError::InvalidTelemetry(
                "model name is empty".to_string(),
            ));
        }
        if !self.confidence_score.is_finite() {
            return Err(EngineError::InvalidTelemetry(format!(
                "confidence score is not finite: {}",
                self.confidence_score
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(EngineError::InvalidTelemetry(format!(
                "confidence score {} outside [0, 1]",
                self.confidence_score
            )));
        }
        Ok(())
    }
}
