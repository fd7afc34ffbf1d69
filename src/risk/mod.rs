// Hallucination risk scoring for sensitive domains
//
// Classification combines the caller-supplied domain tag with keyword
// heuristics over the input text. The highest-severity classification wins;
// signals never stack. Confidence adjustment goes through a single policy
// table rather than inline conditionals, so the discount rule is
// independently testable and tunable.

use serde::{Deserialize, Serialize};

use crate::telemetry::DomainTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Confidence multipliers per risk level. Critical halves confidence, high
/// takes a quarter off, medium and low pass through unchanged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentPolicy {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for AdjustmentPolicy {
    fn default() -> Self {
        Self {
            critical: 0.5,
            high: 0.75,
            medium: 1.0,
            low: 1.0,
        }
    }
}

impl AdjustmentPolicy {
    pub fn factor(&self, level: RiskLevel) -> f64 {
        match level {
            RiskLevel::Critical => self.critical,
            RiskLevel::High => self.high,
            RiskLevel::Medium => self.medium,
            RiskLevel::Low => self.low,
        }
    }
}

pub struct HallucinationRiskScorer {
    policy: AdjustmentPolicy,
    /// (keyword, escalation level); matched case-insensitively as substrings.
    keyword_escalations: Vec<(String, RiskLevel)>,
}

impl Default for HallucinationRiskScorer {
    fn default() -> Self {
        Self::new(AdjustmentPolicy::default())
    }
}

impl HallucinationRiskScorer {
    pub fn new(policy: AdjustmentPolicy) -> Self {
        let keyword_escalations = [
            // High-stakes medical phrasing
            ("dosage", RiskLevel::Critical),
            ("prescription", RiskLevel::Critical),
            ("diagnosis", RiskLevel::Critical),
            ("symptom", RiskLevel::High),
            // Financial commitments
            ("guaranteed return", RiskLevel::Critical),
            ("wire transfer", RiskLevel::Critical),
            ("investment advice", RiskLevel::High),
            // Legal exposure
            ("lawsuit", RiskLevel::High),
            ("legal advice", RiskLevel::High),
        ]
        .into_iter()
        .map(|(k, l)| (k.to_string(), l))
        .collect();

        Self {
            policy,
            keyword_escalations,
        }
    }

    /// Resolve a risk level from the domain tag and text. Tagged sensitive
    /// domains start at `High`; keyword heuristics can escalate any input
    /// further. The maximum of all applicable signals is returned.
    pub fn classify(&self, domain_tag: Option<DomainTag>, text: &str) -> RiskLevel {
        let base = match domain_tag {
            Some(DomainTag::Financial) | Some(DomainTag::Medical) | Some(DomainTag::Legal) => {
                RiskLevel::High
            }
            Some(DomainTag::General) | None => RiskLevel::Low,
        };

        let lowered = text.to_lowercase();
        let escalated = self
            .keyword_escalations
            .iter()
            .filter(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, level)| *level)
            .max()
            .unwrap_or(RiskLevel::Low);

        base.max(escalated)
    }

    /// Apply the policy table to a confidence score.
    pub fn adjust(&self, confidence: f64, level: RiskLevel) -> f64 {
        confidence * self.policy.factor(level)
    }
}
