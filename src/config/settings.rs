// Engine configuration structs
//
// Everything tunable per deployment lives here: window sizing, drift
// thresholds, alert cooldowns, dispatch limits, and paths to the external
// pricing and threat-rule files.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::alerts::{AlertConfig, AlertSeverity, DispatchConfig};
use crate::drift::DriftConfig;
use crate::risk::AdjustmentPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ring window capacity per model.
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,

    /// Half-window size for drift comparison; evaluation needs twice this.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Drift percentage thresholds.
    #[serde(default = "default_warning_pct")]
    pub drift_warning_pct: f64,
    #[serde(default = "default_critical_pct")]
    pub drift_critical_pct: f64,

    /// Alert cooldown and state garbage collection.
    #[serde(default = "default_cooldown_minutes")]
    pub alert_cooldown_minutes: i64,
    #[serde(default = "default_grace_minutes")]
    pub alert_grace_minutes: i64,

    /// Notifier queue and retry behavior.
    #[serde(default = "default_queue_capacity")]
    pub notifier_queue_capacity: usize,
    #[serde(default = "default_max_retries")]
    pub notifier_max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub notifier_backoff_ms: u64,

    /// Confidence multipliers per risk level.
    #[serde(default)]
    pub risk_policy: AdjustmentPolicy,

    /// Optional external configuration files. When unset, pricing is empty
    /// (every model unknown) and the built-in threat rules apply.
    #[serde(default)]
    pub pricing_path: Option<PathBuf>,
    #[serde(default)]
    pub threat_rules_path: Option<PathBuf>,
}

fn default_window_capacity() -> usize {
    200
}
fn default_min_samples() -> usize {
    100
}
fn default_warning_pct() -> f64 {
    10.0
}
fn default_critical_pct() -> f64 {
    20.0
}
fn default_cooldown_minutes() -> i64 {
    15
}
fn default_grace_minutes() -> i64 {
    30
}
fn default_queue_capacity() -> usize {
    256
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    200
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_capacity: default_window_capacity(),
            min_samples: default_min_samples(),
            drift_warning_pct: default_warning_pct(),
            drift_critical_pct: default_critical_pct(),
            alert_cooldown_minutes: default_cooldown_minutes(),
            alert_grace_minutes: default_grace_minutes(),
            notifier_queue_capacity: default_queue_capacity(),
            notifier_max_retries: default_max_retries(),
            notifier_backoff_ms: default_backoff_ms(),
            risk_policy: AdjustmentPolicy::default(),
            pricing_path: None,
            threat_rules_path: None,
        }
    }
}

impl EngineConfig {
    /// Reject configurations that indicate a deployment error. Fatal at
    /// startup; never checked per record.
    pub fn validate(&self) -> Result<()> {
        if self.window_capacity == 0 {
            bail!("window_capacity must be positive");
        }
        if self.min_samples == 0 {
            bail!("min_samples must be positive");
        }
        if self.min_samples * 2 > self.window_capacity {
            bail!(
                "window_capacity {} cannot hold two half-windows of {}",
                self.window_capacity,
                self.min_samples
            );
        }
        if self.drift_warning_pct <= 0.0 || self.drift_critical_pct <= 0.0 {
            bail!("drift thresholds must be positive");
        }
        if self.drift_warning_pct >= self.drift_critical_pct {
            bail!(
                "drift_warning_pct {} must be below drift_critical_pct {}",
                self.drift_warning_pct,
                self.drift_critical_pct
            );
        }
        if self.alert_cooldown_minutes <= 0 || self.alert_grace_minutes <= 0 {
            bail!("alert cooldown and grace must be positive");
        }
        if self.notifier_queue_capacity == 0 {
            bail!("notifier_queue_capacity must be positive");
        }
        for (level, factor) in [
            ("critical", self.risk_policy.critical),
            ("high", self.risk_policy.high),
            ("medium", self.risk_policy.medium),
            ("low", self.risk_policy.low),
        ] {
            if !(factor > 0.0 && factor <= 1.0) {
                bail!("risk_policy.{} factor {} must be in (0, 1]", level, factor);
            }
        }
        Ok(())
    }

    pub fn drift_config(&self) -> DriftConfig {
        DriftConfig {
            window_capacity: self.window_capacity,
            min_samples: self.min_samples,
            warning_threshold_pct: self.drift_warning_pct,
            critical_threshold_pct: self.drift_critical_pct,
        }
    }

    pub fn alert_config(&self) -> AlertConfig {
        AlertConfig {
            cooldown: chrono::Duration::minutes(self.alert_cooldown_minutes),
            grace: chrono::Duration::minutes(self.alert_grace_minutes),
            fire_threshold: AlertSeverity::Warning,
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            queue_capacity: self.notifier_queue_capacity,
            max_retries: self.notifier_max_retries,
            initial_backoff: std::time::Duration::from_millis(self.notifier_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_window_too_small_for_halves() {
        let config = EngineConfig {
            window_capacity: 150,
            min_samples: 100,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_thresholds_must_be_ordered() {
        let config = EngineConfig {
            drift_warning_pct: 25.0,
            drift_critical_pct: 20.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_risk_policy_factor_out_of_range_rejected() {
        let config = EngineConfig {
            risk_policy: AdjustmentPolicy {
                critical: 0.0,
                ..AdjustmentPolicy::default()
            },
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            risk_policy: AdjustmentPolicy {
                high: 1.5,
                ..AdjustmentPolicy::default()
            },
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = EngineConfig {
            window_capacity: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
