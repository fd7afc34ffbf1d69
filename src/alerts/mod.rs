// Alerting: deduplicated, rate-limited signals toward an external sink

mod manager;
mod notifier;

pub use manager::{AlertConfig, AlertManager};
pub use notifier::{AlertDispatcher, DispatchConfig, Notifier, WebhookNotifier};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// Dedup identity: (component, model, category). Distinct categories under
/// the same model never suppress each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertKey {
    pub component: String,
    pub model: String,
    pub category: String,
}

impl AlertKey {
    pub fn new(
        component: impl Into<String>,
        model: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            component: component.into(),
            model: model.into(),
            category: category.into(),
        }
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.component, self.model, self.category)
    }
}

/// An emitted alert. `first_fired_at` survives re-emissions of the same key;
/// `cooldown_until` is the suppression horizon set at emission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub key: AlertKey,
    pub severity: AlertSeverity,
    pub message: String,
    pub first_fired_at: DateTime<Utc>,
    pub cooldown_until: DateTime<Utc>,
}
