// Per-key alert state machine: quiet → active → cooldown → quiet
//
// The storm-prevention contract lives here: once a key fires it enters
// cooldown and repeated breaches are suppressed until expiry, even if
// severity keeps climbing. On expiry, a still-true condition re-emits
// exactly once and re-enters cooldown.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{Alert, AlertKey, AlertSeverity};

#[derive(Debug, Clone, Copy)]
pub struct AlertConfig {
    /// Suppression interval after each emission.
    pub cooldown: Duration,
    /// How long a cleared key's state is kept before garbage collection.
    pub grace: Duration,
    /// Minimum severity that fires an alert.
    pub fire_threshold: AlertSeverity,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::minutes(15),
            grace: Duration::minutes(30),
            fire_threshold: AlertSeverity::Warning,
        }
    }
}

#[derive(Debug, Clone)]
struct KeyEntry {
    first_fired_at: DateTime<Utc>,
    cooldown_until: DateTime<Utc>,
    /// Set when the condition was last observed clear; None while breaching.
    cleared_at: Option<DateTime<Utc>>,
}

pub struct AlertManager {
    config: AlertConfig,
    // Quiet keys have no entry; presence means active/cooldown state.
    entries: DashMap<AlertKey, KeyEntry>,
    emitted: AtomicU64,
    suppressed: AtomicU64,
}

impl AlertManager {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            emitted: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Evaluate the current severity for a key. `None` severity means the
    /// condition does not hold and clears the key toward quiet.
    pub fn evaluate(
        &self,
        key: &AlertKey,
        severity: Option<AlertSeverity>,
        message: &str,
    ) -> Option<Alert> {
        self.evaluate_at(key, severity, message, Utc::now())
    }

    /// Clock-injectable evaluation; `evaluate` passes the wall clock.
    pub fn evaluate_at(
        &self,
        key: &AlertKey,
        severity: Option<AlertSeverity>,
        message: &str,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        match severity {
            None => {
                self.clear(key, now);
                None
            }
            Some(severity) if severity < self.config.fire_threshold => {
                self.clear(key, now);
                None
            }
            Some(severity) => self.breach(key, severity, message, now),
        }
    }

    fn breach(
        &self,
        key: &AlertKey,
        severity: AlertSeverity,
        message: &str,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let mut entry = self.entries.entry(key.clone()).or_insert_with(|| KeyEntry {
            first_fired_at: now,
            // A fresh entry is immediately eligible to fire.
            cooldown_until: now,
            cleared_at: None,
        });

        entry.cleared_at = None;

        if now < entry.cooldown_until {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, "Alert suppressed during cooldown");
            return None;
        }

        entry.cooldown_until = now + self.config.cooldown;
        let alert = Alert {
            key: key.clone(),
            severity,
            message: message.to_string(),
            first_fired_at: entry.first_fired_at,
            cooldown_until: entry.cooldown_until,
        };
        drop(entry);

        self.emitted.fetch_add(1, Ordering::Relaxed);
        tracing::info!(key = %key, severity = ?severity, "Alert emitted");
        Some(alert)
    }

    fn clear(&self, key: &AlertKey, now: DateTime<Utc>) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.cleared_at.is_none() {
                entry.cleared_at = Some(now);
                tracing::debug!(key = %key, "Alert condition cleared");
            }
        }
        self.gc_key(key, now);
    }

    fn gc_key(&self, key: &AlertKey, now: DateTime<Utc>) {
        let expired = match self.entries.get(key) {
            Some(entry) => match entry.cleared_at {
                Some(cleared_at) => {
                    now >= entry.cooldown_until && now - cleared_at >= self.config.grace
                }
                None => false,
            },
            None => false,
        };
        if expired {
            self.entries.remove(key);
            tracing::debug!(key = %key, "Alert state garbage-collected");
        }
    }

    /// Sweep all keys whose condition has been clear for the grace period.
    pub fn gc(&self, now: DateTime<Utc>) {
        let grace = self.config.grace;
        self.entries.retain(|_, entry| match entry.cleared_at {
            Some(cleared_at) => now < entry.cooldown_until || now - cleared_at < grace,
            None => true,
        });
    }

    /// Keys currently holding active/cooldown state.
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    pub fn emitted_count(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    pub fn suppressed_count(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drift_key() -> AlertKey {
        AlertKey::new("drift", "gpt-4", "confidence")
    }

    fn manager() -> AlertManager {
        AlertManager::new(AlertConfig::default())
    }

    #[test]
    fn test_first_breach_emits() {
        let mgr = manager();
        let now = Utc::now();
        let alert = mgr
            .evaluate_at(&drift_key(), Some(AlertSeverity::Warning), "drift 12%", now)
            .expect("first breach must emit");
        assert_eq!(alert.key, drift_key());
        assert_eq!(alert.first_fired_at, now);
        assert_eq!(alert.cooldown_until, now + Duration::minutes(15));
        assert_eq!(mgr.emitted_count(), 1);
    }

    #[test]
    fn test_cooldown_suppresses_repeat_breaches() {
        let mgr = manager();
        let now = Utc::now();
        assert!(mgr
            .evaluate_at(&drift_key(), Some(AlertSeverity::Warning), "m", now)
            .is_some());

        // Repeated breach inside the window: suppressed even at higher severity.
        let later = now + Duration::minutes(5);
        assert!(mgr
            .evaluate_at(&drift_key(), Some(AlertSeverity::Critical), "m", later)
            .is_none());
        assert_eq!(mgr.suppressed_count(), 1);
        assert_eq!(mgr.emitted_count(), 1);
    }

    #[test]
    fn test_reemit_once_after_cooldown_expiry() {
        let mgr = manager();
        let now = Utc::now();
        let first = mgr
            .evaluate_at(&drift_key(), Some(AlertSeverity::Warning), "m", now)
            .unwrap();

        let after = now + Duration::minutes(16);
        let second = mgr
            .evaluate_at(&drift_key(), Some(AlertSeverity::Warning), "m", after)
            .expect("condition still true after expiry must re-emit");
        assert_eq!(second.first_fired_at, first.first_fired_at);
        assert_eq!(mgr.emitted_count(), 2);

        // Right after re-emission the key is back in cooldown.
        assert!(mgr
            .evaluate_at(
                &drift_key(),
                Some(AlertSeverity::Warning),
                "m",
                after + Duration::minutes(1)
            )
            .is_none());
    }

    #[test]
    fn test_distinct_categories_do_not_suppress_each_other() {
        let mgr = manager();
        let now = Utc::now();
        let threat_key = AlertKey::new("threat", "gpt-4", "prompt_injection");

        assert!(mgr
            .evaluate_at(&drift_key(), Some(AlertSeverity::Warning), "m", now)
            .is_some());
        assert!(mgr
            .evaluate_at(&threat_key, Some(AlertSeverity::Critical), "m", now)
            .is_some());
        assert_eq!(mgr.emitted_count(), 2);
    }

    #[test]
    fn test_none_severity_clears_and_gc_after_grace() {
        let mgr = manager();
        let now = Utc::now();
        mgr.evaluate_at(&drift_key(), Some(AlertSeverity::Warning), "m", now);
        assert_eq!(mgr.tracked_keys(), 1);

        // Condition clears; state is retained through the grace period.
        let cleared = now + Duration::minutes(16);
        mgr.evaluate_at(&drift_key(), None, "", cleared);
        assert_eq!(mgr.tracked_keys(), 1);

        // After the grace period the key returns to quiet.
        mgr.evaluate_at(&drift_key(), None, "", cleared + Duration::minutes(31));
        assert_eq!(mgr.tracked_keys(), 0);

        // Quiet again: the next breach emits fresh.
        let much_later = cleared + Duration::minutes(60);
        let alert = mgr
            .evaluate_at(&drift_key(), Some(AlertSeverity::Warning), "m", much_later)
            .unwrap();
        assert_eq!(alert.first_fired_at, much_later);
    }

    #[test]
    fn test_gc_sweep_retains_breaching_keys() {
        let mgr = manager();
        let now = Utc::now();
        mgr.evaluate_at(&drift_key(), Some(AlertSeverity::Warning), "m", now);
        let other = AlertKey::new("threat", "gpt-4", "jailbreak");
        mgr.evaluate_at(&other, Some(AlertSeverity::Critical), "m", now);
        mgr.evaluate_at(&other, None, "", now + Duration::minutes(16));

        mgr.gc(now + Duration::minutes(60));
        // The still-breaching drift key survives; the cleared threat key is gone.
        assert_eq!(mgr.tracked_keys(), 1);
    }

    #[test]
    fn test_below_threshold_does_not_fire() {
        let mgr = AlertManager::new(AlertConfig {
            fire_threshold: AlertSeverity::Critical,
            ..AlertConfig::default()
        });
        let now = Utc::now();
        assert!(mgr
            .evaluate_at(&drift_key(), Some(AlertSeverity::Warning), "m", now)
            .is_none());
        assert_eq!(mgr.emitted_count(), 0);
    }
}
