// Pricing table and per-request cost computation
//
// Pricing is external configuration keyed by model name, hot-reloadable at
// runtime. The engine fails closed for unmapped models: the caller decides
// whether to fall back or reject.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::errors::EngineError;
use crate::telemetry::TelemetryRecord;

/// Prices per 1k tokens for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingEntry {
    pub prompt: f64,
    pub completion: f64,
}

/// Model name → pricing, loaded from a JSON object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingTable {
    #[serde(flatten)]
    entries: HashMap<String, PricingEntry>,
}

impl PricingTable {
    pub fn from_entries(entries: HashMap<String, PricingEntry>) -> Self {
        Self { entries }
    }

    /// Load pricing from a JSON file. An empty table is a deployment error.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read pricing file: {}", path.display()))?;

        let table: PricingTable =
            serde_json::from_str(&contents).context("Failed to parse pricing JSON")?;

        if table.entries.is_empty() {
            bail!("Pricing file {} contains no models", path.display());
        }

        Ok(table)
    }

    pub fn get(&self, model: &str) -> Option<&PricingEntry> {
        self.entries.get(model)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Projected spend for external reporting. Pure arithmetic, no alerting.
pub fn project(cost_per_request: f64, requests_per_hour: f64, horizon_hours: f64) -> f64 {
    cost_per_request * requests_per_hour * horizon_hours
}

/// Cost computation plus a running aggregate.
///
/// The aggregate is accumulated in whole microdollars with an atomic add, so
/// concurrent producers never take a lock on the hot path for accounting.
pub struct CostModel {
    table: RwLock<PricingTable>,
    total_microdollars: AtomicU64,
}

impl CostModel {
    pub fn new(table: PricingTable) -> Self {
        Self {
            table: RwLock::new(table),
            total_microdollars: AtomicU64::new(0),
        }
    }

    /// Dollar cost of a single request, from token counts and the pricing
    /// table. Fails with `UnknownModel` when the model has no entry.
    pub fn compute(&self, record: &TelemetryRecord) -> Result<f64, EngineError> {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        let pricing = table
            .get(&record.model)
            .ok_or_else(|| EngineError::UnknownModel(record.model.clone()))?;

        let cost = (record.prompt_tokens as f64 / 1000.0) * pricing.prompt
            + (record.completion_tokens as f64 / 1000.0) * pricing.completion;
        Ok(cost)
    }

    /// Add a computed cost to the running aggregate.
    pub fn accumulate(&self, cost: f64) {
        let micros = (cost * 1_000_000.0).round() as u64;
        self.total_microdollars.fetch_add(micros, Ordering::Relaxed);
    }

    /// Total accumulated cost in dollars.
    pub fn total_cost(&self) -> f64 {
        self.total_microdollars.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    /// Replace the pricing table from a file. On failure the previous table
    /// stays in effect.
    pub fn reload_from_file(&self, path: &Path) -> Result<()> {
        let fresh = PricingTable::load_from_file(path)?;
        let count = fresh.len();
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        *table = fresh;
        tracing::info!("Reloaded pricing table: {} models", count);
        Ok(())
    }
}
