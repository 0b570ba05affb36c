//! Quarantine lifecycle
//!
//! Components cycle between `Active` and `Quarantined`. A component enters
//! quarantine when any prune condition holds and leaves it only when debt,
//! health and elapsed time all allow it. The machine owns the active
//! quarantine records; at most one exists per component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::{PruningConfig, SeverityBands};
use crate::error::{CoreError, Result};

/// Lifecycle state of a tracked component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Active,
    Quarantined,
}

/// Inputs to a prune/restore check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PruneSignals {
    pub debt_score: f64,
    pub error_rate: f64,
    pub temperature_c: Option<f64>,
    /// 0-100 from the external health aggregator
    pub health_score: f64,
}

/// Active quarantine of one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantineRecord {
    pub component_id: String,
    pub reason: String,
    pub quarantined_at: DateTime<Utc>,
    pub debt_score_at_quarantine: f64,
    pub health_at_quarantine: f64,
}

impl QuarantineRecord {
    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.quarantined_at
    }
}

/// Outcome of one lifecycle evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum PruneTransition {
    /// A new quarantine record was created
    Quarantined { record: QuarantineRecord },
    /// The active record was removed
    Restored { record: QuarantineRecord },
    /// No state change
    Unchanged { state: ComponentState },
}

impl PruneTransition {
    /// State after the transition
    pub fn state(&self) -> ComponentState {
        match self {
            Self::Quarantined { .. } => ComponentState::Quarantined,
            Self::Restored { .. } => ComponentState::Active,
            Self::Unchanged { state } => *state,
        }
    }

    pub fn is_quarantined(&self) -> bool {
        self.state() == ComponentState::Quarantined
    }
}

/// Quarantine/restore state machine
#[derive(Debug, Default)]
pub struct PruningStateMachine {
    bands: SeverityBands,
    config: PruningConfig,
    records: RwLock<HashMap<String, QuarantineRecord>>,
}

impl PruningStateMachine {
    pub fn new(bands: SeverityBands, config: PruningConfig) -> Self {
        Self {
            bands,
            config,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Human-readable reasons the component must be pruned; empty if none
    pub fn prune_reasons(&self, signals: &PruneSignals) -> Vec<String> {
        let mut reasons = Vec::new();
        if signals.debt_score >= self.bands.quarantine {
            reasons.push(format!(
                "debt {:.2} >= quarantine threshold {:.2}",
                signals.debt_score, self.bands.quarantine
            ));
        }
        if signals.error_rate >= self.config.error_rate_limit {
            reasons.push(format!(
                "error rate {:.3} >= {:.3}",
                signals.error_rate, self.config.error_rate_limit
            ));
        }
        if let Some(t) = signals.temperature_c {
            if t >= self.config.shutdown_temp_c {
                reasons.push(format!(
                    "temperature {:.1}C >= shutdown {:.1}C",
                    t, self.config.shutdown_temp_c
                ));
            }
        }
        if health(signals.health_score) < self.config.min_health {
            reasons.push(format!(
                "health {:.1} < {:.1}",
                signals.health_score, self.config.min_health
            ));
        }
        reasons
    }

    pub fn should_prune(&self, signals: &PruneSignals) -> bool {
        !self.prune_reasons(signals).is_empty()
    }

    /// All three restore conditions must hold
    pub fn can_restore(
        &self,
        debt_score: f64,
        health_score: f64,
        quarantined_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        debt_score < self.bands.warning
            && health(health_score) >= self.config.restore_health
            && now - quarantined_at >= self.config.min_quarantine()
    }

    /// Run one lifecycle step for a component.
    ///
    /// Quarantining an already quarantined component is a no-op, so
    /// repeated evaluation never creates a second record.
    pub fn evaluate(
        &self,
        component_id: &str,
        signals: &PruneSignals,
        now: DateTime<Utc>,
    ) -> Result<PruneTransition> {
        let mut records = self.records.write().map_err(CoreError::lock)?;

        match records.entry(component_id.to_string()) {
            Entry::Occupied(entry) => {
                let since = entry.get().quarantined_at;
                if self.can_restore(signals.debt_score, signals.health_score, since, now) {
                    let record = entry.remove();
                    tracing::info!(
                        component_id = %component_id,
                        quarantined_for_secs = (now - since).num_seconds(),
                        "Component restored from quarantine"
                    );
                    Ok(PruneTransition::Restored { record })
                } else {
                    Ok(PruneTransition::Unchanged {
                        state: ComponentState::Quarantined,
                    })
                }
            }
            Entry::Vacant(slot) => {
                let reasons = self.prune_reasons(signals);
                if reasons.is_empty() {
                    return Ok(PruneTransition::Unchanged {
                        state: ComponentState::Active,
                    });
                }
                let record = QuarantineRecord {
                    component_id: component_id.to_string(),
                    reason: reasons.join("; "),
                    quarantined_at: now,
                    debt_score_at_quarantine: signals.debt_score,
                    health_at_quarantine: signals.health_score,
                };
                tracing::info!(
                    component_id = %component_id,
                    reason = %record.reason,
                    "Component quarantined"
                );
                slot.insert(record.clone());
                Ok(PruneTransition::Quarantined { record })
            }
        }
    }

    pub fn record(&self, component_id: &str) -> Result<Option<QuarantineRecord>> {
        let records = self.records.read().map_err(CoreError::lock)?;
        Ok(records.get(component_id).cloned())
    }

    pub fn is_quarantined(&self, component_id: &str) -> Result<bool> {
        let records = self.records.read().map_err(CoreError::lock)?;
        Ok(records.contains_key(component_id))
    }

    /// Drop a record without checking restore conditions
    pub fn remove(&self, component_id: &str) -> Result<Option<QuarantineRecord>> {
        let mut records = self.records.write().map_err(CoreError::lock)?;
        Ok(records.remove(component_id))
    }

    pub fn active_records(&self) -> Result<Vec<QuarantineRecord>> {
        let records = self.records.read().map_err(CoreError::lock)?;
        let mut active: Vec<_> = records.values().cloned().collect();
        active.sort_by(|a, b| a.component_id.cmp(&b.component_id));
        Ok(active)
    }

    pub fn quarantined_count(&self) -> Result<usize> {
        let records = self.records.read().map_err(CoreError::lock)?;
        Ok(records.len())
    }
}

fn health(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}
