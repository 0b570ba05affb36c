//! Mitigation decisions handed to downstream dispatchers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::debt::Severity;

/// Action recommended for a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MitigationAction {
    None,
    Throttle,
    Brake,
    Quarantine,
    Rebalance,
    Alert,
    AutoIntegrate,
}

impl MitigationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Throttle => "throttle",
            Self::Brake => "brake",
            Self::Quarantine => "quarantine",
            Self::Rebalance => "rebalance",
            Self::Alert => "alert",
            Self::AutoIntegrate => "auto_integrate",
        }
    }

    /// Whether downstream consumers need to act on this decision
    pub fn is_actionable(&self) -> bool {
        match self {
            Self::None => false,
            Self::Throttle
            | Self::Brake
            | Self::Quarantine
            | Self::Rebalance
            | Self::Alert
            | Self::AutoIntegrate => true,
        }
    }

    /// Action implied by a debt severity band
    pub fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::Healthy => Self::None,
            Severity::Warning => Self::Throttle,
            Severity::Critical => Self::Brake,
            Severity::Quarantine => Self::Quarantine,
        }
    }
}

impl std::fmt::Display for MitigationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One evaluation outcome for one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationDecision {
    pub action: MitigationAction,
    pub component_id: String,
    pub reason: String,
    /// Always within [0, 1]
    pub throttle_level: f64,
    pub debt_score: f64,
    /// Always within [-1, 1]
    pub imbalance: f64,
    pub timestamp: DateTime<Utc>,
}

impl MitigationDecision {
    pub fn new(
        action: MitigationAction,
        component_id: impl Into<String>,
        reason: impl Into<String>,
        throttle_level: f64,
    ) -> Self {
        Self {
            action,
            component_id: component_id.into(),
            reason: reason.into(),
            throttle_level: clamp_unit(throttle_level),
            debt_score: 0.0,
            imbalance: 0.0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_debt_score(mut self, debt_score: f64) -> Self {
        self.debt_score = if debt_score.is_finite() {
            debt_score.max(0.0)
        } else {
            0.0
        };
        self
    }

    pub fn with_imbalance(mut self, imbalance: f64) -> Self {
        self.imbalance = if imbalance.is_finite() {
            imbalance.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn summary(&self) -> String {
        format!(
            "[{}] {} throttle={:.2} debt={:.2} imbalance={:+.3}: {}",
            self.component_id,
            self.action,
            self.throttle_level,
            self.debt_score,
            self.imbalance,
            self.reason
        )
    }
}

/// Clamp into [0, 1], mapping NaN to 0
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
