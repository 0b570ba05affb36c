//! Integration Health Agent Contracts
//!
//! Request and response shapes of the agent's HTTP surface, plus the
//! mitigation signal emitted downstream.

mod decision_event;

pub use decision_event::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use synapse_core::{GateVerdict, LockDecision};

/// Replace the integration facts of a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateDebtRequest {
    #[serde(default)]
    pub days_since_integration: i64,
    #[serde(default)]
    pub lines_changed: i64,
    #[serde(default = "default_dependencies")]
    pub dependency_count: i64,
}

fn default_dependencies() -> i64 {
    1
}

/// Replace the external health signal of a component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdateHealthRequest {
    /// 0-100
    pub health_score: f64,
}

/// Acknowledgement of a removal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRemoved {
    pub component_id: String,
}

/// Metric values reported by an external pipeline
///
/// Values without a project apply to every project that has not reported
/// its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub metrics: HashMap<String, f64>,
}

impl MetricReport {
    pub fn new(project_id: Option<String>) -> Self {
        Self {
            project_id,
            metrics: HashMap::new(),
        }
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricReportAck {
    pub accepted: usize,
    pub rejected: usize,
}

/// Evaluate one gate against a supplied value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluateGateRequest {
    pub actual_value: f64,
}

/// Pre-commit check for a project, optionally tied to one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitCheckRequest {
    pub project_id: String,
    pub commit_hash: String,
    /// Commit message, used for the integration lock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Component the commit touches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
}

impl CommitCheckRequest {
    pub fn new(project_id: impl Into<String>, commit_hash: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            commit_hash: commit_hash.into(),
            message: None,
            component_id: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn touching(mut self, component_id: impl Into<String>) -> Self {
        self.component_id = Some(component_id.into());
        self
    }
}

/// Both the gate verdict and the integration lock must allow the commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitCheckResponse {
    pub allowed: bool,
    pub verdict: GateVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<LockDecision>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentCheckRequest {
    pub project_id: String,
}
