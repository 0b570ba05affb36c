//! Policy gates
//!
//! A gate compares one named metric against a threshold. Gates run on their
//! own path, independent of the debt/throttle pipeline, and are consulted
//! by enforcement points such as pre-commit hooks and deployments.

mod evaluator;
pub mod templates;

pub use evaluator::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Absolute tolerance used by the `==` operator
pub const EQUALITY_TOLERANCE: f64 = 0.001;

// ---------------------------------------------------------------------------
// Gate vocabulary
// ---------------------------------------------------------------------------

/// Comparison operator, accepted in symbolic or named form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateOperator {
    #[serde(rename = "<", alias = "less_than")]
    LessThan,
    #[serde(rename = "<=", alias = "less_than_or_equal")]
    LessThanOrEqual,
    #[serde(rename = ">", alias = "greater_than")]
    GreaterThan,
    #[serde(rename = ">=", alias = "greater_than_or_equal")]
    GreaterThanOrEqual,
    #[serde(rename = "==", alias = "equals")]
    Equals,
}

impl GateOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::Equals => "==",
        }
    }

    /// `actual <op> threshold`; only `==` is tolerant
    pub fn apply(&self, actual: f64, threshold: f64) -> bool {
        match self {
            Self::LessThan => actual < threshold,
            Self::LessThanOrEqual => actual <= threshold,
            Self::GreaterThan => actual > threshold,
            Self::GreaterThanOrEqual => actual >= threshold,
            Self::Equals => (actual - threshold).abs() <= EQUALITY_TOLERANCE,
        }
    }
}

impl std::fmt::Display for GateOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Where a gate is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementPoint {
    PreCommit,
    #[serde(alias = "build")]
    BuildPipeline,
    PreMerge,
    #[serde(alias = "pre_deploy", alias = "deploy")]
    Deployment,
    Continuous,
    MetricOnly,
}

impl EnforcementPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreCommit => "pre_commit",
            Self::BuildPipeline => "build_pipeline",
            Self::PreMerge => "pre_merge",
            Self::Deployment => "deployment",
            Self::Continuous => "continuous",
            Self::MetricOnly => "metric_only",
        }
    }
}

impl std::str::FromStr for EnforcementPoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pre_commit" | "commit" => Ok(Self::PreCommit),
            "build_pipeline" | "build" => Ok(Self::BuildPipeline),
            "pre_merge" | "merge" => Ok(Self::PreMerge),
            "deployment" | "deploy" | "pre_deploy" => Ok(Self::Deployment),
            "continuous" => Ok(Self::Continuous),
            "metric_only" => Ok(Self::MetricOnly),
            other => Err(format!("unknown enforcement point: {}", other)),
        }
    }
}

/// What a failing gate does at its enforcement point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    RejectCommit,
    BlockMerge,
    FailBuild,
    BlockDeployment,
    Warn,
    NotifyOnly,
}

impl GateAction {
    /// Blocking actions veto the enforcement point when the gate fails
    pub fn is_blocking(&self) -> bool {
        match self {
            Self::RejectCommit | Self::BlockMerge | Self::FailBuild | Self::BlockDeployment => true,
            Self::Warn | Self::NotifyOnly => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateSeverity {
    Info,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCategory {
    Integration,
    Hardware,
    Firmware,
    Performance,
    #[default]
    Quality,
    Security,
    Reliability,
    Resources,
    Compliance,
    Schema,
    Size,
}

// ---------------------------------------------------------------------------
// Gate definition and result
// ---------------------------------------------------------------------------

/// Gate definition maintained by configuration management
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyGateSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: GateCategory,
    pub metric_key: String,
    pub operator: GateOperator,
    /// Absent threshold means the gate always passes
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub severity: GateSeverity,
    #[serde(default)]
    pub enforcement: BTreeSet<EnforcementPoint>,
    #[serde(default = "default_action")]
    pub action: GateAction,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Restricts the gate to one project; `None` applies everywhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

fn default_action() -> GateAction {
    GateAction::Warn
}

fn default_enabled() -> bool {
    true
}

impl PolicyGateSpec {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        metric_key: impl Into<String>,
        operator: GateOperator,
        threshold: Option<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: GateCategory::default(),
            metric_key: metric_key.into(),
            operator,
            threshold,
            unit: None,
            severity: GateSeverity::default(),
            enforcement: BTreeSet::new(),
            action: default_action(),
            enabled: true,
            project_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: GateCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_severity(mut self, severity: GateSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn enforced_at(mut self, points: impl IntoIterator<Item = EnforcementPoint>) -> Self {
        self.enforcement.extend(points);
        self
    }

    pub fn with_action(mut self, action: GateAction) -> Self {
        self.action = action;
        self
    }

    pub fn for_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn applies_to(&self, point: EnforcementPoint) -> bool {
        self.enforcement.contains(&point)
    }

    /// Whether the gate covers the given project
    pub fn covers_project(&self, project_id: Option<&str>) -> bool {
        match (&self.project_id, project_id) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(own), Some(requested)) => own == requested,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.action.is_blocking()
    }

    fn format_value(&self, value: f64) -> String {
        match &self.unit {
            Some(unit) if !unit.is_empty() => format!("{} {}", value, unit),
            _ => format!("{}", value),
        }
    }
}

/// One evaluation of one gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyGateResult {
    pub gate_id: String,
    pub passed: bool,
    pub actual_value: f64,
    pub message: String,
    pub evaluated_at: DateTime<Utc>,
}

/// Evaluate a gate against a value without touching any ledger
pub fn evaluate_gate(spec: &PolicyGateSpec, actual: f64, now: DateTime<Utc>) -> PolicyGateResult {
    let (passed, message) = match spec.threshold {
        None => (
            true,
            format!(
                "{}: PASSED - no threshold configured (actual {})",
                spec.name,
                spec.format_value(actual)
            ),
        ),
        Some(threshold) => {
            let passed = spec.operator.apply(actual, threshold);
            let message = if passed {
                format!(
                    "{}: PASSED - {} {} {}",
                    spec.name,
                    spec.format_value(actual),
                    spec.operator,
                    spec.format_value(threshold)
                )
            } else {
                format!(
                    "{}: FAILED - expected {} {}, got {}",
                    spec.name,
                    spec.operator,
                    spec.format_value(threshold),
                    spec.format_value(actual)
                )
            };
            (passed, message)
        }
    };

    PolicyGateResult {
        gate_id: spec.id.clone(),
        passed,
        actual_value: actual,
        message,
        evaluated_at: now,
    }
}
