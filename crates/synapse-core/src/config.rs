//! Mitigation engine configuration
//!
//! Every threshold the engine uses lives here with a documented default.
//! Configuration is read once at startup and validated eagerly: anything
//! that would only fail later at evaluation time is rejected by
//! [`MitigationConfig::validate`].
//!
//! # Example
//!
//! ```rust
//! use synapse_core::config::MitigationConfig;
//!
//! let config = MitigationConfig::from_yaml_str(
//!     "bands:\n  healthy: 2.0\n  warning: 4.0\n  critical: 6.0\n  quarantine: 9.0\n",
//! )
//! .unwrap();
//! assert_eq!(config.bands.warning, 4.0);
//! assert_eq!(config.balance.window, 10);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::gates::PolicyGateSpec;

/// Debt score band boundaries
///
/// `healthy` and `warning` drive the severity classifier, all four anchor
/// the debt brake curve, and `quarantine` is the hard pruning trigger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityBands {
    /// Scores below this are healthy (default 3.0)
    pub healthy: f64,
    /// Scores up to and including this are a warning (default 5.0)
    pub warning: f64,
    /// Brake curve anchor between the warning and quarantine bands (default 7.0)
    pub critical: f64,
    /// Scores at or above this quarantine the component (default 10.0)
    pub quarantine: f64,
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            healthy: 3.0,
            warning: 5.0,
            critical: 7.0,
            quarantine: 10.0,
        }
    }
}

impl SeverityBands {
    fn validate(&self) -> Result<()> {
        let bounds = [self.healthy, self.warning, self.critical, self.quarantine];
        if bounds.iter().any(|b| !b.is_finite() || *b <= 0.0) {
            return Err(CoreError::config(
                "severity bands must be finite and positive",
            ));
        }
        if !bounds.windows(2).all(|w| w[0] < w[1]) {
            return Err(CoreError::config(format!(
                "severity bands must be strictly increasing, got {:?}",
                bounds
            )));
        }
        Ok(())
    }
}

/// Hardware/software balance estimation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Smoothed imbalance magnitude that triggers an action
    pub imbalance_threshold: f64,
    /// Moving-average window; history holds twice this many samples
    pub window: usize,
    /// Throughput treated as full software demand
    pub target_throughput: f64,
    pub warning_temp_c: f64,
    pub critical_temp_c: f64,
    pub warning_latency_ms: f64,
    pub critical_latency_ms: f64,
    /// Lowest throttle a balance decision may request
    pub min_throttle: f64,
    /// Largest single throttle cut
    pub max_throttle_step: f64,
    /// Largest single throttle boost
    pub max_boost: f64,
    /// Controller adjustments at or below this are ignored
    pub controller_deadband: f64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            imbalance_threshold: 0.3,
            window: 10,
            target_throughput: 1000.0,
            warning_temp_c: 70.0,
            critical_temp_c: 85.0,
            warning_latency_ms: 100.0,
            critical_latency_ms: 500.0,
            min_throttle: 0.2,
            max_throttle_step: 0.5,
            max_boost: 0.3,
            controller_deadband: 0.05,
        }
    }
}

impl BalanceConfig {
    fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(CoreError::config("balance window must be at least 1"));
        }
        if !(self.imbalance_threshold > 0.0 && self.imbalance_threshold <= 1.0) {
            return Err(CoreError::config(format!(
                "imbalance threshold must be in (0, 1], got {}",
                self.imbalance_threshold
            )));
        }
        if !(self.target_throughput.is_finite() && self.target_throughput > 0.0) {
            return Err(CoreError::config("target throughput must be positive"));
        }
        if !(self.warning_temp_c < self.critical_temp_c) {
            return Err(CoreError::config(
                "warning temperature must be below critical temperature",
            ));
        }
        if !(self.warning_latency_ms > 0.0 && self.warning_latency_ms < self.critical_latency_ms)
        {
            return Err(CoreError::config(
                "warning latency must be positive and below critical latency",
            ));
        }
        for (name, value) in [
            ("min_throttle", self.min_throttle),
            ("max_throttle_step", self.max_throttle_step),
            ("max_boost", self.max_boost),
            ("controller_deadband", self.controller_deadband),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CoreError::config(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Feedback controller gains and limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Set-point for the measured quantity (CPU usage percent by default)
    pub target: f64,
    /// Anti-windup clamp applied to the running integral
    pub integral_limit: f64,
    /// Bound on a single adjustment
    pub output_limit: f64,
    /// Raw output is divided by this before clamping
    pub output_scale: f64,
    /// Floor for throttles derived from controller adjustments
    pub min_throttle: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kp: 0.5,
            ki: 0.1,
            kd: 0.05,
            target: 70.0,
            integral_limit: 50.0,
            output_limit: 0.3,
            output_scale: 100.0,
            min_throttle: 0.1,
        }
    }
}

impl ControllerConfig {
    fn validate(&self) -> Result<()> {
        if [self.kp, self.ki, self.kd, self.target]
            .iter()
            .any(|v| !v.is_finite())
        {
            return Err(CoreError::config("controller gains must be finite"));
        }
        if !(self.integral_limit > 0.0 && self.output_limit > 0.0 && self.output_scale > 0.0) {
            return Err(CoreError::config(
                "controller limits and scale must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_throttle) {
            return Err(CoreError::config("controller min_throttle must be in [0, 1]"));
        }
        Ok(())
    }
}

/// Quarantine and restore thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningConfig {
    /// Error rate at or above which a component is pruned
    pub error_rate_limit: f64,
    /// Temperature at or above which a component is pruned
    pub shutdown_temp_c: f64,
    /// Health below this prunes the component
    pub min_health: f64,
    /// Health required before a restore
    pub restore_health: f64,
    /// Minimum time spent in quarantine, in seconds
    pub min_quarantine_secs: i64,
    /// Throttle a restored component restarts at
    pub restore_throttle: f64,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            error_rate_limit: 0.05,
            shutdown_temp_c: 95.0,
            min_health: 20.0,
            restore_health: 70.0,
            min_quarantine_secs: 3600,
            restore_throttle: 0.5,
        }
    }
}

impl PruningConfig {
    /// Minimum quarantine duration
    pub fn min_quarantine(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_quarantine_secs)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.error_rate_limit) {
            return Err(CoreError::config("error_rate_limit must be in [0, 1]"));
        }
        if !(0.0..=100.0).contains(&self.min_health) || !(0.0..=100.0).contains(&self.restore_health)
        {
            return Err(CoreError::config("health thresholds must be in [0, 100]"));
        }
        if self.min_health > self.restore_health {
            return Err(CoreError::config(
                "min_health must not exceed restore_health",
            ));
        }
        if self.min_quarantine_secs < 0 {
            return Err(CoreError::config("min_quarantine_secs must not be negative"));
        }
        if !(0.0..=1.0).contains(&self.restore_throttle) {
            return Err(CoreError::config("restore_throttle must be in [0, 1]"));
        }
        Ok(())
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MitigationConfig {
    pub bands: SeverityBands,
    pub balance: BalanceConfig,
    pub controller: ControllerConfig,
    pub pruning: PruningConfig,
    pub gates: Vec<PolicyGateSpec>,
}

impl MitigationConfig {
    /// Validate every section, returning the first problem found
    pub fn validate(&self) -> Result<()> {
        self.bands.validate()?;
        self.balance.validate()?;
        self.controller.validate()?;
        self.pruning.validate()?;
        validate_gates(&self.gates)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, choosing the format by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(CoreError::config(format!(
                "unsupported config format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }
}

/// Check a gate catalogue for duplicate ids and unusable definitions
pub fn validate_gates(gates: &[PolicyGateSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for gate in gates {
        if gate.id.trim().is_empty() {
            return Err(CoreError::config("gate id must not be empty"));
        }
        if !seen.insert(gate.id.as_str()) {
            return Err(CoreError::config(format!("duplicate gate id: {}", gate.id)));
        }
        if gate.metric_key.trim().is_empty() {
            return Err(CoreError::config(format!(
                "gate {} has an empty metric key",
                gate.id
            )));
        }
        if let Some(threshold) = gate.threshold {
            if !threshold.is_finite() {
                return Err(CoreError::config(format!(
                    "gate {} has a non-finite threshold",
                    gate.id
                )));
            }
        }
    }
    Ok(())
}
