//! Starter gate catalogues
//!
//! `default_gates` covers the integration-health metrics the engine itself
//! produces. `flavor_gates` provides per-discipline starting points that
//! teams usually copy into their own catalogue file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    EnforcementPoint as Ep, GateAction, GateCategory, GateOperator as Op, GateSeverity,
    PolicyGateSpec,
};
use crate::config::validate_gates;
pub use crate::flavor::Flavor;
use crate::error::{CoreError, Result};

fn gate(id: &str, name: &str, metric: &str, op: Op, threshold: f64) -> PolicyGateSpec {
    PolicyGateSpec::new(id, name, metric, op, Some(threshold))
}

/// Gates over the engine's own metrics plus the usual merge hygiene
pub fn default_gates() -> Vec<PolicyGateSpec> {
    vec![
        gate("integration_debt", "Integration Debt", "debt_score", Op::LessThan, 7.0)
            .with_description("Integration debt must stay below the critical band")
            .with_category(GateCategory::Integration)
            .with_severity(GateSeverity::Critical)
            .enforced_at([Ep::PreCommit, Ep::PreMerge])
            .with_action(GateAction::RejectCommit),
        gate("no_quarantined_components", "Quarantined Components", "quarantined_components", Op::Equals, 0.0)
            .with_description("No component may be quarantined at deployment time")
            .with_category(GateCategory::Integration)
            .with_severity(GateSeverity::Critical)
            .enforced_at([Ep::Deployment])
            .with_action(GateAction::BlockDeployment),
        gate("throttle_floor", "Throttle Floor", "throttle_level", Op::GreaterThanOrEqual, 0.3)
            .with_description("Heavily throttled components deserve attention before release")
            .with_category(GateCategory::Performance)
            .with_severity(GateSeverity::Medium)
            .enforced_at([Ep::Deployment, Ep::Continuous])
            .with_action(GateAction::Warn),
        gate("component_health", "Component Health", "health_score", Op::GreaterThanOrEqual, 70.0)
            .with_unit("%")
            .with_category(GateCategory::Reliability)
            .with_severity(GateSeverity::High)
            .enforced_at([Ep::Deployment])
            .with_action(GateAction::BlockDeployment),
        gate("test_coverage", "Test Coverage", "coverage_percent", Op::GreaterThan, 80.0)
            .with_unit("%")
            .with_category(GateCategory::Quality)
            .with_severity(GateSeverity::High)
            .enforced_at([Ep::PreMerge])
            .with_action(GateAction::BlockMerge),
        gate("static_analysis", "Static Analysis", "critical_findings", Op::Equals, 0.0)
            .with_category(GateCategory::Quality)
            .with_severity(GateSeverity::Critical)
            .enforced_at([Ep::PreCommit, Ep::BuildPipeline])
            .with_action(GateAction::RejectCommit),
        gate("security_vulnerabilities", "Security Vulnerabilities", "critical_high_vulns", Op::Equals, 0.0)
            .with_category(GateCategory::Security)
            .with_severity(GateSeverity::Critical)
            .enforced_at([Ep::PreMerge, Ep::Deployment])
            .with_action(GateAction::BlockDeployment),
    ]
}

/// Discipline-specific starter catalogue
pub fn flavor_gates(flavor: Flavor) -> Vec<PolicyGateSpec> {
    match flavor {
        Flavor::Iot => vec![
            gate("power_budget", "Power Budget", "power_watts", Op::LessThan, 5.0)
                .with_unit("W")
                .with_category(GateCategory::Hardware)
                .with_severity(GateSeverity::Critical)
                .enforced_at([Ep::PreCommit, Ep::BuildPipeline])
                .with_action(GateAction::RejectCommit),
            gate("thermal_limit", "Thermal Limit", "temperature_celsius", Op::LessThan, 85.0)
                .with_unit("C")
                .with_category(GateCategory::Hardware)
                .with_severity(GateSeverity::Critical)
                .enforced_at([Ep::BuildPipeline, Ep::Deployment])
                .with_action(GateAction::BlockDeployment),
            gate("firmware_footprint", "Firmware Memory Footprint", "firmware_size_kb", Op::LessThan, 512.0)
                .with_unit("KB")
                .with_category(GateCategory::Firmware)
                .with_severity(GateSeverity::High)
                .enforced_at([Ep::BuildPipeline])
                .with_action(GateAction::FailBuild),
            gate("latency_threshold", "End-to-End Latency", "latency_ms", Op::LessThan, 100.0)
                .with_unit("ms")
                .with_category(GateCategory::Performance)
                .with_severity(GateSeverity::High)
                .enforced_at([Ep::BuildPipeline, Ep::Deployment])
                .with_action(GateAction::BlockDeployment),
        ],
        Flavor::Cloud => vec![
            gate("api_response_time", "API Response Time", "api_p99_ms", Op::LessThan, 200.0)
                .with_unit("ms")
                .with_category(GateCategory::Performance)
                .with_severity(GateSeverity::High)
                .enforced_at([Ep::Deployment])
                .with_action(GateAction::BlockDeployment),
            gate("api_error_rate", "API Error Rate", "error_rate_percent", Op::LessThan, 0.1)
                .with_unit("%")
                .with_category(GateCategory::Reliability)
                .with_severity(GateSeverity::Critical)
                .enforced_at([Ep::Deployment, Ep::Continuous])
                .with_action(GateAction::BlockDeployment),
            gate("bundle_size", "Bundle Size", "bundle_size_kb", Op::LessThan, 500.0)
                .with_unit("KB")
                .with_category(GateCategory::Size)
                .enforced_at([Ep::BuildPipeline])
                .with_action(GateAction::Warn),
        ],
        Flavor::Embedded => vec![
            gate("stack_usage", "Stack Usage", "stack_usage_percent", Op::LessThan, 80.0)
                .with_unit("%")
                .with_category(GateCategory::Resources)
                .with_severity(GateSeverity::Critical)
                .enforced_at([Ep::BuildPipeline])
                .with_action(GateAction::FailBuild),
            gate("rom_usage", "ROM Usage", "rom_usage_percent", Op::LessThan, 90.0)
                .with_unit("%")
                .with_category(GateCategory::Resources)
                .with_severity(GateSeverity::Critical)
                .enforced_at([Ep::BuildPipeline])
                .with_action(GateAction::FailBuild),
            gate("ram_usage", "RAM Usage", "ram_usage_percent", Op::LessThan, 85.0)
                .with_unit("%")
                .with_category(GateCategory::Resources)
                .with_severity(GateSeverity::Critical)
                .enforced_at([Ep::BuildPipeline])
                .with_action(GateAction::FailBuild),
        ],
        Flavor::Infra => vec![
            gate("terraform_validate", "Terraform Validate", "validate_errors", Op::Equals, 0.0)
                .with_category(GateCategory::Compliance)
                .with_severity(GateSeverity::Critical)
                .enforced_at([Ep::PreCommit])
                .with_action(GateAction::RejectCommit),
            gate("policy_violations", "Policy Violations", "policy_violations", Op::Equals, 0.0)
                .with_category(GateCategory::Compliance)
                .with_severity(GateSeverity::Critical)
                .enforced_at([Ep::PreMerge, Ep::Deployment])
                .with_action(GateAction::BlockDeployment),
        ],
        Flavor::Data => vec![
            gate("schema_validation", "Schema Validation", "schema_violations", Op::Equals, 0.0)
                .with_category(GateCategory::Schema)
                .with_severity(GateSeverity::Critical)
                .enforced_at([Ep::BuildPipeline])
                .with_action(GateAction::FailBuild),
            gate("breaking_changes", "Schema Evolution", "breaking_changes", Op::Equals, 0.0)
                .with_category(GateCategory::Schema)
                .with_severity(GateSeverity::Critical)
                .enforced_at([Ep::Deployment])
                .with_action(GateAction::BlockDeployment),
            gate("data_freshness", "Data Freshness", "data_age_minutes", Op::LessThan, 60.0)
                .with_unit("min")
                .with_category(GateCategory::Reliability)
                .with_severity(GateSeverity::High)
                .enforced_at([Ep::Continuous])
                .with_action(GateAction::NotifyOnly),
        ],
        Flavor::Mobile => vec![
            gate("android_apk_size", "Android APK Size", "apk_size_mb", Op::LessThan, 50.0)
                .with_unit("MB")
                .with_category(GateCategory::Size)
                .with_severity(GateSeverity::High)
                .enforced_at([Ep::BuildPipeline])
                .with_action(GateAction::FailBuild),
            gate("cold_start_time", "Cold Start Time", "cold_start_seconds", Op::LessThan, 2.0)
                .with_unit("s")
                .with_category(GateCategory::Performance)
                .with_severity(GateSeverity::High)
                .enforced_at([Ep::Deployment])
                .with_action(GateAction::BlockDeployment),
        ],
    }
}

/// Load a gate catalogue (a YAML, TOML or JSON list) and validate it
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Vec<PolicyGateSpec>> {
    #[derive(Deserialize)]
    struct Catalog {
        gates: Vec<PolicyGateSpec>,
    }

    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let gates = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str::<Vec<PolicyGateSpec>>(&content)
            .or_else(|_| serde_yaml::from_str::<Catalog>(&content).map(|c| c.gates))?,
        Some("json") => serde_json::from_str::<Vec<PolicyGateSpec>>(&content)
            .or_else(|_| serde_json::from_str::<Catalog>(&content).map(|c| c.gates))?,
        Some("toml") => toml::from_str::<Catalog>(&content)?.gates,
        other => {
            return Err(CoreError::config(format!(
                "unsupported catalogue format: {}",
                other.unwrap_or("<none>")
            )))
        }
    };
    validate_gates(&gates)?;
    Ok(gates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_catalogues_are_valid() {
        assert!(validate_gates(&default_gates()).is_ok());
        for flavor in [
            Flavor::Iot,
            Flavor::Cloud,
            Flavor::Embedded,
            Flavor::Infra,
            Flavor::Data,
            Flavor::Mobile,
        ] {
            let gates = flavor_gates(flavor);
            assert!(!gates.is_empty(), "{}", flavor.as_str());
            assert!(validate_gates(&gates).is_ok());
            assert!(gates.iter().all(|g| !g.enforcement.is_empty()));
        }
    }

    #[test]
    fn test_default_gates_cover_commit_and_deployment() {
        let gates = default_gates();
        assert!(gates
            .iter()
            .any(|g| g.applies_to(Ep::PreCommit) && g.is_blocking()));
        assert!(gates
            .iter()
            .any(|g| g.applies_to(Ep::Deployment) && g.is_blocking()));
    }

    #[test]
    fn test_load_yaml_list() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            "- id: p99\n  name: P99\n  metric_key: api_p99_ms\n  operator: '<'\n  threshold: 250\n  action: block_deployment\n  enforcement: [deployment]\n"
        )
        .unwrap();
        let gates = load_catalog(file.path()).unwrap();
        assert_eq!(gates.len(), 1);
        assert!(gates[0].is_blocking());
    }

    #[test]
    fn test_load_toml_table() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            "[[gates]]\nid = \"cov\"\nname = \"Coverage\"\nmetric_key = \"coverage_percent\"\noperator = \">=\"\nthreshold = 75.0\n"
        )
        .unwrap();
        let gates = load_catalog(file.path()).unwrap();
        assert_eq!(gates[0].operator, Op::GreaterThanOrEqual);
    }

    #[test]
    fn test_flavor_parse() {
        assert_eq!("IoT".parse::<Flavor>(), Ok(Flavor::Iot));
        assert!("desktop".parse::<Flavor>().is_err());
    }
}
