//! Integration health engine
//!
//! Wires the mitigation engine to the policy gate evaluator. Gate metrics
//! about components (`debt_score`, `throttle_level`, `health_score`,
//! `quarantined_components`) are read from the mitigation engine; every
//! other metric key is served from values reported by external pipelines.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use synapse_core::gates::templates::default_gates;
use synapse_core::{
    CommitAnalyzer, ComponentSnapshot, ComponentState, CoreError, EnforcementPoint, GateScope,
    GateVerdict, LockLevel, MitigationConfig, MitigationEngine, PolicyGateEvaluator,
    PolicyGateSpec, Result,
};

use crate::contracts::{CommitCheckRequest, CommitCheckResponse, MetricReport, MetricReportAck};

/// Metric keys resolved from the mitigation engine
pub const ENGINE_METRICS: [&str; 4] = [
    "debt_score",
    "throttle_level",
    "health_score",
    "quarantined_components",
];

/// Latest externally reported metric values, per project
#[derive(Debug, Default)]
pub struct MetricStore {
    // `None` holds values reported without a project
    values: RwLock<HashMap<Option<String>, HashMap<String, f64>>>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store finite values from a report; returns (accepted, rejected)
    pub fn record(&self, report: &MetricReport) -> Result<MetricReportAck> {
        let mut values = self.values.write().map_err(CoreError::lock)?;
        let scope = values.entry(report.project_id.clone()).or_default();
        let mut ack = MetricReportAck {
            accepted: 0,
            rejected: 0,
        };
        for (key, value) in &report.metrics {
            if value.is_finite() && !key.trim().is_empty() {
                scope.insert(key.clone(), *value);
                ack.accepted += 1;
            } else {
                ack.rejected += 1;
            }
        }
        Ok(ack)
    }

    /// Project value first, then the unscoped value
    pub fn get(&self, project_id: Option<&str>, key: &str) -> Option<f64> {
        let values = self.values.read().ok()?;
        project_id
            .and_then(|p| values.get(&Some(p.to_string())))
            .and_then(|m| m.get(key))
            .or_else(|| values.get(&None).and_then(|m| m.get(key)))
            .copied()
    }
}

/// Mitigation engine plus policy gates
pub struct IntegrationHealthEngine {
    mitigation: Arc<MitigationEngine>,
    gates: PolicyGateEvaluator,
    metrics: Arc<MetricStore>,
}

impl IntegrationHealthEngine {
    /// Build from configuration; an empty gate list falls back to the
    /// default catalogue.
    pub fn new(config: MitigationConfig) -> Result<Self> {
        let catalogue: Vec<PolicyGateSpec> = if config.gates.is_empty() {
            default_gates()
        } else {
            config.gates.clone()
        };

        let mitigation = Arc::new(MitigationEngine::new(config)?);
        let metrics = Arc::new(MetricStore::new());

        let mut builder = PolicyGateEvaluator::builder().gates(catalogue.clone());

        let m = Arc::clone(&mitigation);
        builder = builder.resolver("debt_score", move |scope: &GateScope| {
            if let Some(id) = &scope.component_id {
                return m.debt_score(id).ok().map(|d| d.value);
            }
            let project = scope.project_id.as_deref()?;
            m.project_debt(project).ok().flatten()
        });

        let m = Arc::clone(&mitigation);
        builder = builder.resolver("throttle_level", move |scope: &GateScope| {
            scoped_min(&m, scope, |s| s.throttle_level)
        });

        let m = Arc::clone(&mitigation);
        builder = builder.resolver("health_score", move |scope: &GateScope| {
            scoped_min(&m, scope, |s| s.health_score)
        });

        let m = Arc::clone(&mitigation);
        builder = builder.resolver("quarantined_components", move |scope: &GateScope| {
            let snapshots = m.snapshots().ok()?;
            let count = snapshots
                .iter()
                .filter(|s| in_scope(s, scope))
                .filter(|s| s.state == ComponentState::Quarantined)
                .count();
            Some(count as f64)
        });

        let mut external: Vec<&str> = catalogue
            .iter()
            .map(|g| g.metric_key.as_str())
            .filter(|k| !ENGINE_METRICS.contains(k))
            .collect();
        external.sort_unstable();
        external.dedup();
        for key in external {
            let store = Arc::clone(&metrics);
            let metric_key = key.to_string();
            builder = builder.resolver(key, move |scope: &GateScope| {
                store.get(scope.project_id.as_deref(), &metric_key)
            });
        }

        Ok(Self {
            mitigation,
            gates: builder.build()?,
            metrics,
        })
    }

    pub fn mitigation(&self) -> &Arc<MitigationEngine> {
        &self.mitigation
    }

    pub fn gates(&self) -> &PolicyGateEvaluator {
        &self.gates
    }

    pub fn metric_store(&self) -> &MetricStore {
        &self.metrics
    }

    pub fn report_metrics(&self, report: &MetricReport) -> Result<MetricReportAck> {
        let ack = self.metrics.record(report)?;
        tracing::debug!(
            project_id = ?report.project_id,
            accepted = ack.accepted,
            rejected = ack.rejected,
            "Metrics reported"
        );
        Ok(ack)
    }

    /// Pre-commit gates plus, for a named component, the integration lock
    pub fn check_commit(&self, request: &CommitCheckRequest) -> Result<CommitCheckResponse> {
        let scope = GateScope {
            project_id: Some(request.project_id.clone()),
            component_id: None,
            commit_hash: Some(request.commit_hash.clone()),
        };
        let verdict = self.gates.check(EnforcementPoint::PreCommit, &scope)?;

        let lock = match &request.component_id {
            Some(component_id) => {
                let debt = self.mitigation.debt_score(component_id)?;
                let level = LockLevel::from_debt(debt.value, &self.mitigation.config().bands);
                let message = request.message.as_deref().unwrap_or_default();
                Some(CommitAnalyzer::analyze(message, level))
            }
            None => None,
        };

        let allowed = verdict.allowed && lock.as_ref().map_or(true, |l| l.allowed);
        if !allowed {
            tracing::info!(
                project_id = %request.project_id,
                commit_hash = %request.commit_hash,
                blocking = ?verdict.blocking_failures,
                lock_level = lock.as_ref().map(|l| l.lock_level.as_str()),
                "Commit refused"
            );
        }

        Ok(CommitCheckResponse {
            allowed,
            verdict,
            lock,
        })
    }

    pub fn check_deployment(&self, project_id: &str) -> Result<GateVerdict> {
        self.gates
            .check(EnforcementPoint::Deployment, &GateScope::project(project_id))
    }
}

fn in_scope(snapshot: &ComponentSnapshot, scope: &GateScope) -> bool {
    match (&scope.component_id, &scope.project_id) {
        (Some(id), _) => &snapshot.component_id == id,
        (None, Some(project)) => &snapshot.project_id == project,
        (None, None) => true,
    }
}

/// Lowest value over the components in scope; `None` when none match
fn scoped_min(
    engine: &MitigationEngine,
    scope: &GateScope,
    value: impl Fn(&ComponentSnapshot) -> f64,
) -> Option<f64> {
    engine
        .snapshots()
        .ok()?
        .iter()
        .filter(|s| in_scope(s, scope))
        .map(value)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
}
