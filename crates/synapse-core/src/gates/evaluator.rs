//! Policy gate evaluator with audit trail
//!
//! Metric values come from resolvers registered per metric key when the
//! evaluator is built. Resolvers run outside the ledger lock; the cached
//! last result and the audit entry for an evaluation are then written
//! under one write lock so readers always see both or neither.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use super::{evaluate_gate, EnforcementPoint, PolicyGateResult, PolicyGateSpec};
use crate::config::validate_gates;
use crate::error::{CoreError, Result};

/// Audit entries kept before the oldest are dropped
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

/// What an evaluation is about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
}

impl GateScope {
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Default::default()
        }
    }

    pub fn component(component_id: impl Into<String>) -> Self {
        Self {
            component_id: Some(component_id.into()),
            ..Default::default()
        }
    }

    pub fn with_commit(mut self, commit_hash: impl Into<String>) -> Self {
        self.commit_hash = Some(commit_hash.into());
        self
    }
}

/// Supplies the current value of one metric, or `None` if unavailable
pub trait MetricResolver: Send + Sync {
    fn resolve(&self, scope: &GateScope) -> Option<f64>;
}

impl<F> MetricResolver for F
where
    F: Fn(&GateScope) -> Option<f64> + Send + Sync,
{
    fn resolve(&self, scope: &GateScope) -> Option<f64> {
        self(scope)
    }
}

/// Cached view of a gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateStatus {
    pub gate: PolicyGateSpec,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_passed: Option<bool>,
}

/// Outcome of consulting an enforcement point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub enforcement_point: EnforcementPoint,
    pub allowed: bool,
    pub results: Vec<PolicyGateResult>,
    /// Failed gates with blocking actions
    pub blocking_failures: Vec<String>,
    /// Failed gates with non-blocking actions
    pub warnings: Vec<String>,
    /// Gates with no resolvable value this cycle
    pub skipped: Vec<String>,
}

#[derive(Debug)]
struct GateEntry {
    spec: PolicyGateSpec,
    last_checked_at: Option<DateTime<Utc>>,
    last_passed: Option<bool>,
}

impl GateEntry {
    fn status(&self) -> GateStatus {
        GateStatus {
            gate: self.spec.clone(),
            last_checked_at: self.last_checked_at,
            last_passed: self.last_passed,
        }
    }
}

#[derive(Debug, Default)]
struct GateLedger {
    entries: Vec<GateEntry>,
    index: HashMap<String, usize>,
    audit: VecDeque<PolicyGateResult>,
    audit_capacity: usize,
}

impl GateLedger {
    fn entry(&self, gate_id: &str) -> Result<&GateEntry> {
        self.index
            .get(gate_id)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| CoreError::unknown_gate(gate_id))
    }

    fn entry_mut(&mut self, gate_id: &str) -> Result<&mut GateEntry> {
        match self.index.get(gate_id) {
            Some(&i) => Ok(&mut self.entries[i]),
            None => Err(CoreError::unknown_gate(gate_id)),
        }
    }

    fn record(&mut self, result: PolicyGateResult) -> Result<()> {
        let entry = self.entry_mut(&result.gate_id)?;
        entry.last_checked_at = Some(result.evaluated_at);
        entry.last_passed = Some(result.passed);
        while self.audit.len() >= self.audit_capacity.max(1) {
            self.audit.pop_front();
        }
        self.audit.push_back(result);
        Ok(())
    }
}

/// Builder validating the gate catalogue before use
#[derive(Default)]
pub struct PolicyGateEvaluatorBuilder {
    gates: Vec<PolicyGateSpec>,
    resolvers: HashMap<String, Arc<dyn MetricResolver>>,
    audit_capacity: Option<usize>,
}

impl PolicyGateEvaluatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate(mut self, gate: PolicyGateSpec) -> Self {
        self.gates.push(gate);
        self
    }

    pub fn gates(mut self, gates: impl IntoIterator<Item = PolicyGateSpec>) -> Self {
        self.gates.extend(gates);
        self
    }

    /// Register the resolver for a metric key, replacing any previous one
    pub fn resolver(mut self, metric_key: impl Into<String>, resolver: impl MetricResolver + 'static) -> Self {
        self.resolvers.insert(metric_key.into(), Arc::new(resolver));
        self
    }

    /// Cap the audit trail; the oldest entries are dropped first
    pub fn audit_capacity(mut self, capacity: usize) -> Self {
        self.audit_capacity = Some(capacity);
        self
    }

    pub fn build(self) -> Result<PolicyGateEvaluator> {
        validate_gates(&self.gates)?;
        let audit_capacity = self.audit_capacity.unwrap_or(DEFAULT_AUDIT_CAPACITY);
        if audit_capacity == 0 {
            return Err(CoreError::config("audit capacity must be at least 1"));
        }

        let mut ledger = GateLedger {
            audit_capacity,
            ..GateLedger::default()
        };
        for spec in self.gates {
            ledger.index.insert(spec.id.clone(), ledger.entries.len());
            ledger.entries.push(GateEntry {
                spec,
                last_checked_at: None,
                last_passed: None,
            });
        }

        Ok(PolicyGateEvaluator {
            ledger: RwLock::new(ledger),
            resolvers: self.resolvers,
        })
    }
}

/// Evaluates gates, caches last results and keeps the audit trail
pub struct PolicyGateEvaluator {
    ledger: RwLock<GateLedger>,
    resolvers: HashMap<String, Arc<dyn MetricResolver>>,
}

impl std::fmt::Debug for PolicyGateEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyGateEvaluator")
            .field("ledger", &self.ledger)
            .field("resolvers", &self.resolvers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PolicyGateEvaluator {
    pub fn builder() -> PolicyGateEvaluatorBuilder {
        PolicyGateEvaluatorBuilder::new()
    }

    pub fn has_resolver(&self, metric_key: &str) -> bool {
        self.resolvers.contains_key(metric_key)
    }

    /// Evaluate one gate against a supplied value
    pub fn evaluate(&self, gate_id: &str, actual: f64) -> Result<PolicyGateResult> {
        self.evaluate_at(gate_id, actual, Utc::now())
    }

    pub fn evaluate_at(
        &self,
        gate_id: &str,
        actual: f64,
        now: DateTime<Utc>,
    ) -> Result<PolicyGateResult> {
        let mut ledger = self.ledger.write().map_err(CoreError::lock)?;
        let result = evaluate_gate(&ledger.entry(gate_id)?.spec, actual, now);
        ledger.record(result.clone())?;
        drop(ledger);

        tracing::debug!(
            gate_id = %gate_id,
            passed = result.passed,
            actual = actual,
            "Policy gate evaluated"
        );
        Ok(result)
    }

    /// Evaluate every enabled gate that covers the scope's project.
    ///
    /// Gates whose metric cannot be resolved produce no result.
    pub fn evaluate_all(&self, scope: &GateScope) -> Result<Vec<PolicyGateResult>> {
        let candidates = self.candidates(scope, None)?;
        let (results, _) = self.run(candidates, scope)?;
        Ok(results)
    }

    /// Consult every applicable gate for an enforcement point
    pub fn check(&self, point: EnforcementPoint, scope: &GateScope) -> Result<GateVerdict> {
        let candidates = self.candidates(scope, Some(point))?;
        let blocking: HashMap<String, bool> = candidates
            .iter()
            .map(|g| (g.id.clone(), g.is_blocking()))
            .collect();

        let (results, skipped) = self.run(candidates, scope)?;

        let mut blocking_failures = Vec::new();
        let mut warnings = Vec::new();
        for result in results.iter().filter(|r| !r.passed) {
            if blocking.get(&result.gate_id).copied().unwrap_or(false) {
                tracing::warn!(
                    gate_id = %result.gate_id,
                    enforcement_point = point.as_str(),
                    message = %result.message,
                    "Blocking policy gate failed"
                );
                blocking_failures.push(result.gate_id.clone());
            } else {
                warnings.push(result.gate_id.clone());
            }
        }

        Ok(GateVerdict {
            enforcement_point: point,
            allowed: blocking_failures.is_empty(),
            results,
            blocking_failures,
            warnings,
            skipped,
        })
    }

    /// False when any applicable blocking gate fails
    pub fn can_proceed(&self, point: EnforcementPoint, scope: &GateScope) -> Result<bool> {
        Ok(self.check(point, scope)?.allowed)
    }

    pub fn can_proceed_with_commit(&self, project_id: &str, commit_hash: &str) -> Result<bool> {
        let scope = GateScope::project(project_id).with_commit(commit_hash);
        self.can_proceed(EnforcementPoint::PreCommit, &scope)
    }

    pub fn can_proceed_with_deployment(&self, project_id: &str) -> Result<bool> {
        self.can_proceed(EnforcementPoint::Deployment, &GateScope::project(project_id))
    }

    pub fn status(&self, gate_id: &str) -> Result<GateStatus> {
        let ledger = self.ledger.read().map_err(CoreError::lock)?;
        Ok(ledger.entry(gate_id)?.status())
    }

    pub fn statuses(&self) -> Result<Vec<GateStatus>> {
        let ledger = self.ledger.read().map_err(CoreError::lock)?;
        Ok(ledger.entries.iter().map(GateEntry::status).collect())
    }

    pub fn gates(&self) -> Result<Vec<PolicyGateSpec>> {
        let ledger = self.ledger.read().map_err(CoreError::lock)?;
        Ok(ledger.entries.iter().map(|e| e.spec.clone()).collect())
    }

    /// Audit entries in evaluation order, optionally for one gate
    pub fn audit_trail(&self, gate_id: Option<&str>) -> Result<Vec<PolicyGateResult>> {
        let ledger = self.ledger.read().map_err(CoreError::lock)?;
        if let Some(id) = gate_id {
            ledger.entry(id)?;
        }
        Ok(ledger
            .audit
            .iter()
            .filter(|r| gate_id.map_or(true, |id| r.gate_id == id))
            .cloned()
            .collect())
    }

    pub fn set_enabled(&self, gate_id: &str, enabled: bool) -> Result<()> {
        let mut ledger = self.ledger.write().map_err(CoreError::lock)?;
        ledger.entry_mut(gate_id)?.spec.enabled = enabled;
        tracing::info!(gate_id = %gate_id, enabled, "Policy gate toggled");
        Ok(())
    }

    fn candidates(
        &self,
        scope: &GateScope,
        point: Option<EnforcementPoint>,
    ) -> Result<Vec<PolicyGateSpec>> {
        let ledger = self.ledger.read().map_err(CoreError::lock)?;
        Ok(ledger
            .entries
            .iter()
            .map(|e| &e.spec)
            .filter(|g| g.enabled)
            .filter(|g| g.covers_project(scope.project_id.as_deref()))
            .filter(|g| point.map_or(true, |p| g.applies_to(p)))
            .cloned()
            .collect())
    }

    // Resolve outside the lock, then record each result atomically.
    fn run(
        &self,
        gates: Vec<PolicyGateSpec>,
        scope: &GateScope,
    ) -> Result<(Vec<PolicyGateResult>, Vec<String>)> {
        let mut resolved = Vec::with_capacity(gates.len());
        let mut skipped = Vec::new();
        for gate in gates {
            let value = self
                .resolvers
                .get(&gate.metric_key)
                .and_then(|r| r.resolve(scope))
                .filter(|v| v.is_finite());
            match value {
                Some(v) => resolved.push((gate, v)),
                None => {
                    tracing::debug!(
                        gate_id = %gate.id,
                        metric_key = %gate.metric_key,
                        "Skipping gate with no resolvable value"
                    );
                    skipped.push(gate.id);
                }
            }
        }

        let now = Utc::now();
        let mut results = Vec::with_capacity(resolved.len());
        let mut ledger = self.ledger.write().map_err(CoreError::lock)?;
        for (gate, value) in resolved {
            let result = evaluate_gate(&gate, value, now);
            ledger.record(result.clone())?;
            results.push(result);
        }
        Ok((results, skipped))
    }
}
