//! Per-component mitigation orchestration
//!
//! Each telemetry sample runs one evaluation cycle for its component:
//!
//! 1. score debt and run the debt brake
//! 2. run the quarantine lifecycle
//! 3. observe balance (skipped while quarantined)
//! 4. resolve the final throttle
//!
//! Components are tracked independently. Samples for one component are
//! serialized by its tracker lock; different components proceed in
//! parallel. Events are published after the tracker lock is released.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::balance::{BalanceEstimator, BalanceObservation, TelemetrySample};
use crate::brake::DebtBrake;
use crate::config::MitigationConfig;
use crate::debt::{DebtCalculator, DebtInputs, DebtScore};
use crate::error::{CoreError, Result};
use crate::events::{
    EventBus, EventChannel, EventPayload, MitigationEvent, SystemHealth, SystemStatus,
};
use crate::mitigation::{MitigationAction, MitigationDecision};
use crate::pruning::{
    ComponentState, PruneSignals, PruneTransition, PruningStateMachine, QuarantineRecord,
};
use crate::throttle::ThrottleResolver;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Hardware,
    #[default]
    Software,
    Firmware,
    Hybrid,
}

/// Enrolment request for a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRegistration {
    pub component_id: String,
    #[serde(default = "default_project")]
    pub project_id: String,
    #[serde(default)]
    pub kind: ComponentKind,
    #[serde(default)]
    pub days_since_integration: i64,
    #[serde(default)]
    pub lines_changed: i64,
    #[serde(default = "default_dependencies")]
    pub dependency_count: i64,
    #[serde(default = "default_health")]
    pub health_score: f64,
}

fn default_project() -> String {
    "default".to_string()
}

fn default_dependencies() -> i64 {
    1
}

fn default_health() -> f64 {
    100.0
}

impl ComponentRegistration {
    pub fn new(component_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            project_id: project_id.into(),
            kind: ComponentKind::default(),
            days_since_integration: 0,
            lines_changed: 0,
            dependency_count: default_dependencies(),
            health_score: default_health(),
        }
    }

    pub fn with_kind(mut self, kind: ComponentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_debt(mut self, days: i64, lines_changed: i64, dependency_count: i64) -> Self {
        self.days_since_integration = days;
        self.lines_changed = lines_changed;
        self.dependency_count = dependency_count;
        self
    }

    pub fn with_health(mut self, health_score: f64) -> Self {
        self.health_score = health_score;
        self
    }

    pub fn debt_inputs(&self) -> DebtInputs {
        DebtInputs::new(
            &self.component_id,
            self.days_since_integration,
            self.lines_changed,
            self.dependency_count,
        )
    }
}

/// Point-in-time view of a tracked component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    pub component_id: String,
    pub project_id: String,
    pub kind: ComponentKind,
    pub debt_inputs: DebtInputs,
    pub debt_score: DebtScore,
    pub health_score: f64,
    pub throttle_level: f64,
    pub state: ComponentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarantine: Option<QuarantineRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_decision: Option<MitigationDecision>,
    pub samples_processed: u64,
}

/// Everything one evaluation cycle produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub component_id: String,
    pub debt_score: DebtScore,
    pub brake: MitigationDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<BalanceObservation>,
    pub transition: PruneTransition,
    pub throttle_level: f64,
    pub quarantined: bool,
    /// Most severe decision of the cycle, carrying the final throttle
    pub decision: MitigationDecision,
    /// Actionable decisions raised during the cycle
    pub triggered: Vec<MitigationDecision>,
}

#[derive(Debug)]
struct ComponentTracker {
    project_id: String,
    kind: ComponentKind,
    debt_inputs: DebtInputs,
    health_score: f64,
    throttle: f64,
    estimator: BalanceEstimator,
    last_decision: Option<MitigationDecision>,
    samples_processed: u64,
    // set under the tracker lock when the component is removed
    retired: bool,
}

type TrackerRef = Arc<Mutex<ComponentTracker>>;

/// Orchestrates debt, balance, quarantine and throttle for all components
#[derive(Debug)]
pub struct MitigationEngine {
    config: MitigationConfig,
    calculator: DebtCalculator,
    brake: DebtBrake,
    pruning: PruningStateMachine,
    events: EventBus,
    components: RwLock<HashMap<String, TrackerRef>>,
}

impl MitigationEngine {
    /// Build an engine; the configuration is validated first
    pub fn new(config: MitigationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            calculator: DebtCalculator::new(config.bands),
            brake: DebtBrake::new(config.bands),
            pruning: PruningStateMachine::new(config.bands, config.pruning.clone()),
            events: EventBus::default(),
            components: RwLock::new(HashMap::new()),
            config,
        })
    }

    pub fn config(&self) -> &MitigationConfig {
        &self.config
    }

    pub fn calculator(&self) -> &DebtCalculator {
        &self.calculator
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<MitigationEvent> {
        self.events.subscribe()
    }

    /// Enrol a component, or replace the inputs of an enrolled one.
    ///
    /// Re-enrolment resets the component's feedback controller.
    pub fn register(&self, registration: ComponentRegistration) -> Result<ComponentSnapshot> {
        let id = registration.component_id.clone();
        if id.trim().is_empty() {
            return Err(CoreError::config("component id must not be empty"));
        }

        let tracker = {
            let mut components = self.components.write().map_err(CoreError::lock)?;
            match components.get(&id) {
                Some(existing) => {
                    let tracker = Arc::clone(existing);
                    {
                        let mut t = tracker.lock().map_err(CoreError::lock)?;
                        t.project_id = registration.project_id.clone();
                        t.kind = registration.kind;
                        t.debt_inputs = registration.debt_inputs();
                        t.health_score = clamp_health(registration.health_score);
                        t.estimator.reset_controller()?;
                    }
                    tracing::info!(component_id = %id, "Component re-enrolled");
                    tracker
                }
                None => {
                    let tracker = Arc::new(Mutex::new(ComponentTracker {
                        project_id: registration.project_id.clone(),
                        kind: registration.kind,
                        debt_inputs: registration.debt_inputs(),
                        health_score: clamp_health(registration.health_score),
                        throttle: 1.0,
                        estimator: BalanceEstimator::new(
                            self.config.balance.clone(),
                            self.config.controller.clone(),
                        ),
                        last_decision: None,
                        samples_processed: 0,
                        retired: false,
                    }));
                    components.insert(id.clone(), Arc::clone(&tracker));
                    tracing::info!(
                        component_id = %id,
                        project_id = %registration.project_id,
                        "Component enrolled"
                    );
                    tracker
                }
            }
        };

        let snapshot = self.snapshot_of(&id, &tracker)?;
        self.events.publish(MitigationEvent::new(
            EventChannel::DebtUpdate,
            EventPayload::Debt {
                component_id: id,
                score: snapshot.debt_score,
            },
        ));
        Ok(snapshot)
    }

    /// Stop tracking a component.
    ///
    /// The tracker is retired under its own lock, so an evaluation either
    /// completes before removal or fails with `UnknownComponent`.
    pub fn remove(&self, component_id: &str) -> Result<()> {
        // Lock order: components, tracker, pruning. Holding the registry
        // lock keeps a re-enrolment from slipping in before the record goes.
        let mut components = self.components.write().map_err(CoreError::lock)?;
        let tracker = components
            .remove(component_id)
            .ok_or_else(|| CoreError::unknown_component(component_id))?;
        {
            let mut t = tracker.lock().map_err(CoreError::lock)?;
            t.retired = true;
            self.pruning.remove(component_id)?;
        }
        drop(components);

        tracing::info!(component_id = %component_id, "Component removed");
        Ok(())
    }

    pub fn component_ids(&self) -> Result<Vec<String>> {
        let components = self.components.read().map_err(CoreError::lock)?;
        let mut ids: Vec<String> = components.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Replace the integration facts for a component
    pub fn update_debt_inputs(
        &self,
        component_id: &str,
        days_since_integration: i64,
        lines_changed: i64,
        dependency_count: i64,
    ) -> Result<DebtScore> {
        let score = self.with_tracker(component_id, |t| {
            t.debt_inputs = DebtInputs::new(
                component_id,
                days_since_integration,
                lines_changed,
                dependency_count,
            );
            Ok(self.calculator.score(&t.debt_inputs))
        })?;

        self.events.publish(MitigationEvent::new(
            EventChannel::DebtUpdate,
            EventPayload::Debt {
                component_id: component_id.to_string(),
                score,
            },
        ));
        Ok(score)
    }

    /// Replace the health signal (0-100) for a component
    pub fn update_health(&self, component_id: &str, health_score: f64) -> Result<()> {
        self.with_tracker(component_id, |t| {
            t.health_score = clamp_health(health_score);
            Ok(())
        })
    }

    pub fn process_telemetry(&self, sample: &TelemetrySample) -> Result<EvaluationOutcome> {
        self.process_telemetry_at(sample, Utc::now())
    }

    /// Run one evaluation cycle with an explicit clock
    pub fn process_telemetry_at(
        &self,
        sample: &TelemetrySample,
        now: DateTime<Utc>,
    ) -> Result<EvaluationOutcome> {
        let sample = sample.sanitized();
        let id = sample.component_id.clone();
        let mut events = vec![MitigationEvent::new(
            EventChannel::TelemetryUpdate,
            EventPayload::Telemetry {
                sample: sample.clone(),
            },
        )];

        let outcome = self.with_tracker(&id, |t| self.evaluate(t, &sample, now, &mut events))?;

        self.events.publish_all(events);
        Ok(outcome)
    }

    fn evaluate(
        &self,
        t: &mut ComponentTracker,
        sample: &TelemetrySample,
        now: DateTime<Utc>,
        events: &mut Vec<MitigationEvent>,
    ) -> Result<EvaluationOutcome> {
        let id = sample.component_id.as_str();
        let debt = self.calculator.score(&t.debt_inputs);
        events.push(MitigationEvent::new(
            EventChannel::DebtUpdate,
            EventPayload::Debt {
                component_id: id.to_string(),
                score: debt,
            },
        ));

        let brake = self.brake.apply_brake_at(id, debt.value, now);

        let signals = PruneSignals {
            debt_score: debt.value,
            error_rate: sample.error_rate,
            temperature_c: sample.temperature_c,
            health_score: t.health_score,
        };
        let transition = self.pruning.evaluate(id, &signals, now)?;
        let mut triggered = Vec::new();

        match &transition {
            PruneTransition::Quarantined { record } => {
                t.estimator.reset_controller()?;
                let decision = MitigationDecision::new(
                    MitigationAction::Quarantine,
                    id,
                    format!("Quarantined: {}", record.reason),
                    0.0,
                )
                .with_debt_score(debt.value)
                .with_timestamp(now);
                triggered.push(decision);
                events.push(MitigationEvent::new(
                    EventChannel::ComponentQuarantined,
                    EventPayload::Quarantine {
                        record: record.clone(),
                    },
                ));
            }
            PruneTransition::Restored { record } => {
                t.throttle = self.config.pruning.restore_throttle;
                t.estimator.reset_controller()?;
                events.push(MitigationEvent::new(
                    EventChannel::ComponentRestored,
                    EventPayload::Quarantine {
                        record: record.clone(),
                    },
                ));
            }
            PruneTransition::Unchanged { .. } => {}
        }

        let quarantined = transition.is_quarantined();
        if brake.action.is_actionable() && !quarantined {
            triggered.push(brake.clone());
        }

        let balance = if quarantined {
            None
        } else {
            let observation = t.estimator.observe_with_feedback(sample, t.throttle)?;
            events.push(MitigationEvent::new(
                EventChannel::BalanceUpdate,
                EventPayload::Balance {
                    component_id: id.to_string(),
                    sample: observation.sample,
                    smoothed_imbalance: observation.smoothed_imbalance,
                },
            ));
            if observation.decision.action.is_actionable() {
                triggered.push(observation.decision.clone().with_debt_score(debt.value));
            }
            Some(observation)
        };

        let balance_throttle = match &balance {
            Some(obs) => self.balance_throttle(obs, t.throttle),
            None => t.throttle,
        };
        let throttle = ThrottleResolver::resolve(brake.throttle_level, balance_throttle, quarantined);
        t.throttle = throttle;
        t.samples_processed += 1;

        let imbalance = balance.as_ref().map_or(0.0, |b| b.smoothed_imbalance);
        let decision = final_decision(id, &transition, &brake, balance.as_ref(), throttle)
            .with_debt_score(debt.value)
            .with_imbalance(imbalance)
            .with_timestamp(now);
        t.last_decision = Some(decision.clone());

        for d in &triggered {
            events.push(MitigationEvent::new(
                EventChannel::MitigationTriggered,
                EventPayload::Decision {
                    decision: d.clone(),
                },
            ));
        }

        tracing::debug!(
            component_id = %id,
            debt = debt.value,
            action = %decision.action,
            throttle,
            "Evaluation cycle complete"
        );

        Ok(EvaluationOutcome {
            component_id: id.to_string(),
            debt_score: debt,
            brake,
            balance,
            transition,
            throttle_level: throttle,
            quarantined,
            decision,
            triggered,
        })
    }

    /// Throttle recommended by the balance path.
    ///
    /// An explicit balance action wins; otherwise the controller output is
    /// used once it moves past the deadband.
    fn balance_throttle(&self, obs: &BalanceObservation, current: f64) -> f64 {
        if obs.decision.action != MitigationAction::None {
            obs.decision.throttle_level
        } else if (obs.controller_throttle - current).abs() > self.config.balance.controller_deadband {
            obs.controller_throttle
        } else {
            current
        }
    }

    /// Lift an active quarantine without checking restore conditions
    pub fn force_restore(&self, component_id: &str, reason: &str) -> Result<bool> {
        let record = self.with_tracker(component_id, |t| {
            let record = self.pruning.remove(component_id)?;
            if record.is_some() {
                t.throttle = self.config.pruning.restore_throttle;
                t.estimator.reset_controller()?;
            }
            Ok(record)
        })?;

        match record {
            Some(record) => {
                tracing::warn!(
                    component_id = %component_id,
                    reason = %reason,
                    "Quarantine lifted by override"
                );
                self.events.publish(MitigationEvent::new(
                    EventChannel::ComponentRestored,
                    EventPayload::Quarantine { record },
                ));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn snapshot(&self, component_id: &str) -> Result<ComponentSnapshot> {
        let tracker = self.tracker(component_id)?;
        self.snapshot_of(component_id, &tracker)
    }

    pub fn snapshots(&self) -> Result<Vec<ComponentSnapshot>> {
        let trackers = self.trackers()?;
        let mut snapshots = Vec::with_capacity(trackers.len());
        for (id, tracker) in trackers {
            match self.snapshot_of(&id, &tracker) {
                Ok(s) => snapshots.push(s),
                // removed while we were iterating
                Err(CoreError::UnknownComponent(_)) => {}
                Err(e) => return Err(e),
            }
        }
        snapshots.sort_by(|a, b| a.component_id.cmp(&b.component_id));
        Ok(snapshots)
    }

    pub fn debt_score(&self, component_id: &str) -> Result<DebtScore> {
        self.with_tracker(component_id, |t| Ok(self.calculator.score(&t.debt_inputs)))
    }

    /// Highest debt across a project's components, `None` if it has none
    pub fn project_debt(&self, project_id: &str) -> Result<Option<f64>> {
        Ok(self
            .snapshots()?
            .iter()
            .filter(|s| s.project_id == project_id)
            .map(|s| s.debt_score.value)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v)))))
    }

    pub fn system_health(&self) -> Result<SystemHealth> {
        let snapshots = self.snapshots()?;
        let total = snapshots.len();
        let quarantined = snapshots
            .iter()
            .filter(|s| s.state == ComponentState::Quarantined)
            .count();
        let warning = snapshots
            .iter()
            .filter(|s| s.state == ComponentState::Active)
            .filter(|s| s.debt_score.value >= self.config.bands.warning)
            .count();
        let average_health = if total == 0 {
            0.0
        } else {
            snapshots.iter().map(|s| s.health_score).sum::<f64>() / total as f64
        };

        let status = if total == 0 {
            SystemStatus::NoComponents
        } else if quarantined > 0 {
            SystemStatus::Critical
        } else if warning > 0 {
            SystemStatus::Warning
        } else {
            SystemStatus::Healthy
        };

        Ok(SystemHealth {
            status,
            total_components: total,
            healthy_components: total - quarantined - warning,
            warning_components: warning,
            quarantined_components: quarantined,
            average_health,
            timestamp: Utc::now(),
        })
    }

    /// Compute system health and publish it on `system:health`
    pub fn publish_system_health(&self) -> Result<SystemHealth> {
        let health = self.system_health()?;
        self.events.publish(MitigationEvent::new(
            EventChannel::SystemHealth,
            EventPayload::Health {
                health: health.clone(),
            },
        ));
        Ok(health)
    }

    fn tracker(&self, component_id: &str) -> Result<TrackerRef> {
        let components = self.components.read().map_err(CoreError::lock)?;
        components
            .get(component_id)
            .cloned()
            .ok_or_else(|| CoreError::unknown_component(component_id))
    }

    fn trackers(&self) -> Result<Vec<(String, TrackerRef)>> {
        let components = self.components.read().map_err(CoreError::lock)?;
        Ok(components
            .iter()
            .map(|(id, t)| (id.clone(), Arc::clone(t)))
            .collect())
    }

    fn with_tracker<T>(
        &self,
        component_id: &str,
        f: impl FnOnce(&mut ComponentTracker) -> Result<T>,
    ) -> Result<T> {
        let tracker = self.tracker(component_id)?;
        let mut t = tracker.lock().map_err(CoreError::lock)?;
        if t.retired {
            return Err(CoreError::unknown_component(component_id));
        }
        f(&mut t)
    }

    fn snapshot_of(&self, component_id: &str, tracker: &TrackerRef) -> Result<ComponentSnapshot> {
        let t = tracker.lock().map_err(CoreError::lock)?;
        if t.retired {
            return Err(CoreError::unknown_component(component_id));
        }
        let quarantine = self.pruning.record(component_id)?;
        Ok(ComponentSnapshot {
            component_id: component_id.to_string(),
            project_id: t.project_id.clone(),
            kind: t.kind,
            debt_inputs: t.debt_inputs.clone(),
            debt_score: self.calculator.score(&t.debt_inputs),
            health_score: t.health_score,
            throttle_level: if quarantine.is_some() { 0.0 } else { t.throttle },
            state: if quarantine.is_some() {
                ComponentState::Quarantined
            } else {
                ComponentState::Active
            },
            quarantine,
            last_decision: t.last_decision.clone(),
            samples_processed: t.samples_processed,
        })
    }
}

fn clamp_health(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

fn severity_rank(action: MitigationAction) -> u8 {
    match action {
        MitigationAction::Quarantine => 6,
        MitigationAction::Brake => 5,
        MitigationAction::Throttle => 4,
        MitigationAction::Rebalance => 3,
        MitigationAction::AutoIntegrate => 2,
        MitigationAction::Alert => 1,
        MitigationAction::None => 0,
    }
}

fn final_decision(
    component_id: &str,
    transition: &PruneTransition,
    brake: &MitigationDecision,
    balance: Option<&BalanceObservation>,
    throttle: f64,
) -> MitigationDecision {
    match transition {
        PruneTransition::Quarantined { record } => {
            return MitigationDecision::new(
                MitigationAction::Quarantine,
                component_id,
                format!("Quarantined: {}", record.reason),
                0.0,
            )
        }
        PruneTransition::Unchanged {
            state: ComponentState::Quarantined,
        } => {
            return MitigationDecision::new(
                MitigationAction::Quarantine,
                component_id,
                "Quarantine active, restore conditions not met",
                0.0,
            )
        }
        PruneTransition::Restored { .. } | PruneTransition::Unchanged { .. } => {}
    }

    // brake actions outrank balance actions of equal weight
    let chosen = match balance.map(|b| &b.decision) {
        Some(b) if severity_rank(b.action) > severity_rank(brake.action) => b,
        _ => brake,
    };
    let reason = match transition {
        PruneTransition::Restored { .. } => format!("Restored from quarantine; {}", chosen.reason),
        _ => chosen.reason.clone(),
    };
    MitigationDecision::new(chosen.action, component_id, reason, throttle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> MitigationEngine {
        MitigationEngine::new(MitigationConfig::default()).unwrap()
    }

    fn calm_sample(id: &str) -> TelemetrySample {
        TelemetrySample {
            cpu_usage: 70.0,
            memory_usage: 50.0,
            throughput: 600.0,
            io_latency_ms: 40.0,
            temperature_c: Some(55.0),
            ..TelemetrySample::new(id)
        }
    }

    #[test]
    fn test_unknown_component_is_lookup_failure() {
        let e = engine();
        let err = e.process_telemetry(&calm_sample("ghost")).unwrap_err();
        assert!(err.is_lookup_failure());
        assert!(e.snapshot("ghost").is_err());
        assert!(e.remove("ghost").is_err());
        assert!(e.update_health("ghost", 50.0).is_err());
    }

    #[test]
    fn test_healthy_component_runs_full_speed() {
        let e = engine();
        e.register(ComponentRegistration::new("mcu", "rover")).unwrap();
        let outcome = e.process_telemetry(&calm_sample("mcu")).unwrap();
        assert!(!outcome.quarantined);
        assert_eq!(outcome.decision.action, MitigationAction::None);
        assert_eq!(outcome.throttle_level, 1.0);
        assert!(outcome.triggered.is_empty());
    }

    #[test]
    fn test_debt_brake_limits_throttle() {
        let e = engine();
        // 10 days * 1.2 * 0.5 = 6.0 -> critical band, throttle 0.5
        e.register(ComponentRegistration::new("fpga", "rover").with_debt(10, 1200, 5))
            .unwrap();
        let outcome = e.process_telemetry(&calm_sample("fpga")).unwrap();
        assert_eq!(outcome.brake.action, MitigationAction::Brake);
        assert!((outcome.throttle_level - 0.5).abs() < 1e-9);
        assert_eq!(outcome.decision.action, MitigationAction::Brake);
        assert_eq!(outcome.triggered.len(), 1);
    }

    #[test]
    fn test_quarantine_forces_zero_throttle() {
        let e = engine();
        e.register(ComponentRegistration::new("radio", "rover")).unwrap();
        let mut sample = calm_sample("radio");
        sample.error_rate = 0.2;

        let outcome = e.process_telemetry(&sample).unwrap();
        assert!(outcome.quarantined);
        assert_eq!(outcome.throttle_level, 0.0);
        assert!(outcome.balance.is_none());
        assert_eq!(outcome.decision.action, MitigationAction::Quarantine);

        let snap = e.snapshot("radio").unwrap();
        assert_eq!(snap.state, ComponentState::Quarantined);
        assert_eq!(snap.throttle_level, 0.0);
    }

    #[test]
    fn test_restore_ramps_back_in() {
        let e = engine();
        e.register(ComponentRegistration::new("dsp", "rover")).unwrap();
        let t0 = Utc::now();
        let mut hot = calm_sample("dsp");
        hot.temperature_c = Some(99.0);
        assert!(e.process_telemetry_at(&hot, t0).unwrap().quarantined);

        let early = e
            .process_telemetry_at(&calm_sample("dsp"), t0 + chrono::Duration::minutes(30))
            .unwrap();
        assert!(early.quarantined);

        let restored = e
            .process_telemetry_at(&calm_sample("dsp"), t0 + chrono::Duration::minutes(90))
            .unwrap();
        assert!(matches!(restored.transition, PruneTransition::Restored { .. }));
        assert!(!restored.quarantined);
        assert!(restored.throttle_level <= 0.5 + 0.3 + 1e-9);
        assert!(restored.throttle_level > 0.0);
    }

    #[test]
    fn test_remove_retires_component() {
        let e = engine();
        e.register(ComponentRegistration::new("gpu", "rover")).unwrap();
        let mut sample = calm_sample("gpu");
        sample.error_rate = 0.9;
        e.process_telemetry(&sample).unwrap();

        e.remove("gpu").unwrap();
        assert!(e.process_telemetry(&calm_sample("gpu")).is_err());
        assert!(e.component_ids().unwrap().is_empty());

        // re-enrolling starts clean, without the old quarantine
        e.register(ComponentRegistration::new("gpu", "rover")).unwrap();
        assert_eq!(e.snapshot("gpu").unwrap().state, ComponentState::Active);
    }

    #[test]
    fn test_reenrolled_quarantine_survives_earlier_removal() {
        let e = engine();
        e.register(ComponentRegistration::new("gpu", "rover")).unwrap();
        let mut faulty = calm_sample("gpu");
        faulty.error_rate = 0.9;
        assert!(e.process_telemetry(&faulty).unwrap().quarantined);

        e.remove("gpu").unwrap();
        assert!(!e.pruning.is_quarantined("gpu").unwrap());

        e.register(ComponentRegistration::new("gpu", "rover")).unwrap();
        assert!(e.process_telemetry(&faulty).unwrap().quarantined);

        let record = e.pruning.record("gpu").unwrap().expect("record kept");
        assert!(record.reason.contains("error"));
        assert_eq!(e.snapshot("gpu").unwrap().state, ComponentState::Quarantined);
    }

    #[test]
    fn test_system_health_statuses() {
        let e = engine();
        assert_eq!(e.system_health().unwrap().status, SystemStatus::NoComponents);

        e.register(ComponentRegistration::new("a", "p").with_health(80.0)).unwrap();
        e.register(ComponentRegistration::new("b", "p").with_health(60.0)).unwrap();
        assert_eq!(e.system_health().unwrap().status, SystemStatus::Healthy);

        e.update_debt_inputs("b", 10, 1200, 5).unwrap();
        let health = e.system_health().unwrap();
        assert_eq!(health.status, SystemStatus::Warning);
        assert_eq!(health.warning_components, 1);
        assert!((health.average_health - 70.0).abs() < 1e-9);

        let mut bad = calm_sample("a");
        bad.error_rate = 0.5;
        e.process_telemetry(&bad).unwrap();
        let health = e.system_health().unwrap();
        assert_eq!(health.status, SystemStatus::Critical);
        assert_eq!(health.quarantined_components, 1);
        assert_eq!(health.healthy_components, 0);
    }

    #[test]
    fn test_force_restore() {
        let e = engine();
        e.register(ComponentRegistration::new("c", "p").with_health(5.0)).unwrap();
        e.process_telemetry(&calm_sample("c")).unwrap();
        assert!(e.force_restore("c", "operator override").unwrap());
        assert!(!e.force_restore("c", "again").unwrap());
        let snap = e.snapshot("c").unwrap();
        assert_eq!(snap.state, ComponentState::Active);
        assert_eq!(snap.throttle_level, 0.5);
    }

    #[test]
    fn test_project_debt_takes_maximum() {
        let e = engine();
        e.register(ComponentRegistration::new("a", "p").with_debt(10, 1000, 10)).unwrap();
        e.register(ComponentRegistration::new("b", "p").with_debt(2, 1000, 10)).unwrap();
        e.register(ComponentRegistration::new("c", "q").with_debt(50, 1000, 10)).unwrap();
        assert_eq!(e.project_debt("p").unwrap(), Some(10.0));
        assert_eq!(e.project_debt("none").unwrap(), None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = MitigationConfig::default();
        config.balance.window = 0;
        assert!(MitigationEngine::new(config).is_err());
    }
}
