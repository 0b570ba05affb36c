//! Integration health and adaptive mitigation primitives.
//!
//! This crate scores integration debt, estimates hardware/software balance,
//! and turns both into a throttle level per component. Components that
//! misbehave are quarantined until debt, health and elapsed time allow them
//! back. Policy gates reuse the same signals to decide whether a commit or a
//! deployment may proceed.
//!
//! # Evaluation cycle
//!
//! ```text
//! telemetry ─┬─> DebtCalculator ─> DebtBrake ──────────┐
//!            ├─> PruningStateMachine (quarantine) ─────┤
//!            └─> BalanceEstimator + FeedbackController ┴─> ThrottleResolver
//! ```
//!
//! [`MitigationEngine`] runs the cycle per component and publishes every
//! step on an [`EventBus`].

pub mod balance;
pub mod brake;
pub mod commit_lock;
pub mod config;
pub mod debt;
pub mod error;
pub mod events;
pub mod flavor;
pub mod gates;
pub mod mitigation;
pub mod orchestrator;
pub mod pid;
pub mod pruning;
pub mod throttle;

pub use balance::{BalanceEstimator, BalanceObservation, BalanceSample, TelemetrySample};
pub use brake::DebtBrake;
pub use commit_lock::{CommitAnalyzer, LockDecision, LockLevel};
pub use config::{
    BalanceConfig, ControllerConfig, MitigationConfig, PruningConfig, SeverityBands,
};
pub use debt::{DebtCalculator, DebtForecast, DebtInputs, DebtScore, Severity};
pub use error::{CoreError, Result};
pub use events::{
    EventBus, EventChannel, EventPayload, MitigationEvent, SystemHealth, SystemStatus,
};
pub use flavor::{Flavor, FlavorDebtCalculator, FlavorInputs, FlavorScore, MobilePlatform};
pub use gates::{
    EnforcementPoint, GateAction, GateOperator, GateScope, GateStatus, GateVerdict,
    MetricResolver, PolicyGateEvaluator, PolicyGateResult, PolicyGateSpec,
};
pub use mitigation::{MitigationAction, MitigationDecision};
pub use orchestrator::{
    ComponentKind, ComponentRegistration, ComponentSnapshot, EvaluationOutcome, MitigationEngine,
};
pub use pid::FeedbackController;
pub use pruning::{ComponentState, PruneSignals, PruneTransition, PruningStateMachine, QuarantineRecord};
pub use throttle::ThrottleResolver;
