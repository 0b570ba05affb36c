//! Hardware/software balance estimation
//!
//! Telemetry is reduced to a hardware capacity score and a software demand
//! score (both 0-100). Their normalized difference is the imbalance:
//! negative when hardware is the constraint, positive when it sits idle.
//!
//! Decisions use the moving average of the last `window` imbalances so a
//! single noisy sample cannot flip the throttle. History and the feedback
//! controller share one lock so samples for a component are folded in
//! arrival order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::config::{BalanceConfig, ControllerConfig};
use crate::error::{CoreError, Result};
use crate::mitigation::{clamp_unit, MitigationAction, MitigationDecision};
use crate::pid::FeedbackController;

/// One telemetry reading for a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub component_id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    #[serde(default)]
    pub io_latency_ms: f64,
    #[serde(default)]
    pub network_latency_ms: f64,
    #[serde(default)]
    pub error_rate: f64,
    #[serde(default)]
    pub throughput: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_w: Option<f64>,
}

impl TelemetrySample {
    pub fn new(component_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            timestamp: Utc::now(),
            cpu_usage: 0.0,
            memory_usage: 0.0,
            io_latency_ms: 0.0,
            network_latency_ms: 0.0,
            error_rate: 0.0,
            throughput: 0.0,
            temperature_c: None,
            power_w: None,
        }
    }

    /// Copy of the sample with every field clamped into its valid domain.
    ///
    /// Jittery readings (cpu at 100.4%, negative latency) are folded back
    /// into range rather than rejected. Non-finite optional readings are
    /// dropped.
    pub fn sanitized(&self) -> Self {
        Self {
            component_id: self.component_id.clone(),
            timestamp: self.timestamp,
            cpu_usage: bounded(self.cpu_usage, 0.0, 100.0),
            memory_usage: bounded(self.memory_usage, 0.0, 100.0),
            io_latency_ms: bounded(self.io_latency_ms, 0.0, f64::MAX),
            network_latency_ms: bounded(self.network_latency_ms, 0.0, f64::MAX),
            error_rate: bounded(self.error_rate, 0.0, 1.0),
            throughput: bounded(self.throughput, 0.0, f64::MAX),
            temperature_c: self.temperature_c.filter(|t| t.is_finite()),
            power_w: self.power_w.filter(|p| p.is_finite()).map(|p| p.max(0.0)),
        }
    }
}

fn bounded(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

/// Derived balance point for one observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceSample {
    pub hw_capacity: f64,
    pub sw_demand: f64,
    pub imbalance: f64,
    pub timestamp: DateTime<Utc>,
}

/// Fixed-capacity FIFO of balance samples
#[derive(Debug, Clone)]
pub struct BalanceHistory {
    slots: Vec<BalanceSample>,
    capacity: usize,
    // index of the oldest sample once the ring has wrapped
    head: usize,
}

impl BalanceHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Append, evicting the oldest sample when full
    pub fn push(&mut self, sample: BalanceSample) {
        if self.slots.len() < self.capacity {
            self.slots.push(sample);
        } else {
            self.slots[self.head] = sample;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// Sample at chronological position `i` (0 is the oldest)
    fn at(&self, i: usize) -> &BalanceSample {
        &self.slots[(self.head + i) % self.slots.len()]
    }

    pub fn latest(&self) -> Option<&BalanceSample> {
        if self.slots.is_empty() {
            None
        } else {
            Some(self.at(self.slots.len() - 1))
        }
    }

    /// Up to `n` most recent samples, oldest first
    pub fn recent(&self, n: usize) -> Vec<BalanceSample> {
        let len = self.slots.len();
        let take = n.min(len);
        (len - take..len).map(|i| *self.at(i)).collect()
    }

    /// Imbalance averaged over the last `window` samples.
    ///
    /// Falls back to the latest instantaneous value while fewer than
    /// `window` samples exist.
    pub fn smoothed_imbalance(&self, window: usize) -> Option<f64> {
        let len = self.slots.len();
        if len == 0 {
            return None;
        }
        if window == 0 || len < window {
            return self.latest().map(|s| s.imbalance);
        }
        let sum: f64 = (len - window..len).map(|i| self.at(i).imbalance).sum();
        Some(sum / window as f64)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }
}

/// Result of one observation, including the controller's view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceObservation {
    pub decision: MitigationDecision,
    pub sample: BalanceSample,
    pub smoothed_imbalance: f64,
    /// Throttle after applying one feedback step against CPU usage
    pub controller_throttle: f64,
}

#[derive(Debug)]
struct BalanceState {
    history: BalanceHistory,
    controller: FeedbackController,
}

/// Per-component balance estimator
#[derive(Debug)]
pub struct BalanceEstimator {
    config: BalanceConfig,
    state: Mutex<BalanceState>,
}

impl Default for BalanceEstimator {
    fn default() -> Self {
        Self::new(BalanceConfig::default(), ControllerConfig::default())
    }
}

impl BalanceEstimator {
    pub fn new(config: BalanceConfig, controller: ControllerConfig) -> Self {
        let capacity = config.window.max(1) * 2;
        Self {
            config,
            state: Mutex::new(BalanceState {
                history: BalanceHistory::with_capacity(capacity),
                controller: FeedbackController::new(controller),
            }),
        }
    }

    pub fn config(&self) -> &BalanceConfig {
        &self.config
    }

    /// Remaining hardware headroom, 0-100
    pub fn hardware_capacity(&self, sample: &TelemetrySample) -> f64 {
        let s = sample.sanitized();
        let temp_factor = match s.temperature_c {
            Some(t) if t > self.config.critical_temp_c => 0.3,
            Some(t) if t > self.config.warning_temp_c => 0.7,
            _ => 1.0,
        };
        0.4 * (100.0 - s.cpu_usage) + 0.4 * (100.0 - s.memory_usage) + 0.2 * (100.0 * temp_factor)
    }

    /// Pressure the software puts on the component, 0-100
    pub fn software_demand(&self, sample: &TelemetrySample) -> f64 {
        let s = sample.sanitized();
        let throughput_demand = (100.0 * s.throughput / self.config.target_throughput).min(100.0);
        let latency_urgency = if s.io_latency_ms > self.config.critical_latency_ms {
            100.0
        } else if s.io_latency_ms > self.config.warning_latency_ms {
            70.0
        } else {
            50.0 * s.io_latency_ms / self.config.warning_latency_ms
        };
        let error_stress = (1000.0 * s.error_rate).min(100.0);
        0.5 * throughput_demand + 0.3 * latency_urgency + 0.2 * error_stress
    }

    /// Normalized difference, within [-1, 1]
    pub fn imbalance(&self, capacity: f64, demand: f64) -> f64 {
        bounded((capacity - demand) / 100.0, -1.0, 1.0)
    }

    /// Balance point for a sample, without recording it
    pub fn balance_sample(&self, sample: &TelemetrySample) -> BalanceSample {
        let hw_capacity = self.hardware_capacity(sample);
        let sw_demand = self.software_demand(sample);
        BalanceSample {
            hw_capacity,
            sw_demand,
            imbalance: self.imbalance(hw_capacity, sw_demand),
            timestamp: sample.timestamp,
        }
    }

    /// Decision rule applied to a smoothed imbalance
    pub fn decide(&self, smoothed: f64, current_throttle: f64) -> (MitigationAction, f64, String) {
        let current = clamp_unit(current_throttle);
        let t = self.config.imbalance_threshold;

        if smoothed < -t {
            let cut = smoothed.abs().min(self.config.max_throttle_step);
            let throttle = (current - cut).max(self.config.min_throttle);
            (
                MitigationAction::Throttle,
                throttle,
                format!(
                    "Hardware overloaded (imbalance {:+.3}), throttling software by {:.2}",
                    smoothed, cut
                ),
            )
        } else if smoothed > t {
            let boost = smoothed.min(self.config.max_boost);
            (
                MitigationAction::Alert,
                (current + boost).min(1.0),
                format!(
                    "Hardware underused (imbalance {:+.3}), software can scale up by {:.2}",
                    smoothed, boost
                ),
            )
        } else {
            (
                MitigationAction::None,
                current,
                format!("Balanced (imbalance {:+.3})", smoothed),
            )
        }
    }

    /// Record a sample and return the balance decision
    pub fn observe(
        &self,
        sample: &TelemetrySample,
        current_throttle: f64,
    ) -> Result<MitigationDecision> {
        self.observe_with_feedback(sample, current_throttle)
            .map(|o| o.decision)
    }

    /// Record a sample, step the feedback controller and return both views.
    ///
    /// The lock is held only for the append, the window read and the
    /// controller step.
    pub fn observe_with_feedback(
        &self,
        sample: &TelemetrySample,
        current_throttle: f64,
    ) -> Result<BalanceObservation> {
        let point = self.balance_sample(sample);
        let cpu_usage = sample.sanitized().cpu_usage;
        let current = clamp_unit(current_throttle);

        let (smoothed, controller_throttle) = {
            let mut state = self.state.lock().map_err(CoreError::lock)?;
            state.history.push(point);
            let smoothed = state
                .history
                .smoothed_imbalance(self.config.window)
                .unwrap_or(point.imbalance);
            let controller_throttle = state.controller.adjust_throttle(current, cpu_usage);
            (smoothed, controller_throttle)
        };

        let (action, throttle, reason) = self.decide(smoothed, current);
        let decision = MitigationDecision::new(action, &sample.component_id, reason, throttle)
            .with_imbalance(smoothed)
            .with_timestamp(sample.timestamp);

        tracing::debug!(
            component_id = %sample.component_id,
            imbalance = point.imbalance,
            smoothed,
            action = %action,
            "Balance observation"
        );

        Ok(BalanceObservation {
            decision,
            sample: point,
            smoothed_imbalance: smoothed,
            controller_throttle,
        })
    }

    /// Up to `n` most recent samples, oldest first
    pub fn recent_samples(&self, n: usize) -> Result<Vec<BalanceSample>> {
        let state = self.state.lock().map_err(CoreError::lock)?;
        Ok(state.history.recent(n))
    }

    pub fn history_len(&self) -> Result<usize> {
        let state = self.state.lock().map_err(CoreError::lock)?;
        Ok(state.history.len())
    }

    /// Zero the controller state, keeping history
    pub fn reset_controller(&self) -> Result<()> {
        let mut state = self.state.lock().map_err(CoreError::lock)?;
        state.controller.reset();
        Ok(())
    }

    /// Drop history and controller state
    pub fn reset(&self) -> Result<()> {
        let mut state = self.state.lock().map_err(CoreError::lock)?;
        state.history.clear();
        state.controller.reset();
        Ok(())
    }
}
