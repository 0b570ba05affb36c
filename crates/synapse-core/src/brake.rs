//! Debt brake: debt score to throttle multiplier
//!
//! Piecewise-linear and continuous over `[0, quarantine)`:
//!
//! | debt                    | throttle     |
//! |-------------------------|--------------|
//! | `< healthy`             | 1.0          |
//! | `healthy..warning`      | 1.0 -> 0.7   |
//! | `warning..critical`     | 0.7 -> 0.3   |
//! | `critical..quarantine`  | 0.3 -> 0.1   |
//! | `>= quarantine`         | 0.0          |
//!
//! The only discontinuity is the deliberate step from 0.1 to 0.0 at the
//! quarantine boundary.

use chrono::{DateTime, Utc};

use crate::config::SeverityBands;
use crate::debt::{DebtCalculator, Severity};
use crate::mitigation::{MitigationAction, MitigationDecision};

const FULL_SPEED: f64 = 1.0;
const WARNING_FLOOR: f64 = 0.7;
const CRITICAL_FLOOR: f64 = 0.3;
const QUARANTINE_FLOOR: f64 = 0.1;

/// Maps debt to throttle and severity to action
#[derive(Debug, Clone, Copy, Default)]
pub struct DebtBrake {
    calculator: DebtCalculator,
}

impl DebtBrake {
    pub fn new(bands: SeverityBands) -> Self {
        Self {
            calculator: DebtCalculator::new(bands),
        }
    }

    fn bands(&self) -> &SeverityBands {
        self.calculator.bands()
    }

    /// Throttle multiplier for a debt score, within [0, 1]
    pub fn throttle_from_debt(&self, debt: f64) -> f64 {
        let b = self.bands();
        if debt.is_nan() {
            return 0.0;
        }
        if debt < b.healthy {
            FULL_SPEED
        } else if debt < b.warning {
            lerp(debt, b.healthy, b.warning, FULL_SPEED, WARNING_FLOOR)
        } else if debt < b.critical {
            lerp(debt, b.warning, b.critical, WARNING_FLOOR, CRITICAL_FLOOR)
        } else if debt < b.quarantine {
            lerp(debt, b.critical, b.quarantine, CRITICAL_FLOOR, QUARANTINE_FLOOR)
        } else {
            0.0
        }
    }

    /// Brake decision for a component at the given debt.
    ///
    /// The action follows the severity band; the throttle follows the curve.
    pub fn apply_brake(&self, component_id: &str, debt: f64) -> MitigationDecision {
        self.apply_brake_at(component_id, debt, Utc::now())
    }

    pub fn apply_brake_at(
        &self,
        component_id: &str,
        debt: f64,
        now: DateTime<Utc>,
    ) -> MitigationDecision {
        let severity = self.calculator.classify(debt);
        let throttle = self.throttle_from_debt(debt);
        let action = MitigationAction::for_severity(severity);

        let reason = match severity {
            Severity::Healthy => format!("Debt {:.2} is healthy", debt),
            Severity::Warning => {
                format!("Debt {:.2} in warning band, throttle {:.2}", debt, throttle)
            }
            Severity::Critical => {
                format!("Debt {:.2} is critical, braking to {:.2}", debt, throttle)
            }
            Severity::Quarantine => format!(
                "Debt {:.2} reached quarantine threshold {:.2}",
                debt,
                self.bands().quarantine
            ),
        };

        MitigationDecision::new(action, component_id, reason, throttle)
            .with_debt_score(debt)
            .with_timestamp(now)
    }
}

fn lerp(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    let t = (x - x0) / (x1 - x0);
    y0 + t * (y1 - y0)
}
