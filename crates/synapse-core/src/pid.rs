//! Bounded PID feedback controller
//!
//! One controller tracks one quantity. It is not `Sync`-shared across
//! quantities; owners wrap it in their own lock.

use crate::config::ControllerConfig;

/// Proportional-integral-derivative controller with anti-windup
#[derive(Debug, Clone)]
pub struct FeedbackController {
    config: ControllerConfig,
    integral: f64,
    previous_error: f64,
}

impl Default for FeedbackController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

impl FeedbackController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            integral: 0.0,
            previous_error: 0.0,
        }
    }

    pub fn target(&self) -> f64 {
        self.config.target
    }

    pub fn set_target(&mut self, target: f64) {
        self.config.target = target;
    }

    /// Running integral, always within `±integral_limit`
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Feed one measurement and return the bounded adjustment
    pub fn step(&mut self, measured: f64) -> f64 {
        let error = self.config.target - measured;

        let limit = self.config.integral_limit;
        self.integral = (self.integral + error).clamp(-limit, limit);

        let derivative = error - self.previous_error;
        self.previous_error = error;

        let raw = self.config.kp * error + self.config.ki * self.integral + self.config.kd * derivative;
        let bound = self.config.output_limit;
        (raw / self.config.output_scale).clamp(-bound, bound)
    }

    /// Clear accumulated state
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
    }

    /// Apply one step to a throttle level, keeping it within `[min_throttle, 1]`
    pub fn adjust_throttle(&mut self, current_throttle: f64, measured: f64) -> f64 {
        let adjustment = self.step(measured);
        (current_throttle + adjustment).clamp(self.config.min_throttle, 1.0)
    }
}
