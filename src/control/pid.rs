//! PID controller with reset-style anti-windup
//!
//! Samples arrive at irregular intervals, so every evaluation measures its own delta time
//! against the previous call. Gains are passed on every call and can change between calls
//! without touching the accumulated state.

use crate::common::GainSet;
use std::time::Instant;

/// Integral magnitude above which the accumulator is dropped back to zero
pub const INTEGRAL_LIMIT: f64 = 1.5;

/// A single-axis PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    integral: f64,
    last_error: f64,
    last_time: Instant,
}

impl PidController {
    /// Create a controller whose first delta time is measured from `now`
    pub fn new(now: Instant) -> Self {
        PidController {
            integral: 0.0,
            last_error: 0.0,
            last_time: now,
        }
    }

    /// Compute the controller output for `error` observed at `now`
    pub fn evaluate(&mut self, gains: &GainSet, error: f64, now: Instant) -> f64 {
        // saturates to zero if `now` precedes the previous sample
        let delta_time = now.saturating_duration_since(self.last_time).as_secs_f64();

        let proportional = gains.kp * error;
        let derivative = self.derivative(gains.kd, error, delta_time);

        // Zero-error samples never touch the integral
        let output = if error != 0.0 {
            proportional + self.integrate(gains.ki, error, delta_time) + derivative
        } else {
            proportional + derivative
        };

        self.last_error = error;
        self.last_time = now;

        output
    }

    fn integrate(&mut self, ki: f64, error: f64, delta_time: f64) -> f64 {
        self.integral += error * delta_time;
        if self.integral.abs() > INTEGRAL_LIMIT {
            self.integral = 0.0;
        }
        self.integral * ki
    }

    fn derivative(&self, kd: f64, error: f64, delta_time: f64) -> f64 {
        let delta_error = error - self.last_error;
        if delta_error == 0.0 || delta_time <= 0.0 {
            return 0.0;
        }
        delta_error / delta_time * kd
    }

    /// Clear the accumulated state and restart timing at `now`
    pub fn reset(&mut self, now: Instant) {
        self.integral = 0.0;
        self.last_error = 0.0;
        self.last_time = now;
    }

    /// Current (unscaled) integral accumulator
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Error seen by the previous evaluation
    pub fn last_error(&self) -> f64 {
        self.last_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn at(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    #[test]
    fn test_proportional_only() {
        let t0 = Instant::now();
        let mut pid = PidController::new(t0);
        let out = pid.evaluate(&GainSet::new(2.0, 0.0, 0.0), 0.75, at(t0, 10));
        assert_relative_eq!(out, 1.5);
    }

    #[test]
    fn test_integral_accumulates_with_delta_time() {
        let t0 = Instant::now();
        let mut pid = PidController::new(t0);
        let gains = GainSet::new(0.0, 1.0, 0.0);

        pid.evaluate(&gains, 1.0, at(t0, 100));
        let out = pid.evaluate(&gains, 1.0, at(t0, 300));

        assert_relative_eq!(pid.integral(), 0.3, epsilon = 1e-9);
        assert_relative_eq!(out, 0.3, epsilon = 1e-9);
    }

    #[test]
    fn test_integral_term_scales_by_ki_without_rescaling_accumulator() {
        let t0 = Instant::now();
        let mut pid = PidController::new(t0);
        let gains = GainSet::new(0.0, 0.5, 0.0);

        let out = pid.evaluate(&gains, 1.0, at(t0, 1000));
        assert_relative_eq!(out, 0.5, epsilon = 1e-9);
        assert_relative_eq!(pid.integral(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_anti_windup_resets_to_exact_zero() {
        let t0 = Instant::now();
        let mut pid = PidController::new(t0);
        let gains = GainSet::new(0.0, 1.0, 0.0);

        // 1.0 error for 0.5 s per step: 0.5, 1.0, 1.5 stay inside the bound
        for step in 1..=3 {
            pid.evaluate(&gains, 1.0, at(t0, 500 * step));
        }
        assert_relative_eq!(pid.integral(), 1.5, epsilon = 1e-9);

        // next step would reach 2.0
        let out = pid.evaluate(&gains, 1.0, at(t0, 2000));
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(out, 0.0);
    }

    #[test]
    fn test_anti_windup_applies_to_negative_integral() {
        let t0 = Instant::now();
        let mut pid = PidController::new(t0);
        let gains = GainSet::new(0.0, 1.0, 0.0);

        pid.evaluate(&gains, -1.0, at(t0, 1000));
        pid.evaluate(&gains, -1.0, at(t0, 2000));
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn test_derivative_uses_measured_interval() {
        let t0 = Instant::now();
        let mut pid = PidController::new(t0);
        let gains = GainSet::new(0.0, 0.0, 1.0);

        pid.evaluate(&gains, 0.0, at(t0, 100));
        let out = pid.evaluate(&gains, 0.5, at(t0, 350));
        assert_relative_eq!(out, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_derivative_zero_when_error_unchanged() {
        let t0 = Instant::now();
        let mut pid = PidController::new(t0);
        let gains = GainSet::new(0.0, 0.0, 5.0);

        pid.evaluate(&gains, 0.4, at(t0, 100));
        let out = pid.evaluate(&gains, 0.4, at(t0, 110));
        assert_eq!(out, 0.0);
    }

    #[test]
    fn test_zero_delta_time_skips_derivative() {
        let t0 = Instant::now();
        let mut pid = PidController::new(t0);
        let out = pid.evaluate(&GainSet::new(1.0, 1.0, 1.0), 0.5, t0);
        assert!(out.is_finite());
        assert_relative_eq!(out, 0.5);
    }

    #[test]
    fn test_zero_error_outputs_zero() {
        let t0 = Instant::now();
        let mut pid = PidController::new(t0);
        let gains = GainSet::new(3.0, 2.0, 1.0);
        assert_eq!(pid.evaluate(&gains, 0.0, at(t0, 10)), 0.0);
        assert_eq!(pid.evaluate(&gains, 0.0, at(t0, 20)), 0.0);
    }

    #[test]
    fn test_zero_error_omits_accumulated_integral() {
        let t0 = Instant::now();
        let mut pid = PidController::new(t0);
        let gains = GainSet::new(1.0, 1.0, 0.0);

        pid.evaluate(&gains, 1.0, at(t0, 500));
        assert_relative_eq!(pid.integral(), 0.5, epsilon = 1e-9);

        let out = pid.evaluate(&gains, 0.0, at(t0, 1000));
        assert_eq!(out, 0.0);
        assert_relative_eq!(pid.integral(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_error_after_history_keeps_derivative_kick() {
        let t0 = Instant::now();
        let mut pid = PidController::new(t0);
        let gains = GainSet::new(1.0, 1.0, 1.0);

        pid.evaluate(&gains, 1.0, at(t0, 100));
        assert_relative_eq!(pid.integral(), 0.1, epsilon = 1e-9);

        // P and D only: the error fell by 1.0 over 100 ms
        let out = pid.evaluate(&gains, 0.0, at(t0, 200));
        assert_relative_eq!(out, -10.0, epsilon = 1e-9);
        assert_relative_eq!(pid.integral(), 0.1, epsilon = 1e-9);
        assert_eq!(pid.last_error(), 0.0);
    }

    #[test]
    fn test_gain_change_keeps_history() {
        let t0 = Instant::now();
        let mut pid = PidController::new(t0);

        pid.evaluate(&GainSet::new(1.0, 1.0, 0.0), 1.0, at(t0, 500));
        let out = pid.evaluate(&GainSet::new(0.0, 2.0, 0.0), 1.0, at(t0, 1000));

        assert_relative_eq!(pid.integral(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(out, 2.0, epsilon = 1e-9);
        assert_eq!(pid.last_error(), 1.0);
    }

    #[test]
    fn test_reset_clears_state() {
        let t0 = Instant::now();
        let mut pid = PidController::new(t0);
        pid.evaluate(&GainSet::new(1.0, 1.0, 1.0), 1.0, at(t0, 500));

        pid.reset(at(t0, 600));
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.last_error(), 0.0);
    }
}
