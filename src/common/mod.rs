//! Common types shared by the controller, the odometry integrator and the transport layer
pub mod angles;

use serde::Deserialize;

/// A planar pose (x, y, theta)
///
/// `theta` is a signed angle in radians and is not normalized to any range until a caller
/// wraps it explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose2D { x, y, theta }
    }
}

/// Body velocity of a planar robot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Twist2D {
    pub vx: f64,
    pub vy: f64,
    pub vtheta: f64,
}

/// Velocity command sent to the drive (linear m/s, angular rad/s)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VelocityCommand {
    pub linear: f64,
    pub angular: f64,
}

impl VelocityCommand {
    pub fn new(linear: f64, angular: f64) -> Self {
        VelocityCommand { linear, angular }
    }

    /// The all-zero command
    pub fn zero() -> Self {
        VelocityCommand::default()
    }
}

/// Controlled axis of the position controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Linear,
    Angular,
}

/// One coefficient of a [`GainSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainTerm {
    Kp,
    Ki,
    Kd,
}

/// PID gains for a single axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct GainSet {
    #[serde(default)]
    pub kp: f64,
    #[serde(default)]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
}

impl GainSet {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        GainSet { kp, ki, kd }
    }

    /// Overwrite a single coefficient, leaving the others untouched
    pub fn set(&mut self, term: GainTerm, value: f64) {
        match term {
            GainTerm::Kp => self.kp = value,
            GainTerm::Ki => self.ki = value,
            GainTerm::Kd => self.kd = value,
        }
    }
}

/// Direction the robot drives in to reach the goal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
    Forward,
    Backward,
}

impl Heading {
    /// Sign multiplier applied to linear velocity
    pub fn sign(self) -> f64 {
        match self {
            Heading::Forward => 1.0,
            Heading::Backward => -1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_set_updates_single_term() {
        let mut gains = GainSet::new(1.0, 2.0, 3.0);
        gains.set(GainTerm::Ki, 0.25);
        assert_eq!(gains, GainSet::new(1.0, 0.25, 3.0));
        gains.set(GainTerm::Kd, 0.0);
        assert_eq!(gains, GainSet::new(1.0, 0.25, 0.0));
    }

    #[test]
    fn test_heading_sign() {
        assert_eq!(Heading::Forward.sign(), 1.0);
        assert_eq!(Heading::Backward.sign(), -1.0);
    }
}
