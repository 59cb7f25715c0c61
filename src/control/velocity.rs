//! Maps orientation error and the angular PID output into a velocity command

use crate::common::{Heading, VelocityCommand};
use std::f64::consts::PI;

/// Orientation-driven linear velocity mapping.
///
/// Linear speed falls off linearly from `max_linear` when aligned with the goal to
/// `min_linear` at π misalignment. The result is not clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityMapper {
    pub max_linear: f64,
    pub min_linear: f64,
}

impl Default for VelocityMapper {
    fn default() -> Self {
        VelocityMapper {
            max_linear: 2.0,
            min_linear: 0.0,
        }
    }
}

impl VelocityMapper {
    pub fn new(max_linear: f64, min_linear: f64) -> Self {
        VelocityMapper {
            max_linear,
            min_linear,
        }
    }

    pub fn map(
        &self,
        orientation_error: f64,
        angular_output: f64,
        heading: Heading,
    ) -> VelocityCommand {
        let alignment = 1.0 - orientation_error.abs() / PI;
        let linear =
            (alignment * (self.max_linear - self.min_linear) + self.min_linear) * heading.sign();

        VelocityCommand {
            linear,
            angular: angular_output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_aligned_drives_at_max() {
        let mapper = VelocityMapper::default();
        let cmd = mapper.map(0.0, 0.0, Heading::Forward);
        assert_eq!(cmd, VelocityCommand::new(2.0, 0.0));
    }

    #[test]
    fn test_opposite_drives_at_min() {
        let mapper = VelocityMapper::new(1.5, 0.25);
        assert_relative_eq!(mapper.map(PI, 0.0, Heading::Forward).linear, 0.25);
        assert_relative_eq!(mapper.map(-PI, 0.0, Heading::Forward).linear, 0.25);
    }

    #[test]
    fn test_halfway_and_backward() {
        let mapper = VelocityMapper::new(2.0, 0.0);
        let cmd = mapper.map(-FRAC_PI_2, 0.7, Heading::Backward);
        assert_relative_eq!(cmd.linear, -1.0);
        assert_eq!(cmd.angular, 0.7);
    }

    #[test]
    fn test_output_is_not_clamped() {
        // errors past π run below the minimum
        let mapper = VelocityMapper::new(2.0, 0.0);
        assert!(mapper.map(2.0 * PI, 0.0, Heading::Forward).linear < 0.0);
    }
}
