//! Pose error computation with forward/backward heading resolution

use crate::common::angles::{reduce_angle, rotate_yaw_180, yaw_from_quaternion};
use crate::common::{Heading, Pose2D};
use nalgebra::Quaternion;

/// Orientation error magnitude above which the robot is assumed to be driving backwards
pub const BACKWARD_THRESHOLD: f64 = 2.6;

/// Error between the current pose and the goal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseError {
    /// Angle the robot has to turn to face the goal (rad)
    pub orientation: f64,
    /// Distance to the goal, negative when the goal lies behind in x (m)
    pub distance: f64,
    pub heading: Heading,
}

/// Computes pose errors against the current goal
#[derive(Debug, Clone, Default)]
pub struct PoseErrorResolver;

impl PoseErrorResolver {
    pub fn new() -> Self {
        PoseErrorResolver
    }

    /// Resolve the error, flipping the robot frame when the goal is more or less behind it
    pub fn resolve(
        &self,
        current: &Pose2D,
        goal: &Pose2D,
        current_orientation: &Quaternion<f64>,
    ) -> PoseError {
        let dx = goal.x - current.x;
        let dy = goal.y - current.y;

        let angle_to_goal = dy.atan2(dx);
        let mut orientation = reduce_angle(angle_to_goal - current.theta);
        let mut heading = Heading::Forward;

        if orientation.abs() > BACKWARD_THRESHOLD {
            let flipped = rotate_yaw_180(current_orientation);
            let theta = yaw_from_quaternion(&flipped);
            orientation = reduce_angle(angle_to_goal - theta);
            heading = Heading::Backward;
        }

        PoseError {
            orientation,
            distance: signed_distance(current, goal),
            heading,
        }
    }

    /// Error as computed by the tolerance-gated controller.
    ///
    /// The goal bearing is measured from the +y axis and is not wrapped. Any goal sharing an
    /// x or y coordinate with the robot yields a zero orientation error.
    pub fn resolve_legacy(&self, current: &Pose2D, goal: &Pose2D) -> PoseError {
        let dx = goal.x - current.x;
        let dy = goal.y - current.y;

        let orientation = if dx == 0.0 || dy == 0.0 {
            0.0
        } else {
            dx.atan2(dy) - current.theta
        };

        PoseError {
            orientation,
            distance: signed_distance(current, goal),
            heading: Heading::Forward,
        }
    }
}

fn signed_distance(current: &Pose2D, goal: &Pose2D) -> f64 {
    let distance = (goal.x - current.x).hypot(goal.y - current.y);
    if goal.x < current.x {
        -distance
    } else {
        distance
    }
}
