//! Message-bus facing side of the controller
//!
//! Incoming updates land in [`SharedInputs`]; the control loop reads an [`InputSnapshot`] at
//! the start of every tick. Outgoing data goes through [`CommandSink`] and [`DebugSink`].

use crate::common::angles::{is_valid_orientation, yaw_from_quaternion};
use crate::common::{Axis, GainSet, GainTerm, Pose2D, Twist2D, VelocityCommand};
use crate::config::ControllerConfig;
use crate::error::Result;
use log::{debug, warn};
use nalgebra::Quaternion;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Pose estimate as published by the odometry source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimate {
    pub x: f64,
    pub y: f64,
    pub orientation: Quaternion<f64>,
    pub twist: Twist2D,
    /// Time since the source's epoch
    pub stamp: Duration,
}

/// Goal pose as published by the goal source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalPose {
    pub x: f64,
    pub y: f64,
    pub orientation: Quaternion<f64>,
}

/// Latest values seen on every input, consumed as a whole by one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSnapshot {
    pub pose: Pose2D,
    pub orientation: Quaternion<f64>,
    pub twist: Twist2D,
    pub goal: Pose2D,
    pub linear_gains: GainSet,
    pub angular_gains: GainSet,
    pub enabled: bool,
}

impl InputSnapshot {
    /// Gains for one axis
    pub fn gains(&self, axis: Axis) -> &GainSet {
        match axis {
            Axis::Linear => &self.linear_gains,
            Axis::Angular => &self.angular_gains,
        }
    }
}

/// Thread-safe cache of the latest controller inputs
#[derive(Debug, Clone)]
pub struct SharedInputs {
    state: Arc<Mutex<InputSnapshot>>,
}

impl SharedInputs {
    /// Robot at the origin facing +x, goal at the origin, gains and enable flag from config
    pub fn new(config: &ControllerConfig) -> Self {
        let snapshot = InputSnapshot {
            pose: Pose2D::default(),
            orientation: Quaternion::identity(),
            twist: Twist2D::default(),
            goal: Pose2D::default(),
            linear_gains: config.gains.linear,
            angular_gains: config.gains.angular,
            enabled: config.node.start_enabled,
        };
        SharedInputs {
            state: Arc::new(Mutex::new(snapshot)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InputSnapshot> {
        // a panicked writer leaves plain data behind, keep using it
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of all inputs, taken under a single lock
    pub fn snapshot(&self) -> InputSnapshot {
        *self.lock()
    }

    /// Store a new pose estimate.
    ///
    /// An orientation that cannot be converted to a heading is dropped with a warning and the
    /// last known heading is kept; the position is still updated.
    pub fn update_pose(&self, estimate: PoseEstimate) {
        let mut state = self.lock();
        state.pose.x = estimate.x;
        state.pose.y = estimate.y;
        state.twist = estimate.twist;

        if is_valid_orientation(&estimate.orientation) {
            state.orientation = estimate.orientation;
            state.pose.theta = yaw_from_quaternion(&estimate.orientation);
        } else {
            warn!(
                "Orientation unavailable in pose at {:?}, holding heading {:.3}",
                estimate.stamp, state.pose.theta
            );
        }
    }

    /// Replace the active goal
    pub fn update_goal(&self, goal: GoalPose) {
        let theta = if is_valid_orientation(&goal.orientation) {
            yaw_from_quaternion(&goal.orientation)
        } else {
            warn!("Goal orientation unavailable, using zero heading");
            0.0
        };
        self.lock().goal = Pose2D::new(goal.x, goal.y, theta);
        debug!("New goal: x={:.2} y={:.2} theta={:.2}", goal.x, goal.y, theta);
    }

    /// Set one gain coefficient; takes effect on the next PID evaluation
    pub fn set_gain(&self, axis: Axis, term: GainTerm, value: f64) {
        let mut state = self.lock();
        match axis {
            Axis::Linear => state.linear_gains.set(term, value),
            Axis::Angular => state.angular_gains.set(term, value),
        }
        debug!("Gain {:?}/{:?} set to {}", axis, term, value);
    }

    /// Enable or disable publishing of velocity commands
    pub fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
    }
}

/// Destination of velocity commands
pub trait CommandSink {
    fn publish_command(&self, command: &VelocityCommand) -> Result<()>;
}

/// Destination of the per-tick error scalars
pub trait DebugSink {
    fn publish_errors(&self, angular_error: f64, linear_error: f64) -> Result<()>;
}

/// Debug sink that writes the errors to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDebugSink;

impl DebugSink for LogDebugSink {
    fn publish_errors(&self, angular_error: f64, linear_error: f64) -> Result<()> {
        debug!(
            "ERROR -> linear:{:.2}  angular:{:.2}",
            linear_error, angular_error
        );
        Ok(())
    }
}
