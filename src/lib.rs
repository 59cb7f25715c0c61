//! Closed-loop position controller for a differential-drive robot.
//!
//! A goal pose and a stream of pose estimates go in, a linear/angular velocity command comes
//! out at a fixed rate. The controller drives forward or backward depending on which end of
//! the robot faces the goal.
pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod perception;
pub mod transport;

pub use crate::common::{GainSet, Heading, Pose2D, VelocityCommand};
pub use crate::config::{ControlVariant, ControllerConfig};
pub use crate::control::{ControlLoop, TickReport};
pub use crate::error::{ControlError, Result};
pub use crate::transport::{CommandSink, DebugSink, SharedInputs};
