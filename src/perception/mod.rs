//! Perception module: pose sources feeding the controller
pub mod odometry;
