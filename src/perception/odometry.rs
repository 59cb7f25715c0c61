//! Wheel odometry for a differential-drive base
//!
//! Position is integrated from encoder tick deltas along an arc about the instantaneous
//! centre of curvature. Heading comes from the IMU yaw relative to a zero reference that is
//! re-taken on every reset.

use crate::common::angles::quaternion_from_yaw;
use crate::common::{Pose2D, Twist2D};
use crate::config::OdometryConfig;
use nalgebra::Quaternion;
use std::f64::consts::PI;

/// Output of one odometry update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OdometryEstimate {
    pub pose: Pose2D,
    pub orientation: Quaternion<f64>,
    pub twist: Twist2D,
}

/// Integrates encoder ticks and IMU yaw into a pose
#[derive(Debug, Clone)]
pub struct WheelOdometry {
    config: OdometryConfig,
    last_left_ticks: f64,
    last_right_ticks: f64,
    pose: Pose2D,
    twist: Twist2D,
    zero_reference: f64,
    last_imu_yaw: f64,
}

impl WheelOdometry {
    pub fn new(config: OdometryConfig) -> Self {
        WheelOdometry {
            config,
            last_left_ticks: 0.0,
            last_right_ticks: 0.0,
            pose: Pose2D::default(),
            twist: Twist2D::default(),
            zero_reference: 0.0,
            last_imu_yaw: 0.0,
        }
    }

    fn ticks_to_meters(&self, ticks: f64) -> f64 {
        2.0 * PI * self.config.wheel_radius * ticks / self.config.ticks_per_revolution
    }

    /// Advance the estimate with absolute tick counts and the IMU yaw, `dt` seconds after the
    /// previous update
    pub fn update(
        &mut self,
        left_ticks: f64,
        right_ticks: f64,
        imu_yaw: f64,
        dt: f64,
    ) -> OdometryEstimate {
        let dl = self.ticks_to_meters(left_ticks - self.last_left_ticks);
        let dr = self.ticks_to_meters(right_ticks - self.last_right_ticks);
        let dc = (dl + dr) / 2.0;
        let dtheta = (dr - dl) / self.config.wheel_track;

        let Pose2D { x, y, theta } = self.pose;
        let (dx, dy) = if dr == dl {
            (dr * theta.cos(), dr * theta.sin())
        } else {
            let radius = dc / dtheta;
            let icc_x = x - radius * theta.sin();
            let icc_y = y + radius * theta.cos();

            (
                dtheta.cos() * (x - icc_x) - dtheta.sin() * (y - icc_y) + icc_x - x,
                dtheta.sin() * (x - icc_x) + dtheta.cos() * (y - icc_y) + icc_y - y,
            )
        };

        self.pose.x += dx;
        self.pose.y += dy;
        self.pose.theta = imu_yaw - self.zero_reference;
        self.last_imu_yaw = imu_yaw;

        if dt > 0.0 {
            self.twist = Twist2D {
                vx: dx / dt,
                vy: dy / dt,
                vtheta: dtheta / dt,
            };
        }

        self.last_left_ticks = left_ticks;
        self.last_right_ticks = right_ticks;

        self.estimate()
    }

    /// Zero the position and take the latest IMU yaw as the new zero heading
    pub fn reset(&mut self) {
        self.zero_reference = self.last_imu_yaw;
        self.pose = Pose2D::new(0.0, 0.0, 0.0);
    }

    pub fn estimate(&self) -> OdometryEstimate {
        OdometryEstimate {
            pose: self.pose,
            orientation: quaternion_from_yaw(self.pose.theta),
            twist: self.twist,
        }
    }
}
