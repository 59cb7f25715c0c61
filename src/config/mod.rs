//! Configuration loading for the position controller
//!
//! Every field has a default, so an empty file (or no file at all) gives the stock tuning.

use crate::common::GainSet;
use crate::error::{ControlError, Result};
use serde::Deserialize;
use std::f64::consts::FRAC_PI_2;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub variant: ControlVariant,
    #[serde(default)]
    pub gains: GainsConfig,
    #[serde(default)]
    pub velocity: VelocityConfig,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub topics: TopicsConfig,
    #[serde(default)]
    pub odometry: OdometryConfig,
}

/// Which control law the loop runs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlVariant {
    /// Angular PID plus orientation-driven linear speed, no stop condition
    #[default]
    Heading,
    /// Angular and linear PIDs, zero command inside the tolerance band
    Tolerance,
}

/// Node identity and rate
#[derive(Clone, Debug, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_node_name")]
    pub name: String,

    /// Control loop rate (default: 100 Hz)
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f64,

    /// Whether the command output starts enabled (default: true)
    #[serde(default = "default_enabled")]
    pub start_enabled: bool,
}

/// Initial PID gains, overridden at runtime by the gain topics
#[derive(Clone, Debug, Deserialize)]
pub struct GainsConfig {
    #[serde(default = "default_linear_gains")]
    pub linear: GainSet,
    #[serde(default = "default_angular_gains")]
    pub angular: GainSet,
}

/// Bounds of the orientation-driven linear speed mapping
#[derive(Clone, Debug, Deserialize)]
pub struct VelocityConfig {
    /// Linear speed when aligned with the goal in m/s (default: 2.0)
    #[serde(default = "default_max_linear")]
    pub max_linear: f64,

    /// Linear speed at π misalignment in m/s (default: 0.0)
    #[serde(default)]
    pub min_linear: f64,
}

/// Goal tolerance band of the tolerance-gated variant
#[derive(Clone, Debug, Deserialize)]
pub struct ToleranceConfig {
    /// Meters (default: 0.3)
    #[serde(default = "default_linear_tolerance")]
    pub linear: f64,

    /// Radians (default: π/2)
    #[serde(default = "default_angular_tolerance")]
    pub angular: f64,
}

/// Topic names
#[derive(Clone, Debug, Deserialize)]
pub struct TopicsConfig {
    #[serde(default = "default_enable_topic")]
    pub enable: String,
    #[serde(default = "default_odom_topic")]
    pub odom: String,
    #[serde(default = "default_goal_topic")]
    pub goal: String,
    #[serde(default = "default_cmd_vel_topic")]
    pub cmd_vel: String,
    /// Prefix of the `<prefix>/{linear,angular}/{kp,ki,kd}` gain topics
    #[serde(default = "default_gain_prefix")]
    pub gain_prefix: String,
    /// Prefix of the `<prefix>/{angular,linear}/error` debug topics
    #[serde(default = "default_debug_prefix")]
    pub debug_prefix: String,
}

/// Differential-drive geometry for the wheel odometry integrator
#[derive(Clone, Debug, Deserialize)]
pub struct OdometryConfig {
    /// Distance between wheels in meters (default: 0.300)
    #[serde(default = "default_wheel_track")]
    pub wheel_track: f64,

    /// Wheel radius in meters (default: 0.075)
    #[serde(default = "default_wheel_radius")]
    pub wheel_radius: f64,

    /// Encoder ticks per wheel revolution (default: 7200)
    #[serde(default = "default_ticks_per_revolution")]
    pub ticks_per_revolution: f64,

    /// Publish rate in Hz (default: 10)
    #[serde(default = "default_odometry_rate")]
    pub rate_hz: f64,
}

fn default_node_name() -> String {
    "position_controller".to_string()
}
fn default_tick_rate() -> f64 {
    100.0
}
fn default_enabled() -> bool {
    true
}
fn default_linear_gains() -> GainSet {
    GainSet::new(0.5, 0.1, 0.0)
}
fn default_angular_gains() -> GainSet {
    GainSet::new(1.0, 0.0, 0.0)
}
fn default_max_linear() -> f64 {
    2.0
}
fn default_linear_tolerance() -> f64 {
    0.3
}
fn default_angular_tolerance() -> f64 {
    FRAC_PI_2
}
fn default_enable_topic() -> String {
    "/control/on".to_string()
}
fn default_odom_topic() -> String {
    "/odom".to_string()
}
fn default_goal_topic() -> String {
    "/goal_manager/goal/current".to_string()
}
fn default_cmd_vel_topic() -> String {
    "/cmd_vel".to_string()
}
fn default_gain_prefix() -> String {
    "/control/position/setup".to_string()
}
fn default_debug_prefix() -> String {
    "/control/position/debug".to_string()
}
fn default_wheel_track() -> f64 {
    0.300
}
fn default_wheel_radius() -> f64 {
    0.075
}
fn default_ticks_per_revolution() -> f64 {
    2400.0 * 3.0
}
fn default_odometry_rate() -> f64 {
    10.0
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_node_name(),
            tick_rate_hz: default_tick_rate(),
            start_enabled: default_enabled(),
        }
    }
}

impl Default for GainsConfig {
    fn default() -> Self {
        Self {
            linear: default_linear_gains(),
            angular: default_angular_gains(),
        }
    }
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            max_linear: default_max_linear(),
            min_linear: 0.0,
        }
    }
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            linear: default_linear_tolerance(),
            angular: default_angular_tolerance(),
        }
    }
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            enable: default_enable_topic(),
            odom: default_odom_topic(),
            goal: default_goal_topic(),
            cmd_vel: default_cmd_vel_topic(),
            gain_prefix: default_gain_prefix(),
            debug_prefix: default_debug_prefix(),
        }
    }
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            wheel_track: default_wheel_track(),
            wheel_radius: default_wheel_radius(),
            ticks_per_revolution: default_ticks_per_revolution(),
            rate_hz: default_odometry_rate(),
        }
    }
}

/// Period of a loop running at `rate_hz`. Rates that are not finite, not positive, or too far
/// out to give a non-zero period are rejected.
fn rate_period(what: &str, rate_hz: f64) -> Result<Duration> {
    if !rate_hz.is_finite() || rate_hz <= 0.0 {
        return Err(ControlError::Config(format!(
            "{} must be finite and positive, got {}",
            what, rate_hz
        )));
    }
    Duration::try_from_secs_f64(1.0 / rate_hz)
        .ok()
        .filter(|period| !period.is_zero())
        .ok_or_else(|| ControlError::Config(format!("{} of {} is out of range", what, rate_hz)))
}

impl NodeConfig {
    /// Time between two control ticks
    pub fn tick_period(&self) -> Result<Duration> {
        rate_period("tick_rate_hz", self.tick_rate_hz)
    }
}

impl OdometryConfig {
    /// Time between two odometry updates
    pub fn period(&self) -> Result<Duration> {
        rate_period("odometry rate_hz", self.rate_hz)
    }
}

impl ControllerConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: ControllerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.node.tick_period()?;
        if self.velocity.max_linear < self.velocity.min_linear {
            return Err(ControlError::Config(format!(
                "max_linear ({}) is below min_linear ({})",
                self.velocity.max_linear, self.velocity.min_linear
            )));
        }
        if self.tolerance.linear < 0.0 || self.tolerance.angular < 0.0 {
            return Err(ControlError::Config(
                "tolerances must not be negative".to_string(),
            ));
        }
        let odom = &self.odometry;
        if !(odom.wheel_track > 0.0 && odom.wheel_radius > 0.0 && odom.ticks_per_revolution > 0.0)
        {
            return Err(ControlError::Config(
                "wheel geometry must be positive".to_string(),
            ));
        }
        odom.period()?;
        Ok(())
    }

    /// Gain topic for one axis/term, e.g. `/control/position/setup/angular/kp`
    pub fn gain_topic(&self, axis: &str, term: &str) -> String {
        format!("{}/{}/{}", self.topics.gain_prefix, axis, term)
    }

    /// Debug error topic for one axis, e.g. `/control/position/debug/linear/error`
    pub fn debug_topic(&self, axis: &str) -> String {
        format!("{}/{}/error", self.topics.debug_prefix, axis)
    }
}
