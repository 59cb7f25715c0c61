use anyhow::{Error, Result};
use log::{info, warn};
use position_control::common::{Axis, GainTerm, Twist2D, VelocityCommand};
use position_control::transport::{CommandSink, DebugSink, GoalPose, PoseEstimate, SharedInputs};
use position_control::{ControlError, ControlLoop, ControllerConfig};
use rclrs::{
    Context, CreateBasicExecutor, Node, RclrsErrorFilter, SpinOptions, QOS_PROFILE_DEFAULT,
};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use builtin_interfaces::msg::Time;
use geometry_msgs::msg::{PoseStamped, Twist};
use nalgebra::Quaternion;
use nav_msgs::msg::Odometry;
use std_msgs::msg::{Bool, Float32};

/// Velocity commands go out as a Twist on cmd_vel
struct CmdVelPublisher(Arc<rclrs::Publisher<Twist>>);

impl CommandSink for CmdVelPublisher {
    fn publish_command(&self, command: &VelocityCommand) -> position_control::Result<()> {
        let mut twist = Twist::default();
        twist.linear.x = command.linear;
        twist.angular.z = command.angular;
        self.0
            .publish(&twist)
            .map_err(|e| ControlError::Transport(e.to_string()))
    }
}

/// Angular and linear error topics
struct ErrorPublishers {
    angular: Arc<rclrs::Publisher<Float32>>,
    linear: Arc<rclrs::Publisher<Float32>>,
}

impl DebugSink for ErrorPublishers {
    fn publish_errors(&self, angular_error: f64, linear_error: f64) -> position_control::Result<()> {
        self.angular
            .publish(&Float32 {
                data: angular_error as f32,
            })
            .map_err(|e| ControlError::Transport(e.to_string()))?;
        self.linear
            .publish(&Float32 {
                data: linear_error as f32,
            })
            .map_err(|e| ControlError::Transport(e.to_string()))
    }
}

fn stamp_to_duration(stamp: &Time) -> Duration {
    Duration::new(stamp.sec.max(0) as u64, stamp.nanosec)
}

struct PositionControllerNode {
    _node: Arc<Node>,
    inputs: SharedInputs,
    control: Mutex<ControlLoop>,
    cmd_vel_publisher: CmdVelPublisher,
    error_publishers: ErrorPublishers,
    _enable_subscription: Arc<rclrs::Subscription<Bool>>,
    _odom_subscription: Arc<rclrs::Subscription<Odometry>>,
    _goal_subscription: Arc<rclrs::Subscription<PoseStamped>>,
    _gain_subscriptions: Vec<Arc<rclrs::Subscription<Float32>>>,
}

impl PositionControllerNode {
    pub fn new(executor: &rclrs::Executor, config: ControllerConfig) -> Result<Arc<Self>> {
        let node = executor.create_node(config.node.name.as_str())?;

        info!(
            "Topics: enable={}, odom={}, goal={}, cmd_vel={}",
            config.topics.enable, config.topics.odom, config.topics.goal, config.topics.cmd_vel
        );
        info!(
            "Initial gains: linear={:?}, angular={:?}",
            config.gains.linear, config.gains.angular
        );

        let inputs = SharedInputs::new(&config);

        let cmd_vel_publisher = CmdVelPublisher(
            node.create_publisher::<Twist>(&config.topics.cmd_vel, QOS_PROFILE_DEFAULT)?,
        );
        let error_publishers = ErrorPublishers {
            angular: node
                .create_publisher::<Float32>(&config.debug_topic("angular"), QOS_PROFILE_DEFAULT)?,
            linear: node
                .create_publisher::<Float32>(&config.debug_topic("linear"), QOS_PROFILE_DEFAULT)?,
        };

        let enable_inputs = inputs.clone();
        let enable_subscription = node.create_subscription::<Bool, _>(
            &config.topics.enable,
            QOS_PROFILE_DEFAULT,
            move |msg: Bool| {
                info!("Controller {}", if msg.data { "enabled" } else { "disabled" });
                enable_inputs.set_enabled(msg.data);
            },
        )?;

        let odom_inputs = inputs.clone();
        let odom_subscription = node.create_subscription::<Odometry, _>(
            &config.topics.odom,
            QOS_PROFILE_DEFAULT,
            move |msg: Odometry| {
                let orientation = &msg.pose.pose.orientation;
                odom_inputs.update_pose(PoseEstimate {
                    x: msg.pose.pose.position.x,
                    y: msg.pose.pose.position.y,
                    orientation: Quaternion::new(
                        orientation.w,
                        orientation.x,
                        orientation.y,
                        orientation.z,
                    ),
                    twist: Twist2D {
                        vx: msg.twist.twist.linear.x,
                        vy: msg.twist.twist.linear.y,
                        vtheta: msg.twist.twist.angular.z,
                    },
                    stamp: stamp_to_duration(&msg.header.stamp),
                });
            },
        )?;

        let goal_inputs = inputs.clone();
        let goal_subscription = node.create_subscription::<PoseStamped, _>(
            &config.topics.goal,
            QOS_PROFILE_DEFAULT,
            move |msg: PoseStamped| {
                info!(
                    "Received new goal: x={}, y={}",
                    msg.pose.position.x, msg.pose.position.y
                );
                let orientation = &msg.pose.orientation;
                goal_inputs.update_goal(GoalPose {
                    x: msg.pose.position.x,
                    y: msg.pose.position.y,
                    orientation: Quaternion::new(
                        orientation.w,
                        orientation.x,
                        orientation.y,
                        orientation.z,
                    ),
                });
            },
        )?;

        let mut gain_subscriptions = Vec::with_capacity(6);
        for (axis, axis_name) in [(Axis::Linear, "linear"), (Axis::Angular, "angular")] {
            for (term, term_name) in [
                (GainTerm::Kp, "kp"),
                (GainTerm::Ki, "ki"),
                (GainTerm::Kd, "kd"),
            ] {
                let gain_inputs = inputs.clone();
                gain_subscriptions.push(node.create_subscription::<Float32, _>(
                    &config.gain_topic(axis_name, term_name),
                    QOS_PROFILE_DEFAULT,
                    move |msg: Float32| {
                        gain_inputs.set_gain(axis, term, f64::from(msg.data));
                    },
                )?);
            }
        }

        let control = ControlLoop::start(config, Instant::now())?;
        let period = control.tick_period()?;

        let position_controller_node = Arc::new(PositionControllerNode {
            _node: node,
            inputs,
            control: Mutex::new(control),
            cmd_vel_publisher,
            error_publishers,
            _enable_subscription: enable_subscription,
            _odom_subscription: odom_subscription,
            _goal_subscription: goal_subscription,
            _gain_subscriptions: gain_subscriptions,
        });

        // The tick thread only holds a weak reference so dropping the node stops it
        let weak_node = Arc::downgrade(&position_controller_node);
        thread::spawn(move || {
            let mut next_tick = Instant::now();
            while let Some(node) = weak_node.upgrade() {
                node.timer_callback();
                drop(node);

                next_tick += period;
                match next_tick.checked_duration_since(Instant::now()) {
                    Some(wait) => thread::sleep(wait),
                    None => next_tick = Instant::now(),
                }
            }
        });

        Ok(position_controller_node)
    }

    fn timer_callback(&self) {
        let mut control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = control.tick(
            &self.inputs,
            Instant::now(),
            &self.cmd_vel_publisher,
            &self.error_publishers,
        ) {
            warn!("Skipping control tick: {}", e);
        }
    }
}

impl Drop for PositionControllerNode {
    fn drop(&mut self) {
        let control = self.control.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = control.shutdown() {
            warn!("Failed to shut down control loop: {}", e);
        }
    }
}

/// Configuration from the first non-ROS argument, `position_controller.toml` in the working
/// directory, or built-in defaults
fn load_config() -> Result<ControllerConfig> {
    let path_arg = std::env::args()
        .skip(1)
        .take_while(|a| a != "--ros-args")
        .find(|a| !a.starts_with("--"));

    if let Some(path) = path_arg {
        info!("Loading configuration from {}", path);
        return Ok(ControllerConfig::load(Path::new(&path))?);
    }

    let local = Path::new("position_controller.toml");
    if local.exists() {
        info!("Loading configuration from {}", local.display());
        Ok(ControllerConfig::load(local)?)
    } else {
        info!("Using default configuration");
        Ok(ControllerConfig::default())
    }
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;

    let mut executor = Context::default_from_env()?.create_basic_executor();

    let _position_controller_node = PositionControllerNode::new(&executor, config)?;

    info!("Position controller initialized. Starting to spin...");

    executor
        .spin(SpinOptions::default())
        .first_error()
        .map_err(|err| err.into())
}
