use anyhow::{bail, Context, Result};
use log::{info, warn};
use position_control::common::angles::quaternion_from_yaw;
use position_control::common::{Pose2D, Twist2D, VelocityCommand};
use position_control::control::ControlLoop;
use position_control::transport::{CommandSink, GoalPose, LogDebugSink, PoseEstimate, SharedInputs};
use position_control::{ControlError, ControllerConfig};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

/// Distance at which the simulation counts the goal as reached
const REACH_RADIUS: f64 = 0.05;

/// Rate of the simulated odometry source
const ODOMETRY_RATE_HZ: f64 = 50.0;

struct SimArgs {
    config: ControllerConfig,
    goal: (f64, f64),
    start_theta: f64,
    timeout: Duration,
}

fn parse_args() -> Result<SimArgs> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config = ControllerConfig::default();
    let mut goal = (2.0, 1.0);
    let mut start_theta = 0.0;
    let mut timeout = Duration::from_secs(30);

    let value = |i: usize| -> Result<f64> {
        args.get(i)
            .with_context(|| format!("missing value after {}", args[i - 1]))?
            .parse::<f64>()
            .with_context(|| format!("invalid number after {}", args[i - 1]))
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let path = args.get(i + 1).context("missing path after --config")?;
                info!("Loading configuration from {}", path);
                config = ControllerConfig::load(Path::new(path))?;
                i += 2;
            }
            "--goal" => {
                goal = (value(i + 1)?, value(i + 2)?);
                i += 3;
            }
            "--theta" => {
                start_theta = value(i + 1)?;
                i += 2;
            }
            "--timeout" => {
                timeout = Duration::try_from_secs_f64(value(i + 1)?)
                    .context("--timeout must be a non-negative number of seconds")?;
                i += 2;
            }
            other => bail!(
                "unknown argument {} (usage: control_sim [--config FILE] [--goal X Y] [--theta RAD] [--timeout SECS])",
                other
            ),
        }
    }

    Ok(SimArgs {
        config,
        goal,
        start_theta,
        timeout,
    })
}

/// Hands commands to the simulated drive
struct DriveChannel(watch::Sender<VelocityCommand>);

impl CommandSink for DriveChannel {
    fn publish_command(&self, command: &VelocityCommand) -> position_control::Result<()> {
        self.0
            .send(*command)
            .map_err(|e| ControlError::Transport(e.to_string()))
    }
}

/// Unicycle robot integrating the latest command and reporting its pose like an odometry node
async fn simulate_robot(
    inputs: SharedInputs,
    mut commands: watch::Receiver<VelocityCommand>,
    start_theta: f64,
) {
    let period = Duration::from_secs_f64(1.0 / ODOMETRY_RATE_HZ);
    let dt = period.as_secs_f64();
    let mut ticker = interval(period);
    let started = Instant::now();
    let mut pose = Pose2D::new(0.0, 0.0, start_theta);

    loop {
        ticker.tick().await;
        if commands.has_changed().is_err() {
            break;
        }
        let command = *commands.borrow_and_update();

        pose.x += command.linear * pose.theta.cos() * dt;
        pose.y += command.linear * pose.theta.sin() * dt;
        pose.theta += command.angular * dt;

        inputs.update_pose(PoseEstimate {
            x: pose.x,
            y: pose.y,
            orientation: quaternion_from_yaw(pose.theta),
            twist: Twist2D {
                vx: command.linear * pose.theta.cos(),
                vy: command.linear * pose.theta.sin(),
                vtheta: command.angular,
            },
            stamp: started.elapsed(),
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let inputs = SharedInputs::new(&args.config);
    inputs.update_pose(PoseEstimate {
        x: 0.0,
        y: 0.0,
        orientation: quaternion_from_yaw(args.start_theta),
        twist: Twist2D::default(),
        stamp: Duration::ZERO,
    });
    inputs.update_goal(GoalPose {
        x: args.goal.0,
        y: args.goal.1,
        orientation: quaternion_from_yaw(0.0),
    });

    let mut control = ControlLoop::start(args.config, Instant::now())?;
    info!(
        "Simulating {:?} control toward ({}, {})",
        control.config().variant,
        args.goal.0,
        args.goal.1
    );

    let (command_tx, command_rx) = watch::channel(VelocityCommand::zero());
    let robot = tokio::spawn(simulate_robot(inputs.clone(), command_rx, args.start_theta));
    let drive = DriveChannel(command_tx);

    let mut ticker = interval(control.tick_period()?);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let started = Instant::now();

    loop {
        ticker.tick().await;
        let report = control.tick(&inputs, Instant::now(), &drive, &LogDebugSink)?;

        if report.error.distance.abs() < REACH_RADIUS {
            let pose = inputs.snapshot().pose;
            info!(
                "Goal reached after {:.2}s at ({:.3}, {:.3})",
                started.elapsed().as_secs_f64(),
                pose.x,
                pose.y
            );
            break;
        }
        if started.elapsed() > args.timeout {
            let pose = inputs.snapshot().pose;
            warn!(
                "Timed out after {:?}, robot at ({:.3}, {:.3}), distance error {:.3}",
                args.timeout, pose.x, pose.y, report.error.distance
            );
            break;
        }
    }

    drive.publish_command(&VelocityCommand::zero())?;
    drop(drive);
    robot.await.context("simulated robot task failed")?;

    Ok(())
}
