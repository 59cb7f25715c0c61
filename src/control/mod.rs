//! Position control loop
//!
//! One tick takes a snapshot of the latest inputs, computes the pose error, runs the PID
//! controllers and maps the result into a velocity command. The enable flag only decides
//! whether that command is published; error computation and PID state updates happen on
//! every tick either way.
pub mod pid;
pub mod pose_error;
pub mod velocity;

use self::pid::PidController;
use self::pose_error::{PoseError, PoseErrorResolver};
use self::velocity::VelocityMapper;
use crate::common::{Axis, VelocityCommand};
use crate::config::{ControlVariant, ControllerConfig};
use crate::error::{ControlError, Result};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::transport::{CommandSink, DebugSink, InputSnapshot, SharedInputs};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// Outcome of a single tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub error: PoseError,
    /// Command computed this tick, whether or not it is published
    pub command: VelocityCommand,
    pub enabled: bool,
}

impl TickReport {
    /// The command to forward to the drive, `None` while disabled
    pub fn published(&self) -> Option<&VelocityCommand> {
        self.enabled.then_some(&self.command)
    }
}

/// Fixed-rate position controller
pub struct ControlLoop {
    base: LifecycleNodeBase,
    config: ControllerConfig,
    resolver: PoseErrorResolver,
    mapper: VelocityMapper,
    angular_pid: PidController,
    linear_pid: PidController,
}

impl ControlLoop {
    /// Create an unconfigured control loop; PID timing starts at `now`
    pub fn new(config: ControllerConfig, now: Instant) -> Self {
        let mapper = VelocityMapper::new(config.velocity.max_linear, config.velocity.min_linear);
        ControlLoop {
            base: LifecycleNodeBase::new(&config.node.name),
            config,
            resolver: PoseErrorResolver::new(),
            mapper,
            angular_pid: PidController::new(now),
            linear_pid: PidController::new(now),
        }
    }

    /// Create a control loop and take it straight to `Active`
    pub fn start(config: ControllerConfig, now: Instant) -> Result<Self> {
        let mut control = ControlLoop::new(config, now);
        control.on_configure()?;
        control.on_activate()?;
        Ok(control)
    }

    pub fn state(&self) -> State {
        self.base.get_state()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Time between two ticks at the configured rate
    pub fn tick_period(&self) -> Result<Duration> {
        self.config.node.tick_period()
    }

    /// Bring the loop down from whatever state it is in and finalize it
    pub fn shutdown(&mut self) -> Result<()> {
        if self.base.get_state() == State::Active {
            self.on_deactivate()?;
        }
        if self.base.get_state() == State::Inactive {
            self.on_cleanup()?;
        }
        self.base.finalize();
        info!("Finalized {}", self.base.name);
        Ok(())
    }

    pub fn angular_pid(&self) -> &PidController {
        &self.angular_pid
    }

    pub fn linear_pid(&self) -> &PidController {
        &self.linear_pid
    }

    /// Compute this tick's error and command from a snapshot of the inputs
    pub fn compute(&mut self, snapshot: &InputSnapshot, now: Instant) -> Result<TickReport> {
        if self.base.get_state() != State::Active {
            return Err(ControlError::Lifecycle(format!(
                "{}: tick while {:?}",
                self.base.name,
                self.base.get_state()
            )));
        }

        let (error, command) = match self.config.variant {
            ControlVariant::Heading => self.heading_control(snapshot, now),
            ControlVariant::Tolerance => self.tolerance_control(snapshot, now),
        };

        debug!(
            "SETPOINT -> x:{} y:{} theta:{:.2}",
            snapshot.goal.x, snapshot.goal.y, snapshot.goal.theta
        );
        debug!(
            "DELTA -> x:{:.2}  y:{:.2}  heading:{:?}",
            snapshot.goal.x - snapshot.pose.x,
            snapshot.goal.y - snapshot.pose.y,
            error.heading
        );
        debug!(
            "VELOCITY OUTPUT -> linear:{:.2}  angular:{:.2}",
            command.linear, command.angular
        );

        Ok(TickReport {
            error,
            command,
            enabled: snapshot.enabled,
        })
    }

    fn heading_control(
        &mut self,
        snapshot: &InputSnapshot,
        now: Instant,
    ) -> (PoseError, VelocityCommand) {
        let error = self
            .resolver
            .resolve(&snapshot.pose, &snapshot.goal, &snapshot.orientation);
        let angular = self
            .angular_pid
            .evaluate(snapshot.gains(Axis::Angular), error.orientation, now);
        let command = self.mapper.map(error.orientation, angular, error.heading);
        (error, command)
    }

    fn tolerance_control(
        &mut self,
        snapshot: &InputSnapshot,
        now: Instant,
    ) -> (PoseError, VelocityCommand) {
        let error = self.resolver.resolve_legacy(&snapshot.pose, &snapshot.goal);
        let tolerance = &self.config.tolerance;

        let command = if error.distance.abs() > tolerance.linear
            || error.orientation.abs() > tolerance.angular
        {
            VelocityCommand {
                angular: self
                    .angular_pid
                    .evaluate(snapshot.gains(Axis::Angular), error.orientation, now),
                linear: self
                    .linear_pid
                    .evaluate(snapshot.gains(Axis::Linear), error.distance, now),
            }
        } else {
            debug!("Goal within tolerance");
            VelocityCommand::zero()
        };
        (error, command)
    }

    /// Run one tick against the shared inputs and forward the results.
    ///
    /// Errors always go to `debug`; the command goes to `commands` only while enabled. Sink
    /// failures are logged and do not fail the tick.
    pub fn tick<C, D>(
        &mut self,
        inputs: &SharedInputs,
        now: Instant,
        commands: &C,
        debug: &D,
    ) -> Result<TickReport>
    where
        C: CommandSink + ?Sized,
        D: DebugSink + ?Sized,
    {
        let report = self.compute(&inputs.snapshot(), now)?;

        if let Err(e) = debug.publish_errors(report.error.orientation, report.error.distance) {
            warn!("Failed to publish debug errors: {}", e);
        }

        if let Some(command) = report.published() {
            if let Err(e) = commands.publish_command(command) {
                warn!("Failed to publish velocity command: {}", e);
            }
        }

        Ok(report)
    }
}

impl LifecycleNode for ControlLoop {
    fn on_configure(&mut self) -> Result<()> {
        self.config.validate()?;
        self.base.transition(State::Unconfigured, State::Inactive)?;
        self.mapper = VelocityMapper::new(
            self.config.velocity.max_linear,
            self.config.velocity.min_linear,
        );
        info!(
            "Configured {} ({:?} variant, {} Hz)",
            self.base.name, self.config.variant, self.config.node.tick_rate_hz
        );
        Ok(())
    }

    fn on_activate(&mut self) -> Result<()> {
        self.base.transition(State::Inactive, State::Active)?;
        info!("Activated {}", self.base.name);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<()> {
        self.base.transition(State::Active, State::Inactive)?;
        info!("Deactivated {}", self.base.name);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        self.base.transition(State::Inactive, State::Unconfigured)?;
        let now = Instant::now();
        self.angular_pid.reset(now);
        self.linear_pid.reset(now);
        info!("Cleaned up {}", self.base.name);
        Ok(())
    }
}
