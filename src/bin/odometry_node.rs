use anyhow::{Error, Result};
use log::{debug, info, warn};
use position_control::perception::odometry::{OdometryEstimate, WheelOdometry};
use position_control::ControllerConfig;
use rclrs::{
    Context, CreateBasicExecutor, Node, RclrsErrorFilter, SpinOptions, QOS_PROFILE_DEFAULT,
};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use builtin_interfaces::msg::Time;
use nav_msgs::msg::Odometry;
use std_msgs::msg::{Bool, Float32};

const LEFT_TICKS_TOPIC: &str = "power/status/distance/ticks/left";
const RIGHT_TICKS_TOPIC: &str = "power/status/distance/ticks/right";
const IMU_YAW_TOPIC: &str = "sensor/imu/yaw";
const RESET_TOPIC: &str = "/odom/reset";
const ODOM_TOPIC: &str = "odom";

/// Latest raw readings, written by the subscriptions
#[derive(Debug, Default)]
struct RawReadings {
    left_ticks: f64,
    right_ticks: f64,
    imu_yaw: f64,
    reset_requested: bool,
}

struct OdometryNode {
    _node: Arc<Node>,
    readings: Arc<Mutex<RawReadings>>,
    odometry: Mutex<WheelOdometry>,
    last_update: Mutex<Instant>,
    odom_publisher: Arc<rclrs::Publisher<Odometry>>,
    _subscriptions: (
        Arc<rclrs::Subscription<Float32>>,
        Arc<rclrs::Subscription<Float32>>,
        Arc<rclrs::Subscription<Float32>>,
        Arc<rclrs::Subscription<Bool>>,
    ),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `Time` for a duration since the epoch, saturating seconds past the `i32` range
fn stamp_from(since_epoch: Duration) -> Time {
    Time {
        sec: i32::try_from(since_epoch.as_secs()).unwrap_or(i32::MAX),
        nanosec: since_epoch.subsec_nanos(),
    }
}

fn now_stamp() -> Time {
    stamp_from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO),
    )
}

fn to_message(estimate: &OdometryEstimate) -> Odometry {
    let mut odom = Odometry::default();
    odom.header.stamp = now_stamp();
    odom.header.frame_id = "odom".to_string();
    odom.child_frame_id = "base_link".to_string();

    odom.pose.pose.position.x = estimate.pose.x;
    odom.pose.pose.position.y = estimate.pose.y;
    odom.pose.pose.orientation.x = estimate.orientation.i;
    odom.pose.pose.orientation.y = estimate.orientation.j;
    odom.pose.pose.orientation.z = estimate.orientation.k;
    odom.pose.pose.orientation.w = estimate.orientation.w;

    odom.twist.twist.linear.x = estimate.twist.vx;
    odom.twist.twist.linear.y = estimate.twist.vy;
    odom.twist.twist.angular.z = estimate.twist.vtheta;
    odom
}

impl OdometryNode {
    pub fn new(executor: &rclrs::Executor, config: &ControllerConfig) -> Result<Arc<Self>> {
        let node = executor.create_node("odometry_publisher")?;
        let readings = Arc::new(Mutex::new(RawReadings::default()));

        let odom_publisher = node.create_publisher::<Odometry>(ODOM_TOPIC, QOS_PROFILE_DEFAULT)?;

        let left = Arc::clone(&readings);
        let left_subscription = node.create_subscription::<Float32, _>(
            LEFT_TICKS_TOPIC,
            QOS_PROFILE_DEFAULT,
            move |msg: Float32| lock(&left).left_ticks = f64::from(msg.data),
        )?;

        let right = Arc::clone(&readings);
        let right_subscription = node.create_subscription::<Float32, _>(
            RIGHT_TICKS_TOPIC,
            QOS_PROFILE_DEFAULT,
            move |msg: Float32| lock(&right).right_ticks = f64::from(msg.data),
        )?;

        let yaw = Arc::clone(&readings);
        let yaw_subscription = node.create_subscription::<Float32, _>(
            IMU_YAW_TOPIC,
            QOS_PROFILE_DEFAULT,
            move |msg: Float32| lock(&yaw).imu_yaw = f64::from(msg.data),
        )?;

        let reset = Arc::clone(&readings);
        let reset_subscription = node.create_subscription::<Bool, _>(
            RESET_TOPIC,
            QOS_PROFILE_DEFAULT,
            move |msg: Bool| {
                if msg.data {
                    lock(&reset).reset_requested = true;
                }
            },
        )?;

        info!(
            "Wheel geometry: track={} m, radius={} m, {} ticks/rev, {} Hz",
            config.odometry.wheel_track,
            config.odometry.wheel_radius,
            config.odometry.ticks_per_revolution,
            config.odometry.rate_hz
        );

        let odometry_node = Arc::new(OdometryNode {
            _node: node,
            readings,
            odometry: Mutex::new(WheelOdometry::new(config.odometry.clone())),
            last_update: Mutex::new(Instant::now()),
            odom_publisher,
            _subscriptions: (
                left_subscription,
                right_subscription,
                yaw_subscription,
                reset_subscription,
            ),
        });

        let period = config.odometry.period()?;
        let weak_node = Arc::downgrade(&odometry_node);
        thread::spawn(move || {
            while let Some(node) = weak_node.upgrade() {
                node.timer_callback();
                drop(node);
                thread::sleep(period);
            }
        });

        Ok(odometry_node)
    }

    fn timer_callback(&self) {
        let (left, right, imu_yaw, reset) = {
            let mut readings = lock(&self.readings);
            let reset = std::mem::take(&mut readings.reset_requested);
            (readings.left_ticks, readings.right_ticks, readings.imu_yaw, reset)
        };

        let now = Instant::now();
        let dt = {
            let mut last_update = lock(&self.last_update);
            let dt = now.duration_since(*last_update).as_secs_f64();
            *last_update = now;
            dt
        };

        let estimate = {
            let mut odometry = lock(&self.odometry);
            odometry.update(left, right, imu_yaw, dt);
            if reset {
                info!("Resetting odometry");
                odometry.reset();
            }
            odometry.estimate()
        };

        debug!(
            "X:{:.3} | Y:{:.3} | Theta:{:.3}",
            estimate.pose.x, estimate.pose.y, estimate.pose.theta
        );

        if let Err(e) = self.odom_publisher.publish(&to_message(&estimate)) {
            warn!("Failed to publish odometry: {}", e);
        }
    }
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args()
        .skip(1)
        .take_while(|a| a != "--ros-args")
        .find(|a| !a.starts_with("--"))
    {
        Some(path) => ControllerConfig::load(Path::new(&path))?,
        None => ControllerConfig::default(),
    };

    let mut executor = Context::default_from_env()?.create_basic_executor();

    let _odometry_node = OdometryNode::new(&executor, &config)?;

    info!("Odometry node initialized. Starting to spin...");

    executor
        .spin(SpinOptions::default())
        .first_error()
        .map_err(|err| err.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_saturates_seconds() {
        let stamp = stamp_from(Duration::new(1_700_000_000, 250));
        assert_eq!(stamp.sec, 1_700_000_000);
        assert_eq!(stamp.nanosec, 250);

        let stamp = stamp_from(Duration::from_secs(u64::from(u32::MAX) + 5));
        assert_eq!(stamp.sec, i32::MAX);
    }
}
