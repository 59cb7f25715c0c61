//! Angle wrapping and yaw/quaternion helpers
//!
//! Orientation travels over the wire as a quaternion; the controller only ever looks at yaw.
//! Quaternions are taken as given and never re-normalized.

use nalgebra::{Quaternion, UnitQuaternion};
use std::f64::consts::PI;

/// Wrap an angle into (-2π, 2π] with a single 4π step.
///
/// This is not a modulo: anything further than 2π past either bound stays out of range.
pub fn reduce_angle(angle: f64) -> f64 {
    if angle > 2.0 * PI {
        angle - 4.0 * PI
    } else if angle <= -2.0 * PI {
        angle + 4.0 * PI
    } else {
        angle
    }
}

/// Extract the yaw (rotation about z) of an orientation quaternion
pub fn yaw_from_quaternion(q: &Quaternion<f64>) -> f64 {
    let (qx, qy, qz, qw) = (q.i, q.j, q.k, q.w);
    (2.0 * (qw * qz + qx * qy)).atan2(1.0 - 2.0 * (qy * qy + qz * qz))
}

/// Quaternion for a pure yaw rotation (zero roll and pitch)
pub fn quaternion_from_yaw(theta: f64) -> Quaternion<f64> {
    UnitQuaternion::from_euler_angles(0.0, 0.0, theta).into_inner()
}

/// Compose `q` with a half turn about the vertical axis
pub fn rotate_yaw_180(q: &Quaternion<f64>) -> Quaternion<f64> {
    q * quaternion_from_yaw(PI)
}

/// Whether a quaternion can be turned into a heading at all
pub fn is_valid_orientation(q: &Quaternion<f64>) -> bool {
    q.coords.iter().all(|c| c.is_finite()) && q.norm() > f64::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_reduce_angle_single_wrap() {
        assert_abs_diff_eq!(reduce_angle(3.0 * PI), -PI, epsilon = 1e-12);
        assert_abs_diff_eq!(reduce_angle(-3.0 * PI), PI, epsilon = 1e-12);
        assert_eq!(reduce_angle(2.0 * PI), 2.0 * PI);
        assert_abs_diff_eq!(reduce_angle(-2.0 * PI), 2.0 * PI, epsilon = 1e-12);
        assert_eq!(reduce_angle(1.0), 1.0);
    }

    #[test]
    fn test_reduce_angle_is_not_a_modulo() {
        // 7π is more than 2π past the bound: one step only
        assert_abs_diff_eq!(reduce_angle(7.0 * PI), 3.0 * PI, epsilon = 1e-12);
    }

    #[test]
    fn test_yaw_round_trip() {
        for &theta in &[0.0, 0.3, -1.2, 2.9, -3.0] {
            let q = quaternion_from_yaw(theta);
            assert_abs_diff_eq!(yaw_from_quaternion(&q), theta, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_identity_has_zero_yaw() {
        assert_eq!(yaw_from_quaternion(&Quaternion::identity()), 0.0);
    }

    #[test]
    fn test_rotate_yaw_180_flips_heading() {
        let flipped = rotate_yaw_180(&quaternion_from_yaw(0.5));
        assert_abs_diff_eq!(yaw_from_quaternion(&flipped), 0.5 - PI, epsilon = 1e-12);

        let flipped = rotate_yaw_180(&Quaternion::identity());
        assert_abs_diff_eq!(yaw_from_quaternion(&flipped).abs(), PI, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_orientation() {
        assert!(is_valid_orientation(&Quaternion::identity()));
        assert!(!is_valid_orientation(&Quaternion::new(0.0, 0.0, 0.0, 0.0)));
        assert!(!is_valid_orientation(&Quaternion::new(f64::NAN, 0.0, 0.0, 1.0)));
    }
}
