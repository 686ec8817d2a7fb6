//! Common types used throughout footstep_planning

use std::f64::consts::PI;
use std::ops::{Index, IndexMut};

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector2};
use serde::{Deserialize, Serialize};

/// Which foot a placement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RobotSide {
    Left,
    Right,
}

impl RobotSide {
    pub const VALUES: [RobotSide; 2] = [RobotSide::Left, RobotSide::Right];

    pub fn opposite(self) -> Self {
        match self {
            RobotSide::Left => RobotSide::Right,
            RobotSide::Right => RobotSide::Left,
        }
    }

    pub fn negate_if_right(self, value: f64) -> f64 {
        match self {
            RobotSide::Left => value,
            RobotSide::Right => -value,
        }
    }

    pub fn negate_if_left(self, value: f64) -> f64 {
        match self {
            RobotSide::Left => -value,
            RobotSide::Right => value,
        }
    }

    fn ordinal(self) -> usize {
        match self {
            RobotSide::Left => 0,
            RobotSide::Right => 1,
        }
    }
}

/// A pair of values, one per foot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SideDependent<T> {
    values: [T; 2],
}

impl<T> SideDependent<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { values: [left, right] }
    }

    pub fn from_fn(mut f: impl FnMut(RobotSide) -> T) -> Self {
        Self::new(f(RobotSide::Left), f(RobotSide::Right))
    }

    pub fn get(&self, side: RobotSide) -> &T {
        &self.values[side.ordinal()]
    }
}

impl<T> Index<RobotSide> for SideDependent<T> {
    type Output = T;

    fn index(&self, side: RobotSide) -> &T {
        &self.values[side.ordinal()]
    }
}

impl<T> IndexMut<RobotSide> for SideDependent<T> {
    fn index_mut(&mut self, side: RobotSide) -> &mut T {
        &mut self.values[side.ordinal()]
    }
}

/// 2D pose (position + orientation)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0, yaw: 0.0 }
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.yaw.is_finite()
    }

    /// Normalize yaw to [-pi, pi]
    pub fn normalize_yaw(&mut self) {
        self.yaw = normalize_angle(self.yaw);
    }

    /// Express a point given in this pose's frame in the parent frame
    pub fn transform_point(&self, local_x: f64, local_y: f64) -> Vector2<f64> {
        let (s, c) = self.yaw.sin_cos();
        Vector2::new(self.x + c * local_x - s * local_y, self.y + s * local_x + c * local_y)
    }

    /// Lift to a 3D pose at the given height with no pitch or roll
    pub fn to_isometry(&self, z: f64) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(self.x, self.y, z),
            UnitQuaternion::from_euler_angles(0.0, 0.0, self.yaw),
        )
    }
}

/// Wrap an angle to [-pi, pi]
pub fn normalize_angle(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Signed difference `a - b` wrapped to [-pi, pi]
pub fn angle_difference(a: f64, b: f64) -> f64 {
    normalize_angle(a - b)
}

/// Yaw of a rigid transform, i.e. the heading of its z-up frame
pub fn yaw_of(transform: &Isometry3<f64>) -> f64 {
    transform.rotation.euler_angles().2
}

/// Pitch of a rigid transform
pub fn pitch_of(transform: &Isometry3<f64>) -> f64 {
    transform.rotation.euler_angles().1
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_robot_side_negation() {
        assert_eq!(RobotSide::Left.negate_if_right(0.3), 0.3);
        assert_eq!(RobotSide::Right.negate_if_right(0.3), -0.3);
        assert_eq!(RobotSide::Left.negate_if_left(0.3), -0.3);
        assert_eq!(RobotSide::Left.opposite(), RobotSide::Right);
    }

    #[test]
    fn test_side_dependent_indexing() {
        let mut widths = SideDependent::new(1.0, 2.0);
        widths[RobotSide::Right] = 3.0;
        assert_eq!(widths[RobotSide::Left], 1.0);
        assert_eq!(*widths.get(RobotSide::Right), 3.0);
    }

    #[test]
    fn test_pose2d_normalize_yaw() {
        let mut pose = Pose2D::new(0.0, 0.0, 4.0);
        pose.normalize_yaw();
        assert!(pose.yaw >= -PI && pose.yaw <= PI);
        assert_relative_eq!(pose.yaw, 4.0 - 2.0 * PI, epsilon = 1e-12);
    }

    #[test]
    fn test_angle_difference_wraps() {
        assert_relative_eq!(angle_difference(3.0, -3.0), 6.0 - 2.0 * PI, epsilon = 1e-12);
        assert_relative_eq!(angle_difference(0.2, 0.1), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_point() {
        let pose = Pose2D::new(1.0, 2.0, PI / 2.0);
        let p = pose.transform_point(1.0, 0.0);
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_yaw_of_isometry() {
        let pose = Pose2D::new(0.0, 0.0, 0.7).to_isometry(0.3);
        assert_relative_eq!(yaw_of(&pose), 0.7, epsilon = 1e-12);
        assert_relative_eq!(pose.translation.z, 0.3);
    }
}
