//! Discretized foot placement on the planning lattice
//!
//! Positions are snapped to a square grid and yaw to a fixed number of
//! headings. Equality and hashing go through the integer cell, so two
//! nodes built from slightly different continuous values compare equal
//! when they fall in the same cell.

use std::f64::consts::PI;
use std::fmt;

use nalgebra::{Point2, Vector2};

use crate::common::{normalize_angle, Pose2D, RobotSide};

/// Lattice spacing in x and y [m]
pub const GRID_SIZE_XY: f64 = 0.05;
/// Number of discrete headings over a full turn
pub const NUMBER_OF_YAW_CELLS: i32 = 36;
/// Lattice spacing in yaw [rad]
pub const GRID_SIZE_YAW: f64 = 2.0 * PI / NUMBER_OF_YAW_CELLS as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FootstepNode {
    x_index: i32,
    y_index: i32,
    yaw_index: i32,
    side: RobotSide,
}

impl FootstepNode {
    /// Node in the cell containing (x, y, yaw)
    pub fn new(x: f64, y: f64, yaw: f64, side: RobotSide) -> Self {
        Self::from_indices(
            (x / GRID_SIZE_XY).round() as i32,
            (y / GRID_SIZE_XY).round() as i32,
            (normalize_angle(yaw) / GRID_SIZE_YAW).round() as i32,
            side,
        )
    }

    pub fn from_pose(pose: &Pose2D, side: RobotSide) -> Self {
        Self::new(pose.x, pose.y, pose.yaw, side)
    }

    /// Yaw index is wrapped into (-N/2, N/2]
    pub fn from_indices(x_index: i32, y_index: i32, yaw_index: i32, side: RobotSide) -> Self {
        let half = NUMBER_OF_YAW_CELLS / 2;
        let mut yaw_index = yaw_index.rem_euclid(NUMBER_OF_YAW_CELLS);
        if yaw_index > half {
            yaw_index -= NUMBER_OF_YAW_CELLS;
        }
        Self { x_index, y_index, yaw_index, side }
    }

    pub fn x_index(&self) -> i32 {
        self.x_index
    }

    pub fn y_index(&self) -> i32 {
        self.y_index
    }

    pub fn yaw_index(&self) -> i32 {
        self.yaw_index
    }

    pub fn x(&self) -> f64 {
        self.x_index as f64 * GRID_SIZE_XY
    }

    pub fn y(&self) -> f64 {
        self.y_index as f64 * GRID_SIZE_XY
    }

    pub fn yaw(&self) -> f64 {
        self.yaw_index as f64 * GRID_SIZE_YAW
    }

    pub fn side(&self) -> RobotSide {
        self.side
    }

    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x(), self.y())
    }

    pub fn pose(&self) -> Pose2D {
        Pose2D::new(self.x(), self.y(), self.yaw())
    }

    /// Point half the ideal stance width towards the other foot
    pub fn midfoot_point(&self, ideal_footstep_width: f64) -> Point2<f64> {
        let inward = self.side.negate_if_left(0.5 * ideal_footstep_width);
        let local = self.pose().transform_point(0.0, inward);
        Point2::new(local.x, local.y)
    }

    pub fn distance_to(&self, other: &FootstepNode) -> f64 {
        (self.position() - other.position()).norm()
    }

    /// Offset of `other` expressed in this node's heading frame
    pub fn relative_offset(&self, other: &FootstepNode) -> Vector2<f64> {
        let (s, c) = self.yaw().sin_cos();
        let dx = other.x() - self.x();
        let dy = other.y() - self.y();
        Vector2::new(c * dx + s * dy, -s * dx + c * dy)
    }
}

impl fmt::Display for FootstepNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({:.3}, {:.3}, {:.3})", self.side, self.x(), self.y(), self.yaw())
    }
}
