//! Swing foot trajectory planning over planar regions

pub mod expander;
pub mod spline;
pub mod trajectory;

pub use expander::*;
pub use spline::CubicSpline;
pub use trajectory::TwoWaypointSwingTrajectory;
