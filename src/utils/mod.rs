//! Utility modules for footstep_planning

pub mod visualization;

pub use visualization::{colors, LineStyle, PointStyle, Visualizer};
