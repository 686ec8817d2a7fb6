//! Geometric primitives for terrain and footholds

pub mod convex_polygon;
pub mod plane;
pub mod planar_region;

pub use convex_polygon::*;
pub use plane::*;
pub use planar_region::*;
