//! footstep_planning - footstep planning for bipedal robots on rough terrain
//!
//! Lattice A* over discrete foot placements, snapping each candidate onto
//! convex planar regions, checking it against the stance foot's reach
//! envelope, and expanding collision free swing trajectories between the
//! placements of the resulting plan.

// Core modules
pub mod common;
pub mod geometry;
pub mod utils;

// Algorithm modules
pub mod footstep_planning;
pub mod swing_planning;

// Re-export common types for convenience
pub use common::{FootstepPlanner, NodeExpansion, PlannerListener};
pub use common::{PlannerError, PlannerResult};
pub use common::{Pose2D, RobotSide, SideDependent};
pub use footstep_planning::{
    AStarFootstepPlanner, FootstepNode, FootstepPlan, FootstepPlannerParameters, FootstepPlanningRequest,
    FootstepPlanningResult, PlanningGoal, PlanningStatus, RejectionReason,
};
pub use geometry::{ConvexPolygon2D, PlanarRegion, TerrainModel};
pub use swing_planning::{SwingOverTerrainExpander, SwingPlan, SwingPlannerParameters, SwingStatus};
