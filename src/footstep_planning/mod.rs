//! Footstep planning over planar-region terrain
//!
//! Lattice A* search in which every candidate placement is snapped onto
//! the terrain, checked against the reachability envelope of the stance
//! foot, and costed before entering the open set.

pub mod a_star;
pub mod checker;
pub mod cost;
pub mod expansion;
pub mod node;
pub mod parameters;
pub mod post_processing;
pub mod snapping;
pub mod wiggle;

pub use a_star::{
    AStarFootstepPlanner, FootstepPlan, FootstepPlanningRequest, FootstepPlanningResult, PlanningGoal, PlannedFootstep,
    PlannerStatistics, PlanningStatus, RejectionRecord,
};
pub use checker::{FootstepNodeChecker, FootstepPoseChecker, RejectionReason};
pub use cost::{FootstepCostCalculator, FootstepHeuristicCalculator};
pub use expansion::ParameterBasedNodeExpansion;
pub use node::{FootstepNode, GRID_SIZE_XY, GRID_SIZE_YAW, NUMBER_OF_YAW_CELLS};
pub use parameters::FootstepPlannerParameters;
pub use post_processing::{AreaSplitFractionProcessor, PostProcessingParameters};
pub use snapping::{FootstepNodeSnapper, SnapData};
pub use wiggle::{CandidateComparison, PolygonWiggler, TieBreak, WiggleParameters};
