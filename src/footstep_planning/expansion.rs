//! Candidate generation for the swing foot
//!
//! The lattice of offsets (forward, lateral, yaw) is computed once from the
//! parameters and then placed in the stance foot's heading frame for each
//! expansion, mirrored for the side of the swing foot.

use std::collections::HashSet;

use itertools::iproduct;

use crate::common::{NodeExpansion, RobotSide};
use crate::footstep_planning::node::{FootstepNode, GRID_SIZE_XY, GRID_SIZE_YAW};
use crate::footstep_planning::parameters::FootstepPlannerParameters;

const GRID_EPSILON: f64 = 1e-9;

/// One lattice offset relative to the stance foot
#[derive(Debug, Clone, Copy, PartialEq)]
struct StepOffset {
    length: f64,
    width: f64,
    yaw_cells: i32,
}

fn index_range(minimum: f64, maximum: f64, resolution: f64) -> std::ops::RangeInclusive<i32> {
    let low = (minimum / resolution - GRID_EPSILON).ceil() as i32;
    let high = (maximum / resolution + GRID_EPSILON).floor() as i32;
    low..=high
}

#[derive(Debug, Clone)]
pub struct ParameterBasedNodeExpansion {
    offsets: Vec<StepOffset>,
}

impl ParameterBasedNodeExpansion {
    pub fn new(parameters: &FootstepPlannerParameters) -> Self {
        let lengths = index_range(parameters.minimum_step_length, parameters.maximum_step_reach, GRID_SIZE_XY);
        let widths = index_range(parameters.minimum_step_width, parameters.maximum_step_width, GRID_SIZE_XY);
        let yaws = index_range(parameters.minimum_step_yaw, parameters.maximum_step_yaw, GRID_SIZE_YAW);

        let offsets = iproduct!(lengths, widths, yaws)
            .map(|(x, y, yaw_cells)| StepOffset {
                length: x as f64 * GRID_SIZE_XY,
                width: y as f64 * GRID_SIZE_XY,
                yaw_cells,
            })
            .filter(|offset| {
                let reach = offset.length.hypot(offset.width - parameters.ideal_footstep_width);
                reach <= parameters.maximum_step_reach + GRID_EPSILON
            })
            .collect();

        Self { offsets }
    }

    pub fn number_of_offsets(&self) -> usize {
        self.offsets.len()
    }
}

impl NodeExpansion for ParameterBasedNodeExpansion {
    fn expand(&self, stance: &FootstepNode) -> Vec<FootstepNode> {
        let swing_side = stance.side().opposite();
        let stance_pose = stance.pose();
        let yaw_sign = match swing_side {
            RobotSide::Left => 1,
            RobotSide::Right => -1,
        };

        let mut seen = HashSet::with_capacity(self.offsets.len());
        let mut children = Vec::with_capacity(self.offsets.len());
        for offset in &self.offsets {
            let lateral = stance.side().negate_if_left(offset.width);
            let position = stance_pose.transform_point(offset.length, lateral);
            let yaw_index = stance.yaw_index() + yaw_sign * offset.yaw_cells;
            let child = FootstepNode::new(position.x, position.y, yaw_index as f64 * GRID_SIZE_YAW, swing_side);
            if seen.insert(child) {
                children.push(child);
            }
        }
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameters() -> FootstepPlannerParameters {
        FootstepPlannerParameters {
            ideal_footstep_width: 0.2,
            maximum_step_reach: 0.41,
            ..Default::default()
        }
    }

    #[test]
    fn test_children_are_on_the_other_side() {
        let expansion = ParameterBasedNodeExpansion::new(&parameters());
        let stance = FootstepNode::new(0.0, 0.2, 0.0, RobotSide::Left);
        let children = expansion.expand(&stance);
        assert!(!children.is_empty());
        assert!(children.iter().all(|child| child.side() == RobotSide::Right));
        assert!(children.iter().all(|child| child.y() < stance.y()));
    }

    #[test]
    fn test_children_respect_reach() {
        let parameters = parameters();
        let expansion = ParameterBasedNodeExpansion::new(&parameters);
        let stance = FootstepNode::new(0.0, 0.0, 0.0, RobotSide::Right);
        for child in expansion.expand(&stance) {
            let offset = stance.relative_offset(&child);
            let width = offset.y;
            let reach = offset.x.hypot(width - parameters.ideal_footstep_width);
            assert!(reach <= parameters.maximum_step_reach + 1e-6, "{} out of reach", child);
        }
    }

    #[test]
    fn test_nominal_forward_step_is_generated() {
        let expansion = ParameterBasedNodeExpansion::new(&parameters());
        let stance = FootstepNode::new(0.0, 0.2, 0.0, RobotSide::Left);
        let expected = FootstepNode::new(0.4, 0.0, 0.0, RobotSide::Right);
        assert!(expansion.expand(&stance).contains(&expected));
    }

    #[test]
    fn test_expansion_is_deterministic_and_unique() {
        let expansion = ParameterBasedNodeExpansion::new(&parameters());
        let stance = FootstepNode::new(0.35, -0.1, 0.7, RobotSide::Right);
        let first = expansion.expand(&stance);
        let second = expansion.expand(&stance);
        assert_eq!(first, second);
        let unique: HashSet<_> = first.iter().collect();
        assert_eq!(unique.len(), first.len());
    }

    #[test]
    fn test_yaw_offsets_are_mirrored() {
        let parameters = FootstepPlannerParameters {
            minimum_step_yaw: 0.0,
            maximum_step_yaw: 0.2,
            ..Default::default()
        };
        let expansion = ParameterBasedNodeExpansion::new(&parameters);
        let left_stance = FootstepNode::new(0.0, 0.2, 0.0, RobotSide::Left);
        let right_stance = FootstepNode::new(0.0, 0.0, 0.0, RobotSide::Right);
        assert!(expansion.expand(&left_stance).iter().all(|child| child.yaw_index() <= 0));
        assert!(expansion.expand(&right_stance).iter().all(|child| child.yaw_index() >= 0));
    }
}
