//! Common traits defining the seams of the planner

use crate::footstep_planning::{
    FootstepNode, FootstepPlanningRequest, FootstepPlanningResult, PlanningStatus, RejectionReason,
};

/// Trait for footstep planners
pub trait FootstepPlanner {
    /// Plan a footstep sequence for the request
    fn plan(&mut self, request: &FootstepPlanningRequest) -> FootstepPlanningResult;
}

/// Trait for expansion policies
///
/// Implementations must be deterministic: the same stance node always
/// yields the same candidates in the same order.
pub trait NodeExpansion {
    /// Candidate placements of the swing foot given the stance node
    fn expand(&self, stance: &FootstepNode) -> Vec<FootstepNode>;
}

/// Receives search events, for diagnostics
pub trait PlannerListener {
    /// A child was accepted into the open set
    fn add_node(&mut self, _node: &FootstepNode, _parent: Option<&FootstepNode>) {}

    /// A candidate was pruned
    fn reject_node(&mut self, _node: &FootstepNode, _stance: &FootstepNode, _reason: RejectionReason) {}

    /// Called once per open-set pop
    fn tick_and_update(&mut self) {}

    /// Called once when the search ends
    fn planning_finished(&mut self, _status: PlanningStatus) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RobotSide;

    struct MirrorExpansion;

    impl NodeExpansion for MirrorExpansion {
        fn expand(&self, stance: &FootstepNode) -> Vec<FootstepNode> {
            let y = stance.side().negate_if_left(0.2);
            vec![FootstepNode::new(stance.x() + 0.1, stance.y() + y, stance.yaw(), stance.side().opposite())]
        }
    }

    #[derive(Default)]
    struct CountingListener {
        rejections: usize,
    }

    impl PlannerListener for CountingListener {
        fn reject_node(&mut self, _node: &FootstepNode, _stance: &FootstepNode, _reason: RejectionReason) {
            self.rejections += 1;
        }
    }

    #[test]
    fn test_node_expansion_trait() {
        let stance = FootstepNode::new(0.0, 0.1, 0.0, RobotSide::Left);
        let children = MirrorExpansion.expand(&stance);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].side(), RobotSide::Right);
        assert!(children[0].y() < stance.y());
    }

    #[test]
    fn test_listener_default_methods() {
        let mut listener = CountingListener::default();
        let node = FootstepNode::new(0.0, 0.0, 0.0, RobotSide::Left);
        listener.add_node(&node, None);
        listener.tick_and_update();
        listener.reject_node(&node, &node, RejectionReason::StepInPlace);
        assert_eq!(listener.rejections, 1);
    }
}
