//! Edge cost and heuristic for the footstep search

use nalgebra::Point2;

use crate::common::{angle_difference, RobotSide, SideDependent};
use crate::footstep_planning::node::FootstepNode;
use crate::footstep_planning::parameters::FootstepPlannerParameters;

/// Distance, yaw and height based step cost
#[derive(Debug, Clone)]
pub struct FootstepCostCalculator {
    ideal_footstep_width: f64,
    translation_weight: f64,
    yaw_weight: f64,
    step_up_weight: f64,
    step_down_weight: f64,
    cost_per_step: f64,
}

impl FootstepCostCalculator {
    pub fn new(parameters: &FootstepPlannerParameters) -> Self {
        Self {
            ideal_footstep_width: parameters.ideal_footstep_width,
            translation_weight: parameters.translation_weight,
            yaw_weight: parameters.yaw_weight,
            step_up_weight: parameters.step_up_weight,
            step_down_weight: parameters.step_down_weight,
            cost_per_step: parameters.cost_per_step,
        }
    }

    /// Cost of stepping to `candidate` while standing on `stance`
    ///
    /// `height_change` is the snapped candidate height minus the snapped
    /// stance height.
    pub fn compute_cost(&self, stance: &FootstepNode, candidate: &FootstepNode, height_change: f64) -> f64 {
        let translation = (candidate.midfoot_point(self.ideal_footstep_width)
            - stance.midfoot_point(self.ideal_footstep_width))
        .norm();
        let yaw = angle_difference(candidate.yaw(), stance.yaw()).abs();
        let height = if height_change > 0.0 {
            self.step_up_weight * height_change
        } else {
            self.step_down_weight * -height_change
        };
        self.translation_weight * translation + self.yaw_weight * yaw + height + self.cost_per_step
    }
}

/// Estimate of the remaining cost to the goal stance
///
/// A stance is the last placed foot together with the foot it was placed
/// against, which is the one that moves next. Each term bounds what the
/// matching cost term sums to along any path of lattice steps that keep the
/// stance heading, so with `heuristic_weight <= 1` the estimate does not
/// exceed the true remaining cost on such paths.
#[derive(Debug, Clone)]
pub struct FootstepHeuristicCalculator {
    goal: SideDependent<FootstepNode>,
    goal_midfoot: Point2<f64>,
    goal_side_midfoot: SideDependent<Point2<f64>>,
    ideal_footstep_width: f64,
    translation_weight: f64,
    yaw_weight: f64,
    cost_per_step: f64,
    maximum_step_reach: f64,
    heuristic_weight: f64,
    goal_distance_tolerance: f64,
    goal_yaw_tolerance: f64,
}

impl FootstepHeuristicCalculator {
    pub fn new(parameters: &FootstepPlannerParameters, goal: SideDependent<FootstepNode>) -> Self {
        let width = parameters.ideal_footstep_width;
        let left = goal.get(RobotSide::Left).midfoot_point(width);
        let right = goal.get(RobotSide::Right).midfoot_point(width);
        Self {
            goal,
            goal_midfoot: Point2::from((left.coords + right.coords) * 0.5),
            goal_side_midfoot: SideDependent::new(left, right),
            ideal_footstep_width: width,
            translation_weight: parameters.translation_weight,
            yaw_weight: parameters.yaw_weight,
            cost_per_step: parameters.cost_per_step,
            maximum_step_reach: parameters.maximum_step_reach,
            heuristic_weight: parameters.heuristic_weight,
            goal_distance_tolerance: parameters.goal_distance_tolerance,
            goal_yaw_tolerance: parameters.goal_yaw_tolerance,
        }
    }

    pub fn goal(&self) -> &SideDependent<FootstepNode> {
        &self.goal
    }

    /// Remaining cost estimate for `node` placed against `partner`
    pub fn compute(&self, node: &FootstepNode, partner: Option<&FootstepNode>) -> f64 {
        let distance = (node.midfoot_point(self.ideal_footstep_width) - self.goal_midfoot).norm();
        let distance = (distance - self.goal_distance_tolerance).max(0.0);
        let yaw = angle_difference(node.yaw(), self.goal[node.side()].yaw()).abs();
        let yaw = (yaw - self.goal_yaw_tolerance).max(0.0);
        let minimum_steps = self.minimum_steps(node, partner) as f64;

        self.heuristic_weight
            * (self.translation_weight * distance + self.yaw_weight * yaw + self.cost_per_step * minimum_steps)
    }

    /// Fewest further steps before both feet are at their goals
    ///
    /// The midfoot point moves at most `maximum_step_reach` per step. Feet
    /// alternate, so the foot of `node` is only replaced after an even
    /// number of steps and the partner's foot after an odd number.
    pub fn minimum_steps(&self, node: &FootstepNode, partner: Option<&FootstepNode>) -> usize {
        let own = if self.is_at_goal(node) {
            0
        } else {
            round_up_to_even(self.steps_to_goal(node).max(2))
        };
        let other = match partner {
            Some(partner) if self.is_at_goal(partner) => 0,
            // counted from the partner, which sits one step behind `node`
            Some(partner) => round_up_to_odd(self.steps_to_goal(partner).saturating_sub(1).max(1)),
            None => 1,
        };
        own.max(other)
    }

    fn steps_to_goal(&self, node: &FootstepNode) -> usize {
        let midfoot = node.midfoot_point(self.ideal_footstep_width);
        let distance = (midfoot - self.goal_side_midfoot[node.side()]).norm() - self.goal_distance_tolerance;
        if distance <= 0.0 {
            0
        } else {
            (distance / self.maximum_step_reach - 1e-9).ceil() as usize
        }
    }

    /// True if the node lies within the goal tolerances for its side
    pub fn is_at_goal(&self, node: &FootstepNode) -> bool {
        let goal = &self.goal[node.side()];
        node.distance_to(goal) <= self.goal_distance_tolerance + 1e-9
            && angle_difference(node.yaw(), goal.yaw()).abs() <= self.goal_yaw_tolerance + 1e-9
    }
}

fn round_up_to_even(n: usize) -> usize {
    n + n % 2
}

fn round_up_to_odd(n: usize) -> usize {
    n + (n + 1) % 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parameters() -> FootstepPlannerParameters {
        FootstepPlannerParameters {
            ideal_footstep_width: 0.2,
            ..Default::default()
        }
    }

    fn goal() -> SideDependent<FootstepNode> {
        SideDependent::new(
            FootstepNode::new(1.0, 0.2, 0.0, RobotSide::Left),
            FootstepNode::new(1.0, 0.0, 0.0, RobotSide::Right),
        )
    }

    #[test]
    fn test_straight_step_cost() {
        let parameters = parameters();
        let calculator = FootstepCostCalculator::new(&parameters);
        let stance = FootstepNode::new(0.0, 0.2, 0.0, RobotSide::Left);
        let candidate = FootstepNode::new(0.4, 0.0, 0.0, RobotSide::Right);
        let cost = calculator.compute_cost(&stance, &candidate, 0.0);
        assert_relative_eq!(cost, 0.4 + parameters.cost_per_step, epsilon = 1e-9);
    }

    #[test]
    fn test_height_penalties() {
        let parameters = parameters();
        let calculator = FootstepCostCalculator::new(&parameters);
        let stance = FootstepNode::new(0.0, 0.2, 0.0, RobotSide::Left);
        let candidate = FootstepNode::new(0.0, 0.0, 0.0, RobotSide::Right);
        let flat = calculator.compute_cost(&stance, &candidate, 0.0);
        assert_relative_eq!(calculator.compute_cost(&stance, &candidate, 0.1) - flat, 0.1 * parameters.step_up_weight, epsilon = 1e-12);
        assert_relative_eq!(calculator.compute_cost(&stance, &candidate, -0.1) - flat, 0.1 * parameters.step_down_weight, epsilon = 1e-12);
    }

    #[test]
    fn test_heuristic_vanishes_at_goal() {
        let heuristic = FootstepHeuristicCalculator::new(&parameters(), goal());
        let node = FootstepNode::new(1.0, 0.0, 0.0, RobotSide::Right);
        let partner = FootstepNode::new(1.0, 0.2, 0.0, RobotSide::Left);
        assert_relative_eq!(heuristic.compute(&node, Some(&partner)), 0.0);
        assert!(heuristic.is_at_goal(&node));
        assert!(!heuristic.is_at_goal(&FootstepNode::new(0.8, 0.0, 0.0, RobotSide::Right)));
    }

    #[test]
    fn test_heuristic_does_not_exceed_straight_line_cost() {
        let parameters = parameters();
        let heuristic = FootstepHeuristicCalculator::new(&parameters, goal());
        let calculator = FootstepCostCalculator::new(&parameters);
        let start_stance = FootstepNode::new(0.0, 0.2, 0.0, RobotSide::Left);
        let steps = [
            FootstepNode::new(0.4, 0.0, 0.0, RobotSide::Right),
            FootstepNode::new(0.8, 0.2, 0.0, RobotSide::Left),
            FootstepNode::new(1.0, 0.0, 0.0, RobotSide::Right),
            FootstepNode::new(1.0, 0.2, 0.0, RobotSide::Left),
        ];
        let mut stance = start_stance;
        let mut total = 0.0;
        for step in &steps {
            total += calculator.compute_cost(&stance, step, 0.0);
            stance = *step;
        }
        let start_partner = FootstepNode::new(0.0, 0.0, 0.0, RobotSide::Right);
        assert!(heuristic.compute(&start_stance, Some(&start_partner)) <= total + 1e-9);
    }

    #[test]
    fn test_minimum_steps_follow_foot_alternation() {
        let parameters = FootstepPlannerParameters {
            maximum_step_reach: 0.41,
            ..parameters()
        };
        let heuristic = FootstepHeuristicCalculator::new(&parameters, goal());
        let left_start = FootstepNode::new(0.0, 0.2, 0.0, RobotSide::Left);
        let right_start = FootstepNode::new(0.0, 0.0, 0.0, RobotSide::Right);
        assert_eq!(heuristic.minimum_steps(&left_start, Some(&right_start)), 4);

        // left foot already at its goal, right foot one step away
        let left_goal = FootstepNode::new(1.0, 0.2, 0.0, RobotSide::Left);
        let right_near = FootstepNode::new(0.7, 0.0, 0.0, RobotSide::Right);
        assert_eq!(heuristic.minimum_steps(&left_goal, Some(&right_near)), 1);

        // right foot at its goal but placed last, so the left foot moves next
        let right_goal = FootstepNode::new(1.0, 0.0, 0.0, RobotSide::Right);
        let left_behind = FootstepNode::new(0.7, 0.2, 0.0, RobotSide::Left);
        assert_eq!(heuristic.minimum_steps(&right_goal, Some(&left_behind)), 1);
        assert_eq!(heuristic.minimum_steps(&right_goal, Some(&left_goal)), 0);
        assert_eq!(heuristic.minimum_steps(&left_behind, Some(&right_goal)), 2);
    }
}
