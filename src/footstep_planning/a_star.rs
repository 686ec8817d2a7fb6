//! A* search over the footstep lattice
//!
//! Nodes live in an arena and refer to their parent by index. The two start
//! feet occupy the first two slots; either may be expanded first, so the
//! plan can begin with whichever foot is cheaper to move. A node's partner
//! is the other foot it was placed against, which for a start foot is the
//! opposite start foot.
//!
//! The search state is the stance, a node together with its partner: the
//! goal test, the step checks and the next swing all depend on both feet,
//! so the closed set and the best known costs are keyed on the pair.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use nalgebra::Isometry3;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::common::{
    FootstepPlanner, NodeExpansion, PlannerError, PlannerListener, PlannerResult, Pose2D, RobotSide, SideDependent,
};
use crate::footstep_planning::checker::{FootstepNodeChecker, RejectionReason};
use crate::footstep_planning::cost::{FootstepCostCalculator, FootstepHeuristicCalculator};
use crate::footstep_planning::expansion::ParameterBasedNodeExpansion;
use crate::footstep_planning::node::FootstepNode;
use crate::footstep_planning::parameters::FootstepPlannerParameters;
use crate::footstep_planning::post_processing::{AreaSplitFractionProcessor, PostProcessingParameters};
use crate::footstep_planning::snapping::{FootstepNodeSnapper, SnapData};
use crate::geometry::TerrainModel;
use crate::swing_planning::{SwingOverTerrainExpander, SwingPlan, SwingPlannerParameters, SwingStatus};

const START_ENTRIES: usize = 2;

/// A placed foot and the foot it was placed against
type Stance = (FootstepNode, Option<FootstepNode>);

/// Target stance of a planning request
///
/// Resolving a goal fails with `InvalidGoal` when a pose is not finite, when
/// the feet are crossed (the right foot is not to the right of the left foot
/// in the left foot's heading frame) or when they are further apart than
/// `maximum_step_width`. A goal with LEFT at y = 0 and RIGHT at y = 0.2,
/// both facing +x, is crossed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanningGoal {
    BothFeet { left: Pose2D, right: Pose2D },
    /// One foot's target; the other is placed at the ideal width beside it
    SingleFoot { side: RobotSide, pose: Pose2D },
}

impl PlanningGoal {
    /// Both feet centred on a body pose
    pub fn from_midfoot_pose(pose: &Pose2D, ideal_footstep_width: f64) -> Self {
        let foot = |side: RobotSide| {
            let position = pose.transform_point(0.0, side.negate_if_right(ideal_footstep_width / 2.0));
            Pose2D::new(position.x, position.y, pose.yaw)
        };
        PlanningGoal::BothFeet {
            left: foot(RobotSide::Left),
            right: foot(RobotSide::Right),
        }
    }

    /// Goal nodes for both feet
    pub fn resolve(&self, parameters: &FootstepPlannerParameters) -> PlannerResult<SideDependent<FootstepNode>> {
        let poses = match *self {
            PlanningGoal::BothFeet { left, right } => SideDependent::new(left, right),
            PlanningGoal::SingleFoot { side, pose } => {
                let position = pose.transform_point(0.0, side.negate_if_left(parameters.ideal_footstep_width));
                let other = Pose2D::new(position.x, position.y, pose.yaw);
                match side {
                    RobotSide::Left => SideDependent::new(pose, other),
                    RobotSide::Right => SideDependent::new(other, pose),
                }
            }
        };

        for side in RobotSide::VALUES {
            if !poses[side].is_finite() {
                return Err(PlannerError::InvalidGoal(format!("{:?} goal pose is not finite", side)));
            }
        }

        // Right foot expressed in the left foot's heading frame
        let left = &poses[RobotSide::Left];
        let right = &poses[RobotSide::Right];
        let (sin, cos) = left.yaw.sin_cos();
        let lateral = -sin * (right.x - left.x) + cos * (right.y - left.y);
        if lateral >= 0.0 {
            return Err(PlannerError::InvalidGoal(format!(
                "goal feet are crossed: the right foot is {:.3} to the left of the left foot",
                lateral
            )));
        }
        if -lateral > parameters.maximum_step_width + 1e-9 {
            return Err(PlannerError::InvalidGoal(format!(
                "goal feet are {:.3} apart, more than the maximum step width {:.3}",
                -lateral, parameters.maximum_step_width
            )));
        }

        Ok(SideDependent::from_fn(|side| FootstepNode::from_pose(&poses[side], side)))
    }
}

#[derive(Debug, Clone)]
pub struct FootstepPlanningRequest {
    /// Current foot poses on the ground plane
    pub start: SideDependent<Pose2D>,
    pub goal: PlanningGoal,
    pub terrain: TerrainModel,
    pub parameters: FootstepPlannerParameters,
    pub swing_parameters: SwingPlannerParameters,
    pub post_processing: PostProcessingParameters,
    /// Wall-clock budget, checked once per pop
    pub timeout: Option<Duration>,
    pub max_iterations: Option<usize>,
    /// Set from another thread to stop the search
    pub cancel: Option<Arc<AtomicBool>>,
}

impl FootstepPlanningRequest {
    pub fn new(start_left: Pose2D, start_right: Pose2D, goal: PlanningGoal, terrain: TerrainModel) -> Self {
        Self {
            start: SideDependent::new(start_left, start_right),
            goal,
            terrain,
            parameters: FootstepPlannerParameters::default(),
            swing_parameters: SwingPlannerParameters::default(),
            post_processing: PostProcessingParameters::default(),
            timeout: None,
            max_iterations: None,
            cancel: None,
        }
    }

    pub fn with_parameters(mut self, parameters: FootstepPlannerParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_swing_parameters(mut self, parameters: SwingPlannerParameters) -> Self {
        self.swing_parameters = parameters;
        self
    }

    pub fn with_post_processing(mut self, parameters: PostProcessingParameters) -> Self {
        self.post_processing = parameters;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn validate(&self) -> PlannerResult<()> {
        for side in RobotSide::VALUES {
            if !self.start[side].is_finite() {
                return Err(PlannerError::invalid_config("start", format!("{:?} start pose is not finite", side)));
            }
        }
        self.parameters.validate()?;
        self.swing_parameters.validate()?;
        self.post_processing.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanningStatus {
    Success,
    /// Wall-clock or iteration budget ran out
    TimedOut,
    /// Every reachable node was expanded without reaching the goal
    NoSolution,
    InvalidGoal,
    InvalidConfig,
    Halted,
}

impl fmt::Display for PlanningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlanningStatus::Success => "success",
            PlanningStatus::TimedOut => "timed out",
            PlanningStatus::NoSolution => "no solution",
            PlanningStatus::InvalidGoal => "invalid goal",
            PlanningStatus::InvalidConfig => "invalid config",
            PlanningStatus::Halted => "halted",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct PlannedFootstep {
    pub node: FootstepNode,
    pub snap_data: SnapData,
    pub swing: Option<SwingPlan>,
    pub transfer_split_fraction: Option<f64>,
    pub transfer_weight_distribution: Option<f64>,
}

impl PlannedFootstep {
    pub fn new(node: FootstepNode, snap_data: SnapData) -> Self {
        Self {
            node,
            snap_data,
            swing: None,
            transfer_split_fraction: None,
            transfer_weight_distribution: None,
        }
    }

    pub fn side(&self) -> RobotSide {
        self.node.side()
    }

    /// True if a swing was planned and could not clear the terrain
    pub fn has_failed_swing(&self) -> bool {
        self.swing
            .as_ref()
            .map_or(false, |swing| swing.status != SwingStatus::SolutionFound)
    }
}

/// Ordered foot placements, start feet excluded
#[derive(Debug, Clone, Default)]
pub struct FootstepPlan {
    pub steps: Vec<PlannedFootstep>,
    /// The path ends short of the goal
    pub is_partial: bool,
    pub final_transfer_split_fraction: Option<f64>,
    pub final_transfer_weight_distribution: Option<f64>,
}

impl FootstepPlan {
    pub fn new(steps: Vec<PlannedFootstep>) -> Self {
        Self {
            steps,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn nodes(&self) -> Vec<FootstepNode> {
        self.steps.iter().map(|step| step.node).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlannerStatistics {
    pub iterations: usize,
    pub expanded_nodes: usize,
    pub accepted_nodes: usize,
    pub rejections: BTreeMap<RejectionReason, usize>,
    pub elapsed: Duration,
}

impl PlannerStatistics {
    pub fn total_rejections(&self) -> usize {
        self.rejections.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectionRecord {
    pub candidate: FootstepNode,
    pub stance: FootstepNode,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone)]
pub struct FootstepPlanningResult {
    pub status: PlanningStatus,
    pub plan: Option<FootstepPlan>,
    pub statistics: PlannerStatistics,
    pub rejection_history: Vec<RejectionRecord>,
}

impl FootstepPlanningResult {
    fn without_plan(status: PlanningStatus, started: Instant) -> Self {
        Self {
            status,
            plan: None,
            statistics: PlannerStatistics {
                elapsed: started.elapsed(),
                ..Default::default()
            },
            rejection_history: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PlanningStatus::Success
    }
}

#[derive(Debug, Clone)]
struct SearchNode {
    node: FootstepNode,
    parent_index: Option<usize>,
    cost: f64,
}

#[derive(Debug)]
struct NodeWithPriority {
    priority: OrderedFloat<f64>,
    order: usize,
    index: usize,
}

impl Eq for NodeWithPriority {}

impl PartialEq for NodeWithPriority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for NodeWithPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior, earlier insertion first on ties
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for NodeWithPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// How the search loop stopped
enum SearchOutcome {
    Goal(usize),
    Exhausted,
    BudgetExceeded,
    Halted,
}

pub struct AStarFootstepPlanner {
    expansion: Option<Box<dyn NodeExpansion>>,
    listeners: Vec<Box<dyn PlannerListener>>,
}

impl Default for AStarFootstepPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl AStarFootstepPlanner {
    /// Planner using the parameter based expansion of each request
    pub fn new() -> Self {
        Self {
            expansion: None,
            listeners: Vec::new(),
        }
    }

    pub fn with_expansion(expansion: Box<dyn NodeExpansion>) -> Self {
        Self {
            expansion: Some(expansion),
            listeners: Vec::new(),
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn PlannerListener>) {
        self.listeners.push(listener);
    }

    fn finish(&mut self, result: FootstepPlanningResult) -> FootstepPlanningResult {
        for listener in self.listeners.iter_mut() {
            listener.planning_finished(result.status);
        }
        info!(
            "Footstep planning finished: {} after {} iterations ({:.1} ms)",
            result.status,
            result.statistics.iterations,
            result.statistics.elapsed.as_secs_f64() * 1e3
        );
        result
    }
}

impl FootstepPlanner for AStarFootstepPlanner {
    fn plan(&mut self, request: &FootstepPlanningRequest) -> FootstepPlanningResult {
        let started = Instant::now();

        if let Err(error) = request.validate() {
            warn!("Rejected planning request: {}", error);
            return self.finish(FootstepPlanningResult::without_plan(PlanningStatus::InvalidConfig, started));
        }
        let goal = match request.goal.resolve(&request.parameters) {
            Ok(goal) => goal,
            Err(error) => {
                warn!("Rejected planning request: {}", error);
                return self.finish(FootstepPlanningResult::without_plan(PlanningStatus::InvalidGoal, started));
            }
        };

        let default_expansion;
        let expansion: &dyn NodeExpansion = match &self.expansion {
            Some(expansion) => expansion.as_ref(),
            None => {
                default_expansion = ParameterBasedNodeExpansion::new(&request.parameters);
                &default_expansion
            }
        };

        let mut search = Search::new(request, goal);
        let outcome = search.run(expansion, &mut self.listeners, started);

        let (status, goal_index, is_partial) = match outcome {
            SearchOutcome::Goal(index) => (PlanningStatus::Success, Some(index), false),
            SearchOutcome::Exhausted => (PlanningStatus::NoSolution, None, false),
            SearchOutcome::BudgetExceeded => {
                warn!("Footstep planning budget exhausted");
                let best = if request.parameters.return_best_effort_plan { search.best_effort_index } else { None };
                (PlanningStatus::TimedOut, best, true)
            }
            SearchOutcome::Halted => {
                let best = if request.parameters.return_best_effort_plan { search.best_effort_index } else { None };
                (PlanningStatus::Halted, best, true)
            }
        };

        let plan = goal_index.map(|index| search.build_plan(index, is_partial));
        search.statistics.elapsed = started.elapsed();

        self.finish(FootstepPlanningResult {
            status,
            plan,
            statistics: search.statistics,
            rejection_history: search.rejection_history,
        })
    }
}

/// State of one planning call
struct Search<'a> {
    request: &'a FootstepPlanningRequest,
    snapper: FootstepNodeSnapper,
    checker: FootstepNodeChecker,
    cost_calculator: FootstepCostCalculator,
    heuristic: FootstepHeuristicCalculator,
    node_storage: Vec<SearchNode>,
    open_set: BinaryHeap<NodeWithPriority>,
    closed_set: HashSet<Stance>,
    best_cost: HashMap<Stance, f64>,
    insertion_counter: usize,
    best_effort_index: Option<usize>,
    best_effort_heuristic: f64,
    statistics: PlannerStatistics,
    rejection_history: Vec<RejectionRecord>,
}

impl<'a> Search<'a> {
    fn new(request: &'a FootstepPlanningRequest, goal: SideDependent<FootstepNode>) -> Self {
        let parameters = &request.parameters;
        let mut search = Self {
            request,
            snapper: FootstepNodeSnapper::new(&request.terrain, parameters),
            checker: FootstepNodeChecker::new(parameters),
            cost_calculator: FootstepCostCalculator::new(parameters),
            heuristic: FootstepHeuristicCalculator::new(parameters, goal),
            node_storage: Vec::new(),
            open_set: BinaryHeap::new(),
            closed_set: HashSet::new(),
            best_cost: HashMap::new(),
            insertion_counter: 0,
            best_effort_index: None,
            best_effort_heuristic: f64::INFINITY,
            statistics: PlannerStatistics::default(),
            rejection_history: Vec::new(),
        };

        let start = SideDependent::from_fn(|side| FootstepNode::from_pose(&request.start[side], side));
        for side in RobotSide::VALUES {
            let node = start[side];
            if !search.snapper.snap(&node).is_snapped() {
                debug!("Start {} is off the terrain, assuming it rests at zero height", node);
                let assumed = SnapData::assumed(node.pose().to_isometry(0.0), search.snapper.footprint().clone());
                search.snapper.insert(node, assumed);
            }
        }
        for side in RobotSide::VALUES {
            let partner = start[side.opposite()];
            search.best_cost.insert((start[side], Some(partner)), 0.0);
            search.push(start[side], None, 0.0, Some(partner));
        }
        search
    }

    fn push(
        &mut self,
        node: FootstepNode,
        parent_index: Option<usize>,
        cost: f64,
        partner: Option<FootstepNode>,
    ) -> usize {
        self.node_storage.push(SearchNode { node, parent_index, cost });
        let index = self.node_storage.len() - 1;
        self.open_set.push(NodeWithPriority {
            priority: OrderedFloat(cost + self.heuristic.compute(&node, partner.as_ref())),
            order: self.insertion_counter,
            index,
        });
        self.insertion_counter += 1;
        index
    }

    /// Index of the other foot this node was placed against
    fn partner(&self, index: usize) -> Option<usize> {
        if index < START_ENTRIES {
            Some(START_ENTRIES - 1 - index)
        } else {
            self.node_storage[index].parent_index
        }
    }

    fn check_budget(&self, started: Instant) -> Option<SearchOutcome> {
        let request = self.request;
        if request
            .cancel
            .as_ref()
            .map_or(false, |flag| flag.load(AtomicOrdering::Relaxed))
        {
            return Some(SearchOutcome::Halted);
        }
        if request.timeout.map_or(false, |timeout| started.elapsed() >= timeout) {
            return Some(SearchOutcome::BudgetExceeded);
        }
        if request
            .max_iterations
            .map_or(false, |max| self.statistics.iterations >= max)
        {
            return Some(SearchOutcome::BudgetExceeded);
        }
        None
    }

    fn snapped_height(&mut self, node: &FootstepNode) -> f64 {
        self.snapper
            .snap(node)
            .transform()
            .map_or(0.0, |transform| transform.translation.vector.z)
    }

    fn run(
        &mut self,
        expansion: &dyn NodeExpansion,
        listeners: &mut [Box<dyn PlannerListener>],
        started: Instant,
    ) -> SearchOutcome {
        while let Some(current_item) = self.open_set.pop() {
            if let Some(outcome) = self.check_budget(started) {
                return outcome;
            }
            self.statistics.iterations += 1;
            for listener in listeners.iter_mut() {
                listener.tick_and_update();
            }
            if self.statistics.iterations % 500 == 0 {
                debug!(
                    "Iteration: {}, Open set size: {}, Closed set size: {}",
                    self.statistics.iterations,
                    self.open_set.len(),
                    self.closed_set.len()
                );
            }

            let current_index = current_item.index;
            let current = self.node_storage[current_index].node;
            let partner = self.partner(current_index).map(|index| self.node_storage[index].node);
            if !self.closed_set.insert((current, partner)) {
                continue;
            }

            if self.heuristic.is_at_goal(&current) && partner.map_or(false, |node| self.heuristic.is_at_goal(&node)) {
                debug!("Found goal after {} iterations", self.statistics.iterations);
                return SearchOutcome::Goal(current_index);
            }

            self.statistics.expanded_nodes += 1;
            let current_cost = self.node_storage[current_index].cost;
            let current_height = self.snapped_height(&current);

            for candidate in expansion.expand(&current) {
                let stance = (candidate, Some(current));
                if self.closed_set.contains(&stance) {
                    continue;
                }

                if let Some(reason) = self
                    .checker
                    .is_node_valid(&mut self.snapper, &candidate, &current, partner.as_ref())
                {
                    *self.statistics.rejections.entry(reason).or_insert(0) += 1;
                    self.rejection_history.push(RejectionRecord {
                        candidate,
                        stance: current,
                        reason,
                    });
                    for listener in listeners.iter_mut() {
                        listener.reject_node(&candidate, &current, reason);
                    }
                    continue;
                }

                let height_change = self.snapped_height(&candidate) - current_height;
                let cost = current_cost + self.cost_calculator.compute_cost(&current, &candidate, height_change);
                if self.best_cost.get(&stance).map_or(false, |&best| best <= cost) {
                    continue;
                }
                self.best_cost.insert(stance, cost);

                let index = self.push(candidate, Some(current_index), cost, Some(current));
                self.statistics.accepted_nodes += 1;
                for listener in listeners.iter_mut() {
                    listener.add_node(&candidate, Some(&current));
                }

                let heuristic = self.heuristic.compute(&candidate, Some(&current));
                if heuristic < self.best_effort_heuristic {
                    self.best_effort_heuristic = heuristic;
                    self.best_effort_index = Some(index);
                }
            }
        }

        debug!("Open set is empty after {} iterations", self.statistics.iterations);
        SearchOutcome::Exhausted
    }

    /// Arena indices from the swing foot's first placement to `last_index`
    ///
    /// The sequence starts with both start feet, in the order they are
    /// stepped away from.
    fn calc_final_sequence(&self, last_index: usize) -> Vec<usize> {
        let mut sequence = Vec::new();
        let mut current_index = Some(last_index);
        while let Some(index) = current_index {
            if index < START_ENTRIES {
                break;
            }
            sequence.push(index);
            current_index = self.node_storage[index].parent_index;
        }

        let first_stance = match sequence.last() {
            Some(&first) => self.node_storage[first].parent_index,
            None => None,
        };
        if let Some(stance) = first_stance {
            sequence.push(stance);
            if let Some(start_of_swing) = self.partner(stance) {
                sequence.push(start_of_swing);
            }
        }
        sequence.reverse();
        sequence
    }

    fn build_plan(&mut self, last_index: usize, is_partial: bool) -> FootstepPlan {
        let sequence = self.calc_final_sequence(last_index);
        let offset = sequence.iter().take_while(|&&index| index < START_ENTRIES).count();

        let transforms: Vec<_> = sequence
            .iter()
            .map(|&index| {
                let node = self.node_storage[index].node;
                self.snapper.snap(&node).transform().copied()
            })
            .collect();

        let mut steps = Vec::with_capacity(sequence.len() - offset);
        for (k, &index) in sequence.iter().enumerate().skip(offset) {
            let node = self.node_storage[index].node;
            let mut step = PlannedFootstep::new(node, self.snapper.snap(&node));
            if self.request.parameters.swing_planning_enabled && k >= 2 {
                step.swing = self.plan_swing(&node, transforms[k - 2], transforms[k], transforms[k - 1]);
            }
            steps.push(step);
        }

        let mut plan = FootstepPlan {
            steps,
            is_partial,
            ..Default::default()
        };
        let processor = AreaSplitFractionProcessor::new(self.request.post_processing.clone());
        if processor.is_active() {
            processor.process(&mut plan);
        }
        plan
    }

    fn plan_swing(
        &self,
        node: &FootstepNode,
        start: Option<Isometry3<f64>>,
        end: Option<Isometry3<f64>>,
        stance: Option<Isometry3<f64>>,
    ) -> Option<SwingPlan> {
        let (start, end, stance) = (start?, end?, stance?);
        let expander = SwingOverTerrainExpander::new(self.request.swing_parameters.clone());
        match expander.expand(&start, &end, &stance, &self.request.terrain) {
            Ok(swing) => {
                if swing.status != SwingStatus::SolutionFound {
                    warn!("No collision free swing to {}", node);
                }
                Some(swing)
            }
            Err(error) => {
                warn!("Swing planning to {} failed: {}", node, error);
                None
            }
        }
    }
}
