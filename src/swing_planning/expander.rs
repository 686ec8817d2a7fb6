//! Swing waypoint adjustment over planar-region terrain
//!
//! The swing foot is modelled as a sphere of radius `foot_length / 2`. Two
//! waypoints are placed above the straight swing line and pushed away from
//! any region the sphere would come closer to than the clearance. Points
//! near the ground under the swing, or behind the start and end feet, are
//! not counted as collisions.

use std::f64::consts::PI;
use std::path::Path;

use log::{debug, trace};
use nalgebra::{Isometry3, Point3, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::common::PlannerResult;
use crate::footstep_planning::parameters::{require, require_finite, require_non_negative, require_positive};
use crate::geometry::{PlanarRegion, Plane3D, TerrainModel};
use crate::swing_planning::trajectory::TwoWaypointSwingTrajectory;

/// Start and end closer than this are treated as coincident
const COINCIDENT_EPSILON: f64 = 1e-8;
const COINCIDENT_NUDGE: f64 = 1e-4;
const SPEED_SAMPLES: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwingPlannerParameters {
    /// Waypoint height above the higher adjacent foot
    pub minimum_swing_height: f64,
    pub maximum_swing_height: f64,
    /// Diameter of the collision sphere around the swing foot
    pub foot_length: f64,
    /// Fractions of the start to end line where the waypoints sit
    pub swing_waypoint_proportions: [f64; 2],
    /// Vertical foot velocity at touchdown
    pub touchdown_velocity: f64,
    /// Check the waypoint polyline before sampling the spline
    pub do_initial_fast_approximation: bool,
    pub number_of_checkpoints: usize,
    /// Shared budget for fast and sampled passes
    pub maximum_number_of_tries: usize,
    pub minimum_swing_foot_clearance: f64,
    /// Waypoint displacement per adjustment
    pub incremental_adjustment_distance: f64,
    /// Largest displacement of either waypoint from its initial placement
    pub maximum_adjustment_distance: f64,
    pub minimum_fraction_of_swing_for_collision_check: f64,
    pub maximum_fraction_of_swing_for_collision_check: f64,
    /// Closest points lower than this over the ground under the swing are ignored
    pub minimum_height_above_floor_for_collision: f64,
}

impl Default for SwingPlannerParameters {
    fn default() -> Self {
        Self {
            minimum_swing_height: 0.1,
            maximum_swing_height: 0.3,
            foot_length: 0.22,
            swing_waypoint_proportions: [0.15, 0.85],
            touchdown_velocity: -0.3,
            do_initial_fast_approximation: true,
            number_of_checkpoints: 100,
            maximum_number_of_tries: 50,
            minimum_swing_foot_clearance: 0.04,
            incremental_adjustment_distance: 0.03,
            maximum_adjustment_distance: 0.2,
            minimum_fraction_of_swing_for_collision_check: 0.0,
            maximum_fraction_of_swing_for_collision_check: 1.0,
            minimum_height_above_floor_for_collision: 0.02,
        }
    }
}

impl SwingPlannerParameters {
    pub fn from_toml_str(content: &str) -> PlannerResult<Self> {
        let parameters: Self = toml::from_str(content)?;
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> PlannerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> PlannerResult<()> {
        require_non_negative(self.minimum_swing_height, "minimum_swing_height")?;
        require_positive(self.maximum_swing_height, "maximum_swing_height")?;
        require(
            self.minimum_swing_height <= self.maximum_swing_height,
            "minimum_swing_height",
            "must not exceed maximum_swing_height",
        )?;
        require_positive(self.foot_length, "foot_length")?;
        let [first, second] = self.swing_waypoint_proportions;
        require(
            0.0 < first && first < second && second < 1.0,
            "swing_waypoint_proportions",
            format!("must be increasing within (0, 1), got [{}, {}]", first, second),
        )?;
        require_finite(self.touchdown_velocity, "touchdown_velocity")?;
        require(self.number_of_checkpoints > 0, "number_of_checkpoints", "must be positive")?;
        require(self.maximum_number_of_tries > 0, "maximum_number_of_tries", "must be positive")?;
        require_non_negative(self.minimum_swing_foot_clearance, "minimum_swing_foot_clearance")?;
        require_positive(self.incremental_adjustment_distance, "incremental_adjustment_distance")?;
        require_non_negative(self.maximum_adjustment_distance, "maximum_adjustment_distance")?;
        let (low, high) = (
            self.minimum_fraction_of_swing_for_collision_check,
            self.maximum_fraction_of_swing_for_collision_check,
        );
        require(
            (0.0..=1.0).contains(&low) && (0.0..=1.0).contains(&high) && low <= high,
            "minimum_fraction_of_swing_for_collision_check",
            format!("collision check window [{}, {}] must lie within [0, 1]", low, high),
        )?;
        require_non_negative(
            self.minimum_height_above_floor_for_collision,
            "minimum_height_above_floor_for_collision",
        )?;
        Ok(())
    }

    pub fn collision_sphere_radius(&self) -> f64 {
        self.foot_length / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingStatus {
    SolutionFound,
    AdjustmentLimitExceeded,
}

/// Worst interaction seen between the swing and the terrain, mildest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SwingCollisionType {
    NoIntersection,
    IntersectionButBelowIgnorePlane,
    IntersectionButOutsideTrajectory,
    CriticalIntersection,
}

#[derive(Debug, Clone)]
pub struct SwingPlan {
    pub status: SwingStatus,
    pub waypoints: [Point3<f64>; 2],
    /// Waypoints before any adjustment
    pub initial_waypoints: [Point3<f64>; 2],
    pub trajectory: TwoWaypointSwingTrajectory,
    pub max_swing_speed: f64,
    pub most_severe_collision: SwingCollisionType,
    pub were_waypoints_adjusted: bool,
    pub number_of_tries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchState {
    Searching,
    Done(SwingStatus),
}

pub struct SwingOverTerrainExpander {
    parameters: SwingPlannerParameters,
}

impl SwingOverTerrainExpander {
    pub fn new(parameters: SwingPlannerParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &SwingPlannerParameters {
        &self.parameters
    }

    /// Plan the swing from `swing_start` to `swing_end` while standing on `stance`
    ///
    /// Only the translations of the swing poses are used; the waypoint model
    /// does not depend on the stance foot. Errors are limited to a
    /// degenerate trajectory fit.
    pub fn expand(
        &self,
        swing_start: &Isometry3<f64>,
        swing_end: &Isometry3<f64>,
        _stance: &Isometry3<f64>,
        terrain: &TerrainModel,
    ) -> PlannerResult<SwingPlan> {
        let params = &self.parameters;
        let start = Point3::from(swing_start.translation.vector);
        let mut end = Point3::from(swing_end.translation.vector);

        let initial_waypoints = self.initial_waypoints(&start, &end);
        let mid_ground = Point3::from(
            (initial_waypoints[0].coords + initial_waypoints[1].coords) * 0.5
                - Vector3::z() * params.minimum_swing_height,
        );

        if (end - start).norm() < COINCIDENT_EPSILON {
            end += Vector3::repeat(COINCIDENT_NUDGE);
        }

        let adjustment_axis = Plane3D::from_points(&start, &initial_waypoints[0], &end)
            .map(|plane| *plane.normal())
            .unwrap_or_else(|| fallback_axis(&(end - start)));
        let adjustment_axis = Unit::new_normalize(adjustment_axis);

        let backwards = (start - end).normalize();
        let floor_normal = Rotation3::from_axis_angle(&adjustment_axis, PI / 2.0) * backwards;
        let radius = params.collision_sphere_radius();
        let forwards = -backwards;

        let regions = terrain.regions_near_segment(
            &start,
            &end,
            params.maximum_swing_height + radius + 2.0 * params.minimum_swing_foot_clearance,
        );

        let mut search = SwingSearch {
            params,
            start,
            end,
            initial_waypoints,
            waypoints: initial_waypoints,
            mid_ground,
            adjustment_axis,
            backwards,
            floor: Plane3D::new(start, floor_normal),
            toe: Plane3D::new(start + forwards * radius, forwards),
            heel: Plane3D::new(end - forwards * radius, backwards),
            regions,
            avoidance_distance: radius + params.minimum_swing_foot_clearance,
            most_severe: SwingCollisionType::NoIntersection,
            adjusted: false,
        };

        let touchdown_velocity = Vector3::new(0.0, 0.0, params.touchdown_velocity);
        let mut tries = 0;
        let mut state = SearchState::Searching;

        if params.do_initial_fast_approximation {
            while state == SearchState::Searching && tries < params.maximum_number_of_tries {
                search.most_severe = SwingCollisionType::NoIntersection;
                state = search.fast_pass();
                tries += 1;
            }
        }

        if state != SearchState::Done(SwingStatus::AdjustmentLimitExceeded) {
            state = SearchState::Searching;
            while state == SearchState::Searching && tries < params.maximum_number_of_tries {
                search.most_severe = SwingCollisionType::NoIntersection;
                let trajectory = TwoWaypointSwingTrajectory::new(&start, &search.waypoints, &end, &touchdown_velocity)?;
                state = search.sampled_pass(&trajectory);
                tries += 1;
            }
        }

        let status = match state {
            SearchState::Done(status) => status,
            SearchState::Searching => SwingStatus::AdjustmentLimitExceeded,
        };
        let trajectory = TwoWaypointSwingTrajectory::new(&start, &search.waypoints, &end, &touchdown_velocity)?;
        let max_swing_speed = trajectory.max_speed(SPEED_SAMPLES);

        debug!(
            "Swing {:?} after {} tries, waypoints {:?}, most severe collision {:?}",
            status, tries, search.waypoints, search.most_severe
        );

        Ok(SwingPlan {
            status,
            waypoints: search.waypoints,
            initial_waypoints,
            trajectory,
            max_swing_speed,
            most_severe_collision: search.most_severe,
            were_waypoints_adjusted: search.adjusted,
            number_of_tries: tries,
        })
    }

    fn initial_waypoints(&self, start: &Point3<f64>, end: &Point3<f64>) -> [Point3<f64>; 2] {
        let params = &self.parameters;
        let place = |proportion: f64, adjacent_z: f64| {
            let mut waypoint = start + (end - start) * proportion;
            waypoint.z = waypoint.z.max(adjacent_z) + params.minimum_swing_height;
            waypoint
        };
        [
            place(params.swing_waypoint_proportions[0], start.z),
            place(params.swing_waypoint_proportions[1], end.z),
        ]
    }
}

/// Horizontal axis perpendicular to a (near vertical) swing direction
fn fallback_axis(direction: &Vector3<f64>) -> Vector3<f64> {
    direction
        .cross(&Vector3::z())
        .try_normalize(1e-12)
        .unwrap_or_else(Vector3::y)
}

struct SwingSearch<'a> {
    params: &'a SwingPlannerParameters,
    start: Point3<f64>,
    end: Point3<f64>,
    initial_waypoints: [Point3<f64>; 2],
    waypoints: [Point3<f64>; 2],
    mid_ground: Point3<f64>,
    adjustment_axis: Unit<Vector3<f64>>,
    backwards: Vector3<f64>,
    /// Plane through the start, tilted with the swing, below which contacts are ignored
    floor: Plane3D,
    toe: Plane3D,
    heel: Plane3D,
    regions: Vec<&'a PlanarRegion>,
    avoidance_distance: f64,
    most_severe: SwingCollisionType,
    adjusted: bool,
}

impl<'a> SwingSearch<'a> {
    /// Check the straight polyline through the waypoints, adjusting at the first collision
    fn fast_pass(&mut self) -> SearchState {
        let points = [self.start, self.waypoints[0], self.waypoints[1], self.end];
        let lengths: Vec<f64> = points.windows(2).map(|w| (w[1] - w[0]).norm()).collect();
        let total: f64 = lengths.iter().sum();

        let mut travelled = 0.0;
        for (segment, length) in points.windows(2).zip(lengths.iter()) {
            if let Some(fraction) = self.check_segment(&segment[0], &segment[1]) {
                let along = if total > 0.0 { (travelled + fraction * length) / total } else { 0.0 };
                trace!("Fast swing check collided at fraction {:.3}", along);
                return self.adjust(along);
            }
            travelled += length;
        }
        SearchState::Done(SwingStatus::SolutionFound)
    }

    /// Fraction along `p`-`q` of the first colliding region
    fn check_segment(&mut self, p: &Point3<f64>, q: &Point3<f64>) -> Option<f64> {
        for i in 0..self.regions.len() {
            let region = self.regions[i];
            let proximity = region.distance_from_segment(p, q);
            self.record(SwingCollisionType::NoIntersection);
            if proximity.distance >= self.avoidance_distance {
                continue;
            }
            self.record(SwingCollisionType::IntersectionButBelowIgnorePlane);
            if self.is_floor_collision(&proximity.closest_on_region) {
                continue;
            }
            self.record(SwingCollisionType::IntersectionButOutsideTrajectory);
            let length = (q - p).norm();
            return Some(if length > 0.0 {
                (proximity.closest_on_segment - p).norm() / length
            } else {
                0.0
            });
        }
        None
    }

    /// Sample the spline and adjust at the first colliding checkpoint
    fn sampled_pass(&mut self, trajectory: &TwoWaypointSwingTrajectory) -> SearchState {
        let params = self.params;
        let step = 1.0 / params.number_of_checkpoints as f64;
        let first_waypoint_time = trajectory.waypoint_time(0);
        let mut rising = true;

        let mut i = 0usize;
        loop {
            let fraction = params.minimum_fraction_of_swing_for_collision_check + i as f64 * step;
            if fraction > params.maximum_fraction_of_swing_for_collision_check + 1e-12 {
                break;
            }
            i += 1;

            if rising && fraction > first_waypoint_time {
                rising = false;
            }
            let position = trajectory.position(fraction);
            let height_above_start = position.z - self.start.z;
            if (rising && height_above_start < self.avoidance_distance)
                || (position - self.end).norm() < self.avoidance_distance
            {
                continue;
            }

            if self.checkpoint_collides(&position) {
                trace!("Swing checkpoint at fraction {:.3} collided", fraction);
                return self.adjust(fraction);
            }
        }
        SearchState::Done(SwingStatus::SolutionFound)
    }

    fn checkpoint_collides(&mut self, position: &Point3<f64>) -> bool {
        for i in 0..self.regions.len() {
            let region = self.regions[i];
            let closest = region.closest_point(position);
            self.record(SwingCollisionType::NoIntersection);
            if (closest - position).norm() >= self.avoidance_distance {
                continue;
            }
            self.record(SwingCollisionType::IntersectionButBelowIgnorePlane);
            if self.is_floor_collision(&closest) {
                continue;
            }
            self.record(SwingCollisionType::IntersectionButOutsideTrajectory);

            let inside_swing = (self.mid_ground - closest).norm_squared() < (self.mid_ground - position).norm_squared();
            let between_feet = self.toe.is_on_or_above(&closest) && self.heel.is_on_or_above(&closest);
            if inside_swing || between_feet {
                return true;
            }
        }
        false
    }

    /// Contacts below or just above the ground plane under the swing
    ///
    /// Checkpoints still low on the rising phase never get here; the
    /// sampled pass skips them.
    fn is_floor_collision(&self, point: &Point3<f64>) -> bool {
        let params = self.params;
        !self.floor.is_on_or_above(point)
            || self.floor.distance(point) < params.minimum_height_above_floor_for_collision + params.minimum_swing_foot_clearance
    }

    /// Push both waypoints away from a collision at swing fraction `fraction`
    fn adjust(&mut self, fraction: f64) -> SearchState {
        let params = self.params;
        let direction = Rotation3::from_axis_angle(&self.adjustment_axis, PI * fraction) * self.backwards;

        self.waypoints[0] += direction * ((1.0 - fraction) * params.incremental_adjustment_distance);
        self.waypoints[1] += direction * (fraction * params.incremental_adjustment_distance);
        self.adjusted = true;
        self.record(SwingCollisionType::CriticalIntersection);

        let limit = params.maximum_adjustment_distance;
        let exceeded = self
            .waypoints
            .iter()
            .zip(self.initial_waypoints.iter())
            .any(|(waypoint, initial)| (waypoint - initial).norm() > limit);
        if exceeded {
            debug!("Swing waypoint adjustment exceeded {:.3}", limit);
            SearchState::Done(SwingStatus::AdjustmentLimitExceeded)
        } else {
            SearchState::Searching
        }
    }

    fn record(&mut self, collision: SwingCollisionType) {
        self.most_severe = self.most_severe.max(collision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ConvexPolygon2D;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    fn ground() -> PlanarRegion {
        PlanarRegion::horizontal(0, 0.0, ConvexPolygon2D::rectangle(Point2::new(0.4, 0.0), 3.0, 3.0))
    }

    fn box_top() -> PlanarRegion {
        PlanarRegion::horizontal(1, 0.08, ConvexPolygon2D::rectangle(Point2::new(0.4, 0.0), 0.1, 0.4))
    }

    fn at(x: f64, y: f64, z: f64) -> Isometry3<f64> {
        Isometry3::translation(x, y, z)
    }

    fn plan(terrain: &TerrainModel, parameters: SwingPlannerParameters) -> SwingPlan {
        SwingOverTerrainExpander::new(parameters)
            .expand(&at(0.0, 0.0, 0.0), &at(0.8, 0.0, 0.0), &at(0.4, 0.22, 0.0), terrain)
            .unwrap()
    }

    #[test]
    fn test_unobstructed_swing_is_not_adjusted() {
        let terrain = TerrainModel::new(vec![ground()]);
        let plan = plan(&terrain, SwingPlannerParameters::default());
        assert_eq!(plan.status, SwingStatus::SolutionFound);
        assert!(!plan.were_waypoints_adjusted);
        assert_eq!(plan.number_of_tries, 2);
        assert_eq!(plan.most_severe_collision, SwingCollisionType::IntersectionButBelowIgnorePlane);
        assert_relative_eq!(plan.waypoints[0], Point3::new(0.12, 0.0, 0.1), epsilon = 1e-9);
        assert_relative_eq!(plan.waypoints[1], Point3::new(0.68, 0.0, 0.1), epsilon = 1e-9);
        assert!(plan.max_swing_speed > 0.0);
    }

    #[test]
    fn test_swing_clears_obstacle() {
        let parameters = parameters_used();
        let unobstructed = plan(&TerrainModel::new(vec![ground()]), parameters.clone());
        let plan = plan(&TerrainModel::new(vec![ground(), box_top()]), parameters);

        assert_eq!(plan.status, SwingStatus::SolutionFound);
        assert!(plan.were_waypoints_adjusted);
        let displacement = (plan.waypoints[0] - unobstructed.waypoints[0]).norm();
        assert!(displacement > 0.05, "waypoint moved only {}", displacement);
        assert!(plan.waypoints[0].z > unobstructed.waypoints[0].z);

        assert_eq!(sampled_collisions(&plan, &TerrainModel::new(vec![ground(), box_top()]), &parameters_used()), 0);
    }

    fn parameters_used() -> SwingPlannerParameters {
        SwingPlannerParameters {
            maximum_adjustment_distance: 0.3,
            ..Default::default()
        }
    }

    /// Checkpoints of the final trajectory inside the avoidance distance of
    /// any region, ignoring the rising and landing neighbourhoods and
    /// contacts with the flat ground under the swing
    fn sampled_collisions(plan: &SwingPlan, terrain: &TerrainModel, parameters: &SwingPlannerParameters) -> usize {
        let avoidance = parameters.collision_sphere_radius() + parameters.minimum_swing_foot_clearance;
        let floor_band = parameters.minimum_height_above_floor_for_collision + parameters.minimum_swing_foot_clearance;
        let start = plan.trajectory.position(0.0);
        let end = plan.trajectory.position(1.0);
        let first_waypoint_time = plan.trajectory.waypoint_time(0);
        let n = parameters.number_of_checkpoints;
        let low = parameters.minimum_fraction_of_swing_for_collision_check;
        let high = parameters.maximum_fraction_of_swing_for_collision_check;

        let mut collisions = 0;
        for i in 0..=n {
            let fraction = low + (high - low) * i as f64 / n as f64;
            let position = plan.trajectory.position(fraction);
            let rising = fraction <= first_waypoint_time;
            if (rising && position.z - start.z < avoidance) || (position - end).norm() < avoidance {
                continue;
            }
            for region in terrain.regions() {
                let closest = region.closest_point(&position);
                if closest.z - start.z < floor_band {
                    continue;
                }
                if (closest - position).norm() < avoidance - 1e-6 {
                    collisions += 1;
                }
            }
        }
        collisions
    }

    #[test]
    fn test_adjustment_limit() {
        let parameters = SwingPlannerParameters {
            maximum_adjustment_distance: 0.001,
            ..Default::default()
        };
        let plan = plan(&TerrainModel::new(vec![ground(), box_top()]), parameters);
        assert_eq!(plan.status, SwingStatus::AdjustmentLimitExceeded);
        assert_eq!(plan.number_of_tries, 1);
        assert_eq!(plan.most_severe_collision, SwingCollisionType::CriticalIntersection);
    }

    #[test]
    fn test_coincident_start_and_end() {
        let terrain = TerrainModel::new(vec![ground()]);
        let plan = SwingOverTerrainExpander::new(SwingPlannerParameters::default())
            .expand(&at(0.0, 0.0, 0.0), &at(0.0, 0.0, 0.0), &at(0.0, 0.22, 0.0), &terrain)
            .unwrap();
        assert_eq!(plan.status, SwingStatus::SolutionFound);
        assert!(plan.max_swing_speed.is_finite());
    }

    #[test]
    fn test_waypoints_rise_above_higher_foot() {
        let plan = SwingOverTerrainExpander::new(SwingPlannerParameters::default())
            .expand(&at(0.0, 0.0, 0.0), &at(0.4, 0.0, 0.15), &at(0.2, 0.22, 0.0), &TerrainModel::default())
            .unwrap();
        assert_relative_eq!(plan.initial_waypoints[0].z, 0.0225 + 0.1, epsilon = 1e-9);
        assert_relative_eq!(plan.initial_waypoints[1].z, 0.15 + 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_waypoints_ignore_stance_height() {
        let plan = SwingOverTerrainExpander::new(SwingPlannerParameters::default())
            .expand(&at(0.0, 0.0, 0.0), &at(0.4, 0.0, 0.0), &at(0.2, 0.22, 0.3), &TerrainModel::default())
            .unwrap();
        for waypoint in &plan.initial_waypoints {
            assert_relative_eq!(waypoint.z, 0.1, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_unobstructed_swing_has_no_sampled_collisions() {
        let terrain = TerrainModel::new(vec![ground()]);
        let plan = plan(&terrain, SwingPlannerParameters::default());
        assert_eq!(sampled_collisions(&plan, &terrain, &SwingPlannerParameters::default()), 0);
    }

    #[test]
    fn test_validation() {
        assert!(SwingPlannerParameters::default().validate().is_ok());
        let parameters = SwingPlannerParameters {
            swing_waypoint_proportions: [0.8, 0.2],
            ..Default::default()
        };
        assert!(parameters.validate().is_err());
        let parameters = SwingPlannerParameters {
            minimum_swing_height: 0.5,
            ..Default::default()
        };
        assert!(parameters.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let parameters = SwingPlannerParameters::from_toml_str("minimum_swing_height = 0.05").unwrap();
        assert_relative_eq!(parameters.minimum_swing_height, 0.05);
        assert_eq!(parameters.maximum_number_of_tries, 50);
        assert!(SwingPlannerParameters::from_toml_str("number_of_checkpoints = 0").is_err());
    }
}
