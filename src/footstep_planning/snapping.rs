//! Snap and wiggle: grounding a lattice node on the terrain
//!
//! A node is snapped by dropping its footprint onto the steppable region
//! beneath it, tilting it flush with that region's plane, and then
//! wiggling it within the plane to get as far inside the region's hull as
//! the clearance parameters ask for. Footprints that stick out of the
//! terrain's overall XY extent are treated as boundary cases and only get
//! their height set.
//!
//! Results are memoised per node for the lifetime of one snapper, which is
//! owned by a single planning call.

use std::collections::HashMap;

use log::trace;
use nalgebra::{Isometry2, Isometry3, Point2, Translation3, UnitQuaternion, Vector2, Vector3};

use crate::common::yaw_of;
use crate::footstep_planning::node::FootstepNode;
use crate::footstep_planning::parameters::FootstepPlannerParameters;
use crate::footstep_planning::wiggle::{CandidateComparison, PolygonWiggler, WiggleParameters};
use crate::geometry::{ConvexPolygon2D, PlanarRegion, TerrainModel};

const BOUNDARY_EPSILON: f64 = 1e-9;

/// Outcome of snapping one node
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapData {
    transform: Option<Isometry3<f64>>,
    region_id: Option<i32>,
    foothold: Option<ConvexPolygon2D>,
}

impl SnapData {
    /// A node that could not be placed on any region
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(transform: Isometry3<f64>, region_id: i32, foothold: ConvexPolygon2D) -> Self {
        Self {
            transform: Some(transform),
            region_id: Some(region_id),
            foothold: Some(foothold),
        }
    }

    /// A pose taken as given, not supported by any region
    pub fn assumed(transform: Isometry3<f64>, foothold: ConvexPolygon2D) -> Self {
        Self {
            transform: Some(transform),
            region_id: None,
            foothold: Some(foothold),
        }
    }

    /// Sole pose in world
    pub fn transform(&self) -> Option<&Isometry3<f64>> {
        self.transform.as_ref()
    }

    pub fn region_id(&self) -> Option<i32> {
        self.region_id
    }

    /// Contact polygon in the sole frame
    pub fn foothold(&self) -> Option<&ConvexPolygon2D> {
        self.foothold.as_ref()
    }

    pub fn is_snapped(&self) -> bool {
        self.transform.is_some()
    }

    pub fn foothold_area(&self) -> f64 {
        self.foothold.as_ref().map(ConvexPolygon2D::area).unwrap_or(0.0)
    }

    /// True if the foothold covers less than `1 - epsilon` of the footprint
    pub fn is_partial_foothold(&self, footprint_area: f64) -> bool {
        self.foothold_area() < footprint_area * (1.0 - 1e-6)
    }
}

fn planar_part(transform: &Isometry3<f64>) -> Isometry2<f64> {
    let translation = transform.translation.vector;
    Isometry2::new(Vector2::new(translation.x, translation.y), yaw_of(transform))
}

fn lift(transform: &Isometry2<f64>) -> Isometry3<f64> {
    let translation = transform.translation.vector;
    Isometry3::new(
        Vector3::new(translation.x, translation.y, 0.0),
        Vector3::z() * transform.rotation.angle(),
    )
}

/// Pose at (x, y, yaw) lying flush on the region's plane
fn flush_transform(region: &PlanarRegion, x: f64, y: f64, yaw: f64) -> Option<Isometry3<f64>> {
    let z = region.plane_z_given_xy(x, y)?;
    let align = UnitQuaternion::rotation_between(&Vector3::z(), &region.normal()).unwrap_or_else(UnitQuaternion::identity);
    let rotation = align * UnitQuaternion::from_euler_angles(0.0, 0.0, yaw);
    Some(Isometry3::from_parts(Translation3::new(x, y, z), rotation))
}

pub struct FootstepNodeSnapper {
    terrain: TerrainModel,
    bounding_polygon: ConvexPolygon2D,
    footprint: ConvexPolygon2D,
    wiggler: PolygonWiggler,
    cache: HashMap<FootstepNode, SnapData>,
}

impl FootstepNodeSnapper {
    pub fn new(terrain: &TerrainModel, parameters: &FootstepPlannerParameters) -> Self {
        Self::with_comparison(terrain, parameters, CandidateComparison::default())
    }

    /// Snapper using a specific wiggle comparison policy
    pub fn with_comparison(
        terrain: &TerrainModel,
        parameters: &FootstepPlannerParameters,
        comparison: CandidateComparison,
    ) -> Self {
        let terrain = terrain.steppable_regions(
            parameters.minimum_steppable_region_area,
            parameters.minimum_surface_incline_radians,
        );
        let wiggler = PolygonWiggler::new(WiggleParameters {
            delta_inside: parameters.wiggle_inside_delta,
            max_translation: parameters.maximum_xy_wiggle_distance,
            max_yaw: parameters.maximum_yaw_wiggle,
            max_iterations: parameters.maximum_wiggle_iterations,
            comparison,
            ..Default::default()
        });
        Self {
            bounding_polygon: terrain.bounding_polygon_xy(),
            terrain,
            footprint: parameters.footprint(),
            wiggler,
            cache: HashMap::new(),
        }
    }

    /// Regions that passed the area and incline filter
    pub fn steppable_terrain(&self) -> &TerrainModel {
        &self.terrain
    }

    pub fn footprint(&self) -> &ConvexPolygon2D {
        &self.footprint
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Override the snap of `node`, used for start feet off the terrain
    pub fn insert(&mut self, node: FootstepNode, data: SnapData) {
        self.cache.insert(node, data);
    }

    /// Snap a node, computing it at most once
    pub fn snap(&mut self, node: &FootstepNode) -> SnapData {
        if let Some(data) = self.cache.get(node) {
            return data.clone();
        }
        let data = self.compute_snap_data(node);
        self.cache.insert(*node, data.clone());
        data
    }

    fn compute_snap_data(&self, node: &FootstepNode) -> SnapData {
        if self.terrain.is_empty() {
            return SnapData::empty();
        }

        let footprint_in_world = self
            .footprint
            .transform(&Isometry2::new(Vector2::new(node.x(), node.y()), node.yaw()));
        let on_boundary = footprint_in_world
            .vertices()
            .iter()
            .any(|vertex| !self.bounding_polygon.is_point_inside(vertex, BOUNDARY_EPSILON));

        let region = match self.terrain.closest_region_by_xy_projection(node.x(), node.y()) {
            Some(region) => region,
            None => return SnapData::empty(),
        };

        if on_boundary {
            let z = match region.plane_z_given_xy(node.x(), node.y()) {
                Some(z) => z,
                None => return SnapData::empty(),
            };
            trace!("{} is on the terrain boundary, setting height only", node);
            return SnapData::new(node.pose().to_isometry(z), region.id(), self.footprint.clone());
        }

        self.snap_and_wiggle(node, region)
    }

    fn snap_and_wiggle(&self, node: &FootstepNode, region: &PlanarRegion) -> SnapData {
        let snapped = match flush_transform(region, node.x(), node.y(), node.yaw()) {
            Some(transform) => transform,
            None => return SnapData::empty(),
        };

        let region_to_world = region.transform_to_world();
        let sole_in_region = region_to_world.inverse() * snapped;
        let footprint_in_region = self.footprint.transform(&planar_part(&sole_in_region));

        let wiggle = match self.wiggler.wiggle_into_convex_hull(&footprint_in_region, region.convex_hull()) {
            Some(wiggle) => wiggle,
            None => return SnapData::empty(),
        };

        let wiggled_sole_in_region = lift(&wiggle) * sole_in_region;
        let foothold_in_region = footprint_in_region.transform(&wiggle).intersection(region.convex_hull());
        let foothold = foothold_in_region.transform(&planar_part(&wiggled_sole_in_region).inverse());

        SnapData::new(region_to_world * wiggled_sole_in_region, region.id(), foothold)
    }
}

/// Centroid of the foothold in world, falling back to the sole origin
pub fn foothold_centroid_in_world(data: &SnapData) -> Option<nalgebra::Point3<f64>> {
    let transform = data.transform()?;
    let centroid = data
        .foothold()
        .and_then(ConvexPolygon2D::centroid)
        .unwrap_or_else(Point2::origin);
    Some(transform.transform_point(&nalgebra::Point3::new(centroid.x, centroid.y, 0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{pitch_of, RobotSide};
    use approx::assert_relative_eq;

    fn ground() -> PlanarRegion {
        PlanarRegion::horizontal(0, 0.0, ConvexPolygon2D::rectangle(Point2::origin(), 10.0, 10.0))
    }

    fn stone(id: i32, x: f64, y: f64, size: f64, z: f64) -> PlanarRegion {
        PlanarRegion::horizontal(id, z, ConvexPolygon2D::rectangle(Point2::new(x, y), size, size))
    }

    #[test]
    fn test_flat_ground_snap() {
        let parameters = FootstepPlannerParameters::default();
        let mut snapper = FootstepNodeSnapper::new(&TerrainModel::new(vec![ground()]), &parameters);
        let node = FootstepNode::new(0.5, 0.3, 0.2, RobotSide::Left);
        let data = snapper.snap(&node);
        let transform = data.transform().unwrap();
        assert_relative_eq!(transform.translation.vector.x, node.x(), epsilon = 1e-9);
        assert_relative_eq!(transform.translation.vector.y, node.y(), epsilon = 1e-9);
        assert_relative_eq!(transform.translation.vector.z, 0.0, epsilon = 1e-9);
        assert_relative_eq!(yaw_of(transform), node.yaw(), epsilon = 1e-9);
        assert_eq!(data.region_id(), Some(0));
        assert_relative_eq!(data.foothold_area(), parameters.footprint().area(), epsilon = 1e-9);
        assert!(!data.is_partial_foothold(parameters.footprint().area()));
    }

    #[test]
    fn test_empty_terrain_fails() {
        let mut snapper = FootstepNodeSnapper::new(&TerrainModel::default(), &FootstepPlannerParameters::default());
        let data = snapper.snap(&FootstepNode::new(0.0, 0.0, 0.0, RobotSide::Left));
        assert!(!data.is_snapped());
        assert!(data.region_id().is_none());
    }

    #[test]
    fn test_boundary_case_sets_height_only() {
        let parameters = FootstepPlannerParameters::default();
        let terrain = TerrainModel::new(vec![stone(4, 0.0, 0.0, 1.0, 0.3)]);
        let mut snapper = FootstepNodeSnapper::new(&terrain, &parameters);
        let node = FootstepNode::new(0.5, 0.0, 0.0, RobotSide::Right);
        let data = snapper.snap(&node);
        let transform = data.transform().unwrap();
        assert_relative_eq!(transform.translation.vector.x, 0.5, epsilon = 1e-9);
        assert_relative_eq!(transform.translation.vector.z, 0.3, epsilon = 1e-9);
        assert_eq!(data.foothold(), Some(&parameters.footprint()));
    }

    #[test]
    fn test_snaps_to_highest_region() {
        let terrain = TerrainModel::new(vec![ground(), stone(7, 1.0, 0.0, 1.0, 0.2)]);
        let mut snapper = FootstepNodeSnapper::new(&terrain, &FootstepPlannerParameters::default());
        let data = snapper.snap(&FootstepNode::new(1.0, 0.0, 0.0, RobotSide::Left));
        assert_eq!(data.region_id(), Some(7));
        assert_relative_eq!(data.transform().unwrap().translation.vector.z, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_wiggle_moves_foot_onto_stone() {
        let parameters = FootstepPlannerParameters::default();
        let terrain = TerrainModel::new(vec![stone(1, 0.0, 0.0, 0.3, 0.0), stone(2, 2.0, 0.0, 0.3, 0.0)]);
        let mut snapper = FootstepNodeSnapper::new(&terrain, &parameters);
        let data = snapper.snap(&FootstepNode::new(0.1, 0.0, 0.0, RobotSide::Left));
        assert_eq!(data.region_id(), Some(1));
        let x = data.transform().unwrap().translation.vector.x;
        assert!(x < 0.1 - 0.05, "foot was not wiggled inwards: x = {}", x);
        assert_relative_eq!(data.foothold_area(), parameters.footprint().area(), epsilon = 1e-9);
    }

    #[test]
    fn test_partial_foothold_is_intersection() {
        let parameters = FootstepPlannerParameters {
            wiggle_inside_delta: -0.05,
            maximum_xy_wiggle_distance: 0.0,
            maximum_yaw_wiggle: 0.0,
            ..Default::default()
        };
        let terrain = TerrainModel::new(vec![stone(1, 0.0, 0.0, 0.3, 0.0), stone(2, 2.0, 0.0, 0.3, 0.0)]);
        let mut snapper = FootstepNodeSnapper::new(&terrain, &parameters);
        let data = snapper.snap(&FootstepNode::new(0.1, 0.0, 0.0, RobotSide::Left));
        assert_relative_eq!(data.foothold_area(), 0.16 * 0.11, epsilon = 1e-9);
        assert!(data.is_partial_foothold(parameters.footprint().area()));
    }

    #[test]
    fn test_pitched_region_tilts_foot() {
        let ramp = PlanarRegion::from_convex_polygon(
            3,
            Isometry3::from_parts(Translation3::new(0.0, 0.0, 0.0), UnitQuaternion::from_euler_angles(0.0, -0.2, 0.0)),
            ConvexPolygon2D::rectangle(Point2::origin(), 4.0, 4.0),
        );
        let mut snapper = FootstepNodeSnapper::new(&TerrainModel::new(vec![ramp]), &FootstepPlannerParameters::default());
        let data = snapper.snap(&FootstepNode::new(0.5, 0.0, 0.0, RobotSide::Left));
        let transform = data.transform().unwrap();
        assert_relative_eq!(transform.translation.vector.z, 0.5 * 0.2_f64.tan(), epsilon = 1e-6);
        assert_relative_eq!(pitch_of(transform), -0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_steep_region_is_not_steppable() {
        let wall = PlanarRegion::from_convex_polygon(
            3,
            Isometry3::from_parts(Translation3::new(0.0, 0.0, 0.0), UnitQuaternion::from_euler_angles(0.0, 1.2, 0.0)),
            ConvexPolygon2D::rectangle(Point2::origin(), 4.0, 4.0),
        );
        let mut snapper = FootstepNodeSnapper::new(&TerrainModel::new(vec![wall]), &FootstepPlannerParameters::default());
        assert!(snapper.steppable_terrain().is_empty());
        assert!(!snapper.snap(&FootstepNode::new(0.0, 0.0, 0.0, RobotSide::Left)).is_snapped());
    }

    #[test]
    fn test_snap_is_cached() {
        let mut snapper = FootstepNodeSnapper::new(&TerrainModel::new(vec![ground()]), &FootstepPlannerParameters::default());
        let node = FootstepNode::new(0.2, 0.1, 0.0, RobotSide::Right);
        let first = snapper.snap(&node);
        let second = snapper.snap(&node);
        assert_eq!(first, second);
        assert_eq!(snapper.cache_size(), 1);
        snapper.clear_cache();
        assert_eq!(snapper.cache_size(), 0);
    }

    #[test]
    fn test_foothold_centroid_in_world() {
        let mut snapper = FootstepNodeSnapper::new(&TerrainModel::new(vec![ground()]), &FootstepPlannerParameters::default());
        let data = snapper.snap(&FootstepNode::new(0.2, 0.1, 0.0, RobotSide::Right));
        let centroid = foothold_centroid_in_world(&data).unwrap();
        assert_relative_eq!(centroid.x, 0.2, epsilon = 1e-9);
        assert_relative_eq!(centroid.y, 0.1, epsilon = 1e-9);
        assert!(foothold_centroid_in_world(&SnapData::empty()).is_none());
    }
}
