//! Terrain as a set of convex planar regions
//!
//! A `PlanarRegion` is a 2D convex hull (plus the convex polygons it was
//! built from) living in the XY plane of its own local frame, together
//! with the rigid transform placing that frame in the world. The
//! `TerrainModel` is the read-only list of regions for one planning cycle.

use nalgebra::{Isometry3, Point2, Point3, Vector3};

use super::convex_polygon::ConvexPolygon2D;
use super::plane::{closest_points_between_segments, Plane3D};

const INSIDE_EPSILON: f64 = 1e-9;

/// Result of a segment-to-region proximity query, in world coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentRegionDistance {
    pub distance: f64,
    pub closest_on_segment: Point3<f64>,
    pub closest_on_region: Point3<f64>,
}

#[derive(Debug, Clone)]
pub struct PlanarRegion {
    id: i32,
    transform_to_world: Isometry3<f64>,
    convex_hull: ConvexPolygon2D,
    convex_polygons: Vec<ConvexPolygon2D>,
    world_hull_xy: ConvexPolygon2D,
}

impl PlanarRegion {
    /// Region made of several convex polygons given in the local frame
    pub fn new(id: i32, transform_to_world: Isometry3<f64>, convex_polygons: Vec<ConvexPolygon2D>) -> Self {
        let all_vertices: Vec<Point2<f64>> = convex_polygons
            .iter()
            .flat_map(|polygon| polygon.vertices().iter().copied())
            .collect();
        let convex_hull = ConvexPolygon2D::from_vertices(&all_vertices);
        let world_vertices: Vec<Point2<f64>> = convex_hull
            .vertices()
            .iter()
            .map(|v| {
                let world = transform_to_world.transform_point(&Point3::new(v.x, v.y, 0.0));
                Point2::new(world.x, world.y)
            })
            .collect();

        Self {
            id,
            transform_to_world,
            convex_hull,
            convex_polygons,
            world_hull_xy: ConvexPolygon2D::from_vertices(&world_vertices),
        }
    }

    /// Region made of a single convex polygon
    pub fn from_convex_polygon(id: i32, transform_to_world: Isometry3<f64>, polygon: ConvexPolygon2D) -> Self {
        Self::new(id, transform_to_world, vec![polygon])
    }

    /// Horizontal region at height `z` whose polygon is given in world XY
    pub fn horizontal(id: i32, z: f64, polygon: ConvexPolygon2D) -> Self {
        Self::from_convex_polygon(id, Isometry3::translation(0.0, 0.0, z), polygon)
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn transform_to_world(&self) -> &Isometry3<f64> {
        &self.transform_to_world
    }

    pub fn convex_hull(&self) -> &ConvexPolygon2D {
        &self.convex_hull
    }

    pub fn convex_polygons(&self) -> &[ConvexPolygon2D] {
        &self.convex_polygons
    }

    /// Convex hull projected onto the world XY plane
    pub fn world_hull_xy(&self) -> &ConvexPolygon2D {
        &self.world_hull_xy
    }

    pub fn area(&self) -> f64 {
        self.convex_hull.area()
    }

    pub fn normal(&self) -> Vector3<f64> {
        self.transform_to_world.rotation * Vector3::z()
    }

    pub fn origin(&self) -> Point3<f64> {
        Point3::from(self.transform_to_world.translation.vector)
    }

    pub fn plane(&self) -> Plane3D {
        Plane3D::new(self.origin(), self.normal())
    }

    pub fn world_to_local(&self, point: &Point3<f64>) -> Point3<f64> {
        self.transform_to_world.inverse_transform_point(point)
    }

    pub fn local_to_world(&self, point: &Point3<f64>) -> Point3<f64> {
        self.transform_to_world.transform_point(point)
    }

    /// Height of the region's plane above (x, y), `None` for vertical regions
    pub fn plane_z_given_xy(&self, x: f64, y: f64) -> Option<f64> {
        let normal = self.normal();
        if normal.z.abs() < 1e-9 {
            return None;
        }
        let origin = self.origin();
        Some(origin.z - (normal.x * (x - origin.x) + normal.y * (y - origin.y)) / normal.z)
    }

    /// True if the vertical line through (x, y) pierces one of the region's polygons
    pub fn is_point_inside_by_projection_onto_xy(&self, x: f64, y: f64) -> bool {
        let z = match self.plane_z_given_xy(x, y) {
            Some(z) => z,
            None => return false,
        };
        let local = self.world_to_local(&Point3::new(x, y, z));
        let local = Point2::new(local.x, local.y);
        self.convex_polygons
            .iter()
            .any(|polygon| polygon.is_point_inside(&local, INSIDE_EPSILON))
    }

    /// Closest point of the region (hull interior included) to a world point
    pub fn closest_point(&self, point: &Point3<f64>) -> Point3<f64> {
        let local = self.world_to_local(point);
        let in_plane = self
            .convex_hull
            .closest_point(&Point2::new(local.x, local.y))
            .unwrap_or_else(Point2::origin);
        self.local_to_world(&Point3::new(in_plane.x, in_plane.y, 0.0))
    }

    pub fn distance_to_point(&self, point: &Point3<f64>) -> f64 {
        (self.closest_point(point) - point).norm()
    }

    /// Distance between a world segment and the region's convex hull
    pub fn distance_from_segment(&self, start: &Point3<f64>, end: &Point3<f64>) -> SegmentRegionDistance {
        let a = self.world_to_local(start);
        let b = self.world_to_local(end);

        let mut best = SegmentRegionDistance {
            distance: f64::INFINITY,
            closest_on_segment: a,
            closest_on_region: a,
        };

        if self.convex_hull.is_empty() {
            return self.to_world(best);
        }

        // Segment piercing the plane inside the hull
        if a.z * b.z <= 0.0 && (a.z - b.z).abs() > 1e-12 {
            let t = a.z / (a.z - b.z);
            let crossing = a + (b - a) * t;
            if self.convex_hull.is_point_inside(&Point2::new(crossing.x, crossing.y), INSIDE_EPSILON) {
                let on_plane = Point3::new(crossing.x, crossing.y, 0.0);
                return self.to_world(SegmentRegionDistance {
                    distance: 0.0,
                    closest_on_segment: on_plane,
                    closest_on_region: on_plane,
                });
            }
        }

        for endpoint in [a, b] {
            let projection = Point2::new(endpoint.x, endpoint.y);
            if self.convex_hull.is_point_inside(&projection, INSIDE_EPSILON) && endpoint.z.abs() < best.distance {
                best = SegmentRegionDistance {
                    distance: endpoint.z.abs(),
                    closest_on_segment: endpoint,
                    closest_on_region: Point3::new(endpoint.x, endpoint.y, 0.0),
                };
            }
        }

        for (u, v) in self.convex_hull.edges() {
            let u = Point3::new(u.x, u.y, 0.0);
            let v = Point3::new(v.x, v.y, 0.0);
            let (on_segment, _, on_edge, _) = closest_points_between_segments(&a, &b, &u, &v);
            let distance = (on_segment - on_edge).norm();
            if distance < best.distance {
                best = SegmentRegionDistance {
                    distance,
                    closest_on_segment: on_segment,
                    closest_on_region: on_edge,
                };
            }
        }

        self.to_world(best)
    }

    fn to_world(&self, local: SegmentRegionDistance) -> SegmentRegionDistance {
        SegmentRegionDistance {
            distance: local.distance,
            closest_on_segment: self.local_to_world(&local.closest_on_segment),
            closest_on_region: self.local_to_world(&local.closest_on_region),
        }
    }
}

/// The terrain for one planning cycle
#[derive(Debug, Clone, Default)]
pub struct TerrainModel {
    regions: Vec<PlanarRegion>,
}

impl TerrainModel {
    pub fn new(regions: Vec<PlanarRegion>) -> Self {
        Self { regions }
    }

    pub fn regions(&self) -> &[PlanarRegion] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn region(&self, id: i32) -> Option<&PlanarRegion> {
        self.regions.iter().find(|region| region.id() == id)
    }

    /// Regions large enough and flat enough to stand on
    pub fn steppable_regions(&self, min_area: f64, max_incline: f64) -> TerrainModel {
        let min_normal_z = max_incline.cos();
        TerrainModel::new(
            self.regions
                .iter()
                .filter(|region| region.area() >= min_area)
                .filter(|region| region.normal().z >= min_normal_z)
                .cloned()
                .collect(),
        )
    }

    /// Convex hull of every region projected onto world XY
    pub fn bounding_polygon_xy(&self) -> ConvexPolygon2D {
        let vertices: Vec<Point2<f64>> = self
            .regions
            .iter()
            .flat_map(|region| region.world_hull_xy().vertices().iter().copied())
            .collect();
        ConvexPolygon2D::from_vertices(&vertices)
    }

    /// Highest region directly above or below (x, y), else the one nearest in XY
    pub fn closest_region_by_xy_projection(&self, x: f64, y: f64) -> Option<&PlanarRegion> {
        let containing = self
            .regions
            .iter()
            .filter(|region| region.is_point_inside_by_projection_onto_xy(x, y))
            .filter_map(|region| region.plane_z_given_xy(x, y).map(|z| (region, z)))
            .fold(None, |best: Option<(&PlanarRegion, f64)>, (region, z)| match best {
                Some((_, best_z)) if best_z >= z => best,
                _ => Some((region, z)),
            });
        if let Some((region, _)) = containing {
            return Some(region);
        }

        let query = Point2::new(x, y);
        self.regions
            .iter()
            .filter(|region| region.normal().z.abs() >= 1e-9)
            .map(|region| (region, region.world_hull_xy().signed_distance(&query)))
            .fold(None, |best: Option<(&PlanarRegion, f64)>, (region, distance)| match best {
                Some((_, best_distance)) if best_distance <= distance => best,
                _ => Some((region, distance)),
            })
            .map(|(region, _)| region)
    }

    /// Regions within `distance` of the segment `start`-`end`, in terrain order
    pub fn regions_near_segment(&self, start: &Point3<f64>, end: &Point3<f64>, distance: f64) -> Vec<&PlanarRegion> {
        self.regions
            .iter()
            .filter(|region| region.distance_from_segment(start, end).distance <= distance)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};
    use std::f64::consts::FRAC_PI_2;

    fn ground() -> PlanarRegion {
        PlanarRegion::horizontal(0, 0.0, ConvexPolygon2D::rectangle(Point2::origin(), 4.0, 4.0))
    }

    fn ramp(pitch: f64) -> PlanarRegion {
        let transform = Isometry3::from_parts(
            Translation3::new(0.0, 0.0, 0.5),
            UnitQuaternion::from_euler_angles(0.0, pitch, 0.0),
        );
        PlanarRegion::from_convex_polygon(1, transform, ConvexPolygon2D::rectangle(Point2::origin(), 1.0, 1.0))
    }

    #[test]
    fn test_plane_z_on_pitched_region() {
        let region = ramp(0.3);
        let z = region.plane_z_given_xy(0.2, 0.0).unwrap();
        assert_relative_eq!(z, 0.5 - 0.2 * 0.3_f64.tan(), epsilon = 1e-9);
    }

    #[test]
    fn test_vertical_region_has_no_plane_height() {
        let wall = ramp(FRAC_PI_2);
        assert!(wall.plane_z_given_xy(0.0, 0.0).is_none());
        assert!(!wall.is_point_inside_by_projection_onto_xy(0.0, 0.0));
    }

    #[test]
    fn test_point_inside_by_projection() {
        let region = ground();
        assert!(region.is_point_inside_by_projection_onto_xy(1.0, -1.0));
        assert!(!region.is_point_inside_by_projection_onto_xy(3.0, 0.0));
    }

    #[test]
    fn test_closest_point_clamps_to_hull() {
        let region = ground();
        let closest = region.closest_point(&Point3::new(3.0, 0.5, 1.0));
        assert_relative_eq!(closest, Point3::new(2.0, 0.5, 0.0), epsilon = 1e-12);
        assert_relative_eq!(region.distance_to_point(&Point3::new(0.0, 0.0, 0.3)), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_segment_piercing_region() {
        let region = ground();
        let result = region.distance_from_segment(&Point3::new(0.0, 0.0, 1.0), &Point3::new(0.0, 0.0, -1.0));
        assert_eq!(result.distance, 0.0);
        assert_relative_eq!(result.closest_on_region, Point3::origin(), epsilon = 1e-12);
    }

    #[test]
    fn test_segment_above_region() {
        let region = ground();
        let result = region.distance_from_segment(&Point3::new(-1.0, 0.0, 0.2), &Point3::new(1.0, 0.0, 0.5));
        assert_relative_eq!(result.distance, 0.2, epsilon = 1e-12);
        assert_relative_eq!(result.closest_on_segment, Point3::new(-1.0, 0.0, 0.2), epsilon = 1e-12);
    }

    #[test]
    fn test_segment_passing_beside_region() {
        let region = PlanarRegion::horizontal(3, 0.0, ConvexPolygon2D::rectangle(Point2::origin(), 0.2, 0.2));
        let result = region.distance_from_segment(&Point3::new(-1.0, 0.5, 0.0), &Point3::new(1.0, 0.5, 0.0));
        assert_relative_eq!(result.distance, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_steppable_filter() {
        let terrain = TerrainModel::new(vec![ground(), ramp(1.2)]);
        let steppable = terrain.steppable_regions(0.1, 0.5);
        assert_eq!(steppable.len(), 1);
        assert_eq!(steppable.regions()[0].id(), 0);
    }

    #[test]
    fn test_closest_region_prefers_highest_containing() {
        let step = PlanarRegion::horizontal(5, 0.2, ConvexPolygon2D::rectangle(Point2::origin(), 1.0, 1.0));
        let terrain = TerrainModel::new(vec![ground(), step]);
        assert_eq!(terrain.closest_region_by_xy_projection(0.0, 0.0).unwrap().id(), 5);
        assert_eq!(terrain.closest_region_by_xy_projection(1.5, 0.0).unwrap().id(), 0);
        assert_eq!(terrain.closest_region_by_xy_projection(10.0, 0.0).unwrap().id(), 0);
    }

    #[test]
    fn test_regions_near_segment() {
        let far = PlanarRegion::horizontal(7, 0.0, ConvexPolygon2D::rectangle(Point2::new(10.0, 10.0), 1.0, 1.0));
        let terrain = TerrainModel::new(vec![ground(), far]);
        let near = terrain.regions_near_segment(&Point3::new(0.0, 0.0, 0.1), &Point3::new(0.5, 0.0, 0.1), 0.5);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].id(), 0);
    }
}
