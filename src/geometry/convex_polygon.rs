//! Convex polygon in the plane
//!
//! Vertices are stored counter-clockwise with collinear and duplicate
//! points removed. Every constructor goes through the convex hull, so a
//! `ConvexPolygon2D` is convex by construction. Fewer than three vertices
//! is a valid degenerate polygon (point or segment) with zero area.

use std::cmp::Ordering;

use nalgebra::{Isometry2, Point2, Vector2};

const EPSILON: f64 = 1e-12;

fn cross(u: &Vector2<f64>, v: &Vector2<f64>) -> f64 {
    u.x * v.y - u.y * v.x
}

/// Closest point to `p` on segment `a`-`b`
pub fn closest_point_on_segment_2d(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> Point2<f64> {
    let ab = b - a;
    let length_squared = ab.norm_squared();
    if length_squared < EPSILON {
        return *a;
    }
    let t = ((p - a).dot(&ab) / length_squared).clamp(0.0, 1.0);
    a + ab * t
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConvexPolygon2D {
    vertices: Vec<Point2<f64>>,
}

impl ConvexPolygon2D {
    pub fn new() -> Self {
        Self { vertices: Vec::new() }
    }

    /// Convex hull of the given points (Andrew's monotone chain)
    pub fn from_vertices(points: &[Point2<f64>]) -> Self {
        let mut sorted: Vec<Point2<f64>> = points.iter().copied().filter(|p| p.x.is_finite() && p.y.is_finite()).collect();
        sorted.sort_by(|a, b| match a.x.total_cmp(&b.x) {
            Ordering::Equal => a.y.total_cmp(&b.y),
            other => other,
        });
        sorted.dedup_by(|a, b| (*a - *b).norm_squared() < EPSILON * EPSILON);

        if sorted.len() < 3 {
            return Self { vertices: sorted };
        }

        let mut lower: Vec<Point2<f64>> = Vec::with_capacity(sorted.len());
        for p in &sorted {
            while lower.len() >= 2 && cross(&(lower[lower.len() - 1] - lower[lower.len() - 2]), &(p - lower[lower.len() - 2])) <= EPSILON {
                lower.pop();
            }
            lower.push(*p);
        }

        let mut upper: Vec<Point2<f64>> = Vec::with_capacity(sorted.len());
        for p in sorted.iter().rev() {
            while upper.len() >= 2 && cross(&(upper[upper.len() - 1] - upper[upper.len() - 2]), &(p - upper[upper.len() - 2])) <= EPSILON {
                upper.pop();
            }
            upper.push(*p);
        }

        lower.pop();
        upper.pop();
        lower.extend(upper);
        Self { vertices: lower }
    }

    pub fn from_xy(points: &[(f64, f64)]) -> Self {
        let points: Vec<Point2<f64>> = points.iter().map(|&(x, y)| Point2::new(x, y)).collect();
        Self::from_vertices(&points)
    }

    /// Axis-aligned rectangle centred on `center`
    pub fn rectangle(center: Point2<f64>, size_x: f64, size_y: f64) -> Self {
        let hx = 0.5 * size_x;
        let hy = 0.5 * size_y;
        Self::from_xy(&[
            (center.x - hx, center.y - hy),
            (center.x + hx, center.y - hy),
            (center.x + hx, center.y + hy),
            (center.x - hx, center.y + hy),
        ])
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Edges as (start, end) pairs, counter-clockwise
    pub fn edges(&self) -> impl Iterator<Item = (Point2<f64>, Point2<f64>)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    pub fn area(&self) -> f64 {
        if self.vertices.len() < 3 {
            return 0.0;
        }
        0.5 * self
            .edges()
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum::<f64>()
    }

    pub fn centroid(&self) -> Option<Point2<f64>> {
        if self.vertices.is_empty() {
            return None;
        }
        let area = self.area();
        if area < EPSILON {
            let sum = self.vertices.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords);
            return Some(Point2::from(sum / self.vertices.len() as f64));
        }
        let mut cx = 0.0;
        let mut cy = 0.0;
        for (a, b) in self.edges() {
            let w = a.x * b.y - b.x * a.y;
            cx += (a.x + b.x) * w;
            cy += (a.y + b.y) * w;
        }
        Some(Point2::new(cx / (6.0 * area), cy / (6.0 * area)))
    }

    pub fn bounding_box(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        let first = self.vertices.first()?;
        let (min, max) = self.vertices.iter().fold((*first, *first), |(min, max), p| {
            (Point2::new(min.x.min(p.x), min.y.min(p.y)), Point2::new(max.x.max(p.x), max.y.max(p.y)))
        });
        Some((min, max))
    }

    pub fn bounding_box_range_y(&self) -> f64 {
        self.bounding_box().map(|(min, max)| max.y - min.y).unwrap_or(0.0)
    }

    fn contains_strict(&self, p: &Point2<f64>) -> bool {
        self.vertices.len() >= 3 && self.edges().all(|(a, b)| cross(&(b - a), &(p - a)) >= 0.0)
    }

    /// Closest point on the boundary to `p`
    pub fn closest_boundary_point(&self, p: &Point2<f64>) -> Option<Point2<f64>> {
        match self.vertices.len() {
            0 => None,
            1 => Some(self.vertices[0]),
            2 => Some(closest_point_on_segment_2d(p, &self.vertices[0], &self.vertices[1])),
            _ => self
                .edges()
                .map(|(a, b)| closest_point_on_segment_2d(p, &a, &b))
                .min_by(|c1, c2| (c1 - p).norm_squared().total_cmp(&(c2 - p).norm_squared())),
        }
    }

    /// Distance to the boundary, negative when `p` is inside
    pub fn signed_distance(&self, p: &Point2<f64>) -> f64 {
        let boundary_distance = match self.closest_boundary_point(p) {
            Some(closest) => (closest - p).norm(),
            None => return f64::INFINITY,
        };
        if self.contains_strict(p) {
            -boundary_distance
        } else {
            boundary_distance
        }
    }

    /// True if `p` is inside, or outside by at most `epsilon`
    pub fn is_point_inside(&self, p: &Point2<f64>, epsilon: f64) -> bool {
        self.signed_distance(p) <= epsilon
    }

    /// Closest point of the polygon (interior included) to `p`
    pub fn closest_point(&self, p: &Point2<f64>) -> Option<Point2<f64>> {
        if self.contains_strict(p) {
            Some(*p)
        } else {
            self.closest_boundary_point(p)
        }
    }

    pub fn transform(&self, transform: &Isometry2<f64>) -> Self {
        Self {
            vertices: self.vertices.iter().map(|p| transform.transform_point(p)).collect(),
        }
    }

    pub fn translate(&self, offset: &Vector2<f64>) -> Self {
        Self {
            vertices: self.vertices.iter().map(|p| p + offset).collect(),
        }
    }

    /// Intersection with another convex polygon (Sutherland-Hodgman clipping)
    pub fn intersection(&self, other: &ConvexPolygon2D) -> ConvexPolygon2D {
        if self.vertices.len() < 3 || other.vertices.len() < 3 {
            return ConvexPolygon2D::new();
        }

        let mut output = self.vertices.clone();
        for (a, b) in other.edges() {
            if output.is_empty() {
                break;
            }
            let edge = b - a;
            let inside = |q: &Point2<f64>| cross(&edge, &(q - a)) >= -EPSILON;
            let input = std::mem::take(&mut output);
            for (i, current) in input.iter().enumerate() {
                let previous = &input[(i + input.len() - 1) % input.len()];
                let current_inside = inside(current);
                let previous_inside = inside(previous);
                if current_inside != previous_inside {
                    let direction = current - previous;
                    let denominator = cross(&edge, &direction);
                    if denominator.abs() > EPSILON {
                        let t = cross(&edge, &(a - previous)) / denominator;
                        output.push(previous + direction * t);
                    }
                }
                if current_inside {
                    output.push(*current);
                }
            }
        }

        ConvexPolygon2D::from_vertices(&output)
    }

    /// Area of the overlap with another convex polygon
    pub fn intersection_area(&self, other: &ConvexPolygon2D) -> f64 {
        self.intersection(other).area()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn unit_square() -> ConvexPolygon2D {
        ConvexPolygon2D::from_xy(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])
    }

    #[test]
    fn test_hull_drops_interior_and_collinear_points() {
        let polygon = ConvexPolygon2D::from_xy(&[
            (0.0, 0.0),
            (0.5, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.5, 0.5),
            (0.0, 1.0),
            (0.0, 1.0),
        ]);
        assert_eq!(polygon.len(), 4);
        assert_relative_eq!(polygon.area(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_vertices_counter_clockwise() {
        let polygon = ConvexPolygon2D::from_xy(&[(0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)]);
        assert!(polygon.area() > 0.0);
    }

    #[test]
    fn test_centroid() {
        let centroid = unit_square().centroid().unwrap();
        assert_relative_eq!(centroid.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(centroid.y, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_signed_distance() {
        let square = unit_square();
        assert_relative_eq!(square.signed_distance(&Point2::new(0.5, 0.5)), -0.5, epsilon = 1e-12);
        assert_relative_eq!(square.signed_distance(&Point2::new(2.0, 0.5)), 1.0, epsilon = 1e-12);
        assert_relative_eq!(square.signed_distance(&Point2::new(2.0, 2.0)), 2.0_f64.sqrt(), epsilon = 1e-12);
        assert!(square.is_point_inside(&Point2::new(1.01, 0.5), 0.02));
        assert!(!square.is_point_inside(&Point2::new(1.01, 0.5), 0.0));
    }

    #[test]
    fn test_closest_point() {
        let square = unit_square();
        let inside = Point2::new(0.3, 0.4);
        assert_eq!(square.closest_point(&inside), Some(inside));
        let closest = square.closest_point(&Point2::new(0.5, -1.0)).unwrap();
        assert_relative_eq!(closest.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(closest.y, 0.0, epsilon = 1e-12);
        assert!(ConvexPolygon2D::new().closest_point(&inside).is_none());
    }

    #[test]
    fn test_intersection_of_overlapping_squares() {
        let a = unit_square();
        let b = a.translate(&Vector2::new(0.5, 0.5));
        let overlap = a.intersection(&b);
        assert_relative_eq!(overlap.area(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_intersection_of_disjoint_squares_is_empty() {
        let a = unit_square();
        let b = a.translate(&Vector2::new(3.0, 0.0));
        assert_relative_eq!(a.intersection_area(&b), 0.0);
    }

    #[test]
    fn test_intersection_contained() {
        let big = ConvexPolygon2D::rectangle(Point2::origin(), 10.0, 10.0);
        let small = ConvexPolygon2D::rectangle(Point2::new(1.0, 1.0), 0.2, 0.1);
        assert_relative_eq!(small.intersection_area(&big), small.area(), epsilon = 1e-12);
    }

    #[test]
    fn test_rigid_transform_preserves_area() {
        let square = unit_square();
        let moved = square.transform(&Isometry2::new(Vector2::new(2.0, -1.0), FRAC_PI_2));
        assert_relative_eq!(moved.area(), 1.0, epsilon = 1e-12);
        let centroid = moved.centroid().unwrap();
        assert_relative_eq!(centroid.x, 1.5, epsilon = 1e-12);
        assert_relative_eq!(centroid.y, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_polygons() {
        let segment = ConvexPolygon2D::from_xy(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        assert_eq!(segment.len(), 2);
        assert_eq!(segment.area(), 0.0);
        assert_relative_eq!(segment.signed_distance(&Point2::new(1.0, 1.0)), 1.0, epsilon = 1e-12);
    }
}
