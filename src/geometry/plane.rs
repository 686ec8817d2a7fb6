//! Planes and segment proximity queries in 3D

use nalgebra::{Point3, Vector3};

const EPSILON: f64 = 1e-12;

/// Infinite plane through `point` with unit `normal`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane3D {
    point: Point3<f64>,
    normal: Vector3<f64>,
}

impl Plane3D {
    /// Plane through `point`; a zero `normal` falls back to +z
    pub fn new(point: Point3<f64>, normal: Vector3<f64>) -> Self {
        let normal = normal.try_normalize(EPSILON).unwrap_or_else(Vector3::z);
        Self { point, normal }
    }

    /// Plane through three points, `None` if they are collinear
    pub fn from_points(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Option<Self> {
        let normal = (b - a).cross(&(c - a)).try_normalize(EPSILON)?;
        Some(Self { point: *a, normal })
    }

    pub fn point(&self) -> &Point3<f64> {
        &self.point
    }

    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        (p - self.point).dot(&self.normal)
    }

    pub fn distance(&self, p: &Point3<f64>) -> f64 {
        self.signed_distance(p).abs()
    }

    pub fn is_on_or_above(&self, p: &Point3<f64>) -> bool {
        self.signed_distance(p) >= 0.0
    }

    pub fn project(&self, p: &Point3<f64>) -> Point3<f64> {
        p - self.normal * self.signed_distance(p)
    }
}

/// Closest point to `p` on segment `a`-`b`, with its fraction along the segment
pub fn closest_point_on_segment(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> (Point3<f64>, f64) {
    let ab = b - a;
    let length_squared = ab.norm_squared();
    if length_squared < EPSILON {
        return (*a, 0.0);
    }
    let t = ((p - a).dot(&ab) / length_squared).clamp(0.0, 1.0);
    (a + ab * t, t)
}

/// Closest points between segments `p1`-`q1` and `p2`-`q2`
///
/// Returns `(point on first, fraction on first, point on second, fraction on second)`.
/// Parallel segments resolve to the pair nearest the start of the first.
pub fn closest_points_between_segments(
    p1: &Point3<f64>,
    q1: &Point3<f64>,
    p2: &Point3<f64>,
    q2: &Point3<f64>,
) -> (Point3<f64>, f64, Point3<f64>, f64) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let f = d2.dot(&r);

    let (s, t) = if a < EPSILON && e < EPSILON {
        (0.0, 0.0)
    } else if a < EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(&r);
        if e < EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(&d2);
            let denominator = a * e - b * b;
            let mut s = if denominator > EPSILON {
                ((b * f - c * e) / denominator).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };

    (p1 + d1 * s, s, p2 + d2 * t, t)
}
