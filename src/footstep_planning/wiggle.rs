//! Bounded in-plane optimisation moving a polygon into a convex hull
//!
//! The polygon is moved by a planar rigid transform (dx, dy, dyaw about its
//! centroid) inside a box of allowed displacements. The objective is the sum
//! of squared clearance violations of its vertices,
//! `max(0, signed_distance(v) + delta_inside)^2`, plus a small penalty on the
//! displacement. It is minimised with a compass (pattern) search, which is
//! deterministic and needs no gradient of the hull distance.

use nalgebra::{Isometry2, Point2, Rotation2, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::ConvexPolygon2D;

const INSIDE_TOLERANCE: f64 = 1e-10;
const MINIMUM_STEP: f64 = 1e-5;

/// How two candidates with (nearly) equal objective are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep the current best
    KeepIncumbent,
    /// Move to the candidate closer to the unwiggled placement
    PreferSmallerDisplacement,
}

/// When a candidate placement replaces the current best
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateComparison {
    /// A candidate must lower the objective by more than this to win outright
    pub improvement_tolerance: f64,
    pub tie_break: TieBreak,
}

impl Default for CandidateComparison {
    fn default() -> Self {
        Self {
            improvement_tolerance: 0.0,
            tie_break: TieBreak::KeepIncumbent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WiggleParameters {
    /// Required clearance inside the hull, negative allows hanging over the edge
    pub delta_inside: f64,
    pub max_translation: f64,
    pub max_yaw: f64,
    pub max_iterations: usize,
    pub displacement_penalty: f64,
    pub comparison: CandidateComparison,
}

impl Default for WiggleParameters {
    fn default() -> Self {
        Self {
            delta_inside: 0.0,
            max_translation: 0.1,
            max_yaw: 0.1,
            max_iterations: 60,
            displacement_penalty: 1e-3,
            comparison: CandidateComparison::default(),
        }
    }
}

/// Sum of squared clearance violations of the polygon's vertices
pub fn clearance_violation(polygon: &ConvexPolygon2D, hull: &ConvexPolygon2D, delta_inside: f64) -> f64 {
    polygon
        .vertices()
        .iter()
        .map(|vertex| (hull.signed_distance(vertex) + delta_inside).max(0.0).powi(2))
        .sum()
}

pub struct PolygonWiggler {
    parameters: WiggleParameters,
}

impl PolygonWiggler {
    pub fn new(parameters: WiggleParameters) -> Self {
        Self { parameters }
    }

    /// Transform moving `polygon` as far inside `hull` as the bounds allow
    ///
    /// Returns `None` only when either polygon is degenerate. The identity is
    /// returned untouched when the polygon already satisfies the clearance.
    pub fn wiggle_into_convex_hull(&self, polygon: &ConvexPolygon2D, hull: &ConvexPolygon2D) -> Option<Isometry2<f64>> {
        if hull.len() < 3 || polygon.is_empty() {
            return None;
        }
        let pivot = polygon.centroid()?;
        let params = &self.parameters;

        let evaluate = |state: &Vector3<f64>| -> (f64, f64) {
            let moved = polygon.transform(&Self::to_isometry(state, &pivot));
            let violation = clearance_violation(&moved, hull, params.delta_inside);
            (violation, violation + params.displacement_penalty * state.norm_squared())
        };

        let mut best = Vector3::zeros();
        let (mut best_violation, mut best_cost) = evaluate(&best);
        if best_violation <= INSIDE_TOLERANCE {
            return Some(Isometry2::identity());
        }

        let bounds = Vector3::new(params.max_translation, params.max_translation, params.max_yaw);
        let mut step = bounds * 0.5;
        for _ in 0..params.max_iterations {
            if best_violation <= INSIDE_TOLERANCE || step.max() < MINIMUM_STEP {
                break;
            }

            let mut improved = false;
            for axis in 0..3 {
                for direction in [1.0, -1.0] {
                    if step[axis] < MINIMUM_STEP {
                        continue;
                    }
                    let mut candidate = best;
                    candidate[axis] = (candidate[axis] + direction * step[axis]).clamp(-bounds[axis], bounds[axis]);
                    if candidate == best {
                        continue;
                    }
                    let (violation, cost) = evaluate(&candidate);
                    if self.is_better(cost, &candidate, best_cost, &best) {
                        best = candidate;
                        best_cost = cost;
                        best_violation = violation;
                        improved = true;
                    }
                }
            }

            if !improved {
                step *= 0.5;
            }
        }

        Some(Self::to_isometry(&best, &pivot))
    }

    fn is_better(&self, cost: f64, candidate: &Vector3<f64>, best_cost: f64, best: &Vector3<f64>) -> bool {
        let comparison = &self.parameters.comparison;
        if cost < best_cost - comparison.improvement_tolerance {
            return true;
        }
        if (cost - best_cost).abs() > comparison.improvement_tolerance {
            return false;
        }
        match comparison.tie_break {
            TieBreak::KeepIncumbent => false,
            TieBreak::PreferSmallerDisplacement => candidate.norm_squared() < best.norm_squared(),
        }
    }

    /// Rotation by `state.z` about `pivot` followed by translation `(state.x, state.y)`
    fn to_isometry(state: &Vector3<f64>, pivot: &Point2<f64>) -> Isometry2<f64> {
        let rotation = Rotation2::new(state.z);
        let translation = pivot.coords + Vector2::new(state.x, state.y) - rotation * pivot.coords;
        Isometry2::new(translation, state.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn foot_at(x: f64, y: f64) -> ConvexPolygon2D {
        ConvexPolygon2D::rectangle(Point2::new(x, y), 0.22, 0.11)
    }

    fn region() -> ConvexPolygon2D {
        ConvexPolygon2D::rectangle(Point2::origin(), 1.0, 1.0)
    }

    #[test]
    fn test_already_inside_is_identity() {
        let wiggler = PolygonWiggler::new(WiggleParameters {
            delta_inside: 0.02,
            ..Default::default()
        });
        let transform = wiggler.wiggle_into_convex_hull(&foot_at(0.0, 0.0), &region()).unwrap();
        assert_eq!(transform, Isometry2::identity());
    }

    #[test]
    fn test_moves_foot_off_the_edge() {
        let wiggler = PolygonWiggler::new(WiggleParameters {
            delta_inside: 0.02,
            ..Default::default()
        });
        let foot = foot_at(0.45, 0.0);
        let transform = wiggler.wiggle_into_convex_hull(&foot, &region()).unwrap();
        let moved = foot.transform(&transform);
        for vertex in moved.vertices() {
            assert!(region().signed_distance(vertex) <= -0.02 + 1e-3);
        }
        assert!(transform.translation.vector.x < -0.05);
    }

    #[test]
    fn test_displacement_is_bounded() {
        let wiggler = PolygonWiggler::new(WiggleParameters {
            max_translation: 0.05,
            max_yaw: 0.0,
            ..Default::default()
        });
        let foot = foot_at(0.8, 0.0);
        let transform = wiggler.wiggle_into_convex_hull(&foot, &region()).unwrap();
        assert_relative_eq!(transform.translation.vector.x, -0.05, epsilon = 1e-9);
        assert_relative_eq!(transform.rotation.angle(), 0.0);
    }

    #[test]
    fn test_large_tolerance_keeps_incumbent() {
        let wiggler = PolygonWiggler::new(WiggleParameters {
            comparison: CandidateComparison {
                improvement_tolerance: 1.0,
                tie_break: TieBreak::KeepIncumbent,
            },
            ..Default::default()
        });
        let transform = wiggler.wiggle_into_convex_hull(&foot_at(0.45, 0.0), &region()).unwrap();
        assert_eq!(transform, Isometry2::identity());
    }

    #[test]
    fn test_degenerate_hull() {
        let wiggler = PolygonWiggler::new(WiggleParameters::default());
        let segment = ConvexPolygon2D::from_xy(&[(0.0, 0.0), (1.0, 0.0)]);
        assert!(wiggler.wiggle_into_convex_hull(&foot_at(0.0, 0.0), &segment).is_none());
    }

    #[test]
    fn test_negative_delta_allows_overhang() {
        let foot = foot_at(0.5, 0.0);
        assert_relative_eq!(clearance_violation(&foot, &region(), -0.12), 0.0);
        assert!(clearance_violation(&foot, &region(), 0.0) > 0.0);
    }
}
