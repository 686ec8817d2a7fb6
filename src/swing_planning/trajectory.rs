//! Swing foot trajectory through two waypoints

use nalgebra::{Point3, Vector3};

use crate::common::PlannerResult;
use crate::swing_planning::spline::CubicSpline;

/// Shortest normalised time allotted to one segment, keeps knots strictly increasing
const MINIMUM_SEGMENT_TIME: f64 = 1e-6;

/// Position over normalised swing time `[0, 1]`
///
/// Passes through start, both waypoints and end. Segment times are
/// proportional to chord length. The foot leaves the start at rest and
/// reaches the end with `touchdown_velocity`.
#[derive(Debug, Clone)]
pub struct TwoWaypointSwingTrajectory {
    times: [f64; 4],
    axes: [CubicSpline; 3],
}

impl TwoWaypointSwingTrajectory {
    pub fn new(
        start: &Point3<f64>,
        waypoints: &[Point3<f64>; 2],
        end: &Point3<f64>,
        touchdown_velocity: &Vector3<f64>,
    ) -> PlannerResult<Self> {
        let points = [*start, waypoints[0], waypoints[1], *end];
        let lengths: Vec<f64> = points
            .windows(2)
            .map(|w| (w[1] - w[0]).norm().max(MINIMUM_SEGMENT_TIME))
            .collect();
        let total: f64 = lengths.iter().sum();

        let mut times = [0.0; 4];
        for i in 1..4 {
            times[i] = times[i - 1] + lengths[i - 1] / total;
        }
        times[3] = 1.0;

        let axis = |k: usize| -> PlannerResult<CubicSpline> {
            let values: Vec<f64> = points.iter().map(|p| p[k]).collect();
            CubicSpline::clamped(&times, &values, 0.0, touchdown_velocity[k])
        };

        Ok(Self {
            times,
            axes: [axis(0)?, axis(1)?, axis(2)?],
        })
    }

    pub fn position(&self, time: f64) -> Point3<f64> {
        Point3::new(self.axes[0].calc(time), self.axes[1].calc(time), self.axes[2].calc(time))
    }

    pub fn velocity(&self, time: f64) -> Vector3<f64> {
        Vector3::new(self.axes[0].calcd(time), self.axes[1].calcd(time), self.axes[2].calcd(time))
    }

    /// Time at which waypoint `index` (0 or 1) is passed
    pub fn waypoint_time(&self, index: usize) -> f64 {
        self.times[(index + 1).min(2)]
    }

    /// Largest speed over `samples` evenly spaced times
    pub fn max_speed(&self, samples: usize) -> f64 {
        let samples = samples.max(1);
        (0..=samples)
            .map(|i| self.velocity(i as f64 / samples as f64).norm())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn trajectory() -> TwoWaypointSwingTrajectory {
        TwoWaypointSwingTrajectory::new(
            &Point3::new(0.0, 0.0, 0.0),
            &[Point3::new(0.06, 0.0, 0.1), Point3::new(0.34, 0.0, 0.1)],
            &Point3::new(0.4, 0.0, 0.0),
            &Vector3::new(0.0, 0.0, -0.3),
        )
        .unwrap()
    }

    #[test]
    fn test_passes_through_waypoints() {
        let trajectory = trajectory();
        assert_relative_eq!(trajectory.position(0.0), Point3::new(0.0, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(trajectory.position(1.0), Point3::new(0.4, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(
            trajectory.position(trajectory.waypoint_time(0)),
            Point3::new(0.06, 0.0, 0.1),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            trajectory.position(trajectory.waypoint_time(1)),
            Point3::new(0.34, 0.0, 0.1),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_boundary_velocities() {
        let trajectory = trajectory();
        assert_relative_eq!(trajectory.velocity(0.0), Vector3::zeros(), epsilon = 1e-9);
        assert_relative_eq!(trajectory.velocity(1.0), Vector3::new(0.0, 0.0, -0.3), epsilon = 1e-9);
    }

    #[test]
    fn test_waypoint_times_are_ordered() {
        let trajectory = trajectory();
        assert!(trajectory.waypoint_time(0) > 0.0);
        assert!(trajectory.waypoint_time(0) < trajectory.waypoint_time(1));
        assert!(trajectory.waypoint_time(1) < 1.0);
        assert!(trajectory.max_speed(100) > 0.0);
    }

    #[test]
    fn test_coincident_waypoints() {
        let waypoint = Point3::new(0.0, 0.0, 0.1);
        let trajectory = TwoWaypointSwingTrajectory::new(
            &Point3::origin(),
            &[waypoint, waypoint],
            &Point3::new(1e-4, 1e-4, 1e-4),
            &Vector3::zeros(),
        )
        .unwrap();
        assert!(trajectory.max_speed(50).is_finite());
        assert!(trajectory.position(0.5).coords.iter().all(|v| v.is_finite()));
    }
}
