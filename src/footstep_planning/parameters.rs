//! Footstep planner parameter bundle
//!
//! All distances are in meters and angles in radians. The bundle can be
//! built from `Default`, from a TOML document, or from a TOML file; any
//! field missing from the document keeps its default value.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::path::Path;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::common::{PlannerError, PlannerResult, RobotSide};
use crate::geometry::ConvexPolygon2D;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FootstepPlannerParameters {
    /// Nominal lateral distance between the feet
    pub ideal_footstep_width: f64,
    /// Nominal forward step
    pub ideal_footstep_length: f64,
    /// Smallest forward offset of the swing foot from the stance foot (negative allows stepping back)
    pub minimum_step_length: f64,
    /// Largest horizontal reach, measured from the ideal stance position
    pub maximum_step_reach: f64,
    pub minimum_step_width: f64,
    pub maximum_step_width: f64,
    /// Yaw bounds of the swing foot relative to the stance foot, positive turning outwards
    pub minimum_step_yaw: f64,
    pub maximum_step_yaw: f64,
    /// Fraction by which the yaw bounds shrink at full reach
    pub step_yaw_reduction_factor_at_max_reach: f64,
    pub maximum_left_step_z: f64,
    pub maximum_right_step_z: f64,

    /// Pitch at which the stance surface counts as fully pitched; also the steepest steppable incline
    pub minimum_surface_incline_radians: f64,
    pub minimum_step_z_when_fully_pitched: f64,
    pub maximum_step_x_when_fully_pitched: f64,

    /// Step-down height beyond which the reduced forward/lateral box applies
    pub maximum_step_z_when_forward_and_down: f64,
    pub maximum_step_x_when_forward_and_down: f64,
    pub maximum_step_y_when_forward_and_down: f64,

    /// Step-up height beyond which the reduced reach and width apply
    pub maximum_step_z_when_stepping_up: f64,
    pub maximum_step_reach_when_stepping_up: f64,
    pub maximum_step_width_when_stepping_up: f64,
    /// Scale on the stepping-up reach measured from the start of swing; zero disables the check
    pub translation_scale_from_grandparent_node: f64,

    pub foot_length: f64,
    pub foot_width: f64,
    pub minimum_steppable_region_area: f64,
    /// Required clearance of the footprint inside the region hull; negative permits partial footholds
    pub wiggle_inside_delta: f64,
    pub maximum_xy_wiggle_distance: f64,
    pub maximum_yaw_wiggle: f64,
    pub maximum_wiggle_iterations: usize,
    /// Smallest foothold area, as a fraction of the full footprint
    pub minimum_foothold_percent: f64,

    pub translation_weight: f64,
    pub yaw_weight: f64,
    pub step_up_weight: f64,
    pub step_down_weight: f64,
    pub cost_per_step: f64,
    /// Scale applied to the heuristic; values above one trade optimality for speed
    pub heuristic_weight: f64,

    pub goal_distance_tolerance: f64,
    pub goal_yaw_tolerance: f64,
    /// Return the path to the most promising node when a budget runs out
    pub return_best_effort_plan: bool,
    /// Run the swing expander on every step of a found path
    pub swing_planning_enabled: bool,
}

impl Default for FootstepPlannerParameters {
    fn default() -> Self {
        Self {
            ideal_footstep_width: 0.22,
            ideal_footstep_length: 0.3,
            minimum_step_length: -0.3,
            maximum_step_reach: 0.4,
            minimum_step_width: 0.12,
            maximum_step_width: 0.4,
            minimum_step_yaw: -0.3,
            maximum_step_yaw: 0.5,
            step_yaw_reduction_factor_at_max_reach: 0.0,
            maximum_left_step_z: 0.25,
            maximum_right_step_z: 0.25,

            minimum_surface_incline_radians: FRAC_PI_4,
            minimum_step_z_when_fully_pitched: 0.05,
            maximum_step_x_when_fully_pitched: 0.3,

            maximum_step_z_when_forward_and_down: 0.1,
            maximum_step_x_when_forward_and_down: 0.3,
            maximum_step_y_when_forward_and_down: 0.35,

            maximum_step_z_when_stepping_up: 0.1,
            maximum_step_reach_when_stepping_up: 0.35,
            maximum_step_width_when_stepping_up: 0.35,
            translation_scale_from_grandparent_node: 0.0,

            foot_length: 0.22,
            foot_width: 0.11,
            minimum_steppable_region_area: 0.005,
            wiggle_inside_delta: 0.02,
            maximum_xy_wiggle_distance: 0.1,
            maximum_yaw_wiggle: 0.1,
            maximum_wiggle_iterations: 60,
            minimum_foothold_percent: 0.9,

            translation_weight: 1.0,
            yaw_weight: 0.3,
            step_up_weight: 1.0,
            step_down_weight: 0.5,
            cost_per_step: 0.15,
            heuristic_weight: 1.0,

            goal_distance_tolerance: 0.05,
            goal_yaw_tolerance: 0.1,
            return_best_effort_plan: false,
            swing_planning_enabled: false,
        }
    }
}

pub(crate) fn require(condition: bool, field: &str, message: impl Into<String>) -> PlannerResult<()> {
    if condition {
        Ok(())
    } else {
        Err(PlannerError::invalid_config(field, message))
    }
}

pub(crate) fn require_positive(value: f64, field: &str) -> PlannerResult<()> {
    require(value.is_finite() && value > 0.0, field, format!("must be positive, got {}", value))
}

pub(crate) fn require_non_negative(value: f64, field: &str) -> PlannerResult<()> {
    require(value.is_finite() && value >= 0.0, field, format!("must be non-negative, got {}", value))
}

pub(crate) fn require_finite(value: f64, field: &str) -> PlannerResult<()> {
    require(value.is_finite(), field, format!("must be finite, got {}", value))
}

impl FootstepPlannerParameters {
    pub fn from_toml_str(content: &str) -> PlannerResult<Self> {
        let parameters: Self = toml::from_str(content)?;
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> PlannerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject malformed bundles; values are never clamped
    pub fn validate(&self) -> PlannerResult<()> {
        require_positive(self.ideal_footstep_width, "ideal_footstep_width")?;
        require_finite(self.ideal_footstep_length, "ideal_footstep_length")?;
        require_finite(self.minimum_step_length, "minimum_step_length")?;
        require_positive(self.maximum_step_reach, "maximum_step_reach")?;
        require(
            self.minimum_step_length < self.maximum_step_reach,
            "minimum_step_length",
            "must be less than maximum_step_reach",
        )?;
        require_finite(self.minimum_step_width, "minimum_step_width")?;
        require_positive(self.maximum_step_width, "maximum_step_width")?;
        require(
            self.minimum_step_width <= self.maximum_step_width,
            "minimum_step_width",
            "must not exceed maximum_step_width",
        )?;
        require_finite(self.minimum_step_yaw, "minimum_step_yaw")?;
        require_finite(self.maximum_step_yaw, "maximum_step_yaw")?;
        require(
            self.minimum_step_yaw <= self.maximum_step_yaw,
            "minimum_step_yaw",
            "must not exceed maximum_step_yaw",
        )?;
        require(
            (0.0..=1.0).contains(&self.step_yaw_reduction_factor_at_max_reach),
            "step_yaw_reduction_factor_at_max_reach",
            "must be within [0, 1]",
        )?;
        require_positive(self.maximum_left_step_z, "maximum_left_step_z")?;
        require_positive(self.maximum_right_step_z, "maximum_right_step_z")?;

        require(
            self.minimum_surface_incline_radians > 0.0 && self.minimum_surface_incline_radians <= FRAC_PI_2,
            "minimum_surface_incline_radians",
            "must be within (0, pi/2]",
        )?;
        require_non_negative(self.minimum_step_z_when_fully_pitched, "minimum_step_z_when_fully_pitched")?;
        require_positive(self.maximum_step_x_when_fully_pitched, "maximum_step_x_when_fully_pitched")?;

        require_non_negative(self.maximum_step_z_when_forward_and_down, "maximum_step_z_when_forward_and_down")?;
        require_finite(self.maximum_step_x_when_forward_and_down, "maximum_step_x_when_forward_and_down")?;
        require_finite(self.maximum_step_y_when_forward_and_down, "maximum_step_y_when_forward_and_down")?;
        require_non_negative(self.maximum_step_z_when_stepping_up, "maximum_step_z_when_stepping_up")?;
        require_positive(self.maximum_step_reach_when_stepping_up, "maximum_step_reach_when_stepping_up")?;
        require_finite(self.maximum_step_width_when_stepping_up, "maximum_step_width_when_stepping_up")?;
        require_non_negative(self.translation_scale_from_grandparent_node, "translation_scale_from_grandparent_node")?;

        require_positive(self.foot_length, "foot_length")?;
        require_positive(self.foot_width, "foot_width")?;
        require_non_negative(self.minimum_steppable_region_area, "minimum_steppable_region_area")?;
        require_finite(self.wiggle_inside_delta, "wiggle_inside_delta")?;
        require_non_negative(self.maximum_xy_wiggle_distance, "maximum_xy_wiggle_distance")?;
        require_non_negative(self.maximum_yaw_wiggle, "maximum_yaw_wiggle")?;
        require(
            (0.0..=1.0).contains(&self.minimum_foothold_percent),
            "minimum_foothold_percent",
            "must be within [0, 1]",
        )?;

        require_non_negative(self.translation_weight, "translation_weight")?;
        require_non_negative(self.yaw_weight, "yaw_weight")?;
        require_non_negative(self.step_up_weight, "step_up_weight")?;
        require_non_negative(self.step_down_weight, "step_down_weight")?;
        require_non_negative(self.cost_per_step, "cost_per_step")?;
        require_positive(self.heuristic_weight, "heuristic_weight")?;

        require_non_negative(self.goal_distance_tolerance, "goal_distance_tolerance")?;
        require_non_negative(self.goal_yaw_tolerance, "goal_yaw_tolerance")?;
        Ok(())
    }

    pub fn maximum_step_z(&self, side: RobotSide) -> f64 {
        match side {
            RobotSide::Left => self.maximum_left_step_z,
            RobotSide::Right => self.maximum_right_step_z,
        }
    }

    /// Foot outline in the sole frame, centred on the sole origin
    pub fn footprint(&self) -> ConvexPolygon2D {
        ConvexPolygon2D::rectangle(Point2::origin(), self.foot_length, self.foot_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_is_valid() {
        assert!(FootstepPlannerParameters::default().validate().is_ok());
    }

    #[test]
    fn test_negative_reach_is_rejected() {
        let parameters = FootstepPlannerParameters {
            maximum_step_reach: -0.1,
            ..Default::default()
        };
        match parameters.validate() {
            Err(PlannerError::InvalidConfig { field, .. }) => assert_eq!(field, "maximum_step_reach"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_crossed_width_bounds_are_rejected() {
        let parameters = FootstepPlannerParameters {
            minimum_step_width: 0.5,
            ..Default::default()
        };
        assert!(parameters.validate().is_err());
    }

    #[test]
    fn test_nan_is_rejected() {
        let parameters = FootstepPlannerParameters {
            yaw_weight: f64::NAN,
            ..Default::default()
        };
        assert!(parameters.validate().is_err());
    }

    #[test]
    fn test_from_toml_keeps_defaults() {
        let parameters = FootstepPlannerParameters::from_toml_str(
            r#"
            maximum_step_reach = 0.5
            swing_planning_enabled = true
            "#,
        )
        .unwrap();
        assert_relative_eq!(parameters.maximum_step_reach, 0.5);
        assert!(parameters.swing_planning_enabled);
        assert_relative_eq!(parameters.ideal_footstep_width, 0.22);
    }

    #[test]
    fn test_from_toml_validates() {
        let result = FootstepPlannerParameters::from_toml_str("foot_length = 0.0");
        assert!(matches!(result, Err(PlannerError::InvalidConfig { .. })));
    }

    #[test]
    fn test_from_toml_parse_error() {
        let result = FootstepPlannerParameters::from_toml_str("maximum_step_reach = \"far\"");
        assert!(matches!(result, Err(PlannerError::ConfigParse(_))));
    }

    #[test]
    fn test_footprint_area() {
        let parameters = FootstepPlannerParameters::default();
        assert_relative_eq!(parameters.footprint().area(), 0.22 * 0.11, epsilon = 1e-12);
    }
}
