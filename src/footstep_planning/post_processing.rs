//! Transfer timing and weight distribution from foothold support
//!
//! When the foot being stepped onto has more support than the trailing
//! foot, the transfer onto it can start earlier and load it more. Both
//! values are fractions in `(0, 1)`. A value left unset keeps whatever the
//! downstream controller defaults to.

use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::common::PlannerResult;
use crate::footstep_planning::a_star::FootstepPlan;
use crate::footstep_planning::parameters::require;

const MINIMUM_FRACTION: f64 = 0.01;
const MAXIMUM_FRACTION: f64 = 0.99;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessingParameters {
    pub area_split_fraction_processing_enabled: bool,
    /// Load fraction on a foot that has all the support area
    pub fraction_load_if_foot_has_full_support: f64,
    /// Time fraction spent on a foot that has all the support area
    pub fraction_time_on_foot_if_foot_has_full_support: f64,
    /// Load fraction on a foot when the other foot has zero width
    pub fraction_load_if_other_foot_has_no_width: f64,
    pub fraction_time_on_foot_if_other_foot_has_no_width: f64,
    pub default_transfer_split_fraction: f64,
    pub default_transfer_weight_distribution: f64,
}

impl Default for PostProcessingParameters {
    fn default() -> Self {
        Self {
            area_split_fraction_processing_enabled: false,
            fraction_load_if_foot_has_full_support: 1.0,
            fraction_time_on_foot_if_foot_has_full_support: 0.0,
            fraction_load_if_other_foot_has_no_width: 1.0,
            fraction_time_on_foot_if_other_foot_has_no_width: 0.0,
            default_transfer_split_fraction: 0.5,
            default_transfer_weight_distribution: 0.5,
        }
    }
}

fn require_fraction(value: f64, field: &str) -> PlannerResult<()> {
    require((0.0..=1.0).contains(&value), field, format!("must be within [0, 1], got {}", value))
}

impl PostProcessingParameters {
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
        require_fraction(self.fraction_load_if_foot_has_full_support, "fraction_load_if_foot_has_full_support")?;
        require_fraction(
            self.fraction_time_on_foot_if_foot_has_full_support,
            "fraction_time_on_foot_if_foot_has_full_support",
        )?;
        require_fraction(self.fraction_load_if_other_foot_has_no_width, "fraction_load_if_other_foot_has_no_width")?;
        require_fraction(
            self.fraction_time_on_foot_if_other_foot_has_no_width,
            "fraction_time_on_foot_if_other_foot_has_no_width",
        )?;
        require(
            self.default_transfer_split_fraction > 0.0 && self.default_transfer_split_fraction < 1.0,
            "default_transfer_split_fraction",
            "must be within (0, 1)",
        )?;
        require(
            self.default_transfer_weight_distribution > 0.0 && self.default_transfer_weight_distribution < 1.0,
            "default_transfer_weight_distribution",
            "must be within (0, 1)",
        )
    }
}

/// Combine two fractions relative to `default`; an unset side yields the other
pub fn compose_fraction(first: Option<f64>, second: Option<f64>, default: f64) -> Option<f64> {
    match (first, second) {
        (None, value) | (value, None) => value,
        (Some(a), Some(b)) => Some(a / default * (b / default) * default),
    }
}

pub struct AreaSplitFractionProcessor {
    parameters: PostProcessingParameters,
}

impl AreaSplitFractionProcessor {
    pub fn new(parameters: PostProcessingParameters) -> Self {
        Self { parameters }
    }

    pub fn is_active(&self) -> bool {
        self.parameters.area_split_fraction_processing_enabled
    }

    /// Set the transfer into each step from the support of it and its predecessor
    ///
    /// The transfer computed for step `i` is stored on step `i + 1`, which
    /// is where the controller starts that transfer; the last one goes on
    /// the plan's final transfer.
    pub fn process(&self, plan: &mut FootstepPlan) {
        let params = &self.parameters;
        let count = plan.steps.len();

        for step_number in 1..count {
            let (previous, current) = match (
                plan.steps[step_number - 1].snap_data.foothold(),
                plan.steps[step_number].snap_data.foothold(),
            ) {
                (Some(previous), Some(current)) => (previous, current),
                _ => continue,
            };

            let previous_area = previous.area();
            let current_area = current.area();
            if previous_area + current_area <= 0.0 {
                continue;
            }
            let previous_width = previous.bounding_box_range_y();
            let current_width = current.bounding_box_range_y();

            let percent_area = current_area / (previous_area + current_area);
            let percent_width = if previous_width + current_width > 0.0 {
                Some(current_width / (previous_width + current_width))
            } else {
                None
            };

            let weight = compose_fraction(
                percent_width.map(|w| w * params.fraction_load_if_other_foot_has_no_width),
                Some(percent_area * params.fraction_load_if_foot_has_full_support),
                params.default_transfer_weight_distribution,
            )
            .map(|w| w.clamp(MINIMUM_FRACTION, MAXIMUM_FRACTION));
            let split = compose_fraction(
                percent_width.map(|w| w * (1.0 - params.fraction_time_on_foot_if_other_foot_has_no_width)),
                Some(percent_area * (1.0 - params.fraction_time_on_foot_if_foot_has_full_support)),
                params.default_transfer_split_fraction,
            )
            .map(|s| s.clamp(MINIMUM_FRACTION, MAXIMUM_FRACTION));

            if step_number == count - 1 {
                plan.final_transfer_split_fraction = compose_fraction(
                    split,
                    plan.final_transfer_split_fraction,
                    params.default_transfer_split_fraction,
                );
                plan.final_transfer_weight_distribution = compose_fraction(
                    weight,
                    plan.final_transfer_weight_distribution,
                    params.default_transfer_weight_distribution,
                );
            } else {
                let next = &mut plan.steps[step_number + 1];
                next.transfer_split_fraction =
                    compose_fraction(split, next.transfer_split_fraction, params.default_transfer_split_fraction);
                next.transfer_weight_distribution = compose_fraction(
                    weight,
                    next.transfer_weight_distribution,
                    params.default_transfer_weight_distribution,
                );
            }
        }
        debug!("Computed transfer split fractions for {} steps", count);
    }
}
