//! Step feasibility
//!
//! `FootstepPoseChecker` evaluates the kinematic reachability of a snapped
//! candidate relative to the snapped stance foot. `FootstepNodeChecker`
//! wraps it with the node-level checks that need the snapper (snap
//! success, foothold area, stepping in place).

use std::fmt;

use log::trace;
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use serde::Serialize;

use crate::common::{angle_difference, pitch_of, yaw_of, RobotSide};
use crate::footstep_planning::node::FootstepNode;
use crate::footstep_planning::parameters::FootstepPlannerParameters;
use crate::footstep_planning::snapping::FootstepNodeSnapper;

/// Why a candidate step was pruned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RejectionReason {
    CouldNotSnap,
    NotEnoughArea,
    StepInPlace,
    StepNotWideEnough,
    StepTooWide,
    StepNotLongEnough,
    StepTooHighOrLow,
    StepTooLowAndForwardWhenPitched,
    StepTooForwardAndDown,
    StepTooWideAndDown,
    StepTooFar,
    StepTooFarAndHigh,
    StepTooWideAndHigh,
    StepYawsTooMuch,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectionReason::CouldNotSnap => "could not snap",
            RejectionReason::NotEnoughArea => "not enough area",
            RejectionReason::StepInPlace => "step in place",
            RejectionReason::StepNotWideEnough => "step not wide enough",
            RejectionReason::StepTooWide => "step too wide",
            RejectionReason::StepNotLongEnough => "step not long enough",
            RejectionReason::StepTooHighOrLow => "step too high or low",
            RejectionReason::StepTooLowAndForwardWhenPitched => "step too low and forward when pitched",
            RejectionReason::StepTooForwardAndDown => "step too forward and down",
            RejectionReason::StepTooWideAndDown => "step too wide and down",
            RejectionReason::StepTooFar => "step too far",
            RejectionReason::StepTooFarAndHigh => "step too far and high",
            RejectionReason::StepTooWideAndHigh => "step too wide and high",
            RejectionReason::StepYawsTooMuch => "step yaws too much",
        };
        f.write_str(text)
    }
}

fn interpolate(a: f64, b: f64, alpha: f64) -> f64 {
    a + alpha * (b - a)
}

/// Gravity-aligned frame at the transform's origin, keeping only its yaw
fn z_up_frame(transform: &Isometry3<f64>) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::from(transform.translation.vector),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw_of(transform)),
    )
}

/// Kinematic reachability checks between two snapped placements
#[derive(Debug, Clone)]
pub struct FootstepPoseChecker {
    parameters: FootstepPlannerParameters,
}

impl FootstepPoseChecker {
    pub fn new(parameters: &FootstepPlannerParameters) -> Self {
        Self {
            parameters: parameters.clone(),
        }
    }

    /// First violated rule, or `None` if the step is feasible
    ///
    /// `start_of_swing` is the snapped pose of the swing foot before this
    /// step (the stance node's parent), when known.
    pub fn check_step_validity(
        &self,
        candidate: &FootstepNode,
        candidate_transform: &Isometry3<f64>,
        stance: &FootstepNode,
        stance_transform: &Isometry3<f64>,
        start_of_swing: Option<&Isometry3<f64>>,
    ) -> Option<RejectionReason> {
        let p = &self.parameters;
        let step_side = candidate.side();

        let candidate_position = Point3::from(candidate_transform.translation.vector);
        let in_stance = z_up_frame(stance_transform).inverse_transform_point(&candidate_position);

        let step_length = in_stance.x;
        let step_width = step_side.negate_if_right(in_stance.y);
        let step_reach_xy = step_length.abs().hypot((step_width - p.ideal_footstep_width).abs());
        let step_height = in_stance.z;
        let maximum_step_z = p.maximum_step_z(step_side);

        if step_width < p.minimum_step_width {
            return Some(RejectionReason::StepNotWideEnough);
        } else if step_width > p.maximum_step_width {
            return Some(RejectionReason::StepTooWide);
        } else if step_length < p.minimum_step_length {
            return Some(RejectionReason::StepNotLongEnough);
        } else if step_height.abs() > maximum_step_z {
            return Some(RejectionReason::StepTooHighOrLow);
        }

        let alpha_pitched_back = (-pitch_of(stance_transform) / p.minimum_surface_incline_radians).max(0.0);
        let min_z_from_pitch =
            interpolate(maximum_step_z.abs(), p.minimum_step_z_when_fully_pitched.abs(), alpha_pitched_back);
        let max_x_from_pitch =
            interpolate(p.maximum_step_reach.abs(), p.maximum_step_x_when_fully_pitched, alpha_pitched_back);
        let step_down_fraction = -step_height / min_z_from_pitch;
        let step_forward_fraction = step_length / max_x_from_pitch;

        let step_too_low = step_length > 0.0 && step_down_fraction > 1.0;
        let step_too_forward = step_height < 0.0 && step_forward_fraction > 1.0;
        if alpha_pitched_back > 0.0 && (step_too_low || step_too_forward) {
            return Some(RejectionReason::StepTooLowAndForwardWhenPitched);
        }

        let mut max_reach = p.maximum_step_reach;
        if step_height < -p.maximum_step_z_when_forward_and_down.abs() {
            if step_length > p.maximum_step_x_when_forward_and_down {
                return Some(RejectionReason::StepTooForwardAndDown);
            }
            if step_width > p.maximum_step_y_when_forward_and_down {
                return Some(RejectionReason::StepTooWideAndDown);
            }
            max_reach = p
                .maximum_step_x_when_forward_and_down
                .hypot(p.maximum_step_y_when_forward_and_down - p.ideal_footstep_width);
        }

        if step_reach_xy > p.maximum_step_reach {
            return Some(RejectionReason::StepTooFar);
        }

        if step_height > p.maximum_step_z_when_stepping_up {
            if step_reach_xy > p.maximum_step_reach_when_stepping_up {
                return Some(RejectionReason::StepTooFarAndHigh);
            }
            if step_width > p.maximum_step_width_when_stepping_up {
                return Some(RejectionReason::StepTooWideAndHigh);
            }
            max_reach = p.maximum_step_reach_when_stepping_up;
        }

        // Yaw bounds narrow towards the edge of the reach envelope
        let step_reach_3d = step_reach_xy.hypot(step_height);
        let max_interpolation = (step_reach_3d / max_reach)
            .max((step_height / maximum_step_z).abs())
            .min(1.0);
        let reduction = 1.0 - p.step_yaw_reduction_factor_at_max_reach;
        let max_yaw = interpolate(p.maximum_step_yaw, reduction * p.maximum_step_yaw, max_interpolation);
        let min_yaw = interpolate(p.minimum_step_yaw, reduction * p.minimum_step_yaw, max_interpolation);
        let yaw_delta = step_side.negate_if_right(angle_difference(candidate.yaw(), stance.yaw()));
        if yaw_delta < min_yaw || yaw_delta > max_yaw {
            return Some(RejectionReason::StepYawsTooMuch);
        }

        let alpha_start_of_swing = p.translation_scale_from_grandparent_node;
        if alpha_start_of_swing > 0.0 {
            if let Some(start_of_swing) = start_of_swing {
                let in_start_of_swing = z_up_frame(start_of_swing).inverse_transform_point(&candidate_position);
                let swing_height = in_start_of_swing.z;
                let swing_reach = in_start_of_swing.x.hypot(in_start_of_swing.y);
                if swing_height > p.maximum_step_z_when_stepping_up
                    && swing_reach > alpha_start_of_swing * p.maximum_step_reach_when_stepping_up
                {
                    return Some(RejectionReason::StepTooFarAndHigh);
                }
            }
        }

        None
    }
}

/// Node-level checks followed by the pose checks
#[derive(Debug, Clone)]
pub struct FootstepNodeChecker {
    pose_checker: FootstepPoseChecker,
    minimum_foothold_area: f64,
}

impl FootstepNodeChecker {
    pub fn new(parameters: &FootstepPlannerParameters) -> Self {
        Self {
            pose_checker: FootstepPoseChecker::new(parameters),
            minimum_foothold_area: parameters.minimum_foothold_percent * parameters.footprint().area(),
        }
    }

    pub fn pose_checker(&self) -> &FootstepPoseChecker {
        &self.pose_checker
    }

    /// `grandparent` is the swing foot's previous placement, when known
    pub fn is_node_valid(
        &self,
        snapper: &mut FootstepNodeSnapper,
        candidate: &FootstepNode,
        stance: &FootstepNode,
        grandparent: Option<&FootstepNode>,
    ) -> Option<RejectionReason> {
        let reason = self.check(snapper, candidate, stance, grandparent);
        if let Some(reason) = reason {
            trace!("Rejected {} from {}: {}", candidate, stance, reason);
        }
        reason
    }

    fn check(
        &self,
        snapper: &mut FootstepNodeSnapper,
        candidate: &FootstepNode,
        stance: &FootstepNode,
        grandparent: Option<&FootstepNode>,
    ) -> Option<RejectionReason> {
        if grandparent == Some(candidate) {
            return Some(RejectionReason::StepInPlace);
        }

        let candidate_data = snapper.snap(candidate);
        let candidate_transform = match candidate_data.transform() {
            Some(transform) => *transform,
            None => return Some(RejectionReason::CouldNotSnap),
        };
        if candidate_data.foothold_area() < self.minimum_foothold_area {
            return Some(RejectionReason::NotEnoughArea);
        }

        let stance_transform = match snapper.snap(stance).transform() {
            Some(transform) => *transform,
            None => return Some(RejectionReason::CouldNotSnap),
        };
        let start_of_swing = grandparent.and_then(|node| snapper.snap(node).transform().copied());

        self.pose_checker.check_step_validity(
            candidate,
            &candidate_transform,
            stance,
            &stance_transform,
            start_of_swing.as_ref(),
        )
    }
}
