//! Rough terrain footstep planning example
//!
//! Plans across a field of randomly tilted stepping stones between two
//! platforms, expands a swing for every step and plots the result. An
//! optional TOML file with planner parameters can be passed as the first
//! argument.

use std::time::Duration;

use log::{error, info, warn};
use nalgebra::{Isometry3, Point2, Translation3, UnitQuaternion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use footstep_planning::common::{FootstepPlanner, Pose2D};
use footstep_planning::footstep_planning::{
    AStarFootstepPlanner, FootstepPlannerParameters, FootstepPlanningRequest, PlanningGoal, PostProcessingParameters,
};
use footstep_planning::geometry::{ConvexPolygon2D, PlanarRegion, TerrainModel};
use footstep_planning::utils::Visualizer;

const SHOW_ANIMATION: bool = true;

const STONE_SIZE: f64 = 0.3;
const STONE_SPACING: f64 = 0.32;
const NUMBER_OF_STONES: usize = 7;

fn stepping_stones(rng: &mut StdRng) -> TerrainModel {
    let mut regions = vec![
        PlanarRegion::horizontal(0, 0.0, ConvexPolygon2D::rectangle(Point2::new(0.0, 0.1), 0.8, 0.8)),
        PlanarRegion::horizontal(
            1,
            0.1,
            ConvexPolygon2D::rectangle(Point2::new(0.7 + NUMBER_OF_STONES as f64 * STONE_SPACING, 0.1), 0.8, 0.8),
        ),
    ];

    for i in 0..NUMBER_OF_STONES {
        let x = 0.6 + i as f64 * STONE_SPACING + rng.gen_range(-0.03..0.03);
        for (j, lane) in [0.23, -0.03].iter().enumerate() {
            let y = lane + rng.gen_range(-0.03..0.03);
            let z = rng.gen_range(-0.05..0.1);
            let tilt = UnitQuaternion::from_euler_angles(rng.gen_range(-0.1..0.1), rng.gen_range(-0.1..0.1), 0.0);
            let transform = Isometry3::from_parts(Translation3::new(x, y, z), tilt);
            let id = 2 + (2 * i + j) as i32;
            regions.push(PlanarRegion::from_convex_polygon(
                id,
                transform,
                ConvexPolygon2D::rectangle(Point2::origin(), STONE_SIZE, STONE_SIZE),
            ));
        }
    }

    TerrainModel::new(regions)
}

fn main() {
    env_logger::init();
    info!("Rough terrain footstep planning start!!");

    let mut parameters = match std::env::args().nth(1) {
        Some(path) => match FootstepPlannerParameters::from_toml_file(&path) {
            Ok(parameters) => parameters,
            Err(e) => {
                error!("Could not load parameters from {}: {}", path, e);
                return;
            }
        },
        None => FootstepPlannerParameters::default(),
    };
    parameters.swing_planning_enabled = true;

    let mut rng = StdRng::seed_from_u64(7);
    let terrain = stepping_stones(&mut rng);
    info!("Created {} regions", terrain.len());

    let width = parameters.ideal_footstep_width;
    let start_left = Pose2D::new(0.0, 0.1 + width / 2.0, 0.0);
    let start_right = Pose2D::new(0.0, 0.1 - width / 2.0, 0.0);
    let goal_pose = Pose2D::new(0.7 + NUMBER_OF_STONES as f64 * STONE_SPACING, 0.1, 0.0);

    let request = FootstepPlanningRequest::new(
        start_left,
        start_right,
        PlanningGoal::from_midfoot_pose(&goal_pose, width),
        terrain.clone(),
    )
    .with_parameters(parameters)
    .with_post_processing(PostProcessingParameters {
        area_split_fraction_processing_enabled: true,
        ..Default::default()
    })
    .with_timeout(Duration::from_secs(10));

    let mut planner = AStarFootstepPlanner::new();
    let result = planner.plan(&request);
    info!(
        "Status: {}, iterations: {}, expanded: {}, rejected: {}",
        result.status,
        result.statistics.iterations,
        result.statistics.expanded_nodes,
        result.statistics.total_rejections()
    );
    for (reason, count) in &result.statistics.rejections {
        info!("  {}: {}", reason, count);
    }

    let plan = match result.plan {
        Some(plan) => plan,
        None => {
            warn!("No plan found");
            return;
        }
    };

    for (i, step) in plan.steps.iter().enumerate() {
        let height = step
            .snap_data
            .transform()
            .map_or(f64::NAN, |transform| transform.translation.vector.z);
        let swing = step
            .swing
            .as_ref()
            .map(|swing| format!("{:?}, max speed {:.2}", swing.status, swing.max_swing_speed))
            .unwrap_or_else(|| "none".to_string());
        info!(
            "Step {}: {} z {:.3} region {:?} swing {}",
            i,
            step.node,
            height,
            step.snap_data.region_id(),
            swing
        );
    }

    if SHOW_ANIMATION {
        let mut vis = Visualizer::new();
        vis.set_title("Footstep plan over stepping stones")
            .set_x_range(-0.6, goal_pose.x + 0.6)
            .set_y_range(-0.6, 0.8)
            .set_aspect_ratio(Some(1.0));
        vis.plot_terrain(&terrain);
        vis.plot_footsteps(&plan);
        for swing in plan.steps.iter().filter_map(|step| step.swing.as_ref()) {
            vis.plot_swing(swing, 50);
        }
        vis.plot_start(&Pose2D::new(0.0, 0.1, 0.0));
        vis.plot_goal(&goal_pose);

        if let Err(e) = vis.save_png("rough_terrain_planning.png", 1000, 600) {
            warn!("Failed to save plot: {}", e);
        }
        if let Err(e) = vis.save_svg("rough_terrain_planning.svg") {
            warn!("Failed to save plot: {}", e);
        }
        if let Err(e) = vis.show() {
            warn!("Failed to show plot: {}", e);
        }
    }

    info!("Done!");
}
