//! Visualization utilities for footstep_planning
//!
//! Top-down plots of terrain regions, planned footholds and swing paths
//! using gnuplot. Everything is collected first and drawn onto a single set
//! of axes when the figure is shown or saved.

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};
use nalgebra::{Isometry3, Point2, Point3};

use crate::common::{Pose2D, RobotSide};
use crate::footstep_planning::FootstepPlan;
use crate::geometry::{ConvexPolygon2D, TerrainModel};
use crate::swing_planning::SwingPlan;

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const GREEN: &str = "#00AA00";
    pub const BLUE: &str = "#0000FF";
    pub const ORANGE: &str = "#FFA500";
    pub const GRAY: &str = "#808080";

    pub const REGION: &str = GRAY;
    pub const LEFT_FOOT: &str = RED;
    pub const RIGHT_FOOT: &str = BLUE;
    pub const SWING: &str = ORANGE;
    pub const START: &str = GREEN;
    pub const GOAL: &str = BLACK;
}

/// Style for line rendering
#[derive(Debug, Clone)]
pub struct LineStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: Option<String>,
}

impl LineStyle {
    pub fn new(color: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 1.0,
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: &str) -> Self {
        self.caption = Some(caption.to_string());
        self
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

/// Style for point rendering
#[derive(Debug, Clone)]
pub struct PointStyle {
    pub color: String,
    pub size: f64,
    pub symbol: char,
    pub caption: Option<String>,
}

impl PointStyle {
    pub fn new(color: &str) -> Self {
        Self {
            color: color.to_string(),
            size: 1.0,
            symbol: 'O',
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: &str) -> Self {
        self.caption = Some(caption.to_string());
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_symbol(mut self, symbol: char) -> Self {
        self.symbol = symbol;
        self
    }
}

#[derive(Debug, Clone)]
enum Layer {
    Line { x: Vec<f64>, y: Vec<f64>, style: LineStyle },
    Points { x: Vec<f64>, y: Vec<f64>, style: PointStyle },
}

fn closed_outline(polygon: &ConvexPolygon2D) -> (Vec<f64>, Vec<f64>) {
    let mut x: Vec<f64> = polygon.vertices().iter().map(|v| v.x).collect();
    let mut y: Vec<f64> = polygon.vertices().iter().map(|v| v.y).collect();
    if let (Some(&x0), Some(&y0)) = (x.first(), y.first()) {
        x.push(x0);
        y.push(y0);
    }
    (x, y)
}

/// Sole-frame polygon projected onto the world XY plane
fn sole_polygon_in_world(polygon: &ConvexPolygon2D, transform: &Isometry3<f64>) -> ConvexPolygon2D {
    let projected: Vec<Point2<f64>> = polygon
        .vertices()
        .iter()
        .map(|v| {
            let world = transform.transform_point(&Point3::new(v.x, v.y, 0.0));
            Point2::new(world.x, world.y)
        })
        .collect();
    ConvexPolygon2D::from_vertices(&projected)
}

/// Main visualizer struct
pub struct Visualizer {
    figure: Figure,
    layers: Vec<Layer>,
    title: String,
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
    aspect_ratio: Option<f64>,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            figure: Figure::new(),
            layers: Vec::new(),
            title: String::new(),
            x_range: None,
            y_range: None,
            aspect_ratio: Some(1.0),
        }
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    pub fn set_x_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.x_range = Some((min, max));
        self
    }

    pub fn set_y_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.y_range = Some((min, max));
        self
    }

    /// Set aspect ratio (None for auto)
    pub fn set_aspect_ratio(&mut self, ratio: Option<f64>) -> &mut Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Outline of a polygon given in world XY
    pub fn plot_polygon(&mut self, polygon: &ConvexPolygon2D, style: &LineStyle) -> &mut Self {
        let (x, y) = closed_outline(polygon);
        if !x.is_empty() {
            self.layers.push(Layer::Line { x, y, style: style.clone() });
        }
        self
    }

    /// XY outlines of every region
    pub fn plot_terrain(&mut self, terrain: &TerrainModel) -> &mut Self {
        for (i, region) in terrain.regions().iter().enumerate() {
            let mut style = LineStyle::new(colors::REGION);
            if i == 0 {
                style = style.with_caption("Regions");
            }
            self.plot_polygon(region.world_hull_xy(), &style);
        }
        self
    }

    /// Footholds of a plan, colored by side
    pub fn plot_footsteps(&mut self, plan: &FootstepPlan) -> &mut Self {
        let mut captioned = [false; 2];
        for step in &plan.steps {
            let (transform, foothold) = match (step.snap_data.transform(), step.snap_data.foothold()) {
                (Some(transform), Some(foothold)) => (transform, foothold),
                _ => continue,
            };
            let (color, caption, slot) = match step.side() {
                RobotSide::Left => (colors::LEFT_FOOT, "Left", 0),
                RobotSide::Right => (colors::RIGHT_FOOT, "Right", 1),
            };
            let mut style = LineStyle::new(color).with_line_width(2.0);
            if !captioned[slot] {
                style = style.with_caption(caption);
                captioned[slot] = true;
            }
            self.plot_polygon(&sole_polygon_in_world(foothold, transform), &style);
        }
        self
    }

    /// Swing trajectory and its waypoints
    pub fn plot_swing(&mut self, swing: &SwingPlan, samples: usize) -> &mut Self {
        let samples = samples.max(1);
        let positions: Vec<Point3<f64>> = (0..=samples)
            .map(|i| swing.trajectory.position(i as f64 / samples as f64))
            .collect();
        self.layers.push(Layer::Line {
            x: positions.iter().map(|p| p.x).collect(),
            y: positions.iter().map(|p| p.y).collect(),
            style: LineStyle::new(colors::SWING),
        });
        self.layers.push(Layer::Points {
            x: swing.waypoints.iter().map(|p| p.x).collect(),
            y: swing.waypoints.iter().map(|p| p.y).collect(),
            style: PointStyle::new(colors::SWING).with_symbol('x').with_size(0.8),
        });
        self
    }

    pub fn plot_pose(&mut self, pose: &Pose2D, style: &PointStyle) -> &mut Self {
        self.layers.push(Layer::Points {
            x: vec![pose.x],
            y: vec![pose.y],
            style: style.clone(),
        });
        self
    }

    pub fn plot_start(&mut self, pose: &Pose2D) -> &mut Self {
        self.plot_pose(pose, &PointStyle::new(colors::START).with_caption("Start").with_size(1.5))
    }

    pub fn plot_goal(&mut self, pose: &Pose2D) -> &mut Self {
        self.plot_pose(pose, &PointStyle::new(colors::GOAL).with_caption("Goal").with_size(1.5))
    }

    /// Finalize and show the plot
    pub fn show(&mut self) -> Result<(), String> {
        self.render();
        self.figure.show().map_err(|e| e.to_string()).map(|_| ())
    }

    /// Save plot to PNG file
    pub fn save_png(&mut self, path: &str, width: u32, height: u32) -> Result<(), String> {
        self.render();
        self.figure.save_to_png(path, width, height).map_err(|e| e.to_string())
    }

    /// Save plot to SVG file
    pub fn save_svg(&mut self, path: &str) -> Result<(), String> {
        self.render();
        self.figure.save_to_svg(path, 800, 600).map_err(|e| e.to_string())
    }

    fn render(&mut self) {
        self.figure.clear_axes();
        let axes = self.figure.axes2d();

        for layer in &self.layers {
            match layer {
                Layer::Line { x, y, style } => match &style.caption {
                    Some(caption) => {
                        axes.lines(x, y, &[Caption(caption), Color(&style.color), LineWidth(style.line_width)]);
                    }
                    None => {
                        axes.lines(x, y, &[Color(&style.color), LineWidth(style.line_width)]);
                    }
                },
                Layer::Points { x, y, style } => match &style.caption {
                    Some(caption) => {
                        axes.points(
                            x,
                            y,
                            &[
                                Caption(caption),
                                Color(&style.color),
                                PointSymbol(style.symbol),
                                PointSize(style.size),
                            ],
                        );
                    }
                    None => {
                        axes.points(x, y, &[Color(&style.color), PointSymbol(style.symbol), PointSize(style.size)]);
                    }
                },
            }
        }

        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label("X [m]", &[]);
        axes.set_y_label("Y [m]", &[]);
        if let Some((min, max)) = self.x_range {
            axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some((min, max)) = self.y_range {
            axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some(ratio) = self.aspect_ratio {
            axes.set_aspect_ratio(AutoOption::Fix(ratio));
        }
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}
