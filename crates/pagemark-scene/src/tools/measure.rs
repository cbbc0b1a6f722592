//! Distance measurement tool.
//!
//! Two clicks: the first anchors the line, the second commits it as a
//! locked group of line + label tagged with the base delta vector. The
//! very first measurement while uncalibrated prompts for the real-world
//! distance of the drawn line and derives the calibration from it.

use crate::geometry::{snap_to_angle, BoundingBox, Point};
use crate::object::{MeasureTag, ObjectKind, SceneObject};
use crate::scene::PageScene;
use crate::tools::{PointerInput, ToolEffect, ToolEnv, ToolPreview};
use crate::units::format_distance_label;

/// Guards against a stray double-click committing a zero-length line.
const MIN_DISTANCE_PIXELS: f64 = 6.0;

const LABEL_FONT_SIZE: f64 = 14.0;

/// Asks the user for the real-world length of the first measured line.
/// Returning `None` (dismissal) aborts the commit.
pub trait CalibrationPrompt {
    fn request_distance(&mut self, unit_label: &str) -> Option<f64>;
}

/// Prompt that always declines; useful where no UI is attached.
#[derive(Debug, Default)]
pub struct NoCalibrationPrompt;

impl CalibrationPrompt for NoCalibrationPrompt {
    fn request_distance(&mut self, _unit_label: &str) -> Option<f64> {
        None
    }
}

#[derive(Debug, Default)]
pub struct MeasureTool {
    start: Option<Point>,
    current: Option<Point>,
}

impl MeasureTool {
    pub fn on_pointer_down(
        &mut self,
        scene: &mut PageScene,
        input: &PointerInput,
        env: &ToolEnv<'_>,
        prompt: &mut dyn CalibrationPrompt,
    ) -> Vec<ToolEffect> {
        if input.target.is_some() {
            return Vec::new();
        }

        let point = input.point;
        let Some(start) = self.start else {
            self.start = Some(point);
            self.current = Some(point);
            return Vec::new();
        };

        let end = if input.shift {
            snap_to_angle(start, point)
        } else {
            point
        };

        match create_measurement(scene, start, end, env, prompt) {
            Some(effects) => {
                self.start = None;
                self.current = None;
                effects
            }
            // Failed commit restarts the anchor at the clicked point.
            None => {
                self.start = Some(point);
                self.current = Some(point);
                Vec::new()
            }
        }
    }

    pub fn on_pointer_move(&mut self, input: &PointerInput) -> Vec<ToolEffect> {
        if let Some(start) = self.start {
            self.current = Some(if input.shift {
                snap_to_angle(start, input.point)
            } else {
                input.point
            });
        }
        Vec::new()
    }

    pub fn preview(&self, env: &ToolEnv<'_>) -> Option<ToolPreview> {
        let (from, to) = (self.start?, self.current?);
        let effective = env.calibration.effective_pixels_per_unit(env.current_scale);
        let label = format_distance_label(
            from.distance_to(to),
            effective,
            &env.calibration.unit_label,
        );
        Some(ToolPreview::MeasureLine {
            from,
            to,
            label,
            color: env.config.measure.color.clone(),
            width: env.config.measure.line_width,
        })
    }

    pub fn reset(&mut self) {
        self.start = None;
        self.current = None;
    }
}

fn create_measurement(
    scene: &mut PageScene,
    from: Point,
    to: Point,
    env: &ToolEnv<'_>,
    prompt: &mut dyn CalibrationPrompt,
) -> Option<Vec<ToolEffect>> {
    let base_dx = to.x - from.x;
    let base_dy = to.y - from.y;
    let pixel_distance = (base_dx * base_dx + base_dy * base_dy).sqrt();
    if pixel_distance < MIN_DISTANCE_PIXELS {
        return None;
    }

    let config = &env.config.measure;
    let mut effects = Vec::new();

    let effective_pixels_per_unit = if env.calibration.is_calibrated {
        env.calibration.effective_pixels_per_unit(env.current_scale)
    } else {
        let entered = prompt.request_distance(&env.calibration.unit_label)?;
        if !entered.is_finite() || entered <= 0.0 {
            return None;
        }

        let pixels_per_unit = pixel_distance / entered;
        effects.push(ToolEffect::Calibrated {
            pixels_per_unit,
            calibration_scale: env.current_scale,
        });
        pixels_per_unit
    };

    let bounds = BoundingBox::from_corners(from, to);
    let mut line = SceneObject::new(
        ObjectKind::Line {
            from: Point::new(from.x - bounds.left, from.y - bounds.top),
            to: Point::new(to.x - bounds.left, to.y - bounds.top),
            color: config.color.clone(),
            stroke_width: config.line_width,
        },
        0.0,
        0.0,
    );
    line.selectable = false;

    let mid_x = (from.x + to.x) / 2.0;
    let mid_y = (from.y + to.y) / 2.0;
    let mut label = SceneObject::new(
        ObjectKind::Text {
            text: format_distance_label(
                pixel_distance,
                effective_pixels_per_unit,
                &env.calibration.unit_label,
            ),
            font_size: LABEL_FONT_SIZE,
            color: config.color.clone(),
            bold: false,
            italic: false,
        },
        mid_x - bounds.left + 8.0,
        mid_y - bounds.top - 8.0,
    );
    label.selectable = false;

    scene.add_object(
        SceneObject::new(
            ObjectKind::Group {
                children: vec![line, label],
                measurement: Some(MeasureTag::Distance { base_dx, base_dy }),
            },
            bounds.left,
            bounds.top,
        )
        .with_measurement_locks(),
    );

    effects.push(ToolEffect::SceneChanged);
    Some(effects)
}
