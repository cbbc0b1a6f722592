//! Area measurement tool: click-drag-click rectangles or click-to-add
//! polygons, committed as locked groups tagged with the base pixel area.

use crate::geometry::{polygon_area, polygon_centroid, BoundingBox, Point};
use crate::object::{MeasureTag, ObjectKind, SceneObject};
use crate::scene::PageScene;
use crate::tools::{
    rgba_color, AreaMeasureMode, PointerInput, ToolEffect, ToolEnv, ToolPreview,
};
use crate::units::format_area_label;

const MIN_SIDE_PIXELS: f64 = 6.0;
const MIN_POLYGON_AREA_PIXELS: f64 = 24.0;
const CLOSE_THRESHOLD_PIXELS: f64 = 10.0;

const LABEL_FONT_SIZE: f64 = 14.0;

#[derive(Debug, Default)]
pub struct AreaMeasureTool {
    rectangle_start: Option<Point>,
    rectangle_current: Option<Point>,
    polygon_points: Vec<Point>,
    polygon_hover: Option<Point>,
}

impl AreaMeasureTool {
    pub fn on_pointer_down(
        &mut self,
        scene: &mut PageScene,
        input: &PointerInput,
        env: &ToolEnv<'_>,
    ) -> Vec<ToolEffect> {
        if input.target.is_some() {
            return Vec::new();
        }

        let point = input.point;
        match env.config.measure_area.mode {
            AreaMeasureMode::Polygon => self.polygon_click(scene, point, env),
            AreaMeasureMode::Rectangle => self.rectangle_click(scene, point, env),
        }
    }

    fn polygon_click(
        &mut self,
        scene: &mut PageScene,
        point: Point,
        env: &ToolEnv<'_>,
    ) -> Vec<ToolEffect> {
        if self.polygon_points.is_empty() {
            self.polygon_points.push(point);
            self.polygon_hover = Some(point);
            return Vec::new();
        }

        // Clicking near the first vertex with enough vertices closes the
        // polygon; otherwise the click is one more vertex.
        let first = self.polygon_points[0];
        if self.polygon_points.len() >= 3 && point.distance_to(first) <= CLOSE_THRESHOLD_PIXELS {
            if let Some(effects) = commit_polygon(scene, &self.polygon_points, env) {
                self.polygon_points.clear();
                self.polygon_hover = None;
                return effects;
            }
        }

        self.polygon_points.push(point);
        self.polygon_hover = Some(point);
        Vec::new()
    }

    fn rectangle_click(
        &mut self,
        scene: &mut PageScene,
        point: Point,
        env: &ToolEnv<'_>,
    ) -> Vec<ToolEffect> {
        let Some(start) = self.rectangle_start else {
            self.rectangle_start = Some(point);
            self.rectangle_current = Some(point);
            return Vec::new();
        };

        match commit_rectangle(scene, start, point, env) {
            Some(effects) => {
                self.rectangle_start = None;
                self.rectangle_current = None;
                effects
            }
            None => {
                self.rectangle_start = Some(point);
                self.rectangle_current = Some(point);
                Vec::new()
            }
        }
    }

    pub fn on_pointer_move(&mut self, input: &PointerInput) -> Vec<ToolEffect> {
        if !self.polygon_points.is_empty() {
            self.polygon_hover = Some(input.point);
        }
        if self.rectangle_start.is_some() {
            self.rectangle_current = Some(input.point);
        }
        Vec::new()
    }

    pub fn preview(&self, env: &ToolEnv<'_>) -> Option<ToolPreview> {
        let config = &env.config.measure_area;
        let effective = env.calibration.effective_pixels_per_unit(env.current_scale);

        if !self.polygon_points.is_empty() {
            let mut preview_points = self.polygon_points.clone();
            if let Some(hover) = self.polygon_hover {
                preview_points.push(hover);
            }
            let label = (preview_points.len() >= 3).then(|| {
                format_area_label(
                    polygon_area(&preview_points),
                    effective,
                    &env.calibration.unit_label,
                )
            });
            return Some(ToolPreview::MeasurePolygon {
                points: self.polygon_points.clone(),
                hover: self.polygon_hover,
                label,
                color: config.color.clone(),
                width: config.line_width,
                fill: rgba_color(&config.color, config.fill_opacity),
            });
        }

        let (start, current) = (self.rectangle_start?, self.rectangle_current?);
        let bounds = BoundingBox::from_corners(start, current);
        Some(ToolPreview::MeasureRect {
            label: format_area_label(bounds.area(), effective, &env.calibration.unit_label),
            bounds,
            color: config.color.clone(),
            width: config.line_width,
            fill: rgba_color(&config.color, config.fill_opacity),
        })
    }

    pub fn reset(&mut self) {
        self.rectangle_start = None;
        self.rectangle_current = None;
        self.polygon_points.clear();
        self.polygon_hover = None;
    }
}

fn commit_rectangle(
    scene: &mut PageScene,
    from: Point,
    to: Point,
    env: &ToolEnv<'_>,
) -> Option<Vec<ToolEffect>> {
    let bounds = BoundingBox::from_corners(from, to);
    if bounds.width < MIN_SIDE_PIXELS || bounds.height < MIN_SIDE_PIXELS {
        return None;
    }

    let config = &env.config.measure_area;
    let base_area_px = bounds.area();
    let effective = env.calibration.effective_pixels_per_unit(env.current_scale);

    let mut rect = SceneObject::new(
        ObjectKind::Rect {
            width: bounds.width,
            height: bounds.height,
            stroke: config.color.clone(),
            stroke_width: config.line_width,
            fill: rgba_color(&config.color, config.fill_opacity),
        },
        0.0,
        0.0,
    );
    rect.selectable = false;

    let mut label = SceneObject::new(
        ObjectKind::Text {
            text: format_area_label(base_area_px, effective, &env.calibration.unit_label),
            font_size: LABEL_FONT_SIZE,
            color: config.color.clone(),
            bold: false,
            italic: false,
        },
        8.0,
        (bounds.top - 18.0).max(8.0) - bounds.top,
    );
    label.selectable = false;

    scene.add_object(
        SceneObject::new(
            ObjectKind::Group {
                children: vec![rect, label],
                measurement: Some(MeasureTag::AreaRectangle { base_area_px }),
            },
            bounds.left,
            bounds.top,
        )
        .with_measurement_locks(),
    );

    Some(vec![ToolEffect::SceneChanged])
}

fn commit_polygon(
    scene: &mut PageScene,
    points: &[Point],
    env: &ToolEnv<'_>,
) -> Option<Vec<ToolEffect>> {
    let base_area_px = polygon_area(points);
    if base_area_px < MIN_POLYGON_AREA_PIXELS {
        return None;
    }

    let config = &env.config.measure_area;
    let effective = env.calibration.effective_pixels_per_unit(env.current_scale);
    let bounds = BoundingBox::from_points(points);
    let relative: Vec<Point> = points
        .iter()
        .map(|point| Point::new(point.x - bounds.left, point.y - bounds.top))
        .collect();

    let mut shape = SceneObject::new(
        ObjectKind::Polygon {
            points: relative,
            stroke: config.color.clone(),
            stroke_width: config.line_width,
            fill: rgba_color(&config.color, config.fill_opacity),
        },
        0.0,
        0.0,
    );
    shape.selectable = false;

    let centroid = polygon_centroid(points);
    let mut label = SceneObject::new(
        ObjectKind::Text {
            text: format_area_label(base_area_px, effective, &env.calibration.unit_label),
            font_size: LABEL_FONT_SIZE,
            color: config.color.clone(),
            bold: false,
            italic: false,
        },
        centroid.x - bounds.left + 8.0,
        centroid.y - bounds.top - 8.0,
    );
    label.selectable = false;

    scene.add_object(
        SceneObject::new(
            ObjectKind::Group {
                children: vec![shape, label],
                measurement: Some(MeasureTag::AreaPolygon { base_area_px }),
            },
            bounds.left,
            bounds.top,
        )
        .with_measurement_locks(),
    );

    Some(vec![ToolEffect::SceneChanged])
}
