//! Freehand drawing tool.

use crate::geometry::{BoundingBox, Point};
use crate::object::{ObjectKind, SceneObject};
use crate::scene::PageScene;
use crate::tools::{DrawToolConfig, PointerInput, ToolEffect, ToolPreview};

/// Captures a freehand stroke between pointer down and up, then commits it
/// as a path object positioned at the stroke's bounding box.
#[derive(Debug, Default)]
pub struct DrawTool {
    stroke: Vec<Point>,
}

impl DrawTool {
    pub fn on_pointer_down(&mut self, input: &PointerInput) -> Vec<ToolEffect> {
        self.stroke = vec![input.point];
        Vec::new()
    }

    pub fn on_pointer_move(&mut self, input: &PointerInput) -> Vec<ToolEffect> {
        if !self.stroke.is_empty() {
            self.stroke.push(input.point);
        }
        Vec::new()
    }

    pub fn on_pointer_up(
        &mut self,
        scene: &mut PageScene,
        input: &PointerInput,
        config: &DrawToolConfig,
    ) -> Vec<ToolEffect> {
        if self.stroke.is_empty() {
            return Vec::new();
        }

        self.stroke.push(input.point);
        let points = std::mem::take(&mut self.stroke);
        commit_stroke(scene, points, &config.color, config.brush_size)
    }

    pub fn preview(&self, config: &DrawToolConfig) -> Option<ToolPreview> {
        if self.stroke.len() < 2 {
            return None;
        }

        Some(ToolPreview::Stroke {
            points: self.stroke.clone(),
            color: config.color.clone(),
            width: config.brush_size,
        })
    }

    pub fn reset(&mut self) {
        self.stroke.clear();
    }
}

/// Commit a captured stroke as a path object. Single-point strokes (a
/// click without movement) are discarded.
pub(crate) fn commit_stroke(
    scene: &mut PageScene,
    points: Vec<Point>,
    color: &str,
    stroke_width: f64,
) -> Vec<ToolEffect> {
    if points.len() < 2 {
        return Vec::new();
    }

    let bounds = BoundingBox::from_points(&points);
    let relative: Vec<Point> = points
        .iter()
        .map(|point| Point::new(point.x - bounds.left, point.y - bounds.top))
        .collect();

    scene.add_object(SceneObject::new(
        ObjectKind::FreehandPath {
            points: relative,
            color: color.to_string(),
            stroke_width,
        },
        bounds.left,
        bounds.top,
    ));

    vec![ToolEffect::SceneChanged]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(x: f64, y: f64) -> PointerInput {
        PointerInput {
            point: Point::new(x, y),
            target: None,
            shift: false,
        }
    }

    #[test]
    fn test_stroke_commits_path_at_bounds() {
        let mut scene = PageScene::new(1, 400.0, 400.0);
        let mut tool = DrawTool::default();
        let config = DrawToolConfig::default();

        tool.on_pointer_down(&input(100.0, 50.0));
        tool.on_pointer_move(&input(110.0, 60.0));
        tool.on_pointer_move(&input(120.0, 40.0));
        let effects = tool.on_pointer_up(&mut scene, &input(130.0, 55.0), &config);

        assert_eq!(effects, vec![ToolEffect::SceneChanged]);
        let object = &scene.objects()[0];
        assert_eq!(object.left, 100.0);
        assert_eq!(object.top, 40.0);
        let ObjectKind::FreehandPath { points, .. } = &object.kind else {
            panic!("expected path");
        };
        assert_eq!(points.len(), 4);
        assert_eq!(points[0], Point::new(0.0, 10.0));
    }

    #[test]
    fn test_move_without_down_is_ignored() {
        let mut tool = DrawTool::default();
        tool.on_pointer_move(&input(10.0, 10.0));
        assert!(tool.preview(&DrawToolConfig::default()).is_none());
    }

    #[test]
    fn test_preview_reflects_stroke() {
        let mut tool = DrawTool::default();
        tool.on_pointer_down(&input(0.0, 0.0));
        tool.on_pointer_move(&input(5.0, 5.0));
        let preview = tool.preview(&DrawToolConfig::default()).unwrap();
        assert!(matches!(preview, ToolPreview::Stroke { ref points, .. } if points.len() == 2));
    }

    #[test]
    fn test_reset_discards_stroke() {
        let mut scene = PageScene::new(1, 400.0, 400.0);
        let mut tool = DrawTool::default();
        tool.on_pointer_down(&input(0.0, 0.0));
        tool.reset();
        let effects = tool.on_pointer_up(&mut scene, &input(5.0, 5.0), &DrawToolConfig::default());
        assert!(effects.is_empty());
        assert!(scene.is_empty());
    }
}
