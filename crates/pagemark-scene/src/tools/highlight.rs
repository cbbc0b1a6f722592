//! Highlighter: a freehand stroke with a translucent composite color.

use crate::geometry::Point;
use crate::scene::PageScene;
use crate::tools::draw::commit_stroke;
use crate::tools::{rgba_color, HighlightToolConfig, PointerInput, ToolEffect, ToolPreview};

#[derive(Debug, Default)]
pub struct HighlightTool {
    stroke: Vec<Point>,
}

impl HighlightTool {
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
        config: &HighlightToolConfig,
    ) -> Vec<ToolEffect> {
        if self.stroke.is_empty() {
            return Vec::new();
        }

        self.stroke.push(input.point);
        let points = std::mem::take(&mut self.stroke);
        let color = rgba_color(&config.color, config.opacity);
        commit_stroke(scene, points, &color, config.brush_size)
    }

    pub fn preview(&self, config: &HighlightToolConfig) -> Option<ToolPreview> {
        if self.stroke.len() < 2 {
            return None;
        }

        Some(ToolPreview::Stroke {
            points: self.stroke.clone(),
            color: rgba_color(&config.color, config.opacity),
            width: config.brush_size,
        })
    }

    pub fn reset(&mut self) {
        self.stroke.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectKind;

    fn input(x: f64, y: f64) -> PointerInput {
        PointerInput {
            point: Point::new(x, y),
            target: None,
            shift: false,
        }
    }

    #[test]
    fn test_highlight_stroke_uses_translucent_color() {
        let mut scene = PageScene::new(1, 400.0, 400.0);
        let mut tool = HighlightTool::default();
        let config = HighlightToolConfig::default();

        tool.on_pointer_down(&input(0.0, 0.0));
        tool.on_pointer_move(&input(50.0, 0.0));
        let effects = tool.on_pointer_up(&mut scene, &input(100.0, 0.0), &config);

        assert_eq!(effects, vec![ToolEffect::SceneChanged]);
        let ObjectKind::FreehandPath {
            color,
            stroke_width,
            ..
        } = &scene.objects()[0].kind
        else {
            panic!("expected path");
        };
        // #FFEB3B at 0.4 opacity.
        assert_eq!(color, "rgba(255, 235, 59, 0.4)");
        assert_eq!(*stroke_width, 20.0);
    }
}
