//! Text-recognition region tool.
//!
//! Drag out a rectangle over the page raster; on release the editor hands
//! the region to the recognition collaborator and, when text comes back,
//! inserts it as an editable text object at the region's origin. Only one
//! recognition may be in flight per scene.

use crate::geometry::{BoundingBox, Point};
use crate::tools::{OcrToolConfig, PointerInput, ToolEffect, ToolEnv, ToolPreview};

#[derive(Debug, Default)]
pub struct OcrTool {
    start: Option<Point>,
    current: Option<Point>,
    selecting: bool,
}

impl OcrTool {
    pub fn on_pointer_down(&mut self, input: &PointerInput, env: &ToolEnv<'_>) -> Vec<ToolEffect> {
        if input.target.is_some() || env.recognition_busy {
            return Vec::new();
        }

        self.start = Some(input.point);
        self.current = Some(input.point);
        self.selecting = true;
        Vec::new()
    }

    pub fn on_pointer_move(&mut self, input: &PointerInput) -> Vec<ToolEffect> {
        if self.selecting {
            self.current = Some(input.point);
        }
        Vec::new()
    }

    pub fn on_pointer_up(&mut self, input: &PointerInput, config: &OcrToolConfig) -> Vec<ToolEffect> {
        if !self.selecting {
            return Vec::new();
        }

        self.selecting = false;
        let (Some(start), Some(_)) = (self.start.take(), self.current.take()) else {
            return Vec::new();
        };

        let region = BoundingBox::from_corners(start, input.point);
        if region.width < config.min_selection_size || region.height < config.min_selection_size {
            return Vec::new();
        }

        vec![ToolEffect::RecognizeRegion { region }]
    }

    pub fn preview(&self, config: &OcrToolConfig) -> Option<ToolPreview> {
        if !self.selecting {
            return None;
        }

        let (start, current) = (self.start?, self.current?);
        Some(ToolPreview::Region {
            bounds: BoundingBox::from_corners(start, current),
            color: config.output_color.clone(),
        })
    }

    pub fn reset(&mut self) {
        self.start = None;
        self.current = None;
        self.selecting = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolConfig;
    use crate::units::MeasureCalibration;

    fn input(x: f64, y: f64) -> PointerInput {
        PointerInput {
            point: Point::new(x, y),
            target: None,
            shift: false,
        }
    }

    fn env_with_busy<'a>(
        config: &'a ToolConfig,
        calibration: &'a MeasureCalibration,
        busy: bool,
    ) -> ToolEnv<'a> {
        ToolEnv {
            config,
            calibration,
            current_scale: 1.0,
            recognition_busy: busy,
        }
    }

    #[test]
    fn test_drag_emits_recognition_request() {
        let mut tool = OcrTool::default();
        let config = ToolConfig::default();
        let calibration = MeasureCalibration::default();

        tool.on_pointer_down(&input(10.0, 10.0), &env_with_busy(&config, &calibration, false));
        tool.on_pointer_move(&input(60.0, 40.0));
        let effects = tool.on_pointer_up(&input(60.0, 40.0), &config.ocr);

        assert_eq!(effects.len(), 1);
        let ToolEffect::RecognizeRegion { region } = &effects[0] else {
            panic!("expected recognition request");
        };
        assert_eq!(region.left, 10.0);
        assert_eq!(region.width, 50.0);
    }

    #[test]
    fn test_small_region_is_discarded() {
        let mut tool = OcrTool::default();
        let config = ToolConfig::default();
        let calibration = MeasureCalibration::default();

        tool.on_pointer_down(&input(10.0, 10.0), &env_with_busy(&config, &calibration, false));
        let effects = tool.on_pointer_up(&input(20.0, 20.0), &config.ocr);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_busy_scene_rejects_new_selection() {
        let mut tool = OcrTool::default();
        let config = ToolConfig::default();
        let calibration = MeasureCalibration::default();

        tool.on_pointer_down(&input(10.0, 10.0), &env_with_busy(&config, &calibration, true));
        assert!(!tool.selecting);
        let effects = tool.on_pointer_up(&input(100.0, 100.0), &config.ocr);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_preview_tracks_selection() {
        let mut tool = OcrTool::default();
        let config = ToolConfig::default();
        let calibration = MeasureCalibration::default();

        assert!(tool.preview(&config.ocr).is_none());
        tool.on_pointer_down(&input(0.0, 0.0), &env_with_busy(&config, &calibration, false));
        tool.on_pointer_move(&input(30.0, 30.0));
        assert!(matches!(
            tool.preview(&config.ocr),
            Some(ToolPreview::Region { bounds, .. }) if bounds.width == 30.0
        ));
    }
}
