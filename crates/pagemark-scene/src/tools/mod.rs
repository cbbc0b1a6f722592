//! Annotation tool state machines.
//!
//! Exactly one tool is active at a time. Each tool interprets pointer and
//! key input against the scene it is pointed at, keeps its own in-progress
//! state (preview geometry), and reports side effects as explicit
//! [`ToolEffect`] values for the editor to apply. Tools never touch
//! history, selection tracking or collaborators directly.

pub mod draw;
pub mod eraser;
pub mod highlight;
pub mod image;
pub mod measure;
pub mod measure_area;
pub mod ocr;
pub mod select;
pub mod signature;
pub mod text;

use crate::geometry::{BoundingBox, Point};
use crate::object::ObjectId;
use crate::scene::PageScene;
use crate::units::MeasureCalibration;
use serde::{Deserialize, Serialize};

pub use measure::CalibrationPrompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    Select,
    Text,
    Draw,
    Highlight,
    Measure,
    MeasureArea,
    Ocr,
    Image,
    Eraser,
    Signature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cursor {
    Default,
    Crosshair,
    Text,
    Copy,
    NotAllowed,
    Progress,
}

/// How the renderer should treat the scene while a tool is active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InteractionMode {
    pub selection_enabled: bool,
    pub hit_testing: bool,
    pub drawing: bool,
    pub cursor: Cursor,
}

/// One pointer event, already resolved against the scene: `target` is the
/// topmost object under the pointer when the tool wants hit testing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub point: Point,
    pub target: Option<ObjectId>,
    pub shift: bool,
}

/// Keys the tool layer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKey {
    Delete,
    Backspace,
}

/// Side effects a tool asks the editor to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEffect {
    /// The scene was mutated; serialize and record history.
    SceneChanged,
    /// A first measurement calibrated the unit conversion.
    Calibrated {
        pixels_per_unit: f64,
        calibration_scale: f64,
    },
    OpenSignaturePad {
        point: Point,
    },
    PickImage {
        point: Point,
    },
    RecognizeRegion {
        region: BoundingBox,
    },
}

/// Live preview geometry for the renderer to draw above the scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "preview", rename_all = "kebab-case")]
pub enum ToolPreview {
    Stroke {
        points: Vec<Point>,
        color: String,
        width: f64,
    },
    MeasureLine {
        from: Point,
        to: Point,
        label: String,
        color: String,
        width: f64,
    },
    MeasureRect {
        bounds: BoundingBox,
        label: String,
        color: String,
        width: f64,
        fill: String,
    },
    MeasurePolygon {
        points: Vec<Point>,
        hover: Option<Point>,
        label: Option<String>,
        color: String,
        width: f64,
        fill: String,
    },
    Region {
        bounds: BoundingBox,
        color: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextToolConfig {
    pub font_size: f64,
    pub color: String,
    pub bold: bool,
    pub italic: bool,
}

impl Default for TextToolConfig {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            color: "#111111".to_string(),
            bold: false,
            italic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawToolConfig {
    pub color: String,
    pub brush_size: f64,
}

impl Default for DrawToolConfig {
    fn default() -> Self {
        Self {
            color: "#111111".to_string(),
            brush_size: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightToolConfig {
    pub color: String,
    pub brush_size: f64,
    pub opacity: f64,
}

impl Default for HighlightToolConfig {
    fn default() -> Self {
        Self {
            color: "#FFEB3B".to_string(),
            brush_size: 20.0,
            opacity: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureToolConfig {
    pub color: String,
    pub line_width: f64,
}

impl Default for MeasureToolConfig {
    fn default() -> Self {
        Self {
            color: "#ff4d4f".to_string(),
            line_width: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AreaMeasureMode {
    Rectangle,
    Polygon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaMeasureToolConfig {
    pub color: String,
    pub line_width: f64,
    pub fill_opacity: f64,
    pub mode: AreaMeasureMode,
}

impl Default for AreaMeasureToolConfig {
    fn default() -> Self {
        Self {
            color: "#ff4d4f".to_string(),
            line_width: 2.0,
            fill_opacity: 0.14,
            mode: AreaMeasureMode::Rectangle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrToolConfig {
    pub language: String,
    pub output_font_size: f64,
    pub output_color: String,
    pub min_selection_size: f64,
}

impl Default for OcrToolConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            output_font_size: 16.0,
            output_color: "#111111".to_string(),
            min_selection_size: 24.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub text: TextToolConfig,
    #[serde(default)]
    pub draw: DrawToolConfig,
    #[serde(default)]
    pub highlight: HighlightToolConfig,
    #[serde(default)]
    pub measure: MeasureToolConfig,
    #[serde(default)]
    pub measure_area: AreaMeasureToolConfig,
    #[serde(default)]
    pub ocr: OcrToolConfig,
}

/// Read-only context handed to tool handlers.
pub struct ToolEnv<'a> {
    pub config: &'a ToolConfig,
    pub calibration: &'a MeasureCalibration,
    pub current_scale: f64,
    pub recognition_busy: bool,
}

/// Parse a `#RRGGBB` color; anything malformed falls back to black.
pub(crate) fn parse_hex_color(color: &str) -> (u8, u8, u8) {
    let hex = color.trim_start_matches('#');
    if hex.len() >= 6 {
        let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
        let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
        let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
        (r, g, b)
    } else {
        (0, 0, 0)
    }
}

/// Composite a hex color with an alpha channel into an `rgba(...)` string.
pub(crate) fn rgba_color(color: &str, alpha: f64) -> String {
    let (r, g, b) = parse_hex_color(color);
    format!("rgba({}, {}, {}, {})", r, g, b, alpha)
}

/// The currently active tool and its in-progress state.
#[derive(Debug)]
pub enum ActiveTool {
    Select(select::SelectTool),
    Text(text::TextTool),
    Draw(draw::DrawTool),
    Highlight(highlight::HighlightTool),
    Measure(measure::MeasureTool),
    MeasureArea(measure_area::AreaMeasureTool),
    Ocr(ocr::OcrTool),
    Image(image::ImageTool),
    Eraser(eraser::EraserTool),
    Signature(signature::SignatureTool),
}

impl ActiveTool {
    pub fn new(kind: ToolKind) -> Self {
        match kind {
            ToolKind::Select => ActiveTool::Select(select::SelectTool::default()),
            ToolKind::Text => ActiveTool::Text(text::TextTool::default()),
            ToolKind::Draw => ActiveTool::Draw(draw::DrawTool::default()),
            ToolKind::Highlight => ActiveTool::Highlight(highlight::HighlightTool::default()),
            ToolKind::Measure => ActiveTool::Measure(measure::MeasureTool::default()),
            ToolKind::MeasureArea => {
                ActiveTool::MeasureArea(measure_area::AreaMeasureTool::default())
            }
            ToolKind::Ocr => ActiveTool::Ocr(ocr::OcrTool::default()),
            ToolKind::Image => ActiveTool::Image(image::ImageTool::default()),
            ToolKind::Eraser => ActiveTool::Eraser(eraser::EraserTool::default()),
            ToolKind::Signature => ActiveTool::Signature(signature::SignatureTool::default()),
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ActiveTool::Select(_) => ToolKind::Select,
            ActiveTool::Text(_) => ToolKind::Text,
            ActiveTool::Draw(_) => ToolKind::Draw,
            ActiveTool::Highlight(_) => ToolKind::Highlight,
            ActiveTool::Measure(_) => ToolKind::Measure,
            ActiveTool::MeasureArea(_) => ToolKind::MeasureArea,
            ActiveTool::Ocr(_) => ToolKind::Ocr,
            ActiveTool::Image(_) => ToolKind::Image,
            ActiveTool::Eraser(_) => ToolKind::Eraser,
            ActiveTool::Signature(_) => ToolKind::Signature,
        }
    }

    pub fn interaction(&self) -> InteractionMode {
        match self {
            ActiveTool::Select(_) => InteractionMode {
                selection_enabled: true,
                hit_testing: true,
                drawing: false,
                cursor: Cursor::Default,
            },
            ActiveTool::Text(_) => InteractionMode {
                selection_enabled: false,
                hit_testing: true,
                drawing: false,
                cursor: Cursor::Text,
            },
            ActiveTool::Draw(_) | ActiveTool::Highlight(_) => InteractionMode {
                selection_enabled: false,
                hit_testing: false,
                drawing: true,
                cursor: Cursor::Crosshair,
            },
            ActiveTool::Measure(_) | ActiveTool::MeasureArea(_) | ActiveTool::Ocr(_) => {
                InteractionMode {
                    selection_enabled: false,
                    hit_testing: false,
                    drawing: false,
                    cursor: Cursor::Crosshair,
                }
            }
            ActiveTool::Image(_) => InteractionMode {
                selection_enabled: false,
                hit_testing: false,
                drawing: false,
                cursor: Cursor::Copy,
            },
            ActiveTool::Eraser(_) => InteractionMode {
                selection_enabled: false,
                hit_testing: true,
                drawing: false,
                cursor: Cursor::NotAllowed,
            },
            ActiveTool::Signature(_) => InteractionMode {
                selection_enabled: false,
                hit_testing: false,
                drawing: false,
                cursor: Cursor::Crosshair,
            },
        }
    }

    pub fn on_pointer_down(
        &mut self,
        scene: &mut PageScene,
        input: &PointerInput,
        env: &ToolEnv<'_>,
        prompt: &mut dyn CalibrationPrompt,
    ) -> Vec<ToolEffect> {
        match self {
            ActiveTool::Select(tool) => tool.on_pointer_down(scene, input),
            ActiveTool::Text(tool) => tool.on_pointer_down(scene, input, &env.config.text),
            ActiveTool::Draw(tool) => tool.on_pointer_down(input),
            ActiveTool::Highlight(tool) => tool.on_pointer_down(input),
            ActiveTool::Measure(tool) => tool.on_pointer_down(scene, input, env, prompt),
            ActiveTool::MeasureArea(tool) => tool.on_pointer_down(scene, input, env),
            ActiveTool::Ocr(tool) => tool.on_pointer_down(input, env),
            ActiveTool::Image(tool) => tool.on_pointer_down(input),
            ActiveTool::Eraser(tool) => tool.on_pointer_down(scene, input),
            ActiveTool::Signature(tool) => tool.on_pointer_down(input),
        }
    }

    pub fn on_pointer_move(&mut self, input: &PointerInput) -> Vec<ToolEffect> {
        match self {
            ActiveTool::Draw(tool) => tool.on_pointer_move(input),
            ActiveTool::Highlight(tool) => tool.on_pointer_move(input),
            ActiveTool::Measure(tool) => tool.on_pointer_move(input),
            ActiveTool::MeasureArea(tool) => tool.on_pointer_move(input),
            ActiveTool::Ocr(tool) => tool.on_pointer_move(input),
            _ => Vec::new(),
        }
    }

    pub fn on_pointer_up(
        &mut self,
        scene: &mut PageScene,
        input: &PointerInput,
        env: &ToolEnv<'_>,
    ) -> Vec<ToolEffect> {
        match self {
            ActiveTool::Draw(tool) => tool.on_pointer_up(scene, input, &env.config.draw),
            ActiveTool::Highlight(tool) => tool.on_pointer_up(scene, input, &env.config.highlight),
            ActiveTool::Ocr(tool) => tool.on_pointer_up(input, &env.config.ocr),
            _ => Vec::new(),
        }
    }

    pub fn on_key(&mut self, scene: &mut PageScene, key: EditorKey) -> Vec<ToolEffect> {
        match self {
            ActiveTool::Select(tool) => tool.on_key(scene, key),
            _ => Vec::new(),
        }
    }

    pub fn preview(&self, env: &ToolEnv<'_>) -> Option<ToolPreview> {
        match self {
            ActiveTool::Draw(tool) => tool.preview(&env.config.draw),
            ActiveTool::Highlight(tool) => tool.preview(&env.config.highlight),
            ActiveTool::Measure(tool) => tool.preview(env),
            ActiveTool::MeasureArea(tool) => tool.preview(env),
            ActiveTool::Ocr(tool) => tool.preview(&env.config.ocr),
            _ => None,
        }
    }

    /// Clear in-progress state when the tool is swapped out.
    pub fn deactivate(&mut self) {
        match self {
            ActiveTool::Draw(tool) => tool.reset(),
            ActiveTool::Highlight(tool) => tool.reset(),
            ActiveTool::Measure(tool) => tool.reset(),
            ActiveTool::MeasureArea(tool) => tool.reset(),
            ActiveTool::Ocr(tool) => tool.reset(),
            _ => {}
        }
    }
}
