//! Text insertion tool.

use crate::object::{ObjectKind, SceneObject};
use crate::scene::PageScene;
use crate::tools::{PointerInput, TextToolConfig, ToolEffect};

const DEFAULT_TEXT: &str = "Text";

#[derive(Debug, Default)]
pub struct TextTool;

impl TextTool {
    /// Clicking empty space commits a new text object at the pointer and
    /// selects it for immediate editing; clicking an existing object does
    /// nothing (the renderer enters edit mode on the selection instead).
    pub fn on_pointer_down(
        &mut self,
        scene: &mut PageScene,
        input: &PointerInput,
        config: &TextToolConfig,
    ) -> Vec<ToolEffect> {
        if input.target.is_some() {
            return Vec::new();
        }

        scene.add_object(SceneObject::new(
            ObjectKind::Text {
                text: DEFAULT_TEXT.to_string(),
                font_size: config.font_size,
                color: config.color.clone(),
                bold: config.bold,
                italic: config.italic,
            },
            input.point.x,
            input.point.y,
        ));

        vec![ToolEffect::SceneChanged]
    }
}
