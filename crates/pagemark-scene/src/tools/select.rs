//! Default selection tool.

use crate::scene::PageScene;
use crate::tools::{EditorKey, PointerInput, ToolEffect};

#[derive(Debug, Default)]
pub struct SelectTool;

impl SelectTool {
    /// Clicking an object selects it; clicking empty space clears the
    /// selection.
    pub fn on_pointer_down(
        &mut self,
        scene: &mut PageScene,
        input: &PointerInput,
    ) -> Vec<ToolEffect> {
        scene.set_active_object(input.target);
        Vec::new()
    }

    /// Delete/Backspace removes the selected object.
    pub fn on_key(&mut self, scene: &mut PageScene, key: EditorKey) -> Vec<ToolEffect> {
        match key {
            EditorKey::Delete | EditorKey::Backspace => {
                let Some(active) = scene.active_object() else {
                    return Vec::new();
                };

                if scene.remove_object(active) {
                    vec![ToolEffect::SceneChanged]
                } else {
                    Vec::new()
                }
            }
        }
    }
}
