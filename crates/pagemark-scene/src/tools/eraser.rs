//! Eraser: single-click object removal, no selection step.

use crate::scene::PageScene;
use crate::tools::{PointerInput, ToolEffect};

#[derive(Debug, Default)]
pub struct EraserTool;

impl EraserTool {
    pub fn on_pointer_down(
        &mut self,
        scene: &mut PageScene,
        input: &PointerInput,
    ) -> Vec<ToolEffect> {
        let Some(target) = input.target else {
            return Vec::new();
        };

        if scene.remove_object(target) {
            vec![ToolEffect::SceneChanged]
        } else {
            Vec::new()
        }
    }
}
