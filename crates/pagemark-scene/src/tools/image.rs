//! Image placement tool: a click asks the host to pick a file; the editor
//! inserts the picked raster at the remembered point.

use crate::tools::{PointerInput, ToolEffect};

#[derive(Debug, Default)]
pub struct ImageTool;

impl ImageTool {
    pub fn on_pointer_down(&mut self, input: &PointerInput) -> Vec<ToolEffect> {
        vec![ToolEffect::PickImage { point: input.point }]
    }
}
