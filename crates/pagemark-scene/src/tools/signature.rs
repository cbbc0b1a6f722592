//! Signature tool: a click opens the signature pad for the clicked point.

use crate::tools::{PointerInput, ToolEffect};

#[derive(Debug, Default)]
pub struct SignatureTool;

impl SignatureTool {
    pub fn on_pointer_down(&mut self, input: &PointerInput) -> Vec<ToolEffect> {
        vec![ToolEffect::OpenSignaturePad { point: input.point }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    #[test]
    fn test_click_opens_signature_pad() {
        let mut tool = SignatureTool;
        let effects = tool.on_pointer_down(&PointerInput {
            point: Point::new(5.0, 6.0),
            target: None,
            shift: false,
        });
        assert_eq!(
            effects,
            vec![ToolEffect::OpenSignaturePad {
                point: Point::new(5.0, 6.0)
            }]
        );
    }
}
