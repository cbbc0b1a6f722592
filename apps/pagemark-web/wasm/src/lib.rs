//! WASM bindings for the pagemark PDF annotation editor.
//!
//! This crate provides a stateful, session-based API: document bytes,
//! page scenes, undo/redo history, rotations and form values all live in
//! Rust, while JavaScript handles rendering, DOM events and file I/O.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { EditorSession } from './pkg/pagemark_wasm.js';
//!
//! await init();
//!
//! const session = new EditorSession("contract.pdf", bytes);
//! session.registerPage(1, 612, 792);
//! session.setActiveTool("draw");
//! session.pointerDown(1, 100, 100, false);
//! session.pointerMove(1, 150, 140, false);
//! session.pointerUp(1, 200, 180, false);
//! const restored = session.undo(); // serialized scene to re-render
//! const pdf = session.export(true, false, "standard", overlays);
//! ```

pub mod editor_session;

use wasm_bindgen::prelude::*;

pub use editor_session::EditorSession;

/// Initialize the WASM module. Called automatically by wasm-bindgen.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version.
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Page count of a PDF without creating a session.
#[wasm_bindgen]
pub fn get_page_count(bytes: &[u8]) -> Result<u32, JsValue> {
    pagemark_pdf::document_page_count(bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_version() {
        assert!(!get_version().is_empty());
    }
}
