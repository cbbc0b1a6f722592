//! Stateful editor session for a single open document.
//!
//! Holds the document bytes, the scene editor (scenes, tools, history),
//! rotation metadata and form values. Structural page operations run the
//! full propagation order: mutate bytes, remap scenes, remap rotations,
//! re-read the page count, then re-track the current page.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use pagemark_pdf::{
    delete_pages, derived_export_name, document_page_count, export_document, extract_page_range,
    merge_documents, reorder_pages, rotate_page, split_document, CancelToken, ExportError,
    ExportOptions, ExportQuality, FieldValue, FormState, OverlaySource, PageRotations,
};
use pagemark_scene::{
    CalibrationPrompt, Editor, EditorAction, EditorKey, ImageData, Point, ToolKind,
};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

/// Overlay raster handed over from the JavaScript renderer.
#[derive(Debug, Deserialize)]
struct OverlayPayload {
    page: u32,
    png: String,
}

/// Overlays for export, already filtered to pages with annotations.
struct SessionOverlays {
    overlays: BTreeMap<u32, Vec<u8>>,
}

impl OverlaySource for SessionOverlays {
    fn overlay_png(&self, page_number: u32, _multiplier: f64) -> Result<Option<Vec<u8>>, String> {
        Ok(self.overlays.get(&page_number).cloned())
    }
}

/// Calibration prompt backed by an optional JavaScript callback that
/// returns the real-world distance (number or numeric string).
struct JsCalibrationPrompt {
    callback: Rc<RefCell<Option<js_sys::Function>>>,
}

impl CalibrationPrompt for JsCalibrationPrompt {
    fn request_distance(&mut self, unit_label: &str) -> Option<f64> {
        let callback = self.callback.borrow();
        let callback = callback.as_ref()?;
        let result = callback
            .call1(&JsValue::NULL, &JsValue::from_str(unit_label))
            .ok()?;

        let value = result.as_f64().or_else(|| {
            result
                .as_string()
                .and_then(|text| text.trim().replace(',', ".").parse().ok())
        })?;

        (value.is_finite() && value > 0.0).then_some(value)
    }
}

#[wasm_bindgen]
pub struct EditorSession {
    document_bytes: Vec<u8>,
    document_name: String,
    page_count: u32,
    current_page: u32,
    editor: Editor,
    rotations: PageRotations,
    form: FormState,
    export_cancel: CancelToken,
    progress_callback: Option<js_sys::Function>,
    calibration_callback: Rc<RefCell<Option<js_sys::Function>>>,
}

// Internal API, testable off-wasm.
impl EditorSession {
    fn create(name: &str, bytes: &[u8]) -> Result<EditorSession, String> {
        let page_count =
            document_page_count(bytes).map_err(|e| format!("parse error: {}", e))?;

        let calibration_callback = Rc::new(RefCell::new(None));
        let editor = Editor::with_prompt(Box::new(JsCalibrationPrompt {
            callback: Rc::clone(&calibration_callback),
        }));

        Ok(EditorSession {
            document_bytes: bytes.to_vec(),
            document_name: name.to_string(),
            page_count,
            current_page: 1,
            editor,
            rotations: PageRotations::new(),
            form: FormState::new(),
            export_cancel: CancelToken::new(),
            progress_callback: None,
            calibration_callback,
        })
    }

    /// Replace the open document; all per-document state resets.
    fn load_internal(&mut self, name: &str, bytes: &[u8]) -> Result<(), String> {
        let page_count =
            document_page_count(bytes).map_err(|e| format!("parse error: {}", e))?;

        self.document_bytes = bytes.to_vec();
        self.document_name = name.to_string();
        self.page_count = page_count;
        self.current_page = 1;
        self.editor.reset_session();
        self.rotations.clear_all();
        self.form.clear();
        Ok(())
    }

    fn set_current_page_internal(&mut self, page_number: u32) {
        self.current_page = page_number.clamp(1, self.page_count.max(1));
    }

    fn delete_pages_internal(&mut self, page_numbers: &[u32]) -> Result<bool, String> {
        let mut targets: Vec<u32> = page_numbers
            .iter()
            .copied()
            .filter(|page| *page >= 1 && *page <= self.page_count)
            .collect();
        targets.sort_unstable();
        targets.dedup();

        // A document keeps at least one page.
        if targets.is_empty() || targets.len() >= self.page_count as usize {
            return Ok(false);
        }

        let updated =
            delete_pages(&self.document_bytes, &targets).map_err(|e| e.to_string())?;

        let survivors: Vec<u32> = (1..=self.page_count)
            .filter(|page| !targets.contains(page))
            .collect();
        self.editor.remove_pages(&targets, self.page_count);
        self.rotations.remove_pages(&targets, self.page_count);

        self.document_bytes = updated;
        self.page_count = survivors.len() as u32;
        self.current_page = match survivors.iter().position(|p| *p == self.current_page) {
            Some(index) => index as u32 + 1,
            None => self.current_page.clamp(1, self.page_count),
        };
        Ok(true)
    }

    fn reorder_pages_internal(&mut self, new_order: &[u32]) -> Result<bool, String> {
        if new_order.len() != self.page_count as usize {
            return Ok(false);
        }

        let mut sorted = new_order.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let is_permutation = sorted.len() == new_order.len()
            && sorted
                .iter()
                .enumerate()
                .all(|(index, page)| *page == index as u32 + 1);
        if !is_permutation {
            return Ok(false);
        }

        let is_identity = new_order
            .iter()
            .enumerate()
            .all(|(index, page)| *page == index as u32 + 1);
        if is_identity {
            return Ok(false);
        }

        let updated =
            reorder_pages(&self.document_bytes, new_order).map_err(|e| e.to_string())?;

        self.editor.remap_pages(new_order);
        self.rotations.remap(new_order);
        self.document_bytes = updated;
        if let Some(index) = new_order.iter().position(|p| *p == self.current_page) {
            self.current_page = index as u32 + 1;
        }
        Ok(true)
    }

    fn rotate_page_internal(&mut self, page_number: u32, delta_degrees: i32) -> Result<i32, String> {
        if page_number < 1 || page_number > self.page_count {
            return Err(format!("page {} out of range", page_number));
        }

        let next = pagemark_pdf::rotation::normalize_rotation(
            self.rotations.get(page_number) + delta_degrees,
        );
        let updated =
            rotate_page(&self.document_bytes, page_number, next).map_err(|e| e.to_string())?;

        self.document_bytes = updated;
        self.rotations.set(page_number, next);
        Ok(next)
    }

    fn merge_with_internal(&mut self, other_bytes: &[u8]) -> Result<u32, String> {
        let merged = merge_documents(vec![self.document_bytes.clone(), other_bytes.to_vec()])
            .map_err(|e| e.to_string())?;

        self.page_count = document_page_count(&merged).map_err(|e| e.to_string())?;
        self.document_bytes = merged;
        Ok(self.page_count)
    }

    fn export_internal(
        &mut self,
        options: ExportOptions,
        mut overlays: BTreeMap<u32, Vec<u8>>,
    ) -> Result<Vec<u8>, ExportError> {
        // Pages with an empty (or unmounted) scene never embed an overlay.
        overlays.retain(|page, _| {
            self.editor
                .registry()
                .scene(*page)
                .map(|scene| !scene.is_empty())
                .unwrap_or(false)
        });
        let overlays = SessionOverlays { overlays };

        self.export_cancel = CancelToken::new();
        let cancel = self.export_cancel.clone();
        let callback = self.progress_callback.clone();

        export_document(
            &self.document_bytes,
            &overlays,
            &self.rotations,
            &self.form,
            &options,
            &cancel,
            move |progress| {
                if let Some(callback) = &callback {
                    let step = match progress.step {
                        pagemark_pdf::ExportStep::Preparing => "preparing",
                        pagemark_pdf::ExportStep::ProcessingPage => "processing-page",
                        pagemark_pdf::ExportStep::Embedding => "embedding",
                        pagemark_pdf::ExportStep::Finalizing => "finalizing",
                        pagemark_pdf::ExportStep::Complete => "complete",
                    };
                    let _ = callback.call3(
                        &JsValue::NULL,
                        &JsValue::from_f64(progress.percentage as f64),
                        &JsValue::from_f64(progress.current_page.unwrap_or(0) as f64),
                        &JsValue::from_str(step),
                    );
                }
            },
        )
    }
}

fn parse_tool_kind(name: &str) -> Option<ToolKind> {
    match name {
        "select" => Some(ToolKind::Select),
        "text" => Some(ToolKind::Text),
        "draw" => Some(ToolKind::Draw),
        "highlight" => Some(ToolKind::Highlight),
        "measure" => Some(ToolKind::Measure),
        "measure-area" => Some(ToolKind::MeasureArea),
        "ocr" => Some(ToolKind::Ocr),
        "image" => Some(ToolKind::Image),
        "eraser" => Some(ToolKind::Eraser),
        "signature" => Some(ToolKind::Signature),
        _ => None,
    }
}

fn actions_to_js(actions: Vec<EditorAction>) -> JsValue {
    serde_wasm_bindgen::to_value(&actions).unwrap_or(JsValue::NULL)
}

fn bytes_to_js(bytes: &[u8]) -> js_sys::Uint8Array {
    let array = js_sys::Uint8Array::new_with_length(bytes.len() as u32);
    array.copy_from(bytes);
    array
}

#[wasm_bindgen]
impl EditorSession {
    /// Create a session for the given PDF.
    #[wasm_bindgen(constructor)]
    pub fn new(name: &str, bytes: &[u8]) -> Result<EditorSession, JsValue> {
        Self::create(name, bytes).map_err(|e| JsValue::from_str(&e))
    }

    /// Replace the open document (new document session).
    #[wasm_bindgen(js_name = loadDocument)]
    pub fn load_document(&mut self, name: &str, bytes: &[u8]) -> Result<(), JsValue> {
        self.load_internal(name, bytes).map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(getter, js_name = documentName)]
    pub fn document_name(&self) -> String {
        self.document_name.clone()
    }

    #[wasm_bindgen(getter, js_name = pageCount)]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    #[wasm_bindgen(getter, js_name = currentPage)]
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    #[wasm_bindgen(js_name = setCurrentPage)]
    pub fn set_current_page(&mut self, page_number: u32) {
        self.set_current_page_internal(page_number);
    }

    /// Document bytes for the PDF.js renderer.
    #[wasm_bindgen(js_name = getDocumentBytes)]
    pub fn get_document_bytes(&self) -> js_sys::Uint8Array {
        bytes_to_js(&self.document_bytes)
    }

    /// Rotation currently applied to a page (degrees).
    #[wasm_bindgen(js_name = pageRotation)]
    pub fn page_rotation(&self, page_number: u32) -> i32 {
        self.rotations.get(page_number)
    }

    // ============ Scene lifecycle ============

    /// A page's renderer mounted with the given overlay size in device
    /// pixels.
    #[wasm_bindgen(js_name = registerPage)]
    pub fn register_page(&mut self, page_number: u32, width: f64, height: f64) {
        self.editor.mount_scene(page_number, width, height);
    }

    #[wasm_bindgen(js_name = unregisterPage)]
    pub fn unregister_page(&mut self, page_number: u32) {
        self.editor.unmount_scene(page_number);
    }

    /// The page raster changed size (zoom or rotation).
    #[wasm_bindgen(js_name = resizePage)]
    pub fn resize_page(&mut self, page_number: u32, width: f64, height: f64) {
        self.editor.resize_page_viewport(page_number, width, height);
    }

    /// Current zoom factor, used by measurement calibration.
    #[wasm_bindgen(js_name = setZoomScale)]
    pub fn set_zoom_scale(&mut self, scale: f64) {
        self.editor.set_current_scale(scale);
    }

    /// Serialized scene state for re-rendering, if the page has one.
    #[wasm_bindgen(js_name = getSceneState)]
    pub fn get_scene_state(&self, page_number: u32) -> Option<String> {
        self.editor
            .registry()
            .snapshot(page_number)
            .map(str::to_string)
    }

    // ============ Tools ============

    #[wasm_bindgen(js_name = setActiveTool)]
    pub fn set_active_tool(&mut self, tool: &str) -> Result<(), JsValue> {
        let kind = parse_tool_kind(tool)
            .ok_or_else(|| JsValue::from_str(&format!("unknown tool: {}", tool)))?;
        self.editor.set_active_tool(kind);
        Ok(())
    }

    /// Renderer hints for the active tool (cursor, selection flags).
    #[wasm_bindgen(js_name = interactionMode)]
    pub fn interaction_mode(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.editor.interaction_mode()).unwrap_or(JsValue::NULL)
    }

    /// Returns host actions to perform (file picks, recognition requests).
    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, page_number: u32, x: f64, y: f64, shift: bool) -> JsValue {
        actions_to_js(self.editor.pointer_down(page_number, Point::new(x, y), shift))
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, page_number: u32, x: f64, y: f64, shift: bool) {
        self.editor.pointer_move(page_number, Point::new(x, y), shift);
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self, page_number: u32, x: f64, y: f64, shift: bool) -> JsValue {
        actions_to_js(self.editor.pointer_up(page_number, Point::new(x, y), shift))
    }

    /// Forward Delete/Backspace to the active tool.
    #[wasm_bindgen(js_name = keyPress)]
    pub fn key_press(&mut self, page_number: u32, key: &str) -> JsValue {
        let key = match key {
            "Delete" => EditorKey::Delete,
            "Backspace" => EditorKey::Backspace,
            _ => return JsValue::NULL,
        };
        actions_to_js(self.editor.key_press(page_number, key))
    }

    /// Live preview geometry for the in-progress tool interaction.
    #[wasm_bindgen(js_name = toolPreview)]
    pub fn tool_preview(&self, page_number: u32) -> JsValue {
        match self.editor.tool_preview(page_number) {
            Some(preview) => serde_wasm_bindgen::to_value(&preview).unwrap_or(JsValue::NULL),
            None => JsValue::NULL,
        }
    }

    /// Insert a picked image (data URL + natural size) at a point.
    #[wasm_bindgen(js_name = insertImage)]
    pub fn insert_image(
        &mut self,
        page_number: u32,
        x: f64,
        y: f64,
        source: &str,
        width: f64,
        height: f64,
    ) -> bool {
        self.editor.insert_image(
            page_number,
            Point::new(x, y),
            ImageData {
                source: source.to_string(),
                width,
                height,
            },
        )
    }

    /// Apply a drawn signature through the signature workflow.
    #[wasm_bindgen(js_name = applySignature)]
    pub fn apply_signature(&mut self, source: &str, width: f64, height: f64) -> bool {
        self.editor.apply_signature(ImageData {
            source: source.to_string(),
            width,
            height,
        })
    }

    #[wasm_bindgen(js_name = closeSignaturePad)]
    pub fn close_signature_pad(&mut self) {
        self.editor.registry_mut().close_signature_pad();
    }

    /// Deliver a recognition result for a previously requested region.
    #[wasm_bindgen(js_name = completeRecognition)]
    pub fn complete_recognition(
        &mut self,
        page_number: u32,
        x: f64,
        y: f64,
        text: Option<String>,
        error: Option<String>,
    ) {
        let outcome = match (text, error) {
            (_, Some(error)) => Err(error),
            (Some(text), None) => Ok(text),
            (None, None) => Err("recognition returned nothing".to_string()),
        };
        self.editor
            .complete_recognition(page_number, Point::new(x, y), outcome);
    }

    /// Ask the user for a calibration distance; callback receives the unit
    /// label and returns a number.
    #[wasm_bindgen(js_name = setCalibrationCallback)]
    pub fn set_calibration_callback(&mut self, callback: js_sys::Function) {
        *self.calibration_callback.borrow_mut() = Some(callback);
    }

    // ============ History ============

    #[wasm_bindgen(js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.editor.can_undo()
    }

    #[wasm_bindgen(js_name = canRedo)]
    pub fn can_redo(&self) -> bool {
        self.editor.can_redo()
    }

    /// Undo on the active page; returns the restored scene state for
    /// re-rendering, or null when there is nothing to undo.
    pub fn undo(&mut self) -> Option<String> {
        if !self.editor.undo() {
            return None;
        }
        self.editor.apply_pending_restore();
        let page = self.editor.registry().restore_request()?.page_number;
        self.editor.registry().snapshot(page).map(str::to_string)
    }

    /// Redo on the active page; returns the restored scene state.
    pub fn redo(&mut self) -> Option<String> {
        if !self.editor.redo() {
            return None;
        }
        self.editor.apply_pending_restore();
        let page = self.editor.registry().restore_request()?.page_number;
        self.editor.registry().snapshot(page).map(str::to_string)
    }

    // ============ Forms ============

    #[wasm_bindgen(js_name = setTextField)]
    pub fn set_text_field(&mut self, page_number: u32, field_name: &str, value: &str) {
        self.form
            .set_field(page_number, field_name, FieldValue::Text(value.to_string()));
    }

    #[wasm_bindgen(js_name = setCheckboxField)]
    pub fn set_checkbox_field(&mut self, page_number: u32, field_name: &str, checked: bool) {
        self.form
            .set_field(page_number, field_name, FieldValue::Checked(checked));
    }

    // ============ Page structure ============

    /// Delete pages; returns false for guarded no-ops (empty selection or
    /// deleting every page).
    #[wasm_bindgen(js_name = deletePages)]
    pub fn delete_pages(&mut self, page_numbers: Vec<u32>) -> Result<bool, JsValue> {
        self.delete_pages_internal(&page_numbers)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Reorder pages; `new_order[i]` is the old page number that becomes
    /// page `i + 1`. Identity or malformed orders return false.
    #[wasm_bindgen(js_name = reorderPages)]
    pub fn reorder_pages(&mut self, new_order: Vec<u32>) -> Result<bool, JsValue> {
        self.reorder_pages_internal(&new_order)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Rotate a page by a delta; returns the resulting absolute rotation.
    #[wasm_bindgen(js_name = rotatePage)]
    pub fn rotate_page(&mut self, page_number: u32, delta_degrees: i32) -> Result<i32, JsValue> {
        self.rotate_page_internal(page_number, delta_degrees)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Append another document's pages; returns the new page count.
    #[wasm_bindgen(js_name = mergeWith)]
    pub fn merge_with(&mut self, other_bytes: &[u8]) -> Result<u32, JsValue> {
        self.merge_with_internal(other_bytes)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Extract a page range into a standalone document.
    #[wasm_bindgen(js_name = extractRange)]
    pub fn extract_range(&self, start: u32, end: u32) -> Result<js_sys::Uint8Array, JsValue> {
        let bytes = extract_page_range(&self.document_bytes, start, end)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(bytes_to_js(&bytes))
    }

    /// Extract a page selection into a standalone document.
    #[wasm_bindgen(js_name = splitPages)]
    pub fn split_pages(&self, page_numbers: Vec<u32>) -> Result<js_sys::Uint8Array, JsValue> {
        let bytes = split_document(&self.document_bytes, page_numbers)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(bytes_to_js(&bytes))
    }

    /// Derived file name for a split/extract download.
    #[wasm_bindgen(js_name = exportName)]
    pub fn export_name(&self, suffix: &str) -> String {
        derived_export_name(&self.document_name, suffix)
    }

    // ============ Export ============

    /// Progress callback: (percentage, currentPage, step).
    #[wasm_bindgen(js_name = setProgressCallback)]
    pub fn set_progress_callback(&mut self, callback: js_sys::Function) {
        self.progress_callback = Some(callback);
    }

    /// Cancel an in-flight export; the export resolves with the distinct
    /// "export-cancelled" error.
    #[wasm_bindgen(js_name = cancelExport)]
    pub fn cancel_export(&self) {
        self.export_cancel.cancel();
    }

    /// Export the document. `overlays` is an array of `{page, png}` with
    /// base64 PNG rasters of each annotated page's scene.
    pub fn export(
        &mut self,
        include_annotations: bool,
        flatten_forms: bool,
        quality: &str,
        overlays: JsValue,
    ) -> Result<js_sys::Uint8Array, JsValue> {
        let payloads: Vec<OverlayPayload> = if overlays.is_null() || overlays.is_undefined() {
            Vec::new()
        } else {
            serde_wasm_bindgen::from_value(overlays)
                .map_err(|e| JsValue::from_str(&format!("invalid overlays: {}", e)))?
        };

        let mut decoded = BTreeMap::new();
        for payload in payloads {
            let bytes = BASE64
                .decode(payload.png.as_bytes())
                .map_err(|e| JsValue::from_str(&format!("invalid overlay PNG: {}", e)))?;
            decoded.insert(payload.page, bytes);
        }

        let options = ExportOptions {
            include_annotations,
            flatten_forms,
            quality: if quality == "high" {
                ExportQuality::High
            } else {
                ExportQuality::Standard
            },
        };

        match self.export_internal(options, decoded) {
            Ok(bytes) => Ok(bytes_to_js(&bytes)),
            Err(error) if error.is_cancelled() => Err(JsValue::from_str("export-cancelled")),
            Err(error) => Err(JsValue::from_str(&format!("export error: {}", error))),
        }
    }
}
