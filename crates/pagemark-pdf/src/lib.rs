//! Client-side PDF document operations for the page editor.
//!
//! Everything here mutates document bytes with lopdf: structural page
//! edits (delete/reorder/rotate/merge/split), AcroForm value application
//! and flattening, overlay image embedding, and the cancellable export
//! pipeline that ties them together.

pub mod embed;
pub mod error;
pub mod export;
pub mod forms;
pub mod merge;
pub mod naming;
pub mod ops;
pub mod rotation;
pub mod split;

pub use embed::{embed_overlay, overlay_matrix};
pub use error::PdfEditError;
pub use export::{
    export_document, CancelToken, ExportError, ExportOptions, ExportProgress, ExportQuality,
    ExportStep, NoOverlays, OverlaySource,
};
pub use forms::{apply_form_values, flatten_form, FieldValue, FormState};
pub use merge::merge_documents;
pub use naming::derived_export_name;
pub use ops::{delete_pages, extract_page_range, reorder_pages, rotate_page};
pub use rotation::PageRotations;
pub use split::split_document;

/// Parse PDF bytes and return the page count.
pub fn document_page_count(bytes: &[u8]) -> Result<u32, PdfEditError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| PdfEditError::Parse(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}
