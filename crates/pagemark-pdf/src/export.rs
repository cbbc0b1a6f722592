//! The export pipeline: rotations, overlay compositing, form values,
//! optional flattening, final serialization.
//!
//! The whole operation is cooperatively cancellable: the token is checked
//! between phases, at the top of each page's loop, and immediately before
//! each irreversible write. Cancellation surfaces as its own error variant
//! so callers can treat it as a no-op instead of a failure. Output is
//! all-or-nothing; any non-cancel error discards the partial document.

use crate::embed::embed_overlay;
use crate::error::PdfEditError;
use crate::forms::{apply_form_values, flatten_form, FormState};
use crate::rotation::PageRotations;
use lopdf::{Document, Object, ObjectId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    /// The user canceled; callers suppress error UI for this one.
    #[error("export canceled")]
    Cancelled,

    #[error("failed to parse PDF: {0}")]
    Parse(String),

    #[error("overlay rasterization failed: {0}")]
    Overlay(String),

    #[error("PDF operation failed: {0}")]
    Operation(String),
}

impl ExportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExportError::Cancelled)
    }
}

impl From<PdfEditError> for ExportError {
    fn from(error: PdfEditError) -> Self {
        match error {
            PdfEditError::Parse(message) => ExportError::Parse(message),
            PdfEditError::InvalidPages(message) | PdfEditError::Operation(message) => {
                ExportError::Operation(message)
            }
        }
    }
}

/// Shared cancellation flag checked between pipeline steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn checkpoint(&self) -> Result<(), ExportError> {
        if self.is_cancelled() {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStep {
    Preparing,
    ProcessingPage,
    Embedding,
    Finalizing,
    Complete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    pub step: ExportStep,
    pub current_page: Option<u32>,
    pub total_pages: u32,
    pub percentage: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportQuality {
    Standard,
    High,
}

impl ExportQuality {
    pub fn multiplier(&self) -> f64 {
        match self {
            ExportQuality::Standard => 1.0,
            ExportQuality::High => 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub include_annotations: bool,
    pub flatten_forms: bool,
    pub quality: ExportQuality,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_annotations: true,
            flatten_forms: false,
            quality: ExportQuality::Standard,
        }
    }
}

/// Supplies the rasterized annotation overlay for a page, or `None` when
/// the page has nothing drawn on it (no embed happens for those).
pub trait OverlaySource {
    fn overlay_png(&self, page_number: u32, multiplier: f64) -> Result<Option<Vec<u8>>, String>;
}

/// An overlay source with nothing to contribute.
pub struct NoOverlays;

impl OverlaySource for NoOverlays {
    fn overlay_png(&self, _page_number: u32, _multiplier: f64) -> Result<Option<Vec<u8>>, String> {
        Ok(None)
    }
}

/// Progress percentages never go backwards, whatever the phase math says.
struct ProgressReporter<'a> {
    callback: &'a mut dyn FnMut(ExportProgress),
    last_percentage: u8,
}

impl<'a> ProgressReporter<'a> {
    fn new(callback: &'a mut dyn FnMut(ExportProgress)) -> Self {
        Self {
            callback,
            last_percentage: 0,
        }
    }

    fn report(&mut self, step: ExportStep, current_page: Option<u32>, total_pages: u32, pct: u8) {
        let percentage = pct.max(self.last_percentage);
        self.last_percentage = percentage;
        (self.callback)(ExportProgress {
            step,
            current_page,
            total_pages,
            percentage,
        });
    }
}

/// Export the document: apply pending page rotations, composite overlays,
/// apply form values, optionally flatten, and serialize.
pub fn export_document(
    bytes: &[u8],
    overlays: &dyn OverlaySource,
    rotations: &PageRotations,
    form: &FormState,
    options: &ExportOptions,
    cancel: &CancelToken,
    mut on_progress: impl FnMut(ExportProgress),
) -> Result<Vec<u8>, ExportError> {
    let mut progress = ProgressReporter::new(&mut on_progress);

    cancel.checkpoint()?;
    progress.report(ExportStep::Preparing, None, 0, 5);

    let mut doc =
        Document::load_mem(bytes).map_err(|e| ExportError::Parse(e.to_string()))?;
    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    let total_pages = pages.len() as u32;

    for (index, (page_number, page_id)) in pages.iter().enumerate() {
        cancel.checkpoint()?;
        let done = index as u32 + 1;
        progress.report(
            ExportStep::ProcessingPage,
            Some(*page_number),
            total_pages,
            (5 + done * 65 / total_pages.max(1)) as u8,
        );

        let rotation = rotations.get(*page_number);
        if rotation != 0 {
            apply_page_rotation(&mut doc, *page_id, rotation)?;
        }

        if options.include_annotations {
            let overlay = overlays
                .overlay_png(*page_number, options.quality.multiplier())
                .map_err(ExportError::Overlay)?;

            if let Some(png_bytes) = overlay {
                progress.report(
                    ExportStep::Embedding,
                    Some(*page_number),
                    total_pages,
                    (10 + done * 70 / total_pages.max(1)) as u8,
                );
                cancel.checkpoint()?;
                embed_overlay(&mut doc, *page_id, &png_bytes, rotation)?;
            }
        }
    }

    cancel.checkpoint()?;
    progress.report(ExportStep::Finalizing, None, total_pages, 85);

    apply_form_values(&mut doc, form)?;
    if options.flatten_forms {
        flatten_form(&mut doc)?;
    }

    cancel.checkpoint()?;
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ExportError::Operation(e.to_string()))?;

    progress.report(ExportStep::Complete, None, total_pages, 100);
    tracing::debug!(total_pages, bytes = buffer.len(), "export complete");
    Ok(buffer)
}

fn apply_page_rotation(
    doc: &mut Document,
    page_id: ObjectId,
    rotation: i32,
) -> Result<(), ExportError> {
    let page_dict = doc
        .get_object_mut(page_id)
        .map_err(|e| ExportError::Operation(e.to_string()))?
        .as_dict_mut()
        .map_err(|e| ExportError::Operation(e.to_string()))?;
    page_dict.set("Rotate", Object::Integer(rotation as i64));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::test_support::tiny_png;
    use crate::forms::FieldValue;
    use crate::ops::test_support::create_test_pdf;
    use std::cell::RefCell;

    /// Overlay source that serves a PNG for chosen pages and counts calls.
    struct MapOverlays {
        pages: Vec<u32>,
        calls: RefCell<Vec<u32>>,
    }

    impl MapOverlays {
        fn new(pages: Vec<u32>) -> Self {
            Self {
                pages,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl OverlaySource for MapOverlays {
        fn overlay_png(&self, page_number: u32, _multiplier: f64) -> Result<Option<Vec<u8>>, String> {
            self.calls.borrow_mut().push(page_number);
            if self.pages.contains(&page_number) {
                Ok(Some(tiny_png(4, 4)))
            } else {
                Ok(None)
            }
        }
    }

    fn count_embedded_images(bytes: &[u8]) -> usize {
        let doc = Document::load_mem(bytes).unwrap();
        doc.objects
            .values()
            .filter(|object| match object {
                Object::Stream(stream) => {
                    matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image")
                        && matches!(stream.dict.get(b"ColorSpace"), Ok(Object::Name(cs)) if cs == b"DeviceRGB")
                }
                _ => false,
            })
            .count()
    }

    #[test]
    fn test_export_embeds_only_annotated_pages() {
        let pdf = create_test_pdf(3);
        let overlays = MapOverlays::new(vec![2]);

        let result = export_document(
            &pdf,
            &overlays,
            &PageRotations::new(),
            &FormState::new(),
            &ExportOptions::default(),
            &CancelToken::new(),
            |_| {},
        )
        .unwrap();

        // Every page was consulted, exactly one overlay was embedded.
        assert_eq!(*overlays.calls.borrow(), vec![1, 2, 3]);
        assert_eq!(count_embedded_images(&result), 1);
    }

    #[test]
    fn test_export_without_annotations_never_consults_overlays() {
        let pdf = create_test_pdf(2);
        let overlays = MapOverlays::new(vec![1, 2]);
        let options = ExportOptions {
            include_annotations: false,
            ..ExportOptions::default()
        };

        let result = export_document(
            &pdf,
            &overlays,
            &PageRotations::new(),
            &FormState::new(),
            &options,
            &CancelToken::new(),
            |_| {},
        )
        .unwrap();

        assert!(overlays.calls.borrow().is_empty());
        assert_eq!(count_embedded_images(&result), 0);
    }

    #[test]
    fn test_export_applies_rotation() {
        let pdf = create_test_pdf(1);
        let mut rotations = PageRotations::new();
        rotations.set(1, 90);

        let result = export_document(
            &pdf,
            &NoOverlays,
            &rotations,
            &FormState::new(),
            &ExportOptions::default(),
            &CancelToken::new(),
            |_| {},
        )
        .unwrap();

        let doc = Document::load_mem(&result).unwrap();
        let page_id = doc.get_pages()[&1];
        let page_dict = doc.get_object(page_id).unwrap().as_dict().unwrap();
        assert_eq!(page_dict.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
    }

    #[test]
    fn test_pre_cancelled_export_yields_cancelled() {
        let pdf = create_test_pdf(2);
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = export_document(
            &pdf,
            &NoOverlays,
            &PageRotations::new(),
            &FormState::new(),
            &ExportOptions::default(),
            &cancel,
            |_| {},
        );

        assert!(matches!(result, Err(ExportError::Cancelled)));
    }

    #[test]
    fn test_mid_loop_cancellation_stops_before_next_page() {
        let pdf = create_test_pdf(3);
        let overlays = MapOverlays::new(vec![]);
        let cancel = CancelToken::new();
        let cancel_handle = cancel.clone();

        let result = export_document(
            &pdf,
            &overlays,
            &PageRotations::new(),
            &FormState::new(),
            &ExportOptions::default(),
            &cancel,
            move |progress| {
                if progress.step == ExportStep::ProcessingPage && progress.current_page == Some(1) {
                    cancel_handle.cancel();
                }
            },
        );

        assert!(matches!(result, Err(ExportError::Cancelled)));
        // Page 1 was consulted; the loop stopped before page 2.
        assert_eq!(*overlays.calls.borrow(), vec![1]);
    }

    #[test]
    fn test_export_progress_is_monotonic_and_completes() {
        let pdf = create_test_pdf(4);
        let overlays = MapOverlays::new(vec![1, 2, 3, 4]);
        let mut percentages = Vec::new();

        export_document(
            &pdf,
            &overlays,
            &PageRotations::new(),
            &FormState::new(),
            &ExportOptions {
                quality: ExportQuality::High,
                ..ExportOptions::default()
            },
            &CancelToken::new(),
            |progress| percentages.push(progress.percentage),
        )
        .unwrap();

        assert!(percentages.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(*percentages.last().unwrap(), 100);
    }

    #[test]
    fn test_export_applies_form_values() {
        let pdf = crate::forms::test_support::create_form_pdf();
        let mut form = FormState::new();
        form.set_field(1, "applicant", FieldValue::Text("Ada".into()));

        let result = export_document(
            &pdf,
            &NoOverlays,
            &PageRotations::new(),
            &form,
            &ExportOptions::default(),
            &CancelToken::new(),
            |_| {},
        )
        .unwrap();

        let doc = Document::load_mem(&result).unwrap();
        let has_value = doc.objects.values().any(|object| {
            object
                .as_dict()
                .ok()
                .map(|dict| {
                    matches!(dict.get(b"V"), Ok(Object::String(bytes, _)) if bytes.as_slice() == b"Ada")
                })
                .unwrap_or(false)
        });
        assert!(has_value);
    }

    #[test]
    fn test_export_flattens_forms_when_asked() {
        let pdf = crate::forms::test_support::create_form_pdf();
        let mut form = FormState::new();
        form.set_field(1, "agree", FieldValue::Checked(true));

        let result = export_document(
            &pdf,
            &NoOverlays,
            &PageRotations::new(),
            &form,
            &ExportOptions {
                flatten_forms: true,
                ..ExportOptions::default()
            },
            &CancelToken::new(),
            |_| {},
        )
        .unwrap();

        let doc = Document::load_mem(&result).unwrap();
        let catalog_id = doc
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .unwrap();
        let catalog = doc.objects.get(&catalog_id).unwrap().as_dict().unwrap();
        assert!(catalog.get(b"AcroForm").is_err());
    }
}
