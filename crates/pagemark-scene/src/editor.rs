//! The editor drives tool state machines against the scene registry.
//!
//! Pointer and key events come in per page; the active tool mutates the
//! scene and reports effects, which the editor turns into history pushes,
//! signature-pad state, calibration updates, or actions the host must
//! service (file picking, text recognition). The editor also owns the
//! restore protocol: applying an undo/redo snapshot sets a restoring flag
//! (cleared by a drop guard on every exit path) so the deserialize-driven
//! mutations are not pushed back into history.

use crate::geometry::{BoundingBox, Point};
use crate::object::{MeasureTag, ObjectId, ObjectKind, Origin, SceneObject};
use crate::registry::{SceneRegistry, SignatureState};
use crate::scene::PageScene;
use crate::serialize::{deserialize_scene, empty_scene_state, serialize_scene};
use crate::tools::{ActiveTool, Cursor, InteractionMode, PointerInput, ToolEffect, ToolEnv};
use crate::units::{format_area_label, format_distance_label, MeasureCalibration};
use serde::Serialize;
use std::cell::Cell;
use std::collections::{HashMap, HashSet};

pub use crate::tools::measure::{CalibrationPrompt, NoCalibrationPrompt};
pub use crate::tools::{EditorKey, ToolConfig, ToolKind, ToolPreview};

/// Work the host application must perform on the editor's behalf.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum EditorAction {
    /// Open a file picker and call [`Editor::insert_image`] with the result.
    PickImage { page_number: u32, point: Point },
    /// Rasterize the region from the page image (not the overlay), run
    /// recognition, and call [`Editor::complete_recognition`].
    RecognizeRegion {
        page_number: u32,
        region: BoundingBox,
    },
}

/// A decoded raster the host hands back for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub source: String,
    pub width: f64,
    pub height: f64,
}

struct RestoringGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> RestoringGuard<'a> {
    fn engage(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for RestoringGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

pub struct Editor {
    registry: SceneRegistry,
    tool: ActiveTool,
    config: ToolConfig,
    calibration: MeasureCalibration,
    current_scale: f64,
    prompt: Box<dyn CalibrationPrompt>,
    restoring: Cell<bool>,
    last_restore_applied: HashMap<u32, u64>,
    recognitions_in_flight: HashSet<u32>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self::with_prompt(Box::new(NoCalibrationPrompt))
    }

    pub fn with_prompt(prompt: Box<dyn CalibrationPrompt>) -> Self {
        Self {
            registry: SceneRegistry::new(),
            tool: ActiveTool::new(ToolKind::Select),
            config: ToolConfig::default(),
            calibration: MeasureCalibration::default(),
            current_scale: 1.0,
            prompt,
            restoring: Cell::new(false),
            last_restore_applied: HashMap::new(),
            recognitions_in_flight: HashSet::new(),
        }
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SceneRegistry {
        &mut self.registry
    }

    pub fn tool_config(&self) -> &ToolConfig {
        &self.config
    }

    pub fn tool_config_mut(&mut self) -> &mut ToolConfig {
        &mut self.config
    }

    pub fn calibration(&self) -> &MeasureCalibration {
        &self.calibration
    }

    pub fn set_calibration_prompt(&mut self, prompt: Box<dyn CalibrationPrompt>) {
        self.prompt = prompt;
    }

    /// Current zoom scale, used by the measurement unit conversion.
    pub fn set_current_scale(&mut self, scale: f64) {
        self.current_scale = scale;
    }

    pub fn active_tool(&self) -> ToolKind {
        self.tool.kind()
    }

    pub fn set_active_tool(&mut self, kind: ToolKind) {
        if self.tool.kind() == kind {
            return;
        }

        self.tool.deactivate();
        self.tool = ActiveTool::new(kind);
    }

    pub fn interaction_mode(&self) -> InteractionMode {
        let mut mode = self.tool.interaction();
        if self.tool.kind() == ToolKind::Ocr {
            let busy = self
                .registry
                .active_page()
                .map(|page| self.recognitions_in_flight.contains(&page))
                .unwrap_or(false);
            if busy {
                mode.cursor = Cursor::Progress;
            }
        }
        mode
    }

    pub fn recognition_in_flight(&self, page_number: u32) -> bool {
        self.recognitions_in_flight.contains(&page_number)
    }

    /// Create and register the scene for a page coming into view, seeding
    /// it (and its history baseline) from the cached snapshot if one
    /// exists.
    pub fn mount_scene(&mut self, page_number: u32, width: f64, height: f64) {
        let mut scene = PageScene::new(page_number, width, height);
        let initial = self
            .registry
            .snapshot(page_number)
            .map(str::to_string)
            .unwrap_or_else(empty_scene_state);

        if initial != empty_scene_state() {
            let _guard = RestoringGuard::engage(&self.restoring);
            if let Err(error) = deserialize_scene(&mut scene, &initial) {
                tracing::error!(page_number, %error, "failed to seed scene from cached snapshot");
            }
        }

        self.registry.register_scene(scene);
        self.registry.initialize_history(page_number, initial);
    }

    /// Drop the scene for a page leaving the viewport. Its latest snapshot
    /// stays cached for the next mount.
    pub fn unmount_scene(&mut self, page_number: u32) {
        self.registry.unregister_scene(page_number);
    }

    pub fn pointer_down(&mut self, page_number: u32, point: Point, shift: bool) -> Vec<EditorAction> {
        let mut actions = Vec::new();
        if self.registry.scene(page_number).is_none() {
            return actions;
        }

        self.registry.set_active_page(Some(page_number));
        self.registry.set_last_pointer(page_number, point);

        let target = if self.tool.interaction().hit_testing {
            self.registry
                .scene(page_number)
                .and_then(|scene| scene.object_at(point))
        } else {
            None
        };
        let input = PointerInput {
            point,
            target,
            shift,
        };

        let effects = {
            let env = ToolEnv {
                config: &self.config,
                calibration: &self.calibration,
                current_scale: self.current_scale,
                recognition_busy: self.recognitions_in_flight.contains(&page_number),
            };
            let Some(scene) = self.registry.scene_mut(page_number) else {
                return actions;
            };
            self.tool
                .on_pointer_down(scene, &input, &env, self.prompt.as_mut())
        };

        self.apply_effects(page_number, effects, &mut actions);
        self.sync_selection(page_number);
        actions
    }

    pub fn pointer_move(&mut self, page_number: u32, point: Point, shift: bool) {
        if self.registry.scene(page_number).is_none() {
            return;
        }

        let input = PointerInput {
            point,
            target: None,
            shift,
        };
        let _ = self.tool.on_pointer_move(&input);
    }

    pub fn pointer_up(&mut self, page_number: u32, point: Point, shift: bool) -> Vec<EditorAction> {
        let mut actions = Vec::new();
        let input = PointerInput {
            point,
            target: None,
            shift,
        };

        let effects = {
            let env = ToolEnv {
                config: &self.config,
                calibration: &self.calibration,
                current_scale: self.current_scale,
                recognition_busy: self.recognitions_in_flight.contains(&page_number),
            };
            let Some(scene) = self.registry.scene_mut(page_number) else {
                return actions;
            };
            self.tool.on_pointer_up(scene, &input, &env)
        };

        self.apply_effects(page_number, effects, &mut actions);
        self.sync_selection(page_number);
        actions
    }

    pub fn key_press(&mut self, page_number: u32, key: EditorKey) -> Vec<EditorAction> {
        let mut actions = Vec::new();
        let effects = {
            let Some(scene) = self.registry.scene_mut(page_number) else {
                return actions;
            };
            self.tool.on_key(scene, key)
        };

        self.apply_effects(page_number, effects, &mut actions);
        self.sync_selection(page_number);
        actions
    }

    pub fn tool_preview(&self, page_number: u32) -> Option<ToolPreview> {
        let env = ToolEnv {
            config: &self.config,
            calibration: &self.calibration,
            current_scale: self.current_scale,
            recognition_busy: self.recognitions_in_flight.contains(&page_number),
        };
        self.tool.preview(&env)
    }

    /// Insert a picked image scaled to fit within 80% x 80% of the
    /// viewport, centered on the click point.
    pub fn insert_image(&mut self, page_number: u32, point: Point, image: ImageData) -> bool {
        if image.width <= 0.0 || image.height <= 0.0 {
            return false;
        }

        let Some(scene) = self.registry.scene_mut(page_number) else {
            return false;
        };

        let max_width = scene.width() * 0.8;
        let max_height = scene.height() * 0.8;
        let ratio = (max_width / image.width)
            .min(max_height / image.height)
            .min(1.0);

        scene.add_object(
            SceneObject::new(
                ObjectKind::Image {
                    source: image.source,
                    width: image.width,
                    height: image.height,
                },
                point.x,
                point.y,
            )
            .with_origin(Origin::Center)
            .with_scale(ratio, ratio),
        );

        self.registry.set_active_page(Some(page_number));
        self.sync_scene_state(page_number);
        self.sync_selection(page_number);
        true
    }

    /// Place a drawn signature at the point stored by the signature
    /// workflow, sized to at most 40% x 20% of the viewport.
    pub fn apply_signature(&mut self, image: ImageData) -> bool {
        let SignatureState::Open { page_number, point } = self.registry.signature_state() else {
            return false;
        };

        if image.width <= 0.0 || image.height <= 0.0 {
            self.registry.close_signature_pad();
            return false;
        }

        let Some(scene) = self.registry.scene_mut(page_number) else {
            self.registry.close_signature_pad();
            return false;
        };

        let target =
            point.unwrap_or_else(|| Point::new(scene.width() / 2.0, scene.height() / 2.0));
        let max_width = scene.width() * 0.4;
        let max_height = scene.height() * 0.2;
        let ratio = (max_width / image.width)
            .min(max_height / image.height)
            .min(1.0);

        scene.add_object(
            SceneObject::new(
                ObjectKind::Image {
                    source: image.source,
                    width: image.width,
                    height: image.height,
                },
                target.x,
                target.y,
            )
            .with_origin(Origin::Center)
            .with_scale(ratio, ratio),
        );

        self.registry.set_active_page(Some(page_number));
        self.registry.close_signature_pad();
        self.sync_scene_state(page_number);
        self.sync_selection(page_number);
        true
    }

    /// Deliver a recognition result for a region requested earlier.
    /// Failures are logged and leave the scene unchanged.
    pub fn complete_recognition(
        &mut self,
        page_number: u32,
        origin: Point,
        outcome: Result<String, String>,
    ) {
        self.recognitions_in_flight.remove(&page_number);

        let text = match outcome {
            Ok(text) => text,
            Err(error) => {
                tracing::error!(page_number, %error, "text recognition failed");
                return;
            }
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }

        let Some(scene) = self.registry.scene_mut(page_number) else {
            return;
        };

        let config = &self.config.ocr;
        scene.add_object(SceneObject::new(
            ObjectKind::Text {
                text: trimmed.to_string(),
                font_size: config.output_font_size,
                color: config.output_color.clone(),
                bold: false,
                italic: false,
            },
            origin.x,
            origin.y,
        ));

        self.sync_scene_state(page_number);
        self.sync_selection(page_number);
    }

    /// Edit one object (properties panel, move/resize commit). Measurement
    /// labels are recomputed from the tagged baseline geometry and the
    /// object's absolute scale factors before the state is recorded.
    pub fn modify_object<F>(&mut self, page_number: u32, object_id: ObjectId, mutate: F) -> bool
    where
        F: FnOnce(&mut SceneObject),
    {
        let Some(scene) = self.registry.scene_mut(page_number) else {
            return false;
        };
        let Some(object) = scene.object_mut(object_id) else {
            return false;
        };

        mutate(object);
        update_measurement_label(object, &self.calibration, self.current_scale);
        self.sync_scene_state(page_number);
        true
    }

    /// Refresh a measurement label during a live scale gesture, without
    /// recording history.
    pub fn refresh_measurement_label(&mut self, page_number: u32, object_id: ObjectId) -> bool {
        let Some(scene) = self.registry.scene_mut(page_number) else {
            return false;
        };
        let Some(object) = scene.object_mut(object_id) else {
            return false;
        };

        update_measurement_label(object, &self.calibration, self.current_scale);
        true
    }

    /// The page raster changed size (zoom, rotation, re-measure); rescale
    /// the scene and record the result.
    pub fn resize_page_viewport(&mut self, page_number: u32, width: f64, height: f64) {
        let Some(scene) = self.registry.scene_mut(page_number) else {
            return;
        };

        if scene.resize_viewport(width, height) {
            self.sync_scene_state(page_number);
        }
    }

    pub fn undo(&mut self) -> bool {
        self.registry.undo().is_some()
    }

    pub fn redo(&mut self) -> bool {
        self.registry.redo().is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.registry.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.registry.can_redo()
    }

    /// Apply the registry's latest restore request to its scene. Requests
    /// older than the last one applied for that page are ignored, so a
    /// stale restore queued behind a faster one cannot double-apply.
    /// Returns true when a restore was applied.
    pub fn apply_pending_restore(&mut self) -> bool {
        let Some(request) = self.registry.restore_request().cloned() else {
            return false;
        };

        let last_seen = self
            .last_restore_applied
            .get(&request.page_number)
            .copied()
            .unwrap_or(0);
        if request.request_id <= last_seen {
            return false;
        }
        self.last_restore_applied
            .insert(request.page_number, request.request_id);

        let guard = RestoringGuard::engage(&self.restoring);
        let Some(scene) = self.registry.scene_mut(request.page_number) else {
            return false;
        };

        match deserialize_scene(scene, &request.snapshot) {
            Ok(()) => {
                scene.set_active_object(None);
                drop(guard);
                self.sync_selection(request.page_number);
                true
            }
            Err(error) => {
                // Scene keeps its last-good contents.
                tracing::error!(
                    page_number = request.page_number,
                    %error,
                    "failed to restore scene history state"
                );
                false
            }
        }
    }

    pub fn remap_pages(&mut self, new_order: &[u32]) {
        self.registry.remap_pages(new_order);
        self.recognitions_in_flight.clear();
    }

    pub fn remove_pages(&mut self, removed_page_numbers: &[u32], total_pages: u32) {
        self.registry.remove_pages(removed_page_numbers, total_pages);
        self.recognitions_in_flight.clear();
    }

    /// Tear down all per-document state when a new document replaces the
    /// current one. Calibration resets with the session.
    pub fn reset_session(&mut self) {
        self.registry.reset_session();
        self.calibration = MeasureCalibration::default();
        self.current_scale = 1.0;
        self.recognitions_in_flight.clear();
        self.last_restore_applied.clear();
        self.tool.deactivate();
    }

    fn apply_effects(
        &mut self,
        page_number: u32,
        effects: Vec<ToolEffect>,
        actions: &mut Vec<EditorAction>,
    ) {
        for effect in effects {
            match effect {
                ToolEffect::SceneChanged => self.sync_scene_state(page_number),
                ToolEffect::Calibrated {
                    pixels_per_unit,
                    calibration_scale,
                } => self.calibration.apply(pixels_per_unit, calibration_scale),
                ToolEffect::OpenSignaturePad { point } => {
                    self.registry.open_signature_pad(page_number, Some(point));
                }
                ToolEffect::PickImage { point } => actions.push(EditorAction::PickImage {
                    page_number,
                    point,
                }),
                ToolEffect::RecognizeRegion { region } => {
                    self.recognitions_in_flight.insert(page_number);
                    actions.push(EditorAction::RecognizeRegion {
                        page_number,
                        region,
                    });
                }
            }
        }
    }

    fn sync_scene_state(&mut self, page_number: u32) {
        if self.restoring.get() {
            return;
        }

        let Some(scene) = self.registry.scene(page_number) else {
            return;
        };
        match serialize_scene(scene) {
            Ok(snapshot) => self.registry.push_history_state(page_number, snapshot),
            Err(error) => {
                tracing::error!(page_number, %error, "failed to serialize scene state");
            }
        }
    }

    fn sync_selection(&mut self, page_number: u32) {
        let active = self
            .registry
            .scene(page_number)
            .and_then(|scene| scene.active_object());

        match active {
            Some(object_id) => self.registry.set_selection(Some((page_number, object_id))),
            None => {
                if self.registry.selection().map(|(page, _)| page) == Some(page_number) {
                    self.registry.set_selection(None);
                }
            }
        }
    }
}

fn update_measurement_label(
    object: &mut SceneObject,
    calibration: &MeasureCalibration,
    current_scale: f64,
) {
    let Some(tag) = object.measurement() else {
        return;
    };

    let effective = calibration.effective_pixels_per_unit(current_scale);
    let scale_x = object.scale_x.abs();
    let scale_y = object.scale_y.abs();

    let label = match tag {
        MeasureTag::Distance { base_dx, base_dy } => {
            let scaled_dx = base_dx * scale_x;
            let scaled_dy = base_dy * scale_y;
            let pixel_distance = (scaled_dx * scaled_dx + scaled_dy * scaled_dy).sqrt();
            format_distance_label(pixel_distance, effective, &calibration.unit_label)
        }
        MeasureTag::AreaRectangle { base_area_px } | MeasureTag::AreaPolygon { base_area_px } => {
            format_area_label(
                base_area_px * scale_x * scale_y,
                effective,
                &calibration.unit_label,
            )
        }
    };

    object.set_group_label(&label);
}
