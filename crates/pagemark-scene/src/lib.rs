//! Editable annotation scenes for PDF pages.
//!
//! Each page of an open document gets one [`PageScene`]: an ordered list of
//! annotation objects in scene-pixel space. The [`SceneRegistry`] tracks
//! live scenes, per-page undo/redo history and restore requests, and the
//! [`Editor`] drives the per-tool state machines against whichever scene
//! the pointer is on. Rendering is deliberately absent: a renderer observes
//! the scene model and the tool previews, it never owns them.

pub mod editor;
pub mod geometry;
pub mod history;
pub mod object;
pub mod registry;
pub mod scene;
pub mod serialize;
pub mod tools;
pub mod units;

pub use editor::{CalibrationPrompt, Editor, EditorAction, EditorKey, ImageData, ToolConfig};
pub use geometry::{BoundingBox, Point};
pub use history::HistoryStore;
pub use object::{MeasureTag, ObjectId, ObjectKind, Origin, SceneObject};
pub use registry::{RestoreRequest, SceneRegistry, SignatureState};
pub use scene::PageScene;
pub use serialize::{deserialize_scene, empty_scene_state, serialize_scene, SceneError};
pub use tools::{Cursor, InteractionMode, ToolKind, ToolPreview};
pub use units::MeasureCalibration;
