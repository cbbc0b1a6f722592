//! Scene snapshot serialization.
//!
//! Snapshots are the currency of the history store and the restore
//! protocol: a versioned JSON document holding the object list. The empty
//! scene has a canonical sentinel value so "no prior state" can be told
//! apart from "explicitly emptied".

use crate::object::SceneObject;
use crate::scene::PageScene;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SCENE_FORMAT_VERSION: &str = "1.0";

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("failed to serialize scene: {0}")]
    Serialize(String),

    #[error("invalid scene snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("unsupported scene format version: {0}")]
    UnsupportedVersion(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct SceneSnapshot {
    version: String,
    objects: Vec<SceneObject>,
}

/// The canonical serialized form of a scene with no objects.
pub fn empty_scene_state() -> String {
    format!(r#"{{"version":"{}","objects":[]}}"#, SCENE_FORMAT_VERSION)
}

/// Serialize a scene's object list into a snapshot string.
pub fn serialize_scene(scene: &PageScene) -> Result<String, SceneError> {
    let snapshot = SceneSnapshot {
        version: SCENE_FORMAT_VERSION.to_string(),
        objects: scene.objects().to_vec(),
    };

    serde_json::to_string(&snapshot).map_err(|e| SceneError::Serialize(e.to_string()))
}

/// Replace a scene's contents with the objects from a snapshot.
/// The scene is left untouched when the snapshot cannot be decoded.
pub fn deserialize_scene(scene: &mut PageScene, snapshot: &str) -> Result<(), SceneError> {
    let parsed: SceneSnapshot =
        serde_json::from_str(snapshot).map_err(|e| SceneError::InvalidSnapshot(e.to_string()))?;

    if parsed.version != SCENE_FORMAT_VERSION {
        return Err(SceneError::UnsupportedVersion(parsed.version));
    }

    scene.replace_objects(parsed.objects);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::object::{MeasureTag, ObjectKind, Origin, SceneObject};
    use pretty_assertions::assert_eq;

    fn mixed_scene() -> PageScene {
        let mut scene = PageScene::new(1, 600.0, 800.0);
        scene.add_object(SceneObject::new(
            ObjectKind::Text {
                text: "Approved".to_string(),
                font_size: 16.0,
                color: "#111111".to_string(),
                bold: true,
                italic: false,
            },
            40.0,
            60.0,
        ));
        scene.add_object(
            SceneObject::new(
                ObjectKind::FreehandPath {
                    points: vec![
                        Point::new(0.0, 0.0),
                        Point::new(4.5, 2.25),
                        Point::new(9.0, 1.0),
                    ],
                    color: "#111111".to_string(),
                    stroke_width: 2.0,
                },
                100.0,
                120.0,
            )
            .with_scale(1.5, 1.5),
        );
        scene.add_object(
            SceneObject::new(
                ObjectKind::Image {
                    source: "data:image/png;base64,iVBORw0KGgo=".to_string(),
                    width: 80.0,
                    height: 40.0,
                },
                300.0,
                400.0,
            )
            .with_origin(Origin::Center),
        );
        scene.add_object(
            SceneObject::new(
                ObjectKind::Group {
                    children: vec![SceneObject::new(
                        ObjectKind::Line {
                            from: Point::new(0.0, 0.0),
                            to: Point::new(30.0, 40.0),
                            color: "#ff4d4f".to_string(),
                            stroke_width: 2.0,
                        },
                        0.0,
                        0.0,
                    )],
                    measurement: Some(MeasureTag::Distance {
                        base_dx: 30.0,
                        base_dy: 40.0,
                    }),
                },
                10.0,
                20.0,
            )
            .with_measurement_locks(),
        );
        scene
    }

    #[test]
    fn test_empty_scene_sentinel_matches_serializer() {
        let scene = PageScene::new(1, 100.0, 100.0);
        assert_eq!(serialize_scene(&scene).unwrap(), empty_scene_state());
    }

    #[test]
    fn test_round_trip_preserves_objects() {
        let scene = mixed_scene();
        let snapshot = serialize_scene(&scene).unwrap();

        let mut restored = PageScene::new(1, 600.0, 800.0);
        deserialize_scene(&mut restored, &snapshot).unwrap();

        assert_eq!(restored.object_count(), scene.object_count());
        for (original, roundtripped) in scene.objects().iter().zip(restored.objects()) {
            assert!((original.left - roundtripped.left).abs() < 1e-6);
            assert!((original.top - roundtripped.top).abs() < 1e-6);
            assert!((original.scale_x - roundtripped.scale_x).abs() < 1e-6);
            assert!((original.scale_y - roundtripped.scale_y).abs() < 1e-6);
            assert_eq!(original.kind, roundtripped.kind);
            assert_eq!(original.origin, roundtripped.origin);
        }
    }

    #[test]
    fn test_round_trip_is_stable() {
        let scene = mixed_scene();
        let snapshot = serialize_scene(&scene).unwrap();

        let mut restored = PageScene::new(1, 600.0, 800.0);
        deserialize_scene(&mut restored, &snapshot).unwrap();
        let second = serialize_scene(&restored).unwrap();

        assert_eq!(snapshot, second);
    }

    #[test]
    fn test_deserialize_rejects_garbage_and_leaves_scene_alone() {
        let mut scene = mixed_scene();
        let before = scene.object_count();

        assert!(deserialize_scene(&mut scene, "not json").is_err());
        assert_eq!(scene.object_count(), before);
    }

    #[test]
    fn test_deserialize_rejects_unknown_version() {
        let mut scene = PageScene::new(1, 100.0, 100.0);
        let result = deserialize_scene(&mut scene, r#"{"version":"9.9","objects":[]}"#);
        assert!(matches!(result, Err(SceneError::UnsupportedVersion(_))));
    }

    #[test]
    fn test_deserialize_empty_sentinel_clears_scene() {
        let mut scene = mixed_scene();
        deserialize_scene(&mut scene, &empty_scene_state()).unwrap();
        assert!(scene.is_empty());
    }
}
