//! The live editable scene for one page.

use crate::geometry::Point;
use crate::object::{ObjectId, SceneObject};

/// Ordered annotation objects for a single page, in scene-pixel space at
/// the current viewport size. Z-order is array order.
#[derive(Debug, Clone)]
pub struct PageScene {
    page_number: u32,
    width: f64,
    height: f64,
    objects: Vec<SceneObject>,
    next_id: ObjectId,
    active_object: Option<ObjectId>,
}

impl PageScene {
    pub fn new(page_number: u32, width: f64, height: f64) -> Self {
        Self {
            page_number,
            width,
            height,
            objects: Vec::new(),
            next_id: 1,
            active_object: None,
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Insert an object on top of the stack and make it the active object.
    pub fn add_object(&mut self, mut object: SceneObject) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        object.id = id;
        self.objects.push(object);
        self.active_object = Some(id);
        id
    }

    pub fn remove_object(&mut self, id: ObjectId) -> bool {
        let Some(position) = self.objects.iter().position(|object| object.id == id) else {
            return false;
        };

        self.objects.remove(position);
        if self.active_object == Some(id) {
            self.active_object = None;
        }
        true
    }

    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|object| object.id == id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|object| object.id == id)
    }

    pub fn active_object(&self) -> Option<ObjectId> {
        self.active_object
    }

    pub fn set_active_object(&mut self, id: Option<ObjectId>) {
        self.active_object = match id {
            Some(id) if self.object(id).is_some() => Some(id),
            _ => None,
        };
    }

    /// Topmost selectable object whose bounds contain the point.
    pub fn object_at(&self, point: Point) -> Option<ObjectId> {
        self.objects
            .iter()
            .rev()
            .find(|object| object.selectable && object.bounding_box().contains(point))
            .map(|object| object.id)
    }

    /// Replace the entire object list (deserialization); ids are reassigned
    /// and the selection is dropped.
    pub fn replace_objects(&mut self, objects: Vec<SceneObject>) {
        self.objects.clear();
        self.active_object = None;
        for mut object in objects {
            object.id = self.next_id;
            self.next_id += 1;
            self.objects.push(object);
        }
    }

    /// React to the page raster changing size (zoom, rotation, initial
    /// measurement): every object's position and scale factors are
    /// multiplied by the per-axis ratio. Returns true when objects were
    /// rescaled; a non-positive old or new dimension leaves objects alone.
    pub fn resize_viewport(&mut self, new_width: f64, new_height: f64) -> bool {
        if new_width <= 0.0 || new_height <= 0.0 {
            return false;
        }

        let old_width = self.width;
        let old_height = self.height;
        self.width = new_width;
        self.height = new_height;

        if old_width <= 0.0 || old_height <= 0.0 {
            return false;
        }

        if old_width == new_width && old_height == new_height {
            return false;
        }

        let ratio_x = new_width / old_width;
        let ratio_y = new_height / old_height;
        for object in &mut self.objects {
            object.left *= ratio_x;
            object.top *= ratio_y;
            object.scale_x *= ratio_x;
            object.scale_y *= ratio_y;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectKind;

    fn rect_object(left: f64, top: f64) -> SceneObject {
        SceneObject::new(
            ObjectKind::Rect {
                width: 10.0,
                height: 10.0,
                stroke: "#000000".to_string(),
                stroke_width: 1.0,
                fill: "transparent".to_string(),
            },
            left,
            top,
        )
    }

    #[test]
    fn test_add_object_assigns_ids_and_selects() {
        let mut scene = PageScene::new(1, 100.0, 100.0);
        let first = scene.add_object(rect_object(0.0, 0.0));
        let second = scene.add_object(rect_object(20.0, 20.0));
        assert_ne!(first, second);
        assert_eq!(scene.active_object(), Some(second));
        assert_eq!(scene.object_count(), 2);
    }

    #[test]
    fn test_remove_object_clears_selection() {
        let mut scene = PageScene::new(1, 100.0, 100.0);
        let id = scene.add_object(rect_object(0.0, 0.0));
        assert!(scene.remove_object(id));
        assert!(scene.active_object().is_none());
        assert!(scene.is_empty());
        assert!(!scene.remove_object(id));
    }

    #[test]
    fn test_object_at_returns_topmost() {
        let mut scene = PageScene::new(1, 100.0, 100.0);
        let below = scene.add_object(rect_object(0.0, 0.0));
        let above = scene.add_object(rect_object(5.0, 5.0));

        assert_eq!(scene.object_at(Point::new(7.0, 7.0)), Some(above));
        assert_eq!(scene.object_at(Point::new(1.0, 1.0)), Some(below));
        assert_eq!(scene.object_at(Point::new(90.0, 90.0)), None);
    }

    #[test]
    fn test_object_at_skips_unselectable() {
        let mut scene = PageScene::new(1, 100.0, 100.0);
        let mut object = rect_object(0.0, 0.0);
        object.selectable = false;
        scene.add_object(object);
        assert_eq!(scene.object_at(Point::new(5.0, 5.0)), None);
    }

    #[test]
    fn test_resize_viewport_scales_objects() {
        let mut scene = PageScene::new(1, 100.0, 200.0);
        scene.add_object(rect_object(10.0, 40.0));

        assert!(scene.resize_viewport(200.0, 400.0));
        let object = &scene.objects()[0];
        assert_eq!(object.left, 20.0);
        assert_eq!(object.top, 80.0);
        assert_eq!(object.scale_x, 2.0);
        assert_eq!(object.scale_y, 2.0);
        assert_eq!(scene.width(), 200.0);
    }

    #[test]
    fn test_resize_viewport_from_zero_is_noop_for_objects() {
        let mut scene = PageScene::new(1, 0.0, 0.0);
        scene.add_object(rect_object(10.0, 40.0));

        assert!(!scene.resize_viewport(200.0, 400.0));
        let object = &scene.objects()[0];
        assert_eq!(object.left, 10.0);
        assert_eq!(object.scale_x, 1.0);
        // Dimensions are still adopted for the next resize.
        assert_eq!(scene.width(), 200.0);
    }

    #[test]
    fn test_resize_viewport_rejects_invalid_target() {
        let mut scene = PageScene::new(1, 100.0, 100.0);
        scene.add_object(rect_object(10.0, 10.0));
        assert!(!scene.resize_viewport(0.0, 400.0));
        assert_eq!(scene.width(), 100.0);
    }

    #[test]
    fn test_replace_objects_reassigns_ids() {
        let mut scene = PageScene::new(1, 100.0, 100.0);
        let original = scene.add_object(rect_object(0.0, 0.0));

        scene.replace_objects(vec![rect_object(1.0, 1.0), rect_object(2.0, 2.0)]);
        assert_eq!(scene.object_count(), 2);
        assert!(scene.active_object().is_none());
        for object in scene.objects() {
            assert_ne!(object.id, 0);
            assert_ne!(object.id, original);
        }
    }
}
