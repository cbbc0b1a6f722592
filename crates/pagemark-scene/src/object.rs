//! The annotation object model.
//!
//! Every drawable element on a page is a [`SceneObject`]: a closed set of
//! kinds plus the placement fields shared by all of them. Measurement
//! groups carry a [`MeasureTag`] with the geometry captured at creation
//! time, so labels can be recomputed from absolute scale factors instead of
//! accumulating error across incremental resizes.

use crate::geometry::{BoundingBox, Point};
use serde::{Deserialize, Serialize};

pub type ObjectId = u64;

/// Anchor for the `left`/`top` placement fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    #[default]
    TopLeft,
    Center,
}

/// Baseline geometry recorded when a measurement group is committed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MeasureTag {
    Distance { base_dx: f64, base_dy: f64 },
    AreaRectangle { base_area_px: f64 },
    AreaPolygon { base_area_px: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ObjectKind {
    Text {
        text: String,
        font_size: f64,
        color: String,
        bold: bool,
        italic: bool,
    },
    /// Freehand stroke; points are relative to the object's placement.
    FreehandPath {
        points: Vec<Point>,
        color: String,
        stroke_width: f64,
    },
    Line {
        from: Point,
        to: Point,
        color: String,
        stroke_width: f64,
    },
    Rect {
        width: f64,
        height: f64,
        stroke: String,
        stroke_width: f64,
        fill: String,
    },
    Polygon {
        points: Vec<Point>,
        stroke: String,
        stroke_width: f64,
        fill: String,
    },
    /// Raster image addressed by its source (typically a data URL).
    Image {
        source: String,
        width: f64,
        height: f64,
    },
    /// Children are placed relative to the group's own origin.
    Group {
        children: Vec<SceneObject>,
        measurement: Option<MeasureTag>,
    },
}

fn default_scale() -> f64 {
    1.0
}

fn default_opacity() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    /// Session-local identity; never serialized, reassigned on restore.
    #[serde(skip)]
    pub id: ObjectId,
    #[serde(flatten)]
    pub kind: ObjectKind,
    pub left: f64,
    pub top: f64,
    #[serde(default = "default_scale")]
    pub scale_x: f64,
    #[serde(default = "default_scale")]
    pub scale_y: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub origin: Origin,
    #[serde(default = "default_true")]
    pub selectable: bool,
    #[serde(default)]
    pub lock_rotation: bool,
    #[serde(default)]
    pub lock_skew: bool,
}

impl SceneObject {
    pub fn new(kind: ObjectKind, left: f64, top: f64) -> Self {
        Self {
            id: 0,
            kind,
            left,
            top,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            opacity: 1.0,
            origin: Origin::TopLeft,
            selectable: true,
            lock_rotation: false,
            lock_skew: false,
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_scale(mut self, scale_x: f64, scale_y: f64) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// Locks applied to committed measurement groups.
    pub fn with_measurement_locks(mut self) -> Self {
        self.lock_rotation = true;
        self.lock_skew = true;
        self
    }

    pub fn measurement(&self) -> Option<MeasureTag> {
        match &self.kind {
            ObjectKind::Group { measurement, .. } => *measurement,
            _ => None,
        }
    }

    /// Unscaled size of the object's own geometry.
    pub fn natural_size(&self) -> (f64, f64) {
        match &self.kind {
            ObjectKind::Text {
                text, font_size, ..
            } => {
                let longest_line = text.lines().map(str::len).max().unwrap_or(0).max(1);
                let line_count = text.lines().count().max(1);
                (
                    longest_line as f64 * font_size * 0.6,
                    line_count as f64 * font_size * 1.2,
                )
            }
            ObjectKind::FreehandPath { points, .. } | ObjectKind::Polygon { points, .. } => {
                let bounds = BoundingBox::from_points(points);
                (bounds.left + bounds.width, bounds.top + bounds.height)
            }
            ObjectKind::Line { from, to, .. } => ((to.x - from.x).abs(), (to.y - from.y).abs()),
            ObjectKind::Rect { width, height, .. } => (*width, *height),
            ObjectKind::Image { width, height, .. } => (*width, *height),
            ObjectKind::Group { children, .. } => {
                let mut max_x: f64 = 0.0;
                let mut max_y: f64 = 0.0;
                for child in children {
                    let bounds = child.bounding_box();
                    max_x = max_x.max(bounds.left + bounds.width);
                    max_y = max_y.max(bounds.top + bounds.height);
                }
                (max_x, max_y)
            }
        }
    }

    /// Placed, scaled extent in the parent coordinate space.
    pub fn bounding_box(&self) -> BoundingBox {
        let (natural_width, natural_height) = self.natural_size();
        let width = natural_width * self.scale_x.abs();
        let height = natural_height * self.scale_y.abs();
        match self.origin {
            Origin::TopLeft => BoundingBox {
                left: self.left,
                top: self.top,
                width,
                height,
            },
            Origin::Center => BoundingBox {
                left: self.left - width / 2.0,
                top: self.top - height / 2.0,
                width,
                height,
            },
        }
    }

    /// Rewrite the text of a measurement group's label child.
    /// Returns false when the object has no label to update.
    pub fn set_group_label(&mut self, label: &str) -> bool {
        let ObjectKind::Group { children, .. } = &mut self.kind else {
            return false;
        };

        for child in children {
            if let ObjectKind::Text { text, .. } = &mut child.kind {
                *text = label.to_string();
                return true;
            }
        }

        false
    }
}
