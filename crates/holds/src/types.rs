use std::ops::Range;

use image::GrayImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Binary raster aligned to an image; every pixel is 0 or 255.
pub type Mask = GrayImage;

pub const MASK_ON: u8 = 255;
pub const MASK_OFF: u8 = 0;

/// Admissible column range between the two vertical guide lines of a
/// route. The lines may be given in either order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Band {
    pub left: i64,
    pub right: i64,
}

impl Band {
    pub fn new(left: i64, right: i64) -> Self {
        Self { left, right }
    }

    /// Half-open `[min, max)` columns, clamped to an image of `width`.
    pub fn columns(&self, width: u32) -> Range<u32> {
        let clamp = |v: i64| v.clamp(0, width as i64) as u32;
        let lo = clamp(self.left.min(self.right));
        let hi = clamp(self.left.max(self.right));
        lo..hi
    }
}

/// Axis-aligned box with exclusive upper corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl BoundingBox {
    /// Min/max over a set of corner points.
    pub fn from_corners(corners: &[[i32; 2]]) -> Self {
        let mut bbox = Self {
            x_min: i32::MAX,
            y_min: i32::MAX,
            x_max: i32::MIN,
            y_max: i32::MIN,
        };
        for &[x, y] in corners {
            bbox.x_min = bbox.x_min.min(x);
            bbox.y_min = bbox.y_min.min(y);
            bbox.x_max = bbox.x_max.max(x);
            bbox.y_max = bbox.y_max.max(y);
        }
        bbox
    }

    pub fn width(&self) -> i32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> i32 {
        self.y_max - self.y_min
    }

    /// Intersection with an image of the given size, as `(x, y, w, h)`.
    pub fn clamped(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x0 = self.x_min.clamp(0, width as i32) as u32;
        let y0 = self.y_min.clamp(0, height as i32) as u32;
        let x1 = self.x_max.clamp(0, width as i32) as u32;
        let y1 = self.y_max.clamp(0, height as i32) as u32;
        (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}

/// A detected hold in the full photograph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldRegion {
    /// Index of the contour among all outer contours of the mask
    pub id: usize,
    pub contour: Vec<[i32; 2]>,
    pub area_px: f64,
    /// Minimal enclosing circle center, truncated
    pub center: [i32; 2],
    /// Corners of the minimal-area rotated rectangle
    pub bbox_corners: [[i32; 2]; 4],
    /// Derived from `bbox_corners`, not from the contour itself
    pub bbox: BoundingBox,
    pub zoom_factor: f64,
    pub mean_color_hsv: [f64; 3],
}

impl HoldRegion {
    /// Identifier used for the exported crop.
    pub fn export_id(&self, extension: &str) -> String {
        format!(
            "contour_{}_x{}_y{}.{}",
            self.id, self.center[0], self.center[1], extension
        )
    }

    pub fn metadata(&self) -> HoldMetadata {
        HoldMetadata {
            center: self.center,
            bounding_box: [
                [self.bbox.x_min, self.bbox.y_min],
                [self.bbox.x_max, self.bbox.y_max],
            ],
            zoom_factor: self.zoom_factor,
            color_hsv: self.mean_color_hsv,
            area_px: self.area_px,
            bbox_corners: self.bbox_corners,
        }
    }
}

/// Per-hold information that travels with an exported crop. Full-image
/// coordinates are only available through this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HoldMetadata {
    pub center: [i32; 2],
    pub bounding_box: [[i32; 2]; 2],
    pub zoom_factor: f64,
    pub color_hsv: [f64; 3],
    #[serde(default)]
    pub area_px: f64,
    #[serde(default)]
    pub bbox_corners: [[i32; 2]; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HoldFeatures {
    pub area_cm2: f64,
    pub perimeter_cm: f64,
    pub circularity: f64,
    pub convexity: f64,
    pub aspect_ratio: f64,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HoldType {
    Handhold,
    Foothold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HoldClassification {
    pub hold_type: HoldType,
    pub grade: u8,
}

/// Metadata of a hold after the grading pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GradedHold {
    #[serde(flatten)]
    pub metadata: HoldMetadata,
    pub hold_type: HoldType,
    pub hold_grade: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<HoldFeatures>,
}

/// The projection of a graded hold consumed by route assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteHold {
    pub id: String,
    pub center: [i32; 2],
    pub hold_type: HoldType,
    pub grade: u8,
}

impl RouteHold {
    pub fn from_graded(id: impl Into<String>, hold: &GradedHold) -> Self {
        Self {
            id: id.into(),
            center: hold.metadata.center,
            hold_type: hold.hold_type,
            grade: hold.hold_grade,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteScore {
    pub hold_component: f64,
    pub move_component: f64,
    pub total: f64,
    pub grade: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RouteOutcome {
    /// No holds to grade
    NotApplicable,
    Graded(RouteScore),
}

impl RouteOutcome {
    pub fn score(&self) -> Option<&RouteScore> {
        match self {
            Self::Graded(score) => Some(score),
            Self::NotApplicable => None,
        }
    }

    /// Label reported to clients, `N/A` when no holds were available.
    pub fn grade_label(&self) -> &str {
        match self {
            Self::Graded(score) => &score.grade,
            Self::NotApplicable => "N/A",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_orders_and_clamps() {
        assert_eq!(Band::new(80, 20).columns(100), 20..80);
        assert_eq!(Band::new(-5, 500).columns(100), 0..100);
        assert_eq!(Band::new(30, 30).columns(100), 30..30);
    }

    #[test]
    fn test_bbox_from_corners() {
        let bbox = BoundingBox::from_corners(&[[4, 9], [12, 3], [15, 10], [6, 17]]);
        assert_eq!(bbox, BoundingBox { x_min: 4, y_min: 3, x_max: 15, y_max: 17 });
        assert_eq!(bbox.width(), 11);
        assert_eq!(bbox.clamped(10, 10), (4, 3, 6, 7));
    }

    #[test]
    fn test_graded_hold_wire_format_is_flat() {
        let hold = GradedHold {
            metadata: HoldMetadata {
                center: [10, 20],
                bounding_box: [[0, 0], [20, 40]],
                zoom_factor: 0.1,
                color_hsv: [1.0, 2.0, 3.0],
                area_px: 400.0,
                bbox_corners: [[0, 0], [20, 0], [20, 40], [0, 40]],
            },
            hold_type: HoldType::Foothold,
            hold_grade: 4,
            features: None,
        };
        let json = serde_json::to_value(&hold).expect("serializes");
        assert_eq!(json["hold_type"], "foothold");
        assert_eq!(json["hold_grade"], 4);
        assert_eq!(json["center"][1], 20);
        assert!(json.get("features").is_none());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(RouteOutcome::NotApplicable.grade_label(), "N/A");
        let json = serde_json::to_value(RouteOutcome::NotApplicable).expect("serializes");
        assert_eq!(json["status"], "not_applicable");
    }
}
