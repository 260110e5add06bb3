//! Tunable constants of the detection, grading and route-scoring passes.
//!
//! Every field has a default matching the calibrated values of the wall
//! setup (50 cm ≈ 272 px), so an empty TOML file is a valid configuration.

use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{HoldError, Result};

/// Centimetres per pixel from the wall calibration (50 cm ≈ 272 px).
pub const DEFAULT_CM_PER_PX: f64 = 50.0 / 272.0;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(default)]
pub struct HoldsConfig {
    pub color: ColorMatchConfig,
    pub normalization: NormalizationConfig,
    pub morphology: MorphologyConfig,
    pub area: AreaBounds,
    pub scale: PixelScale,
    pub classifier: ClassifierConfig,
    pub grader: GraderConfig,
    pub route: RouteConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ColorMatchConfig {
    /// Maximum Euclidean distance in 8-bit LAB space
    pub lab_tolerance: f64,
    pub hsv_tolerance: HsvTolerance,
}

impl Default for ColorMatchConfig {
    fn default() -> Self {
        Self {
            lab_tolerance: 30.0,
            hsv_tolerance: HsvTolerance::default(),
        }
    }
}

/// Per-channel tolerances; hue is measured on the `[0,180)` circle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct HsvTolerance {
    pub hue: i32,
    pub saturation: i32,
    pub value: i32,
}

impl Default for HsvTolerance {
    fn default() -> Self {
        Self {
            hue: 20,
            saturation: 60,
            value: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct NormalizationConfig {
    pub clip_limit: f32,
    /// Number of tiles along each axis
    pub tile_grid: u32,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            clip_limit: 3.0,
            tile_grid: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct MorphologyConfig {
    /// Side of the square structuring element, must be odd
    pub kernel_size: u8,
    pub dilate_iterations: u32,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            kernel_size: 7,
            dilate_iterations: 3,
        }
    }
}

/// Inclusive pixel-area bounds for a blob to count as a hold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct AreaBounds {
    pub min: f64,
    pub max: f64,
}

impl AreaBounds {
    pub fn contains(&self, area: f64) -> bool {
        area >= self.min && area <= self.max
    }
}

impl Default for AreaBounds {
    fn default() -> Self {
        Self {
            min: 10.0,
            max: 99_999.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct PixelScale {
    pub cm_per_px: f64,
}

impl PixelScale {
    pub fn to_cm(&self, px: f64) -> f64 {
        px * self.cm_per_px
    }

    pub fn to_cm2(&self, px2: f64) -> f64 {
        px2 * self.cm_per_px * self.cm_per_px
    }
}

impl Default for PixelScale {
    fn default() -> Self {
        Self {
            cm_per_px: DEFAULT_CM_PER_PX,
        }
    }
}

/// Rule thresholds for the handhold / foothold decision.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Holds smaller than this (cm²) lean towards footholds
    pub small_area_cm2: f64,
    pub small_area_score: i32,
    pub large_area_score: i32,
    pub circularity_above: f64,
    pub convexity_below: f64,
    pub aspect_ratio_min: f64,
    pub aspect_ratio_max: f64,
    /// Scores at or above this are footholds
    pub foothold_min_score: i32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            small_area_cm2: 15.0,
            small_area_score: 2,
            large_area_score: -1,
            circularity_above: 0.5,
            convexity_below: 0.7,
            aspect_ratio_min: 0.7,
            aspect_ratio_max: 1.3,
            foothold_min_score: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct GraderConfig {
    pub expected_area_min_cm2: f64,
    pub expected_area_max_cm2: f64,
    /// Scale applied to the normalized area before clamping; larger than
    /// the ceiling so small holds saturate.
    pub area_scale: f64,
    pub area_score_ceiling: f64,
    pub circularity_weight: f64,
    pub convexity_weight: f64,
    pub aspect_ratio_weight: f64,
    pub foothold_modifier: f64,
    pub handhold_modifier: f64,
    pub min_grade: u8,
    pub max_grade: u8,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            expected_area_min_cm2: 6.76,
            expected_area_max_cm2: 169.0,
            area_scale: 8.0,
            area_score_ceiling: 6.0,
            circularity_weight: 3.0,
            convexity_weight: 3.0,
            aspect_ratio_weight: 2.0,
            foothold_modifier: 1.5,
            handhold_modifier: 1.2,
            min_grade: 1,
            max_grade: 10,
        }
    }
}

/// A half-open `[lo, hi)` interval of route difficulty mapped to a label.
/// `hi = None` means unbounded.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GradeBucket {
    pub lo: f64,
    pub hi: Option<f64>,
    pub label: String,
}

impl GradeBucket {
    pub fn new(lo: f64, hi: Option<f64>, label: &str) -> Self {
        Self {
            lo,
            hi,
            label: label.to_string(),
        }
    }

    pub fn contains(&self, total: f64) -> bool {
        total >= self.lo && self.hi.map_or(true, |hi| total < hi)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct RouteConfig {
    pub default_wall_angle: f64,
    pub max_static_reach_cm: f64,
    pub max_dynamic_reach_cm: f64,
    pub static_reach_score: f64,
    pub dynamic_reach_score: f64,
    pub dynamic_bonus: f64,
    pub out_of_reach_bonus: f64,
    pub angle_weight: f64,
    pub handhold_pair_modifier: f64,
    pub foothold_pair_modifier: f64,
    pub mixed_pair_modifier: f64,
    /// Vertical distance (cm) that earns the full height score
    pub height_span_cm: f64,
    pub height_weight: f64,
    /// Wall angle (degrees) that earns the full wall score
    pub wall_span_deg: f64,
    pub wall_weight: f64,
    /// Maps the 1–10 hold average onto the hold sub-scale
    pub hold_component_scale: f64,
    /// Maps the average move difficulty onto the move sub-scale
    pub move_component_scale: f64,
    pub grade_table: Vec<GradeBucket>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            default_wall_angle: 20.0,
            max_static_reach_cm: 90.0,
            max_dynamic_reach_cm: 105.0,
            static_reach_score: 20.0,
            dynamic_reach_score: 30.0,
            dynamic_bonus: 5.0,
            out_of_reach_bonus: 10.0,
            angle_weight: 20.0,
            handhold_pair_modifier: 1.5,
            foothold_pair_modifier: 1.3,
            mixed_pair_modifier: 1.0,
            height_span_cm: 200.0,
            height_weight: 20.0,
            wall_span_deg: 45.0,
            wall_weight: 15.0,
            hold_component_scale: 2.5,
            move_component_scale: 0.6,
            grade_table: default_grade_table(),
        }
    }
}

pub fn default_grade_table() -> Vec<GradeBucket> {
    vec![
        GradeBucket::new(0.0, Some(10.0), "V0"),
        GradeBucket::new(10.0, Some(16.0), "V1"),
        GradeBucket::new(16.0, Some(22.0), "V2"),
        GradeBucket::new(22.0, Some(28.0), "V3"),
        GradeBucket::new(28.0, Some(34.0), "V4"),
        GradeBucket::new(34.0, Some(40.0), "V5"),
        GradeBucket::new(40.0, Some(50.0), "V6"),
        GradeBucket::new(50.0, Some(60.0), "V7"),
        GradeBucket::new(60.0, Some(75.0), "V8"),
        GradeBucket::new(75.0, None, "V9+"),
    ]
}

/// Encoding used for exported hold crops.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExportFormat {
    Jpeg { quality: u8 },
    Png,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "jpg",
            Self::Png => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self::Jpeg { quality: 90 }
    }
}

/// What a crop shows outside the hold silhouette.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CropBackground {
    /// Pixels outside the filled contour are pure black. Required for the
    /// crop to be re-analyzed by the hold grading pass.
    #[default]
    Isolated,
    /// Raw bounding-box pixels.
    Raw,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(default)]
pub struct ExportConfig {
    pub format: ExportFormat,
    pub background: CropBackground,
}

impl HoldsConfig {
    /// Get the JSON schema of the configuration
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(HoldsConfig)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: HoldsConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: HoldsConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = fs::read_to_string(path_ref)?;
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => Err(HoldError::InvalidConfig(format!(
                "unsupported config format {}, use .toml or .json",
                path_ref.display()
            ))),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| HoldError::InvalidConfig(e.to_string()))
    }

    /// Reject values that would make a stage undefined.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(HoldError::InvalidConfig(msg.to_string()));

        if self.color.lab_tolerance <= 0.0 {
            return invalid("color.lab_tolerance must be positive");
        }
        let tol = self.color.hsv_tolerance;
        if tol.hue <= 0 || tol.saturation <= 0 || tol.value <= 0 {
            return invalid("color.hsv_tolerance channels must be positive");
        }
        if self.normalization.tile_grid == 0 || self.normalization.clip_limit <= 0.0 {
            return invalid("normalization needs a positive clip_limit and tile_grid");
        }
        if self.morphology.kernel_size % 2 == 0 {
            return invalid("morphology.kernel_size must be odd");
        }
        if self.area.min < 0.0 || self.area.min > self.area.max {
            return invalid("area.min must be non-negative and not above area.max");
        }
        if !(self.scale.cm_per_px > 0.0) {
            return invalid("scale.cm_per_px must be positive");
        }
        if self.classifier.aspect_ratio_min > self.classifier.aspect_ratio_max {
            return invalid("classifier aspect ratio range is inverted");
        }
        let g = &self.grader;
        if g.expected_area_min_cm2 >= g.expected_area_max_cm2 {
            return invalid("grader expected area range is empty");
        }
        if g.min_grade == 0 || g.min_grade > g.max_grade {
            return invalid("grader grade range must be within 1..=max_grade");
        }
        let r = &self.route;
        if r.max_static_reach_cm <= 0.0 || r.max_static_reach_cm >= r.max_dynamic_reach_cm {
            return invalid("route reach tiers must satisfy 0 < static < dynamic");
        }
        if r.height_span_cm <= 0.0 || r.wall_span_deg <= 0.0 {
            return invalid("route spans must be positive");
        }
        if r.grade_table.is_empty() {
            return invalid("route.grade_table must not be empty");
        }
        for pair in r.grade_table.windows(2) {
            if pair[1].lo < pair[0].lo {
                return invalid("route.grade_table must be ordered by lower bound");
            }
        }
        if r.grade_table.iter().any(|b| b.hi.is_some_and(|hi| hi <= b.lo)) {
            return invalid("route.grade_table contains an empty bucket");
        }
        if let ExportFormat::Jpeg { quality } = self.export.format {
            if quality == 0 || quality > 100 {
                return invalid("export jpeg quality must be within 1..=100");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = HoldsConfig::default();
        config.validate().expect("defaults should validate");
        assert_eq!(config.route.grade_table.len(), 10);
        assert_eq!(config.morphology.kernel_size, 7);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = HoldsConfig::from_toml(
            r#"
            [color]
            lab_tolerance = 25.0

            [route]
            default_wall_angle = 35.0
            "#,
        )
        .expect("Should parse partial toml");

        assert_eq!(config.color.lab_tolerance, 25.0);
        assert_eq!(config.color.hsv_tolerance, HsvTolerance::default());
        assert_eq!(config.route.default_wall_angle, 35.0);
        assert_eq!(config.route.max_static_reach_cm, 90.0);
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let config = HoldsConfig::default();
        let text = config.to_toml().expect("Should serialize");
        let parsed = HoldsConfig::from_toml(&text).expect("Should parse back");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_area_bounds_rejected() {
        let mut config = HoldsConfig::default();
        config.area = AreaBounds { min: 500.0, max: 100.0 };
        assert!(matches!(config.validate(), Err(HoldError::InvalidConfig(_))));
    }

    #[test]
    fn test_even_kernel_rejected() {
        let mut config = HoldsConfig::default();
        config.morphology.kernel_size = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_grade_bucket_is_half_open() {
        let bucket = GradeBucket::new(10.0, Some(16.0), "V1");
        assert!(bucket.contains(10.0));
        assert!(bucket.contains(15.999));
        assert!(!bucket.contains(16.0));
        assert!(GradeBucket::new(75.0, None, "V9+").contains(1.0e9));
    }

    #[test]
    fn test_schema_lists_sections() {
        let schema = serde_json::to_value(HoldsConfig::schema()).expect("schema serializes");
        let properties = &schema["properties"];
        assert!(properties.get("route").is_some());
        assert!(properties.get("color").is_some());
    }
}
