pub mod builder;
pub mod hold_pass;
pub mod route_pass;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    color::{to_hsv_image, ColorSample},
    config::{ExportConfig, HoldsConfig},
    error::{HoldError, Result},
    io::export::ExportedHold,
    traits::{ImageNormalizer, MaskBuilder, MaskRefiner, RegionExtractor, RegionSink},
    types::{Band, HoldRegion, Mask},
};

pub use hold_pass::*;
pub use route_pass::*;

/// Outline color of the annotated preview.
pub const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Outline width in pixels.
pub const OUTLINE_THICKNESS: i32 = 2;

/// Hold detection over a full photograph: normalize, mask, refine, extract.
pub struct DetectionPipeline {
    normalizer: Box<dyn ImageNormalizer>,
    mask_builder: Box<dyn MaskBuilder>,
    refiner: Box<dyn MaskRefiner>,
    extractor: Box<dyn RegionExtractor>,
}

/// Result of the detection pass.
#[derive(Debug, Clone)]
pub struct Detection {
    pub regions: Vec<HoldRegion>,
    /// The refined mask the regions were extracted from
    pub mask: Mask,
    pub reference: ColorSample,
    pub band: Band,
    pub image_width: u32,
    pub image_height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub reference_hsv: [u8; 3],
    pub band: Band,
    pub hold_count: usize,
    pub image_width: u32,
    pub image_height: u32,
}

impl DetectionPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::DetectionPipelineBuilder {
        builder::DetectionPipelineBuilder::new()
    }

    /// Pipeline with the default stages parameterized by `config`
    pub fn from_config(config: &HoldsConfig) -> Self {
        builder::DetectionPipelineBuilder::from_config(config).build()
    }

    pub fn new(
        normalizer: Box<dyn ImageNormalizer>,
        mask_builder: Box<dyn MaskBuilder>,
        refiner: Box<dyn MaskRefiner>,
        extractor: Box<dyn RegionExtractor>,
    ) -> Self {
        Self {
            normalizer,
            mask_builder,
            refiner,
            extractor,
        }
    }

    pub fn detect(&self, image: &RgbImage, reference: ColorSample, band: Band) -> Result<Detection> {
        let (image_width, image_height) = image.dimensions();
        if image_width == 0 || image_height == 0 {
            return Err(HoldError::InvalidImage("image has no pixels".to_string()));
        }

        // Color match against the raw hue, lightness-equalized LAB
        let hsv = to_hsv_image(image);
        let lab = self.normalizer.normalize(image)?;

        let candidates = self.mask_builder.build_mask(&lab, &hsv, reference, band)?;
        let mask = self.refiner.refine(&candidates)?;
        let regions = self.extractor.extract_regions(&mask, &hsv)?;

        info!(
            holds = regions.len(),
            reference = ?reference.values,
            left = band.left,
            right = band.right,
            "Detected holds"
        );

        Ok(Detection {
            regions,
            mask,
            reference,
            band,
            image_width,
            image_height,
        })
    }
}

impl Detection {
    pub fn summary(&self) -> DetectionSummary {
        DetectionSummary {
            reference_hsv: self.reference.to_hsv().values,
            band: self.band,
            hold_count: self.regions.len(),
            image_width: self.image_width,
            image_height: self.image_height,
        }
    }

    /// Copy of the photograph with every hold contour outlined.
    pub fn annotate(&self, image: &RgbImage) -> RgbImage {
        let mut preview = image.clone();
        for region in &self.regions {
            let points = &region.contour;
            for (i, &[x, y]) in points.iter().enumerate() {
                let [nx, ny] = points[(i + 1) % points.len()];
                for dy in 0..OUTLINE_THICKNESS {
                    for dx in 0..OUTLINE_THICKNESS {
                        draw_line_segment_mut(
                            &mut preview,
                            ((x + dx) as f32, (y + dy) as f32),
                            ((nx + dx) as f32, (ny + dy) as f32),
                            OUTLINE_COLOR,
                        );
                    }
                }
            }
        }
        preview
    }

    /// Crop, encode and hand every region to `sink`. Returns the number of
    /// exported holds.
    pub fn export<S: RegionSink + ?Sized>(
        &self,
        image: &RgbImage,
        sink: &mut S,
        config: &ExportConfig,
    ) -> Result<usize> {
        if image.dimensions() != (self.image_width, self.image_height) {
            return Err(HoldError::InvalidImage(format!(
                "photograph is {:?}, detection ran on {}x{}",
                image.dimensions(),
                self.image_width,
                self.image_height
            )));
        }
        for region in &self.regions {
            sink.export(ExportedHold::from_region(image, region, config)?)?;
        }
        info!(holds = self.regions.len(), format = config.format.extension(), "Exported hold crops");
        Ok(self.regions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        algorithms::{ContourRegionExtractor, MorphologicalRefiner, PassthroughNormalizer},
        color::rgb_to_hsv,
        config::AreaBounds,
    };

    const HOLD: [u8; 3] = [200, 30, 30];
    const WALL: [u8; 3] = [235, 235, 225];

    fn wall_with_patches(patches: &[(u32, u32, u32)]) -> RgbImage {
        RgbImage::from_fn(300, 200, |x, y| {
            let inside = patches
                .iter()
                .any(|&(px, py, side)| x >= px && x < px + side && y >= py && y < py + side);
            Rgb(if inside { HOLD } else { WALL })
        })
    }

    fn pipeline() -> DetectionPipeline {
        DetectionPipeline::builder()
            .set_normalizer(PassthroughNormalizer)
            .set_refiner(MorphologicalRefiner { kernel_size: 3, dilate_iterations: 1 })
            .set_extractor(ContourRegionExtractor { area: AreaBounds { min: 100.0, max: 20_000.0 } })
            .build()
    }

    #[test]
    fn test_detects_patches_inside_band() {
        let image = wall_with_patches(&[(40, 40, 30), (150, 100, 30), (260, 20, 30)]);
        let reference = ColorSample::hsv(rgb_to_hsv(HOLD));
        let detection = pipeline().detect(&image, reference, Band::new(250, 0)).expect("detect");

        assert_eq!(detection.regions.len(), 2);
        for region in &detection.regions {
            assert!(region.center[0] < 250);
        }
        let summary = detection.summary();
        assert_eq!(summary.hold_count, 2);
        assert_eq!(summary.band, Band::new(250, 0));
        assert_eq!(summary.reference_hsv, reference.values);
    }

    #[test]
    fn test_no_matching_color_yields_no_holds() {
        let image = RgbImage::from_pixel(120, 80, Rgb(WALL));
        let reference = ColorSample::hsv(rgb_to_hsv(HOLD));
        let detection = pipeline().detect(&image, reference, Band::new(0, 120)).expect("detect");
        assert!(detection.regions.is_empty());
    }

    #[test]
    fn test_detection_is_idempotent() {
        let image = wall_with_patches(&[(40, 40, 30), (150, 100, 25)]);
        let reference = ColorSample::hsv(rgb_to_hsv(HOLD));
        let pipeline = DetectionPipeline::from_config(&HoldsConfig::default());
        let a = pipeline.detect(&image, reference, Band::new(0, 300)).expect("first");
        let b = pipeline.detect(&image, reference, Band::new(0, 300)).expect("second");
        assert_eq!(a.regions, b.regions);
        assert_eq!(a.mask, b.mask);
    }

    #[test]
    fn test_annotate_outlines_in_green() {
        let image = wall_with_patches(&[(40, 40, 30)]);
        let reference = ColorSample::hsv(rgb_to_hsv(HOLD));
        let detection = pipeline().detect(&image, reference, Band::new(0, 300)).expect("detect");
        let preview = detection.annotate(&image);

        let [x, y] = detection.regions[0].contour[0];
        assert_eq!(*preview.get_pixel(x as u32, y as u32), OUTLINE_COLOR);
        assert_eq!(*preview.get_pixel(x as u32 + 1, y as u32 + 1), OUTLINE_COLOR);
        assert_ne!(*preview.get_pixel(x as u32 - 1, y as u32 - 1), OUTLINE_COLOR);
        assert_eq!(*preview.get_pixel(0, 0), Rgb(WALL));
    }

    #[test]
    fn test_export_rejects_other_photograph() {
        let image = wall_with_patches(&[(40, 40, 30)]);
        let reference = ColorSample::hsv(rgb_to_hsv(HOLD));
        let detection = pipeline().detect(&image, reference, Band::new(0, 300)).expect("detect");

        let mut sink: Vec<ExportedHold> = Vec::new();
        let other = RgbImage::new(10, 10);
        assert!(detection.export(&other, &mut sink, &ExportConfig::default()).is_err());
        assert_eq!(detection.export(&image, &mut sink, &ExportConfig::default()).expect("export"), 1);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let err = pipeline()
            .detect(&RgbImage::new(0, 0), ColorSample::hsv([0, 0, 0]), Band::new(0, 1))
            .unwrap_err();
        assert!(err.is_client_error());
    }
}
