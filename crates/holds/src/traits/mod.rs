use image::RgbImage;
use crate::{
    color::{ColorSample, HsvImage, LabImage},
    error::Result,
    io::{export::ExportedHold, history::RouteHistoryRecord},
    types::{Band, HoldRegion, Mask},
};

/// Trait for lightness normalization ahead of color matching
pub trait ImageNormalizer: Send + Sync {
    /// Return the LAB representation of the image with equalized lightness
    fn normalize(&self, image: &RgbImage) -> Result<LabImage>;
}

/// Trait for building a hold-candidate mask from color similarity
pub trait MaskBuilder: Send + Sync {
    fn build_mask(
        &self,
        lab: &LabImage,
        hsv: &HsvImage,
        reference: ColorSample,
        band: Band,
    ) -> Result<Mask>;
}

/// Trait for morphological clean-up of a binary mask
pub trait MaskRefiner: Send + Sync {
    fn refine(&self, mask: &Mask) -> Result<Mask>;
}

/// Trait for turning a refined mask into hold regions
pub trait RegionExtractor: Send + Sync {
    fn extract_regions(&self, mask: &Mask, hsv: &HsvImage) -> Result<Vec<HoldRegion>>;
}

/// Destination of exported hold crops between the detection and grading
/// passes
pub trait RegionSink {
    fn export(&mut self, hold: ExportedHold) -> Result<()>;
}

/// Storage for full route photographs
pub trait ImageStore: Send + Sync {
    fn put_image(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()>;
}

/// Storage for route-history records
pub trait HistoryStore: Send + Sync {
    fn put_record(&self, record: &RouteHistoryRecord) -> Result<()>;
}
