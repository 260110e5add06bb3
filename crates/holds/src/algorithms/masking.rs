use image::{GrayImage, Luma};
use tracing::debug;

use crate::{
    color::{hue_distance, lab_distance, ColorSample, HsvImage, LabImage},
    config::{ColorMatchConfig, HsvTolerance},
    error::{HoldError, Result},
    traits::MaskBuilder,
    types::{Band, Mask, MASK_OFF, MASK_ON},
};

fn flag(on: bool) -> Luma<u8> {
    Luma([if on { MASK_ON } else { MASK_OFF }])
}

/// Hold-candidate mask from two independent color models. A pixel survives
/// only if it is close to the reference in LAB *and* inside the HSV
/// tolerance box.
#[derive(Debug, Clone)]
pub struct DualSpaceMaskBuilder {
    pub lab_tolerance: f64,
    pub hsv_tolerance: HsvTolerance,
}

impl Default for DualSpaceMaskBuilder {
    fn default() -> Self {
        Self::from(&ColorMatchConfig::default())
    }
}

impl From<&ColorMatchConfig> for DualSpaceMaskBuilder {
    fn from(config: &ColorMatchConfig) -> Self {
        Self {
            lab_tolerance: config.lab_tolerance,
            hsv_tolerance: config.hsv_tolerance,
        }
    }
}

impl DualSpaceMaskBuilder {
    pub fn lab_mask(&self, lab: &LabImage, reference_lab: [u8; 3]) -> Mask {
        GrayImage::from_fn(lab.width(), lab.height(), |x, y| {
            flag(lab_distance(lab.get_pixel(x, y).0, reference_lab) < self.lab_tolerance)
        })
    }

    pub fn hsv_mask(&self, hsv: &HsvImage, reference_hsv: [u8; 3]) -> Mask {
        let tol = self.hsv_tolerance;
        let [rh, rs, rv] = reference_hsv;
        GrayImage::from_fn(hsv.width(), hsv.height(), |x, y| {
            let [h, s, v] = hsv.get_pixel(x, y).0;
            flag(
                hue_distance(h, rh) < tol.hue
                    && (s as i32 - rs as i32).abs() < tol.saturation
                    && (v as i32 - rv as i32).abs() < tol.value,
            )
        })
    }

    pub fn combine(a: &Mask, b: &Mask) -> Mask {
        GrayImage::from_fn(a.width(), a.height(), |x, y| {
            flag(a.get_pixel(x, y)[0] == MASK_ON && b.get_pixel(x, y)[0] == MASK_ON)
        })
    }

    /// Zero every column outside the band.
    pub fn restrict_to_band(mask: &mut Mask, band: Band) {
        let columns = band.columns(mask.width());
        for (x, _, pixel) in mask.enumerate_pixels_mut() {
            if !columns.contains(&x) {
                *pixel = flag(false);
            }
        }
    }
}

impl MaskBuilder for DualSpaceMaskBuilder {
    fn build_mask(
        &self,
        lab: &LabImage,
        hsv: &HsvImage,
        reference: ColorSample,
        band: Band,
    ) -> Result<Mask> {
        if lab.dimensions() != hsv.dimensions() {
            return Err(HoldError::InvalidImage(format!(
                "LAB {:?} and HSV {:?} representations differ in size",
                lab.dimensions(),
                hsv.dimensions()
            )));
        }

        let reference_hsv = reference.to_hsv().values;
        let reference_lab = reference.to_lab().values;

        let lab_mask = self.lab_mask(lab, reference_lab);
        let hsv_mask = self.hsv_mask(hsv, reference_hsv);
        let mut mask = Self::combine(&lab_mask, &hsv_mask);
        Self::restrict_to_band(&mut mask, band);

        debug!(
            ?reference_hsv,
            ?reference_lab,
            candidates = mask.pixels().filter(|p| p[0] == MASK_ON).count(),
            "Built color mask"
        );
        Ok(mask)
    }
}
