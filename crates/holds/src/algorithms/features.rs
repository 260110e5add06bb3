use std::f64::consts::PI;

use image::{imageops, RgbImage};
use tracing::trace;

use crate::{
    config::PixelScale,
    geometry,
    types::HoldFeatures,
};
use super::extraction::outer_contours;

/// Grayscale level a crop pixel must exceed to count as hold. Crops are
/// expected on a pure black background.
pub const FOREGROUND_THRESHOLD: u8 = 1;

/// Shape descriptors of a hold, measured on its exported crop.
#[derive(Debug, Clone, Default)]
pub struct HoldFeatureExtractor {
    pub scale: PixelScale,
}

impl HoldFeatureExtractor {
    pub fn new(scale: PixelScale) -> Self {
        Self { scale }
    }

    /// Largest outer contour of the non-black part of the crop.
    pub fn largest_contour(crop: &RgbImage) -> Option<Vec<[i32; 2]>> {
        let gray = imageops::grayscale(crop);
        let binary = imageproc::contrast::threshold(&gray, FOREGROUND_THRESHOLD);

        let mut best: Option<(f64, Vec<[i32; 2]>)> = None;
        for contour in outer_contours(&binary) {
            let area = geometry::contour_area(&contour);
            if best.as_ref().map_or(true, |(a, _)| area > *a) {
                best = Some((area, contour));
            }
        }
        best.map(|(_, contour)| contour)
    }

    /// Features of a single contour in physical units. Degenerate measures
    /// fall back to neutral values instead of failing.
    pub fn measure(&self, contour: &[[i32; 2]]) -> HoldFeatures {
        let area_px = geometry::contour_area(contour);
        let perimeter_px = geometry::contour_perimeter(contour);
        let hull_area_px = geometry::convex_hull_area(contour);

        let area_cm2 = self.scale.to_cm2(area_px);
        let perimeter_cm = self.scale.to_cm(perimeter_px);

        let circularity = if perimeter_cm > 0.0 {
            4.0 * PI * area_cm2 / (perimeter_cm * perimeter_cm)
        } else {
            0.0
        };
        let convexity = if hull_area_px > 0.0 {
            area_px / hull_area_px
        } else {
            0.0
        };
        let aspect_ratio = geometry::min_area_rect(contour)
            .map(|corners| geometry::rect_sides(&corners))
            .filter(|&(w, h)| w > 0.0 && h > 0.0)
            .map_or(1.0, |(w, h)| (w / h).max(h / w));

        HoldFeatures {
            area_cm2,
            perimeter_cm,
            circularity,
            convexity,
            aspect_ratio,
        }
    }

    /// `None` when the crop has no foreground contour; the caller skips
    /// that hold.
    pub fn extract(&self, crop: &RgbImage) -> Option<HoldFeatures> {
        let contour = Self::largest_contour(crop)?;
        let features = self.measure(&contour);
        trace!(?features, "Measured hold");
        Some(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn crop_with_rect(w: u32, h: u32, x0: u32, y0: u32, rw: u32, rh: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            if x >= x0 && x < x0 + rw && y >= y0 && y < y0 + rh {
                Rgb([180, 40, 40])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn test_square_features() {
        let crop = crop_with_rect(40, 40, 5, 5, 21, 21);
        let extractor = HoldFeatureExtractor::new(PixelScale { cm_per_px: 0.5 });
        let features = extractor.extract(&crop).expect("contour");

        // 20 x 20 px polygon at 0.5 cm/px
        assert!((features.area_cm2 - 100.0).abs() < 1e-9);
        assert!((features.perimeter_cm - 40.0).abs() < 1e-9);
        assert!((features.circularity - PI / 4.0).abs() < 1e-9);
        assert!((features.convexity - 1.0).abs() < 1e-9);
        assert!((features.aspect_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_elongated_hold_aspect_ratio() {
        let crop = crop_with_rect(60, 20, 2, 2, 41, 11);
        let features = HoldFeatureExtractor::default().extract(&crop).expect("contour");
        assert!((features.aspect_ratio - 4.0).abs() < 1e-9);
        assert!(features.aspect_ratio >= 1.0);
    }

    #[test]
    fn test_largest_blob_wins_over_noise() {
        let mut crop = crop_with_rect(50, 50, 20, 20, 25, 25);
        crop.put_pixel(2, 2, Rgb([90, 90, 90]));
        crop.put_pixel(3, 2, Rgb([90, 90, 90]));
        let contour = HoldFeatureExtractor::largest_contour(&crop).expect("contour");
        assert!(contour.iter().all(|&[x, y]| x >= 20 && y >= 20));
    }

    #[test]
    fn test_crop_filled_to_its_edges() {
        let crop = RgbImage::from_pixel(30, 20, Rgb([200, 30, 30]));
        let extractor = HoldFeatureExtractor::new(PixelScale { cm_per_px: 1.0 });
        let features = extractor.extract(&crop).expect("contour");
        // 29 x 19 px polygon at 1 cm/px
        assert!((features.area_cm2 - 551.0).abs() < 1e-9);
        assert!((features.convexity - 1.0).abs() < 1e-9);
        assert!((features.aspect_ratio - 29.0 / 19.0).abs() < 1e-9);
    }

    #[test]
    fn test_black_crop_has_no_features() {
        let crop = RgbImage::new(30, 30);
        assert!(HoldFeatureExtractor::default().extract(&crop).is_none());
    }

    #[test]
    fn test_degenerate_contour_uses_neutral_values() {
        let features = HoldFeatureExtractor::default().measure(&[[3, 3]]);
        assert_eq!(features.circularity, 0.0);
        assert_eq!(features.convexity, 0.0);
        assert_eq!(features.aspect_ratio, 1.0);
    }
}
