use image::{GrayImage, Luma, RgbImage, imageops};
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use tracing::{debug, trace};

use crate::{
    color::HsvImage,
    config::{AreaBounds, CropBackground},
    error::Result,
    geometry,
    traits::RegionExtractor,
    types::{BoundingBox, HoldRegion, Mask, MASK_ON},
};

/// Outermost boundaries of a binary image, in discovery order. Boundaries
/// of holes and of blobs nested inside holes are dropped.
///
/// Tracing runs on a copy framed by a 1 px background border, so blobs
/// touching the image edge keep their outer boundary.
pub fn outer_contours(binary: &GrayImage) -> Vec<Vec<[i32; 2]>> {
    let mut framed = GrayImage::new(binary.width() + 2, binary.height() + 2);
    imageops::replace(&mut framed, binary, 1, 1);

    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| c.points.iter().map(|p| [p.x - 1, p.y - 1]).collect())
        .collect()
}

/// Rasterize the filled contour into a `width` x `height` canvas whose
/// top-left corner sits at `origin` in contour coordinates.
pub fn fill_contour(contour: &[[i32; 2]], origin: [i32; 2], width: u32, height: u32) -> GrayImage {
    let mut canvas = GrayImage::new(width, height);
    if contour.is_empty() || width == 0 || height == 0 {
        return canvas;
    }
    let on = Luma([MASK_ON]);

    let mut polygon: Vec<Point<i32>> = Vec::with_capacity(contour.len());
    for &[x, y] in contour {
        let p = Point::new(x - origin[0], y - origin[1]);
        if polygon.last() != Some(&p) {
            polygon.push(p);
        }
    }
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }

    if polygon.len() >= 3 {
        draw_polygon_mut(&mut canvas, &polygon, on);
    }
    // boundary pixels belong to the region
    for (i, p) in polygon.iter().enumerate() {
        let q = polygon[(i + 1) % polygon.len()];
        draw_line_segment_mut(
            &mut canvas,
            (p.x as f32, p.y as f32),
            (q.x as f32, q.y as f32),
            on,
        );
    }
    canvas
}

/// Mean HSV over the pixels inside the filled contour.
pub fn mean_color_inside(contour: &[[i32; 2]], hsv: &HsvImage) -> [f64; 3] {
    let bbox = BoundingBox::from_corners(contour);
    let (x0, y0, w, h) = BoundingBox {
        x_max: bbox.x_max + 1,
        y_max: bbox.y_max + 1,
        ..bbox
    }
    .clamped(hsv.width(), hsv.height());
    let filled = fill_contour(contour, [x0 as i32, y0 as i32], w, h);

    let mut sum = [0f64; 3];
    let mut count = 0u64;
    for (x, y, pixel) in filled.enumerate_pixels() {
        if pixel[0] != MASK_ON {
            continue;
        }
        let color = hsv.get_pixel(x0 + x, y0 + y);
        for c in 0..3 {
            sum[c] += color[c] as f64;
        }
        count += 1;
    }
    if count == 0 {
        return [0.0; 3];
    }
    sum.map(|s| s / count as f64)
}

/// Crop the region's axis-aligned box out of the photograph.
pub fn crop_region(image: &RgbImage, region: &HoldRegion, background: CropBackground) -> RgbImage {
    let (x, y, w, h) = region.bbox.clamped(image.width(), image.height());
    let mut crop = imageops::crop_imm(image, x, y, w, h).to_image();
    if background == CropBackground::Isolated {
        let silhouette = fill_contour(&region.contour, [x as i32, y as i32], w, h);
        for (px, py, pixel) in crop.enumerate_pixels_mut() {
            if silhouette.get_pixel(px, py)[0] != MASK_ON {
                pixel.0 = [0, 0, 0];
            }
        }
    }
    crop
}

/// Region extractor over the outer contours of a refined mask
#[derive(Debug, Clone, Default)]
pub struct ContourRegionExtractor {
    pub area: AreaBounds,
}

impl ContourRegionExtractor {
    fn region(&self, id: usize, contour: Vec<[i32; 2]>, hsv: &HsvImage) -> Option<HoldRegion> {
        let area_px = geometry::contour_area(&contour);
        if !self.area.contains(area_px) {
            trace!(id, area_px, "Dropping contour outside area bounds");
            return None;
        }

        let circle = geometry::min_enclosing_circle(&contour)?;
        let center = [circle.center[0] as i32, circle.center[1] as i32];
        let bbox_corners = geometry::min_area_rect(&contour)?;
        let bbox = BoundingBox::from_corners(&bbox_corners);
        let zoom_factor = bbox.width() as f64 / hsv.width() as f64;
        let mean_color_hsv = mean_color_inside(&contour, hsv);

        Some(HoldRegion {
            id,
            contour,
            area_px,
            center,
            bbox_corners,
            bbox,
            zoom_factor,
            mean_color_hsv,
        })
    }
}

impl RegionExtractor for ContourRegionExtractor {
    fn extract_regions(&self, mask: &Mask, hsv: &HsvImage) -> Result<Vec<HoldRegion>> {
        let contours = outer_contours(mask);
        let total = contours.len();
        let regions: Vec<HoldRegion> = contours
            .into_iter()
            .enumerate()
            .filter_map(|(id, contour)| self.region(id, contour, hsv))
            .collect();

        debug!(contours = total, regions = regions.len(), "Extracted hold regions");
        Ok(regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn mask_with_squares(squares: &[(u32, u32, u32)]) -> Mask {
        let mut mask = GrayImage::new(200, 100);
        for &(x0, y0, side) in squares {
            for y in y0..y0 + side {
                for x in x0..x0 + side {
                    mask.put_pixel(x, y, Luma([MASK_ON]));
                }
            }
        }
        mask
    }

    #[test]
    fn test_single_patch_region() {
        let mask = mask_with_squares(&[(60, 20, 50)]);
        let hsv = RgbImage::from_pixel(200, 100, Rgb([10, 200, 150]));
        let extractor = ContourRegionExtractor { area: AreaBounds { min: 100.0, max: 5000.0 } };
        let regions = extractor.extract_regions(&mask, &hsv).expect("extracts");

        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        // boundary polygon through pixel centers: 49 x 49
        assert_eq!(region.area_px, 2401.0);
        assert!((region.center[0] - 84).abs() <= 1, "center {:?}", region.center);
        assert!((region.center[1] - 44).abs() <= 1, "center {:?}", region.center);
        assert!((region.zoom_factor - 50.0 / 200.0).abs() < 0.01);
        assert_eq!(region.mean_color_hsv, [10.0, 200.0, 150.0]);
    }

    #[test]
    fn test_area_filter_is_inclusive_and_drops_outliers() {
        let mask = mask_with_squares(&[(5, 5, 3), (30, 30, 20), (120, 10, 80)]);
        let hsv = RgbImage::new(200, 100);
        let bounds = AreaBounds { min: 100.0, max: 1000.0 };
        let extractor = ContourRegionExtractor { area: bounds };
        let regions = extractor.extract_regions(&mask, &hsv).expect("extracts");

        assert_eq!(regions.len(), 1);
        assert!(regions.iter().all(|r| bounds.contains(r.area_px)));
        assert_eq!(regions[0].area_px, 361.0);
    }

    #[test]
    fn test_mean_color_ignores_background_inside_bbox() {
        // a diamond: its bounding box corners are background
        let contour = vec![[10, 0], [20, 10], [10, 20], [0, 10]];
        let hsv = RgbImage::from_fn(21, 21, |x, y| {
            let inside = (x as i32 - 10).abs() + (y as i32 - 10).abs() <= 10;
            if inside { Rgb([100, 100, 100]) } else { Rgb([0, 0, 0]) }
        });
        assert_eq!(mean_color_inside(&contour, &hsv), [100.0, 100.0, 100.0]);
    }

    #[test]
    fn test_isolated_crop_blacks_out_background() {
        let image = RgbImage::from_pixel(40, 40, Rgb([200, 50, 50]));
        let contour = vec![[20, 5], [35, 20], [20, 35], [5, 20]];
        let corners = geometry::min_area_rect(&contour).expect("rect");
        let region = HoldRegion {
            id: 0,
            area_px: geometry::contour_area(&contour),
            center: [20, 20],
            bbox_corners: corners,
            bbox: BoundingBox::from_corners(&corners),
            zoom_factor: 0.0,
            mean_color_hsv: [0.0; 3],
            contour,
        };

        let isolated = crop_region(&image, &region, CropBackground::Isolated);
        let raw = crop_region(&image, &region, CropBackground::Raw);
        assert_eq!(isolated.dimensions(), raw.dimensions());
        assert_eq!(isolated.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(raw.get_pixel(0, 0).0, [200, 50, 50]);
        let (w, h) = isolated.dimensions();
        assert_eq!(isolated.get_pixel(w / 2, h / 2).0, [200, 50, 50]);
    }

    #[test]
    fn test_blob_on_image_edges_is_traced() {
        let mut mask = GrayImage::new(120, 60);
        for y in 5..55 {
            for x in 0..50 {
                mask.put_pixel(x, y, Luma([MASK_ON]));
            }
        }
        let contours = outer_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert!(contours[0].iter().all(|&[x, y]| (0..50).contains(&x) && (5..55).contains(&y)));
        assert!(contours[0].contains(&[0, 5]));

        let hsv = RgbImage::from_pixel(120, 60, Rgb([10, 200, 150]));
        let regions = ContourRegionExtractor::default().extract_regions(&mask, &hsv).expect("extracts");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area_px, 2401.0);
    }

    #[test]
    fn test_mask_filling_whole_raster_has_one_contour() {
        let mask = GrayImage::from_pixel(30, 20, Luma([MASK_ON]));
        let contours = outer_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(geometry::contour_area(&contours[0]), 29.0 * 19.0);
    }

    #[test]
    fn test_empty_mask_yields_no_regions() {
        let mask = GrayImage::new(50, 50);
        let hsv = RgbImage::new(50, 50);
        let regions = ContourRegionExtractor::default().extract_regions(&mask, &hsv).expect("extracts");
        assert!(regions.is_empty());
    }
}
