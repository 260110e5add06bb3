use image::{GrayImage, Luma, RgbImage};
use tracing::debug;

use crate::{
    color::{to_lab_image, LabImage},
    config::NormalizationConfig,
    error::Result,
    traits::ImageNormalizer,
};

const BINS: usize = 256;

/// Contrast-limited adaptive histogram equalization of the LAB lightness
/// channel. Chroma channels are left untouched.
#[derive(Debug, Clone)]
pub struct ClaheNormalizer {
    pub clip_limit: f32,
    pub tile_grid: u32,
}

impl Default for ClaheNormalizer {
    fn default() -> Self {
        Self::from(&NormalizationConfig::default())
    }
}

impl From<&NormalizationConfig> for ClaheNormalizer {
    fn from(config: &NormalizationConfig) -> Self {
        Self {
            clip_limit: config.clip_limit,
            tile_grid: config.tile_grid,
        }
    }
}

impl ClaheNormalizer {
    /// Equalize a single 8-bit channel.
    pub fn equalize(&self, channel: &GrayImage) -> GrayImage {
        let (width, height) = channel.dimensions();
        if width == 0 || height == 0 {
            return channel.clone();
        }

        let grid = self.tile_grid.max(1);
        let tile_w = width.div_ceil(grid.min(width));
        let tile_h = height.div_ceil(grid.min(height));
        let tiles_x = width.div_ceil(tile_w);
        let tiles_y = height.div_ceil(tile_h);

        let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let x0 = tx * tile_w;
                let y0 = ty * tile_h;
                let x1 = (x0 + tile_w).min(width);
                let y1 = (y0 + tile_h).min(height);
                luts.push(self.tile_lut(channel, x0..x1, y0..y1));
            }
        }

        let lut_at = |tx: u32, ty: u32, value: u8| luts[(ty * tiles_x + tx) as usize][value as usize] as f32;
        let neighbours = |pos: u32, tile: u32, count: u32| {
            let f = (pos as f32 + 0.5) / tile as f32 - 0.5;
            let lower = f.floor();
            let weight = (f - lower).clamp(0.0, 1.0);
            let last = count as i64 - 1;
            let t0 = (lower as i64).clamp(0, last) as u32;
            let t1 = (lower as i64 + 1).clamp(0, last) as u32;
            (t0, t1, weight)
        };

        let mut out = GrayImage::new(width, height);
        for (x, y, pixel) in channel.enumerate_pixels() {
            let value = pixel[0];
            let (tx0, tx1, ax) = neighbours(x, tile_w, tiles_x);
            let (ty0, ty1, ay) = neighbours(y, tile_h, tiles_y);
            let top = lut_at(tx0, ty0, value) * (1.0 - ax) + lut_at(tx1, ty0, value) * ax;
            let bottom = lut_at(tx0, ty1, value) * (1.0 - ax) + lut_at(tx1, ty1, value) * ax;
            let v = top * (1.0 - ay) + bottom * ay;
            out.put_pixel(x, y, Luma([v.round().clamp(0.0, 255.0) as u8]));
        }
        out
    }

    fn tile_lut(
        &self,
        channel: &GrayImage,
        xs: std::ops::Range<u32>,
        ys: std::ops::Range<u32>,
    ) -> [u8; BINS] {
        let mut hist = [0u32; BINS];
        for y in ys.clone() {
            for x in xs.clone() {
                hist[channel.get_pixel(x, y)[0] as usize] += 1;
            }
        }
        let area = (xs.len() * ys.len()) as u32;

        let clip = ((self.clip_limit * area as f32 / BINS as f32) as u32).max(1);
        let mut excess = 0u32;
        for count in hist.iter_mut() {
            if *count > clip {
                excess += *count - clip;
                *count = clip;
            }
        }

        // spread the clipped mass uniformly, remainder over evenly spaced bins
        let per_bin = excess / BINS as u32;
        let residual = (excess % BINS as u32) as usize;
        for count in hist.iter_mut() {
            *count += per_bin;
        }
        if residual > 0 {
            let step = (BINS / residual).max(1);
            for i in (0..BINS).step_by(step).take(residual) {
                hist[i] += 1;
            }
        }

        let scale = 255.0 / area as f32;
        let mut lut = [0u8; BINS];
        let mut cumulative = 0u32;
        for (value, count) in hist.iter().enumerate() {
            cumulative += count;
            lut[value] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
        }
        lut
    }
}

impl ImageNormalizer for ClaheNormalizer {
    fn normalize(&self, image: &RgbImage) -> Result<LabImage> {
        let mut lab = to_lab_image(image);
        let lightness = GrayImage::from_fn(lab.width(), lab.height(), |x, y| Luma([lab.get_pixel(x, y)[0]]));
        let equalized = self.equalize(&lightness);
        for (x, y, pixel) in lab.enumerate_pixels_mut() {
            pixel[0] = equalized.get_pixel(x, y)[0];
        }
        debug!(
            width = lab.width(),
            height = lab.height(),
            clip_limit = self.clip_limit,
            tile_grid = self.tile_grid,
            "Normalized lightness"
        );
        Ok(lab)
    }
}

/// Normalizer that only converts to LAB
#[derive(Debug, Clone, Default)]
pub struct PassthroughNormalizer;

impl ImageNormalizer for PassthroughNormalizer {
    fn normalize(&self, image: &RgbImage) -> Result<LabImage> {
        Ok(to_lab_image(image))
    }
}
