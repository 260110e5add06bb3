//! 8-bit color-space conversions shared by the masking and extraction
//! stages.
//!
//! Channel encodings follow the usual computer-vision convention so that
//! tolerances are expressed in familiar units:
//!
//! - HSV: hue in `[0,180)` (degrees / 2), saturation and value in `[0,255]`
//! - LAB: `L * 255 / 100`, `a + 128`, `b + 128` (D65, sRGB transfer)

use image::{Rgb, RgbImage};
use palette::{FromColor, Hsv, Lab, Srgb, white_point::D65};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Size of the hue circle in 8-bit HSV.
pub const HUE_RANGE: i32 = 180;

/// An image whose three channels hold HSV values.
pub type HsvImage = RgbImage;

/// An image whose three channels hold 8-bit LAB values.
pub type LabImage = RgbImage;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ColorSpace {
    Bgr,
    Hsv,
    Lab,
}

/// A 3-component color tagged with the space its channels live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColorSample {
    pub space: ColorSpace,
    pub values: [u8; 3],
}

impl ColorSample {
    pub fn hsv(values: [u8; 3]) -> Self {
        Self { space: ColorSpace::Hsv, values }
    }

    pub fn bgr(values: [u8; 3]) -> Self {
        Self { space: ColorSpace::Bgr, values }
    }

    pub fn lab(values: [u8; 3]) -> Self {
        Self { space: ColorSpace::Lab, values }
    }

    fn to_rgb(self) -> [u8; 3] {
        match self.space {
            ColorSpace::Bgr => {
                let [b, g, r] = self.values;
                [r, g, b]
            }
            ColorSpace::Hsv => hsv_to_rgb(self.values),
            ColorSpace::Lab => lab_to_rgb(self.values),
        }
    }

    pub fn to_bgr(self) -> Self {
        let [r, g, b] = self.to_rgb();
        Self::bgr([b, g, r])
    }

    pub fn to_hsv(self) -> Self {
        match self.space {
            ColorSpace::Hsv => self,
            _ => Self::hsv(rgb_to_hsv(self.to_rgb())),
        }
    }

    /// Reference colors arrive as HSV; masking compares in LAB, so the
    /// conversion goes HSV → BGR → LAB.
    pub fn to_lab(self) -> Self {
        match self.space {
            ColorSpace::Lab => self,
            _ => Self::lab(rgb_to_lab(self.to_rgb())),
        }
    }
}

fn unit(channel: u8) -> f32 {
    channel as f32 / 255.0
}

fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn srgb(rgb: [u8; 3]) -> Srgb<f32> {
    Srgb::new(unit(rgb[0]), unit(rgb[1]), unit(rgb[2]))
}

fn from_srgb(color: Srgb<f32>) -> [u8; 3] {
    [
        to_u8(color.red * 255.0),
        to_u8(color.green * 255.0),
        to_u8(color.blue * 255.0),
    ]
}

pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let hsv: Hsv = Hsv::from_color(srgb(rgb));
    let half_degrees = (hsv.hue.into_positive_degrees() / 2.0).round() as i32;
    [
        half_degrees.rem_euclid(HUE_RANGE) as u8,
        to_u8(hsv.saturation * 255.0),
        to_u8(hsv.value * 255.0),
    ]
}

pub fn hsv_to_rgb(hsv: [u8; 3]) -> [u8; 3] {
    let color = Hsv::new(hsv[0] as f32 * 2.0, unit(hsv[1]), unit(hsv[2]));
    from_srgb(Srgb::from_color(color))
}

pub fn rgb_to_lab(rgb: [u8; 3]) -> [u8; 3] {
    let lab: Lab<D65, f32> = Lab::from_color(srgb(rgb));
    [
        to_u8(lab.l * 255.0 / 100.0),
        to_u8(lab.a + 128.0),
        to_u8(lab.b + 128.0),
    ]
}

pub fn lab_to_rgb(lab: [u8; 3]) -> [u8; 3] {
    let color: Lab<D65, f32> = Lab::new(
        lab[0] as f32 * 100.0 / 255.0,
        lab[1] as f32 - 128.0,
        lab[2] as f32 - 128.0,
    );
    let rgb: Srgb<f32> = Srgb::from_color(color);
    from_srgb(Srgb::new(
        rgb.red.clamp(0.0, 1.0),
        rgb.green.clamp(0.0, 1.0),
        rgb.blue.clamp(0.0, 1.0),
    ))
}

fn map_pixels(image: &RgbImage, f: impl Fn([u8; 3]) -> [u8; 3]) -> RgbImage {
    let mut out = RgbImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        out.put_pixel(x, y, Rgb(f(pixel.0)));
    }
    out
}

pub fn to_hsv_image(image: &RgbImage) -> HsvImage {
    map_pixels(image, rgb_to_hsv)
}

pub fn to_lab_image(image: &RgbImage) -> LabImage {
    map_pixels(image, rgb_to_lab)
}

pub fn lab_image_to_rgb(image: &LabImage) -> RgbImage {
    map_pixels(image, lab_to_rgb)
}

/// Circular distance between two 8-bit hues.
pub fn hue_distance(h1: u8, h2: u8) -> i32 {
    let diff = (h1 as i32 - h2 as i32).abs();
    diff.min(HUE_RANGE - diff)
}

pub fn lab_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&p, &q)| {
            let d = p as f64 - q as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
