use image::RgbImage;
use tracing::debug;

use crate::{
    color::{rgb_to_hsv, ColorSample},
    error::{HoldError, Result},
};

/// Decode an encoded photograph (JPEG, PNG, ...) into RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(HoldError::InvalidImage("empty image payload".to_string()));
    }
    let image = image::load_from_memory(bytes)?.to_rgb8();
    if image.width() == 0 || image.height() == 0 {
        return Err(HoldError::InvalidImage("image has no pixels".to_string()));
    }
    debug!(width = image.width(), height = image.height(), "Decoded image");
    Ok(image)
}

/// HSV color of the pixel the user clicked on. The click must lie inside
/// the image.
pub fn reference_from_click(image: &RgbImage, x: i64, y: i64) -> Result<ColorSample> {
    let (width, height) = image.dimensions();
    if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
        return Err(HoldError::ClickOutOfBounds { x, y, width, height });
    }
    let rgb = image.get_pixel(x as u32, y as u32).0;
    let sample = ColorSample::hsv(rgb_to_hsv(rgb));
    debug!(x, y, ?rgb, hsv = ?sample.values, "Sampled reference color");
    Ok(sample)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorSpace;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    #[test]
    fn test_decode_png_roundtrip() {
        let image = RgbImage::from_pixel(7, 5, Rgb([12, 34, 56]));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).expect("encode");

        let decoded = decode_image(&bytes).expect("decode");
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_garbage_is_client_error() {
        let err = decode_image(b"not an image").unwrap_err();
        assert!(err.is_client_error());
        let err = decode_image(&[]).unwrap_err();
        assert!(matches!(err, HoldError::InvalidImage(_)));
    }

    #[test]
    fn test_click_reference_is_hsv() {
        let mut image = RgbImage::new(10, 10);
        image.put_pixel(3, 4, Rgb([255, 0, 0]));
        let sample = reference_from_click(&image, 3, 4).expect("inside");
        assert_eq!(sample.space, ColorSpace::Hsv);
        assert_eq!(sample.values, [0, 255, 255]);
    }

    #[test]
    fn test_click_outside_image() {
        let image = RgbImage::new(10, 10);
        for (x, y) in [(-1, 0), (0, -1), (10, 0), (0, 10)] {
            let err = reference_from_click(&image, x, y).unwrap_err();
            assert!(matches!(err, HoldError::ClickOutOfBounds { .. }));
            assert!(err.is_client_error());
        }
    }
}
