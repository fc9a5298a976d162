//! Alpha compositing onto a solid background color

use crate::color::BackgroundColor;
use crate::error::{NoBgError, Result};
use image::{DynamicImage, Rgb, RgbImage};

/// Flatten a segmented image onto `color`
///
/// With `None` the image is returned as-is and keeps its alpha channel. With a
/// color, every pixel is blended with its alpha as weight and the result is an
/// opaque RGB8 image of the same dimensions.
///
/// # Errors
/// - [`NoBgError::MissingAlpha`] when a color is given but the image has no alpha channel
pub fn composite(image: DynamicImage, color: Option<BackgroundColor>) -> Result<DynamicImage> {
    let Some(color) = color else {
        return Ok(image);
    };

    if !image.color().has_alpha() {
        return Err(NoBgError::MissingAlpha);
    }

    let rgba = image.into_rgba8();
    let background = color.channels();
    let mut canvas = RgbImage::new(rgba.width(), rgba.height());

    for (src, dst) in rgba.pixels().zip(canvas.pixels_mut()) {
        let [r, g, b, a] = src.0;
        *dst = Rgb([
            blend(r, background[0], a),
            blend(g, background[1], a),
            blend(b, background[2], a),
        ]);
    }

    Ok(DynamicImage::ImageRgb8(canvas))
}

/// `round((src * a + bg * (255 - a)) / 255)` in integer arithmetic
///
/// The numerator never lands exactly halfway between two multiples of 255
/// (255 is odd), so adding 127 before dividing is exact rounding.
#[inline]
fn blend(src: u8, bg: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha);
    let value = (u32::from(src) * a + u32::from(bg) * (255 - a) + 127) / 255;
    // value <= 255 since both weights sum to 255
    value as u8
}
