//! Segmentation gateway abstraction and the tensor plumbing around it
//!
//! The network itself is a black box. This module owns the pre- and
//! post-processing contract shared by every model: square resize, scaling by
//! the brightest channel value, per-model normalization, and turning the first
//! output channel back into an alpha mask at source resolution.

use crate::error::{NoBgError, Result};
use crate::models::ModelKind;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use ndarray::{Array4, ArrayView4, Axis};

/// Produces a foreground alpha for an image
///
/// Implementations are created once per run and reused for every item.
pub trait SegmentationGateway {
    /// Model this gateway was created for
    fn model(&self) -> ModelKind;

    /// Compute a cutout: same dimensions, source RGB, newly computed alpha
    ///
    /// Any alpha already present on `image` is ignored.
    ///
    /// # Errors
    /// - Inference failures, reported per item by the pipeline
    fn segment(&mut self, image: &DynamicImage) -> Result<RgbaImage>;
}

/// Build the NCHW input tensor for `model`
#[must_use]
pub fn preprocess(image: &DynamicImage, model: ModelKind) -> Array4<f32> {
    let size = model.input_size();
    let resized = imageops::resize(&image.to_rgb8(), size, size, FilterType::Lanczos3);

    let max_value = resized
        .as_raw()
        .iter()
        .copied()
        .max()
        .map_or(0.0, f32::from)
        .max(1e-6);
    let mean = model.mean();
    let std = model.std();

    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for (channel, value) in pixel.0.iter().enumerate() {
            let (Some(m), Some(s)) = (mean.get(channel), std.get(channel)) else {
                continue;
            };
            if let Some(slot) = tensor.get_mut([0, channel, y as usize, x as usize]) {
                *slot = (f32::from(*value) / max_value - m) / s;
            }
        }
    }
    tensor
}

/// Turn a raw prediction into an 8-bit mask of `width` x `height`
///
/// Uses channel 0 of the first batch entry, min-max normalized to `0..=255`.
/// A constant prediction yields an all-transparent mask.
///
/// # Errors
/// - Prediction has an empty batch or channel axis
pub fn mask_from_prediction(
    prediction: ArrayView4<'_, f32>,
    width: u32,
    height: u32,
) -> Result<GrayImage> {
    let (batch, channels, rows, cols) = prediction.dim();
    if batch == 0 || channels == 0 || rows == 0 || cols == 0 {
        return Err(NoBgError::segmentation(format!(
            "Unexpected prediction shape {:?}",
            prediction.shape()
        )));
    }

    let plane = prediction.index_axis(Axis(0), 0);
    let plane = plane.index_axis(Axis(0), 0);

    let (min, max) = plane
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    let mut mask = GrayImage::new(cols as u32, rows as u32);
    if range > f32::EPSILON {
        for ((y, x), value) in plane.indexed_iter() {
            let normalized = ((value - min) / range).clamp(0.0, 1.0);
            mask.put_pixel(x as u32, y as u32, Luma([(normalized * 255.0) as u8]));
        }
    } else {
        log::warn!("Constant prediction ({min}); producing an empty mask");
    }

    if mask.dimensions() == (width, height) {
        Ok(mask)
    } else {
        Ok(imageops::resize(&mask, width, height, FilterType::Lanczos3))
    }
}

/// Combine source RGB with `mask` as the alpha channel
///
/// # Errors
/// - Mask dimensions differ from the image
pub fn apply_mask(image: &DynamicImage, mask: &GrayImage) -> Result<RgbaImage> {
    let rgb = image.to_rgb8();
    if rgb.dimensions() != mask.dimensions() {
        return Err(NoBgError::segmentation(format!(
            "Mask is {}x{} but image is {}x{}",
            mask.width(),
            mask.height(),
            rgb.width(),
            rgb.height()
        )));
    }

    let mut cutout = RgbaImage::new(rgb.width(), rgb.height());
    for ((src, alpha), dst) in rgb.pixels().zip(mask.pixels()).zip(cutout.pixels_mut()) {
        let [r, g, b] = src.0;
        dst.0 = [r, g, b, alpha.0[0]];
    }
    Ok(cutout)
}
