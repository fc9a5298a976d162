//! Shared fixtures for integration tests

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use nobg::{ModelKind, NoBgError, Result, SegmentationGateway};
use std::io::Cursor;

/// Gateway keeping the right half of every image, failing on chosen calls
#[derive(Debug, Default)]
pub struct HalfGateway {
    pub fail_on: Vec<usize>,
    pub calls: usize,
}

impl HalfGateway {
    pub fn failing_on(calls: &[usize]) -> Self {
        Self {
            fail_on: calls.to_vec(),
            calls: 0,
        }
    }
}

impl SegmentationGateway for HalfGateway {
    fn model(&self) -> ModelKind {
        ModelKind::U2Net
    }

    fn segment(&mut self, image: &DynamicImage) -> Result<RgbaImage> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on.contains(&call) {
            return Err(NoBgError::segmentation(format!("inference failed on call {call}")));
        }

        let mut cutout = image.to_rgba8();
        let half = cutout.width() / 2;
        for (x, _, pixel) in cutout.enumerate_pixels_mut() {
            pixel[3] = if x < half { 0 } else { 255 };
        }
        Ok(cutout)
    }
}

/// Gradient image so every pixel differs
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 40 % 256) as u8, (y * 60 % 256) as u8, ((x + y) * 15 % 256) as u8])
    })
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), format)
        .expect("Failed to encode fixture");
    bytes
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Png)
}
