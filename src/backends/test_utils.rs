//! Mock segmentation gateway for tests
//!
//! Produces a deterministic cutout without model files: pixels left of the
//! vertical center line become transparent, the rest opaque.

use crate::error::{NoBgError, Result};
use crate::models::ModelKind;
use crate::segmentation::{apply_mask, SegmentationGateway};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Mock gateway recording every call
#[derive(Debug, Clone)]
pub struct MockGateway {
    kind: ModelKind,
    /// 0-based call numbers that fail with a segmentation error
    failing_calls: HashSet<usize>,
    calls: usize,
    /// Dimensions of every image seen, shared so tests can inspect after a run
    call_history: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    #[must_use]
    pub fn new() -> Self {
        Self {
            kind: ModelKind::U2Net,
            failing_calls: HashSet::new(),
            calls: 0,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that fails on the given call numbers
    #[must_use]
    pub fn failing_on(calls: &[usize]) -> Self {
        let mut gateway = Self::new();
        gateway.failing_calls = calls.iter().copied().collect();
        gateway
    }

    #[must_use]
    pub fn with_model(mut self, kind: ModelKind) -> Self {
        self.kind = kind;
        self
    }

    /// Number of `segment` calls so far
    pub fn call_count(&self) -> usize {
        self.calls
    }

    pub fn call_history(&self) -> Vec<(u32, u32)> {
        self.call_history.lock().unwrap().clone()
    }
}

/// Left half transparent, right half opaque
pub fn half_mask(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, _| {
        Luma([if x < width / 2 { 0 } else { 255 }])
    })
}

impl SegmentationGateway for MockGateway {
    fn model(&self) -> ModelKind {
        self.kind
    }

    fn segment(&mut self, image: &DynamicImage) -> Result<RgbaImage> {
        let call = self.calls;
        self.calls += 1;
        if let Ok(mut history) = self.call_history.lock() {
            history.push((image.width(), image.height()));
        }

        if self.failing_calls.contains(&call) {
            return Err(NoBgError::segmentation(format!(
                "Mock segmentation failure on call {call}"
            )));
        }

        apply_mask(image, &half_mask(image.width(), image.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_cutout_shape() {
        let mut gateway = MockGateway::new();
        let cutout = gateway.segment(&DynamicImage::new_rgb8(4, 2)).unwrap();

        assert_eq!(cutout.dimensions(), (4, 2));
        assert_eq!(cutout.get_pixel(0, 0).0[3], 0);
        assert_eq!(cutout.get_pixel(3, 1).0[3], 255);
        assert_eq!(gateway.call_count(), 1);
        assert_eq!(gateway.call_history(), vec![(4, 2)]);
    }

    #[test]
    fn test_mock_fails_on_chosen_calls() {
        let mut gateway = MockGateway::failing_on(&[1]).with_model(ModelKind::Silueta);
        let image = DynamicImage::new_rgb8(2, 2);

        assert!(gateway.segment(&image).is_ok());
        assert!(matches!(
            gateway.segment(&image),
            Err(NoBgError::Segmentation(_))
        ));
        assert!(gateway.segment(&image).is_ok());
        assert_eq!(gateway.model(), ModelKind::Silueta);
    }
}
