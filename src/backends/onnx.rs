//! ONNX Runtime segmentation gateway
//!
//! Loads one of the U2-Net family `.onnx` models once and reuses the
//! session for every image of a run.

use crate::error::{NoBgError, Result};
use crate::models::{ModelKind, ModelLocator};
use crate::segmentation::{apply_mask, mask_from_prediction, preprocess, SegmentationGateway};
use image::{DynamicImage, RgbaImage};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use std::time::Instant;

/// Segmentation gateway backed by an ONNX Runtime CPU session
#[derive(Debug)]
pub struct OnnxSegmenter {
    kind: ModelKind,
    session: Session,
}

impl OnnxSegmenter {
    /// Load `kind` from the directory resolved by `locator`
    ///
    /// # Errors
    /// - Model file missing
    /// - ONNX Runtime session creation failures
    pub fn load(kind: ModelKind, locator: &ModelLocator) -> Result<Self> {
        let path = locator.require(kind)?;
        Self::from_file(kind, &path)
    }

    /// Load a model file from an explicit path
    ///
    /// # Errors
    /// - ONNX Runtime session creation failures
    pub fn from_file(kind: ModelKind, path: &Path) -> Result<Self> {
        let _span = crate::tracing_config::spans::model_loading(kind.token(), path).entered();
        let start = Instant::now();

        let intra_threads = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(1);

        let session = Session::builder()
            .map_err(|e| {
                NoBgError::model(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                NoBgError::model(format!("Failed to set optimization level: {e}"))
            })?
            .with_intra_threads(intra_threads)
            .map_err(|e| NoBgError::model(format!("Failed to set intra threads: {e}")))?
            .commit_from_file(path)
            .map_err(|e| {
                NoBgError::model_error_with_context(
                    "load",
                    path,
                    &e.to_string(),
                    &["check the file is a complete ONNX model", "re-download the model"],
                )
            })?;

        log::info!(
            "Loaded model {} in {:.0}ms ({intra_threads} intra-op threads)",
            kind,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self { kind, session })
    }

    fn infer(&mut self, input: Array4<f32>) -> Result<Array4<f32>> {
        let input_value = Value::from_array(input).map_err(|e| {
            NoBgError::segmentation(format!("Failed to convert input tensor: {e}"))
        })?;

        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|e| NoBgError::segmentation(format!("ONNX inference failed: {e}")))?;

        // Positional access: the first output is the finest-scale prediction
        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| NoBgError::segmentation("No output tensors found"))?;
        let output = outputs
            .get(first_key)
            .ok_or_else(|| NoBgError::segmentation("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| {
                NoBgError::segmentation(format!("Failed to extract output tensor: {e}"))
            })?;

        let shape = output.shape().to_vec();
        match shape.as_slice() {
            [n, c, h, w] => Array4::from_shape_vec((*n, *c, *h, *w), output.iter().copied().collect())
                .map_err(|e| {
                    NoBgError::segmentation(format!("Failed to reshape output tensor: {e}"))
                }),
            _ => Err(NoBgError::segmentation(format!(
                "Expected 4D output tensor, got {}D",
                shape.len()
            ))),
        }
    }
}

impl SegmentationGateway for OnnxSegmenter {
    fn model(&self) -> ModelKind {
        self.kind
    }

    fn segment(&mut self, image: &DynamicImage) -> Result<RgbaImage> {
        let _span = crate::tracing_config::spans::inference(
            self.kind.token(),
            (image.width(), image.height()),
        )
        .entered();
        let start = Instant::now();

        let input = preprocess(image, self.kind);
        let prediction = self.infer(input)?;
        let mask = mask_from_prediction(prediction.view(), image.width(), image.height())?;
        let cutout = apply_mask(image, &mask)?;

        log::debug!(
            "Segmented {}x{} in {:.2}ms",
            image.width(),
            image.height(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(cutout)
    }
}
