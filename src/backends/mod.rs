//! Segmentation gateway implementations
//!
//! - ONNX Runtime gateway (feature `onnx`) running U2-Net family models
//! - Mock gateway for tests

#[cfg(feature = "onnx")]
pub mod onnx;

// Test utilities for gateway testing
#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxSegmenter;
