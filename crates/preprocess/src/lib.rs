pub mod cpu;

use ndarray::{Array, IxDyn};
use std::str::FromStr;

pub use cpu::CpuPreProcessor;

/// Square input resolution of the bundled YOLOv8 export.
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Memory layout of the model input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputLayout {
    /// `[1, H, W, 3]`, used by TFLite exports
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`, used by ONNX exports
    Nchw,
}

impl FromStr for InputLayout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nhwc" => Ok(InputLayout::Nhwc),
            "nchw" => Ok(InputLayout::Nchw),
            other => anyhow::bail!("Unknown input layout: {}", other),
        }
    }
}

/// Trait for image preprocessing implementations
pub trait Preprocess {
    /// Convert a decoded RGB frame (HWC, 3 bytes per pixel) into a model input tensor.
    ///
    /// Fails on zero dimensions or when `pixels` does not hold exactly
    /// `width * height * 3` bytes.
    fn preprocess(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<Array<f32, IxDyn>>;

    /// Get the square input size this preprocessor targets
    fn input_size(&self) -> u32;
}
