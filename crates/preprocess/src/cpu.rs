use crate::{DEFAULT_INPUT_SIZE, InputLayout, Preprocess};
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use ndarray::{Array, IxDyn};

/// Stretch-resizes frames to the model resolution and scales pixels to `[0, 1]`.
///
/// No letterboxing: the detector normalises box coordinates against the full
/// input square, so the aspect-ratio distortion is undone when boxes are mapped
/// back onto the camera image.
pub struct CpuPreProcessor {
    input_size: u32,
    layout: InputLayout,
    resizer: Resizer,
}

impl CpuPreProcessor {
    pub fn new(input_size: u32, layout: InputLayout) -> Self {
        Self {
            input_size,
            layout,
            resizer: Resizer::new(),
        }
    }

    pub fn layout(&self) -> InputLayout {
        self.layout
    }

    fn resize(&mut self, pixels: &[u8], width: u32, height: u32) -> anyhow::Result<Vec<u8>> {
        let _s = span!("resize_frame");

        if width == self.input_size && height == self.input_size {
            return Ok(pixels.to_vec());
        }

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;
        let mut resized = Image::new(self.input_size, self.input_size, PixelType::U8x3);

        self.resizer.resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        Ok(resized.buffer().to_vec())
    }

    fn normalize(&self, rgb: &[u8]) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span!("normalize");

        let side = self.input_size as usize;
        let spatial = side * side;
        let mut output = vec![0.0f32; 3 * spatial];

        match self.layout {
            InputLayout::Nhwc => {
                for (dst, src) in output.iter_mut().zip(rgb) {
                    *dst = *src as f32 / 255.0;
                }
                Ok(Array::from_shape_vec(IxDyn(&[1, side, side, 3]), output)?)
            }
            InputLayout::Nchw => {
                for (i, px) in rgb.chunks_exact(3).enumerate() {
                    output[i] = px[0] as f32 / 255.0;
                    output[i + spatial] = px[1] as f32 / 255.0;
                    output[i + 2 * spatial] = px[2] as f32 / 255.0;
                }
                Ok(Array::from_shape_vec(IxDyn(&[1, 3, side, side]), output)?)
            }
        }
    }
}

impl Default for CpuPreProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE, InputLayout::default())
    }
}

impl Preprocess for CpuPreProcessor {
    fn preprocess(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<Array<f32, IxDyn>> {
        tracing::trace!(
            width,
            height,
            pixel_bytes = pixels.len(),
            "Preprocessing frame dimensions"
        );

        if width == 0 || height == 0 {
            anyhow::bail!("Invalid frame dimensions: {}x{}", width, height);
        }

        let expected_size = width as usize * height as usize * 3;
        if pixels.len() != expected_size {
            anyhow::bail!(
                "Buffer size mismatch: expected {}, got {} bytes",
                expected_size,
                pixels.len()
            );
        }

        let resized = self.resize(pixels, width, height)?;
        self.normalize(&resized)
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }
}
