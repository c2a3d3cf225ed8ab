use ndarray::{Array, ArrayD, IxDyn};
use preprocess::InputLayout;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// Runs a YOLO model on a preprocessed input tensor.
///
/// Implementations own the runtime session. Everything before (resize,
/// normalisation) and after (decode, NMS) lives in this crate.
pub trait InferenceBackend {
    fn load_model(path: &str) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run inference on a `[1, S, S, 3]` or `[1, 3, S, S]` input
    fn infer(&mut self, input: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput>;

    /// Output shape reported by the loaded model, when the runtime exposes it
    fn output_shape(&self) -> Option<Vec<usize>> {
        None
    }

    /// Input layout the runtime expects, when fixed by the model format
    fn input_layout(&self) -> Option<InputLayout> {
        None
    }
}

pub struct InferenceOutput {
    pub output: ArrayD<f32>, // [1, 4 + C, N] transposed or [1, N, 4 + C] standard
}
