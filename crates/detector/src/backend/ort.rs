use super::{InferenceBackend, InferenceOutput};
use ndarray::{Array, IxDyn};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use preprocess::InputLayout;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionProvider {
    #[default]
    Cpu,
    Cuda,
}

impl FromStr for ExecutionProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(ExecutionProvider::Cpu),
            "cuda" | "gpu" => Ok(ExecutionProvider::Cuda),
            other => anyhow::bail!("Unknown execution provider: {}", other),
        }
    }
}

/// ONNX Runtime session for a YOLOv8 ONNX export (`[1, 3, S, S]` input).
pub struct OrtBackend {
    session: Session,
    output_shape: Option<Vec<usize>>,
}

impl OrtBackend {
    /// Load a model with the given execution provider.
    ///
    /// The session builder sets up the default ORT environment on first use.
    pub fn load_model_with_provider(
        path: &str,
        provider: ExecutionProvider,
        intra_threads: usize,
    ) -> anyhow::Result<Self> {
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?;

        if provider == ExecutionProvider::Cuda {
            builder = builder.with_execution_providers([
                ort::execution_providers::CUDAExecutionProvider::default()
                    .with_device_id(0)
                    .build(),
            ])?;
        }

        let session = builder.commit_from_file(path)?;

        tracing::info!(path, provider = ?provider, intra_threads, "YOLO model loaded");
        Ok(Self {
            session,
            output_shape: None,
        })
    }

    /// Run one blank frame through the session and remember the output
    /// shape it produced.
    ///
    /// Call before handing the backend to `Detector::new` so the tensor
    /// layout comes from the model rather than the configuration.
    pub fn warm_up(&mut self, input_size: u32) -> anyhow::Result<Vec<usize>> {
        let side = input_size as usize;
        let input = Array::<f32, _>::zeros(IxDyn(&[1, 3, side, side]));
        let output = self.infer(&input)?;
        let shape = output.output.shape().to_vec();

        tracing::info!(input_size, output_shape = ?shape, "Model warmed up");
        self.output_shape = Some(shape.clone());
        Ok(shape)
    }
}

impl InferenceBackend for OrtBackend {
    fn load_model(path: &str) -> anyhow::Result<Self> {
        Self::load_model_with_provider(path, ExecutionProvider::Cpu, 4)
    }

    fn infer(&mut self, input: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let output = outputs[0].try_extract_array::<f32>()?;

        Ok(InferenceOutput {
            output: output.into_owned(),
        })
    }

    fn output_shape(&self) -> Option<Vec<usize>> {
        self.output_shape.clone()
    }

    fn input_layout(&self) -> Option<InputLayout> {
        Some(InputLayout::Nchw)
    }
}
