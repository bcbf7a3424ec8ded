use super::{InferenceBackend, InferenceOutput};
use crate::config::{ExecutionProvider, InferenceConfig};
use crate::labels::LabelMap;
use ndarray::{Array, IxDyn};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};

/// Tensor names produced by the standard YOLO ONNX export.
const INPUT_NAME: &str = "images";
const OUTPUT_NAME: &str = "output0";
const NAMES_METADATA_KEY: &str = "names";

pub struct OrtBackend {
    session: Session,
    class_names: Option<LabelMap>,
}

impl OrtBackend {
    /// Load model with specified execution provider
    pub fn load_model_with_provider(
        path: &str,
        provider: ExecutionProvider,
        intra_threads: usize,
    ) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        #[cfg_attr(not(feature = "cuda"), allow(unused_mut))]
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?;

        match provider {
            #[cfg(feature = "cuda")]
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            #[cfg(not(feature = "cuda"))]
            ExecutionProvider::Cuda => {
                anyhow::bail!("CUDA execution provider requested but the `cuda` feature is disabled");
            }
            ExecutionProvider::Cpu => {
                tracing::info!(intra_threads, "Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder.commit_from_file(path)?;
        let class_names = read_class_names(&session);

        tracing::info!(
            num_classes = class_names.as_ref().map(LabelMap::len),
            "Model loaded from {}",
            path
        );
        Ok(Self {
            session,
            class_names,
        })
    }
}

/// Class names from the export's custom metadata. A model without them, or
/// with an unreadable entry, still loads and reports numeric labels.
fn read_class_names(session: &Session) -> Option<LabelMap> {
    let raw = match session
        .metadata()
        .and_then(|metadata| Ok(metadata.custom(NAMES_METADATA_KEY)))
    {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            tracing::warn!("Model metadata has no class names, labels fall back to class indices");
            return None;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read model metadata");
            return None;
        }
    };

    match LabelMap::from_metadata(&raw) {
        Ok(labels) => Some(labels),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed class names in model metadata");
            None
        }
    }
}

impl InferenceBackend for OrtBackend {
    fn load_model(config: &InferenceConfig) -> anyhow::Result<Self> {
        Self::load_model_with_provider(
            &config.model_path,
            config.execution_provider,
            config.intra_threads,
        )
    }

    fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
        let outputs = self.session.run(ort::inputs![
            INPUT_NAME => TensorRef::from_array_view(images.view())?
        ])?;

        let predictions = outputs[OUTPUT_NAME].try_extract_array::<f32>()?;

        Ok(InferenceOutput {
            predictions: predictions.into_owned(),
        })
    }

    fn class_names(&self) -> Option<LabelMap> {
        self.class_names.clone()
    }
}
