use crate::{
    backend::{InferenceBackend, InferenceOutput},
    config::InferenceConfig,
    detection::Detection,
    labels::LabelMap,
    processing::{
        post::PostProcessor,
        pre::{PreProcessor, Preprocessed},
    },
};
use image::RgbImage;
use serde::Serialize;
use std::sync::{Mutex, OnceLock};

/// Static facts about the loaded model, reported by health endpoints.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelInfo {
    pub path: String,
    pub execution_provider: String,
    pub input_size: (u32, u32),
    pub num_classes: Option<usize>,
}

/// Image in, labelled detections out, ordered by descending confidence.
///
/// Implementations are shared across request handlers, hence `Send + Sync`.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> anyhow::Result<Vec<Detection>>;

    fn model_info(&self) -> ModelInfo;
}

pub struct Detector<B: InferenceBackend> {
    backend: Mutex<B>,
    preprocessor: PreProcessor,
    postprocessor: PostProcessor,
    labels: LabelMap,
    info: ModelInfo,
    /// Class count read off the output head when no label table names them.
    observed_classes: OnceLock<usize>,
}

impl<B: InferenceBackend> Detector<B> {
    pub fn new(backend: B, labels: LabelMap, config: &InferenceConfig) -> Self {
        let info = ModelInfo {
            path: config.model_path.clone(),
            execution_provider: config.execution_provider.to_string(),
            input_size: config.input_size,
            num_classes: (!labels.is_empty()).then(|| labels.len()),
        };

        Self {
            backend: Mutex::new(backend),
            preprocessor: PreProcessor::new(config.input_size),
            postprocessor: PostProcessor::new(
                config.candidate_threshold,
                config.iou_threshold,
                config.max_detections,
            ),
            labels,
            info,
            observed_classes: OnceLock::new(),
        }
    }

    /// Load the backend and label table described by `config`.
    ///
    /// A label file overrides the names embedded in the model.
    pub fn load(config: &InferenceConfig) -> anyhow::Result<Self> {
        let backend = B::load_model(config)?;

        let labels = match &config.labels_path {
            Some(path) => LabelMap::load(path)?,
            None => backend.class_names().unwrap_or_default(),
        };

        Ok(Self::new(backend, labels, config))
    }
}

impl<B: InferenceBackend> ObjectDetector for Detector<B> {
    fn detect(&self, image: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        let Preprocessed { input, transform } = self.preprocessor.preprocess(image)?;

        let InferenceOutput { predictions } = {
            let _infer_span = tracing::info_span!("model_inference").entered();
            let mut backend = self
                .backend
                .lock()
                .map_err(|_| anyhow::anyhow!("Inference backend lock poisoned"))?;
            backend.infer(&input)?
        };

        if let [_, channels, _] = predictions.shape() {
            if *channels > 4 {
                let _ = self.observed_classes.set(channels - 4);
            }
        }

        let boxes = self
            .postprocessor
            .parse_detections(&predictions.view(), &transform)?;

        Ok(boxes
            .into_iter()
            .map(|b| {
                Detection::new(
                    self.labels.name(b.class_id),
                    b.class_id,
                    b.confidence,
                    [b.x1, b.y1, b.x2, b.y2],
                )
            })
            .collect())
    }

    fn model_info(&self) -> ModelInfo {
        let mut info = self.info.clone();
        if info.num_classes.is_none() {
            info.num_classes = self.observed_classes.get().copied();
        }
        info
    }
}
