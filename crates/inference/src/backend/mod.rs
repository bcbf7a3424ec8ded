use crate::config::InferenceConfig;
use crate::labels::LabelMap;
use ndarray::{Array, ArrayD, IxDyn};

#[cfg(feature = "ort-backend")]
pub mod ort;

/// A loaded detection network.
///
/// `infer` takes `&mut self` because runtime sessions need exclusive access
/// while running; callers that share a backend wrap it in a lock.
pub trait InferenceBackend: Send {
    fn load_model(config: &InferenceConfig) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run the network on a `[1, 3, H, W]` input
    fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput>;

    /// Class names embedded in the model artifact, if it carries any.
    fn class_names(&self) -> Option<LabelMap> {
        None
    }
}

pub struct InferenceOutput {
    pub predictions: ArrayD<f32>, // [1, 4 + num_classes, num_anchors], cxcywh in input pixels
}
