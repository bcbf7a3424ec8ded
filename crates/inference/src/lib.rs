pub mod backend;
pub mod config;
pub mod detection;
pub mod detector;
pub mod device;
pub mod image_input;
pub mod labels;
pub mod processing;
pub mod verification;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, InferenceOutput};
pub use config::{ConfigError, ExecutionProvider, InferenceConfig};
pub use detection::Detection;
pub use detector::{Detector, ModelInfo, ObjectDetector};
pub use device::{cuda_available, cuda_device_count};
pub use image_input::{ImageDecodeError, decode_rgb};
pub use labels::LabelMap;
pub use verification::{VerificationResult, verify};

#[cfg(feature = "ort-backend")]
pub use backend::ort::OrtBackend;
