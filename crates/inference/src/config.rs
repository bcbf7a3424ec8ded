use common::{env_opt, env_or};
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;
pub const DEFAULT_CANDIDATE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
pub const DEFAULT_MAX_DETECTIONS: usize = 300;
pub const MAX_INPUT_SIZE: u32 = 8192;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be a number, got `{value}`")]
    NotANumber { key: &'static str, value: String },

    #[error("{key} must be within [0, 1], got {value}")]
    OutOfRange { key: &'static str, value: f32 },

    #[error("INPUT_SIZE must be within [1, 8192], got {0}")]
    InputSizeOutOfRange(u32),

    #[error("{0} is not a supported execution provider. Use either `cpu` or `cuda`.")]
    UnknownProvider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
}

impl ExecutionProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionProvider::Cpu => "cpu",
            ExecutionProvider::Cuda => "cuda",
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub model_path: String,
    pub labels_path: Option<String>,
    pub input_size: (u32, u32),
    /// Minimum confidence for a detection to count as verified.
    pub confidence_threshold: f32,
    /// Minimum score for a raw prediction to enter NMS.
    pub candidate_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub execution_provider: ExecutionProvider,
    pub intra_threads: usize,
}

impl InferenceConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let model_path =
            env::var("MODEL_PATH").unwrap_or_else(|_| "models/best.onnx".to_string());

        let labels_path = env_opt("LABELS_PATH");

        let input_size = input_size_from_env()?;

        let confidence_threshold =
            unit_interval_from_env("CONF_THRESHOLD", DEFAULT_CONFIDENCE_THRESHOLD)?;
        let candidate_threshold =
            unit_interval_from_env("CANDIDATE_THRESHOLD", DEFAULT_CANDIDATE_THRESHOLD)?;
        let iou_threshold = unit_interval_from_env("IOU_THRESHOLD", DEFAULT_IOU_THRESHOLD)?;

        let max_detections = env_or("MAX_DETECTIONS", DEFAULT_MAX_DETECTIONS);

        let execution_provider = match env_opt("EXECUTION_PROVIDER") {
            Some(value) => value.parse()?,
            None => ExecutionProvider::Cpu,
        };

        let intra_threads = env_or("INTRA_THREADS", 4);

        Ok(Self {
            model_path,
            labels_path,
            input_size: (input_size, input_size),
            confidence_threshold,
            candidate_threshold,
            iou_threshold,
            max_detections,
            execution_provider,
            intra_threads,
        })
    }

    /// Create default configuration for testing
    pub fn test_default() -> Self {
        Self {
            model_path: "models/best.onnx".to_string(),
            labels_path: None,
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            candidate_threshold: DEFAULT_CANDIDATE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
            execution_provider: ExecutionProvider::Cpu,
            intra_threads: 1,
        }
    }
}

/// Unset keys fall back to `default`; unparseable or out-of-range values are errors.
fn unit_interval_from_env(key: &'static str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = env_opt(key) else {
        return Ok(default);
    };

    let value: f32 = raw.trim().parse().map_err(|_| ConfigError::NotANumber {
        key,
        value: raw.clone(),
    })?;

    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::OutOfRange { key, value });
    }

    Ok(value)
}

fn input_size_from_env() -> Result<u32, ConfigError> {
    let Some(raw) = env_opt("INPUT_SIZE") else {
        return Ok(DEFAULT_INPUT_SIZE.0);
    };

    let value: u32 = raw.trim().parse().map_err(|_| ConfigError::NotANumber {
        key: "INPUT_SIZE",
        value: raw.clone(),
    })?;

    if !(1..=MAX_INPUT_SIZE).contains(&value) {
        return Err(ConfigError::InputSizeOutOfRange(value));
    }

    Ok(value)
}
