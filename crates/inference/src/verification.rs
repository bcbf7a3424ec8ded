use crate::detection::Detection;
use serde::{Deserialize, Serialize};

/// Outcome of checking one image against the confidence threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verified: bool,
    pub label: Option<String>,
    pub confidence: f32,
    pub bbox: Option<[f32; 4]>,
}

impl VerificationResult {
    pub fn unverified() -> Self {
        Self {
            verified: false,
            label: None,
            confidence: 0.0,
            bbox: None,
        }
    }

    pub fn from_detection(detection: &Detection) -> Self {
        Self {
            verified: true,
            label: Some(detection.label.clone()),
            confidence: round4(detection.confidence),
            bbox: Some(detection.bbox),
        }
    }
}

/// Select the first detection, in the order given, whose confidence meets
/// `threshold`.
///
/// First-match, not best-match. Detectors here emit detections sorted by
/// descending confidence, so the two coincide in practice.
pub fn verify(detections: &[Detection], threshold: f32) -> VerificationResult {
    detections
        .iter()
        .find(|d| d.confidence >= threshold)
        .map(VerificationResult::from_detection)
        .unwrap_or_else(VerificationResult::unverified)
}

fn round4(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}
