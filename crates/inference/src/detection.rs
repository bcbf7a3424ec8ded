use serde::{Deserialize, Serialize};

/// A labelled object found in an image, bbox as `[x1, y1, x2, y2]` pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

impl Detection {
    pub fn new(label: impl Into<String>, class_id: u32, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            label: label.into(),
            class_id,
            confidence,
            bbox,
        }
    }
}
