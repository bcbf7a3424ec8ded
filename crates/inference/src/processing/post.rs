use common::span_debug;
use ndarray::ArrayViewD;
use std::cmp::Ordering;

/// Letterbox geometry used to map network-space boxes back to source pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub orig_width: u32,
    pub orig_height: u32,
    pub input_width: u32,
    pub input_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// One surviving prediction, in original image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u32,
}

impl ScoredBox {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &ScoredBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Decodes YOLO detection heads (`[1, 4 + num_classes, num_anchors]`, boxes as
/// cxcywh in input pixels, per-class scores already activated).
///
/// Output is ordered by descending confidence.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    pub candidate_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl PostProcessor {
    pub fn new(candidate_threshold: f32, iou_threshold: f32, max_detections: usize) -> Self {
        Self {
            candidate_threshold,
            iou_threshold,
            max_detections,
        }
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn parse_detections(
        &self,
        output: &ArrayViewD<f32>,
        transform: &TransformParams,
    ) -> anyhow::Result<Vec<ScoredBox>> {
        let shape = output.shape();
        if shape.len() != 3 || shape[0] != 1 {
            anyhow::bail!("Unexpected output shape {:?}, expected [1, C, N]", shape);
        }

        let (num_channels, num_anchors) = (shape[1], shape[2]);

        if num_channels <= 4 {
            anyhow::bail!(
                "Output has {} channels, expected 4 box coordinates plus class scores",
                num_channels
            );
        }

        let mut candidates = Vec::new();

        for i in 0..num_anchors {
            let mut confidence = f32::NEG_INFINITY;
            let mut class_idx = 0usize;
            for c in 4..num_channels {
                let score = output[[0, c, i]];
                if score > confidence {
                    confidence = score;
                    class_idx = c - 4;
                }
            }

            if confidence <= self.candidate_threshold {
                continue;
            }

            let (x1, y1, x2, y2) = cxcywh_to_xyxy(
                output[[0, 0, i]],
                output[[0, 1, i]],
                output[[0, 2, i]],
                output[[0, 3, i]],
            );

            candidates.push(ScoredBox {
                x1,
                y1,
                x2,
                y2,
                confidence,
                class_id: class_idx as u32,
            });
        }

        let num_candidates = candidates.len();
        let kept = non_max_suppression(candidates, self.iou_threshold, self.max_detections);

        tracing::debug!(
            num_anchors,
            num_candidates,
            num_kept = kept.len(),
            "Decoded detections"
        );

        Ok(kept
            .into_iter()
            .map(|det| to_image_space(det, transform))
            .collect())
    }
}

/// Greedy per-class NMS. Ties keep the earlier prediction first.
pub fn non_max_suppression(
    mut candidates: Vec<ScoredBox>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<ScoredBox> {
    let _s = span_debug!("non_max_suppression");

    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<ScoredBox> = Vec::new();

    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }

        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold
        });

        if !suppressed {
            kept.push(candidate);
        }
    }

    kept
}

/// Undo the letterbox and clamp to the source image.
fn to_image_space(det: ScoredBox, transform: &TransformParams) -> ScoredBox {
    let max_x = transform.orig_width as f32;
    let max_y = transform.orig_height as f32;

    ScoredBox {
        x1: ((det.x1 - transform.offset_x) / transform.scale).clamp(0.0, max_x),
        y1: ((det.y1 - transform.offset_y) / transform.scale).clamp(0.0, max_y),
        x2: ((det.x2 - transform.offset_x) / transform.scale).clamp(0.0, max_x),
        y2: ((det.y2 - transform.offset_y) / transform.scale).clamp(0.0, max_y),
        ..det
    }
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    let x2 = cx + w / 2.0;
    let y2 = cy + h / 2.0;
    (x1, y1, x2, y2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn test_postprocessor() -> PostProcessor {
        PostProcessor::new(0.25, 0.7, 300)
    }

    /// Identity transform for a 640x640 source
    fn identity_transform() -> TransformParams {
        TransformParams {
            orig_width: 640,
            orig_height: 640,
            input_width: 640,
            input_height: 640,
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    /// Build a channels-first head `[1, 4 + num_classes, n]`.
    /// Each prediction is (cxcywh box, class index, score); all other scores are 0.
    fn create_yolo_output(
        predictions: &[([f32; 4], usize, f32)],
        num_classes: usize,
    ) -> Array<f32, IxDyn> {
        let n = predictions.len();
        let channels = 4 + num_classes;
        let mut data = vec![0.0f32; channels * n];

        for (i, (bbox, class_idx, score)) in predictions.iter().enumerate() {
            for (k, v) in bbox.iter().enumerate() {
                data[k * n + i] = *v;
            }
            data[(4 + class_idx) * n + i] = *score;
        }

        Array::from_shape_vec(IxDyn(&[1, channels, n]), data).unwrap()
    }

    #[test]
    fn test_cxcywh_to_xyxy() {
        let (x1, y1, x2, y2) = cxcywh_to_xyxy(100.0, 50.0, 40.0, 20.0);
        assert_eq!((x1, y1, x2, y2), (80.0, 40.0, 120.0, 60.0));
    }

    #[test]
    fn test_iou() {
        let a = ScoredBox {
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
            confidence: 1.0,
            class_id: 0,
        };
        let b = ScoredBox {
            x1: 5.0,
            x2: 15.0,
            ..a
        };
        let far = ScoredBox {
            x1: 50.0,
            x2: 60.0,
            ..a
        };

        // overlap 5x10 = 50, union 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(a.iou(&far), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_candidate_threshold_filtering() {
        let output = create_yolo_output(
            &[
                ([100.0, 100.0, 20.0, 20.0], 0, 0.2),
                ([300.0, 300.0, 20.0, 20.0], 1, 0.25),
                ([500.0, 500.0, 20.0, 20.0], 2, 0.8),
            ],
            3,
        );

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &identity_transform())
            .unwrap();

        assert_eq!(detections.len(), 1, "Scores at or below 0.25 are dropped");
        assert_eq!(detections[0].class_id, 2);
        assert!((detections[0].confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_class_id_argmax() {
        let n = 1;
        let num_classes = 4;
        let mut data = vec![0.0f32; (4 + num_classes) * n];
        data[0] = 320.0;
        data[1] = 320.0;
        data[2] = 50.0;
        data[3] = 50.0;
        data[4] = 0.3;
        data[5] = 0.9;
        data[6] = 0.6;
        data[7] = 0.1;
        let output = Array::from_shape_vec(IxDyn(&[1, 4 + num_classes, n]), data).unwrap();

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &identity_transform())
            .unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 1, "Highest scoring class wins");
        assert!((detections[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_output_sorted_by_confidence() {
        let output = create_yolo_output(
            &[
                ([100.0, 100.0, 20.0, 20.0], 0, 0.5),
                ([300.0, 300.0, 20.0, 20.0], 0, 0.9),
                ([500.0, 500.0, 20.0, 20.0], 0, 0.7),
            ],
            1,
        );

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &identity_transform())
            .unwrap();

        let confidences: Vec<f32> = detections.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.7, 0.5]);
    }

    #[test]
    fn test_nms_suppresses_overlapping_same_class() {
        let output = create_yolo_output(
            &[
                ([100.0, 100.0, 40.0, 40.0], 0, 0.9),
                ([102.0, 101.0, 40.0, 40.0], 0, 0.8),
                ([102.0, 101.0, 40.0, 40.0], 1, 0.7),
            ],
            2,
        );

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &identity_transform())
            .unwrap();

        assert_eq!(detections.len(), 2, "Duplicate of class 0 should be suppressed");
        assert_eq!(detections[0].class_id, 0);
        assert!((detections[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(detections[1].class_id, 1, "Other classes are not suppressed");
    }

    #[test]
    fn test_max_detections_cap() {
        let predictions: Vec<_> = (0..10)
            .map(|i| ([30.0 + 60.0 * i as f32, 30.0, 20.0, 20.0], 0, 0.5 + i as f32 * 0.01))
            .collect();
        let output = create_yolo_output(&predictions, 1);

        let detections = PostProcessor::new(0.25, 0.7, 3)
            .parse_detections(&output.view(), &identity_transform())
            .unwrap();

        assert_eq!(detections.len(), 3);
        assert!((detections[0].confidence - 0.59).abs() < 1e-6);
    }

    #[test]
    fn test_coordinate_inverse_transformation() {
        // Original 800x600 letterboxed into 640x640:
        // scale 0.8, resized 640x480, offset_y 80
        let transform = TransformParams {
            orig_width: 800,
            orig_height: 600,
            input_width: 640,
            input_height: 640,
            scale: 0.8,
            offset_x: 0.0,
            offset_y: 80.0,
        };

        // cxcywh (320, 320, 160, 160) -> xyxy (240, 240, 400, 400)
        // x: 240 / 0.8 = 300, 400 / 0.8 = 500
        // y: (240 - 80) / 0.8 = 200, (400 - 80) / 0.8 = 400
        let output = create_yolo_output(&[([320.0, 320.0, 160.0, 160.0], 0, 0.95)], 1);

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &transform)
            .unwrap();

        let d = detections[0];
        assert!((d.x1 - 300.0).abs() < 0.01, "x1 = {}", d.x1);
        assert!((d.y1 - 200.0).abs() < 0.01, "y1 = {}", d.y1);
        assert!((d.x2 - 500.0).abs() < 0.01, "x2 = {}", d.x2);
        assert!((d.y2 - 400.0).abs() < 0.01, "y2 = {}", d.y2);
    }

    #[test]
    fn test_coordinates_clamped_to_image_bounds() {
        let transform = TransformParams {
            orig_width: 800,
            orig_height: 600,
            input_width: 640,
            input_height: 640,
            scale: 0.8,
            offset_x: 0.0,
            offset_y: 80.0,
        };

        // Box reaching into the top padding band and past the right edge
        let output = create_yolo_output(&[([630.0, 90.0, 40.0, 40.0], 0, 0.9)], 1);

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &transform)
            .unwrap();

        let d = detections[0];
        assert_eq!(d.y1, 0.0, "y1 clamped to 0");
        assert_eq!(d.x2, 800.0, "x2 clamped to width");
        assert!(d.x1 <= d.x2 && d.y1 <= d.y2);
    }

    #[test]
    fn test_empty_input() {
        let output = Array::from_shape_vec(IxDyn(&[1, 6, 0]), vec![]).unwrap();

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &identity_transform())
            .unwrap();

        assert!(detections.is_empty());
    }

    #[test]
    fn test_rejects_unexpected_shape() {
        let output = Array::from_shape_vec(IxDyn(&[8400, 84]), vec![0.0; 8400 * 84]).unwrap();

        let result = test_postprocessor().parse_detections(&output.view(), &identity_transform());

        assert!(result.is_err());
    }

    #[test]
    fn test_realistic_yolo_output() {
        // 84 channels (80 COCO classes), 8400 anchors, two real objects
        let num_anchors = 8400;
        let num_classes = 80;
        let channels = 4 + num_classes;
        let mut data = vec![0.001f32; channels * num_anchors];

        let mut put = |anchor: usize, bbox: [f32; 4], class_idx: usize, score: f32| {
            for (k, v) in bbox.iter().enumerate() {
                data[k * num_anchors + anchor] = *v;
            }
            data[(4 + class_idx) * num_anchors + anchor] = score;
        };

        // person, plus two near-duplicate anchors around it
        put(100, [200.0, 300.0, 100.0, 250.0], 0, 0.88);
        put(101, [201.0, 302.0, 98.0, 248.0], 0, 0.81);
        put(102, [199.0, 299.0, 101.0, 251.0], 0, 0.42);
        // car elsewhere
        put(5000, [500.0, 450.0, 160.0, 90.0], 2, 0.67);

        let output = Array::from_shape_vec(IxDyn(&[1, channels, num_anchors]), data).unwrap();

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &identity_transform())
            .unwrap();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].class_id, 0);
        assert!((detections[0].confidence - 0.88).abs() < 1e-6);
        assert_eq!(detections[1].class_id, 2);
    }
}
