//! Eye-center detector backed by a YOLO-pose face model via `ort`.
//!
//! Runs letterbox preprocessing, inference and NMS, keeps the top-ranked
//! face and reduces its eye keypoints to a single anchor.

use std::cmp::Ordering;
use std::path::Path;

use crate::detection::domain::anchor_point::AnchorPoint;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::detection::infrastructure::execution_provider::platform_execution_providers;
use crate::shared::frame::Frame;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for the face box.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Default minimum keypoint confidence for a landmark to count as visible.
pub const DEFAULT_KEYPOINT_CONFIDENCE: f64 = 0.5;

const NMS_IOU_THRESH: f64 = 0.45;

/// 5 landmarks × (x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

pub struct OnnxLandmarkDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxLandmarkDetector {
    /// Load a YOLO-pose ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's NCHW input shape,
    /// falling back to 640 when the shape is dynamic.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .with_execution_providers(platform_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { ref shape, .. }
                    if shape.len() >= 4 && shape[2] > 0 =>
                {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::debug!(
            "Loaded landmark model {} (input {input_size}px)",
            model_path.display()
        );

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }

    fn run(&mut self, frame: &Frame) -> Result<Vec<Candidate>, Box<dyn std::error::Error>> {
        let (input, lb) = letterbox(frame, self.input_size);
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("landmark model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("unexpected landmark model output shape: {shape:?}").into());
        }

        // Either [1, features, detections] or [1, detections, features].
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        let data = tensor.as_slice().ok_or("landmark output is not contiguous")?;
        let value = |det: usize, feat: usize| -> f64 {
            if transposed {
                data[feat * num_dets + det] as f64
            } else {
                data[det * num_feats + feat] as f64
            }
        };

        let mut candidates = Vec::new();
        for i in 0..num_dets {
            if num_feats < 5 {
                break;
            }
            let conf = value(i, 4);
            if conf < self.confidence {
                continue;
            }

            let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
            let (x1, y1) = lb.to_frame(cx - w / 2.0, cy - h / 2.0);
            let (x2, y2) = lb.to_frame(cx + w / 2.0, cy + h / 2.0);

            let landmarks = (num_feats >= 5 + NUM_KEYPOINT_VALUES).then(|| {
                let mut pts = [(0.0f64, 0.0f64); 5];
                for (k, pt) in pts.iter_mut().enumerate() {
                    let base = 5 + k * 3;
                    if value(i, base + 2) >= DEFAULT_KEYPOINT_CONFIDENCE {
                        *pt = lb.to_frame(value(i, base), value(i, base + 1));
                    }
                    // else stays (0, 0): invisible to FaceLandmarks
                }
                FaceLandmarks::new(pts)
            });

            candidates.push(Candidate {
                bbox: [x1, y1, x2, y2],
                confidence: conf,
                landmarks,
            });
        }

        Ok(nms(candidates, NMS_IOU_THRESH))
    }
}

impl LandmarkDetector for OnnxLandmarkDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<AnchorPoint>, Box<dyn std::error::Error>> {
        let candidates = self.run(frame)?;
        let anchor = select_primary(&candidates)
            .and_then(|c| c.landmarks.as_ref())
            .and_then(FaceLandmarks::eye_center);
        if anchor.is_none() && !candidates.is_empty() {
            log::trace!("frame {}: face found without an eye pair", frame.index());
        }
        Ok(anchor)
    }
}

// ---------------------------------------------------------------------------
// Candidate selection
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Candidate {
    bbox: [f64; 4],
    confidence: f64,
    landmarks: Option<FaceLandmarks>,
}

/// The face to stabilize on: highest confidence, ties broken by leftmost box.
fn select_primary(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().min_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then(a.bbox[0].partial_cmp(&b.bbox[0]).unwrap_or(Ordering::Equal))
    })
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Mapping from letterboxed model space back to frame pixels.
#[derive(Clone, Copy, Debug)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn to_frame(self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Letterbox-resize a frame into a `target_size` square NCHW float tensor.
///
/// Padding uses YOLO's 114 gray; sampling is nearest-neighbor. Frames with
/// fewer than 3 channels replicate channel 0.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let size = target_size as usize;
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, size, size), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let channels = frame.channels() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            for c in 0..3 {
                let sc = if c < channels { c } else { 0 };
                tensor[[0, c, pad_y as usize + y, pad_x as usize + x]] =
                    src[[src_y, src_x, sc]] as f32 / 255.0;
            }
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

/// Greedy NMS: confidence descending, suppress boxes overlapping a kept one.
fn nms(mut dets: Vec<Candidate>, iou_thresh: f64) -> Vec<Candidate> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for det in dets {
        if keep.iter().all(|k| bbox_iou(&k.bbox, &det.bbox) <= iou_thresh) {
            keep.push(det);
        }
    }
    keep
}

fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}
