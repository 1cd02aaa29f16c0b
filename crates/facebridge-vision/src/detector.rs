//! SCRFD face detector via ONNX Runtime.
//!
//! Runs the same SCRFD model at two input resolutions: 640×640 for the
//! standard variant and 320×320 for the fast one. Decodes the three stride
//! levels, applies NMS and keeps the most confident face.

use facebridge_core::DetectorVariant;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

/// Square input edge for each detector variant.
pub fn input_size(variant: DetectorVariant) -> usize {
    match variant {
        DetectorVariant::Standard => 640,
        DetectorVariant::Tiny => 320,
    }
}

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("image is empty")]
    EmptyImage,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A detected face in source image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// [left_eye, right_eye, nose, left_mouth, right_mouth]
    pub landmarks: [(f32, f32); 5],
}

/// Scale and padding applied when fitting the image into the model input.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// (score, bbox, kps) output positions for one stride.
type StrideOutputIndices = (usize, usize, usize);

pub struct FaceDetector {
    session: Session,
    stride_indices: [StrideOutputIndices; 3],
}

impl FaceDetector {
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        tracing::info!(
            path = %model_path.display(),
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        if output_names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides × score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            stride_indices,
        })
    }

    /// Detect the single most confident face, if any.
    pub fn detect_best(
        &mut self,
        image: &RgbImage,
        variant: DetectorVariant,
    ) -> Result<Option<FaceBox>, DetectorError> {
        let faces = self.detect(image, input_size(variant))?;
        Ok(faces.into_iter().next())
    }

    /// Detect all faces, sorted by descending confidence.
    pub fn detect(&mut self, image: &RgbImage, size: usize) -> Result<Vec<FaceBox>, DetectorError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DetectorError::EmptyImage);
        }
        let (input, letterbox) = preprocess(image, size);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx, kps_idx) = self.stride_indices[pos];
            let extract = |idx: usize, what: &str| {
                outputs[idx]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data)
                    .map_err(|e| DetectorError::InferenceFailed(format!("{what} stride {stride}: {e}")))
            };
            let scores = extract(score_idx, "scores")?;
            let bboxes = extract(bbox_idx, "bboxes")?;
            let kps = extract(kps_idx, "kps")?;

            candidates.extend(decode_stride(scores, bboxes, kps, stride, size, &letterbox));
        }

        Ok(nms(candidates, SCRFD_NMS_THRESHOLD))
    }
}

/// Letterbox an RGB image into a normalized 1×3×size×size tensor.
fn preprocess(image: &RgbImage, size: usize) -> (Array4<f32>, Letterbox) {
    let (width, height) = (image.width() as f32, image.height() as f32);
    let scale = (size as f32 / width).min(size as f32 / height);
    let new_w = ((width * scale).round() as u32).clamp(1, size as u32);
    let new_h = ((height * scale).round() as u32).clamp(1, size as u32);
    let pad_x = (size as u32 - new_w) / 2;
    let pad_y = (size as u32 - new_h) / 2;

    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    // Zero is the normalized value of the padding colour (SCRFD_MEAN).
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (tx, ty) = ((x + pad_x) as usize, (y + pad_y) as usize);
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (pixel[c] as f32 - SCRFD_MEAN) / SCRFD_STD;
        }
    }

    let letterbox = Letterbox {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
    };
    (tensor, letterbox)
}

/// Map output names like `score_8` / `bbox_16` / `kps_32` to stride slots.
///
/// Exports with generic tensor names fall back to the standard positional
/// layout: scores at 0..3, bboxes at 3..6, kps at 6..9.
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == target)
    };
    let slot = |stride: usize| Some((find("score", stride)?, find("bbox", stride)?, find("kps", stride)?));

    match (slot(SCRFD_STRIDES[0]), slot(SCRFD_STRIDES[1]), slot(SCRFD_STRIDES[2])) {
        (Some(s8), Some(s16), Some(s32)) => [s8, s16, s32],
        _ => {
            tracing::info!(?names, "SCRFD: output names not recognized, using positional mapping");
            [(0, 3, 6), (1, 4, 7), (2, 5, 8)]
        }
    }
}

/// Decode anchors above the confidence threshold for one stride level.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    size: usize,
    letterbox: &Letterbox,
) -> Vec<FaceBox> {
    let grid = size / stride;
    let anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
    let step = stride as f32;

    let mut faces = Vec::new();
    for idx in 0..anchors.min(scores.len()) {
        let score = scores[idx];
        if score <= SCRFD_CONFIDENCE_THRESHOLD {
            continue;
        }
        let (Some(b), Some(k)) = (bboxes.get(idx * 4..idx * 4 + 4), kps.get(idx * 10..idx * 10 + 10)) else {
            continue;
        };

        let cell = idx / SCRFD_ANCHORS_PER_CELL;
        let cx = (cell % grid) as f32 * step;
        let cy = (cell / grid) as f32 * step;

        let (x1, y1) = letterbox.unmap(cx - b[0] * step, cy - b[1] * step);
        let (x2, y2) = letterbox.unmap(cx + b[2] * step, cy + b[3] * step);
        let landmarks: [(f32, f32); 5] =
            std::array::from_fn(|i| letterbox.unmap(cx + k[i * 2] * step, cy + k[i * 2 + 1] * step));

        faces.push(FaceBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks,
        });
    }
    faces
}

/// Greedy non-maximum suppression; output is sorted by confidence.
fn nms(mut faces: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    faces.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<FaceBox> = Vec::new();
    for face in faces {
        if keep.iter().all(|kept| iou(kept, &face) <= iou_threshold) {
            keep.push(face);
        }
    }
    keep
}

fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let inter_w = ((a.x + a.width).min(b.x + b.width) - a.x.max(b.x)).max(0.0);
    let inter_h = ((a.y + a.height).min(b.y + b.height) - a.y.max(b.y)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
