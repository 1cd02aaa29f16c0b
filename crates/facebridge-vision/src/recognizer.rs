//! ArcFace face recognizer via ONNX Runtime.
//!
//! Produces L2-normalized 512-dimensional descriptors from aligned RGB crops
//! (w600k_r50 model). Distances between these descriptors run on a wider
//! scale than 128-value embeddings; see the crate docs.

use crate::alignment::{self, ALIGNED_SIZE};
use crate::detector::FaceBox;
use facebridge_core::Descriptor;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // symmetric, unlike SCRFD's 128
const ARCFACE_DESCRIPTOR_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    /// Align `face` out of `image` and compute its descriptor.
    pub fn extract(&mut self, image: &RgbImage, face: &FaceBox) -> Result<Descriptor, RecognizerError> {
        let aligned = alignment::align_face(image, &face.landmarks);
        let input = preprocess(&aligned);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("descriptor extraction: {e}")))?;

        if raw.len() != ARCFACE_DESCRIPTOR_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {ARCFACE_DESCRIPTOR_DIM}-dim descriptor, got {}",
                raw.len()
            )));
        }

        Ok(Descriptor::new(l2_normalize(raw)))
    }
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}

/// 112×112 RGB crop → normalized 1×3×112×112 tensor.
fn preprocess(aligned: &RgbImage) -> Array4<f32> {
    let size = ALIGNED_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in aligned.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
        }
    }
    tensor
}
