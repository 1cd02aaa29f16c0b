//! facebridge-vision: ONNX-backed recognition capability.
//!
//! SCRFD for detection and ArcFace for descriptors, both via ONNX Runtime on
//! a dedicated inference thread. Images are resolved from data URIs, HTTP(S)
//! URLs or files.
//!
//! # Distance scale
//!
//! Descriptors are unit-length 512-value ArcFace vectors, so the Euclidean
//! distance between two of them lies in `[0, 2]`. Different photos of the
//! same person typically land around 0.8 to 1.1 and different people around
//! 1.2 to 1.4. With the match confidence `100 - 100 * d`, a genuine match
//! therefore scores roughly -10 to 20 and non-matches sit near -20 to -40. Hosts
//! calibrated against 128-value descriptors, where `d` sits between 0 and
//! about 0.6 for the same person, need their own thresholds for this scale.

pub mod alignment;
pub mod detector;
pub mod fetch;
pub mod inference;
pub mod recognizer;

use async_trait::async_trait;
use facebridge_core::{
    CapabilityLoader, Descriptor, Detection, DetectorVariant, ExtractionError, ImageRef, LoadError,
    Recognition,
};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub use detector::FaceDetector;
pub use fetch::ImageFetcher;
pub use inference::{spawn_inference, InferenceHandle};
pub use recognizer::FaceRecognizer;

pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

/// Model directory used when none is configured.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/usr/share/facebridge/models")
}

/// Loaded ONNX recognition capability.
pub struct OnnxRecognition {
    fetcher: ImageFetcher,
    inference: InferenceHandle,
}

#[async_trait]
impl Recognition for OnnxRecognition {
    type Image = Arc<RgbImage>;

    async fn fetch_image(&self, reference: &ImageRef) -> Result<Arc<RgbImage>, ExtractionError> {
        self.fetcher.fetch(reference).await.map(Arc::new)
    }

    async fn detect_single_face(
        &self,
        image: &Arc<RgbImage>,
        variant: DetectorVariant,
    ) -> Result<Option<Detection>, ExtractionError> {
        Ok(self.inference.detect(Arc::clone(image), variant).await?)
    }

    /// Euclidean distance on unit vectors; see the crate docs for its scale.
    fn distance(&self, a: &Descriptor, b: &Descriptor) -> f64 {
        a.euclidean_distance(b)
    }

    fn is_healthy(&self) -> bool {
        self.inference.is_alive()
    }
}

/// Settings for loading [`OnnxRecognition`].
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    pub detector_path: PathBuf,
    pub recognizer_path: PathBuf,
    pub intra_threads: usize,
    pub fetch_timeout: Duration,
    pub max_image_bytes: usize,
}

impl OnnxLoader {
    /// Standard model file names inside `model_dir`, default limits.
    pub fn from_model_dir(model_dir: &Path) -> Self {
        Self {
            detector_path: model_dir.join(DETECTOR_MODEL_FILE),
            recognizer_path: model_dir.join(RECOGNIZER_MODEL_FILE),
            intra_threads: 2,
            fetch_timeout: Duration::from_secs(10),
            max_image_bytes: 16 * 1024 * 1024,
        }
    }
}

#[async_trait]
impl CapabilityLoader for OnnxLoader {
    type Capability = OnnxRecognition;

    async fn load(&self) -> Result<OnnxRecognition, LoadError> {
        let fetcher = ImageFetcher::new(self.fetch_timeout, self.max_image_bytes)
            .map_err(|e| LoadError(format!("http client: {e}")))?;

        let settings = self.clone();
        let inference = tokio::task::spawn_blocking(move || -> Result<InferenceHandle, LoadError> {
            let detector = FaceDetector::load(&settings.detector_path, settings.intra_threads)
                .map_err(|e| LoadError(e.to_string()))?;
            let recognizer = FaceRecognizer::load(&settings.recognizer_path, settings.intra_threads)
                .map_err(|e| LoadError(e.to_string()))?;
            spawn_inference(detector, recognizer)
                .map_err(|e| LoadError(format!("inference thread: {e}")))
        })
        .await
        .map_err(|e| LoadError(format!("model load task: {e}")))??;

        Ok(OnnxRecognition { fetcher, inference })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_from_model_dir() {
        let loader = OnnxLoader::from_model_dir(Path::new("/opt/models"));
        assert_eq!(loader.detector_path, Path::new("/opt/models/det_10g.onnx"));
        assert_eq!(loader.recognizer_path, Path::new("/opt/models/w600k_r50.onnx"));
    }

    #[tokio::test]
    async fn test_load_missing_models_fails() {
        let loader = OnnxLoader::from_model_dir(Path::new("/nonexistent/facebridge"));
        let err = loader.load().await.err().unwrap();
        assert!(err.0.contains("model file not found"), "{err}");
    }
}
