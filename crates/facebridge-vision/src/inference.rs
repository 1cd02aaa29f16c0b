use crate::detector::{DetectorError, FaceBox, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use facebridge_core::{BoundingBox, DetectorVariant, Detection, ExtractionError, LandmarkSet, Point};
use image::RgbImage;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("inference panicked: {0}")]
    Panicked(String),
    #[error("inference thread exited")]
    ChannelClosed,
}

impl From<InferenceError> for ExtractionError {
    fn from(err: InferenceError) -> Self {
        ExtractionError::Inference(err.to_string())
    }
}

/// Messages sent from async callers to the inference thread.
enum InferenceRequest {
    Detect {
        image: Arc<RgbImage>,
        variant: DetectorVariant,
        reply: oneshot::Sender<Result<Option<Detection>, InferenceError>>,
    },
}

/// Clone-safe handle to the inference thread.
#[derive(Clone)]
pub struct InferenceHandle {
    tx: mpsc::Sender<InferenceRequest>,
}

impl InferenceHandle {
    /// Detect the best face in `image` and compute its descriptor.
    pub async fn detect(
        &self,
        image: Arc<RgbImage>,
        variant: DetectorVariant,
    ) -> Result<Option<Detection>, InferenceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(InferenceRequest::Detect {
                image,
                variant,
                reply: reply_tx,
            })
            .await
            .map_err(|_| closed())?;
        reply_rx.await.map_err(|_| closed())?
    }

    /// False once the inference thread has gone away.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

fn closed() -> InferenceError {
    tracing::error!("inference thread is gone");
    InferenceError::ChannelClosed
}

/// Move both ONNX sessions onto a dedicated OS thread and return its handle.
///
/// Sessions need `&mut` access and block for tens of milliseconds per call,
/// so they are owned by one thread and fed through a bounded queue.
pub fn spawn_inference(
    mut detector: FaceDetector,
    mut recognizer: FaceRecognizer,
) -> std::io::Result<InferenceHandle> {
    let (tx, mut rx) = mpsc::channel::<InferenceRequest>(4);

    std::thread::Builder::new()
        .name("facebridge-inference".into())
        .spawn(move || {
            tracing::info!("inference thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    InferenceRequest::Detect {
                        image,
                        variant,
                        reply,
                    } => {
                        let result = panic::catch_unwind(AssertUnwindSafe(|| {
                            run_detect(&mut detector, &mut recognizer, &image, variant)
                        }))
                        .unwrap_or_else(|payload| {
                            let message = panic_message(payload.as_ref());
                            tracing::error!(%message, "inference panicked");
                            Err(InferenceError::Panicked(message))
                        });
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("inference thread exiting");
        })?;

    Ok(InferenceHandle { tx })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn run_detect(
    detector: &mut FaceDetector,
    recognizer: &mut FaceRecognizer,
    image: &RgbImage,
    variant: DetectorVariant,
) -> Result<Option<Detection>, InferenceError> {
    let Some(face) = detector.detect_best(image, variant)? else {
        tracing::debug!(?variant, "no face detected");
        return Ok(None);
    };
    tracing::debug!(confidence = face.confidence, ?variant, "face detected");

    let descriptor = recognizer.extract(image, &face)?;
    Ok(Some(to_detection(&face, descriptor)))
}

fn to_detection(face: &FaceBox, descriptor: facebridge_core::Descriptor) -> Detection {
    Detection {
        bounding_box: BoundingBox {
            x: face.x,
            y: face.y,
            width: face.width,
            height: face.height,
        },
        score: face.confidence,
        landmarks: LandmarkSet {
            points: face.landmarks.iter().map(|&(x, y)| Point { x, y }).collect(),
        },
        descriptor,
    }
}
