//! Detection Orchestrator: single or batch face detection with shape normalization.

use crate::capability::{detect_reference, CapabilityLoader, DetectorVariant};
use crate::gate::ModelGate;
use crate::types::{Detection, ImageRef};
use crate::FaceError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Detection input: a lone reference or an ordered batch, told apart by shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageArg {
    Single(ImageRef),
    Batch(Vec<ImageRef>),
}

/// Detection output, mirroring the shape of the [`ImageArg`] it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetectionOutput {
    /// The face in a single image, if any.
    Single(Option<Detection>),
    /// Faces found in a batch, face-less images omitted.
    Batch(Vec<Detection>),
}

impl DetectionOutput {
    /// True when no face was found.
    pub fn is_empty(&self) -> bool {
        match self {
            DetectionOutput::Single(detection) => detection.is_none(),
            DetectionOutput::Batch(detections) => detections.is_empty(),
        }
    }
}

/// Clone-safe handle to the detection orchestrator.
pub struct FaceDetections<L: CapabilityLoader> {
    gate: Arc<ModelGate<L>>,
}

impl<L: CapabilityLoader> Clone for FaceDetections<L> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<L: CapabilityLoader> FaceDetections<L> {
    pub fn new(gate: Arc<ModelGate<L>>) -> Self {
        Self { gate }
    }

    /// Detect faces in one image or a batch.
    ///
    /// Unlike matching, extraction failures are returned to the caller so that
    /// "found nothing" and "failed to run" stay distinguishable.
    pub async fn get_detections(&self, arg: &ImageArg) -> Result<DetectionOutput, FaceError> {
        let capability = self.gate.ready().await?;
        let capability = capability.as_ref();

        match arg {
            ImageArg::Single(reference) => {
                let detection = detect_reference(capability, reference, DetectorVariant::Tiny).await?;
                tracing::info!(found = detection.is_some(), "detect: single image");
                Ok(DetectionOutput::Single(detection))
            }
            ImageArg::Batch(references) => {
                let mut detections = Vec::with_capacity(references.len());
                for (i, reference) in references.iter().enumerate() {
                    match detect_reference(capability, reference, DetectorVariant::Tiny).await? {
                        Some(detection) => detections.push(detection),
                        None => tracing::debug!(index = i, "detect: no face, omitted"),
                    }
                }
                tracing::info!(
                    images = references.len(),
                    found = detections.len(),
                    "detect: batch"
                );
                Ok(DetectionOutput::Batch(detections))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::stub::{face, Scripted, StubLoader, StubRecognition};
    use crate::capability::ExtractionError;

    fn detections(stub: StubRecognition) -> (FaceDetections<StubLoader>, Arc<StubRecognition>) {
        let loader = StubLoader::new(stub);
        let capability = loader.capability.clone();
        (FaceDetections::new(Arc::new(ModelGate::new(loader))), capability)
    }

    #[test]
    fn test_image_arg_shape() {
        let single: ImageArg = serde_json::from_str(r#""a.jpg""#).unwrap();
        assert_eq!(single, ImageArg::Single("a.jpg".into()));
        let batch: ImageArg = serde_json::from_str(r#"["a.jpg","b.jpg"]"#).unwrap();
        assert_eq!(batch, ImageArg::Batch(vec!["a.jpg".into(), "b.jpg".into()]));
        assert!(serde_json::from_str::<ImageArg>("42").is_err());
    }

    #[tokio::test]
    async fn test_batch_omits_faceless_and_keeps_order() {
        let stub = StubRecognition::new()
            .with("a", face(1.0))
            .with("b", Scripted::NoFace)
            .with("c", face(3.0));
        let (detections, capability) = detections(stub);

        let arg = ImageArg::Batch(vec!["a".into(), "b".into(), "c".into()]);
        let DetectionOutput::Batch(found) = detections.get_detections(&arg).await.unwrap() else {
            panic!("batch input must give batch output");
        };

        let slots: Vec<f32> = found.iter().map(|d| d.descriptor.values[0]).collect();
        assert_eq!(slots, vec![1.0, 3.0]);
        assert!(capability.calls().iter().all(|(_, v)| *v == DetectorVariant::Tiny));
    }

    #[tokio::test]
    async fn test_batch_of_one_stays_a_list() {
        let stub = StubRecognition::new().with("a", face(1.0));
        let (detections, _) = detections(stub);

        let output = detections
            .get_detections(&ImageArg::Batch(vec!["a".into()]))
            .await
            .unwrap();
        let json = serde_json::to_value(&output).unwrap();
        assert!(json.is_array());
        assert_eq!(json.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_single_without_face_is_absent() {
        let stub = StubRecognition::new().with("a", Scripted::NoFace);
        let (detections, _) = detections(stub);

        let output = detections
            .get_detections(&ImageArg::Single("a".into()))
            .await
            .unwrap();
        assert_eq!(output, DetectionOutput::Single(None));
        assert!(serde_json::to_value(&output).unwrap().is_null());
    }

    #[tokio::test]
    async fn test_single_with_face() {
        let stub = StubRecognition::new().with("a", face(7.0));
        let (detections, _) = detections(stub);

        let output = detections
            .get_detections(&ImageArg::Single("a".into()))
            .await
            .unwrap();
        let DetectionOutput::Single(Some(detection)) = output else {
            panic!("expected a detection");
        };
        assert_eq!(detection.descriptor.values, vec![7.0]);
    }

    #[tokio::test]
    async fn test_extraction_failure_surfaces() {
        let stub = StubRecognition::new()
            .with("a", face(1.0))
            .with("b", Scripted::FetchFails);
        let (detections, _) = detections(stub);

        let result = detections
            .get_detections(&ImageArg::Batch(vec!["a".into(), "b".into()]))
            .await;
        assert!(matches!(
            result,
            Err(FaceError::Extraction(ExtractionError::Fetch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_load_failure_propagates() {
        let detections = FaceDetections::new(Arc::new(ModelGate::new(StubLoader::failing())));
        let result = detections.get_detections(&ImageArg::Single("a".into())).await;
        assert!(matches!(result, Err(FaceError::Unavailable(_))));
    }
}
