//! Face Matching Engine: one query face against an ordered set of references.

use crate::capability::{detect_reference, CapabilityLoader, DetectorVariant, ExtractionError, Recognition};
use crate::gate::ModelGate;
use crate::types::{Descriptor, ImageRef, NamedDescriptor};
use crate::FaceError;
use std::sync::Arc;

/// Confidence reported when there is nothing to compare or extraction failed.
pub const NO_MATCH: f64 = 0.0;

/// Clone-safe handle to the matching engine.
pub struct FaceMatcher<L: CapabilityLoader> {
    gate: Arc<ModelGate<L>>,
}

impl<L: CapabilityLoader> Clone for FaceMatcher<L> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<L: CapabilityLoader> FaceMatcher<L> {
    pub fn new(gate: Arc<ModelGate<L>>) -> Self {
        Self { gate }
    }

    /// Score how closely the face in `query` matches the closest face in `training`.
    ///
    /// Returns `100 - 100 * d_min` over the references that contain a face.
    /// A missing query face, no usable reference, or any extraction failure all
    /// yield [`NO_MATCH`]. Only a capability that cannot be loaded is an error.
    pub async fn match_faces(
        &self,
        query: &ImageRef,
        training: &[ImageRef],
    ) -> Result<f64, FaceError> {
        let capability = self.gate.ready().await?;

        match extract_and_score(capability.as_ref(), query, training).await {
            Ok(confidence) => Ok(confidence),
            Err(err) => {
                tracing::warn!(error = %err, "match: extraction failed, reporting no match");
                Ok(NO_MATCH)
            }
        }
    }
}

async fn extract_and_score<R: Recognition>(
    capability: &R,
    query: &ImageRef,
    training: &[ImageRef],
) -> Result<f64, ExtractionError> {
    let Some(query_face) = detect_reference(capability, query, DetectorVariant::Standard).await? else {
        tracing::info!("match: no face in query image");
        return Ok(NO_MATCH);
    };

    let references = reference_descriptors(capability, training).await?;
    let skipped = references.iter().filter(|r| r.descriptor.is_none()).count();

    let confidence = match_confidence(capability, &query_face.descriptor, &references);
    tracing::info!(
        references = references.len(),
        skipped,
        confidence,
        "match: scored"
    );
    Ok(confidence)
}

/// Extract descriptors for every training image, one at a time, in order.
async fn reference_descriptors<R: Recognition>(
    capability: &R,
    training: &[ImageRef],
) -> Result<Vec<NamedDescriptor>, ExtractionError> {
    let mut references = Vec::with_capacity(training.len());
    for (i, reference) in training.iter().enumerate() {
        let detection = detect_reference(capability, reference, DetectorVariant::Standard).await?;
        if detection.is_none() {
            tracing::debug!(index = i, "match: no face in training image");
        }
        references.push(NamedDescriptor::positional(i, detection.map(|d| d.descriptor)));
    }
    Ok(references)
}

/// Reduce the distances to the closest present reference into a confidence.
///
/// References without a descriptor take no part. With none left, the score is
/// [`NO_MATCH`]. The result is not clamped.
fn match_confidence<R: Recognition>(
    capability: &R,
    query: &Descriptor,
    references: &[NamedDescriptor],
) -> f64 {
    let min_distance = references
        .iter()
        .filter_map(|r| r.descriptor.as_ref())
        .map(|d| capability.distance(query, d))
        .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.min(d))));

    match min_distance {
        Some(d) => 100.0 - d * 100.0,
        None => NO_MATCH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::stub::{face, Scripted, StubLoader, StubRecognition};

    fn refs(names: &[&str]) -> Vec<ImageRef> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn matcher(stub: StubRecognition) -> (FaceMatcher<StubLoader>, Arc<ModelGate<StubLoader>>) {
        let gate = Arc::new(ModelGate::new(StubLoader::new(stub)));
        (FaceMatcher::new(gate.clone()), gate)
    }

    #[tokio::test]
    async fn test_confidence_uses_minimum_distance() {
        let stub = StubRecognition::new()
            .with("q", face(0.0))
            .with("a", face(0.0))
            .with("b", face(1.0))
            .with("c", face(2.0))
            .with_distances(&[0.3, 0.1, 0.5]);
        let (matcher, _) = matcher(stub);

        let confidence = matcher.match_faces(&"q".into(), &refs(&["a", "b", "c"])).await.unwrap();
        assert!((confidence - 90.0).abs() < 1e-9, "got {confidence}");
    }

    #[tokio::test]
    async fn test_no_query_face_is_zero() {
        let stub = StubRecognition::new()
            .with("q", Scripted::NoFace)
            .with("a", face(0.0))
            .with_distances(&[0.0]);
        let (matcher, _) = matcher(stub);

        let confidence = matcher.match_faces(&"q".into(), &refs(&["a"])).await.unwrap();
        assert_eq!(confidence, NO_MATCH);
    }

    #[tokio::test]
    async fn test_no_query_face_skips_training_extraction() {
        let stub = StubRecognition::new()
            .with("q", Scripted::NoFace)
            .with("a", face(0.0));
        let loader = StubLoader::new(stub);
        let capability = loader.capability.clone();
        let matcher = FaceMatcher::new(Arc::new(ModelGate::new(loader)));

        matcher.match_faces(&"q".into(), &refs(&["a"])).await.unwrap();
        assert_eq!(capability.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_all_training_faceless_is_zero() {
        let stub = StubRecognition::new()
            .with("q", face(0.0))
            .with("a", Scripted::NoFace)
            .with("b", Scripted::NoFace);
        let (matcher, _) = matcher(stub);

        let confidence = matcher.match_faces(&"q".into(), &refs(&["a", "b"])).await.unwrap();
        assert_eq!(confidence, NO_MATCH);
    }

    #[tokio::test]
    async fn test_empty_training_is_zero() {
        let stub = StubRecognition::new().with("q", face(0.0));
        let (matcher, _) = matcher(stub);

        let confidence = matcher.match_faces(&"q".into(), &[]).await.unwrap();
        assert_eq!(confidence, NO_MATCH);
    }

    #[tokio::test]
    async fn test_faceless_training_image_is_excluded() {
        // Slot 0 would be a perfect match, but its image has no face.
        let stub = StubRecognition::new()
            .with("q", face(0.0))
            .with("a", Scripted::NoFace)
            .with("b", face(1.0))
            .with_distances(&[0.0, 0.4]);
        let (matcher, _) = matcher(stub);

        let confidence = matcher.match_faces(&"q".into(), &refs(&["a", "b"])).await.unwrap();
        assert!((confidence - 60.0).abs() < 1e-9, "got {confidence}");
    }

    #[tokio::test]
    async fn test_confidence_is_not_clamped() {
        let stub = StubRecognition::new()
            .with("q", face(0.0))
            .with("a", face(0.0))
            .with_distances(&[1.2]);
        let (matcher, _) = matcher(stub);

        let confidence = matcher.match_faces(&"q".into(), &refs(&["a"])).await.unwrap();
        assert!((confidence + 20.0).abs() < 1e-9, "got {confidence}");
    }

    #[tokio::test]
    async fn test_extraction_failure_is_zero() {
        let stub = StubRecognition::new()
            .with("q", face(0.0))
            .with("a", face(0.0))
            .with("b", Scripted::InferenceFails)
            .with_distances(&[0.1]);
        let (matcher, _) = matcher(stub);

        let confidence = matcher.match_faces(&"q".into(), &refs(&["a", "b"])).await.unwrap();
        assert_eq!(confidence, NO_MATCH);

        let confidence = matcher.match_faces(&"missing".into(), &refs(&["a"])).await.unwrap();
        assert_eq!(confidence, NO_MATCH);
    }

    #[tokio::test]
    async fn test_training_processed_in_order() {
        let stub = StubRecognition::new()
            .with("q", face(0.0))
            .with("a", face(0.0))
            .with("b", Scripted::NoFace)
            .with("c", face(1.0))
            .with_distances(&[0.2, 0.3]);
        let loader = StubLoader::new(stub);
        let capability = loader.capability.clone();
        let matcher = FaceMatcher::new(Arc::new(ModelGate::new(loader)));

        matcher.match_faces(&"q".into(), &refs(&["a", "b", "c"])).await.unwrap();

        let order: Vec<String> = capability.calls().into_iter().map(|(r, _)| r).collect();
        assert_eq!(order, refs(&["q", "a", "b", "c"]));
        assert!(capability
            .calls()
            .iter()
            .all(|(_, v)| *v == DetectorVariant::Standard));
    }

    #[tokio::test]
    async fn test_waits_for_readiness() {
        let stub = StubRecognition::new()
            .with("q", face(0.0))
            .with("a", face(0.0))
            .with_distances(&[0.25]);
        let (matcher, gate) = matcher(stub);
        assert!(!gate.is_ready());

        let confidence = matcher.match_faces(&"q".into(), &refs(&["a"])).await.unwrap();
        assert!(gate.is_ready());
        assert!((confidence - 75.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_load_failure_propagates() {
        let matcher = FaceMatcher::new(Arc::new(ModelGate::new(StubLoader::failing())));
        let result = matcher.match_faces(&"q".into(), &refs(&["a"])).await;
        assert!(matches!(result, Err(FaceError::Unavailable(_))));
    }

    #[test]
    fn test_match_confidence_without_references() {
        let stub = StubRecognition::new();
        let query = Descriptor::new(vec![0.0]);
        let references = vec![NamedDescriptor::positional(0, None)];
        assert_eq!(match_confidence(&stub, &query, &references), NO_MATCH);
    }
}
