//! The recognition capability seam.
//!
//! Everything that touches pixels or models sits behind [`Recognition`]; the
//! matching and detection logic only sees descriptors and distances.

use crate::types::{Descriptor, Detection, ImageRef};
use async_trait::async_trait;
use thiserror::Error;

/// Which detector configuration to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorVariant {
    /// Full-resolution detector, used for matching.
    #[default]
    Standard,
    /// Reduced-resolution detector, used for on-demand detection.
    Tiny,
}

/// An image could not be resolved, decoded or run through inference.
///
/// Distinct from "no face found", which is `Ok(None)`.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("failed to fetch image {reference}: {reason}")]
    Fetch { reference: String, reason: String },
    #[error("failed to decode image {reference}: {reason}")]
    Decode { reference: String, reason: String },
    #[error("inference failed: {0}")]
    Inference(String),
}

/// The capability could not be made ready.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct LoadError(pub String);

/// A loaded face detection + recognition engine.
#[async_trait]
pub trait Recognition: Send + Sync + 'static {
    /// Decoded image handle produced by [`fetch_image`](Self::fetch_image).
    type Image: Send + Sync;

    /// Resolve an opaque reference into a decodable image.
    async fn fetch_image(&self, reference: &ImageRef) -> Result<Self::Image, ExtractionError>;

    /// Detect at most one face, with landmarks and descriptor.
    async fn detect_single_face(
        &self,
        image: &Self::Image,
        variant: DetectorVariant,
    ) -> Result<Option<Detection>, ExtractionError>;

    /// Symmetric distance; smaller means more similar.
    fn distance(&self, a: &Descriptor, b: &Descriptor) -> f64;

    /// Whether the capability can still serve requests. A
    /// [`ModelGate`](crate::ModelGate) discards an unhealthy capability and
    /// loads a fresh one.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Produces a ready [`Recognition`] capability (typically by loading models).
#[async_trait]
pub trait CapabilityLoader: Send + Sync + 'static {
    type Capability: Recognition;

    async fn load(&self) -> Result<Self::Capability, LoadError>;
}

/// Fetch `reference` and run single-face detection on it.
pub async fn detect_reference<R: Recognition + ?Sized>(
    capability: &R,
    reference: &ImageRef,
    variant: DetectorVariant,
) -> Result<Option<Detection>, ExtractionError> {
    let image = capability.fetch_image(reference).await?;
    capability.detect_single_face(&image, variant).await
}
