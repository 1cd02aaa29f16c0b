//! facebridge-core: Face matching and detection over a pluggable recognition capability.
//!
//! The recognition engine itself lives behind the [`Recognition`] trait; this crate
//! owns the decision logic (confidence scoring, batch/single detection shaping)
//! and the readiness gate that loads the engine exactly once.

pub mod capability;
pub mod detection;
pub mod gate;
pub mod matching;
pub mod types;

pub use capability::{CapabilityLoader, DetectorVariant, ExtractionError, LoadError, Recognition};
pub use detection::{DetectionOutput, FaceDetections, ImageArg};
pub use gate::ModelGate;
pub use matching::{FaceMatcher, NO_MATCH};
pub use types::{BoundingBox, Descriptor, Detection, ImageRef, LandmarkSet, NamedDescriptor, Point};

use thiserror::Error;

/// Failure of a matching or detection call.
#[derive(Error, Debug)]
pub enum FaceError {
    #[error("recognition capability unavailable: {0}")]
    Unavailable(#[from] LoadError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}
