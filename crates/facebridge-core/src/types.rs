use serde::{Deserialize, Serialize};

/// Opaque image locator (URL, data URI or filesystem path) resolved by the
/// recognition capability.
pub type ImageRef = String;

/// A 2-D point in source image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Axis-aligned face box in source image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Facial landmarks, ordered as produced by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    pub points: Vec<Point>,
}

/// Fixed-length face descriptor vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Euclidean distance, accumulated in f64.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(&a, &b)| (f64::from(a) - f64::from(b)).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// One detected face: where it is, its landmarks and its descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "box")]
    pub bounding_box: BoundingBox,
    pub score: f32,
    pub landmarks: LandmarkSet,
    pub descriptor: Descriptor,
}

/// A reference descriptor labelled by its position in the training set.
///
/// The name is `Person<index>` and only identifies the slot, not the person.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedDescriptor {
    pub name: String,
    pub descriptor: Option<Descriptor>,
}

impl NamedDescriptor {
    pub fn positional(index: usize, descriptor: Option<Descriptor>) -> Self {
        Self {
            name: format!("Person{index}"),
            descriptor,
        }
    }
}
