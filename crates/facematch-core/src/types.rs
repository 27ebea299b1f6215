use crate::error::RecognitionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side length of the square model input, in pixels.
pub const INPUT_SIZE: usize = 112;

/// Number of floats in a preprocessed tensor (RGB interleaved).
pub const TENSOR_LEN: usize = 3 * INPUT_SIZE * INPUT_SIZE;

/// Dimension of a face embedding produced by the model.
pub const EMBEDDING_DIM: usize = 192;

/// Default rejection threshold on Euclidean distance.
pub const DEFAULT_THRESHOLD: f32 = 1.0;

/// Bounding box of a face region in frame pixel coordinates, as reported by
/// an external detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// Model input: `3 × 112 × 112` floats in [-1, 1], row-major, RGB interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    values: Vec<f32>,
}

impl Tensor {
    /// Callers guarantee `values.len() == TENSOR_LEN`.
    pub(crate) fn new(values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), TENSOR_LEN);
        Self { values }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Face embedding vector (192-dimensional for MobileFaceNet).
///
/// Only distances between embeddings carry meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "mobile_face_net").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True if any component is NaN or infinite.
    pub fn has_non_finite(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }

    /// Compute Euclidean distance between two embeddings.
    ///
    /// Both embeddings must have the same length; extra trailing components
    /// of the longer one are ignored.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Non-empty identity name. Surrounding whitespace is trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityName(String);

impl IdentityName {
    pub fn new(name: impl AsRef<str>) -> Result<Self, RecognitionError> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(RecognitionError::InvalidName);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IdentityName {
    type Error = RecognitionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for IdentityName {
    type Error = RecognitionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IdentityName> for String {
    fn from(name: IdentityName) -> Self {
        name.0
    }
}

impl AsRef<str> for IdentityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered identity: one name, one reference embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub name: IdentityName,
    pub embedding: Embedding,
}

/// Outcome of matching a probe against the registry.
///
/// `distance` is always the minimum distance found, also for `Unknown`
/// (`+inf` when the registry was empty).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Recognized { name: String, distance: f32 },
    Unknown { distance: f32 },
}

impl Decision {
    pub fn is_recognized(&self) -> bool {
        matches!(self, Decision::Recognized { .. })
    }

    /// Matched identity name, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Decision::Recognized { name, .. } => Some(name),
            Decision::Unknown { .. } => None,
        }
    }

    pub fn distance(&self) -> f32 {
        match self {
            Decision::Recognized { distance, .. } | Decision::Unknown { distance } => *distance,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Recognized { name, distance } => write!(f, "{name} (distance {distance:.4})"),
            Decision::Unknown { distance } if distance.is_infinite() => {
                write!(f, "Unknown (no identities registered)")
            }
            Decision::Unknown { distance } => write!(f, "Unknown (nearest distance {distance:.4})"),
        }
    }
}
