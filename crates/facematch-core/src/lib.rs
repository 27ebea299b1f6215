//! facematch-core — Face identity matching.
//!
//! Turns a face-region image into a 192-dimensional embedding with a
//! MobileFaceNet model (ONNX Runtime, CPU) and decides which registered
//! identity, if any, lies within a Euclidean distance threshold.

pub mod error;
pub mod extractor;
pub mod matcher;
pub mod pipeline;
pub mod preprocess;
pub mod registry;
pub mod types;

pub use error::RecognitionError;
pub use extractor::{EmbeddingExtractor, EmbeddingModel, InputLayout, ModelError, OnnxEmbeddingModel};
pub use matcher::{EuclideanMatcher, Matcher};
pub use pipeline::RecognitionPipeline;
pub use preprocess::{crop_region, FaceImage, ImagePreprocessor};
pub use registry::FaceRegistry;
pub use types::{
    BoundingBox, Decision, Embedding, Identity, IdentityName, Tensor, DEFAULT_THRESHOLD,
    EMBEDDING_DIM, INPUT_SIZE, TENSOR_LEN,
};
