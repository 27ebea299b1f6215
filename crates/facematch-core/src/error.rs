use thiserror::Error;

/// Failure of a single register/recognize call.
///
/// Every variant is terminal for the call that produced it and leaves the
/// registry untouched. None of these is a recognition outcome: a face that
/// matches nobody is [`Decision::Unknown`](crate::Decision::Unknown), not an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecognitionError {
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("identity name must not be empty")]
    InvalidName,
}
