//! Embedding extraction over an opaque face-embedding model.
//!
//! [`EmbeddingModel`] is the seam: the ONNX-backed [`OnnxEmbeddingModel`]
//! in production, stubs in tests. [`EmbeddingExtractor`] validates whatever
//! the model returns before it can reach the registry or the matcher.

use crate::error::RecognitionError;
use crate::types::{Embedding, Tensor, EMBEDDING_DIM, INPUT_SIZE};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const MOBILEFACENET_MODEL_VERSION: &str = "mobile_face_net";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A pure function from a preprocessed tensor to raw embedding values.
///
/// Implementations may block for as long as inference takes; callers run
/// them off latency-sensitive threads.
pub trait EmbeddingModel: Send {
    fn infer(&mut self, input: &Tensor) -> Result<Vec<f32>, ModelError>;

    /// Identifier recorded on produced embeddings.
    fn version(&self) -> Option<&str> {
        None
    }
}

/// Memory layout expected by the model's input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputLayout {
    /// `[1, 112, 112, 3]`, identical to the preprocessed tensor.
    #[default]
    Nhwc,
    /// `[1, 3, 112, 112]`, channel planes.
    Nchw,
}

impl FromStr for InputLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nhwc" => Ok(InputLayout::Nhwc),
            "nchw" => Ok(InputLayout::Nchw),
            other => Err(format!("unknown input layout {other:?} (expected nhwc or nchw)")),
        }
    }
}

/// MobileFaceNet-style embedding model via ONNX Runtime.
pub struct OnnxEmbeddingModel {
    session: Session,
    layout: InputLayout,
}

impl OnnxEmbeddingModel {
    /// Load the ONNX model from the given path.
    pub fn load(
        model_path: impl AsRef<Path>,
        layout: InputLayout,
        intra_threads: usize,
    ) -> Result<Self, ModelError> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(ModelError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads.max(1))?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            ?layout,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded embedding model"
        );

        Ok(Self { session, layout })
    }

    fn input_array(&self, input: &Tensor) -> Result<Array4<f32>, ModelError> {
        let size = INPUT_SIZE;
        match self.layout {
            InputLayout::Nhwc => Array4::from_shape_vec((1, size, size, 3), input.as_slice().to_vec())
                .map_err(|e| ModelError::InferenceFailed(format!("input shape: {e}"))),
            InputLayout::Nchw => {
                let values = input.as_slice();
                let mut array = Array4::<f32>::zeros((1, 3, size, size));
                for y in 0..size {
                    for x in 0..size {
                        let offset = (y * size + x) * 3;
                        for c in 0..3 {
                            array[[0, c, y, x]] = values[offset + c];
                        }
                    }
                }
                Ok(array)
            }
        }
    }
}

impl EmbeddingModel for OnnxEmbeddingModel {
    fn infer(&mut self, input: &Tensor) -> Result<Vec<f32>, ModelError> {
        let input = self.input_array(input)?;

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("embedding extraction: {e}")))?;

        Ok(raw_data.to_vec())
    }

    fn version(&self) -> Option<&str> {
        Some(MOBILEFACENET_MODEL_VERSION)
    }
}

enum Backend {
    Loaded(Box<dyn EmbeddingModel>),
    Unavailable(String),
}

/// Validating front of an [`EmbeddingModel`].
///
/// Holds either a loaded model or the reason loading failed; in the latter
/// case every call reports `ModelUnavailable`. Nothing is cached between calls.
pub struct EmbeddingExtractor {
    backend: Backend,
}

impl EmbeddingExtractor {
    pub fn new(model: impl EmbeddingModel + 'static) -> Self {
        Self {
            backend: Backend::Loaded(Box::new(model)),
        }
    }

    /// An extractor whose model failed to load.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            backend: Backend::Unavailable(reason.into()),
        }
    }

    /// Build from the outcome of a one-time model load.
    pub fn from_load<M, E>(result: Result<M, E>) -> Self
    where
        M: EmbeddingModel + 'static,
        E: std::fmt::Display,
    {
        match result {
            Ok(model) => Self::new(model),
            Err(e) => {
                tracing::error!(error = %e, "embedding model failed to load");
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.backend, Backend::Loaded(_))
    }

    /// Run the model on `tensor` and validate the result.
    ///
    /// Output must have exactly `EMBEDDING_DIM` finite values.
    pub fn embed(&mut self, tensor: &Tensor) -> Result<Embedding, RecognitionError> {
        let model = match &mut self.backend {
            Backend::Loaded(model) => model,
            Backend::Unavailable(reason) => {
                return Err(RecognitionError::ModelUnavailable(reason.clone()));
            }
        };

        let values = model.infer(tensor).map_err(|e| match e {
            ModelError::ModelNotFound(path) => {
                RecognitionError::ModelUnavailable(format!("model file not found: {path}"))
            }
            other => RecognitionError::InferenceFailed(other.to_string()),
        })?;

        if values.len() != EMBEDDING_DIM {
            return Err(RecognitionError::InvalidEmbedding(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                values.len()
            )));
        }

        let embedding = Embedding {
            values,
            model_version: model.version().map(str::to_string),
        };

        if embedding.has_non_finite() {
            return Err(RecognitionError::InvalidEmbedding(
                "embedding contains NaN or infinite values".into(),
            ));
        }

        Ok(embedding)
    }
}
