//! Register/recognize orchestration: preprocess → embed → registry/match.

use crate::error::RecognitionError;
use crate::extractor::EmbeddingExtractor;
use crate::matcher::{EuclideanMatcher, Matcher};
use crate::preprocess::{crop_region, FaceImage, ImagePreprocessor};
use crate::registry::FaceRegistry;
use crate::types::{BoundingBox, Decision, Embedding, IdentityName, DEFAULT_THRESHOLD};

/// Owns the registry and the model; the only entry point for the
/// surrounding application.
///
/// Every failing call returns before the registry is touched.
pub struct RecognitionPipeline<M: Matcher = EuclideanMatcher> {
    preprocessor: ImagePreprocessor,
    extractor: EmbeddingExtractor,
    registry: FaceRegistry,
    matcher: M,
    threshold: f32,
}

impl RecognitionPipeline<EuclideanMatcher> {
    pub fn new(extractor: EmbeddingExtractor) -> Self {
        Self::with_matcher(extractor, EuclideanMatcher)
    }
}

impl<M: Matcher> RecognitionPipeline<M> {
    pub fn with_matcher(extractor: EmbeddingExtractor, matcher: M) -> Self {
        Self {
            preprocessor: ImagePreprocessor,
            extractor,
            registry: FaceRegistry::new(),
            matcher,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Replace the rejection threshold (default 1.0).
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn registry(&self) -> &FaceRegistry {
        &self.registry
    }

    pub fn model_available(&self) -> bool {
        self.extractor.is_available()
    }

    /// Preprocess and embed `image` without touching the registry.
    pub fn embed_image(&mut self, image: &FaceImage) -> Result<Embedding, RecognitionError> {
        let tensor = self.preprocessor.prepare(image)?;
        self.extractor.embed(&tensor)
    }

    /// Extract an embedding from `image` and store it under `name`,
    /// replacing any earlier embedding for that name.
    pub fn register(&mut self, image: &FaceImage, name: IdentityName) -> Result<(), RecognitionError> {
        let embedding = self.embed_image(image)?;
        if self.registry.register(name.clone(), embedding).is_some() {
            tracing::info!(name = %name, "face re-registered, previous embedding replaced");
        } else {
            tracing::info!(name = %name, total = self.registry.len(), "face registered");
        }
        Ok(())
    }

    /// Match `image` against the current registry.
    pub fn recognize(&mut self, image: &FaceImage) -> Result<Decision, RecognitionError> {
        let probe = self.embed_image(image)?;
        self.matcher
            .compare(&probe, self.registry.lookup_all(), self.threshold)
    }

    /// Crop the detector-provided `bbox` out of `frame`, then [`recognize`](Self::recognize) it.
    pub fn recognize_region(
        &mut self,
        frame: &FaceImage,
        bbox: &BoundingBox,
    ) -> Result<Decision, RecognitionError> {
        let face = crop_region(frame, bbox)?;
        self.recognize(&face)
    }
}
