//! End-to-end register/recognize behaviour through the public API, with a
//! deterministic stand-in for the embedding model.

use facematch_core::{
    Decision, EmbeddingExtractor, EmbeddingModel, FaceImage, IdentityName, ImagePreprocessor,
    ModelError, RecognitionError, RecognitionPipeline, Tensor, EMBEDDING_DIM, TENSOR_LEN,
};

/// Projects the tensor onto `EMBEDDING_DIM` fixed pseudo-random directions,
/// scaled so unrelated faces land well beyond the default threshold.
struct ProjectionModel {
    weights: Vec<f32>,
}

impl ProjectionModel {
    fn new() -> Self {
        let mut state: u32 = 0x9e37_79b9;
        let weights = (0..EMBEDDING_DIM * 64)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state % 2001) as f32 / 1000.0 - 1.0
            })
            .collect();
        Self { weights }
    }
}

impl EmbeddingModel for ProjectionModel {
    fn infer(&mut self, input: &Tensor) -> Result<Vec<f32>, ModelError> {
        // Sample 64 evenly spaced tensor values per output dimension.
        let stride = TENSOR_LEN / 64;
        let samples: Vec<f32> = (0..64).map(|i| input.as_slice()[i * stride]).collect();
        Ok(self
            .weights
            .chunks(64)
            .map(|row| row.iter().zip(&samples).map(|(w, s)| w * s).sum::<f32>())
            .collect())
    }

    fn version(&self) -> Option<&str> {
        Some("projection-test")
    }
}

struct WrongDimModel;

impl EmbeddingModel for WrongDimModel {
    fn infer(&mut self, _input: &Tensor) -> Result<Vec<f32>, ModelError> {
        Ok(vec![0.0; EMBEDDING_DIM + 1])
    }
}

fn face(seed: u32, width: u32, height: u32) -> FaceImage {
    let data = (0..width * height * 3)
        .map(|i| ((i.wrapping_mul(2_654_435_761) ^ seed.wrapping_mul(40_503)) >> 7) as u8)
        .collect();
    FaceImage::from_rgb(width, height, data).unwrap()
}

fn name(s: &str) -> IdentityName {
    IdentityName::new(s).unwrap()
}

fn pipeline() -> RecognitionPipeline {
    RecognitionPipeline::new(EmbeddingExtractor::new(ProjectionModel::new()))
}

#[test]
fn prepare_always_yields_full_normalized_tensor() {
    for (seed, w, h) in [(1, 1, 1), (2, 3, 500), (3, 640, 480), (4, 112, 112)] {
        let tensor = ImagePreprocessor.prepare(&face(seed, w, h)).unwrap();
        assert_eq!(tensor.len(), TENSOR_LEN);
        assert!(tensor.as_slice().iter().all(|v| (-1.0..=1.0).contains(v)));
    }
}

#[test]
fn round_trip_recognizes_registered_face() {
    let mut pipeline = pipeline();
    let alice = face(1, 120, 150);
    let bob = face(2, 90, 90);
    pipeline.register(&alice, name("alice")).unwrap();
    pipeline.register(&bob, name("bob")).unwrap();

    let decision = pipeline.recognize(&alice).unwrap();
    assert_eq!(decision.name(), Some("alice"));
    assert!(decision.distance().abs() < 1e-5);

    let decision = pipeline.recognize(&bob).unwrap();
    assert_eq!(decision.name(), Some("bob"));
}

#[test]
fn embeddings_carry_model_version() {
    let mut pipeline = pipeline();
    let embedding = pipeline.embed_image(&face(7, 50, 50)).unwrap();
    assert_eq!(embedding.len(), EMBEDDING_DIM);
    assert_eq!(embedding.model_version.as_deref(), Some("projection-test"));
}

#[test]
fn reregistering_replaces_reference() {
    let mut pipeline = pipeline();
    let first = face(11, 64, 64);
    let second = face(12, 64, 64);

    pipeline.register(&first, name("alice")).unwrap();
    pipeline.register(&second, name("alice")).unwrap();

    assert_eq!(pipeline.registry().names(), vec!["alice"]);
    let decision = pipeline.recognize(&first).unwrap();
    assert!(decision.distance() > 0.0);
    let decision = pipeline.recognize(&second).unwrap();
    assert_eq!(decision.distance(), 0.0);
}

#[test]
fn empty_registry_always_unknown() {
    let mut pipeline = pipeline();
    for seed in 0..4 {
        let decision = pipeline.recognize(&face(seed, 40, 30)).unwrap();
        assert!(matches!(decision, Decision::Unknown { .. }));
        assert!(decision.distance().is_infinite());
    }
}

#[test]
fn malformed_model_output_is_an_error_not_unknown() {
    let mut pipeline = RecognitionPipeline::new(EmbeddingExtractor::new(WrongDimModel));
    let result = pipeline.register(&face(1, 10, 10), name("alice"));
    assert!(matches!(result, Err(RecognitionError::InvalidEmbedding(_))));
    assert!(pipeline.registry().is_empty());

    let result = pipeline.recognize(&face(1, 10, 10));
    assert!(matches!(result, Err(RecognitionError::InvalidEmbedding(_))));
}

#[test]
fn undecodable_image_is_rejected_before_the_model() {
    let result = FaceImage::decode(&[0xff, 0xd8, 0xff, 0x00]);
    assert!(matches!(result, Err(RecognitionError::InvalidImage(_))));
}
