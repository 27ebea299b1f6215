use crate::config::Config;
use facematch_core::{
    BoundingBox, Decision, Embedding, EmbeddingExtractor, FaceImage, IdentityName,
    OnnxEmbeddingModel, RecognitionError, RecognitionPipeline,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    #[error("cannot read face directory {path}: {source}")]
    FaceDirectory {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Snapshot of engine state for `status`.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub model_loaded: bool,
    pub identities: usize,
    pub threshold: f32,
}

/// Messages sent from async callers to the engine thread.
enum EngineRequest {
    Register {
        image: FaceImage,
        name: IdentityName,
        reply: oneshot::Sender<Result<(), RecognitionError>>,
    },
    Recognize {
        image: FaceImage,
        reply: oneshot::Sender<Result<Decision, RecognitionError>>,
    },
    RecognizeRegion {
        frame: FaceImage,
        bbox: BoundingBox,
        reply: oneshot::Sender<Result<Decision, RecognitionError>>,
    },
    Embed {
        image: FaceImage,
        reply: oneshot::Sender<Result<Embedding, RecognitionError>>,
    },
    List {
        reply: oneshot::Sender<Vec<String>>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
}

/// Clone-safe handle to the engine thread.
///
/// The thread is the sole owner of the registry; registration and
/// recognition from any number of handles are serialized through its queue.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Extract an embedding from `image` and store it under `name`.
    pub async fn register(&self, image: FaceImage, name: IdentityName) -> Result<(), EngineError> {
        Ok(self
            .call(|reply| EngineRequest::Register { image, name, reply })
            .await??)
    }

    /// Match `image` against the registry.
    pub async fn recognize(&self, image: FaceImage) -> Result<Decision, EngineError> {
        Ok(self.call(|reply| EngineRequest::Recognize { image, reply }).await??)
    }

    /// Crop `bbox` out of `frame` and match it against the registry.
    pub async fn recognize_region(
        &self,
        frame: FaceImage,
        bbox: BoundingBox,
    ) -> Result<Decision, EngineError> {
        Ok(self
            .call(|reply| EngineRequest::RecognizeRegion { frame, bbox, reply })
            .await??)
    }

    /// Embed `image` without touching the registry.
    pub async fn embed(&self, image: FaceImage) -> Result<Embedding, EngineError> {
        Ok(self.call(|reply| EngineRequest::Embed { image, reply }).await??)
    }

    /// Registered identity names, in registration order.
    pub async fn list(&self) -> Result<Vec<String>, EngineError> {
        self.call(|reply| EngineRequest::List { reply }).await
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.call(|reply| EngineRequest::Status { reply }).await
    }
}

/// Load the embedding model and spawn the engine.
///
/// A model that fails to load does not stop startup: the engine runs and
/// answers every embedding request with `ModelUnavailable`.
pub fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    let extractor = EmbeddingExtractor::from_load(OnnxEmbeddingModel::load(
        &config.model_path,
        config.input_layout,
        config.intra_threads,
    ));
    let pipeline = RecognitionPipeline::new(extractor).with_threshold(config.threshold);
    spawn_pipeline(pipeline)
}

/// Move `pipeline` onto a dedicated OS thread and return a handle to it.
///
/// The thread exits once every handle has been dropped.
pub fn spawn_pipeline(mut pipeline: RecognitionPipeline) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("facematch-engine".into())
        .spawn(move || {
            tracing::info!(model_loaded = pipeline.model_available(), "engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Register { image, name, reply } => {
                        let _ = reply.send(pipeline.register(&image, name));
                    }
                    EngineRequest::Recognize { image, reply } => {
                        let _ = reply.send(pipeline.recognize(&image));
                    }
                    EngineRequest::RecognizeRegion { frame, bbox, reply } => {
                        let _ = reply.send(pipeline.recognize_region(&frame, &bbox));
                    }
                    EngineRequest::Embed { image, reply } => {
                        let _ = reply.send(pipeline.embed_image(&image));
                    }
                    EngineRequest::List { reply } => {
                        let _ = reply.send(pipeline.registry().names());
                    }
                    EngineRequest::Status { reply } => {
                        let _ = reply.send(EngineStatus {
                            model_loaded: pipeline.model_available(),
                            identities: pipeline.registry().len(),
                            threshold: pipeline.threshold(),
                        });
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use facematch_core::{EmbeddingModel, ModelError, Tensor, EMBEDDING_DIM, TENSOR_LEN};

    /// Deterministic stand-in model: chunk means of the input tensor.
    pub(crate) struct ChunkMeanModel;

    impl EmbeddingModel for ChunkMeanModel {
        fn infer(&mut self, input: &Tensor) -> Result<Vec<f32>, ModelError> {
            let chunk = TENSOR_LEN / EMBEDDING_DIM;
            Ok(input
                .as_slice()
                .chunks(chunk)
                .map(|c| c.iter().sum::<f32>() / c.len() as f32)
                .collect())
        }
    }

    pub(crate) fn stub_engine() -> EngineHandle {
        spawn_pipeline(RecognitionPipeline::new(EmbeddingExtractor::new(ChunkMeanModel))).unwrap()
    }

    pub(crate) fn solid(width: u32, height: u32, color: [u8; 3]) -> FaceImage {
        let data = color.iter().copied().cycle().take((width * height * 3) as usize).collect();
        FaceImage::from_rgb(width, height, data).unwrap()
    }

    fn name(s: &str) -> IdentityName {
        IdentityName::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_register_and_recognize_through_engine() {
        let engine = stub_engine();
        let alice = solid(48, 64, [180, 120, 90]);
        engine.register(alice.clone(), name("alice")).await.unwrap();
        engine.register(solid(48, 64, [20, 40, 60]), name("bob")).await.unwrap();

        let decision = engine.recognize(alice).await.unwrap();
        assert_eq!(decision.name(), Some("alice"));
        assert_eq!(engine.list().await.unwrap(), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_status_reports_state() {
        let engine = stub_engine();
        engine.register(solid(8, 8, [1, 1, 1]), name("alice")).await.unwrap();

        let status = engine.status().await.unwrap();
        assert!(status.model_loaded);
        assert_eq!(status.identities, 1);
        assert_eq!(status.threshold, 1.0);
    }

    #[tokio::test]
    async fn test_unavailable_model_surfaces_as_error() {
        let pipeline = RecognitionPipeline::new(EmbeddingExtractor::unavailable("missing"));
        let engine = spawn_pipeline(pipeline).unwrap();

        let err = engine.recognize(solid(8, 8, [1, 1, 1])).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Recognition(RecognitionError::ModelUnavailable(_))
        ));
        assert!(!engine.status().await.unwrap().model_loaded);
    }

    #[tokio::test]
    async fn test_handles_share_one_registry() {
        let engine = stub_engine();
        let other = engine.clone();
        other.register(solid(16, 16, [70, 70, 70]), name("carol")).await.unwrap();

        let decision = engine.recognize(solid(16, 16, [70, 70, 70])).await.unwrap();
        assert_eq!(decision.name(), Some("carol"));
    }

    #[tokio::test]
    async fn test_recognize_region_through_engine() {
        let engine = stub_engine();
        let face = solid(20, 20, [250, 10, 10]);
        engine.register(face.clone(), name("dave")).await.unwrap();

        let mut frame = image::RgbImage::from_pixel(100, 100, image::Rgb([0, 0, 255]));
        image::imageops::replace(&mut frame, face.as_rgb(), 30, 30);
        let frame = FaceImage::from_rgb(100, 100, frame.into_raw()).unwrap();
        let bbox = BoundingBox { x: 30.0, y: 30.0, width: 20.0, height: 20.0, confidence: 0.9 };

        let decision = engine.recognize_region(frame, bbox).await.unwrap();
        assert_eq!(decision.name(), Some("dave"));
    }
}
