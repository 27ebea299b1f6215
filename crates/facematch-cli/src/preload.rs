//! Bulk registration of reference faces from a directory of `<name>.<ext>`
//! image files.

use crate::engine::{EngineError, EngineHandle};
use facematch_core::{FaceImage, IdentityName, RecognitionError};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Outcome of a preload pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreloadSummary {
    pub loaded: usize,
    pub skipped: usize,
}

/// Register every matching image in `dir`, in file-name order.
///
/// Files that cannot be read, decoded, or registered are logged and skipped.
/// Fails only when the directory itself cannot be listed or the engine is gone.
pub async fn preload_directory(
    engine: &EngineHandle,
    dir: &Path,
    extensions: &[String],
) -> Result<PreloadSummary, EngineError> {
    let entries = std::fs::read_dir(dir).map_err(|source| EngineError::FaceDirectory {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_extension(path, extensions))
        .collect();
    paths.sort();

    if paths.is_empty() {
        tracing::warn!(dir = %dir.display(), ?extensions, "no face images found");
        return Ok(PreloadSummary::default());
    }
    tracing::debug!(dir = %dir.display(), count = paths.len(), "preloading faces");

    let mut summary = PreloadSummary::default();
    for path in paths {
        match register_file(engine, &path).await {
            Ok(name) => {
                tracing::debug!(path = %path.display(), name = %name, "loaded face");
                summary.loaded += 1;
            }
            Err(EngineError::Recognition(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping face image");
                summary.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(loaded = summary.loaded, skipped = summary.skipped, "preload finished");
    Ok(summary)
}

async fn register_file(engine: &EngineHandle, path: &Path) -> Result<IdentityName, EngineError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or(RecognitionError::InvalidName)?;
    let name = IdentityName::new(stem)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| RecognitionError::InvalidImage(format!("{}: {e}", path.display())))?;
    let image = FaceImage::decode(&bytes)?;

    engine.register(image, name.clone()).await?;
    Ok(name)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}
