use facematch_core::{InputLayout, DEFAULT_THRESHOLD};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Runtime configuration: defaults, then an optional TOML file, then
/// `FACEMATCH_*` environment variables, then command-line flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Path to the ONNX embedding model.
    pub model_path: PathBuf,
    /// Directory scanned for `<name>.<ext>` reference faces at startup.
    pub faces_dir: PathBuf,
    /// Euclidean distance below which a probe is recognized.
    pub threshold: f32,
    /// Input tensor layout expected by the model.
    pub input_layout: InputLayout,
    /// ONNX Runtime intra-op threads.
    pub intra_threads: usize,
    /// File extensions (without dot, case-insensitive) picked up by preload.
    pub face_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/mobile_face_net.onnx"),
            faces_dir: PathBuf::from("faces"),
            threshold: DEFAULT_THRESHOLD,
            input_layout: InputLayout::Nhwc,
            intra_threads: 2,
            face_extensions: vec!["jpg".to_string()],
        }
    }
}

/// On-disk form; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    model_path: Option<PathBuf>,
    faces_dir: Option<PathBuf>,
    threshold: Option<f32>,
    input_layout: Option<InputLayout>,
    intra_threads: Option<usize>,
    face_extensions: Option<Vec<String>>,
}

impl Config {
    /// Load defaults, overlay `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                tracing::debug!(path = %path.display(), "loading config file");
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document over the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(text)?;
        let mut config = Self::default();
        if let Some(v) = file.model_path {
            config.model_path = v;
        }
        if let Some(v) = file.faces_dir {
            config.faces_dir = v;
        }
        if let Some(v) = file.threshold {
            config.threshold = v;
        }
        if let Some(v) = file.input_layout {
            config.input_layout = v;
        }
        if let Some(v) = file.intra_threads {
            config.intra_threads = v;
        }
        if let Some(v) = file.face_extensions {
            config.face_extensions = v;
        }
        Ok(config)
    }

    /// Overlay `FACEMATCH_*` variables read through `lookup`.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FACEMATCH_MODEL_PATH") {
            self.model_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEMATCH_FACES_DIR") {
            self.faces_dir = PathBuf::from(v);
        }
        if let Some(v) = parse_env(&lookup, "FACEMATCH_THRESHOLD") {
            self.threshold = v;
        }
        if let Some(v) = parse_env(&lookup, "FACEMATCH_INPUT_LAYOUT") {
            self.input_layout = v;
        }
        if let Some(v) = parse_env(&lookup, "FACEMATCH_INTRA_THREADS") {
            self.intra_threads = v;
        }
        if let Some(v) = lookup("FACEMATCH_FACE_EXTENSIONS") {
            self.face_extensions = v
                .split(',')
                .map(|ext| ext.trim().trim_start_matches('.').to_string())
                .filter(|ext| !ext.is_empty())
                .collect();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "threshold",
                reason: format!("must be a finite number > 0, got {}", self.threshold),
            });
        }
        if self.intra_threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "intra_threads",
                reason: "must be at least 1".into(),
            });
        }
        if self.face_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "face_extensions",
                reason: "at least one extension is required".into(),
            });
        }
        Ok(())
    }
}

fn parse_env<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "ignoring unparsable environment value");
            None
        }
    }
}
