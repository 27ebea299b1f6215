use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facematch_core::{BoundingBox, FaceImage, IdentityName};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod preload;

use config::Config;
use engine::EngineHandle;

#[derive(Parser)]
#[command(name = "facematch", version, about = "Recognize face images against a directory of reference faces")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// ONNX embedding model (overrides config)
    #[arg(long, global = true, value_name = "PATH")]
    model: Option<PathBuf>,
    /// Directory of `<name>.jpg` reference faces (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    faces_dir: Option<PathBuf>,
    /// Euclidean distance threshold (overrides config)
    #[arg(long, global = true)]
    threshold: Option<f32>,
    /// Register an extra identity after preload; may be repeated
    #[arg(long = "register", global = true, value_name = "NAME=IMAGE", value_parser = parse_registration)]
    registrations: Vec<(String, PathBuf)>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize one or more face images
    Recognize {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Crop this face region (X,Y,W,H in pixels) out of each image first
        #[arg(long, value_parser = parse_bbox)]
        bbox: Option<BoundingBox>,
        /// Print one JSON object per image
        #[arg(long)]
        json: bool,
    },
    /// List registered identities
    List,
    /// Print the embedding distance between two face images
    Compare { first: PathBuf, second: PathBuf },
    /// Show engine status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.model_path = model;
    }
    if let Some(dir) = cli.faces_dir {
        config.faces_dir = dir;
    }
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }
    config.validate()?;
    tracing::debug!(?config, "configuration loaded");

    let engine = engine::spawn_engine(&config)?;

    match cli.command {
        Commands::Recognize { images, bbox, json } => {
            populate(&engine, &config, &cli.registrations).await?;
            let mut failures = 0usize;
            for path in &images {
                let result = match load_image(path).await {
                    Ok(image) => match bbox {
                        Some(bbox) => engine.recognize_region(image, bbox).await,
                        None => engine.recognize(image).await,
                    },
                    Err(e) => Err(e.into()),
                };
                match (result, json) {
                    (Ok(decision), true) => {
                        let mut value = serde_json::to_value(&decision)?;
                        value["image"] = path.display().to_string().into();
                        println!("{value}");
                    }
                    (Ok(decision), false) => println!("{}: {decision}", path.display()),
                    (Err(e), true) => {
                        failures += 1;
                        println!(
                            "{}",
                            serde_json::json!({ "image": path.display().to_string(), "error": e.to_string() })
                        );
                    }
                    (Err(e), false) => {
                        failures += 1;
                        eprintln!("{}: error: {e}", path.display());
                    }
                }
            }
            if failures > 0 {
                bail!("{failures} of {} images could not be recognized", images.len());
            }
        }
        Commands::List => {
            populate(&engine, &config, &cli.registrations).await?;
            let names = engine.list().await?;
            println!("{}", serde_json::to_string_pretty(&names)?);
        }
        Commands::Compare { first, second } => {
            let a = engine.embed(load_image(&first).await?).await?;
            let b = engine.embed(load_image(&second).await?).await?;
            let distance = a.euclidean_distance(&b);
            let verdict = if distance < config.threshold { "same identity" } else { "different identities" };
            println!("distance {distance:.4} ({verdict} at threshold {})", config.threshold);
        }
        Commands::Status => {
            let summary = populate(&engine, &config, &cli.registrations).await?;
            let status = engine.status().await?;
            println!(
                "{}",
                serde_json::json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "model_path": config.model_path.display().to_string(),
                    "model_loaded": status.model_loaded,
                    "faces_dir": config.faces_dir.display().to_string(),
                    "preload": summary,
                    "identities": status.identities,
                    "threshold": status.threshold,
                })
            );
        }
    }

    Ok(())
}

/// Preload the faces directory, then apply `--register` entries.
async fn populate(
    engine: &EngineHandle,
    config: &Config,
    registrations: &[(String, PathBuf)],
) -> Result<preload::PreloadSummary> {
    let summary = if config.faces_dir.is_dir() {
        preload::preload_directory(engine, &config.faces_dir, &config.face_extensions).await?
    } else {
        tracing::warn!(dir = %config.faces_dir.display(), "faces directory not found; skipping preload");
        preload::PreloadSummary::default()
    };

    for (name, path) in registrations {
        let name = IdentityName::new(name)?;
        let image = load_image(path).await?;
        engine
            .register(image, name.clone())
            .await
            .with_context(|| format!("registering {name} from {}", path.display()))?;
    }

    Ok(summary)
}

async fn load_image(path: &Path) -> Result<FaceImage, facematch_core::RecognitionError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        facematch_core::RecognitionError::InvalidImage(format!("{}: {e}", path.display()))
    })?;
    FaceImage::decode(&bytes)
}

fn parse_registration(s: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=IMAGE, got {s:?}"))?;
    if name.trim().is_empty() || path.is_empty() {
        return Err(format!("expected NAME=IMAGE, got {s:?}"));
    }
    Ok((name.trim().to_string(), PathBuf::from(path)))
}

fn parse_bbox(s: &str) -> Result<BoundingBox, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid bounding box {s:?}: {e}"))?;
    let [x, y, width, height] = parts[..] else {
        return Err(format!("expected X,Y,W,H, got {s:?}"));
    };
    if width <= 0.0 || height <= 0.0 {
        return Err(format!("bounding box width and height must be positive, got {s:?}"));
    }
    Ok(BoundingBox { x, y, width, height, confidence: 1.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_registration() {
        assert_eq!(
            parse_registration("alice=faces/a.jpg"),
            Ok(("alice".to_string(), PathBuf::from("faces/a.jpg")))
        );
        assert!(parse_registration("alice").is_err());
        assert!(parse_registration("=a.jpg").is_err());
        assert!(parse_registration("alice=").is_err());
    }

    #[test]
    fn test_parse_bbox() {
        let bbox = parse_bbox("10, 20,30.5,40").unwrap();
        assert_eq!((bbox.x, bbox.y, bbox.width, bbox.height), (10.0, 20.0, 30.5, 40.0));
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("1,2,0,4").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
    }

    #[test]
    fn test_cli_parses_recognize() {
        let cli = Cli::try_parse_from([
            "facematch",
            "--register",
            "alice=a.jpg",
            "recognize",
            "probe.jpg",
            "--bbox",
            "1,2,3,4",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.registrations, vec![("alice".to_string(), PathBuf::from("a.jpg"))]);
        assert!(matches!(cli.command, Commands::Recognize { json: true, bbox: Some(_), .. }));
    }
}
