use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use holds::{Detection, ExportBundle, ExportedHold, HoldError, HoldsConfig, RegionSink};
use image::RgbImage;
use thiserror::Error;
use tracing::info;

/// Files written by `detect` next to the crops.
pub const BUNDLE_FILE: &str = "bundle.json";
pub const ANNOTATED_FILE: &str = "annotated.png";
pub const MASK_FILE: &str = "mask.png";
/// History file inside the history directory.
pub const HISTORY_FILE: &str = "history.jsonl";

#[derive(Error, Debug)]
pub enum WallCliError {
    #[error(transparent)]
    Hold(#[from] HoldError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
}

/// Configuration from `path`, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<HoldsConfig, WallCliError> {
    match path {
        Some(path) => {
            let config = HoldsConfig::from_file(path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => Ok(HoldsConfig::default()),
    }
}

/// Run blocking I/O on the blocking pool, giving up after `seconds`.
pub async fn run_blocking<T, F>(operation: &str, seconds: u64, f: F) -> Result<T, WallCliError>
where
    F: FnOnce() -> holds::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(f);
    match tokio::time::timeout(Duration::from_secs(seconds), task).await {
        Ok(Ok(result)) => Ok(result?),
        Ok(Err(join)) => Err(HoldError::Worker(join.to_string()).into()),
        Err(_) => Err(HoldError::Timeout {
            operation: operation.to_string(),
            seconds,
        }
        .into()),
    }
}

/// Paths of everything `detect` wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOutputs {
    pub crops: Vec<PathBuf>,
    pub metadata: PathBuf,
    pub bundle: PathBuf,
    pub annotated: PathBuf,
    pub mask: PathBuf,
}

/// Write crops, metadata, bundle, annotated preview and mask into `out_dir`.
pub fn write_detection_outputs(
    photo: &RgbImage,
    detection: &Detection,
    config: &HoldsConfig,
    out_dir: &Path,
) -> Result<DetectionOutputs, WallCliError> {
    let mut exports: Vec<ExportedHold> = Vec::new();
    detection.export(photo, &mut exports, &config.export)?;

    let mut sink = holds::DirectorySink::new(out_dir)?;
    let crops = exports.iter().map(|hold| out_dir.join(&hold.id)).collect();
    let bundle = ExportBundle::from_exports(&exports);
    for hold in exports {
        sink.export(hold)?;
    }
    let metadata = sink.finish()?;

    let bundle_path = out_dir.join(BUNDLE_FILE);
    bundle.save(&bundle_path)?;

    let annotated = out_dir.join(ANNOTATED_FILE);
    detection.annotate(photo).save(&annotated)?;
    let mask = out_dir.join(MASK_FILE);
    detection.mask.save(&mask)?;

    Ok(DetectionOutputs {
        crops,
        metadata,
        bundle: bundle_path,
        annotated,
        mask,
    })
}

/// Re-encode a route photograph for the history store.
pub fn photo_as_jpeg(path: &Path) -> holds::Result<Vec<u8>> {
    let photo = holds::decode_image(&fs::read(path)?)?;
    holds::encode_image(&photo, holds::config::ExportFormat::Jpeg { quality: 90 })
}
