use std::{
    collections::BTreeMap,
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    algorithms::crop_region,
    config::{ExportConfig, ExportFormat},
    error::{HoldError, Result},
    traits::RegionSink,
    types::{GradedHold, HoldMetadata, HoldRegion, RouteHold},
};

/// File name of the metadata written next to exported crops.
pub const METADATA_FILE: &str = "metadata.json";

/// One encoded hold crop plus the metadata that travels with it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedHold {
    pub id: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub metadata: HoldMetadata,
}

impl ExportedHold {
    /// Crop, encode and label a detected region.
    pub fn from_region(image: &RgbImage, region: &HoldRegion, config: &ExportConfig) -> Result<Self> {
        let crop = crop_region(image, region, config.background);
        if crop.width() == 0 || crop.height() == 0 {
            return Err(HoldError::Export(format!(
                "region {} has an empty crop",
                region.id
            )));
        }
        Ok(Self {
            id: region.export_id(config.format.extension()),
            bytes: encode_image(&crop, config.format)?,
            content_type: config.format.content_type().to_string(),
            metadata: region.metadata(),
        })
    }
}

pub fn encode_image(image: &RgbImage, format: ExportFormat) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    match format {
        ExportFormat::Jpeg { quality } => {
            let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
            encoder.encode_image(image)?;
        }
        ExportFormat::Png => {
            image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        }
    }
    Ok(bytes)
}

impl RegionSink for Vec<ExportedHold> {
    fn export(&mut self, hold: ExportedHold) -> Result<()> {
        self.push(hold);
        Ok(())
    }
}

/// Writes each crop as `<dir>/<id>` and collects metadata for
/// `<dir>/metadata.json`, written by [`DirectorySink::finish`].
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    metadata: BTreeMap<String, HoldMetadata>,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            metadata: BTreeMap::new(),
        })
    }

    pub fn metadata(&self) -> &BTreeMap<String, HoldMetadata> {
        &self.metadata
    }

    /// Write the metadata file and return its path.
    pub fn finish(self) -> Result<PathBuf> {
        let path = self.dir.join(METADATA_FILE);
        fs::write(&path, serde_json::to_string_pretty(&self.metadata)?)?;
        info!(holds = self.metadata.len(), path = %path.display(), "Wrote crop metadata");
        Ok(path)
    }
}

impl RegionSink for DirectorySink {
    fn export(&mut self, hold: ExportedHold) -> Result<()> {
        let path = self.dir.join(&hold.id);
        fs::write(&path, &hold.bytes)?;
        debug!(id = %hold.id, bytes = hold.bytes.len(), "Wrote crop");
        self.metadata.insert(hold.id, hold.metadata);
        Ok(())
    }
}

/// JSON hand-off between detection and hold grading: metadata and
/// base64-encoded crops keyed by crop id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    #[serde(default)]
    pub metadata: BTreeMap<String, HoldMetadata>,
    #[serde(default)]
    pub images: BTreeMap<String, String>,
}

impl ExportBundle {
    pub fn from_exports<'a>(holds: impl IntoIterator<Item = &'a ExportedHold>) -> Self {
        let mut bundle = Self::default();
        for hold in holds {
            bundle.insert(hold);
        }
        bundle
    }

    fn insert(&mut self, hold: &ExportedHold) {
        self.images.insert(hold.id.clone(), STANDARD.encode(&hold.bytes));
        self.metadata.insert(hold.id.clone(), hold.metadata.clone());
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Decoded crop bytes, `None` when the bundle carries no image for `id`.
    pub fn image_bytes(&self, id: &str) -> Option<Result<Vec<u8>>> {
        self.images
            .get(id)
            .map(|encoded| STANDARD.decode(encoded).map_err(HoldError::from))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl RegionSink for ExportBundle {
    fn export(&mut self, hold: ExportedHold) -> Result<()> {
        self.insert(&hold);
        Ok(())
    }
}

/// Output of the hold grading pass, keyed by crop id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradedBundle(pub BTreeMap<String, GradedHold>);

impl GradedBundle {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&GradedHold> {
        self.0.get(id)
    }

    pub fn route_holds(&self) -> Vec<RouteHold> {
        self.0
            .iter()
            .map(|(id, hold)| RouteHold::from_graded(id.clone(), hold))
            .collect()
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl FromIterator<(String, GradedHold)> for GradedBundle {
    fn from_iter<I: IntoIterator<Item = (String, GradedHold)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
