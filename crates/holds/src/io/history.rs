use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::RwLock,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{HoldError, Result},
    traits::{HistoryStore, ImageStore},
};

pub const DEFAULT_USER: &str = "anonymous";

/// One graded route, as stored in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteHistoryRecord {
    /// Same as the storage key
    pub id: String,
    /// Unix seconds
    pub timestamp: i64,
    pub grade: String,
    pub storage_key: String,
    pub user_identifier: String,
}

impl RouteHistoryRecord {
    /// Fresh `history/{uuid}.jpg` key for a route photograph.
    pub fn new_storage_key() -> String {
        format!("history/{}.jpg", Uuid::new_v4())
    }

    pub fn new(grade: impl Into<String>, storage_key: impl Into<String>, user: Option<&str>) -> Self {
        let storage_key = storage_key.into();
        let user_identifier = user
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_USER)
            .to_string();
        Self {
            id: storage_key.clone(),
            timestamp: Utc::now().timestamp(),
            grade: grade.into(),
            storage_key,
            user_identifier,
        }
    }
}

fn poisoned<T>(_: T) -> HoldError {
    HoldError::Persistence("store lock poisoned".to_string())
}

#[derive(Debug, Default)]
pub struct InMemoryHistory {
    records: RwLock<Vec<RouteHistoryRecord>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Result<Vec<RouteHistoryRecord>> {
        Ok(self.records.read().map_err(poisoned)?.clone())
    }
}

impl HistoryStore for InMemoryHistory {
    fn put_record(&self, record: &RouteHistoryRecord) -> Result<()> {
        self.records.write().map_err(poisoned)?.push(record.clone());
        Ok(())
    }
}

/// Appends one JSON record per line.
#[derive(Debug, Clone)]
pub struct JsonLinesHistory {
    path: PathBuf,
}

impl JsonLinesHistory {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records written so far; a missing file is an empty history.
    pub fn load(&self) -> Result<Vec<RouteHistoryRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        fs::read_to_string(&self.path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(HoldError::from))
            .collect()
    }
}

impl HistoryStore for JsonLinesHistory {
    fn put_record(&self, record: &RouteHistoryRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        debug!(id = %record.id, path = %self.path.display(), "Appended history record");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Default)]
pub struct InMemoryImageStore {
    images: RwLock<BTreeMap<String, StoredImage>>,
}

impl InMemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Result<Option<StoredImage>> {
        Ok(self.images.read().map_err(poisoned)?.get(key).cloned())
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.images.read().map_err(poisoned)?.keys().cloned().collect())
    }
}

impl ImageStore for InMemoryImageStore {
    fn put_image(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        self.images.write().map_err(poisoned)?.insert(
            key.to_string(),
            StoredImage {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

/// Stores images as files under a root directory, keys become relative
/// paths.
#[derive(Debug, Clone)]
pub struct DirectoryImageStore {
    root: PathBuf,
}

impl DirectoryImageStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(HoldError::Persistence(format!("invalid storage key {key:?}")));
        }
        Ok(self.root.join(relative))
    }
}

impl ImageStore for DirectoryImageStore {
    fn put_image(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        debug!(key, content_type, path = %path.display(), "Stored image");
        Ok(())
    }
}
