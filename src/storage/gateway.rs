use crate::error::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Reference to a record in the media index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef(pub Uuid);

impl RecordRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Fields supplied when indexing a freshly persisted picture
#[derive(Debug, Clone, PartialEq)]
pub struct NewMediaRecord {
    pub title: String,
    pub taken_at: DateTime<Utc>,
    pub orientation: u32,
    pub size_bytes: u64,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub location: Option<GeoLocation>,
}

/// An indexed picture as stored by the media index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: RecordRef,
    pub title: String,
    pub display_name: String,
    pub mime_type: String,
    pub taken_at: DateTime<Utc>,
    pub orientation: u32,
    pub size_bytes: u64,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub location: Option<GeoLocation>,
}

/// Free space on the volume holding the media directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceStatus {
    Available(u64),
    Unavailable,
    UnknownSize,
}

/// File and media-index operations the capture pipeline depends on
pub trait StorageGateway: Send + Sync {
    /// Timestamp-derived file title, second resolution, without extension
    fn generate_filename(&self) -> String;

    /// File extension appended to generated titles
    fn extension(&self) -> &str;

    /// Resolve where `filename` is stored, creating parent directories
    fn path_for(&self, filename: &str) -> Result<PathBuf, StorageError>;

    /// Pick a title and path for a new picture that no existing file uses.
    ///
    /// Titles generated within the same second get `-1`, `-2`, ... appended.
    fn unique_path(&self, title: &str) -> Result<(String, PathBuf), StorageError> {
        let mut candidate = title.to_string();
        let mut suffix = 0u32;
        loop {
            let path = self.path_for(&format!("{}.{}", candidate, self.extension()))?;
            if !path.exists() {
                return Ok((candidate, path));
            }
            suffix += 1;
            candidate = format!("{}-{}", title, suffix);
        }
    }

    fn write_bytes(&self, path: &Path, data: &[u8]) -> Result<(), StorageError>;

    fn insert_record(&self, record: NewMediaRecord) -> Result<RecordRef, StorageError>;

    fn query_record(&self, record: &RecordRef) -> Result<Option<MediaRecord>, StorageError>;

    fn delete_record(&self, record: &RecordRef) -> Result<(), StorageError>;
}
