use super::gateway::{MediaRecord, NewMediaRecord, RecordRef, SpaceStatus, StorageGateway};
use crate::config::StorageConfig;
use crate::error::StorageError;
use chrono::Local;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const MIME_TYPE_JPEG: &str = "image/jpeg";

/// Pictures stored as plain files under one directory, indexed by a JSON file
pub struct DirectoryStorage {
    root: PathBuf,
    index_path: PathBuf,
    extension: String,
    index: RwLock<HashMap<RecordRef, MediaRecord>>,
}

impl DirectoryStorage {
    /// Open (or create) the media directory described by `config`
    pub fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        Self::with_root(&config.path, &config.index_file, &config.extension)
    }

    pub fn with_root<P: AsRef<Path>>(
        root: P,
        index_file: &str,
        extension: &str,
    ) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| StorageError::CreateDir {
            path: root.clone(),
            source,
        })?;

        let index_path = root.join(index_file);
        let records = Self::load_index(&index_path)?;
        info!(
            "Opened media storage at {} ({} indexed records)",
            root.display(),
            records.len()
        );

        Ok(Self {
            root,
            index_path,
            extension: extension.to_string(),
            index: RwLock::new(records.into_iter().map(|r| (r.id, r)).collect()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All indexed records, oldest first
    pub fn records(&self) -> Vec<MediaRecord> {
        let mut records: Vec<MediaRecord> = self.index.read().values().cloned().collect();
        records.sort_by(|a, b| a.taken_at.cmp(&b.taken_at).then(a.title.cmp(&b.title)));
        records
    }

    /// Free space available to unprivileged writers on the media volume
    pub fn available_space(&self) -> SpaceStatus {
        if let Err(e) = fs::create_dir_all(&self.root) {
            warn!("Media directory {} unavailable: {}", self.root.display(), e);
            return SpaceStatus::Unavailable;
        }

        match fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => {}
            _ => return SpaceStatus::Unavailable,
        }

        match free_bytes(&self.root) {
            Some(bytes) => SpaceStatus::Available(bytes),
            None => SpaceStatus::UnknownSize,
        }
    }

    fn load_index(path: &Path) -> Result<Vec<MediaRecord>, StorageError> {
        if !path.exists() {
            debug!("No media index at {}, starting empty", path.display());
            return Ok(Vec::new());
        }

        let raw = fs::read(path).map_err(|e| StorageError::Index {
            details: format!("Failed to read {}: {}", path.display(), e),
        })?;
        serde_json::from_slice(&raw).map_err(|e| StorageError::Index {
            details: format!("Failed to parse {}: {}", path.display(), e),
        })
    }

    fn persist_index(&self, index: &HashMap<RecordRef, MediaRecord>) -> Result<(), StorageError> {
        let mut records: Vec<&MediaRecord> = index.values().collect();
        records.sort_by(|a, b| a.taken_at.cmp(&b.taken_at).then(a.title.cmp(&b.title)));

        let json = serde_json::to_vec_pretty(&records).map_err(|e| StorageError::Index {
            details: format!("Failed to serialize media index: {}", e),
        })?;

        // replace the index in one rename so readers never see a partial file
        let tmp_path = self.index_path.with_extension("tmp");
        fs::write(&tmp_path, json).map_err(|source| StorageError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.index_path).map_err(|source| StorageError::Write {
            path: self.index_path.clone(),
            source,
        })?;

        debug!("Persisted media index with {} records", records.len());
        Ok(())
    }
}

impl StorageGateway for DirectoryStorage {
    fn generate_filename(&self) -> String {
        Local::now().format("%Y%m%d%H%M%S").to_string()
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn path_for(&self, filename: &str) -> Result<PathBuf, StorageError> {
        let path = self.root.join(filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(path)
    }

    fn write_bytes(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(path)?;
            file.write_all(data)?;
            file.sync_all()
        };

        write().map_err(|source| {
            error!("Failed to write file {}: {}", path.display(), source);
            StorageError::Write {
                path: path.to_path_buf(),
                source,
            }
        })?;

        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    fn insert_record(&self, record: NewMediaRecord) -> Result<RecordRef, StorageError> {
        let id = RecordRef::new();
        let media = MediaRecord {
            id,
            display_name: format!("{}.{}", record.title, self.extension),
            title: record.title,
            mime_type: MIME_TYPE_JPEG.to_string(),
            taken_at: record.taken_at,
            orientation: record.orientation,
            size_bytes: record.size_bytes,
            path: record.path,
            width: record.width,
            height: record.height,
            location: record.location,
        };

        let mut index = self.index.write();
        index.insert(id, media);
        if let Err(e) = self.persist_index(&index) {
            error!("Failed to add image into media index: {}", e);
            index.remove(&id);
            return Err(e);
        }

        info!("Indexed picture as {}", id);
        Ok(id)
    }

    fn query_record(&self, record: &RecordRef) -> Result<Option<MediaRecord>, StorageError> {
        Ok(self.index.read().get(record).cloned())
    }

    fn delete_record(&self, record: &RecordRef) -> Result<(), StorageError> {
        let mut index = self.index.write();
        let removed = index
            .remove(record)
            .ok_or_else(|| StorageError::UnknownRecord(record.to_string()))?;

        if let Err(e) = self.persist_index(&index) {
            error!("Failed to delete image from media index: {}", e);
            index.insert(*record, removed);
            return Err(e);
        }

        match fs::remove_file(&removed.path) {
            Ok(()) => debug!("Removed {}", removed.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Picture file {} already gone", removed.path.display())
            }
            Err(e) => warn!("Failed to remove {}: {}", removed.path.display(), e),
        }

        info!("Deleted media record {}", record);
        Ok(())
    }
}

#[cfg(unix)]
#[allow(clippy::unnecessary_cast)]
fn free_bytes(path: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    // SAFETY: statvfs only writes into the zeroed struct we own
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return None;
    }

    Some(stat.f_bavail as u64 * stat.f_frsize as u64)
}

#[cfg(not(unix))]
fn free_bytes(_path: &Path) -> Option<u64> {
    None
}
