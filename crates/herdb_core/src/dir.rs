//! Store directory management.
//!
//! This module handles the file system layout for herdb:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK              # Advisory lock for single-writer
//! ├─ herdb.conf        # Layout the store was created with (JSON)
//! ├─ segment0.index    # Per-segment index
//! ├─ segment0.data     # Per-segment data log
//! └─ ...
//! ```
//!
//! The LOCK file ensures only one process can open the store at a time.
//! `herdb.conf` pins the values that must not change once data exists.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use herdb_storage::FileDir;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const MANIFEST_FILE: &str = "herdb.conf";
const MANIFEST_TEMP: &str = "herdb.conf.tmp";

/// Current manifest format version.
pub const FORMAT_VERSION: u32 = 1;

/// Layout settings persisted when a store is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreManifest {
    /// Manifest format version.
    pub format_version: u32,
    /// Number of segments keys are sharded across.
    pub segments: u32,
    /// Capacity of a freshly created segment index.
    pub initial_capacity: u32,
    /// Largest capacity a segment index may grow to.
    pub max_capacity: u32,
}

impl StoreManifest {
    /// Captures the layout part of `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            segments: config.segments,
            initial_capacity: config.initial_capacity,
            max_capacity: config.max_capacity,
        }
    }

    /// Returns `config` with the persisted layout applied over it.
    #[must_use]
    pub fn apply(&self, config: &Config) -> Config {
        Config {
            segments: self.segments,
            initial_capacity: self.initial_capacity,
            max_capacity: self.max_capacity,
            ..config.clone()
        }
    }
}

/// Manages the store directory and its exclusive lock.
///
/// Only one `StoreDir` can exist per directory at a time; the lock is
/// released when it is dropped.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `StoreLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the manifest.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    /// Returns a stream directory rooted at the store path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened.
    pub fn storage(&self) -> CoreResult<FileDir> {
        Ok(FileDir::open(&self.path)?)
    }

    /// Loads the manifest, or `None` for a new store.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest exists but cannot be read or parsed.
    pub fn load_manifest(&self) -> CoreResult<Option<StoreManifest>> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;
        if data.is_empty() {
            return Ok(None);
        }
        let manifest: StoreManifest = serde_json::from_slice(&data)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported manifest version {}",
                manifest.format_version
            )));
        }
        Ok(Some(manifest))
    }

    /// Saves the manifest using write-then-rename.
    ///
    /// # Errors
    ///
    /// Returns an error if writing, syncing, or renaming fails.
    pub fn save_manifest(&self, manifest: &StoreManifest) -> CoreResult<()> {
        let temp_path = self.path.join(MANIFEST_TEMP);
        let data = serde_json::to_vec_pretty(manifest)?;

        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.manifest_path())?;
        self.sync_directory()?;
        Ok(())
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        let dir = StoreDir::open(&path, true).unwrap();
        assert!(path.is_dir());
        assert!(path.join(LOCK_FILE).exists());
        assert_eq!(dir.path(), path);
    }

    #[test]
    fn open_missing_without_create_fails() {
        let temp = tempdir().unwrap();
        let result = StoreDir::open(&temp.path().join("absent"), false);
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn second_open_is_locked() {
        let temp = tempdir().unwrap();
        let _first = StoreDir::open(temp.path(), true).unwrap();
        assert!(matches!(
            StoreDir::open(temp.path(), true),
            Err(CoreError::StoreLocked)
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        drop(StoreDir::open(temp.path(), true).unwrap());
        StoreDir::open(temp.path(), true).unwrap();
    }

    #[test]
    fn manifest_persists() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path(), true).unwrap();
        assert_eq!(dir.load_manifest().unwrap(), None);

        let manifest = StoreManifest::from_config(&Config::new().segments(3));
        dir.save_manifest(&manifest).unwrap();
        assert_eq!(dir.load_manifest().unwrap(), Some(manifest));
        assert!(!temp.path().join(MANIFEST_TEMP).exists());
    }

    #[test]
    fn manifest_wins_over_config() {
        let manifest = StoreManifest::from_config(&Config::new().segments(3).max_capacity(1 << 10));
        let config = manifest.apply(&Config::new().segments(9).cache_size(77));
        assert_eq!(config.segments, 3);
        assert_eq!(config.max_capacity, 1 << 10);
        assert_eq!(config.cache_size, 77);
    }

    #[test]
    fn unknown_manifest_version_is_rejected() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path(), true).unwrap();
        let mut manifest = StoreManifest::from_config(&Config::default());
        manifest.format_version = 99;
        dir.save_manifest(&manifest).unwrap();
        assert!(matches!(
            dir.load_manifest(),
            Err(CoreError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn corrupt_manifest_is_a_serialization_error() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path(), true).unwrap();
        fs::write(dir.manifest_path(), b"{ not json").unwrap();
        assert!(matches!(
            dir.load_manifest(),
            Err(CoreError::Serialization(_))
        ));
    }
}
