//! Storage directory trait definition.

use crate::backend::StorageBackend;
use crate::error::StorageResult;

/// A flat namespace of named byte streams.
///
/// Every file a segment touches (index, data log, compaction temp) is
/// reached through this trait, which lets the whole engine run against
/// either the filesystem or memory.
pub trait StorageDir: Send + Sync {
    /// Opens the stream called `name`, creating an empty one if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be opened or created.
    fn open(&self, name: &str) -> StorageResult<Box<dyn StorageBackend>>;

    /// Returns whether a stream called `name` exists.
    fn exists(&self, name: &str) -> bool;

    /// Removes the stream called `name`.
    ///
    /// Returns `true` if a stream was removed and `false` if none existed.
    /// Handles that are already open keep reading their old contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    fn remove(&self, name: &str) -> StorageResult<bool>;

    /// Renames `from` to `to`, replacing `to` if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotFound`] if `from` does not exist,
    /// or an I/O error if the rename fails.
    fn rename(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Opens `name` as a fresh, empty stream, discarding previous contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the old stream cannot be removed or the new
    /// one cannot be created.
    fn recreate(&self, name: &str) -> StorageResult<Box<dyn StorageBackend>> {
        self.remove(name)?;
        self.open(name)
    }
}
