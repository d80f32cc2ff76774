//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::dir::StorageDir;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type SharedBuffer = Arc<RwLock<Vec<u8>>>;

/// An in-memory storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// Backends handed out by the same [`InMemoryDir`] entry share one buffer,
/// so a reopened stream observes earlier appends.
///
/// # Example
///
/// ```rust
/// use herdb_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"test data").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: SharedBuffer,
    cursor: u64,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing data.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            cursor: 0,
        }
    }

    fn shared(data: SharedBuffer) -> Self {
        Self { data, cursor: 0 }
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let offset_usize = offset as usize;
        let end = offset_usize.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset_usize..end].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn rewind(&mut self) -> StorageResult<()> {
        self.cursor = 0;
        Ok(())
    }

    fn read_block(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        let data = self.data.read();
        let start = (self.cursor as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.cursor += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> StorageResult<()> {
        // No pending writes
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let current_size = data.len() as u64;

        if new_size > current_size {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to size {} which is greater than current size {}",
                    new_size, current_size
                ),
            )));
        }

        data.truncate(new_size as usize);
        self.cursor = self.cursor.min(new_size);
        Ok(())
    }
}

/// An in-memory directory of streams.
///
/// Cloning the directory shares the underlying namespace, which lets a
/// test "reopen" a store and see everything the previous handle wrote.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDir {
    files: Arc<RwLock<HashMap<String, SharedBuffer>>>,
}

impl InMemoryDir {
    /// Creates a new empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sorted names of all streams.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns a copy of the contents of `name`, if it exists.
    #[must_use]
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.files.read().get(name).map(|buf| buf.read().clone())
    }
}

impl StorageDir for InMemoryDir {
    fn open(&self, name: &str) -> StorageResult<Box<dyn StorageBackend>> {
        let buffer = Arc::clone(self.files.write().entry(name.to_string()).or_default());
        Ok(Box::new(InMemoryBackend::shared(buffer)))
    }

    fn exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn remove(&self, name: &str) -> StorageResult<bool> {
        Ok(self.files.write().remove(name).is_some())
    }

    fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        let mut files = self.files.write();
        let buffer = files.remove(from).ok_or_else(|| StorageError::not_found(from))?;
        files.insert(to.to_string(), buffer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(backend.data().is_empty());
    }

    #[test]
    fn memory_append_returns_correct_offset() {
        let mut backend = InMemoryBackend::new();

        let offset1 = backend.append(b"hello").unwrap();
        assert_eq!(offset1, 0);

        let offset2 = backend.append(b" world").unwrap();
        assert_eq!(offset2, 5);

        assert_eq!(backend.size().unwrap(), 11);
    }

    #[test]
    fn memory_read_at_returns_correct_data() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"hello world").unwrap();

        assert_eq!(backend.read_at(0, 5).unwrap(), b"hello");
        assert_eq!(backend.read_at(6, 5).unwrap(), b"world");
    }

    #[test]
    fn memory_read_at_extending_past_end_fails() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"hello").unwrap();

        let result = backend.read_at(3, 10);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn memory_with_data() {
        let backend = InMemoryBackend::with_data(b"preloaded".to_vec());
        assert_eq!(backend.size().unwrap(), 9);
        assert_eq!(backend.read_all().unwrap(), b"preloaded");
    }

    #[test]
    fn memory_read_blocks() {
        let mut backend = InMemoryBackend::with_data(b"abcdefg".to_vec());
        let mut buf = [0u8; 3];

        assert_eq!(backend.read_block(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"abc");
        assert_eq!(backend.read_block(&mut buf).unwrap(), 3);
        assert_eq!(backend.read_block(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'g');
        assert_eq!(backend.read_block(&mut buf).unwrap(), 0);

        backend.rewind().unwrap();
        assert_eq!(backend.read_block(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn memory_truncate_partial() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"hello world").unwrap();

        backend.truncate(5).unwrap();
        assert_eq!(backend.size().unwrap(), 5);
        assert_eq!(backend.read_at(0, 5).unwrap(), b"hello");
        assert!(backend.truncate(100).is_err());
    }

    #[test]
    fn dir_reopen_sees_previous_appends() {
        let dir = InMemoryDir::new();
        let mut first = dir.open("seg.data").unwrap();
        first.append(b"record").unwrap();
        drop(first);

        let second = dir.open("seg.data").unwrap();
        assert_eq!(second.read_all().unwrap(), b"record");
        assert_eq!(dir.contents("seg.data").unwrap(), b"record");
    }

    #[test]
    fn dir_rename_moves_contents() {
        let dir = InMemoryDir::new();
        dir.open("seg.data").unwrap().append(b"old").unwrap();
        dir.open("seg.tmp").unwrap().append(b"new").unwrap();

        dir.rename("seg.tmp", "seg.data").unwrap();

        assert_eq!(dir.names(), vec!["seg.data".to_string()]);
        assert_eq!(dir.contents("seg.data").unwrap(), b"new");
        assert!(matches!(
            dir.rename("seg.tmp", "x"),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn dir_removed_stream_stays_readable_through_open_handle() {
        let dir = InMemoryDir::new();
        let mut handle = dir.open("seg.data").unwrap();
        handle.append(b"kept").unwrap();

        assert!(dir.remove("seg.data").unwrap());
        assert!(!dir.exists("seg.data"));
        assert_eq!(handle.read_all().unwrap(), b"kept");
    }

    proptest::proptest! {
        #[test]
        fn blocks_reassemble_contents(
            data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..512),
            block in 1usize..64,
        ) {
            let mut backend = InMemoryBackend::with_data(data.clone());
            let mut buf = vec![0u8; block];
            let mut seen = Vec::new();
            loop {
                let n = backend.read_block(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                seen.extend_from_slice(&buf[..n]);
            }
            proptest::prop_assert_eq!(seen, data);
        }
    }

    #[test]
    fn dir_recreate_starts_empty() {
        let dir = InMemoryDir::new();
        dir.open("seg.index").unwrap().append(b"stale").unwrap();

        let fresh = dir.recreate("seg.index").unwrap();
        assert_eq!(fresh.size().unwrap(), 0);
    }
}
