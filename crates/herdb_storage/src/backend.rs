//! Storage backend trait definition.

use crate::error::StorageResult;

/// A single byte stream used by a herdb segment.
///
/// Backends are **opaque byte stores**. The segment engine owns all
/// interpretation of index slots and log records; backends only move bytes.
///
/// # Invariants
///
/// - `append` returns the offset where data was written; the new end of the
///   stream is that offset plus the data length
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `read_block` reads from a sequential cursor that is independent of
///   `read_at` and `append`, and is reset by `rewind`
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The offset is beyond the current size
    /// - The read would extend beyond the current size
    /// - An I/O error occurs
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Reads the entire stream into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        self.read_at(0, size as usize)
    }

    /// Appends data to the end of the stream.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Moves the sequential read cursor back to the start of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor cannot be repositioned.
    fn rewind(&mut self) -> StorageResult<()>;

    /// Fills `buf` from the sequential read cursor and advances it.
    ///
    /// Returns the number of bytes placed in `buf`. A return value of `0`
    /// means the cursor is at the end of the stream. Fewer than `buf.len()`
    /// bytes are returned only when the end of the stream is reached.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read_block(&mut self, buf: &mut [u8]) -> StorageResult<usize>;

    /// Flushes all pending writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size of the stream in bytes.
    ///
    /// This is the offset where the next `append` will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// This is a stronger guarantee than `flush` - it ensures that
    /// file metadata (size, timestamps) is also durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the stream to the given size.
    ///
    /// The sequential cursor is clamped to the new size.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The truncation fails
    /// - `new_size` is greater than current size
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
