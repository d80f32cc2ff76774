//! Buffered block I/O for sequential log passes.
//!
//! Resize, recovery and verification all stream a data log through a
//! fixed-size [`ReadBlock`]. Block boundaries fall anywhere, so a record
//! may start in one block and end several blocks later. [`RecordScanner`]
//! keeps the unfinished bytes between blocks and hands out whole records.

use crate::error::{CoreError, CoreResult};
use crate::record::{RecordHeader, RECORD_HEADER_LEN};
use herdb_storage::StorageBackend;

/// A fixed-capacity input buffer.
///
/// `limit` is how many bytes the last fill produced and `position` is how
/// far they have been consumed.
#[derive(Debug)]
pub struct ReadBlock {
    buf: Vec<u8>,
    position: usize,
    limit: usize,
}

impl ReadBlock {
    /// Creates a block of `size` bytes.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            buf: vec![0; size.max(1)],
            position: 0,
            limit: 0,
        }
    }

    /// Reads the next block from `source`, discarding unconsumed bytes.
    ///
    /// Returns the number of bytes read, `0` at end of stream.
    pub fn fill(&mut self, source: &mut dyn StorageBackend) -> CoreResult<usize> {
        let n = source.read_block(&mut self.buf)?;
        self.position = 0;
        self.limit = n;
        Ok(n)
    }

    /// Unconsumed bytes.
    #[must_use]
    pub fn left(&self) -> usize {
        self.limit - self.position
    }

    /// The unconsumed bytes.
    #[must_use]
    pub fn remaining(&self) -> &[u8] {
        &self.buf[self.position..self.limit]
    }

    /// Marks `n` bytes as consumed.
    pub fn advance(&mut self, n: usize) {
        self.position = (self.position + n).min(self.limit);
    }

    /// Capacity of the block.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

/// A fixed-capacity output buffer flushed to a stream when full.
#[derive(Debug)]
pub struct WriteBlock {
    buf: Vec<u8>,
    capacity: usize,
    written: u64,
}

impl WriteBlock {
    /// Creates a block of `size` bytes.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let capacity = size.max(1);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            written: 0,
        }
    }

    /// Queues `bytes` for `sink`, flushing first if they do not fit.
    ///
    /// Returns the stream offset at which `bytes` will land. Inputs larger
    /// than the block bypass it.
    pub fn write(&mut self, bytes: &[u8], sink: &mut dyn StorageBackend) -> CoreResult<u64> {
        let offset = self.position();
        if self.buf.len() + bytes.len() > self.capacity {
            self.flush(sink)?;
        }
        if bytes.len() > self.capacity {
            sink.append(bytes)?;
            self.written += bytes.len() as u64;
        } else {
            self.buf.extend_from_slice(bytes);
        }
        Ok(offset)
    }

    /// Appends buffered bytes to `sink` and empties the block.
    pub fn flush(&mut self, sink: &mut dyn StorageBackend) -> CoreResult<()> {
        if !self.buf.is_empty() {
            sink.append(&self.buf)?;
            self.written += self.buf.len() as u64;
            self.buf.clear();
        }
        Ok(())
    }

    /// Stream offset of the next byte written, counting buffered bytes.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.written + self.buf.len() as u64
    }
}

/// A whole record recovered from a log scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedRecord {
    /// Offset of the record's length prefix.
    pub offset: u64,
    /// Parsed header.
    pub header: RecordHeader,
    /// The full encoded record, header included.
    pub bytes: Vec<u8>,
}

impl ScannedRecord {
    /// The key bytes.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.bytes[RECORD_HEADER_LEN..RECORD_HEADER_LEN + self.header.key_length as usize]
    }

    /// The value bytes.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.bytes[RECORD_HEADER_LEN + self.header.key_length as usize..]
    }
}

/// Streaming record parser.
///
/// Its only state between blocks is `carry`, the bytes of a record whose
/// end has not been seen yet, plus the log offset of the next record.
/// When `carry` is empty, records are cut straight out of the block.
#[derive(Debug, Default)]
pub struct RecordScanner {
    carry: Vec<u8>,
    offset: u64,
}

impl RecordScanner {
    /// Creates a scanner positioned at log offset 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next whole record, or `None` once `block` is used up.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if a header is inconsistent.
    pub fn next_record(&mut self, block: &mut ReadBlock) -> CoreResult<Option<ScannedRecord>> {
        if self.carry.is_empty() {
            let available = block.remaining();
            if available.len() >= RECORD_HEADER_LEN {
                let header = RecordHeader::parse(available, self.offset)?;
                let total = header.total_len();
                if available.len() >= total {
                    let record = ScannedRecord {
                        offset: self.offset,
                        header,
                        bytes: available[..total].to_vec(),
                    };
                    block.advance(total);
                    self.offset += total as u64;
                    return Ok(Some(record));
                }
            }
            let n = available.len();
            self.carry.extend_from_slice(available);
            block.advance(n);
            return Ok(None);
        }

        if self.carry.len() < RECORD_HEADER_LEN {
            self.take(block, RECORD_HEADER_LEN - self.carry.len());
            if self.carry.len() < RECORD_HEADER_LEN {
                return Ok(None);
            }
        }
        let header = RecordHeader::parse(&self.carry, self.offset)?;
        let total = header.total_len();
        self.take(block, total - self.carry.len());
        if self.carry.len() < total {
            return Ok(None);
        }

        let record = ScannedRecord {
            offset: self.offset,
            header,
            bytes: std::mem::take(&mut self.carry),
        };
        self.offset += total as u64;
        Ok(Some(record))
    }

    fn take(&mut self, block: &mut ReadBlock, wanted: usize) {
        let n = wanted.min(block.left());
        self.carry.extend_from_slice(&block.remaining()[..n]);
        block.advance(n);
    }

    /// Checks that the input ended on a record boundary.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if a partial record is left over.
    pub fn finish(self) -> CoreResult<u64> {
        if self.carry.is_empty() {
            Ok(self.offset)
        } else {
            Err(CoreError::malformed(
                self.offset,
                format!("log ends {} bytes into a record", self.carry.len()),
            ))
        }
    }
}

/// Streams every record of `log` from the start through `block_size` blocks.
///
/// Returns the number of bytes scanned.
///
/// # Errors
///
/// Returns the first error from reading, parsing, or `visit`.
pub fn for_each_record(
    log: &mut dyn StorageBackend,
    block_size: usize,
    mut visit: impl FnMut(ScannedRecord) -> CoreResult<()>,
) -> CoreResult<u64> {
    log.rewind()?;
    let mut block = ReadBlock::new(block_size);
    let mut scanner = RecordScanner::new();
    while block.fill(log)? > 0 {
        while let Some(record) = scanner.next_record(&mut block)? {
            visit(record)?;
        }
    }
    scanner.finish()
}
