//! Data log record codec.
//!
//! ```text
//! | item_length: u32 | key_length: u32 | key | value |
//! ```
//!
//! `item_length` counts everything after itself, so a record occupies
//! `4 + item_length` bytes and `value_length = item_length - 4 - key_length`.

use crate::error::{CoreError, CoreResult};
use crate::packing::{get_u32, put_u32, U32_LEN};
use herdb_storage::StorageBackend;

/// Size of the two length fields in front of every record.
pub const RECORD_HEADER_LEN: usize = 2 * U32_LEN;

/// The fixed-size front of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Bytes following the `item_length` field.
    pub item_length: u32,
    /// Length of the key.
    pub key_length: u32,
}

impl RecordHeader {
    /// Header for a record holding `key_len` and `value_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `RecordTooLarge` if the record cannot be described in 32 bits.
    pub fn for_lengths(key_len: usize, value_len: usize) -> CoreResult<Self> {
        let too_large = || CoreError::RecordTooLarge {
            size: RECORD_HEADER_LEN
                .saturating_add(key_len)
                .saturating_add(value_len),
            max: u32::MAX as usize,
        };
        let item = U32_LEN
            .checked_add(key_len)
            .and_then(|n| n.checked_add(value_len))
            .ok_or_else(too_large)?;
        Ok(Self {
            item_length: u32::try_from(item).map_err(|_| too_large())?,
            key_length: u32::try_from(key_len).map_err(|_| too_large())?,
        })
    }

    /// Parses and checks a header read at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if the key does not fit in the item.
    pub fn parse(bytes: &[u8], offset: u64) -> CoreResult<Self> {
        if bytes.len() < RECORD_HEADER_LEN {
            return Err(CoreError::malformed(offset, "truncated header"));
        }
        let header = Self {
            item_length: get_u32(bytes),
            key_length: get_u32(&bytes[U32_LEN..]),
        };
        if u64::from(header.item_length) < U32_LEN as u64 + u64::from(header.key_length) {
            return Err(CoreError::malformed(
                offset,
                format!(
                    "key length {} does not fit in item length {}",
                    header.key_length, header.item_length
                ),
            ));
        }
        Ok(header)
    }

    /// Writes the header into the first [`RECORD_HEADER_LEN`] bytes of `buf`.
    pub fn encode_into(&self, buf: &mut [u8]) {
        put_u32(buf, self.item_length);
        put_u32(&mut buf[U32_LEN..], self.key_length);
    }

    /// Length of the value.
    #[must_use]
    pub const fn value_length(&self) -> u32 {
        self.item_length - U32_LEN as u32 - self.key_length
    }

    /// Total bytes the record occupies in the log.
    #[must_use]
    pub const fn total_len(&self) -> usize {
        U32_LEN + self.item_length as usize
    }
}

/// Encodes a key/value pair as one log record.
///
/// # Errors
///
/// Returns `RecordTooLarge` if the record cannot be described in 32 bits.
pub fn encode_record(key: &[u8], value: &[u8]) -> CoreResult<Vec<u8>> {
    let header = RecordHeader::for_lengths(key.len(), value.len())?;
    let mut buf = vec![0u8; RECORD_HEADER_LEN];
    header.encode_into(&mut buf);
    buf.reserve_exact(key.len() + value.len());
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
    Ok(buf)
}

/// Splits an encoded record into key and value.
///
/// # Errors
///
/// Returns `MalformedRecord` if `bytes` is not exactly one record.
pub fn decode_record(bytes: &[u8], offset: u64) -> CoreResult<(&[u8], &[u8])> {
    let header = RecordHeader::parse(bytes, offset)?;
    if bytes.len() != header.total_len() {
        return Err(CoreError::malformed(
            offset,
            format!(
                "record spans {} bytes, found {}",
                header.total_len(),
                bytes.len()
            ),
        ));
    }
    let body = &bytes[RECORD_HEADER_LEN..];
    Ok(body.split_at(header.key_length as usize))
}

/// Reads the header and key of the record at `offset`.
///
/// # Errors
///
/// Returns an error if the read fails or the header is malformed.
pub fn read_key(
    log: &dyn StorageBackend,
    offset: u64,
) -> CoreResult<(RecordHeader, Vec<u8>)> {
    let header_bytes = log.read_at(offset, RECORD_HEADER_LEN)?;
    let header = RecordHeader::parse(&header_bytes, offset)?;
    let key = log.read_at(
        offset + RECORD_HEADER_LEN as u64,
        header.key_length as usize,
    )?;
    Ok((header, key))
}

/// Reads the value of the record at `offset` whose header is known.
///
/// # Errors
///
/// Returns an error if the read fails.
pub fn read_value(
    log: &dyn StorageBackend,
    offset: u64,
    header: &RecordHeader,
) -> CoreResult<Vec<u8>> {
    let start = offset + RECORD_HEADER_LEN as u64 + u64::from(header.key_length);
    Ok(log.read_at(start, header.value_length() as usize)?)
}
