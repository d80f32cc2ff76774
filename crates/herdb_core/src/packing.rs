//! Fixed-width big-endian integer packing.
//!
//! Every number that crosses the byte boundary in an index or data log
//! goes through here: 4-byte unsigned integers and 5-byte offsets.

use crate::error::{CoreError, CoreResult};

/// Width of a packed `u32`.
pub const U32_LEN: usize = 4;

/// Width of a packed offset.
pub const OFFSET_LEN: usize = 5;

/// Largest offset representable in [`OFFSET_LEN`] bytes.
pub const MAX_OFFSET: u64 = (1 << 40) - 1;

/// Writes `value` big-endian into the first four bytes of `buf`.
///
/// # Panics
///
/// Panics if `buf` is shorter than four bytes.
#[inline]
pub fn put_u32(buf: &mut [u8], value: u32) {
    buf[..U32_LEN].copy_from_slice(&value.to_be_bytes());
}

/// Reads a big-endian `u32` from the first four bytes of `buf`.
///
/// # Panics
///
/// Panics if `buf` is shorter than four bytes.
#[inline]
#[must_use]
pub fn get_u32(buf: &[u8]) -> u32 {
    u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Writes a 40-bit offset big-endian into the first five bytes of `buf`.
///
/// # Errors
///
/// Returns `OffsetOverflow` if `offset` exceeds [`MAX_OFFSET`].
pub fn put_offset(buf: &mut [u8], offset: u64) -> CoreResult<()> {
    if offset > MAX_OFFSET {
        return Err(CoreError::OffsetOverflow { offset });
    }
    buf[..OFFSET_LEN].copy_from_slice(&offset.to_be_bytes()[3..]);
    Ok(())
}

/// Reads a 40-bit big-endian offset from the first five bytes of `buf`.
#[inline]
#[must_use]
pub fn get_offset(buf: &[u8]) -> u64 {
    buf[..OFFSET_LEN]
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}
