//! Key hashing.
//!
//! Two independent hashes are computed per key:
//!
//! - [`bucket_hash`] picks the primary bucket (FNV-1a with a final
//!   avalanche, sign bit stripped).
//! - [`key_hash`] is stored in the slot to reject most mismatches before
//!   a disk read. It is never zero, since zero marks an empty slot.
//!
//! Both treat key bytes as signed so that hashes agree with existing
//! stores written by other implementations of the format.

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: i32 = 16_777_619;

/// Bucket selection hash. Always non-negative when viewed as `i32`.
#[must_use]
pub fn bucket_hash(key: &[u8]) -> u32 {
    let mut h = FNV_OFFSET_BASIS as i32;
    for &b in key {
        h = (h ^ i32::from(b as i8)).wrapping_mul(FNV_PRIME);
    }
    h = h.wrapping_add(h << 13);
    h ^= h >> 7;
    h = h.wrapping_add(h << 3);
    h ^= h >> 17;
    h = h.wrapping_add(h << 5);
    // i32::MIN has no positive counterpart and stays as is.
    h.wrapping_abs() as u32
}

/// Slot discriminator hash. Never zero.
#[must_use]
pub fn key_hash(key: &[u8]) -> u32 {
    let h = key
        .iter()
        .fold(1i32, |h, &b| h.wrapping_mul(31).wrapping_add(i32::from(b as i8)));
    if h == 0 {
        1
    } else {
        h as u32
    }
}

/// Index of the segment owning `key` among `segments` shards.
#[must_use]
pub fn segment_for(key: &[u8], segments: u32) -> u32 {
    key_hash(key) % segments.max(1)
}
