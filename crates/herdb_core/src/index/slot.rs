//! Slot codec.
//!
//! A slot is 13 bytes on disk:
//!
//! ```text
//! | hash: u32 | offset: u40 | attached: u32 |
//! ```
//!
//! `hash == 0` marks an empty slot and `attached == 0` ends a chain.

use crate::error::CoreResult;
use crate::packing::{get_offset, get_u32, put_offset, put_u32, OFFSET_LEN, U32_LEN};

/// Encoded size of one slot.
pub const SLOT_LEN: usize = U32_LEN + OFFSET_LEN + U32_LEN;

const OFFSET_AT: usize = U32_LEN;
const ATTACHED_AT: usize = U32_LEN + OFFSET_LEN;

/// One hash bucket or chain link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slot {
    /// Key hash of the referenced record, `0` if the slot is empty.
    pub hash: u32,
    /// Data log offset of the newest record for the key.
    pub offset: u64,
    /// Index of the next slot in the chain, `0` at the end.
    pub attached: u32,
}

impl Slot {
    /// The empty slot.
    pub const EMPTY: Self = Self {
        hash: 0,
        offset: 0,
        attached: 0,
    };

    /// Creates a slot.
    #[must_use]
    pub const fn new(hash: u32, offset: u64, attached: u32) -> Self {
        Self {
            hash,
            offset,
            attached,
        }
    }

    /// Returns true if no key occupies this slot.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.hash == 0
    }

    /// Writes this slot into the first [`SLOT_LEN`] bytes of `buf`.
    ///
    /// # Errors
    ///
    /// Returns `OffsetOverflow` if the offset does not fit in 40 bits.
    pub fn encode_into(&self, buf: &mut [u8]) -> CoreResult<()> {
        put_u32(buf, self.hash);
        put_offset(&mut buf[OFFSET_AT..], self.offset)?;
        put_u32(&mut buf[ATTACHED_AT..], self.attached);
        Ok(())
    }

    /// Reads a slot from the first [`SLOT_LEN`] bytes of `buf`.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            hash: get_u32(buf),
            offset: get_offset(&buf[OFFSET_AT..]),
            attached: get_u32(&buf[ATTACHED_AT..]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_layout() {
        let slot = Slot::new(0x0102_0304, 0x05_0607_0809, 0x0A0B_0C0D);
        let mut buf = [0u8; SLOT_LEN];
        slot.encode_into(&mut buf).unwrap();
        assert_eq!(
            buf,
            [1, 2, 3, 4, 5, 6, 7, 8, 9, 0x0A, 0x0B, 0x0C, 0x0D]
        );
        assert_eq!(Slot::decode(&buf), slot);
    }

    #[test]
    fn empty_slot_is_zeroes() {
        let mut buf = [0xFFu8; SLOT_LEN];
        Slot::EMPTY.encode_into(&mut buf).unwrap();
        assert_eq!(buf, [0u8; SLOT_LEN]);
        assert!(Slot::decode(&buf).is_empty());
    }
}
