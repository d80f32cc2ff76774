//! Flat slot table.
//!
//! ```text
//! | capacity: u32 | current: u32 | slot[0] .. slot[2 * capacity - 1] |
//! ```
//!
//! Slots `0..capacity` are primary buckets. Slots `capacity..2 * capacity`
//! form the overflow pool, handed out in order by a bump pointer
//! (`current`). Chains are linked by slot index, never by reference.

use super::slot::{Slot, SLOT_LEN};
use crate::error::{CoreError, CoreResult};
use crate::packing::{get_u32, put_u32, U32_LEN};

/// Size of the `{capacity, current}` header.
pub const HEADER_LEN: usize = 2 * U32_LEN;

/// Largest supported capacity. Keeps `2 * capacity` slot indexes in `u32`.
pub const CAPACITY_LIMIT: u32 = 1 << 30;

/// An in-memory index: primary buckets plus an overflow pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMemory {
    capacity: u32,
    current: u32,
    slots: Vec<Slot>,
}

impl IndexMemory {
    /// Creates an empty index with `capacity` primary buckets.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` unless `capacity` is a power of two no
    /// larger than [`CAPACITY_LIMIT`].
    pub fn new(capacity: u32) -> CoreResult<Self> {
        check_capacity(capacity)?;
        Ok(Self {
            capacity,
            current: 0,
            slots: vec![Slot::EMPTY; 2 * capacity as usize],
        })
    }

    /// Number of primary buckets.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of overflow slots handed out.
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.current
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    /// Returns the slot at `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is outside the table.
    #[must_use]
    pub fn slot_at(&self, i: u32) -> Slot {
        self.slots[i as usize]
    }

    /// Key hash stored at `i`.
    #[must_use]
    pub fn hash_of(&self, i: u32) -> u32 {
        self.slot_at(i).hash
    }

    /// Data offset stored at `i`.
    #[must_use]
    pub fn offset_of(&self, i: u32) -> u64 {
        self.slot_at(i).offset
    }

    /// Chain successor of `i`, `0` if none.
    #[must_use]
    pub fn attached_of(&self, i: u32) -> u32 {
        self.slot_at(i).attached
    }

    /// Overwrites the whole slot at `i`.
    pub fn replace_slot(&mut self, i: u32, hash: u32, offset: u64, attached: u32) {
        self.slots[i as usize] = Slot::new(hash, offset, attached);
    }

    /// Makes `next` the chain successor of `prev`.
    pub fn link(&mut self, prev: u32, next: u32) {
        self.slots[prev as usize].attached = next;
    }

    /// Primary bucket for a bucket hash.
    #[must_use]
    pub const fn bucket_for(&self, hash: u32) -> u32 {
        hash & (self.capacity - 1)
    }

    /// Returns true if the overflow pool still has a free slot.
    #[must_use]
    pub const fn has_overflow(&self) -> bool {
        self.current < self.capacity
    }

    /// Hands out the next free overflow slot.
    ///
    /// # Errors
    ///
    /// Returns `IndexFull` once all `capacity` overflow slots are used.
    pub fn next_overflow(&mut self) -> CoreResult<u32> {
        if !self.has_overflow() {
            return Err(CoreError::IndexFull {
                capacity: self.capacity,
            });
        }
        Ok(self.next_overflow_unchecked())
    }

    /// Hands out the next overflow slot without checking for exhaustion.
    ///
    /// Only for filling a fresh table that is known to have room, as
    /// when a resize copies the live keys of a table half its size.
    pub fn next_overflow_unchecked(&mut self) -> u32 {
        debug_assert!(self.has_overflow(), "overflow pool exhausted");
        let i = self.capacity + self.current;
        self.current += 1;
        i
    }

    /// Adds a key known to be absent from this table.
    ///
    /// # Errors
    ///
    /// Returns `IndexFull` if a chain slot is needed and none is left.
    pub fn insert_new(&mut self, bucket_hash: u32, key_hash: u32, offset: u64) -> CoreResult<()> {
        if let Some(tail) = self.place_in_bucket(bucket_hash, key_hash, offset) {
            let next = self.next_overflow()?;
            self.append_to_chain(tail, next, key_hash, offset);
        }
        Ok(())
    }

    /// Adds a key known to be absent, drawing chain slots unchecked.
    pub fn insert_new_unchecked(&mut self, bucket_hash: u32, key_hash: u32, offset: u64) {
        if let Some(tail) = self.place_in_bucket(bucket_hash, key_hash, offset) {
            let next = self.next_overflow_unchecked();
            self.append_to_chain(tail, next, key_hash, offset);
        }
    }

    /// Fills the primary bucket if it is empty, otherwise returns the
    /// tail of its chain without writing anything.
    fn place_in_bucket(&mut self, bucket_hash: u32, key_hash: u32, offset: u64) -> Option<u32> {
        let bucket = self.bucket_for(bucket_hash);
        if self.slot_at(bucket).is_empty() {
            self.replace_slot(bucket, key_hash, offset, 0);
            return None;
        }
        self.chain(bucket).last()
    }

    fn append_to_chain(&mut self, tail: u32, next: u32, key_hash: u32, offset: u64) {
        self.replace_slot(next, key_hash, offset, 0);
        self.link(tail, next);
    }

    /// Iterates the slot indexes of the chain rooted at `bucket`.
    ///
    /// Stops after visiting every slot once, so a corrupted cycle cannot
    /// loop forever.
    pub fn chain(&self, bucket: u32) -> impl Iterator<Item = u32> + '_ {
        let mut next = Some(bucket);
        let mut budget = self.slots.len();
        std::iter::from_fn(move || {
            let i = next?;
            if budget == 0 || self.slot_at(i).is_empty() {
                return None;
            }
            budget -= 1;
            let attached = self.attached_of(i);
            next = (attached != 0).then_some(attached);
            Some(i)
        })
    }

    /// Size in bytes of the encoded table.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.slots.len() * SLOT_LEN
    }

    /// Serializes the header and the slot table.
    ///
    /// # Errors
    ///
    /// Returns `OffsetOverflow` if a slot offset exceeds 40 bits.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut buf = vec![0u8; self.encoded_len()];
        put_u32(&mut buf, self.capacity);
        put_u32(&mut buf[U32_LEN..], self.current);
        for (slot, chunk) in self
            .slots
            .iter()
            .zip(buf[HEADER_LEN..].chunks_exact_mut(SLOT_LEN))
        {
            slot.encode_into(chunk)?;
        }
        Ok(buf)
    }

    /// Deserializes a table written by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the header is out of range, the length
    /// does not match the capacity, or a chain link points outside the
    /// handed-out overflow slots.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CoreError::invalid_format(format!(
                "index of {} bytes is shorter than its header",
                bytes.len()
            )));
        }
        let capacity = get_u32(bytes);
        let current = get_u32(&bytes[U32_LEN..]);
        check_capacity(capacity).map_err(|_| {
            CoreError::invalid_format(format!("index capacity {capacity} is not a power of two"))
        })?;
        if current > capacity {
            return Err(CoreError::invalid_format(format!(
                "index overflow pointer {current} exceeds capacity {capacity}"
            )));
        }
        let expected = HEADER_LEN + 2 * capacity as usize * SLOT_LEN;
        if bytes.len() != expected {
            return Err(CoreError::invalid_format(format!(
                "index is {} bytes, expected {expected} for capacity {capacity}",
                bytes.len()
            )));
        }

        let slots: Vec<Slot> = bytes[HEADER_LEN..]
            .chunks_exact(SLOT_LEN)
            .map(Slot::decode)
            .collect();
        let handed_out = capacity..capacity + current;
        if let Some(bad) = slots
            .iter()
            .find(|s| s.attached != 0 && !handed_out.contains(&s.attached))
        {
            return Err(CoreError::invalid_format(format!(
                "chain link {} outside overflow slots {handed_out:?}",
                bad.attached
            )));
        }

        Ok(Self {
            capacity,
            current,
            slots,
        })
    }

    /// Largest offset referenced by any slot.
    #[must_use]
    pub fn max_offset(&self) -> Option<u64> {
        self.slots
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.offset)
            .max()
    }
}

fn check_capacity(capacity: u32) -> CoreResult<()> {
    if capacity == 0 || !capacity.is_power_of_two() || capacity > CAPACITY_LIMIT {
        return Err(CoreError::invalid_config(format!(
            "index capacity {capacity} must be a power of two in 1..={CAPACITY_LIMIT}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_index_is_empty() {
        let index = IndexMemory::new(4).unwrap();
        assert_eq!(index.capacity(), 4);
        assert_eq!(index.current(), 0);
        assert_eq!(index.occupied(), 0);
        assert_eq!(index.max_offset(), None);
    }

    #[test]
    fn capacity_must_be_power_of_two() {
        assert!(IndexMemory::new(0).is_err());
        assert!(IndexMemory::new(6).is_err());
        assert!(IndexMemory::new(1).is_ok());
    }

    #[test]
    fn bucket_masks_hash() {
        let index = IndexMemory::new(8).unwrap();
        assert_eq!(index.bucket_for(0), 0);
        assert_eq!(index.bucket_for(13), 5);
        assert_eq!(index.bucket_for(u32::MAX), 7);
    }

    #[test]
    fn overflow_pool_exhausts() {
        let mut index = IndexMemory::new(2).unwrap();
        assert_eq!(index.next_overflow().unwrap(), 2);
        assert_eq!(index.next_overflow().unwrap(), 3);
        assert!(matches!(
            index.next_overflow(),
            Err(CoreError::IndexFull { capacity: 2 })
        ));
        assert_eq!(index.current(), 2);
    }

    #[test]
    fn replace_and_link() {
        let mut index = IndexMemory::new(4).unwrap();
        index.replace_slot(1, 7, 100, 0);
        let next = index.next_overflow().unwrap();
        index.replace_slot(next, 9, 200, 0);
        index.link(1, next);

        assert_eq!(index.hash_of(1), 7);
        assert_eq!(index.offset_of(1), 100);
        assert_eq!(index.attached_of(1), next);
        assert_eq!(index.chain(1).collect::<Vec<_>>(), vec![1, next]);
        assert_eq!(index.chain(0).count(), 0);
    }

    #[test]
    fn insert_new_chains_collisions() {
        let mut index = IndexMemory::new(4).unwrap();
        index.insert_new(0, 11, 0).unwrap();
        index.insert_new(4, 12, 10).unwrap();
        index.insert_new(8, 13, 20).unwrap();

        let chain: Vec<_> = index.chain(0).collect();
        assert_eq!(chain, vec![0, 4, 5]);
        assert_eq!(index.hash_of(5), 13);
        assert_eq!(index.offset_of(5), 20);
        assert_eq!(index.current(), 2);
    }

    #[test]
    fn insert_new_reports_full() {
        let mut index = IndexMemory::new(1).unwrap();
        index.insert_new(0, 1, 0).unwrap();
        index.insert_new(0, 2, 10).unwrap();
        assert!(matches!(
            index.insert_new(0, 3, 20),
            Err(CoreError::IndexFull { .. })
        ));
    }

    #[test]
    fn unchecked_insert_builds_same_chain() {
        let mut checked = IndexMemory::new(4).unwrap();
        let mut unchecked = IndexMemory::new(4).unwrap();
        for (n, hash) in [1u32, 5, 9, 2].iter().enumerate() {
            checked.insert_new(*hash, *hash, n as u64 * 10).unwrap();
            unchecked.insert_new_unchecked(*hash, *hash, n as u64 * 10);
        }
        assert_eq!(unchecked, checked);
        assert_eq!(unchecked.chain(1).collect::<Vec<_>>(), vec![1, 4, 5]);
        assert_eq!(unchecked.current(), 2);
    }

    #[test]
    fn encode_layout() {
        let mut index = IndexMemory::new(1).unwrap();
        index.insert_new(0, 5, 9).unwrap();
        let bytes = index.encode().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 2 * SLOT_LEN);
        assert_eq!(&bytes[..8], &[0, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 5]);
        assert_eq!(&bytes[12..17], &[0, 0, 0, 0, 9]);
    }

    #[test]
    fn decode_restores_table() {
        let mut index = IndexMemory::new(4).unwrap();
        for (n, hash) in [3u32, 7, 11, 15].iter().enumerate() {
            index.insert_new(*hash, *hash, n as u64 * 10).unwrap();
        }
        let restored = IndexMemory::decode(&index.encode().unwrap()).unwrap();
        assert_eq!(restored, index);
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert!(IndexMemory::decode(&[0, 0, 0]).is_err());
        // capacity 3
        assert!(IndexMemory::decode(&[0, 0, 0, 3, 0, 0, 0, 0]).is_err());
        // current > capacity
        let mut bytes = IndexMemory::new(1).unwrap().encode().unwrap();
        bytes[7] = 2;
        assert!(IndexMemory::decode(&bytes).is_err());
        // truncated table
        let bytes = IndexMemory::new(2).unwrap().encode().unwrap();
        assert!(IndexMemory::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn decode_rejects_dangling_link() {
        let mut index = IndexMemory::new(2).unwrap();
        index.replace_slot(0, 1, 0, 3);
        let result = IndexMemory::decode(&index.encode().unwrap());
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn chain_survives_cycle() {
        let mut index = IndexMemory::new(2).unwrap();
        let a = index.next_overflow().unwrap();
        index.replace_slot(0, 1, 0, a);
        index.replace_slot(a, 2, 0, 0);
        index.link(a, a);
        assert_eq!(index.chain(0).count(), 4);
    }
}
