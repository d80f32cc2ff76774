//! On-disk open-hash index.
//!
//! Each segment owns one [`IndexMemory`]: a flat table of fixed-size
//! [`Slot`]s where collisions chain into an overflow pool.

mod memory;
mod slot;

pub use memory::{IndexMemory, CAPACITY_LIMIT, HEADER_LEN};
pub use slot::{Slot, SLOT_LEN};
