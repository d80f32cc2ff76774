//! Benchmark utilities.

#![allow(missing_docs)]

use herdb_core::{Segment, SegmentOptions};
use herdb_storage::InMemoryDir;
use rand::Rng;
use std::sync::Arc;

/// Generate random bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` distinct keys of the form `key-<n>`.
pub fn generate_keys(count: usize) -> Vec<Vec<u8>> {
    (0..count).map(|i| format!("key-{i:08}").into_bytes()).collect()
}

/// Generate key/value pairs with values of `value_size` random bytes.
pub fn generate_pairs(count: usize, value_size: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    generate_keys(count)
        .into_iter()
        .map(|key| (key, random_data(value_size)))
        .collect()
}

/// Opens an in-memory segment with the given starting capacity.
pub fn memory_segment(initial_capacity: u32) -> Segment {
    let options = SegmentOptions {
        initial_capacity,
        ..SegmentOptions::default()
    };
    Segment::open(Arc::new(InMemoryDir::new()), 0, options).unwrap()
}
