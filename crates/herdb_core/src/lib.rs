//! # herdb Core
//!
//! Segmented hash-index storage engine for herdb.
//!
//! This crate provides:
//! - An append-only data log per segment, addressed by 40-bit offsets
//! - An open-hash index with overflow chaining, doubled on demand
//! - Compaction folded into every resize, so dead records are dropped
//! - Recovery of a missing or stale index by scanning the data log
//! - A multi-segment [`Store`] with an optional read cache
//!
//! ## Example
//!
//! ```rust
//! use herdb_core::{Config, Store};
//!
//! let store = Store::open_in_memory(Config::new().segments(4)).unwrap();
//! store.put(b"alpha", b"1").unwrap();
//! store.put(b"alpha", b"2").unwrap();
//! assert_eq!(store.get(b"alpha").unwrap(), Some(b"2".to_vec()));
//! assert_eq!(store.get(b"beta").unwrap(), None);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod block;
mod cache;
mod config;
mod dir;
mod error;
pub mod hash;
pub mod index;
pub mod packing;
pub mod record;
mod segment;
mod store;

pub use cache::{CacheStats, ReadCache};
pub use config::{Config, SegmentOptions};
pub use dir::{StoreDir, StoreManifest, FORMAT_VERSION};
pub use error::{CoreError, CoreResult};
pub use hash::{bucket_hash, key_hash, segment_for};
pub use segment::{ResizeReport, Segment, SegmentFiles, SegmentStats, VerifyReport};
pub use store::{Store, StoreStats};
