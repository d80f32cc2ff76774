//! # herdb Storage
//!
//! Byte stream and directory backends for herdb.
//!
//! This crate provides the lowest-level storage abstraction used by the
//! segment engine. Backends are **opaque byte streams** - they do not
//! interpret index slots or log records.
//!
//! ## Design Principles
//!
//! - A [`StorageBackend`] is one named stream: positioned reads, appends,
//!   and a sequential block cursor used for compaction scans
//! - A [`StorageDir`] is a flat namespace of streams with open, remove and
//!   rename, so the engine never touches the filesystem directly
//! - Both must be `Send + Sync` so segments can live behind shared handles
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] / [`InMemoryDir`] - For testing and ephemeral stores
//! - [`FileBackend`] / [`FileDir`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use herdb_storage::{InMemoryDir, StorageBackend, StorageDir};
//!
//! let dir = InMemoryDir::new();
//! let mut stream = dir.open("segment0.data").unwrap();
//! let offset = stream.append(b"hello world").unwrap();
//! assert_eq!(stream.read_at(offset, 5).unwrap(), b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod dir;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use dir::StorageDir;
pub use error::{StorageError, StorageResult};
pub use file::{FileBackend, FileDir};
pub use memory::{InMemoryBackend, InMemoryDir};
