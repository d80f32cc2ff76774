//! Multi-segment store.
//!
//! A [`Store`] shards keys across a fixed number of [`Segment`]s by key
//! hash. Segments share nothing, so operations on different segments run
//! in parallel; each segment serializes its own callers.

use crate::cache::{CacheStats, ReadCache};
use crate::config::Config;
use crate::dir::{StoreDir, StoreManifest};
use crate::error::CoreResult;
use crate::hash::segment_for;
use crate::segment::{Segment, SegmentStats, VerifyReport};
use herdb_codec::{Decode, Encode};
use herdb_storage::{InMemoryDir, StorageDir};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Counters for a whole store.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    /// One entry per segment, in segment order.
    pub segments: Vec<SegmentStats>,
    /// Read cache counters, if the cache is enabled.
    pub cache: Option<CacheStats>,
}

impl StoreStats {
    /// Distinct live keys across all segments.
    #[must_use]
    pub fn keys(&self) -> usize {
        self.segments.iter().map(|s| s.occupied).sum()
    }

    /// Total data log bytes across all segments.
    #[must_use]
    pub fn log_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.log_bytes).sum()
    }
}

/// An embedded key-value store.
///
/// # Example
///
/// ```rust
/// use herdb_core::{Config, Store};
///
/// let store = Store::open_in_memory(Config::new().segments(2)).unwrap();
/// store.put(b"hello", b"world").unwrap();
/// assert_eq!(store.get(b"hello").unwrap(), Some(b"world".to_vec()));
/// store.commit().unwrap();
/// ```
pub struct Store {
    config: Config,
    segments: Vec<Segment>,
    cache: Option<Arc<ReadCache>>,
    /// Holds the directory lock for on-disk stores.
    dir: Option<StoreDir>,
}

impl Store {
    /// Opens or creates a store at `path` with default configuration.
    ///
    /// # Errors
    ///
    /// See [`open_with_config`](Self::open_with_config).
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens or creates a store at `path`.
    ///
    /// A new store records its layout (segment count and capacities) in
    /// `herdb.conf`; an existing store uses the recorded layout whatever
    /// `config` says.
    ///
    /// # Errors
    ///
    /// Returns `StoreLocked` if another process has the store open,
    /// `InvalidConfig` for bad settings, or an I/O or format error.
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        config.validate()?;
        let dir = StoreDir::open(path.as_ref(), config.create_if_missing)?;
        let config = match dir.load_manifest()? {
            Some(manifest) => {
                let persisted = manifest.apply(&config);
                if persisted != config {
                    debug!(
                        segments = persisted.segments,
                        max_capacity = persisted.max_capacity,
                        "using layout recorded in store manifest"
                    );
                }
                persisted
            }
            None => {
                dir.save_manifest(&StoreManifest::from_config(&config))?;
                config
            }
        };
        config.validate()?;
        let storage: Arc<dyn StorageDir> = Arc::new(dir.storage()?);
        Self::build(config, storage, Some(dir))
    }

    /// Creates a store that lives only in memory.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for bad settings.
    pub fn open_in_memory(config: Config) -> CoreResult<Self> {
        Self::with_storage(Arc::new(InMemoryDir::new()), config)
    }

    /// Opens a store over an arbitrary stream directory, without locking.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for bad settings, or any error from opening
    /// a segment.
    pub fn with_storage(storage: Arc<dyn StorageDir>, config: Config) -> CoreResult<Self> {
        config.validate()?;
        Self::build(config, storage, None)
    }

    fn build(config: Config, storage: Arc<dyn StorageDir>, dir: Option<StoreDir>) -> CoreResult<Self> {
        let options = config.segment_options();
        let cache = (config.cache_size > 0).then(|| Arc::new(ReadCache::new(config.cache_size)));
        let segments = (0..config.segments)
            .map(|id| -> CoreResult<Segment> {
                let segment = Segment::open(Arc::clone(&storage), id, options)?;
                Ok(match &cache {
                    Some(cache) => segment.with_cache(Arc::clone(cache)),
                    None => segment,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;
        info!(
            segments = segments.len(),
            cache_bytes = config.cache_size,
            path = ?dir.as_ref().map(StoreDir::path),
            "opened store"
        );
        Ok(Self {
            config,
            segments,
            cache,
            dir,
        })
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory of an on-disk store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(StoreDir::path)
    }

    /// The segments in id order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn segment(&self, key: &[u8]) -> &Segment {
        let count = u32::try_from(self.segments.len()).unwrap_or(u32::MAX);
        &self.segments[segment_for(key, count) as usize]
    }

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `EmptyKey`, `RecordTooLarge`, `CapacityExceeded`, or an
    /// I/O error.
    pub fn put(&self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        self.segment(key).put(key, value)
    }

    /// Returns the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the data log cannot be read.
    pub fn get(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        self.segment(key).get(key)
    }

    /// Returns true if `key` is stored.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the data log cannot be read.
    pub fn contains(&self, key: &[u8]) -> CoreResult<bool> {
        self.segment(key).contains(key)
    }

    /// Stores a typed value under a typed key.
    ///
    /// # Errors
    ///
    /// Returns a codec error or any error from [`put`](Self::put).
    pub fn put_value<K, V>(&self, key: &K, value: &V) -> CoreResult<()>
    where
        K: Encode + ?Sized,
        V: Encode + ?Sized,
    {
        self.put(&key.encode()?, &value.encode()?)
    }

    /// Fetches a typed value stored by [`put_value`](Self::put_value).
    ///
    /// # Errors
    ///
    /// Returns a codec error if the stored bytes are not a `V`.
    pub fn get_value<K, V>(&self, key: &K) -> CoreResult<Option<V>>
    where
        K: Encode + ?Sized,
        V: Decode,
    {
        match self.get(&key.encode()?)? {
            Some(bytes) => Ok(Some(V::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Returns counters for every segment and the cache.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a log size cannot be read.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        Ok(StoreStats {
            segments: self
                .segments
                .iter()
                .map(Segment::stats)
                .collect::<CoreResult<_>>()?,
            cache: self.cache.as_ref().map(|cache| cache.stats()),
        })
    }

    /// Cross-checks every segment's index against its data log.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` or an I/O error.
    pub fn verify(&self) -> CoreResult<Vec<(String, VerifyReport)>> {
        self.segments
            .iter()
            .map(|s| Ok((s.name().to_string(), s.verify()?)))
            .collect()
    }

    /// Persists every segment's index and releases the store.
    ///
    /// All segments are attempted even if one fails; the first error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the first commit error.
    pub fn commit(self) -> CoreResult<()> {
        let mut first_error = None;
        for segment in &self.segments {
            if let Err(err) = segment.commit() {
                tracing::error!(segment = segment.name(), error = %err, "segment commit failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => {
                info!(segments = self.segments.len(), "committed store");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path())
            .field("segments", &self.segments.len())
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn small() -> Config {
        Config::new()
            .segments(4)
            .initial_capacity(2)
            .max_capacity(1 << 12)
            .block_size(64)
    }

    #[test]
    fn keys_route_to_stable_segments() {
        let store = Store::open_in_memory(small()).unwrap();
        for i in 0..100u32 {
            store.put(&i.to_be_bytes(), &i.to_le_bytes()).unwrap();
        }
        let stats = store.stats().unwrap();
        assert_eq!(stats.segments.len(), 4);
        assert_eq!(stats.keys(), 100);
        assert!(stats.segments.iter().all(|s| s.occupied > 0));
        for i in 0..100u32 {
            assert_eq!(
                store.get(&i.to_be_bytes()).unwrap(),
                Some(i.to_le_bytes().to_vec())
            );
        }
    }

    #[test]
    fn empty_key_is_rejected() {
        let store = Store::open_in_memory(small()).unwrap();
        assert!(matches!(store.put(b"", b"v"), Err(CoreError::EmptyKey)));
        assert_eq!(store.get(b"").unwrap(), None);
    }

    #[test]
    fn cache_is_refreshed_on_put() {
        let store = Store::open_in_memory(small().cache_size(1024)).unwrap();
        store.put(b"k", b"one").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"one".to_vec()));
        store.put(b"k", b"two").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"two".to_vec()));

        let cache = store.stats().unwrap().cache.unwrap();
        assert_eq!(cache.hits, 2);
        assert_eq!(cache.entries, 1);
    }

    #[test]
    fn cache_disabled_by_default() {
        let store = Store::open_in_memory(small()).unwrap();
        assert!(store.stats().unwrap().cache.is_none());
    }

    #[test]
    fn typed_values() {
        let store = Store::open_in_memory(small()).unwrap();
        store.put_value("count", &42i32).unwrap();
        store.put_value(&7i64, "seven").unwrap();
        store.put_value("flags", &vec![1, 2, 3]).unwrap();

        assert_eq!(store.get_value::<_, i32>("count").unwrap(), Some(42));
        assert_eq!(
            store.get_value::<_, String>(&7i64).unwrap(),
            Some("seven".to_string())
        );
        assert_eq!(
            store.get_value::<_, Vec<i32>>("flags").unwrap(),
            Some(vec![1, 2, 3])
        );
        assert_eq!(store.get_value::<_, i32>("missing").unwrap(), None);
        assert!(matches!(
            store.get_value::<_, bool>("count"),
            Err(CoreError::Codec(_))
        ));
    }

    #[test]
    fn reopen_over_shared_storage() {
        let storage = InMemoryDir::new();
        let store = Store::with_storage(Arc::new(storage.clone()), small()).unwrap();
        store.put(b"persist", b"me").unwrap();
        store.commit().unwrap();

        let reopened = Store::with_storage(Arc::new(storage), small()).unwrap();
        assert_eq!(reopened.get(b"persist").unwrap(), Some(b"me".to_vec()));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = Store::open_in_memory(Config::new().segments(0));
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }
}
