//! Store configuration.

use crate::error::{CoreError, CoreResult};
use crate::index::CAPACITY_LIMIT;
use crate::record::RECORD_HEADER_LEN;

/// Configuration for opening a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Number of independent segments keys are sharded across.
    pub segments: u32,

    /// Primary buckets per segment index when a segment is created.
    pub initial_capacity: u32,

    /// Largest capacity a segment index may grow to.
    pub max_capacity: u32,

    /// Size of the buffers used when streaming a data log.
    pub block_size: usize,

    /// Largest encoded record accepted by `put`.
    pub max_record_size: usize,

    /// Byte budget of the read cache (0 = disabled).
    pub cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            segments: 8,
            initial_capacity: 32 * 1024,
            max_capacity: 1 << 27,
            block_size: 32 * 1024,          // 32 KB
            max_record_size: 1024 * 1024,   // 1 MB
            cache_size: 0,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the number of segments.
    #[must_use]
    pub const fn segments(mut self, count: u32) -> Self {
        self.segments = count;
        self
    }

    /// Sets the initial index capacity per segment.
    #[must_use]
    pub const fn initial_capacity(mut self, capacity: u32) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Sets the maximum index capacity per segment.
    #[must_use]
    pub const fn max_capacity(mut self, capacity: u32) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Sets the streaming block size.
    #[must_use]
    pub const fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the maximum encoded record size.
    #[must_use]
    pub const fn max_record_size(mut self, size: usize) -> Self {
        self.max_record_size = size;
        self
    }

    /// Sets the read cache budget in bytes.
    #[must_use]
    pub const fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    /// Checks that all values are usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first bad value.
    pub fn validate(&self) -> CoreResult<()> {
        if self.segments == 0 {
            return Err(CoreError::invalid_config("segments must be at least 1"));
        }
        for (name, capacity) in [
            ("initial_capacity", self.initial_capacity),
            ("max_capacity", self.max_capacity),
        ] {
            if capacity == 0 || !capacity.is_power_of_two() || capacity > CAPACITY_LIMIT {
                return Err(CoreError::invalid_config(format!(
                    "{name} {capacity} must be a power of two in 1..={CAPACITY_LIMIT}"
                )));
            }
        }
        if self.initial_capacity > self.max_capacity {
            return Err(CoreError::invalid_config(format!(
                "initial_capacity {} exceeds max_capacity {}",
                self.initial_capacity, self.max_capacity
            )));
        }
        if self.block_size < RECORD_HEADER_LEN {
            return Err(CoreError::invalid_config(format!(
                "block_size {} is smaller than a record header",
                self.block_size
            )));
        }
        if self.max_record_size <= RECORD_HEADER_LEN || self.max_record_size > u32::MAX as usize {
            return Err(CoreError::invalid_config(format!(
                "max_record_size {} out of range",
                self.max_record_size
            )));
        }
        Ok(())
    }

    pub(crate) fn segment_options(&self) -> SegmentOptions {
        SegmentOptions {
            initial_capacity: self.initial_capacity,
            max_capacity: self.max_capacity,
            block_size: self.block_size,
            max_record_size: self.max_record_size,
        }
    }
}

/// The part of [`Config`] a single segment needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentOptions {
    /// Capacity of a freshly created index.
    pub initial_capacity: u32,
    /// Largest capacity a resize may produce.
    pub max_capacity: u32,
    /// Streaming buffer size for resize and recovery.
    pub block_size: usize,
    /// Largest encoded record accepted by `put`.
    pub max_record_size: usize,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Config::default().segment_options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert_eq!(config.segments, 8);
        assert_eq!(config.max_capacity, 1 << 27);
        assert_eq!(config.cache_size, 0);
        config.validate().unwrap();
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .segments(2)
            .initial_capacity(4)
            .max_capacity(64)
            .block_size(16)
            .max_record_size(4096)
            .cache_size(1024);

        assert!(!config.create_if_missing);
        assert_eq!(config.segments, 2);
        assert_eq!(config.initial_capacity, 4);
        assert_eq!(config.block_size, 16);
        config.validate().unwrap();

        let options = config.segment_options();
        assert_eq!(options.max_capacity, 64);
        assert_eq!(options.max_record_size, 4096);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(Config::new().segments(0).validate().is_err());
        assert!(Config::new().initial_capacity(3).validate().is_err());
        assert!(Config::new()
            .initial_capacity(64)
            .max_capacity(32)
            .validate()
            .is_err());
        assert!(Config::new().block_size(4).validate().is_err());
        assert!(Config::new().max_record_size(8).validate().is_err());
    }
}
