//! Segment storage.
//!
//! A segment owns one [`IndexMemory`] and one append-only data log, both
//! named after a shared stem (`segment{N}`):
//!
//! ```text
//! segment3.index       # capacity | current | slot table
//! segment3.data        # item_length | key_length | key | value, repeated
//! segment3.tmp         # compaction output while a resize runs
//! segment3.index.tmp   # index image while a commit runs
//! ```
//!
//! ## Invariants
//!
//! - Every occupied slot points at the newest record for its key
//! - A `put` appends exactly one record, after its slot is settled
//! - A resize only takes effect once its output log has been renamed
//!   over the data log; until then the segment is untouched
//! - All operations on a segment hold its lock for their whole duration

use crate::block::{for_each_record, ScannedRecord, WriteBlock};
use crate::cache::ReadCache;
use crate::config::SegmentOptions;
use crate::error::{CoreError, CoreResult};
use crate::hash::{bucket_hash, key_hash};
use crate::index::IndexMemory;
use crate::packing::MAX_OFFSET;
use crate::record::{encode_record, read_key, read_value, RecordHeader};
use herdb_storage::{StorageBackend, StorageDir};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File names used by one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFiles {
    /// Shared stem, `segment{N}`.
    pub stem: String,
    /// Persisted index.
    pub index: String,
    /// Data log.
    pub data: String,
    /// Resize output before it replaces the data log.
    pub compaction: String,
    /// Commit output before it replaces the index.
    pub index_temp: String,
}

impl SegmentFiles {
    /// Names for segment number `id`.
    #[must_use]
    pub fn new(id: u32) -> Self {
        let stem = format!("segment{id}");
        Self {
            index: format!("{stem}.index"),
            data: format!("{stem}.data"),
            compaction: format!("{stem}.tmp"),
            index_temp: format!("{stem}.index.tmp"),
            stem,
        }
    }
}

/// Point-in-time counters for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SegmentStats {
    /// Primary buckets in the index.
    pub capacity: u32,
    /// Overflow slots handed out.
    pub current: u32,
    /// Occupied slots, i.e. distinct live keys.
    pub occupied: usize,
    /// Size of the data log in bytes.
    pub log_bytes: u64,
    /// Resizes performed since the segment was opened.
    pub resizes: u64,
}

/// Outcome of one resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeReport {
    /// Capacity before the resize.
    pub from: u32,
    /// Capacity after the resize.
    pub to: u32,
    /// Records copied to the new log.
    pub kept: usize,
    /// Superseded records dropped.
    pub dropped: usize,
    /// Data log size before.
    pub bytes_before: u64,
    /// Data log size after.
    pub bytes_after: u64,
}

/// Findings of [`Segment::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct VerifyReport {
    /// Records found in the data log.
    pub records: usize,
    /// Slots reachable from a primary bucket.
    pub live: usize,
    /// Human-readable inconsistencies.
    pub problems: Vec<String>,
}

impl VerifyReport {
    /// Returns true if no inconsistency was found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Where a probe for a key ended.
enum Probe {
    /// The key is stored in `slot`.
    Found {
        slot: u32,
        offset: u64,
        header: RecordHeader,
    },
    /// The key is absent and its primary bucket is empty.
    Vacant(u32),
    /// The key is absent and the chain ends at the given slot.
    Tail(u32),
}

/// How a `put` will change the index once its record is appended.
#[derive(Debug, Clone, Copy)]
enum Placement {
    Update(u32),
    Fill(u32),
    Chain(u32),
}

/// Output of a successful compaction pass.
struct Rebuilt {
    index: IndexMemory,
    log: Box<dyn StorageBackend>,
    kept: usize,
    dropped: usize,
    bytes_after: u64,
}

/// An independently locked shard of the store.
pub struct Segment {
    stem: String,
    /// Only read or filled while `inner` is locked.
    cache: Option<Arc<ReadCache>>,
    inner: Mutex<SegmentInner>,
}

struct SegmentInner {
    dir: Arc<dyn StorageDir>,
    files: SegmentFiles,
    options: SegmentOptions,
    log: Box<dyn StorageBackend>,
    /// `None` once committed.
    index: Option<IndexMemory>,
    /// The index file on disk matches `index` and must be dropped before
    /// the log moves past it.
    index_on_disk: bool,
    resizes: u64,
}

impl Segment {
    /// Opens segment `id` in `dir`, creating it if absent.
    ///
    /// An index that is missing, empty, or refers past the end of the data
    /// log is rebuilt by scanning the log. Temporary files left by an
    /// interrupted resize or commit are discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or the log is malformed.
    pub fn open(dir: Arc<dyn StorageDir>, id: u32, options: SegmentOptions) -> CoreResult<Self> {
        let files = SegmentFiles::new(id);
        for leftover in [&files.compaction, &files.index_temp] {
            if dir.remove(leftover)? {
                warn!(segment = %files.stem, file = %leftover, "removed leftover temporary file");
            }
        }

        let mut log = dir.open(&files.data)?;
        let log_bytes = log.size()?;
        let (index, index_on_disk) = match load_index(dir.as_ref(), &files, log_bytes)? {
            Some(index) => (index, true),
            None if log_bytes == 0 => (IndexMemory::new(options.initial_capacity)?, false),
            None => (recover_index(log.as_mut(), &files, &options)?, false),
        };
        debug!(
            segment = %files.stem,
            capacity = index.capacity(),
            current = index.current(),
            log_bytes,
            "opened segment"
        );

        Ok(Self {
            stem: files.stem.clone(),
            cache: None,
            inner: Mutex::new(SegmentInner {
                dir,
                files,
                options,
                log,
                index: Some(index),
                index_on_disk,
                resizes: 0,
            }),
        })
    }

    /// Serves lookups through `cache`, which may be shared with other
    /// segments.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ReadCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The segment's file stem.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.stem
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// Resizes the index first if the key needs an overflow slot and none
    /// is left.
    ///
    /// # Errors
    ///
    /// Returns `EmptyKey`, `RecordTooLarge`, `CapacityExceeded`,
    /// `OffsetOverflow`, `SegmentClosed`, or an I/O error.
    pub fn put(&self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        inner.put(key, value)?;
        if let Some(cache) = &self.cache {
            cache.insert(key, value);
        }
        Ok(())
    }

    /// Returns the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns `SegmentClosed` or an I/O error. A failed read is never
    /// reported as absence.
    pub fn get(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        let inner = self.inner.lock();
        if let Some(value) = self.cached(&inner, key)? {
            return Ok(Some(value));
        }
        let value = inner.get(key)?;
        if let (Some(cache), Some(value)) = (&self.cache, &value) {
            cache.insert(key, value);
        }
        Ok(value)
    }

    /// Returns true if `key` is stored.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn contains(&self, key: &[u8]) -> CoreResult<bool> {
        let inner = self.inner.lock();
        if self.cached(&inner, key)?.is_some() {
            return Ok(true);
        }
        let probe = inner.probe(key, bucket_hash(key), key_hash(key))?;
        Ok(matches!(probe, Probe::Found { .. }))
    }

    /// Persists the index and closes the segment.
    ///
    /// The data log is synced first, then the index image is written to a
    /// temporary file and renamed over the index. Later calls fail with
    /// `SegmentClosed`.
    ///
    /// # Errors
    ///
    /// Returns `SegmentClosed` if already committed, or an I/O error, in
    /// which case the segment stays open.
    pub fn commit(&self) -> CoreResult<()> {
        self.inner.lock().commit()
    }

    /// Returns true once [`commit`](Self::commit) has succeeded.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().index.is_none()
    }

    /// Returns current counters.
    ///
    /// # Errors
    ///
    /// Returns `SegmentClosed` or an I/O error.
    pub fn stats(&self) -> CoreResult<SegmentStats> {
        let inner = self.inner.lock();
        let index = inner.index()?;
        Ok(SegmentStats {
            capacity: index.capacity(),
            current: index.current(),
            occupied: index.occupied(),
            log_bytes: inner.log.size()?,
            resizes: inner.resizes,
        })
    }

    /// Cross-checks the index against the data log.
    ///
    /// Every reachable slot must point at a record start whose key hashes
    /// to the slot's hash and to the bucket the chain hangs from.
    ///
    /// # Errors
    ///
    /// Returns `SegmentClosed`, `MalformedRecord`, or an I/O error.
    pub fn verify(&self) -> CoreResult<VerifyReport> {
        self.inner.lock().verify()
    }

    /// Doubles the index capacity now, compacting the data log.
    ///
    /// `put` does this on its own when a chain runs out of overflow slots.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded`, `SegmentClosed`, or an I/O error; the
    /// segment is unchanged on error.
    pub fn resize(&self) -> CoreResult<ResizeReport> {
        self.inner.lock().resize()
    }
}

impl Segment {
    /// Cache lookup for a caller holding `inner`.
    fn cached(&self, inner: &SegmentInner, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        inner.index()?;
        Ok(self.cache.as_ref().and_then(|cache| cache.get(key)))
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment").field("name", &self.stem).finish()
    }
}

impl SegmentInner {
    fn index(&self) -> CoreResult<&IndexMemory> {
        self.index
            .as_ref()
            .ok_or_else(|| CoreError::segment_closed(&self.files.stem))
    }

    fn index_mut(&mut self) -> CoreResult<&mut IndexMemory> {
        let stem = &self.files.stem;
        self.index
            .as_mut()
            .ok_or_else(|| CoreError::segment_closed(stem))
    }

    /// Walks the chain for `key` without changing anything.
    fn probe(&self, key: &[u8], bucket_hash: u32, key_hash: u32) -> CoreResult<Probe> {
        let index = self.index()?;
        let bucket = index.bucket_for(bucket_hash);
        let mut last = bucket;
        for i in index.chain(bucket) {
            last = i;
            let slot = index.slot_at(i);
            if slot.hash != key_hash {
                continue;
            }
            let (header, stored) = read_key(self.log.as_ref(), slot.offset)?;
            if stored == key {
                return Ok(Probe::Found {
                    slot: i,
                    offset: slot.offset,
                    header,
                });
            }
        }
        if index.slot_at(bucket).is_empty() {
            Ok(Probe::Vacant(bucket))
        } else {
            Ok(Probe::Tail(last))
        }
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        if key.is_empty() {
            return Err(CoreError::EmptyKey);
        }
        let record = encode_record(key, value)?;
        if record.len() > self.options.max_record_size {
            return Err(CoreError::RecordTooLarge {
                size: record.len(),
                max: self.options.max_record_size,
            });
        }

        let bh = bucket_hash(key);
        let kh = key_hash(key);
        let placement = loop {
            match self.probe(key, bh, kh)? {
                Probe::Found { slot, .. } => break Placement::Update(slot),
                Probe::Vacant(bucket) => break Placement::Fill(bucket),
                Probe::Tail(last) => {
                    if self.index()?.has_overflow() {
                        break Placement::Chain(last);
                    }
                    // The rebuilt table has a free overflow slot for every
                    // key it holds, so the walk restarts at most once.
                    self.resize()?;
                }
            }
        };

        let end = self.log.size()?;
        if end > MAX_OFFSET {
            return Err(CoreError::OffsetOverflow { offset: end });
        }
        if self.index_on_disk {
            // Until the next commit the log is the only source of truth.
            self.dir.remove(&self.files.index)?;
            self.index_on_disk = false;
        }
        let offset = self.log.append(&record)?;

        let index = self.index_mut()?;
        match placement {
            Placement::Update(i) => {
                let attached = index.attached_of(i);
                index.replace_slot(i, kh, offset, attached);
            }
            Placement::Fill(i) => index.replace_slot(i, kh, offset, 0),
            Placement::Chain(prev) => {
                let next = index.next_overflow()?;
                index.replace_slot(next, kh, offset, 0);
                index.link(prev, next);
            }
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        match self.probe(key, bucket_hash(key), key_hash(key))? {
            Probe::Found { offset, header, .. } => {
                Ok(Some(read_value(self.log.as_ref(), offset, &header)?))
            }
            Probe::Vacant(_) | Probe::Tail(_) => Ok(None),
        }
    }

    /// Doubles the index and drops superseded records in one pass.
    fn resize(&mut self) -> CoreResult<ResizeReport> {
        let from = self.index()?.capacity();
        let requested = u64::from(from) * 2;
        if requested > u64::from(self.options.max_capacity) {
            return Err(CoreError::CapacityExceeded {
                requested,
                max: self.options.max_capacity,
            });
        }
        let to = u32::try_from(requested).map_err(|_| CoreError::CapacityExceeded {
            requested,
            max: self.options.max_capacity,
        })?;
        let bytes_before = self.log.size()?;
        info!(segment = %self.files.stem, from, to, bytes = bytes_before, "resizing segment index");

        match self.rebuild(to) {
            Ok(rebuilt) => {
                let Rebuilt {
                    index,
                    log,
                    kept,
                    dropped,
                    bytes_after,
                } = rebuilt;
                self.index = Some(index);
                self.log = log;
                self.index_on_disk = false;
                self.resizes += 1;
                info!(
                    segment = %self.files.stem,
                    capacity = to,
                    kept,
                    dropped,
                    bytes_before,
                    bytes_after,
                    "segment resized"
                );
                Ok(ResizeReport {
                    from,
                    to,
                    kept,
                    dropped,
                    bytes_before,
                    bytes_after,
                })
            }
            Err(err) => {
                if let Err(cleanup) = self.dir.remove(&self.files.compaction) {
                    warn!(segment = %self.files.stem, error = %cleanup, "failed to remove compaction file");
                }
                warn!(segment = %self.files.stem, error = %err, "resize aborted");
                Err(err)
            }
        }
    }

    /// Streams the live records into a new log and a new index.
    ///
    /// Nothing in `self` changes; the caller swaps the results in.
    fn rebuild(&mut self, capacity: u32) -> CoreResult<Rebuilt> {
        let Self {
            dir,
            files,
            options,
            log,
            index,
            ..
        } = self;
        let old = index
            .as_ref()
            .ok_or_else(|| CoreError::segment_closed(&files.stem))?;

        let mut fresh = IndexMemory::new(capacity)?;
        let mut out = dir.recreate(&files.compaction)?;
        let mut writer = WriteBlock::new(options.block_size);
        let (mut kept, mut dropped) = (0usize, 0usize);

        for_each_record(log.as_mut(), options.block_size, |record| {
            if !is_live(old, &record) {
                dropped += 1;
                return Ok(());
            }
            let offset = writer.write(&record.bytes, out.as_mut())?;
            let key = record.key();
            fresh.insert_new_unchecked(bucket_hash(key), key_hash(key), offset);
            kept += 1;
            Ok(())
        })?;
        writer.flush(out.as_mut())?;
        out.sync()?;
        drop(out);

        // Without its index the old log can still be recovered by a scan,
        // whereas the old index would misread the compacted log.
        dir.remove(&files.index)?;
        dir.rename(&files.compaction, &files.data)?;
        Ok(Rebuilt {
            index: fresh,
            log: dir.open(&files.data)?,
            kept,
            dropped,
            bytes_after: writer.position(),
        })
    }

    fn commit(&mut self) -> CoreResult<()> {
        let bytes = self.index()?.encode()?;
        self.log.flush()?;
        self.log.sync()?;

        let mut temp = self.dir.recreate(&self.files.index_temp)?;
        temp.append(&bytes)?;
        temp.flush()?;
        temp.sync()?;
        drop(temp);
        self.dir.rename(&self.files.index_temp, &self.files.index)?;

        if let Some(index) = self.index.take() {
            debug!(
                segment = %self.files.stem,
                capacity = index.capacity(),
                current = index.current(),
                "committed segment"
            );
        }
        Ok(())
    }

    fn verify(&mut self) -> CoreResult<VerifyReport> {
        let Self {
            files,
            options,
            log,
            index,
            ..
        } = self;
        let index = index
            .as_ref()
            .ok_or_else(|| CoreError::segment_closed(&files.stem))?;

        let mut starts: HashMap<u64, (u32, u32)> = HashMap::new();
        let mut report = VerifyReport::default();
        for_each_record(log.as_mut(), options.block_size, |record| {
            report.records += 1;
            let key = record.key();
            starts.insert(record.offset, (bucket_hash(key), key_hash(key)));
            Ok(())
        })?;

        for bucket in 0..index.capacity() {
            for i in index.chain(bucket) {
                report.live += 1;
                let slot = index.slot_at(i);
                let Some(&(bh, kh)) = starts.get(&slot.offset) else {
                    report.problems.push(format!(
                        "slot {i} points at offset {} which is not a record start",
                        slot.offset
                    ));
                    continue;
                };
                if kh != slot.hash {
                    report.problems.push(format!(
                        "slot {i} hash {:#010x} does not match its record's key hash {kh:#010x}",
                        slot.hash
                    ));
                }
                let home = index.bucket_for(bh);
                if home != bucket {
                    report.problems.push(format!(
                        "slot {i} hangs from bucket {bucket} but its key belongs to bucket {home}"
                    ));
                }
            }
        }
        let occupied = index.occupied();
        if occupied != report.live {
            report.problems.push(format!(
                "{} occupied slots are not reachable from any bucket",
                occupied.saturating_sub(report.live)
            ));
        }
        Ok(report)
    }
}

/// A record is live if the index still points at its offset.
fn is_live(index: &IndexMemory, record: &ScannedRecord) -> bool {
    let key = record.key();
    let kh = key_hash(key);
    index
        .chain(index.bucket_for(bucket_hash(key)))
        .any(|i| {
            let slot = index.slot_at(i);
            slot.hash == kh && slot.offset == record.offset
        })
}

fn load_index(
    dir: &dyn StorageDir,
    files: &SegmentFiles,
    log_bytes: u64,
) -> CoreResult<Option<IndexMemory>> {
    if !dir.exists(&files.index) {
        return Ok(None);
    }
    let bytes = dir.open(&files.index)?.read_all()?;
    if bytes.is_empty() {
        return Ok(None);
    }
    let index = IndexMemory::decode(&bytes)?;
    if let Some(max) = index.max_offset() {
        if max >= log_bytes {
            warn!(
                segment = %files.stem,
                offset = max,
                log_bytes,
                "index refers past the end of the data log, rebuilding"
            );
            return Ok(None);
        }
    }
    Ok(Some(index))
}

/// Rebuilds an index from the data log; later records supersede earlier ones.
fn recover_index(
    log: &mut dyn StorageBackend,
    files: &SegmentFiles,
    options: &SegmentOptions,
) -> CoreResult<IndexMemory> {
    let mut latest: HashMap<Vec<u8>, u64> = HashMap::new();
    let mut records = 0usize;
    for_each_record(log, options.block_size, |record| {
        records += 1;
        latest.insert(record.key().to_vec(), record.offset);
        Ok(())
    })?;

    let wanted = (latest.len() as u64)
        .next_power_of_two()
        .max(u64::from(options.initial_capacity));
    let capacity = u32::try_from(wanted.min(u64::from(options.max_capacity)))
        .map_err(|_| CoreError::invalid_config("max_capacity out of range"))?;
    let mut index = IndexMemory::new(capacity)?;
    for (key, offset) in &latest {
        index
            .insert_new(bucket_hash(key), key_hash(key), *offset)
            .map_err(|err| match err {
                CoreError::IndexFull { .. } => CoreError::CapacityExceeded {
                    requested: wanted * 2,
                    max: options.max_capacity,
                },
                other => other,
            })?;
    }

    info!(
        segment = %files.stem,
        records,
        keys = latest.len(),
        capacity,
        "rebuilt index from data log"
    );
    Ok(index)
}
