//! # Engine - ordered key-value store under the overlay cache
//!
//! Provides the [`OrderedStore`] capability the overlay indexes are built on:
//! point reads, ordered prefix scans, and atomic multi-key write batches.
//! Two implementations ship here:
//!
//! - [`MemStore`]: a bare [`memtable::Memtable`], nothing persisted.
//! - [`Engine`]: the durable store. WAL for atomicity and durability, the
//!   memtable for the live state, and a checkpoint snapshot so the WAL never
//!   grows without bound.
//!
//! ## Architecture
//!
//! ```text
//! Client (overlay indexes)
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → WAL append (1 frame/batch)         │
//! │              → Memtable apply                 │
//! │              |                                │
//! │              |  (logged bytes >= threshold?)  │
//! │              |            yes                 │
//! │              v                                │
//! │           checkpoint() → snapshot + WAL reset │
//! │                                               │
//! │ read.rs → Memtable (holds the full state)     │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                               |
//! |----------------|-------------------------------------------------------|
//! | [`lib.rs`]     | `OrderedStore`, `Engine` struct, constructors, `Debug`, `Drop` |
//! | [`batch`]      | `WriteBatch` and batch validation                      |
//! | [`mem`]        | `MemStore`                                             |
//! | [`recovery`]   | Snapshot load, WAL replay, torn-tail repair            |
//! | [`snapshot`]   | Checkpoint file format (atomic temp + rename)          |
//! | [`write`]      | `write()`, `force_checkpoint()`, internal `checkpoint()` |
//! | [`read`]       | `get()`, `scan()`                                      |
//!
//! ## Crash Safety
//!
//! A batch is appended to the WAL as a single CRC-checked frame **before** the
//! memtable changes. On recovery a torn frame is discarded whole, so a batch is
//! either fully visible or not visible at all. The WAL is only truncated after
//! a snapshot has been fsynced and renamed into place; frames already covered
//! by the snapshot are skipped by sequence number.
mod batch;
mod mem;
mod read;
mod recovery;
mod snapshot;
mod write;

use anyhow::{Context, Result};
use config::StoreConfig;
use memtable::Memtable;
use std::path::{Path, PathBuf};
use wal::WalWriter;

pub use batch::WriteBatch;
pub use mem::MemStore;
pub use recovery::{replay_wal_into, ReplaySummary};
pub use wal::BatchOp;

/// Maximum allowed key size in bytes (64 KiB).
pub const MAX_KEY_SIZE: usize = 64 * 1024;
/// Maximum allowed value size in bytes (10 MiB).
pub const MAX_VALUE_SIZE: usize = 10 * 1024 * 1024;

/// Lazy, ascending `(key, value)` iterator returned by [`OrderedStore::scan`].
pub type ScanIter<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + 'a>;

/// An ordered byte-string key-value store with atomic batched writes.
///
/// Callers serialize access: reads take `&self`, writes take `&mut self`, and
/// nothing here locks.
pub trait OrderedStore {
    /// Point lookup.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Ascending iteration over keys that start with `prefix` and are
    /// `>= start`. A `start` sorting before `prefix` means "from the first
    /// key of the prefix".
    fn scan<'a>(&'a self, prefix: &[u8], start: &[u8]) -> Result<ScanIter<'a>>;

    /// Applies every op in `batch`, in order, or none of them.
    fn write(&mut self, batch: WriteBatch) -> Result<()>;

    /// Ascending iteration over every key starting with `prefix`.
    fn iterate<'a>(&'a self, prefix: &[u8]) -> Result<ScanIter<'a>> {
        self.scan(prefix, prefix)
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(batch)
    }

    fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(batch)
    }
}

/// The durable ordered store.
///
/// # Write Path
///
/// 1. Validate the batch (nothing is logged if any op is invalid).
/// 2. Assign the next monotonic sequence number.
/// 3. Append the whole batch to the WAL as one frame.
/// 4. Apply the ops to the memtable.
/// 5. If the bytes logged since the last checkpoint reach
///    `checkpoint_threshold`, write a snapshot and reset the WAL.
///
/// # Read Path
///
/// The memtable holds the complete live state, so every read is served from
/// memory.
///
/// # Recovery
///
/// On construction the snapshot (if any) is loaded, then WAL frames newer than
/// the snapshot are replayed.
pub struct Engine {
    pub(crate) mem: Memtable,
    pub(crate) wal_path: PathBuf,
    pub(crate) snapshot_path: PathBuf,
    pub(crate) wal_writer: WalWriter,

    /// Sequence number of the last committed batch.
    pub(crate) seq: u64,

    /// Bytes appended to the WAL since the last checkpoint.
    pub(crate) wal_bytes: usize,

    /// Logged-byte threshold that triggers a checkpoint. `0` disables
    /// automatic checkpoints.
    pub(crate) checkpoint_threshold: usize,

    /// If `true`, every WAL append is followed by `fsync` for durability.
    pub(crate) wal_sync: bool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("seq", &self.seq)
            .field("entries", &self.mem.len())
            .field("approx_size", &self.mem.approx_size())
            .field("wal_bytes", &self.wal_bytes)
            .field("checkpoint_threshold", &self.checkpoint_threshold)
            .field("wal_sync", &self.wal_sync)
            .field("wal_path", &self.wal_path)
            .field("snapshot_path", &self.snapshot_path)
            .finish()
    }
}

impl Engine {
    /// Opens the engine described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        Self::new(
            &config.wal_path,
            &config.snapshot_path,
            config.checkpoint_threshold,
            config.wal_sync,
        )
    }

    /// Creates a new engine, performing full recovery from the snapshot and
    /// the WAL.
    ///
    /// # Arguments
    ///
    /// * `wal_path`: path to the write-ahead log file.
    /// * `snapshot_path`: path to the checkpoint snapshot file.
    /// * `checkpoint_threshold`: logged bytes that trigger a checkpoint.
    /// * `wal_sync`: if `true`, every WAL append calls `fsync`.
    ///
    /// # Recovery Steps
    ///
    /// 1. Create parent directories for both files.
    /// 2. Remove a leftover snapshot temp file from an interrupted checkpoint.
    /// 3. Load the snapshot into a fresh memtable.
    /// 4. Replay WAL frames newer than the snapshot; cut off a torn tail.
    /// 5. Open the WAL writer in append mode.
    pub fn new<P1: AsRef<Path>, P2: AsRef<Path>>(
        wal_path: P1,
        snapshot_path: P2,
        checkpoint_threshold: usize,
        wal_sync: bool,
    ) -> Result<Self> {
        let wal_path = wal_path.as_ref().to_path_buf();
        let snapshot_path = snapshot_path.as_ref().to_path_buf();

        for path in [&wal_path, &snapshot_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create directory {}", parent.display())
                })?;
            }
        }

        Self::cleanup_tmp_files(&snapshot_path);

        let mut mem = Memtable::new();
        let snapshot_seq = snapshot::load_snapshot(&snapshot_path, &mut mem)?;

        // (must happen BEFORE opening the writer to avoid file-sharing conflicts on Windows)
        let replay = replay_wal_into(&wal_path, &mut mem, snapshot_seq)?;
        Self::repair_torn_tail(&wal_path, replay.valid_len)?;

        let wal_writer = WalWriter::create(&wal_path, wal_sync)
            .with_context(|| format!("failed to open WAL at {}", wal_path.display()))?;

        let seq = snapshot_seq.max(replay.max_seq);
        log::info!(
            "engine recovered: seq={}, entries={}, snapshot_seq={}, replayed_batches={}",
            seq,
            mem.len(),
            snapshot_seq,
            replay.applied
        );

        Ok(Self {
            mem,
            wal_path,
            snapshot_path,
            wal_writer,
            seq,
            wal_bytes: replay.valid_len as usize,
            checkpoint_threshold,
            wal_sync,
        })
    }

    /// Returns the sequence number of the last committed batch.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mem.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }

    /// Bytes appended to the WAL since the last checkpoint.
    #[must_use]
    pub fn wal_bytes(&self) -> usize {
        self.wal_bytes
    }

    #[must_use]
    pub fn checkpoint_threshold(&self) -> usize {
        self.checkpoint_threshold
    }

    /// Updates the checkpoint threshold. `0` disables automatic checkpoints.
    pub fn set_checkpoint_threshold(&mut self, threshold: usize) {
        self.checkpoint_threshold = threshold;
    }
}

/// Best-effort checkpoint on drop.
///
/// Errors are ignored because Drop cannot propagate them; the data is still
/// safe in the WAL and will be recovered on the next startup.
impl Drop for Engine {
    fn drop(&mut self) {
        if self.wal_bytes > 0 {
            let _ = self.checkpoint();
        }
    }
}

#[cfg(test)]
mod tests;
