/// Write path: `write()`, `force_checkpoint()`, and the internal `checkpoint()`.
///
/// Every batch is appended to the WAL as one frame, then applied to the
/// memtable. When enough bytes have been logged since the last checkpoint, the
/// memtable is persisted as a snapshot and the WAL is reset.
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use wal::{WalRecord, WalWriter};

use crate::batch::apply_ops;
use crate::{snapshot, Engine, WriteBatch};

impl Engine {
    /// Commits `batch` atomically.
    ///
    /// The batch is validated, logged as a single WAL frame, and only then
    /// applied to the memtable. If validation or the WAL append fails, the
    /// in-memory state is untouched and the WAL holds no trace of the batch,
    /// so a failed write never reappears after a restart. An empty batch is a no-op and consumes no
    /// sequence number.
    ///
    /// A checkpoint triggered by this write that fails is logged and not
    /// returned: the batch itself is already durable in the WAL.
    pub fn write_batch(&mut self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        batch.validate()?;

        let seq = self
            .seq
            .checked_add(1)
            .ok_or_else(|| anyhow::anyhow!("sequence number overflow (u64::MAX reached)"))?;

        let record = WalRecord {
            seq,
            ops: batch.into_ops(),
        };
        let written = match self.wal_writer.append(&record) {
            Ok(n) => n,
            Err(e) => {
                if self.wal_writer.is_poisoned() {
                    log::error!("WAL append for seq={} failed and could not be rolled back", seq);
                }
                return Err(e).context("failed to append batch to WAL");
            }
        };

        self.seq = seq;
        apply_ops(&mut self.mem, &record.ops);
        self.wal_bytes += written;

        log::debug!("committed batch seq={} ops={}", seq, record.ops.len());

        if self.checkpoint_threshold > 0 && self.wal_bytes >= self.checkpoint_threshold {
            if let Err(e) = self.checkpoint() {
                log::warn!("checkpoint after seq={} failed: {:#}", seq, e);
            }
        }

        Ok(())
    }

    /// Writes a snapshot and resets the WAL now.
    ///
    /// No-op when nothing was logged since the last checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure during the snapshot write or WAL reset.
    pub fn force_checkpoint(&mut self) -> Result<()> {
        if self.wal_bytes == 0 {
            return Ok(());
        }
        self.checkpoint()
    }

    /// # Steps
    ///
    /// 1. Write the memtable to `<snapshot>.tmp`, fsync, rename into place.
    /// 2. Truncate the WAL to zero bytes.
    /// 3. Create a fresh [`WalWriter`] in append mode.
    ///
    /// A crash between 1 and 2 is harmless: recovery skips WAL frames whose
    /// sequence number the snapshot already covers.
    pub(crate) fn checkpoint(&mut self) -> Result<()> {
        snapshot::write_snapshot(&self.snapshot_path, self.seq, &self.mem)?;

        let _f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.wal_path)
            .with_context(|| format!("failed to truncate WAL at {}", self.wal_path.display()))?;

        self.wal_writer = WalWriter::create(&self.wal_path, self.wal_sync)?;
        self.wal_bytes = 0;

        log::info!(
            "checkpoint written: seq={}, entries={}, path={}",
            self.seq,
            self.mem.len(),
            self.snapshot_path.display()
        );
        Ok(())
    }
}
