/// Snapshot load and WAL replay.
///
/// This module handles the cold-start path: replaying WAL frames on top of the
/// checkpoint snapshot, repairing a torn WAL tail, and removing temp files
/// left behind by an interrupted checkpoint.
use anyhow::{Context, Result};
use memtable::Memtable;
use std::fs::OpenOptions;
use std::path::Path;
use wal::{WalError, WalReader};

use crate::batch::apply_ops;
use crate::snapshot;
use crate::Engine;

/// Outcome of a WAL replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Highest sequence number seen in the WAL (applied or skipped).
    pub max_seq: u64,
    /// Number of batches applied to the memtable.
    pub applied: usize,
    /// Byte length of the intact WAL prefix.
    pub valid_len: u64,
}

/// Replays a WAL file into `mem`, skipping batches with `seq <= after_seq`
/// (already contained in the snapshot).
///
/// If the WAL file does not exist, returns an empty summary (fresh start).
///
/// # Errors
///
/// Propagates any I/O or corruption error from [`WalReader::replay`].
pub fn replay_wal_into<P: AsRef<Path>>(
    path: P,
    mem: &mut Memtable,
    after_seq: u64,
) -> Result<ReplaySummary> {
    let mut reader = match WalReader::open(path.as_ref()) {
        Ok(reader) => reader,
        Err(WalError::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ReplaySummary::default());
        }
        Err(e) => return Err(anyhow::anyhow!(e).context("failed to open WAL for replay")),
    };

    let mut max_seq = 0u64;
    let mut applied = 0usize;
    let valid_len = reader
        .replay(|record| {
            max_seq = max_seq.max(record.seq);
            if record.seq > after_seq {
                apply_ops(mem, &record.ops);
                applied += 1;
            }
        })
        .with_context(|| format!("failed to replay WAL at {}", path.as_ref().display()))?;

    Ok(ReplaySummary {
        max_seq,
        applied,
        valid_len,
    })
}

impl Engine {
    /// Cuts the WAL back to its last complete frame.
    ///
    /// Without this, the next append would land behind the torn bytes and the
    /// following replay would misread the glued-together frame as corrupt.
    pub(crate) fn repair_torn_tail(wal_path: &Path, valid_len: u64) -> Result<()> {
        let Ok(meta) = std::fs::metadata(wal_path) else {
            return Ok(());
        };
        if meta.len() <= valid_len {
            return Ok(());
        }

        log::warn!(
            "discarding {} bytes of torn WAL tail at {}",
            meta.len() - valid_len,
            wal_path.display()
        );
        let f = OpenOptions::new()
            .write(true)
            .open(wal_path)
            .with_context(|| format!("failed to open WAL at {}", wal_path.display()))?;
        f.set_len(valid_len)?;
        f.sync_all()?;
        Ok(())
    }

    /// Removes a snapshot temp file left by an interrupted checkpoint.
    pub(crate) fn cleanup_tmp_files(snapshot_path: &Path) {
        let tmp = snapshot::tmp_path(snapshot_path);
        if tmp.exists() {
            log::debug!("removing stale snapshot temp file {}", tmp.display());
            let _ = std::fs::remove_file(&tmp);
        }
    }
}
