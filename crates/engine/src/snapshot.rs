//! Checkpoint snapshot file.
//!
//! A snapshot is the complete memtable state at a given sequence number.
//! Writing one lets the engine truncate its WAL.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ DATA SECTION (sorted key/value records)                        │
//! │                                                               │
//! │ crc32 (u32) | key_len (u32) | key | val_len (u32) | val        │
//! │                                                               │
//! │ The CRC32 covers everything after itself in the record.       │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FOOTER (always last 20 bytes)                                  │
//! │                                                               │
//! │ max_seq (u64 LE) | entry_count (u64 LE) | magic (u32 LE) "OVS1"│
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes go to `<path>.tmp`, are fsynced, and then atomically renamed over
//! the previous snapshot.

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use memtable::Memtable;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::{MAX_KEY_SIZE, MAX_VALUE_SIZE};

/// Magic number identifying snapshot files (ASCII "OVS1").
pub const SNAPSHOT_MAGIC: u32 = 0x4f56_5331;

/// Footer size: 8 (`max_seq`) + 8 (`entry_count`) + 4 (`magic`).
pub const FOOTER_BYTES: usize = 8 + 8 + 4;

/// Temp file used while a checkpoint is being written.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes `mem` as the snapshot at `path`, stamped with `max_seq`.
pub fn write_snapshot(path: &Path, max_seq: u64, mem: &Memtable) -> Result<()> {
    let tmp = tmp_path(path);
    let raw_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .with_context(|| format!("failed to create snapshot tmp at {}", tmp.display()))?;
    let mut file = BufWriter::new(raw_file);

    let mut record_buf: Vec<u8> = Vec::with_capacity(256);
    let mut count = 0u64;

    for (key, value) in mem.iter() {
        record_buf.clear();
        record_buf.write_u32::<LittleEndian>(key.len() as u32)?;
        record_buf.extend_from_slice(key);
        record_buf.write_u32::<LittleEndian>(value.len() as u32)?;
        record_buf.extend_from_slice(value);

        let mut hasher = Crc32::new();
        hasher.update(&record_buf);

        file.write_u32::<LittleEndian>(hasher.finalize())?;
        file.write_all(&record_buf)?;
        count += 1;
    }

    file.write_u64::<LittleEndian>(max_seq)?;
    file.write_u64::<LittleEndian>(count)?;
    file.write_u32::<LittleEndian>(SNAPSHOT_MAGIC)?;

    file.flush()?;
    file.into_inner()
        .map_err(|e| e.into_error())?
        .sync_all()?;

    fs::rename(&tmp, path)
        .with_context(|| format!("failed to move snapshot into place at {}", path.display()))?;

    // A crash after rename but before the directory is synced can lose the
    // entry on ext4/XFS.
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

/// Loads the snapshot at `path` into `mem` and returns its `max_seq`.
///
/// A missing file is a fresh start and returns `0`.
///
/// # Errors
///
/// Bad magic, a truncated record, a CRC mismatch, or an entry count that
/// disagrees with the footer are all corruption errors.
pub fn load_snapshot(path: &Path, mem: &mut Memtable) -> Result<u64> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("failed to read snapshot at {}", path.display())))
        }
    };

    if data.len() < FOOTER_BYTES {
        bail!("corrupt snapshot {}: file too small", path.display());
    }

    let (mut body, mut footer) = data.split_at(data.len() - FOOTER_BYTES);
    let max_seq = footer.read_u64::<LittleEndian>()?;
    let expected = footer.read_u64::<LittleEndian>()?;
    let magic = footer.read_u32::<LittleEndian>()?;
    if magic != SNAPSHOT_MAGIC {
        bail!("corrupt snapshot {}: bad magic {:#x}", path.display(), magic);
    }

    let mut count = 0u64;
    while !body.is_empty() {
        let (key, value) = read_record(&mut body)
            .with_context(|| format!("corrupt snapshot {} at record {}", path.display(), count))?;
        mem.put(key, value);
        count += 1;
    }

    if count != expected {
        bail!(
            "corrupt snapshot {}: footer says {} entries, found {}",
            path.display(),
            expected,
            count
        );
    }

    Ok(max_seq)
}

fn read_record(body: &mut &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let whole = *body;
    let mut rdr = whole;

    let crc = rdr.read_u32::<LittleEndian>()?;
    let covered_start = rdr;

    let key_len = rdr.read_u32::<LittleEndian>()? as usize;
    if key_len > MAX_KEY_SIZE || key_len > rdr.len() {
        bail!("key_len {} out of bounds", key_len);
    }
    let (key, rest) = rdr.split_at(key_len);
    rdr = rest;

    let val_len = rdr.read_u32::<LittleEndian>()? as usize;
    if val_len > MAX_VALUE_SIZE || val_len > rdr.len() {
        bail!("val_len {} out of bounds", val_len);
    }
    let (value, rest) = rdr.split_at(val_len);

    let covered = &covered_start[..covered_start.len() - rest.len()];
    let mut hasher = Crc32::new();
    hasher.update(covered);
    if hasher.finalize() != crc {
        bail!("crc mismatch");
    }

    *body = rest;
    Ok((key.to_vec(), value.to_vec()))
}
