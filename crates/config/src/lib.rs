//! # Config - runtime settings for the overlay store
//!
//! All settings can be supplied through environment variables. Anything that
//! is missing or fails to parse falls back to the default.
//!
//! ```text
//! OVERLAY_WAL_PATH       WAL file path                 (default: "overlay.wal")
//! OVERLAY_SNAPSHOT_PATH  Snapshot file path            (default: "data/overlay.snap")
//! OVERLAY_CHECKPOINT_KB  Logged KiB before checkpoint  (default: 1024)
//! OVERLAY_WAL_SYNC       fsync every WAL append        (default: "true")
//! ```

use std::path::PathBuf;

pub const ENV_WAL_PATH: &str = "OVERLAY_WAL_PATH";
pub const ENV_SNAPSHOT_PATH: &str = "OVERLAY_SNAPSHOT_PATH";
pub const ENV_CHECKPOINT_KB: &str = "OVERLAY_CHECKPOINT_KB";
pub const ENV_WAL_SYNC: &str = "OVERLAY_WAL_SYNC";

const DEFAULT_WAL_PATH: &str = "overlay.wal";
const DEFAULT_SNAPSHOT_PATH: &str = "data/overlay.snap";
const DEFAULT_CHECKPOINT_KB: usize = 1024;

/// Settings for a durable overlay store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Write-ahead log file.
    pub wal_path: PathBuf,
    /// Checkpoint snapshot file. Its parent directory is created on open.
    pub snapshot_path: PathBuf,
    /// Bytes logged to the WAL since the last checkpoint that trigger a new one.
    pub checkpoint_threshold: usize,
    /// If `true`, every WAL append is followed by `fsync`.
    pub wal_sync: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            wal_path: PathBuf::from(DEFAULT_WAL_PATH),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            checkpoint_threshold: DEFAULT_CHECKPOINT_KB * 1024,
            wal_sync: true,
        }
    }
}

impl StoreConfig {
    /// Builds a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    ///
    /// Split out from [`from_env`](Self::from_env) so tests do not have to
    /// mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let wal_path = lookup(ENV_WAL_PATH)
            .map(PathBuf::from)
            .unwrap_or(defaults.wal_path);
        let snapshot_path = lookup(ENV_SNAPSHOT_PATH)
            .map(PathBuf::from)
            .unwrap_or(defaults.snapshot_path);
        let checkpoint_kb = lookup(ENV_CHECKPOINT_KB)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_CHECKPOINT_KB);
        let wal_sync = lookup(ENV_WAL_SYNC)
            .and_then(|v| v.trim().parse::<bool>().ok())
            .unwrap_or(defaults.wal_sync);

        Self {
            wal_path,
            snapshot_path,
            checkpoint_threshold: checkpoint_kb.saturating_mul(1024),
            wal_sync,
        }
    }

    /// Config rooted in `dir`, with a small checkpoint threshold and no fsync.
    pub fn for_testing(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            wal_path: dir.join("overlay.wal"),
            snapshot_path: dir.join("overlay.snap"),
            checkpoint_threshold: 64 * 1024,
            wal_sync: false,
        }
    }
}
