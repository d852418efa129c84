use crate::{Engine, OrderedStore};
use anyhow::Result;
use std::path::Path;

pub const BIG_THRESHOLD: usize = 1024 * 1024;

pub fn open_engine(dir: &Path, checkpoint_threshold: usize) -> Result<Engine> {
    Engine::new(
        dir.join("wal.log"),
        dir.join("snap").join("overlay.snap"),
        checkpoint_threshold,
        false,
    )
}

/// Simulates a crash: the engine goes away without its `Drop` checkpoint.
pub fn crash(engine: Engine) {
    std::mem::forget(engine);
}

pub fn collect_prefix<S: OrderedStore>(store: &S, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    store.iterate(prefix)?.collect()
}
