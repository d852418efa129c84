//! # cli - interactive shell over a durable overlay cache
//!
//! Reads commands from stdin, runs them against an
//! [`IndexedOverlayStore`](overlay::IndexedOverlayStore) on the durable
//! engine, and prints results to stdout. Works both interactively and with
//! commands piped in.
//!
//! ## Commands
//!
//! ```text
//! SAVE <batch> <doc> <mutation> [<doc> <mutation> ...]  Save overlays under one batch
//! GET <doc>                          Print the overlay of a document or "(nil)"
//! REMOVE <batch>                     Remove overlays whose batch is exactly <batch>
//! COLLECTION <path> [since]          Overlays directly in a collection
//! GROUP <group> [since] [count]      One batch-atomic page of a collection group
//! COUNT                              Number of stored overlays
//! CHECK                              Audit every index against the primary index
//! CHECKPOINT                         Write a snapshot and reset the WAL
//! STATS                              Print engine debug info
//! EXIT / QUIT                        Shut down gracefully
//! ```
//!
//! ## Configuration
//!
//! ```text
//! OVERLAY_WAL_PATH       WAL file path                 (default: "overlay.wal")
//! OVERLAY_SNAPSHOT_PATH  Snapshot file path            (default: "data/overlay.snap")
//! OVERLAY_CHECKPOINT_KB  Logged KiB before checkpoint  (default: 1024)
//! OVERLAY_WAL_SYNC       fsync every WAL append        (default: "true")
//! RUST_LOG               Log filter for stderr          (default: "warn")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! overlay cache ready (seq=0, overlays=0, wal=overlay.wal, snapshot=data/overlay.snap)
//! > SAVE 1 rooms/r1 rename
//! OK
//! > GET rooms/r1
//! rooms/r1 @1 -> rename
//! > REMOVE 1
//! OK (1 removed)
//! > EXIT
//! bye
//! ```

mod commands;

use anyhow::Result;
use config::StoreConfig;
use engine::Engine;
use overlay::{IndexedOverlayStore, OverlayStore};
use std::io::{self, BufRead, Write};

use commands::Flow;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = StoreConfig::from_env();
    let mut cache = IndexedOverlayStore::new(Engine::open(&config)?);

    println!(
        "overlay cache ready (seq={}, overlays={}, wal={}, snapshot={})",
        cache.store().seq(),
        cache.overlay_count()?,
        config.wal_path.display(),
        config.snapshot_path.display()
    );
    println!("Commands: SAVE batch doc mutation [...] | GET doc | REMOVE batch");
    println!("          COLLECTION path [since] | GROUP id [since] [count]");
    println!("          COUNT | CHECK | CHECKPOINT | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if commands::execute(&mut cache, &line, &mut stdout)? == Flow::Exit {
            break;
        }
        print!("> ");
        stdout.flush().ok();
    }

    Ok(())
}
