//! Command parsing and execution for the shell.
//!
//! Kept apart from `main` so the command set can be driven against any
//! writer in tests.
use anyhow::{anyhow, bail, Context, Result};
use engine::Engine;
use overlay::{
    BatchId, DocumentKey, IndexedOverlayStore, Mutation, MutationMap, Overlay, OverlayMap,
    OverlayStore, ResourcePath, UNKNOWN_BATCH_ID,
};
use std::io::Write;

/// Page size used by `GROUP` when no count is given.
pub const DEFAULT_GROUP_COUNT: usize = 100;

pub type Cache = IndexedOverlayStore<Engine>;

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Runs one input line against `cache`, writing the response to `out`.
///
/// Command failures are reported as `ERR ...` lines; only a failure to write
/// to `out` is returned as an error.
pub fn execute<W: Write>(cache: &mut Cache, line: &str, out: &mut W) -> Result<Flow> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(Flow::Continue);
    };
    let args: Vec<&str> = parts.collect();

    let result = match cmd.to_uppercase().as_str() {
        "SAVE" => save(cache, &args, out),
        "GET" => get(cache, &args, out),
        "REMOVE" => remove(cache, &args, out),
        "COLLECTION" => collection(cache, &args, out),
        "GROUP" => group(cache, &args, out),
        "COUNT" => cache
            .overlay_count()
            .context("count failed")
            .and_then(|n| Ok(writeln!(out, "({} overlays)", n)?)),
        "CHECK" => cache
            .verify_indexes()
            .context("check failed")
            .and_then(|n| Ok(writeln!(out, "OK ({} overlays consistent)", n)?)),
        "CHECKPOINT" => cache
            .store_mut()
            .force_checkpoint()
            .context("checkpoint failed")
            .and_then(|()| Ok(writeln!(out, "OK")?)),
        "STATS" => Ok(writeln!(out, "{:?}", cache.store())?),
        "EXIT" | "QUIT" => {
            writeln!(out, "bye")?;
            return Ok(Flow::Exit);
        }
        other => Err(anyhow!("unknown command: {}", other)),
    };

    if let Err(e) = result {
        log::debug!("command {:?} failed: {:#}", line, e);
        writeln!(out, "ERR {:#}", e)?;
    }
    Ok(Flow::Continue)
}

fn save<W: Write>(cache: &mut Cache, args: &[&str], out: &mut W) -> Result<()> {
    const USAGE: &str = "usage: SAVE <batch_id> <doc_path> <mutation> [<doc_path> <mutation> ...]";
    let [batch, pairs @ ..] = args else {
        bail!(USAGE);
    };
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        bail!(USAGE);
    }

    let batch_id = parse_batch(batch)?;
    let mut overlays = MutationMap::new();
    for pair in pairs.chunks(2) {
        overlays.insert(DocumentKey::parse(pair[0])?, Mutation::from(pair[1]));
    }
    cache.save_overlays(batch_id, &overlays).context("save failed")?;
    writeln!(out, "OK")?;
    Ok(())
}

fn get<W: Write>(cache: &mut Cache, args: &[&str], out: &mut W) -> Result<()> {
    let [path] = args else {
        bail!("usage: GET <doc_path>");
    };
    match cache.get_overlay(&DocumentKey::parse(path)?).context("read failed")? {
        Some(overlay) => print_overlay(&overlay, out)?,
        None => writeln!(out, "(nil)")?,
    }
    Ok(())
}

fn remove<W: Write>(cache: &mut Cache, args: &[&str], out: &mut W) -> Result<()> {
    let [batch] = args else {
        bail!("usage: REMOVE <batch_id>");
    };
    let removed = cache
        .remove_overlays_for_batch(parse_batch(batch)?)
        .context("remove failed")?;
    writeln!(out, "OK ({} removed)", removed)?;
    Ok(())
}

fn collection<W: Write>(cache: &mut Cache, args: &[&str], out: &mut W) -> Result<()> {
    let (path, since) = match args {
        [path] => (path, UNKNOWN_BATCH_ID),
        [path, since] => (path, parse_batch(since)?),
        _ => bail!("usage: COLLECTION <collection_path> [since]"),
    };
    let overlays = cache
        .get_overlays_in_collection(&ResourcePath::parse(path)?, since)
        .context("scan failed")?;
    print_overlays(&overlays, out)
}

fn group<W: Write>(cache: &mut Cache, args: &[&str], out: &mut W) -> Result<()> {
    let (group_id, since, count) = match args {
        [g] => (g, UNKNOWN_BATCH_ID, DEFAULT_GROUP_COUNT),
        [g, since] => (g, parse_batch(since)?, DEFAULT_GROUP_COUNT),
        [g, since, count] => (
            g,
            parse_batch(since)?,
            count
                .parse::<usize>()
                .map_err(|_| anyhow!("count must be a non-negative integer, got {:?}", count))?,
        ),
        _ => bail!("usage: GROUP <group_id> [since] [count]"),
    };
    let overlays = cache
        .get_overlays_in_collection_group(group_id, since, count)
        .context("scan failed")?;
    print_overlays(&overlays, out)
}

fn parse_batch(s: &str) -> Result<BatchId> {
    s.parse::<BatchId>()
        .map_err(|_| anyhow!("batch id must be a 32-bit integer, got {:?}", s))
}

fn print_overlay<W: Write>(overlay: &Overlay, out: &mut W) -> Result<()> {
    writeln!(
        out,
        "{} @{} -> {}",
        overlay.key,
        overlay.largest_batch_id,
        String::from_utf8_lossy(overlay.mutation.as_bytes())
    )?;
    Ok(())
}

fn print_overlays<W: Write>(overlays: &OverlayMap, out: &mut W) -> Result<()> {
    for overlay in overlays.values() {
        print_overlay(overlay, out)?;
    }
    writeln!(out, "({} overlays)", overlays.len())?;
    Ok(())
}
