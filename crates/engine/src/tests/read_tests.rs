use super::helpers::{collect_prefix, open_engine, BIG_THRESHOLD};
use crate::*;
use anyhow::Result;
use tempfile::tempdir;

#[test]
fn get_missing_key() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path(), BIG_THRESHOLD)?;
    assert!(engine.get(b"nope")?.is_none());
    Ok(())
}

#[test]
fn scan_empty_engine() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path(), BIG_THRESHOLD)?;
    assert!(collect_prefix(&engine, b"")?.is_empty());
    Ok(())
}

#[test]
fn scan_returns_sorted_prefix_matches() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), BIG_THRESHOLD)?;

    let mut batch = WriteBatch::new();
    batch.put(b"user:3".to_vec(), b"c".to_vec());
    batch.put(b"user:1".to_vec(), b"a".to_vec());
    batch.put(b"other".to_vec(), b"x".to_vec());
    batch.put(b"user:2".to_vec(), b"b".to_vec());
    engine.write(batch)?;

    let rows = collect_prefix(&engine, b"user:")?;
    assert_eq!(
        rows,
        vec![
            (b"user:1".to_vec(), b"a".to_vec()),
            (b"user:2".to_vec(), b"b".to_vec()),
            (b"user:3".to_vec(), b"c".to_vec()),
        ]
    );
    Ok(())
}

#[test]
fn scan_excludes_deleted_keys() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), BIG_THRESHOLD)?;

    engine.put(b"p1".to_vec(), b"1".to_vec())?;
    engine.put(b"p2".to_vec(), b"2".to_vec())?;
    engine.delete(b"p1".to_vec())?;

    let keys: Vec<Vec<u8>> = collect_prefix(&engine, b"p")?
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert_eq!(keys, vec![b"p2".to_vec()]);
    Ok(())
}

#[test]
fn scan_start_past_every_key_is_empty() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), BIG_THRESHOLD)?;
    engine.put(b"p1".to_vec(), Vec::new())?;

    assert_eq!(engine.scan(b"p", b"p9")?.count(), 0);
    Ok(())
}
