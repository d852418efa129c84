use super::helpers::collect_prefix;
use crate::*;
use anyhow::Result;

#[test]
fn put_get_delete() -> Result<()> {
    let mut store = MemStore::new();
    store.put(b"k".to_vec(), b"v".to_vec())?;
    assert_eq!(store.get(b"k")?, Some(b"v".to_vec()));

    store.delete(b"k".to_vec())?;
    assert!(store.get(b"k")?.is_none());
    assert!(store.is_empty());
    Ok(())
}

#[test]
fn invalid_batch_applies_nothing() -> Result<()> {
    let mut store = MemStore::new();

    let mut batch = WriteBatch::new();
    batch.put(b"good".to_vec(), b"v".to_vec());
    batch.put(Vec::new(), b"bad".to_vec());

    assert!(store.write(batch).is_err());
    assert!(store.get(b"good")?.is_none());
    assert_eq!(store.len(), 0);
    Ok(())
}

#[test]
fn scan_respects_prefix_and_start() -> Result<()> {
    let mut store = MemStore::new();
    let mut batch = WriteBatch::new();
    for k in ["a1", "b1", "b2", "b3", "c1"] {
        batch.put(k.as_bytes().to_vec(), Vec::new());
    }
    store.write(batch)?;

    let all_b: Vec<Vec<u8>> = collect_prefix(&store, b"b")?
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert_eq!(all_b, vec![b"b1".to_vec(), b"b2".to_vec(), b"b3".to_vec()]);

    let from_b2: Vec<Vec<u8>> = store
        .scan(b"b", b"b2")?
        .map(|r| r.map(|(k, _)| k))
        .collect::<Result<_>>()?;
    assert_eq!(from_b2, vec![b"b2".to_vec(), b"b3".to_vec()]);
    Ok(())
}

#[test]
fn scan_is_lazy_and_can_stop_early() -> Result<()> {
    let mut store = MemStore::new();
    let mut batch = WriteBatch::new();
    for i in 0..1_000u32 {
        batch.put([b"p".as_slice(), &i.to_be_bytes()[..]].concat(), Vec::new());
    }
    store.write(batch)?;

    let first_three: Vec<_> = store.iterate(b"p")?.take(3).collect::<Result<_>>()?;
    assert_eq!(first_three.len(), 3);
    assert_eq!(first_three[0].0, [b"p".as_slice(), &0u32.to_be_bytes()[..]].concat());
    Ok(())
}
