use super::helpers::{coll, doc, dump, indexed, mutations, paths};
use crate::*;
use anyhow::Result;
use engine::{MemStore, OrderedStore};

// -------------------- point lookups --------------------

#[test]
fn save_then_get_roundtrip() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(5, &mutations(&[("rooms/r1", "m1")]))?;

    let overlay = cache.get_overlay(&doc("rooms/r1"))?.unwrap();
    assert_eq!(overlay.mutation, Mutation::from("m1"));
    assert_eq!(overlay.largest_batch_id, 5);
    assert_eq!(overlay.key, doc("rooms/r1"));
    assert_eq!(cache.verify_indexes()?, 1);
    Ok(())
}

#[test]
fn absent_key_is_none() -> Result<()> {
    let cache = indexed();
    assert!(cache.get_overlay(&doc("rooms/missing"))?.is_none());
    assert_eq!(cache.overlay_count()?, 0);
    Ok(())
}

#[test]
fn one_save_indexes_every_document() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(
        1,
        &mutations(&[("rooms/a", "x"), ("rooms/b", "y"), ("users/u/rooms/c", "z")]),
    )?;

    assert_eq!(cache.overlay_count()?, 3);
    // 3 primary + 3 collection + 3 group + 3 batch entries
    assert_eq!(dump(cache.store())?.len(), 12);
    assert_eq!(cache.verify_indexes()?, 3);
    Ok(())
}

#[test]
fn get_overlays_for_keys_skips_absent() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(2, &mutations(&[("a/1", "x"), ("a/2", "y")]))?;

    let found = cache.get_overlays_for_keys(&[doc("a/2"), doc("a/3"), doc("a/1")])?;
    assert_eq!(paths(&found), vec!["a/1", "a/2"]);
    Ok(())
}

// -------------------- overwrite --------------------

#[test]
fn newer_batch_replaces_overlay_and_indexes() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(3, &mutations(&[("docs/d", "old")]))?;
    cache.save_overlays(8, &mutations(&[("docs/d", "new")]))?;

    let overlay = cache.get_overlay(&doc("docs/d"))?.unwrap();
    assert_eq!(overlay.mutation, Mutation::from("new"));
    assert_eq!(overlay.largest_batch_id, 8);

    let in_coll = cache.get_overlays_in_collection(&coll("docs"), 0)?;
    assert_eq!(in_coll.len(), 1);
    assert_eq!(in_coll[&doc("docs/d")].largest_batch_id, 8);

    // only the batch 8 group entry survives
    let group = cache.get_overlays_in_collection_group("docs", UNKNOWN_BATCH_ID, 10)?;
    assert_eq!(group.len(), 1);
    assert_eq!(dump(cache.store())?.len(), 4);
    cache.verify_indexes()?;
    Ok(())
}

#[test]
fn same_batch_resave_replaces_mutation() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(4, &mutations(&[("docs/d", "first")]))?;
    cache.save_overlays(4, &mutations(&[("docs/d", "second")]))?;

    let overlay = cache.get_overlay(&doc("docs/d"))?.unwrap();
    assert_eq!(overlay.mutation, Mutation::from("second"));
    assert_eq!(dump(cache.store())?.len(), 4);
    cache.verify_indexes()?;
    Ok(())
}

// -------------------- batch removal --------------------

#[test]
fn remove_deletes_exact_batch_only() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(1, &mutations(&[("c/a", "1"), ("c/b", "1")]))?;
    cache.save_overlays(2, &mutations(&[("c/c", "2")]))?;

    assert_eq!(cache.remove_overlays_for_batch(1)?, 2);

    assert!(cache.get_overlay(&doc("c/a"))?.is_none());
    assert!(cache.get_overlay(&doc("c/b"))?.is_none());
    assert!(cache.get_overlay(&doc("c/c"))?.is_some());
    assert_eq!(cache.verify_indexes()?, 1);
    Ok(())
}

#[test]
fn superseded_overlay_survives_old_batch_removal() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(1, &mutations(&[("c/a", "v1"), ("c/b", "v1")]))?;
    cache.save_overlays(2, &mutations(&[("c/a", "v2")]))?;

    assert_eq!(cache.remove_overlays_for_batch(1)?, 1);

    let survivor = cache.get_overlay(&doc("c/a"))?.unwrap();
    assert_eq!(survivor.largest_batch_id, 2);
    assert_eq!(survivor.mutation, Mutation::from("v2"));
    assert!(cache.get_overlay(&doc("c/b"))?.is_none());
    cache.verify_indexes()?;
    Ok(())
}

#[test]
fn removing_unused_batch_is_noop() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(1, &mutations(&[("c/a", "x")]))?;
    let before = dump(cache.store())?;

    assert_eq!(cache.remove_overlays_for_batch(99)?, 0);
    assert_eq!(dump(cache.store())?, before);
    Ok(())
}

#[test]
fn remove_leaves_store_empty() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(6, &mutations(&[("c/a", "x"), ("d/e/c/f", "y")]))?;
    cache.remove_overlays_for_batch(6)?;
    assert!(cache.store().is_empty());
    Ok(())
}

// -------------------- collection scans --------------------

#[test]
fn collection_scan_applies_since_filter() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(1, &mutations(&[("c/a", "x")]))?;
    cache.save_overlays(2, &mutations(&[("c/b", "x")]))?;
    cache.save_overlays(3, &mutations(&[("c/c", "x")]))?;

    assert_eq!(paths(&cache.get_overlays_in_collection(&coll("c"), UNKNOWN_BATCH_ID)?).len(), 3);
    assert_eq!(paths(&cache.get_overlays_in_collection(&coll("c"), 1)?), vec!["c/b", "c/c"]);
    assert_eq!(paths(&cache.get_overlays_in_collection(&coll("c"), 2)?), vec!["c/c"]);
    assert!(cache.get_overlays_in_collection(&coll("c"), 3)?.is_empty());
    assert!(cache.get_overlays_in_collection(&coll("c"), i32::MAX)?.is_empty());
    Ok(())
}

#[test]
fn collection_scan_ignores_subcollections_and_siblings() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(
        1,
        &mutations(&[
            ("users/u1", "x"),
            ("users/u2", "x"),
            ("users/u1/posts/p1", "x"),
            ("usersx/u3", "x"),
        ]),
    )?;

    assert_eq!(
        paths(&cache.get_overlays_in_collection(&coll("users"), 0)?),
        vec!["users/u1", "users/u2"]
    );
    assert_eq!(
        paths(&cache.get_overlays_in_collection(&coll("users/u1/posts"), 0)?),
        vec!["users/u1/posts/p1"]
    );
    assert!(cache.get_overlays_in_collection(&coll("users/u1"), 0)?.is_empty());
    Ok(())
}

// -------------------- corruption & inconsistency --------------------

#[test]
fn corrupt_primary_record_is_surfaced() -> Result<()> {
    let mut store = MemStore::new();
    store.put(codec::primary_key(&doc("c/a")), b"\x01garbage".to_vec())?;
    let cache = IndexedOverlayStore::new(store);

    assert!(matches!(
        cache.get_overlay(&doc("c/a")),
        Err(OverlayError::CorruptRecord { .. })
    ));
    assert!(matches!(
        cache.verify_indexes(),
        Err(OverlayError::CorruptRecord { .. })
    ));
    Ok(())
}

#[test]
fn corrupt_collection_key_is_surfaced_even_when_filtered_out() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(9, &mutations(&[("c/a", "x")]))?;

    // unterminated document id, with a batch id the since filter would drop
    let mut raw = codec::collection_prefix(&coll("c"));
    raw.push(b'z');
    cache
        .store_mut()
        .put(raw, codec::encode_batch_id(1).to_vec())?;

    assert!(matches!(
        cache.get_overlays_in_collection(&coll("c"), 5),
        Err(OverlayError::CorruptRecord { .. })
    ));
    Ok(())
}

#[test]
fn dangling_index_entry_is_inconsistency() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(1, &mutations(&[("c/a", "x")]))?;

    let mut store = cache.into_inner();
    store.delete(codec::primary_key(&doc("c/a")))?;
    let cache = IndexedOverlayStore::new(store);

    assert!(matches!(
        cache.get_overlays_in_collection(&coll("c"), 0),
        Err(OverlayError::IndexInconsistency { .. })
    ));
    assert!(matches!(
        cache.get_overlays_in_collection_group("c", 0, 10),
        Err(OverlayError::IndexInconsistency { .. })
    ));
    assert!(matches!(
        cache.verify_indexes(),
        Err(OverlayError::IndexInconsistency { .. })
    ));
    Ok(())
}

#[test]
fn mismatched_batch_id_is_inconsistency() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(1, &mutations(&[("c/a", "x")]))?;

    let key = doc("c/a");
    cache
        .store_mut()
        .put(codec::collection_key(&key), codec::encode_batch_id(7).to_vec())?;

    assert!(matches!(
        cache.get_overlays_in_collection(&coll("c"), 0),
        Err(OverlayError::IndexInconsistency { .. })
    ));
    assert!(cache.verify_indexes().is_err());
    Ok(())
}

#[test]
fn missing_secondary_entry_fails_audit() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(1, &mutations(&[("c/a", "x")]))?;

    let key = doc("c/a");
    cache.store_mut().delete(codec::batch_key(1, &key))?;

    assert!(matches!(
        cache.verify_indexes(),
        Err(OverlayError::IndexInconsistency { .. })
    ));
    Ok(())
}

#[test]
fn stale_group_entry_fails_audit() -> Result<()> {
    let mut cache = indexed();
    cache.save_overlays(2, &mutations(&[("c/a", "x")]))?;
    cache
        .store_mut()
        .put(codec::group_key(&doc("c/a"), 1), Vec::new())?;

    assert!(matches!(
        cache.verify_indexes(),
        Err(OverlayError::IndexInconsistency { .. })
    ));
    Ok(())
}
