use super::helpers::{coll, doc};
use crate::codec::*;
use crate::*;

#[test]
fn batch_ids_sort_numerically() {
    let ids = [i32::MIN, -2, UNKNOWN_BATCH_ID, 0, 1, 255, 256, i32::MAX];
    let encoded: Vec<[u8; 4]> = ids.iter().map(|&id| encode_batch_id(id)).collect();
    let mut sorted = encoded.clone();
    sorted.sort();
    assert_eq!(encoded, sorted);

    for id in ids {
        assert_eq!(decode_batch_id(&encode_batch_id(id), "test").unwrap(), id);
    }
}

#[test]
fn primary_keys_sort_like_document_keys() {
    let mut keys = vec![
        doc("a/b"),
        doc("a/b/c/d"),
        doc("a/b\u{0}x"),
        doc("a/bb"),
        doc("a\u{0}/z"),
        doc("ab/c"),
        doc("a/a"),
    ];
    keys.sort();

    let encoded: Vec<Vec<u8>> = keys.iter().map(primary_key).collect();
    let mut sorted = encoded.clone();
    sorted.sort();
    assert_eq!(encoded, sorted);

    for (key, raw) in keys.iter().zip(&encoded) {
        assert_eq!(&decode_primary_key(raw).unwrap(), key);
    }
}

#[test]
fn collection_prefix_excludes_subcollections_and_siblings() {
    let prefix = collection_prefix(&coll("users/u1/posts"));

    assert!(collection_key(&doc("users/u1/posts/p1")).starts_with(&prefix));
    assert!(!collection_key(&doc("users/u1/posts/p1/comments/c1")).starts_with(&prefix));
    assert!(!collection_key(&doc("users/u1/postsx/p1")).starts_with(&prefix));
    assert!(!collection_key(&doc("users/u1")).starts_with(&prefix));
}

#[test]
fn collection_key_decodes_to_document() {
    let key = doc("users/u\u{0}1/posts/p1");
    assert_eq!(decode_collection_key(&collection_key(&key)).unwrap(), key);
}

#[test]
fn group_keys_order_by_batch_then_document() {
    let a = group_key(&doc("x/1/posts/z"), 3);
    let b = group_key(&doc("posts/a"), 4);
    let c = group_key(&doc("posts/b"), 4);
    assert!(a < b && b < c);

    assert!(a.starts_with(&group_prefix("posts")));
    assert!(!a.starts_with(&group_prefix("post")));
    assert!(b >= group_start("posts", 4));
    assert!(a < group_start("posts", 4));

    let (group, batch_id, key) = decode_group_key(&b).unwrap();
    assert_eq!((group.as_str(), batch_id, key), ("posts", 4, doc("posts/a")));
}

#[test]
fn batch_key_decodes() {
    let raw = batch_key(-5, &doc("rooms/r1"));
    assert!(raw.starts_with(&batch_prefix(-5)));
    assert_eq!(decode_batch_key(&raw).unwrap(), (-5, doc("rooms/r1")));
}

#[test]
fn tables_do_not_overlap() {
    let key = doc("a/b");
    let tags: Vec<u8> = [
        primary_key(&key),
        collection_key(&key),
        group_key(&key, 1),
        batch_key(1, &key),
    ]
    .iter()
    .map(|k| k[0])
    .collect();
    assert_eq!(tags, vec![TAG_PRIMARY, TAG_COLLECTION, TAG_GROUP, TAG_BATCH]);
}

// -------------------- primary record --------------------

#[test]
fn record_roundtrip_with_empty_mutation() {
    let raw = encode_record(9, &Mutation::default());
    assert_eq!(raw.len(), 9);
    assert_eq!(decode_record(&raw).unwrap(), (9, Mutation::default()));
}

#[test]
fn record_header_is_little_endian() {
    let raw = encode_record(-2, &Mutation::from("ab"));
    assert_eq!(
        raw,
        vec![1, 0xfe, 0xff, 0xff, 0xff, 2, 0, 0, 0, b'a', b'b']
    );
}

#[test]
fn record_errors_are_corruption() {
    let good = encode_record(3, &Mutation::from("payload"));

    let mut bad_version = good.clone();
    bad_version[0] = 9;
    let mut trailing = good.clone();
    trailing.push(0);

    for raw in [&good[..4], &good[..good.len() - 1], &bad_version[..], &trailing[..], &[][..]] {
        assert!(matches!(
            decode_record(raw),
            Err(OverlayError::CorruptRecord { .. })
        ));
    }
}

#[test]
fn malformed_keys_are_corruption() {
    let good = primary_key(&doc("a/b"));

    let cases: Vec<Vec<u8>> = vec![
        Vec::new(),
        vec![TAG_COLLECTION],
        good[..good.len() - 1].to_vec(),
        [good.as_slice(), b"x".as_slice()].concat(),
        primary_key(&doc("a/b"))[..4].to_vec(),
        vec![TAG_PRIMARY, b'a', 0x00, 0x07],
        // one segment: not a document
        vec![TAG_PRIMARY, b'a', 0x00, 0x01, 0x00, 0x00],
        // invalid UTF-8
        vec![TAG_PRIMARY, 0xC3, 0x00, 0x01, b'b', 0x00, 0x01, 0x00, 0x00],
    ];
    for raw in cases {
        assert!(
            matches!(decode_primary_key(&raw), Err(OverlayError::CorruptRecord { .. })),
            "{:?} should not decode",
            raw
        );
    }
}
