//! Order-preserving key codec and the primary record format.
//!
//! All four tables share one ordered keyspace, each behind a one-byte tag.
//!
//! ```text
//! primary     0x10 | path(document)                      -> record
//! collection  0x11 | path(collection) | path(doc id)     -> batch_id
//! group       0x12 | segment(group) | batch_id | path(document) -> ""
//! batch       0x13 | batch_id | path(document)           -> ""
//! ```
//!
//! A segment is its UTF-8 bytes with every `0x00` escaped as `0x00 0xFF`,
//! closed by `0x00 0x01`. A path is its segments closed by `0x00 0x00`.
//! Because the path terminator sorts below the segment terminator, a path
//! sorts directly before its descendants, and the encoding of a collection
//! path is a prefix of exactly the entries of that collection.
//!
//! Batch ids are stored big-endian with the sign bit flipped so that
//! negative ids sort before positive ones.
//!
//! The primary record is `[version: u8][batch_id: i32 LE][len: u32 LE][mutation]`.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use crate::error::{OverlayError, Result};
use crate::model::{BatchId, DocumentKey, Mutation, ResourcePath};

pub const TAG_PRIMARY: u8 = 0x10;
pub const TAG_COLLECTION: u8 = 0x11;
pub const TAG_GROUP: u8 = 0x12;
pub const TAG_BATCH: u8 = 0x13;

pub(crate) const PRIMARY_TABLE: &str = "primary";
pub(crate) const COLLECTION_TABLE: &str = "collection index";
pub(crate) const GROUP_TABLE: &str = "collection group index";
pub(crate) const BATCH_TABLE: &str = "batch index";

const ESCAPE: u8 = 0x00;
const ESCAPED_NUL: u8 = 0xFF;
const SEGMENT_END: u8 = 0x01;
const PATH_END: u8 = 0x00;

const RECORD_VERSION: u8 = 1;
const RECORD_HEADER: usize = 1 + 4 + 4;

pub const BATCH_ID_BYTES: usize = 4;

// -------------------- encoding --------------------

pub fn encode_batch_id(id: BatchId) -> [u8; BATCH_ID_BYTES] {
    ((id as u32) ^ 0x8000_0000).to_be_bytes()
}

fn write_segment(out: &mut Vec<u8>, segment: &str) {
    for &b in segment.as_bytes() {
        if b == ESCAPE {
            out.extend_from_slice(&[ESCAPE, ESCAPED_NUL]);
        } else {
            out.push(b);
        }
    }
    out.extend_from_slice(&[ESCAPE, SEGMENT_END]);
}

fn write_path(out: &mut Vec<u8>, path: &ResourcePath) {
    for segment in path.segments() {
        write_segment(out, segment);
    }
    out.extend_from_slice(&[ESCAPE, PATH_END]);
}

pub fn primary_key(key: &DocumentKey) -> Vec<u8> {
    let mut out = vec![TAG_PRIMARY];
    write_path(&mut out, key.path());
    out
}

/// Prefix shared by every primary entry.
pub fn primary_table_prefix() -> Vec<u8> {
    vec![TAG_PRIMARY]
}

/// Prefix of every collection index entry for documents directly in
/// `collection`.
pub fn collection_prefix(collection: &ResourcePath) -> Vec<u8> {
    let mut out = vec![TAG_COLLECTION];
    write_path(&mut out, collection);
    out
}

pub fn collection_key(key: &DocumentKey) -> Vec<u8> {
    let mut out = collection_prefix(&key.collection_path());
    write_segment(&mut out, key.document_id());
    out.extend_from_slice(&[ESCAPE, PATH_END]);
    out
}

pub fn group_prefix(group: &str) -> Vec<u8> {
    let mut out = vec![TAG_GROUP];
    write_segment(&mut out, group);
    out
}

/// First group index key holding a batch id `>= batch_id`.
pub fn group_start(group: &str, batch_id: BatchId) -> Vec<u8> {
    let mut out = group_prefix(group);
    out.extend_from_slice(&encode_batch_id(batch_id));
    out
}

pub fn group_key(key: &DocumentKey, batch_id: BatchId) -> Vec<u8> {
    let mut out = group_start(key.collection_group(), batch_id);
    write_path(&mut out, key.path());
    out
}

pub fn batch_prefix(batch_id: BatchId) -> Vec<u8> {
    let mut out = vec![TAG_BATCH];
    out.extend_from_slice(&encode_batch_id(batch_id));
    out
}

pub fn batch_key(batch_id: BatchId, key: &DocumentKey) -> Vec<u8> {
    let mut out = batch_prefix(batch_id);
    write_path(&mut out, key.path());
    out
}

/// Value stored in the primary index.
pub fn encode_record(batch_id: BatchId, mutation: &Mutation) -> Vec<u8> {
    let mut out = vec![0u8; RECORD_HEADER];
    out[0] = RECORD_VERSION;
    LittleEndian::write_i32(&mut out[1..5], batch_id);
    LittleEndian::write_u32(&mut out[5..RECORD_HEADER], mutation.len() as u32);
    out.extend_from_slice(mutation.as_bytes());
    out
}

// -------------------- decoding --------------------

pub fn decode_batch_id(bytes: &[u8], table: &'static str) -> Result<BatchId> {
    let raw: [u8; BATCH_ID_BYTES] = bytes
        .try_into()
        .map_err(|_| OverlayError::corrupt(table, format!("batch id is {} bytes", bytes.len())))?;
    Ok((u32::from_be_bytes(raw) ^ 0x8000_0000) as i32)
}

pub fn decode_record(bytes: &[u8]) -> Result<(BatchId, Mutation)> {
    let mut rdr = bytes;
    let short = |_: std::io::Error| OverlayError::corrupt(PRIMARY_TABLE, "record shorter than its header");

    let version = rdr.read_u8().map_err(short)?;
    if version != RECORD_VERSION {
        return Err(OverlayError::corrupt(
            PRIMARY_TABLE,
            format!("unknown record version {}", version),
        ));
    }
    let batch_id = rdr.read_i32::<LittleEndian>().map_err(short)?;
    let len = rdr.read_u32::<LittleEndian>().map_err(short)? as usize;
    if len != rdr.len() {
        return Err(OverlayError::corrupt(
            PRIMARY_TABLE,
            format!("mutation length {} but {} bytes follow", len, rdr.len()),
        ));
    }
    Ok((batch_id, Mutation::new(rdr)))
}

/// Cursor over an encoded key.
struct KeyReader<'a> {
    rest: &'a [u8],
    table: &'static str,
}

impl<'a> KeyReader<'a> {
    fn new(key: &'a [u8], tag: u8, table: &'static str) -> Result<Self> {
        match key.split_first() {
            Some((&t, rest)) if t == tag => Ok(Self { rest, table }),
            _ => Err(OverlayError::corrupt(table, "missing table tag")),
        }
    }

    fn corrupt(&self, reason: &str) -> OverlayError {
        OverlayError::corrupt(self.table, reason)
    }

    fn segment(&mut self) -> Result<String> {
        let mut raw = Vec::new();
        loop {
            let current = self.rest;
            match current {
                [ESCAPE, SEGMENT_END, rest @ ..] => {
                    self.rest = rest;
                    break;
                }
                [ESCAPE, ESCAPED_NUL, rest @ ..] => {
                    raw.push(0);
                    self.rest = rest;
                }
                [ESCAPE, ..] => return Err(self.corrupt("bad escape inside segment")),
                [b, rest @ ..] => {
                    raw.push(*b);
                    self.rest = rest;
                }
                [] => return Err(self.corrupt("unterminated segment")),
            }
        }
        if raw.is_empty() {
            return Err(self.corrupt("empty segment"));
        }
        String::from_utf8(raw).map_err(|_| self.corrupt("segment is not UTF-8"))
    }

    fn path(&mut self) -> Result<ResourcePath> {
        let mut segments = Vec::new();
        loop {
            let current = self.rest;
            if let [ESCAPE, PATH_END, rest @ ..] = current {
                self.rest = rest;
                break;
            }
            segments.push(self.segment()?);
        }
        ResourcePath::from_segments(segments).map_err(|e| self.corrupt(&e.to_string()))
    }

    fn document_key(&mut self) -> Result<DocumentKey> {
        let path = self.path()?;
        DocumentKey::from_path(path).map_err(|e| self.corrupt(&e.to_string()))
    }

    fn batch_id(&mut self) -> Result<BatchId> {
        if self.rest.len() < BATCH_ID_BYTES {
            return Err(self.corrupt("truncated batch id"));
        }
        let (raw, rest) = self.rest.split_at(BATCH_ID_BYTES);
        self.rest = rest;
        decode_batch_id(raw, self.table)
    }

    fn finish(self) -> Result<()> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(self.corrupt("trailing bytes after key"))
        }
    }
}

pub fn decode_primary_key(key: &[u8]) -> Result<DocumentKey> {
    let mut rdr = KeyReader::new(key, TAG_PRIMARY, PRIMARY_TABLE)?;
    let doc = rdr.document_key()?;
    rdr.finish()?;
    Ok(doc)
}

pub fn decode_collection_key(key: &[u8]) -> Result<DocumentKey> {
    let mut rdr = KeyReader::new(key, TAG_COLLECTION, COLLECTION_TABLE)?;
    let collection = rdr.path()?;
    let doc_id = rdr.path()?;
    rdr.finish()?;

    let id = match doc_id.segments() {
        [id] => id.as_str(),
        _ => {
            return Err(OverlayError::corrupt(
                COLLECTION_TABLE,
                "document id must be one segment",
            ))
        }
    };
    let path = collection.append(id)?;
    DocumentKey::from_path(path)
        .map_err(|e| OverlayError::corrupt(COLLECTION_TABLE, e.to_string()))
}

/// Returns `(group, batch_id, document)`.
pub fn decode_group_key(key: &[u8]) -> Result<(String, BatchId, DocumentKey)> {
    let mut rdr = KeyReader::new(key, TAG_GROUP, GROUP_TABLE)?;
    let group = rdr.segment()?;
    let batch_id = rdr.batch_id()?;
    let doc = rdr.document_key()?;
    rdr.finish()?;
    Ok((group, batch_id, doc))
}

pub fn decode_batch_key(key: &[u8]) -> Result<(BatchId, DocumentKey)> {
    let mut rdr = KeyReader::new(key, TAG_BATCH, BATCH_TABLE)?;
    let batch_id = rdr.batch_id()?;
    let doc = rdr.document_key()?;
    rdr.finish()?;
    Ok((batch_id, doc))
}
