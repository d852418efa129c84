//! Document paths, mutations and overlays.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{OverlayError, Result};

/// Write batch identifier. Assigned monotonically by the mutation queue.
pub type BatchId = i32;

/// "Since" value that matches every stored batch.
pub const UNKNOWN_BATCH_ID: BatchId = -1;

/// Overlays keyed by document, in document order.
pub type OverlayMap = BTreeMap<DocumentKey, Overlay>;

/// Mutations keyed by document, as handed to
/// [`save_overlays`](crate::OverlayStore::save_overlays).
pub type MutationMap = BTreeMap<DocumentKey, Mutation>;

/// A slash-separated path of non-empty segments, e.g. `rooms/r1/messages`.
///
/// Ordering is segment by segment, so a path sorts directly before every path
/// it is a prefix of.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    /// The empty (root) path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses `"a/b/c"`. Empty segments (`"a//b"`, a leading or trailing
    /// slash, or the empty string) are rejected.
    pub fn parse(path: &str) -> Result<Self> {
        Self::from_segments(path.split('/'))
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.iter().any(String::is_empty) {
            return Err(OverlayError::InvalidPath {
                path: segments.join("/"),
                reason: "empty path segment",
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns a new path with `segment` appended.
    pub fn append(&self, segment: &str) -> Result<Self> {
        if segment.is_empty() {
            return Err(OverlayError::InvalidPath {
                path: format!("{}/", self),
                reason: "empty path segment",
            });
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_owned());
        Ok(Self { segments })
    }

    /// Returns the parent path. The root stays the root.
    pub fn pop_last(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// `true` if every segment of `self` leads `other`. A path is a prefix of
    /// itself.
    pub fn is_prefix_of(&self, other: &ResourcePath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Even and non-empty: `collection/doc[/collection/doc...]`.
    pub fn is_document_path(&self) -> bool {
        !self.segments.is_empty() && self.segments.len() % 2 == 0
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for ResourcePath {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Path of a single document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentKey {
    path: ResourcePath,
}

impl DocumentKey {
    pub fn from_path(path: ResourcePath) -> Result<Self> {
        if !path.is_document_path() {
            return Err(OverlayError::InvalidPath {
                path: path.to_string(),
                reason: "document paths need an even, non-zero number of segments",
            });
        }
        Ok(Self { path })
    }

    pub fn parse(path: &str) -> Result<Self> {
        Self::from_path(ResourcePath::parse(path)?)
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// The collection the document lives in.
    pub fn collection_path(&self) -> ResourcePath {
        self.path.pop_last()
    }

    /// The collection id shared by every collection this document's
    /// collection is grouped with: `posts` for both `posts/p1` and
    /// `users/u1/posts/p2`.
    pub fn collection_group(&self) -> &str {
        let segments = self.path.segments();
        &segments[segments.len() - 2]
    }

    pub fn document_id(&self) -> &str {
        let segments = self.path.segments();
        &segments[segments.len() - 1]
    }

    /// `true` if this document sits directly in `collection`.
    pub fn has_collection(&self, collection: &ResourcePath) -> bool {
        self.path.len() == collection.len() + 1 && collection.is_prefix_of(&self.path)
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.path.fmt(f)
    }
}

impl FromStr for DocumentKey {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Opaque, already-serialized mutation payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Mutation(Vec<u8>);

impl Mutation {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Mutation {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Mutation {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

/// The net pending local mutation for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    pub key: DocumentKey,
    pub mutation: Mutation,
    /// The batch that most recently created or replaced this overlay.
    pub largest_batch_id: BatchId,
}

impl Overlay {
    pub fn new(key: DocumentKey, mutation: Mutation, largest_batch_id: BatchId) -> Self {
        Self {
            key,
            mutation,
            largest_batch_id,
        }
    }
}
