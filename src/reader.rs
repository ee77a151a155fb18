//! Snapshot-isolated read path
//!
//! A reader holds a point-in-time view taken at construction. Lookups
//! never reflect mutations committed to the live store afterward, even
//! while the reader is held across a long-running query.

use crate::errors::IndexResult;
use crate::key::IndexKey;
use crate::posting::{EntityId, PostingList};
use crate::store::Snapshot;

/// An immutable reader over one index snapshot.
///
/// Dropping the reader releases the snapshot; `close` does the same but
/// surfaces backend errors instead of swallowing them.
pub struct SnapshotReader {
    snapshot: Snapshot,
}

impl SnapshotReader {
    pub(crate) fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// Returns the posting list for `value` in the snapshot, or an empty
    /// list if the value is absent.
    pub fn lookup(&self, value: &IndexKey) -> IndexResult<Vec<EntityId>> {
        Ok(self
            .snapshot
            .get(value)?
            .map(PostingList::into_ids)
            .unwrap_or_default())
    }

    /// Returns the number of entities indexed under `value` (0 if
    /// absent) without materializing the full list for the caller.
    pub fn count(&self, value: &IndexKey) -> IndexResult<usize> {
        Ok(self.snapshot.get(value)?.map_or(0, |list| list.len()))
    }

    /// Releases the snapshot's backing resource
    pub fn close(self) -> IndexResult<()> {
        self.snapshot.close()
    }
}
