//! Index engine: lifecycle state machine and update protocol
//!
//! One engine per index identifier. The engine owns its store, moves
//! through `Populating → Online | Failed`, and applies the add/remove/
//! update protocol idempotently so a crash-recovery replay of the most
//! recent update batch leaves the store unchanged.
//!
//! # Capabilities
//!
//! The host sees the engine through four capability-scoped traits rather
//! than one object playing every role:
//!
//! - [`Populator`] — bulk population and the end-of-population signal
//! - [`UpdateSink`] — change-feed application and entity-deletion sweeps
//! - [`ReaderFactory`] — snapshot-isolated reader creation
//! - [`Accessor`] — the online read/update surface (flush/close plus the
//!   update and reader capabilities)
//!
//! # Preconditions
//!
//! All mutations for one index arrive from a single logical writer at a
//! time; population is single-threaded until the online transition. The
//! read-modify-write on a posting list is not defended against a second
//! concurrent writer.

use std::sync::Arc;

use log::{debug, info, warn};
use redb::Database;
use serde::{Deserialize, Serialize};

use crate::errors::{IndexError, IndexResult};
use crate::key::IndexKey;
use crate::posting::{EntityId, PostingList};
use crate::reader::SnapshotReader;
use crate::store::IndexStore;

/// Index identifier type
pub type IndexId = u64;

/// Lifecycle state of an index engine.
///
/// `Online` is terminal for the engine's functional lifetime; there is
/// no transition back to `Populating` or out of `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexState {
    /// Bulk initial build in progress; not queryable
    Populating,
    /// Serving reads
    Online,
    /// Population aborted; reason retained on the engine
    Failed,
}

/// A single change notification from the external feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateRecord {
    /// An entity gained an indexed value
    Added {
        /// Entity whose value changed
        entity_id: EntityId,
        /// The new indexed value
        value: IndexKey,
    },
    /// An entity's indexed value changed
    Changed {
        /// Entity whose value changed
        entity_id: EntityId,
        /// The previously indexed value
        value_before: IndexKey,
        /// The new indexed value
        value_after: IndexKey,
    },
    /// An entity lost its indexed value
    Removed {
        /// Entity whose value changed
        entity_id: EntityId,
        /// The previously indexed value
        value: IndexKey,
    },
}

/// Wire tags for change-feed mode bytes.
const MODE_ADDED: u8 = 0;
const MODE_CHANGED: u8 = 1;
const MODE_REMOVED: u8 = 2;

impl UpdateRecord {
    /// Builds a record from raw change-feed parts.
    ///
    /// Fails with `UnsupportedUpdateMode` for an unknown mode tag and
    /// `MalformedUpdate` when the mode's required value is missing; both
    /// are contract violations in the feed producer.
    pub fn from_parts(
        mode: u8,
        entity_id: EntityId,
        value_before: Option<IndexKey>,
        value_after: Option<IndexKey>,
    ) -> IndexResult<Self> {
        match mode {
            MODE_ADDED => {
                let value = value_after
                    .ok_or_else(|| IndexError::MalformedUpdate("add without value_after".into()))?;
                Ok(UpdateRecord::Added { entity_id, value })
            }
            MODE_CHANGED => {
                let value_before = value_before.ok_or_else(|| {
                    IndexError::MalformedUpdate("change without value_before".into())
                })?;
                let value_after = value_after.ok_or_else(|| {
                    IndexError::MalformedUpdate("change without value_after".into())
                })?;
                Ok(UpdateRecord::Changed {
                    entity_id,
                    value_before,
                    value_after,
                })
            }
            MODE_REMOVED => {
                let value = value_before.ok_or_else(|| {
                    IndexError::MalformedUpdate("remove without value_before".into())
                })?;
                Ok(UpdateRecord::Removed { entity_id, value })
            }
            other => Err(IndexError::UnsupportedUpdateMode(other)),
        }
    }
}

/// Population capability: bulk build of a new index.
pub trait Populator {
    /// Clears any prior contents and commits, starting population from
    /// an empty sub-map.
    fn create(&mut self) -> IndexResult<()>;

    /// Bulk-population entry point; idempotent per (entity, value) pair.
    fn add(&mut self, entity_id: EntityId, value: &IndexKey) -> IndexResult<()>;

    /// Ends population. `succeeded = true` commits and brings the index
    /// online; `false` records a population failure.
    fn close_population(&mut self, succeeded: bool) -> IndexResult<()>;
}

/// Update-application capability: keeping an index in sync with the feed.
pub trait UpdateSink {
    /// Applies one change record. Idempotent: re-applying the same
    /// record leaves the store in the same state as applying it once.
    fn apply_update(&mut self, update: &UpdateRecord) -> IndexResult<()>;

    /// Removes the given entities from every posting list they appear
    /// in (entity-deletion cascade). Sweeps the whole index once.
    fn bulk_remove(&mut self, entity_ids: &[EntityId]) -> IndexResult<()>;
}

/// Snapshot-creation capability.
pub trait ReaderFactory {
    /// Opens a reader over the current committed contents. The reader
    /// honors repeatable reads.
    fn new_reader(&self) -> IndexResult<SnapshotReader>;
}

/// Online access capability: the read/update surface of an online index.
pub trait Accessor: UpdateSink + ReaderFactory {
    /// Forces a commit without closing
    fn flush(&mut self) -> IndexResult<()>;

    /// Commits, making the engine's last state durable. The engine entry
    /// persists in the registry for the process lifetime.
    fn close(&mut self) -> IndexResult<()>;
}

/// The engine behind one index identifier.
pub struct IndexEngine {
    id: IndexId,
    store: IndexStore,
    state: IndexState,
    failure: Option<String>,
}

impl IndexEngine {
    pub(crate) fn new(db: Arc<Database>, id: IndexId) -> Self {
        Self {
            id,
            store: IndexStore::new(db, id),
            state: IndexState::Populating,
            failure: None,
        }
    }

    /// Returns the index identifier
    pub fn id(&self) -> IndexId {
        self.id
    }

    /// Returns the current lifecycle state
    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Transitions to `Online`
    pub fn mark_online(&mut self) {
        info!("index {} is online", self.id);
        self.state = IndexState::Online;
    }

    /// Transitions to `Failed`, retaining `reason` for later queries
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("index {} population failed: {}", self.id, reason);
        self.state = IndexState::Failed;
        self.failure = Some(reason);
    }

    /// Returns the retained population-failure reason, if any
    pub fn population_failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Clears the store's contents and commits. The engine entry
    /// persists; only the indexed data is dropped.
    pub fn drop_contents(&mut self) -> IndexResult<()> {
        debug!("index {}: dropping contents", self.id);
        self.store.clear();
        self.store.commit()
    }

    /// Removes `entity_id` from the list for `value`.
    ///
    /// Absent key or absent id is a no-op (idempotent remove). The sole
    /// member's removal deletes the key entirely.
    fn remove_value(&mut self, entity_id: EntityId, value: &IndexKey) -> IndexResult<()> {
        let Some(mut list) = self.store.get(value)? else {
            return Ok(());
        };
        if !list.remove(entity_id) {
            return Ok(());
        }
        if list.is_empty() {
            self.store.remove(value);
        } else {
            self.store.replace(value, &list);
        }
        Ok(())
    }
}

impl Populator for IndexEngine {
    fn create(&mut self) -> IndexResult<()> {
        debug!("index {}: creating empty sub-map", self.id);
        self.store.clear();
        self.store.commit()
    }

    fn add(&mut self, entity_id: EntityId, value: &IndexKey) -> IndexResult<()> {
        // Linear in the posting-list length. Posting lists for one value
        // are expected to stay small relative to total entity count.
        match self.store.get(value)? {
            None => {
                self.store.put(value, &PostingList::single(entity_id));
            }
            Some(mut list) => {
                if list.insert(entity_id) {
                    self.store.replace(value, &list);
                }
                // Duplicate add is silently absorbed
            }
        }
        Ok(())
    }

    fn close_population(&mut self, succeeded: bool) -> IndexResult<()> {
        self.store.commit()?;
        if succeeded {
            self.mark_online();
        } else if self.state == IndexState::Populating {
            self.mark_failed("population aborted by host");
        }
        Ok(())
    }
}

impl UpdateSink for IndexEngine {
    fn apply_update(&mut self, update: &UpdateRecord) -> IndexResult<()> {
        match update {
            UpdateRecord::Added { entity_id, value } => self.add(*entity_id, value),
            UpdateRecord::Changed {
                entity_id,
                value_before,
                value_after,
            } => {
                self.remove_value(*entity_id, value_before)?;
                self.add(*entity_id, value_after)
            }
            UpdateRecord::Removed { entity_id, value } => self.remove_value(*entity_id, value),
        }
    }

    fn bulk_remove(&mut self, entity_ids: &[EntityId]) -> IndexResult<()> {
        // Visits every entry once: O(index size x |entity_ids|). The one
        // non-scalable operation in the design; a per-entity reverse
        // index would replace it if deletion cascades grow hot.
        for (ekey, mut list) in self.store.entries()? {
            let mut changed = false;
            for &entity_id in entity_ids {
                changed |= list.remove(entity_id);
            }
            if !changed {
                continue;
            }
            if list.is_empty() {
                self.store.remove_raw(ekey);
            } else {
                self.store.put_raw(ekey, &list);
            }
        }
        Ok(())
    }
}

impl ReaderFactory for IndexEngine {
    fn new_reader(&self) -> IndexResult<SnapshotReader> {
        Ok(SnapshotReader::new(self.store.snapshot()?))
    }
}

impl Accessor for IndexEngine {
    fn flush(&mut self) -> IndexResult<()> {
        self.store.commit()
    }

    fn close(&mut self) -> IndexResult<()> {
        self.store.commit()
    }
}
