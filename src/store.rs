//! Durable key → posting-list store
//!
//! One redb database file holds every index managed by a registry. Since
//! redb wants static table names, each index gets a logical sub-map inside
//! a single physical table via key prefixing: `<sub-map name> 0x00 <key>`.
//! Sub-map names never contain the separator byte, so the prefix split is
//! unambiguous and each sub-map occupies one contiguous key range.
//!
//! # Commit discipline
//!
//! Mutations are buffered in a pending overlay and become durable only on
//! `commit()`. The store's own `get` sees pending mutations (the engine's
//! read-modify-write runs between commits); snapshots see only committed
//! state.

use std::collections::BTreeMap;
use std::sync::Arc;

use redb::{Database, ReadTransaction, ReadableTable, TableDefinition};

use crate::errors::{IndexError, IndexResult};
use crate::key::IndexKey;
use crate::posting::PostingList;

/// The single physical table holding all index sub-maps.
const DATA_TABLE: TableDefinition<'static, &[u8], &[u8]> = TableDefinition::new("keydex_data");

/// Separator byte between a sub-map name and the key proper.
const KEY_SEPARATOR: u8 = 0x00;

/// Encode a sub-map name and key into a physical key.
fn encode_entry_key(name: &str, key: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(name.len() + 1 + key.len());
    encoded.extend_from_slice(name.as_bytes());
    encoded.push(KEY_SEPARATOR);
    encoded.extend_from_slice(key);
    encoded
}

/// First physical key belonging to a sub-map.
fn submap_start_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(name.len() + 1);
    key.extend_from_slice(name.as_bytes());
    key.push(KEY_SEPARATOR);
    key
}

/// First physical key that does NOT belong to a sub-map.
fn submap_end_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(name.len() + 1);
    key.extend_from_slice(name.as_bytes());
    key.push(KEY_SEPARATOR + 1);
    key
}

/// The ordered key → posting-list map for one index.
///
/// Exactly one entry per distinct key; empty posting lists are never
/// stored. Durable only after `commit()`.
pub struct IndexStore {
    /// Shared database, owned by the registry
    db: Arc<Database>,
    /// Sub-map name, derived from the index identifier
    name: String,
    /// Pending mutations keyed by physical key; `None` marks a delete
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    /// Pending whole-sub-map clear, applied before `pending` on commit
    pending_clear: bool,
}

impl IndexStore {
    /// Creates a store over the sub-map for the given index identifier
    pub(crate) fn new(db: Arc<Database>, id: u64) -> Self {
        Self {
            db,
            name: format!("idx_{}", id),
            pending: BTreeMap::new(),
            pending_clear: false,
        }
    }

    /// Point lookup, reflecting pending mutations. No side effects.
    pub fn get(&self, key: &IndexKey) -> IndexResult<Option<PostingList>> {
        let ekey = encode_entry_key(&self.name, &key.encode());
        match self.pending.get(&ekey) {
            Some(Some(bytes)) => Ok(Some(PostingList::decode(bytes)?)),
            Some(None) => Ok(None),
            None if self.pending_clear => Ok(None),
            None => match self.read_committed(&ekey)? {
                Some(bytes) => Ok(Some(PostingList::decode(&bytes)?)),
                None => Ok(None),
            },
        }
    }

    /// Inserts or overwrites the entry for `key`.
    ///
    /// The caller guarantees `list` is non-empty.
    pub fn put(&mut self, key: &IndexKey, list: &PostingList) {
        debug_assert!(!list.is_empty(), "empty posting lists are never stored");
        let ekey = encode_entry_key(&self.name, &key.encode());
        self.pending.insert(ekey, Some(list.encode()));
    }

    /// Overwrites an existing entry. Same semantics as `put`; kept as a
    /// separate name for clarity of intent at call sites.
    pub fn replace(&mut self, key: &IndexKey, list: &PostingList) {
        self.put(key, list);
    }

    /// Deletes the entry for `key` entirely
    pub fn remove(&mut self, key: &IndexKey) {
        let ekey = encode_entry_key(&self.name, &key.encode());
        self.pending.insert(ekey, None);
    }

    /// Removes all entries in this index's sub-map
    pub fn clear(&mut self) {
        self.pending.clear();
        self.pending_clear = true;
    }

    /// Overwrite an entry addressed by its physical key (bulk sweep path)
    pub(crate) fn put_raw(&mut self, ekey: Vec<u8>, list: &PostingList) {
        debug_assert!(!list.is_empty(), "empty posting lists are never stored");
        self.pending.insert(ekey, Some(list.encode()));
    }

    /// Delete an entry addressed by its physical key (bulk sweep path)
    pub(crate) fn remove_raw(&mut self, ekey: Vec<u8>) {
        self.pending.insert(ekey, None);
    }

    /// Returns every entry of the current logical view: committed state
    /// overlaid with pending mutations. Keys are physical keys, usable
    /// with `put_raw`/`remove_raw`.
    pub(crate) fn entries(&self) -> IndexResult<Vec<(Vec<u8>, PostingList)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

        if !self.pending_clear {
            let rtx = self.db.begin_read()?;
            match rtx.open_table(DATA_TABLE) {
                Ok(table) => {
                    let start = submap_start_key(&self.name);
                    let end = submap_end_key(&self.name);
                    for row in table.range(start.as_slice()..end.as_slice())? {
                        let (k, v) = row?;
                        merged.insert(k.value().to_vec(), v.value().to_vec());
                    }
                }
                // No physical table yet means no data, which is not an error
                Err(redb::TableError::TableDoesNotExist(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        for (k, op) in &self.pending {
            match op {
                Some(v) => {
                    merged.insert(k.clone(), v.clone());
                }
                None => {
                    merged.remove(k);
                }
            }
        }

        merged
            .into_iter()
            .map(|(k, v)| Ok((k, PostingList::decode(&v)?)))
            .collect()
    }

    /// Makes all prior mutations durable. Returns once durable.
    ///
    /// A no-op when nothing is pending.
    pub fn commit(&mut self) -> IndexResult<()> {
        if !self.pending_clear && self.pending.is_empty() {
            return Ok(());
        }

        let wtx = self.db.begin_write()?;
        {
            let mut table = wtx.open_table(DATA_TABLE)?;

            if self.pending_clear {
                let start = submap_start_key(&self.name);
                let end = submap_end_key(&self.name);
                let stale: Vec<Vec<u8>> = table
                    .range(start.as_slice()..end.as_slice())?
                    .map(|row| row.map(|(k, _)| k.value().to_vec()))
                    .collect::<Result<_, _>>()?;
                for k in stale {
                    table.remove(k.as_slice())?;
                }
            }

            for (k, op) in &self.pending {
                match op {
                    Some(v) => {
                        table.insert(k.as_slice(), v.as_slice())?;
                    }
                    None => {
                        table.remove(k.as_slice())?;
                    }
                }
            }
        }
        wtx.commit()?;

        self.pending.clear();
        self.pending_clear = false;
        Ok(())
    }

    /// Returns an isolated view of the last committed state.
    ///
    /// The view does not observe writes committed after this call
    /// returns. Pending uncommitted mutations are not visible either;
    /// callers commit before opening readers.
    pub fn snapshot(&self) -> IndexResult<Snapshot> {
        let rtx = self.db.begin_read()?;
        Ok(Snapshot {
            rtx,
            name: self.name.clone(),
        })
    }

    /// Commits and releases the store
    pub fn close(mut self) -> IndexResult<()> {
        self.commit()
    }

    fn read_committed(&self, ekey: &[u8]) -> IndexResult<Option<Vec<u8>>> {
        let rtx = self.db.begin_read()?;
        match rtx.open_table(DATA_TABLE) {
            Ok(table) => match table.get(ekey)? {
                Some(guard) => Ok(Some(guard.value().to_vec())),
                None => Ok(None),
            },
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// An immutable point-in-time view of one index's committed contents.
///
/// Backed by a redb read transaction; concurrent commits do not change
/// what it observes.
pub struct Snapshot {
    rtx: ReadTransaction,
    name: String,
}

impl Snapshot {
    /// Point lookup within the frozen view
    pub(crate) fn get(&self, key: &IndexKey) -> IndexResult<Option<PostingList>> {
        let ekey = encode_entry_key(&self.name, &key.encode());
        match self.rtx.open_table(DATA_TABLE) {
            Ok(table) => match table.get(ekey.as_slice())? {
                Some(guard) => Ok(Some(PostingList::decode(guard.value())?)),
                None => Ok(None),
            },
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Releases the backing read transaction
    pub(crate) fn close(self) -> IndexResult<()> {
        self.rtx.close().map_err(IndexError::from)
    }
}
