//! Posting-list codec
//!
//! A posting list is the set of entity identifiers associated with one
//! key, held as a strictly increasing `Vec<u64>` and stored as a compact
//! fixed-width byte array.
//!
//! # Invariants
//!
//! - No duplicate identifiers
//! - Identifiers sorted ascending
//! - Empty lists are never stored (the key is deleted instead)

use crate::errors::{IndexError, IndexResult};

/// Entity identifier type
pub type EntityId = u64;

/// Width of one encoded entity id in bytes
const ID_WIDTH: usize = 8;

/// A sorted, duplicate-free list of entity identifiers for one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingList {
    ids: Vec<EntityId>,
}

impl PostingList {
    /// Creates an empty posting list
    pub fn new() -> Self {
        Self { ids: Vec::new() }
    }

    /// Creates a single-element posting list
    pub fn single(id: EntityId) -> Self {
        Self { ids: vec![id] }
    }

    /// Insert an identifier, maintaining sorted order.
    ///
    /// Returns `false` if the identifier was already present.
    pub fn insert(&mut self, id: EntityId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(_) => false,
            Err(pos) => {
                self.ids.insert(pos, id);
                true
            }
        }
    }

    /// Remove an identifier.
    ///
    /// Returns `false` if the identifier was absent.
    pub fn remove(&mut self, id: EntityId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(pos) => {
                self.ids.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Returns whether the identifier is present
    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Returns the number of identifiers
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the identifiers as a sorted slice
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    /// Consumes the list, returning the sorted identifiers
    pub fn into_ids(self) -> Vec<EntityId> {
        self.ids
    }

    /// Encode as a compact array of little-endian 8-byte identifiers
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.ids.len() * ID_WIDTH);
        for id in &self.ids {
            out.extend_from_slice(&id.to_le_bytes());
        }
        out
    }

    /// Decode from stored bytes.
    ///
    /// Rejects truncated input and out-of-order or duplicate identifiers;
    /// either means the stored value is corrupt.
    pub fn decode(bytes: &[u8]) -> IndexResult<Self> {
        if bytes.len() % ID_WIDTH != 0 {
            return Err(IndexError::Corrupt(format!(
                "posting list length {} is not a multiple of {}",
                bytes.len(),
                ID_WIDTH
            )));
        }
        let mut ids = Vec::with_capacity(bytes.len() / ID_WIDTH);
        for chunk in bytes.chunks_exact(ID_WIDTH) {
            let mut buf = [0u8; ID_WIDTH];
            buf.copy_from_slice(chunk);
            let id = EntityId::from_le_bytes(buf);
            if let Some(&last) = ids.last() {
                if id <= last {
                    return Err(IndexError::Corrupt(format!(
                        "posting list not strictly increasing: {} after {}",
                        id, last
                    )));
                }
            }
            ids.push(id);
        }
        Ok(Self { ids })
    }
}

impl<'a> IntoIterator for &'a PostingList {
    type Item = &'a EntityId;
    type IntoIter = std::slice::Iter<'a, EntityId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sorted_and_deduplicated() {
        let mut list = PostingList::new();
        assert!(list.insert(30));
        assert!(list.insert(10));
        assert!(list.insert(20));
        assert!(!list.insert(20));

        assert_eq!(list.ids(), &[10, 20, 30]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut list = PostingList::single(5);
        assert!(!list.remove(9));
        assert_eq!(list.ids(), &[5]);

        assert!(list.remove(5));
        assert!(list.is_empty());
    }

    #[test]
    fn test_codec() {
        let mut list = PostingList::new();
        list.insert(1);
        list.insert(u64::MAX);
        list.insert(1 << 40);

        let decoded = PostingList::decode(&list.encode()).unwrap();
        assert_eq!(decoded, list);
    }

    #[test]
    fn test_decode_rejects_truncated() {
        let err = PostingList::decode(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)));
    }

    #[test]
    fn test_decode_rejects_unsorted() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u64.to_le_bytes());
        bytes.extend_from_slice(&1u64.to_le_bytes());
        let err = PostingList::decode(&bytes).unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)));
    }
}
