//! Snapshot Isolation Tests
//!
//! Tests for the read-path invariants:
//! - A reader never reflects commits made after its snapshot was taken
//! - Fresh readers observe the latest committed state
//! - count matches the materialized posting list

use keydex::{Accessor, IndexKey, IndexRegistry, Populator, ReaderFactory, UpdateRecord, UpdateSink};

fn key(s: &str) -> IndexKey {
    IndexKey::from_text(s)
}

// =============================================================================
// Repeatable Reads
// =============================================================================

/// A reader opened before a commit must not see that commit, even after
/// the commit completes.
#[test]
fn test_reader_does_not_see_later_commit() {
    let registry = IndexRegistry::in_memory().unwrap();
    let handle = registry.create_populator(1);

    {
        let mut engine = handle.lock().unwrap();
        engine.add(1, &key("x")).unwrap();
        engine.close_population(true).unwrap();
    }

    let accessor = registry.get_online_accessor(1).unwrap();
    let reader = accessor.lock().unwrap().new_reader().unwrap();

    {
        let mut engine = accessor.lock().unwrap();
        engine
            .apply_update(&UpdateRecord::Added {
                entity_id: 2,
                value: key("x"),
            })
            .unwrap();
        engine.flush().unwrap();
    }

    // Old reader: frozen view
    assert_eq!(reader.lookup(&key("x")).unwrap(), vec![1]);
    assert_eq!(reader.count(&key("x")).unwrap(), 1);

    // Fresh reader: sees the committed add
    let fresh = accessor.lock().unwrap().new_reader().unwrap();
    assert_eq!(fresh.lookup(&key("x")).unwrap(), vec![1, 2]);

    reader.close().unwrap();
    fresh.close().unwrap();
}

/// Uncommitted mutations are invisible to every reader.
#[test]
fn test_reader_does_not_see_uncommitted_writes() {
    let registry = IndexRegistry::in_memory().unwrap();
    let handle = registry.create_populator(1);

    {
        let mut engine = handle.lock().unwrap();
        engine.add(1, &key("x")).unwrap();
        engine.close_population(true).unwrap();
    }

    let accessor = registry.get_online_accessor(1).unwrap();
    {
        let mut engine = accessor.lock().unwrap();
        engine
            .apply_update(&UpdateRecord::Added {
                entity_id: 2,
                value: key("x"),
            })
            .unwrap();
        // No flush: the add stays buffered
        let reader = engine.new_reader().unwrap();
        assert_eq!(reader.lookup(&key("x")).unwrap(), vec![1]);
        reader.close().unwrap();
    }
}

/// A reader held across several commits keeps its original view.
#[test]
fn test_reader_held_across_many_commits() {
    let registry = IndexRegistry::in_memory().unwrap();
    let handle = registry.create_populator(1);
    handle.lock().unwrap().close_population(true).unwrap();

    let accessor = registry.get_online_accessor(1).unwrap();
    let empty_reader = accessor.lock().unwrap().new_reader().unwrap();

    for entity_id in 0..10 {
        let mut engine = accessor.lock().unwrap();
        engine
            .apply_update(&UpdateRecord::Added {
                entity_id,
                value: key("hot"),
            })
            .unwrap();
        engine.flush().unwrap();
    }

    assert_eq!(empty_reader.count(&key("hot")).unwrap(), 0);
    assert!(empty_reader.lookup(&key("hot")).unwrap().is_empty());

    let fresh = accessor.lock().unwrap().new_reader().unwrap();
    assert_eq!(fresh.count(&key("hot")).unwrap(), 10);
}

// =============================================================================
// Lookup Semantics
// =============================================================================

/// Absent values yield an empty list and a zero count.
#[test]
fn test_lookup_absent_value() {
    let registry = IndexRegistry::in_memory().unwrap();
    let handle = registry.create_populator(1);
    handle.lock().unwrap().close_population(true).unwrap();

    let reader = handle.lock().unwrap().new_reader().unwrap();
    assert!(reader.lookup(&key("nothing")).unwrap().is_empty());
    assert_eq!(reader.count(&key("nothing")).unwrap(), 0);
}

/// count agrees with the materialized lookup for every key type.
#[test]
fn test_count_matches_lookup() {
    let registry = IndexRegistry::in_memory().unwrap();
    let handle = registry.create_populator(1);

    let values = [
        IndexKey::from_bool(true),
        IndexKey::from_int(-3),
        IndexKey::from_float(2.5),
        IndexKey::from_text("v"),
        IndexKey::composite(vec![IndexKey::from_int(1), IndexKey::from_text("a")]),
    ];

    {
        let mut engine = handle.lock().unwrap();
        for (i, value) in values.iter().enumerate() {
            for entity_id in 0..=i as u64 {
                engine.add(entity_id, value).unwrap();
            }
        }
        engine.close_population(true).unwrap();
    }

    let reader = handle.lock().unwrap().new_reader().unwrap();
    for (i, value) in values.iter().enumerate() {
        assert_eq!(reader.count(value).unwrap(), i + 1);
        assert_eq!(reader.lookup(value).unwrap().len(), i + 1);
    }
}
