//! keydex - an embedded secondary index engine
//!
//! Given an arbitrary comparable value (an indexed property), keydex
//! returns the set of entity identifiers currently associated with it.
//! It sits beside a primary record store and is kept in sync through an
//! external change feed of add/change/remove events; it never owns the
//! primary data, only a derived mapping.
//!
//! # Design Principles
//!
//! - Derived state: the index mirrors the primary store, never owns it
//! - Explicit durability: mutations survive a crash only after `commit`
//! - Idempotent updates: replaying the last in-flight batch is harmless
//! - Repeatable reads: readers hold a frozen point-in-time snapshot
//!
//! # Lifecycle
//!
//! An index moves `Populating -> Online` on a successful end-of-population
//! signal, or `Populating -> Failed` with a retained reason. Only online
//! indexes serve accessors.

pub mod engine;
pub mod errors;
pub mod key;
pub mod posting;
pub mod reader;
pub mod registry;
pub mod store;

pub use engine::{
    Accessor, IndexEngine, IndexId, IndexState, Populator, ReaderFactory, UpdateRecord, UpdateSink,
};
pub use errors::{IndexError, IndexResult};
pub use key::IndexKey;
pub use posting::{EntityId, PostingList};
pub use reader::SnapshotReader;
pub use registry::{EngineHandle, IndexRegistry, RegistryConfig};
pub use store::{IndexStore, Snapshot};
