//! Index registry: identifier → engine mapping
//!
//! The registry exclusively owns the set of engines and the shared
//! database file (one durable file per registry, one sub-map per index
//! identifier, opened once and closed once at shutdown).
//!
//! # Concurrency
//!
//! The map lives behind an `RwLock`, so concurrent lookups never observe
//! a partially-constructed engine while creation calls mutate it. Each
//! engine sits behind its own `Mutex`; the single-logical-writer
//! precondition still applies per index.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use log::info;
use redb::Database;

use crate::engine::{Accessor, IndexEngine, IndexId, IndexState};
use crate::errors::{IndexError, IndexResult};

/// Shared handle to one index engine
pub type EngineHandle = Arc<Mutex<IndexEngine>>;

/// Configuration for opening a registry database.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryConfig {
    /// Backend cache size in bytes. Backend default when unset.
    pub cache_size: Option<usize>,
}

impl RegistryConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend cache size
    #[must_use]
    pub const fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }
}

/// Owner of every index engine in one provider instance.
pub struct IndexRegistry {
    db: Arc<Database>,
    engines: RwLock<HashMap<IndexId, EngineHandle>>,
}

impl IndexRegistry {
    /// Opens or creates the registry database file at `path`
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        Self::open_with_config(path, RegistryConfig::default())
    }

    /// Opens or creates the registry database file with custom configuration
    pub fn open_with_config(path: impl AsRef<Path>, config: RegistryConfig) -> IndexResult<Self> {
        let mut builder = Database::builder();
        if let Some(cache_size) = config.cache_size {
            builder.set_cache_size(cache_size);
        }
        let db = builder.create(path.as_ref())?;
        Ok(Self::with_db(db))
    }

    /// Creates an in-memory registry, lost on drop. Intended for tests.
    pub fn in_memory() -> IndexResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())?;
        Ok(Self::with_db(db))
    }

    fn with_db(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            engines: RwLock::new(HashMap::new()),
        }
    }

    /// Allocates a fresh engine for `id` in state `Populating`, registers
    /// it, and returns it as the populator handle.
    ///
    /// Calling this twice for the same `id` silently replaces the prior
    /// registration (last writer wins).
    pub fn create_populator(&self, id: IndexId) -> EngineHandle {
        info!("registering populator for index {}", id);
        let handle = Arc::new(Mutex::new(IndexEngine::new(self.db.clone(), id)));
        self.engines.write().unwrap().insert(id, handle.clone());
        handle
    }

    /// Returns the engine for `id` once it is online.
    ///
    /// Fails with `NotOnline` for an unknown or still-populating index
    /// and with `PopulationFailed` for a failed one.
    pub fn get_online_accessor(&self, id: IndexId) -> IndexResult<EngineHandle> {
        let engines = self.engines.read().unwrap();
        let Some(handle) = engines.get(&id) else {
            return Err(IndexError::NotOnline(id));
        };
        let engine = handle.lock().unwrap();
        match engine.state() {
            IndexState::Online => {
                drop(engine);
                Ok(handle.clone())
            }
            IndexState::Failed => Err(IndexError::PopulationFailed {
                id,
                reason: engine
                    .population_failure()
                    .unwrap_or("population failed")
                    .to_string(),
            }),
            IndexState::Populating => Err(IndexError::NotOnline(id)),
        }
    }

    /// Returns the registered engine's state, or `Populating` when `id`
    /// is unknown: a never-seen index is treated as still populating so a
    /// restarted host redoes population instead of erroring.
    pub fn get_initial_state(&self, id: IndexId) -> IndexState {
        self.engines
            .read()
            .unwrap()
            .get(&id)
            .map_or(IndexState::Populating, |handle| {
                handle.lock().unwrap().state()
            })
    }

    /// Returns the retained population-failure reason for `id`, if the
    /// index is registered and has failed.
    pub fn population_failure(&self, id: IndexId) -> Option<String> {
        self.engines
            .read()
            .unwrap()
            .get(&id)
            .and_then(|handle| {
                handle
                    .lock()
                    .unwrap()
                    .population_failure()
                    .map(str::to_string)
            })
    }

    /// Commits every engine and releases the database
    pub fn shutdown(self) -> IndexResult<()> {
        info!("shutting down index registry");
        let engines = self.engines.write().unwrap();
        for handle in engines.values() {
            handle.lock().unwrap().close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Populator;

    #[test]
    fn test_unknown_index_is_populating() {
        let registry = IndexRegistry::in_memory().unwrap();
        assert_eq!(registry.get_initial_state(42), IndexState::Populating);
    }

    #[test]
    fn test_accessor_gated_on_online_state() {
        let registry = IndexRegistry::in_memory().unwrap();

        assert!(matches!(
            registry.get_online_accessor(1),
            Err(IndexError::NotOnline(1))
        ));

        let populator = registry.create_populator(1);
        assert!(matches!(
            registry.get_online_accessor(1),
            Err(IndexError::NotOnline(1))
        ));

        populator.lock().unwrap().close_population(true).unwrap();
        assert!(registry.get_online_accessor(1).is_ok());
        assert_eq!(registry.get_initial_state(1), IndexState::Online);
    }

    #[test]
    fn test_failed_index_reports_reason() {
        let registry = IndexRegistry::in_memory().unwrap();
        let populator = registry.create_populator(1);
        {
            let mut engine = populator.lock().unwrap();
            engine.mark_failed("feed disconnected");
        }

        match registry.get_online_accessor(1) {
            Err(IndexError::PopulationFailed { id, reason }) => {
                assert_eq!(id, 1);
                assert_eq!(reason, "feed disconnected");
            }
            other => panic!("expected PopulationFailed, got {:?}", other.map(|_| ())),
        }
        assert_eq!(
            registry.population_failure(1),
            Some("feed disconnected".to_string())
        );
    }

    #[test]
    fn test_create_populator_replaces_prior_registration() {
        let registry = IndexRegistry::in_memory().unwrap();

        let first = registry.create_populator(1);
        first.lock().unwrap().close_population(true).unwrap();
        assert_eq!(registry.get_initial_state(1), IndexState::Online);

        // Last writer wins; the fresh engine is populating again
        registry.create_populator(1);
        assert_eq!(registry.get_initial_state(1), IndexState::Populating);
    }
}
