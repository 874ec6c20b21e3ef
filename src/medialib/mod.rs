//! Session façade over the store and the query engine.
//!
//! [`Medialib`] owns the store, the parsed configuration and the default
//! source preference. All mutation happens inside a [`Session`]; reads may
//! go through a session or through [`Medialib::query`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value as Json;
use tracing::debug;

use crate::error::{MedialibError, Result};
use crate::query::{Executor, Value};
use crate::storage::{Collection, SourcePreference, Store};

/// Library configuration.
pub mod config;
/// Sessions and their lifecycle.
pub mod session;

pub use config::MedialibConfig;
pub use session::{Session, SessionMode, SessionState};

/// An open media library.
pub struct Medialib {
    store: Store,
    config: MedialibConfig,
    pref: SourcePreference,
    next_session: AtomicU64,
}

impl Medialib {
    /// Opens an empty library with the given configuration.
    pub fn open(config: MedialibConfig) -> Result<Self> {
        config.validate()?;
        let pref = config.source_preference()?;
        debug!(
            sources = pref.patterns().len(),
            seeded = config.random_seed.is_some(),
            "Medialib opened"
        );
        Ok(Self {
            store: Store::new(pref.clone()),
            config,
            pref,
            next_session: AtomicU64::new(1),
        })
    }

    /// Starts a read session over the latest committed state.
    pub fn begin(&self) -> Session<'_> {
        Session::new(self, self.session_id(), SessionMode::Read, None)
    }

    /// Starts a write session, waiting for any other writer to finish.
    pub fn begin_write(&self) -> Session<'_> {
        let guard = self.store.lock_writer();
        Session::new(self, self.session_id(), SessionMode::Write, Some(guard))
    }

    /// Starts a write session unless another writer is still uncommitted.
    pub fn try_begin_write(&self) -> Result<Session<'_>> {
        let guard = self
            .store
            .try_lock_writer()
            .ok_or(MedialibError::SessionState("another write session is active"))?;
        Ok(Session::new(
            self,
            self.session_id(),
            SessionMode::Write,
            Some(guard),
        ))
    }

    /// Runs a fetch spec as an isolated read of the committed state.
    pub fn query(&self, collection: &Collection, fetch: &Json) -> Result<Option<Value>> {
        let snapshot = self.store.snapshot();
        let mut rng = self.config.rng();
        Executor::new(&self.store, &snapshot).query(collection, fetch, &self.pref, &mut rng)
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &MedialibConfig {
        &self.config
    }

    /// Returns the default source preference.
    pub fn source_preference(&self) -> &SourcePreference {
        &self.pref
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    fn session_id(&self) -> u64 {
        self.next_session.fetch_add(1, Ordering::Relaxed)
    }
}
