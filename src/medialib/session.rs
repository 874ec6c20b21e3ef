use std::sync::Arc;

use parking_lot::MutexGuard;
use serde_json::{json, Value as Json};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::Medialib;
use crate::error::{MedialibError, Result};
use crate::query::{Executor, Value};
use crate::storage::{Collection, Scalar, StoreState};

/// Attributes that survive [`Session::entry_cleanup`]. `status` is kept
/// but reset to 0.
const CLEANUP_KEEP: &[&str] = &["url", "added", "status"];

/// Whether a session may modify the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Sees a snapshot; every mutation is rejected.
    Read,
    /// Holds the writer slot until commit or abort.
    Write,
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing done yet.
    Open,
    /// At least one operation has run.
    Active,
    /// Changes were published.
    Committed,
    /// Changes were discarded.
    Aborted,
}

/// A unit of work against the media library.
///
/// # Lifecycle
///
/// 1. Create with [`Medialib::begin`] or [`Medialib::begin_write`]
/// 2. Query, read and modify entries
/// 3. Either [`Session::commit`] to publish or [`Session::abort`] to discard
///
/// Dropping a session that was neither committed nor aborted aborts it.
///
/// ```rust
/// use medialib::{Medialib, MedialibConfig};
///
/// let lib = Medialib::open(MedialibConfig::default())?;
/// let mut session = lib.begin_write();
/// let id = session.entry_new("file:///music/track.flac")?;
/// session.property_set_int(id, "tracknr", 3, "plugin/id3v2")?;
/// session.commit()?;
/// # Ok::<(), medialib::MedialibError>(())
/// ```
pub struct Session<'m> {
    lib: &'m Medialib,
    id: u64,
    mode: SessionMode,
    state: SessionState,
    working: Arc<StoreState>,
    _writer: Option<MutexGuard<'m, ()>>,
}

impl<'m> Session<'m> {
    pub(super) fn new(
        lib: &'m Medialib,
        id: u64,
        mode: SessionMode,
        writer: Option<MutexGuard<'m, ()>>,
    ) -> Self {
        let working = lib.store.snapshot();
        debug!(
            session_id = id,
            mode = ?mode,
            entries = working.len(),
            "Session started"
        );
        Self {
            lib,
            id,
            mode,
            state: SessionState::Open,
            working,
            _writer: writer,
        }
    }

    /// Returns the session identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the session's mode.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Returns the current state of the session.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs a fetch spec against the session's view of the library,
    /// including its own uncommitted writes.
    pub fn query(&mut self, collection: &Collection, fetch: &Json) -> Result<Option<Value>> {
        self.touch()?;
        let mut rng = self.lib.config.rng();
        Executor::new(&self.lib.store, &self.working).query(
            collection,
            fetch,
            &self.lib.pref,
            &mut rng,
        )
    }

    /// Creates an entry for `url` and returns its id.
    ///
    /// The entry starts with `url`, `added` (unix seconds) and `status = 0`,
    /// all written under the configured default source.
    pub fn entry_new(&mut self, url: &str) -> Result<i32> {
        if url.is_empty() {
            return Err(MedialibError::invalid("url must not be empty"));
        }
        let source = self.lib.config.default_source.clone();
        let added = unix_now();
        let state = self.writable()?;
        let id = state.create_entry()?;
        state.set_attribute(id, "url", Scalar::from(url), &source)?;
        state.set_attribute(id, "added", Scalar::Int(added), &source)?;
        state.set_attribute(id, "status", Scalar::Int(0), &source)?;
        debug!(session_id = self.id, entry_id = id, "Entry created");
        Ok(id)
    }

    /// Finds the entry whose `url` equals `url`.
    pub fn entry_lookup(&mut self, url: &str) -> Result<Option<i32>> {
        self.touch()?;
        let ids = Collection::equals("url", url)
            .evaluate(&self.working, self.lib.store.default_preference())?;
        Ok(ids.first().copied())
    }

    /// Returns whether entry `id` exists in this session's view.
    pub fn entry_exists(&mut self, id: i32) -> Result<bool> {
        self.touch()?;
        Ok(self.working.contains(id))
    }

    /// Removes entry `id` with all its attributes.
    pub fn entry_remove(&mut self, id: i32) -> Result<()> {
        self.writable()?.remove_entry(id)?;
        debug!(session_id = self.id, entry_id = id, "Entry removed");
        Ok(())
    }

    /// Drops every attribute except `url`, `added` and `status`, then resets
    /// `status` to 0 so the entry is rescanned.
    pub fn entry_cleanup(&mut self, id: i32) -> Result<()> {
        let source = self.lib.config.default_source.clone();
        let state = self.writable()?;
        state.retain_attributes(id, |attr| {
            CLEANUP_KEEP.contains(&attr.key.as_str()) && (attr.key != "status" || attr.source == source)
        })?;
        state.set_attribute(id, "status", Scalar::Int(0), &source)?;
        Ok(())
    }

    /// Sets a string property on entry `id` from `source`.
    pub fn property_set_str(&mut self, id: i32, key: &str, value: &str, source: &str) -> Result<()> {
        self.writable()?
            .set_attribute(id, key, Scalar::from(value), source)
    }

    /// Sets an integer property on entry `id` from `source`.
    pub fn property_set_int(&mut self, id: i32, key: &str, value: i32, source: &str) -> Result<()> {
        self.writable()?
            .set_attribute(id, key, Scalar::Int(value), source)
    }

    /// Removes the property `key` that `source` set on entry `id`.
    /// Returns whether it existed.
    pub fn property_remove(&mut self, id: i32, key: &str, source: &str) -> Result<bool> {
        self.writable()?.remove_attribute(id, key, source)
    }

    /// Best-preference string value of `key` on entry `id`.
    pub fn property_get_str(&mut self, id: i32, key: &str) -> Result<Option<String>> {
        Ok(self
            .property(id, key)?
            .and_then(|value| value.as_str().map(str::to_owned)))
    }

    /// Best-preference integer value of `key` on entry `id`.
    pub fn property_get_int(&mut self, id: i32, key: &str) -> Result<Option<i32>> {
        Ok(self.property(id, key)?.and_then(|value| value.as_int()))
    }

    /// Every attribute of entry `id` as `key -> source -> value`, from every
    /// source regardless of the configured preference.
    pub fn entry_info(&mut self, id: i32) -> Result<Value> {
        if !self.entry_exists(id)? {
            return Err(MedialibError::NoSuchEntry(id));
        }
        let fetch = json!({
            "type": "metadata",
            "get": ["field", "source", "value"],
            "source-preference": ["*"]
        });
        let info = self.query(&Collection::ids([id]), &fetch)?;
        Ok(info.unwrap_or_else(|| Value::Dict(Default::default())))
    }

    /// Publishes the session's writes and ends it.
    pub fn commit(mut self) -> Result<()> {
        self.touch()?;
        if self.mode == SessionMode::Write {
            self.lib.store.publish(Arc::clone(&self.working));
        }
        self.state = SessionState::Committed;
        info!(
            session_id = self.id,
            entries = self.working.len(),
            "Session committed"
        );
        Ok(())
    }

    /// Discards the session's writes and ends it.
    pub fn abort(mut self) -> Result<()> {
        self.touch()?;
        self.state = SessionState::Aborted;
        warn!(session_id = self.id, "Session aborted");
        Ok(())
    }

    fn property(&mut self, id: i32, key: &str) -> Result<Option<Scalar>> {
        self.touch()?;
        let entry = self
            .working
            .entry(id)
            .ok_or(MedialibError::NoSuchEntry(id))?;
        Ok(entry
            .best(key, &self.lib.pref)
            .first()
            .map(|attr| attr.value.clone()))
    }

    fn touch(&mut self) -> Result<()> {
        match self.state {
            SessionState::Open => {
                self.state = SessionState::Active;
                Ok(())
            }
            SessionState::Active => Ok(()),
            SessionState::Committed | SessionState::Aborted => {
                Err(MedialibError::SessionState("session is no longer active"))
            }
        }
    }

    fn writable(&mut self) -> Result<&mut StoreState> {
        if self.mode != SessionMode::Write {
            return Err(MedialibError::SessionState(
                "read session cannot modify the library",
            ));
        }
        self.touch()?;
        Ok(Arc::make_mut(&mut self.working))
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if matches!(self.state, SessionState::Open | SessionState::Active) {
            self.state = SessionState::Aborted;
            if self.mode == SessionMode::Write {
                warn!(session_id = self.id, "Session dropped without commit");
            }
        }
    }
}

fn unix_now() -> i32 {
    let secs = OffsetDateTime::now_utc().unix_timestamp();
    i32::try_from(secs).unwrap_or(i32::MAX)
}
