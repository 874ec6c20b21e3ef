//! In-memory tuple store driven by the query engine.
//!
//! The store keeps entries as bags of `(key, value, source)` attributes and
//! answers one question: given a collection and a physical fetch spec,
//! which rows come back. It does no indexing; every evaluation walks the
//! committed state it is handed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::trace;

use crate::error::Result;

/// Collection expressions.
pub mod collection;
/// Entries, attributes and store state.
pub mod entry;
/// Physical fetch specifications.
pub mod fetchspec;
/// Raw result rows.
pub mod resultset;
/// Source preference patterns.
pub mod sourcepref;

pub use collection::{Collection, Direction, OrderBy};
pub use entry::{Attribute, Entry, Scalar, StoreState};
pub use fetchspec::{FetchColumn, FetchKind, FetchSpec};
pub use resultset::{ResultCell, ResultRow, ResultSet};
pub use sourcepref::SourcePreference;

/// Shared handle to the committed store contents.
///
/// Readers clone the current `Arc<StoreState>`; a writer works on its own
/// copy and swaps it in on [`Store::publish`]. The writer slot admits one
/// uncommitted writer at a time.
pub struct Store {
    committed: RwLock<Arc<StoreState>>,
    writer: Mutex<()>,
    default_pref: SourcePreference,
    evaluations: AtomicU64,
}

impl Store {
    /// Creates an empty store whose collection filters see attributes
    /// through `default_pref`.
    pub fn new(default_pref: SourcePreference) -> Self {
        Self {
            committed: RwLock::new(Arc::new(StoreState::default())),
            writer: Mutex::new(()),
            default_pref,
            evaluations: AtomicU64::new(0),
        }
    }

    /// Latest committed state.
    pub fn snapshot(&self) -> Arc<StoreState> {
        self.committed.read().clone()
    }

    /// Replaces the committed state.
    pub fn publish(&self, state: Arc<StoreState>) {
        *self.committed.write() = state;
    }

    /// Blocks until the writer slot is free.
    pub fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock()
    }

    /// Takes the writer slot if nobody holds it.
    pub fn try_lock_writer(&self) -> Option<MutexGuard<'_, ()>> {
        self.writer.try_lock()
    }

    /// Preference used by collection filters.
    pub fn default_preference(&self) -> &SourcePreference {
        &self.default_pref
    }

    /// Number of evaluations served so far.
    pub fn evaluation_count(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Evaluates `collection` against `state` and fetches every column of
    /// `spec` for the matching entries, in collection order.
    pub fn evaluate(
        &self,
        state: &StoreState,
        collection: &Collection,
        spec: &FetchSpec,
    ) -> Result<ResultSet> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let ids = collection.evaluate(state, &self.default_pref)?;
        trace!(rows = ids.len(), columns = spec.len(), "collection evaluated");
        let rows = ids
            .into_iter()
            .filter_map(|id| state.entry(id).map(|entry| fetch_row(id, entry, spec)))
            .collect();
        Ok(ResultSet::new(rows))
    }
}

fn fetch_row(id: i32, entry: &Entry, spec: &FetchSpec) -> ResultRow {
    let cols = spec
        .columns()
        .iter()
        .map(|column| match (column.kind, column.key.as_deref()) {
            (FetchKind::Parent, key) => vec![ResultCell {
                key: key.unwrap_or("id").to_owned(),
                value: Scalar::Int(id),
                source: None,
            }],
            (FetchKind::Data, Some(key)) => cells(entry.best(key, &column.pref)),
            (FetchKind::Data, None) => cells(entry.best_all(&column.pref)),
        })
        .collect();
    ResultRow::new(cols)
}

fn cells(attrs: Vec<&Attribute>) -> Vec<ResultCell> {
    attrs
        .into_iter()
        .map(|attr| ResultCell {
            key: attr.key.clone(),
            value: attr.value.clone(),
            source: Some(attr.source.clone()),
        })
        .collect()
}
