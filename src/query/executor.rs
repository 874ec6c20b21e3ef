//! Runs compiled queries against a store state.

use rand::Rng;
use serde_json::Value as Json;
use tracing::debug;

use crate::error::Result;
use crate::query::compile::compile;
use crate::query::fetch_info::FetchInfo;
use crate::query::materialize::Materializer;
use crate::query::profile::{profile_timer, record_profile_timer, QueryProfileKind};
use crate::query::spec::CompiledSpec;
use crate::query::value::Value;
use crate::storage::{Collection, ResultSet, SourcePreference, Store, StoreState};

/// Query executor bound to one store and one view of its contents.
pub struct Executor<'a> {
    store: &'a Store,
    state: &'a StoreState,
}

impl<'a> Executor<'a> {
    /// Creates an executor reading `state` through `store`.
    pub fn new(store: &'a Store, state: &'a StoreState) -> Self {
        Self { store, state }
    }

    /// Evaluates `collection` and fetches the physical columns registered in
    /// `info`, preserving the collection's row order. Store errors are
    /// returned unchanged.
    pub fn execute(&self, collection: &Collection, info: &FetchInfo) -> Result<ResultSet> {
        let timer = profile_timer();
        let result = self
            .store
            .evaluate(self.state, collection, info.fetch_spec());
        record_profile_timer(QueryProfileKind::Execute, timer);
        let result = result?;
        debug!(
            rows = result.row_count(),
            columns = info.column_count(),
            "collection executed"
        );
        Ok(result)
    }

    /// Executes `collection` and materializes `spec` over the rows.
    pub fn execute_and_materialize<R: Rng>(
        &self,
        collection: &Collection,
        spec: &CompiledSpec,
        info: &FetchInfo,
        rng: &mut R,
    ) -> Result<Option<Value>> {
        let result = self.execute(collection, info)?;
        let timer = profile_timer();
        let value = Materializer::new(rng).materialize(spec, &result);
        record_profile_timer(QueryProfileKind::Materialize, timer);
        debug!(
            fetch = spec.type_name(),
            empty = value.is_none(),
            "result materialized"
        );
        Ok(value)
    }

    /// Compiles `fetch`, executes `collection` and materializes the result.
    ///
    /// An invalid fetch spec is rejected before the store is consulted.
    pub fn query<R: Rng>(
        &self,
        collection: &Collection,
        fetch: &Json,
        pref: &SourcePreference,
        rng: &mut R,
    ) -> Result<Option<Value>> {
        let mut info = FetchInfo::new(pref);
        let timer = profile_timer();
        let spec = compile(fetch, &mut info, pref);
        record_profile_timer(QueryProfileKind::Compile, timer);
        let spec = spec?;
        debug!(
            fetch = spec.type_name(),
            columns = info.column_count(),
            "fetch spec compiled"
        );
        self.execute_and_materialize(collection, &spec, &info, rng)
    }
}
