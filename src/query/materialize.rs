//! Turns raw result rows into the nested value tree a fetch spec asks for.
//!
//! Metadata leaves are built in two passes: rows are first folded into a
//! scratch tree of dicts whose leaves are [`Accumulator`]s, then the scratch
//! tree is finalized bottom-up into plain values. Clusters partition the
//! rows and recurse; organize nodes recurse over the same rows per key.

use rand::Rng;
use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::query::aggregate::Accumulator;
use crate::query::fetch_info::ID_COLUMN;
use crate::query::spec::{Aggregate, ClusterBy, ClusterSpec, CompiledSpec, GetField, MetadataSpec};
use crate::query::value::{Dict, Value};
use crate::storage::{ResultCell, ResultRow, ResultSet, Scalar};

/// Source reported for cells that carry none.
const DEFAULT_SOURCE: &str = "server";

/// Field name reported for the identifier column.
const ID_FIELD: &str = "id";

/// Materializes compiled specs over result sets.
///
/// The random number generator drives the `random` aggregate only.
pub struct Materializer<'r, R: Rng> {
    rng: &'r mut R,
}

impl<'r, R: Rng> Materializer<'r, R> {
    /// Creates a materializer drawing randomness from `rng`.
    pub fn new(rng: &'r mut R) -> Self {
        Self { rng }
    }

    /// Materializes `spec` over every row of `result`.
    ///
    /// Returns `None` when the spec produced nothing (e.g. no row carried
    /// the requested fields).
    pub fn materialize(&mut self, spec: &CompiledSpec, result: &ResultSet) -> Option<Value> {
        let rows: Vec<&ResultRow> = result.rows().iter().collect();
        self.node(spec, &rows)
    }

    fn node(&mut self, spec: &CompiledSpec, rows: &[&ResultRow]) -> Option<Value> {
        match spec {
            CompiledSpec::Count => Some(Value::Int(
                i32::try_from(rows.len()).unwrap_or(i32::MAX),
            )),
            CompiledSpec::Metadata(meta) => self.metadata(meta, rows),
            CompiledSpec::ClusterList(cluster) => {
                let items = cluster_rows(cluster, rows)
                    .into_iter()
                    .filter_map(|(_, members)| self.node(&cluster.data, &members))
                    .collect();
                Some(Value::List(items))
            }
            CompiledSpec::ClusterDict(cluster) => {
                let mut out = Dict::new();
                for (key, members) in cluster_rows(cluster, rows) {
                    if let Some(value) = self.node(&cluster.data, &members) {
                        out.insert(key, value);
                    }
                }
                (!out.is_empty()).then_some(Value::Dict(out))
            }
            CompiledSpec::Organize(org) => {
                let mut out = Dict::new();
                for (key, child) in &org.entries {
                    if let Some(value) = self.node(child, rows) {
                        out.insert(key.clone(), value);
                    }
                }
                Some(Value::Dict(out))
            }
        }
    }

    fn metadata(&mut self, meta: &MetadataSpec, rows: &[&ResultRow]) -> Option<Value> {
        let mut root = if meta.get.len() == 1 {
            Root::Flat(None)
        } else {
            Root::Nested(Dict::new())
        };
        let id_only = meta.get.as_slice() == [GetField::Id];
        for row in rows {
            let Some(id) = row.id() else {
                continue;
            };
            if id_only {
                // One id per row, however many cells the row holds.
                if meta.columns.iter().any(|&col| row.col(col).is_some()) {
                    if let Root::Flat(slot) = &mut root {
                        fold_into(slot, meta.aggregate, Scalar::Int(id), &mut *self.rng);
                    }
                }
                continue;
            }
            for &col in &meta.columns {
                let Some(chain) = row.col(col) else {
                    continue;
                };
                for cell in chain {
                    let mut values: SmallVec<[Scalar; 4]> = meta
                        .get
                        .iter()
                        .map(|get| select(*get, id, col, cell))
                        .collect();
                    let Some(datum) = values.pop() else {
                        continue;
                    };
                    match &mut root {
                        Root::Flat(slot) => fold_into(slot, meta.aggregate, datum, &mut *self.rng),
                        Root::Nested(dict) => {
                            accumulate(dict, &values, meta.aggregate, datum, &mut *self.rng)
                        }
                    }
                }
            }
        }
        trace!(rows = rows.len(), aggregate = meta.aggregate.as_str(), "metadata folded");
        match root {
            Root::Flat(slot) => slot.map(Accumulator::finish),
            Root::Nested(dict) => finish_dict(dict),
        }
    }
}

enum Root {
    Flat(Option<Accumulator>),
    Nested(Dict<Scratch>),
}

/// Intermediate tree: dicts down to the leaf depth, accumulators at the leaves.
enum Scratch {
    Leaf(Accumulator),
    Node(Dict<Scratch>),
}

fn select(get: GetField, id: i32, col: usize, cell: &ResultCell) -> Scalar {
    match get {
        GetField::Id => Scalar::Int(id),
        GetField::Field if col == ID_COLUMN => Scalar::from(ID_FIELD),
        GetField::Field => Scalar::Str(cell.key.clone()),
        GetField::Value => cell.value.clone(),
        GetField::Source => Scalar::from(cell.source.as_deref().unwrap_or(DEFAULT_SOURCE)),
    }
}

fn fold_into<R: Rng>(
    slot: &mut Option<Accumulator>,
    aggregate: Aggregate,
    datum: Scalar,
    rng: &mut R,
) {
    if let Some(acc) = slot.as_mut() {
        acc.push(datum, rng);
        return;
    }
    *slot = Accumulator::start(aggregate, datum);
}

fn accumulate<R: Rng>(
    dict: &mut Dict<Scratch>,
    path: &[Scalar],
    aggregate: Aggregate,
    datum: Scalar,
    rng: &mut R,
) {
    let Some((key, rest)) = path.split_first() else {
        return;
    };
    let key = key.to_string();
    if rest.is_empty() {
        if let Some(existing) = dict.get_mut(&key) {
            if let Scratch::Leaf(acc) = existing {
                acc.push(datum, rng);
            }
            return;
        }
        if let Some(acc) = Accumulator::start(aggregate, datum) {
            dict.insert(key, Scratch::Leaf(acc));
        }
        return;
    }
    if let Scratch::Node(child) = dict.get_or_insert_with(key, || Scratch::Node(Dict::new())) {
        accumulate(child, rest, aggregate, datum, rng);
    }
}

fn finish_dict(dict: Dict<Scratch>) -> Option<Value> {
    let out: Dict = dict
        .into_iter()
        .filter_map(|(key, scratch)| {
            let value = match scratch {
                Scratch::Leaf(acc) => Some(acc.finish()),
                Scratch::Node(child) => finish_dict(child),
            };
            value.map(|v| (key, v))
        })
        .collect();
    (!out.is_empty()).then_some(Value::Dict(out))
}

/// Buckets rows in first-seen order. Rows with no bucket key are dropped.
fn cluster_rows<'a>(cluster: &ClusterSpec, rows: &[&'a ResultRow]) -> IndexMap<String, Vec<&'a ResultRow>> {
    let mut buckets: IndexMap<String, Vec<&'a ResultRow>> = IndexMap::new();
    for (position, &row) in rows.iter().enumerate() {
        let key = match (cluster.by, cluster.column) {
            (ClusterBy::Position, _) | (_, None) => Some(position.to_string()),
            (_, Some(col)) => row
                .col(col)
                .and_then(|chain| chain.first())
                .map(|cell| cell.value.to_string())
                .or_else(|| cluster.fallback.clone()),
        };
        let Some(key) = key else {
            continue;
        };
        buckets.entry(key).or_default().push(row);
    }
    trace!(rows = rows.len(), clusters = buckets.len(), "rows clustered");
    buckets
}
