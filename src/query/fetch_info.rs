//! Per-query registry of physical fetch columns.
//!
//! Every compiled spec node that needs store data gets a dense [`NodeId`].
//! Column requests are deduplicated per node: asking the same node for the
//! same key twice yields the same physical column, while two different nodes
//! asking for the same key get a column each.

use rustc_hash::FxHashMap;

use crate::error::{MedialibError, Result};
use crate::storage::{FetchKind, FetchSpec, SourcePreference};

/// Physical column holding the entry identifier.
pub const ID_COLUMN: usize = 0;

/// Key registered for the identifier column.
pub const ID_KEY: &str = "song_id";

/// Logical key standing in for "every attribute".
const ALL_FIELDS_KEY: &str = "__NULL__";

/// Dense handle naming one compiled spec node within a query.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(pub u32);

/// Physical fetch spec plus the `(node, key) -> column` index.
#[derive(Debug)]
pub struct FetchInfo {
    spec: FetchSpec,
    columns: FxHashMap<NodeId, FxHashMap<String, usize>>,
    next_node: u32,
}

impl FetchInfo {
    /// Creates a registry seeded with the identifier column at index 0.
    pub fn new(pref: &SourcePreference) -> Self {
        let mut spec = FetchSpec::new();
        spec.add(Some(ID_KEY), pref, FetchKind::Parent);
        Self {
            spec,
            columns: FxHashMap::default(),
            next_node: 0,
        }
    }

    /// Hands out the next node handle.
    pub fn allocate_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    /// Registers `key` for `node` and returns its physical column.
    ///
    /// `None` requests every attribute visible under `pref`. The key `id`
    /// always resolves to [`ID_COLUMN`] without registering anything.
    pub fn add_key(&mut self, node: NodeId, key: Option<&str>, pref: &SourcePreference) -> usize {
        if key == Some("id") {
            return ID_COLUMN;
        }
        let logical = key.unwrap_or(ALL_FIELDS_KEY);
        let table = self.columns.entry(node).or_default();
        if let Some(&index) = table.get(logical) {
            return index;
        }
        let index = self.spec.add(key, pref, FetchKind::Data);
        table.insert(logical.to_owned(), index);
        index
    }

    /// Column previously assigned to `(node, key)`.
    pub fn column_index(&self, node: NodeId, key: Option<&str>) -> Result<usize> {
        if key == Some("id") {
            return Ok(ID_COLUMN);
        }
        let logical = key.unwrap_or(ALL_FIELDS_KEY);
        self.columns
            .get(&node)
            .and_then(|table| table.get(logical))
            .copied()
            .ok_or_else(|| {
                MedialibError::generic(format!(
                    "no column registered for key '{logical}' on node {}",
                    node.0
                ))
            })
    }

    /// The physical fetch spec handed to the store.
    pub fn fetch_spec(&self) -> &FetchSpec {
        &self.spec
    }

    /// Number of physical columns, identifier included.
    pub fn column_count(&self) -> usize {
        self.spec.len()
    }
}
