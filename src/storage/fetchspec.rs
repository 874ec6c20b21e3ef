//! Physical fetch specification: the flat column list handed to the store.

use crate::storage::sourcepref::SourcePreference;

/// What a fetch column pulls out of each entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FetchKind {
    /// The entry identifier itself, always present.
    Parent,
    /// Attribute values for the column's key (or every key when unkeyed).
    Data,
}

/// Single physical column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchColumn {
    /// Attribute key; `None` fetches every visible attribute.
    pub key: Option<String>,
    /// Source preference applied when picking values.
    pub pref: SourcePreference,
    /// Column kind.
    pub kind: FetchKind,
}

/// Ordered, append-only list of physical columns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchSpec {
    columns: Vec<FetchColumn>,
}

impl FetchSpec {
    /// Creates an empty fetch spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column and returns its index.
    pub fn add(&mut self, key: Option<&str>, pref: &SourcePreference, kind: FetchKind) -> usize {
        self.columns.push(FetchColumn {
            key: key.map(str::to_owned),
            pref: pref.clone(),
            kind,
        });
        self.columns.len() - 1
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true when no columns were registered.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All columns in index order.
    pub fn columns(&self) -> &[FetchColumn] {
        &self.columns
    }

    /// Column at `index`.
    pub fn column(&self, index: usize) -> Option<&FetchColumn> {
        self.columns.get(index)
    }
}
