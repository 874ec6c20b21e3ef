//! Raw rows returned by the store.

use crate::storage::entry::Scalar;

/// One `(key, value, source)` cell in a column's value chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultCell {
    /// Attribute key the value was found under.
    pub key: String,
    /// The value.
    pub value: Scalar,
    /// Origin of the value; `None` for the identifier column.
    pub source: Option<String>,
}

/// One row: one (possibly empty) value chain per physical column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultRow {
    cols: Vec<Vec<ResultCell>>,
}

impl ResultRow {
    pub(crate) fn new(cols: Vec<Vec<ResultCell>>) -> Self {
        Self { cols }
    }

    /// Value chain for column `index`; `None` when the column holds nothing.
    pub fn col(&self, index: usize) -> Option<&[ResultCell]> {
        self.cols
            .get(index)
            .map(Vec::as_slice)
            .filter(|chain| !chain.is_empty())
    }

    /// Entry identifier stored in column 0.
    pub fn id(&self) -> Option<i32> {
        self.col(0)
            .and_then(|chain| chain.first())
            .and_then(|cell| cell.value.as_int())
    }
}

/// Ordered rows produced by evaluating a collection against a fetch spec.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultSet {
    rows: Vec<ResultRow>,
}

impl ResultSet {
    pub(crate) fn new(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Row at ordinal `index`.
    pub fn row(&self, index: usize) -> Option<&ResultRow> {
        self.rows.get(index)
    }

    /// All rows in evaluation order.
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }
}
