//! Structural collection expressions and their evaluation to ordered id lists.
//!
//! Collections arrive already built (they are deserialized from a tagged JSON
//! form or assembled with the helper constructors); there is no text syntax.
//! Set operators produce ascending-id order, `Order` and `Limit` are the only
//! operators that impose their own order.

use std::cmp::Ordering;

use globset::Glob;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{MedialibError, Result};
use crate::storage::entry::{Entry, Scalar, StoreState};
use crate::storage::sourcepref::SourcePreference;

/// Sort key for [`Collection::Order`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderBy {
    /// Entry identifier.
    Id,
    /// Best-priority value of an attribute; entries lacking it sort last.
    Field(String),
}

/// Sort direction for [`Collection::Order`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

/// Collection expression evaluated by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Collection {
    /// Every entry.
    Universe,
    /// Explicit ids, in the given order; unknown ids are skipped.
    IdList {
        /// Entry ids.
        ids: Vec<i32>,
    },
    /// Entries with `field` equal to `value` (compared by string form).
    Equals {
        /// Attribute key, or `id`.
        field: String,
        /// Expected value.
        value: Scalar,
    },
    /// Entries carrying `field` at all.
    Has {
        /// Attribute key.
        field: String,
    },
    /// Entries whose `field` matches a glob pattern.
    Match {
        /// Attribute key.
        field: String,
        /// Glob pattern (`*`, `?`).
        pattern: String,
    },
    /// Entries whose integer `field` is strictly smaller than `value`.
    Smaller {
        /// Attribute key, or `id`.
        field: String,
        /// Exclusive bound.
        value: i32,
    },
    /// Entries whose integer `field` is strictly greater than `value`.
    Greater {
        /// Attribute key, or `id`.
        field: String,
        /// Exclusive bound.
        value: i32,
    },
    /// Entries in any operand.
    Union {
        /// Operands.
        operands: Vec<Collection>,
    },
    /// Entries in every operand.
    Intersection {
        /// Operands.
        operands: Vec<Collection>,
    },
    /// Entries not in the operand.
    Complement {
        /// Operand.
        operand: Box<Collection>,
    },
    /// Stable sort of the operand.
    Order {
        /// Operand.
        operand: Box<Collection>,
        /// Sort key.
        by: OrderBy,
        /// Sort direction.
        #[serde(default)]
        direction: Direction,
    },
    /// Window over the operand's order.
    Limit {
        /// Operand.
        operand: Box<Collection>,
        /// Rows to skip.
        #[serde(default)]
        start: usize,
        /// Maximum rows to keep; unbounded when absent.
        #[serde(default)]
        length: Option<usize>,
    },
}

impl Collection {
    /// Every entry.
    pub fn universe() -> Self {
        Collection::Universe
    }

    /// Explicit id list.
    pub fn ids<I: IntoIterator<Item = i32>>(ids: I) -> Self {
        Collection::IdList {
            ids: ids.into_iter().collect(),
        }
    }

    /// Equality filter.
    pub fn equals(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Collection::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Presence filter.
    pub fn has(field: impl Into<String>) -> Self {
        Collection::Has {
            field: field.into(),
        }
    }

    /// Ascending order by an attribute.
    pub fn order_by(self, field: impl Into<String>) -> Self {
        Collection::Order {
            operand: Box::new(self),
            by: OrderBy::Field(field.into()),
            direction: Direction::Asc,
        }
    }

    /// Ascending order by id.
    pub fn order_by_id(self) -> Self {
        Collection::Order {
            operand: Box::new(self),
            by: OrderBy::Id,
            direction: Direction::Asc,
        }
    }

    /// Reverses the direction of an `Order`; other collections are wrapped
    /// in a descending id order.
    pub fn descending(self) -> Self {
        match self {
            Collection::Order { operand, by, .. } => Collection::Order {
                operand,
                by,
                direction: Direction::Desc,
            },
            other => Collection::Order {
                operand: Box::new(other),
                by: OrderBy::Id,
                direction: Direction::Desc,
            },
        }
    }

    /// Window over this collection.
    pub fn limit(self, start: usize, length: Option<usize>) -> Self {
        Collection::Limit {
            operand: Box::new(self),
            start,
            length,
        }
    }

    /// Intersection with another collection.
    pub fn and(self, other: Collection) -> Self {
        Collection::Intersection {
            operands: vec![self, other],
        }
    }

    /// Evaluates to the ordered list of matching ids.
    pub fn evaluate(&self, state: &StoreState, pref: &SourcePreference) -> Result<Vec<i32>> {
        match self {
            Collection::Universe => Ok(state.ids().collect()),
            Collection::IdList { ids } => {
                let mut seen = FxHashSet::default();
                Ok(ids
                    .iter()
                    .copied()
                    .filter(|id| state.contains(*id) && seen.insert(*id))
                    .collect())
            }
            Collection::Equals { field, value } => {
                let expected = value.to_string();
                filter(state, field, |id, entry| {
                    field_values(id, entry, field, pref)
                        .iter()
                        .any(|v| v.to_string() == expected)
                })
            }
            Collection::Has { field } => filter(state, field, |id, entry| {
                !field_values(id, entry, field, pref).is_empty()
            }),
            Collection::Match { field, pattern } => {
                let matcher = Glob::new(pattern)
                    .map_err(|err| {
                        MedialibError::invalid(format!("bad match pattern '{pattern}': {err}"))
                    })?
                    .compile_matcher();
                filter(state, field, |id, entry| {
                    field_values(id, entry, field, pref)
                        .iter()
                        .any(|v| matcher.is_match(v.to_string()))
                })
            }
            Collection::Smaller { field, value } => filter(state, field, |id, entry| {
                field_values(id, entry, field, pref)
                    .iter()
                    .filter_map(Scalar::as_int)
                    .any(|v| v < *value)
            }),
            Collection::Greater { field, value } => filter(state, field, |id, entry| {
                field_values(id, entry, field, pref)
                    .iter()
                    .filter_map(Scalar::as_int)
                    .any(|v| v > *value)
            }),
            Collection::Union { operands } => {
                let mut found = FxHashSet::default();
                for operand in operands {
                    found.extend(operand.evaluate(state, pref)?);
                }
                Ok(state.ids().filter(|id| found.contains(id)).collect())
            }
            Collection::Intersection { operands } => {
                let Some((first, rest)) = operands.split_first() else {
                    return Err(MedialibError::invalid(
                        "intersection requires at least one operand",
                    ));
                };
                let mut found: FxHashSet<i32> = first.evaluate(state, pref)?.into_iter().collect();
                for operand in rest {
                    let other: FxHashSet<i32> = operand.evaluate(state, pref)?.into_iter().collect();
                    found.retain(|id| other.contains(id));
                }
                Ok(state.ids().filter(|id| found.contains(id)).collect())
            }
            Collection::Complement { operand } => {
                let excluded: FxHashSet<i32> = operand.evaluate(state, pref)?.into_iter().collect();
                Ok(state.ids().filter(|id| !excluded.contains(id)).collect())
            }
            Collection::Order {
                operand,
                by,
                direction,
            } => {
                let mut ids = operand.evaluate(state, pref)?;
                match by {
                    OrderBy::Id => {
                        ids.sort_by(|a, b| directed(a.cmp(b), *direction));
                    }
                    OrderBy::Field(field) => {
                        if field.is_empty() {
                            return Err(MedialibError::invalid("order field must not be empty"));
                        }
                        let mut keyed: Vec<(i32, Option<Scalar>)> = ids
                            .into_iter()
                            .map(|id| {
                                let key = state.entry(id).and_then(|entry| {
                                    field_values(id, entry, field, pref).into_iter().next()
                                });
                                (id, key)
                            })
                            .collect();
                        keyed.sort_by(|(_, a), (_, b)| match (a, b) {
                            (Some(a), Some(b)) => directed(a.cmp(b), *direction),
                            (Some(_), None) => Ordering::Less,
                            (None, Some(_)) => Ordering::Greater,
                            (None, None) => Ordering::Equal,
                        });
                        ids = keyed.into_iter().map(|(id, _)| id).collect();
                    }
                }
                Ok(ids)
            }
            Collection::Limit {
                operand,
                start,
                length,
            } => {
                let ids = operand.evaluate(state, pref)?;
                let window = ids.into_iter().skip(*start);
                Ok(match length {
                    Some(len) => window.take(*len).collect(),
                    None => window.collect(),
                })
            }
        }
    }
}

fn directed(ord: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Asc => ord,
        Direction::Desc => ord.reverse(),
    }
}

fn filter<F>(state: &StoreState, field: &str, mut pred: F) -> Result<Vec<i32>>
where
    F: FnMut(i32, &Entry) -> bool,
{
    if field.is_empty() {
        return Err(MedialibError::invalid("filter field must not be empty"));
    }
    Ok(state
        .ids()
        .filter(|id| state.entry(*id).is_some_and(|entry| pred(*id, entry)))
        .collect())
}

fn field_values(id: i32, entry: &Entry, field: &str, pref: &SourcePreference) -> Vec<Scalar> {
    if field == "id" {
        return vec![Scalar::Int(id)];
    }
    entry
        .best(field, pref)
        .into_iter()
        .map(|attr| attr.value.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (StoreState, SourcePreference) {
        let mut state = StoreState::default();
        for (n, artist) in [(3, "B"), (1, "A"), (2, "B")] {
            let id = state.create_entry().unwrap();
            state
                .set_attribute(id, "tracknr", Scalar::Int(n), "server")
                .unwrap();
            state
                .set_attribute(id, "artist", artist.into(), "server")
                .unwrap();
        }
        (state, SourcePreference::new(["server"]).unwrap())
    }

    #[test]
    fn order_by_field_is_stable_and_directed() {
        let (state, pref) = fixture();
        let asc = Collection::universe().order_by("tracknr");
        assert_eq!(asc.evaluate(&state, &pref).unwrap(), vec![2, 3, 1]);
        let desc = Collection::universe().order_by("tracknr").descending();
        assert_eq!(desc.evaluate(&state, &pref).unwrap(), vec![1, 3, 2]);
    }

    #[test]
    fn filters_and_set_operators() {
        let (state, pref) = fixture();
        let b = Collection::equals("artist", "B");
        assert_eq!(b.evaluate(&state, &pref).unwrap(), vec![1, 3]);
        let not_b = Collection::Complement {
            operand: Box::new(b.clone()),
        };
        assert_eq!(not_b.evaluate(&state, &pref).unwrap(), vec![2]);
        let small = Collection::Smaller {
            field: "tracknr".into(),
            value: 3,
        };
        assert_eq!(b.and(small).evaluate(&state, &pref).unwrap(), vec![3]);
    }

    #[test]
    fn id_list_skips_unknown_and_duplicates() {
        let (state, pref) = fixture();
        let coll = Collection::ids([3, 99, 1, 3]);
        assert_eq!(coll.evaluate(&state, &pref).unwrap(), vec![3, 1]);
    }

    #[test]
    fn limit_windows_ordered_ids() {
        let (state, pref) = fixture();
        let coll = Collection::universe().order_by_id().limit(1, Some(1));
        assert_eq!(coll.evaluate(&state, &pref).unwrap(), vec![2]);
    }

    #[test]
    fn empty_order_field_is_invalid() {
        let (state, pref) = fixture();
        let coll = Collection::universe().order_by("");
        assert!(coll.evaluate(&state, &pref).is_err());
    }

    #[test]
    fn deserializes_tagged_json() {
        let json = r#"{"type":"order","operand":{"type":"universe"},"by":{"field":"tracknr"}}"#;
        let coll: Collection = serde_json::from_str(json).unwrap();
        assert_eq!(coll, Collection::universe().order_by("tracknr"));
    }
}
