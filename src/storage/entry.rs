//! Entries, attributes and the mutable tuple-store state.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MedialibError, Result};
use crate::storage::sourcepref::SourcePreference;

/// Scalar attribute value held by the store.
///
/// Integers order before strings; `Hash`/`Eq` are by value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Signed 32-bit integer.
    Int(i32),
    /// UTF-8 string.
    Str(String),
}

impl Scalar {
    /// Returns the integer payload, if any.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Scalar::Int(v) => Some(*v),
            Scalar::Str(_) => None,
        }
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Int(_) => None,
            Scalar::Str(s) => Some(s),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

/// One `(key, value, source)` tuple attached to an entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name, e.g. `artist`.
    pub key: String,
    /// Attribute value.
    pub value: Scalar,
    /// Origin that set the value, e.g. `plugin/id3v2`.
    pub source: String,
}

/// A media entry: an ordered bag of attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entry {
    attrs: Vec<Attribute>,
}

impl Entry {
    /// All attributes in insertion order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attrs
    }

    /// Visible attributes for `key` at the best priority present under `pref`.
    pub fn best<'a>(&'a self, key: &str, pref: &SourcePreference) -> Vec<&'a Attribute> {
        best_of(self.attrs.iter().filter(|a| a.key == key), pref)
    }

    /// Best-priority attributes for every distinct key, grouped by key in
    /// order of the key's first appearance.
    pub fn best_all<'a>(&'a self, pref: &SourcePreference) -> Vec<&'a Attribute> {
        let mut keys: Vec<&str> = Vec::new();
        for attr in &self.attrs {
            if !keys.contains(&attr.key.as_str()) {
                keys.push(&attr.key);
            }
        }
        keys.into_iter()
            .flat_map(|key| self.best(key, pref))
            .collect()
    }

    fn set(&mut self, key: &str, value: Scalar, source: &str) {
        if let Some(attr) = self
            .attrs
            .iter_mut()
            .find(|a| a.key == key && a.source == source)
        {
            attr.value = value;
            return;
        }
        self.attrs.push(Attribute {
            key: key.to_owned(),
            value,
            source: source.to_owned(),
        });
    }

    fn remove(&mut self, key: &str, source: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|a| !(a.key == key && a.source == source));
        self.attrs.len() != before
    }
}

fn best_of<'a, I>(attrs: I, pref: &SourcePreference) -> Vec<&'a Attribute>
where
    I: Iterator<Item = &'a Attribute>,
{
    let mut best: Option<usize> = None;
    let mut out = Vec::new();
    for attr in attrs {
        let Some(prio) = pref.priority(&attr.source) else {
            continue;
        };
        match best {
            Some(current) if prio > current => {}
            Some(current) if prio == current => out.push(attr),
            _ => {
                best = Some(prio);
                out.clear();
                out.push(attr);
            }
        }
    }
    out
}

/// Complete contents of the tuple store.
///
/// Cloned wholesale by write sessions (copy-on-write through `Arc`), so it
/// carries no locks of its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreState {
    entries: BTreeMap<i32, Entry>,
    next_id: i32,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl StoreState {
    /// Allocates a fresh, empty entry and returns its id.
    pub fn create_entry(&mut self) -> Result<i32> {
        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or_else(|| MedialibError::generic("entry id space exhausted"))?;
        self.entries.insert(id, Entry::default());
        Ok(id)
    }

    /// Removes an entry and all of its attributes.
    pub fn remove_entry(&mut self, id: i32) -> Result<()> {
        self.entries
            .remove(&id)
            .map(|_| ())
            .ok_or(MedialibError::NoSuchEntry(id))
    }

    /// Returns whether the entry exists.
    pub fn contains(&self, id: i32) -> bool {
        self.entries.contains_key(&id)
    }

    /// Looks up an entry.
    pub fn entry(&self, id: i32) -> Option<&Entry> {
        self.entries.get(&id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.entries.keys().copied()
    }

    /// Sets `key` from `source` on entry `id`, replacing a previous value
    /// from the same source.
    pub fn set_attribute(
        &mut self,
        id: i32,
        key: &str,
        value: Scalar,
        source: &str,
    ) -> Result<()> {
        if key.is_empty() {
            return Err(MedialibError::invalid("attribute key must not be empty"));
        }
        if source.is_empty() {
            return Err(MedialibError::invalid("attribute source must not be empty"));
        }
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(MedialibError::NoSuchEntry(id))?;
        entry.set(key, value, source);
        Ok(())
    }

    /// Removes `key` set by `source`. Returns whether anything was removed.
    pub fn remove_attribute(&mut self, id: i32, key: &str, source: &str) -> Result<bool> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(MedialibError::NoSuchEntry(id))?;
        Ok(entry.remove(key, source))
    }

    /// Keeps only attributes for which `keep` returns true.
    pub fn retain_attributes<F>(&mut self, id: i32, keep: F) -> Result<()>
    where
        F: FnMut(&Attribute) -> bool,
    {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(MedialibError::NoSuchEntry(id))?;
        entry.attrs.retain(keep);
        Ok(())
    }
}
