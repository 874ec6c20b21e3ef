//! Ordered source-name patterns used to pick between same-keyed attributes.

use std::fmt;
use std::sync::Arc;

use globset::{Glob, GlobMatcher};

use crate::error::{MedialibError, Result};

/// Ordered list of glob patterns; earlier patterns win.
///
/// A source's priority is the index of the first pattern that matches it.
/// Sources matching no pattern are invisible to fetches made under this
/// preference.
#[derive(Clone)]
pub struct SourcePreference {
    patterns: Arc<[String]>,
    matchers: Arc<[GlobMatcher]>,
}

impl SourcePreference {
    /// Compiles the supplied patterns. Fails on an empty list or a malformed glob.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        if patterns.is_empty() {
            return Err(MedialibError::invalid(
                "source preference requires at least one pattern",
            ));
        }
        let matchers = patterns
            .iter()
            .map(|pattern| {
                Glob::new(pattern)
                    .map(|glob| glob.compile_matcher())
                    .map_err(|err| {
                        MedialibError::invalid(format!("bad source pattern '{pattern}': {err}"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            patterns: patterns.into(),
            matchers: matchers.into(),
        })
    }

    /// Returns the priority of `source` (lower is better), or `None` when hidden.
    pub fn priority(&self, source: &str) -> Option<usize> {
        self.matchers.iter().position(|m| m.is_match(source))
    }

    /// Returns the raw patterns in preference order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl PartialEq for SourcePreference {
    fn eq(&self, other: &Self) -> bool {
        self.patterns == other.patterns
    }
}

impl Eq for SourcePreference {}

impl fmt::Debug for SourcePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SourcePreference")
            .field(&self.patterns)
            .finish()
    }
}
