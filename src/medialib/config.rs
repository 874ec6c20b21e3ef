use std::fs;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{MedialibError, Result};
use crate::storage::SourcePreference;

/// Source patterns consulted when a query does not name its own, best first.
pub const DEFAULT_SOURCE_PREFERENCE: &[&str] = &[
    "server",
    "client/*",
    "plugin/playlist",
    "plugin/id3v2",
    "plugin/segment",
    "plugin/*",
    "*",
];

/// Source attributed to writes made by the library itself.
pub const DEFAULT_SOURCE: &str = "server";

/// Media library settings.
///
/// Read from a TOML file such as:
///
/// ```toml
/// source_preference = ["server", "plugin/*"]
/// default_source = "server"
/// random_seed = 42
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MedialibConfig {
    /// Ordered source patterns used when a fetch spec gives none.
    pub source_preference: Vec<String>,
    /// Source recorded by `entry_new` and the other library-owned writes.
    pub default_source: String,
    /// Seed for the `random` aggregate. Unseeded queries draw from entropy.
    pub random_seed: Option<u64>,
}

impl Default for MedialibConfig {
    fn default() -> Self {
        Self {
            source_preference: DEFAULT_SOURCE_PREFERENCE
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            default_source: DEFAULT_SOURCE.to_owned(),
            random_seed: None,
        }
    }
}

impl MedialibConfig {
    /// Parses a configuration from TOML text and validates it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: MedialibConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Loads `explicit`, or the file at [`MedialibConfig::default_path`]
    /// when it exists, falling back to defaults otherwise.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Per-user configuration location, e.g. `~/.config/medialib/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|base| base.join("medialib").join("config.toml"))
    }

    /// Rejects empty preference lists, bad globs and an empty default source.
    pub fn validate(&self) -> Result<()> {
        if self.default_source.is_empty() {
            return Err(MedialibError::invalid("default_source must not be empty"));
        }
        self.source_preference().map(|_| ())
    }

    /// Compiles the configured source patterns.
    pub fn source_preference(&self) -> Result<SourcePreference> {
        SourcePreference::new(self.source_preference.iter())
    }

    /// Random source for one query's `random` aggregates.
    pub fn rng(&self) -> ChaCha8Rng {
        match self.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let config = MedialibConfig::default();
        config.validate().unwrap();
        let pref = config.source_preference().unwrap();
        assert_eq!(pref.priority("server"), Some(0));
        assert_eq!(pref.priority("plugin/id3v2"), Some(3));
        assert_eq!(pref.priority("anything"), Some(6));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = MedialibConfig::from_toml_str("random_seed = 9\n").unwrap();
        assert_eq!(config.random_seed, Some(9));
        assert_eq!(config.default_source, DEFAULT_SOURCE);
        assert_eq!(config.source_preference.len(), DEFAULT_SOURCE_PREFERENCE.len());
    }

    #[test]
    fn rejects_bad_values() {
        let err = MedialibConfig::from_toml_str("source_preference = []\n").unwrap_err();
        assert_eq!(err.code(), "InvalidArgument");
        let err = MedialibConfig::from_toml_str("default_source = \"\"\n").unwrap_err();
        assert_eq!(err.code(), "InvalidArgument");
        let err = MedialibConfig::from_toml_str("bogus = 1\n").unwrap_err();
        assert_eq!(err.code(), "Config");
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "source_preference = [\"plugin/*\", \"server\"]").unwrap();
        writeln!(file, "default_source = \"client/cli\"").unwrap();
        let config = MedialibConfig::load(file.path()).unwrap();
        assert_eq!(config.default_source, "client/cli");
        let pref = config.source_preference().unwrap();
        assert_eq!(pref.priority("plugin/id3v2"), Some(0));
        assert_eq!(pref.priority("client/cli"), None);

        let loaded = MedialibConfig::load_or_default(Some(file.path())).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MedialibConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert_eq!(err.code(), "Io");
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let config = MedialibConfig {
            random_seed: Some(3),
            ..MedialibConfig::default()
        };
        let a: u64 = config.rng().gen();
        let b: u64 = config.rng().gen();
        assert_eq!(a, b);
    }
}
