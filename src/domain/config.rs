use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::reference::OrderingMode;

/// Configuration for document validation.
///
/// Stored as `config.toml` at the root of a requirements directory. Every
/// field has a default, so an empty (versioned) file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Whether header reference lists must be declared in sorted order.
    pub reference_ordering: OrderingMode,

    /// The minimum number of characters (after trimming) a document body
    /// must contain.
    min_body_length: usize,

    /// Whether markdown files without a frontmatter header are skipped when
    /// loading a directory, rather than reported as failures.
    pub allow_unrecognised: bool,

    /// Whether stale or dangling requirement references fail corpus
    /// validation, rather than being reported as warnings.
    pub fail_on_stale: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reference_ordering: OrderingMode::default(),
            min_body_length: default_min_body_length(),
            allow_unrecognised: false,
            fail_on_stale: false,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Loads `config.toml` from a requirements root, falling back to the
    /// default configuration if it is missing or invalid.
    #[must_use]
    pub fn load_or_default(root: &Path) -> Self {
        let path = root.join("config.toml");
        Self::load(&path).unwrap_or_else(|e| {
            tracing::debug!("using default configuration ({}): {e}", path.display());
            Self::default()
        })
    }

    /// Returns the minimum trimmed body length.
    #[must_use]
    pub const fn min_body_length(&self) -> usize {
        self.min_body_length
    }

    /// Sets the minimum trimmed body length.
    pub const fn set_min_body_length(&mut self, value: usize) {
        self.min_body_length = value;
    }
}

const fn default_min_body_length() -> usize {
    10
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        reference_ordering: OrderingMode,

        #[serde(default = "default_min_body_length")]
        min_body_length: usize,

        #[serde(default)]
        allow_unrecognised: bool,

        #[serde(default)]
        fail_on_stale: bool,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                reference_ordering,
                min_body_length,
                allow_unrecognised,
                fail_on_stale,
            } => Self {
                reference_ordering,
                min_body_length,
                allow_unrecognised,
                fail_on_stale,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            reference_ordering: config.reference_ordering,
            min_body_length: config.min_body_length,
            allow_unrecognised: config.allow_unrecognised,
            fail_on_stale: config.fail_on_stale,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\nreference_ordering = \"unordered\"\nmin_body_length = 40\nallow_unrecognised = true\nfail_on_stale = true\n",
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.reference_ordering, OrderingMode::Unordered);
        assert_eq!(config.min_body_length(), 40);
        assert!(config.allow_unrecognised);
        assert!(config.fail_on_stale);
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = Config::load(&missing).unwrap_err();
        assert!(error.starts_with("Failed to read config file:"));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nreference_ordering = \"sorted\"\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(error.starts_with("Failed to parse config file:"));
    }

    #[test]
    fn empty_file_returns_default() {
        let expected = Config::default();
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
        assert_eq!(actual.reference_ordering, OrderingMode::Strict);
        assert_eq!(actual.min_body_length(), 10);
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        let mut config = Config {
            fail_on_stale: true,
            ..Config::default()
        };
        config.set_min_body_length(25);

        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
        assert_eq!(Config::load_or_default(tmp.path()), config);
    }

    #[test]
    fn missing_root_config_falls_back_to_default() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(Config::load_or_default(tmp.path()), Config::default());
    }
}
