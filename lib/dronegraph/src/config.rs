//! String keyed configuration of the form extractor and the population engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_INPUT_SHAPE: &str = "Flight_input";
pub const DEFAULT_GRAPH_BOUNDARY: &str = "boundary";
pub const DEFAULT_NAME_SUBSTITUTE: &str = "name";
pub const DEFAULT_BASE: &str = "http://ld.landrs.org/id/";

/// Configuration values, every key optional.
///
/// ```
/// use dronegraph::{Config, FieldMode};
///
/// let config: Config = [("mission_file_mode", "files")].into_iter().collect();
/// assert_eq!(config.input_shape(), "Flight_input");
/// assert_eq!(config.field_mode("mission_file"), Some(FieldMode::Files));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// The shape set describing the input form.
    pub fn input_shape(&self) -> &str {
        self.get("input_shape").unwrap_or(DEFAULT_INPUT_SHAPE)
    }

    /// The shape set of relationship constraints. No constraint pass runs without it.
    pub fn constraint_shape(&self) -> Option<&str> {
        self.get("constraint_shape")
    }

    /// The role tag of properties exposed in forms.
    pub fn graph_boundary(&self) -> &str {
        self.get("graph_boundary").unwrap_or(DEFAULT_GRAPH_BOUNDARY)
    }

    /// Name of the property filled by an entity seed.
    pub fn name_substitute(&self) -> &str {
        self.get("name_substitute")
            .unwrap_or(DEFAULT_NAME_SUBSTITUTE)
    }

    /// Namespace of minted identifiers.
    pub fn base(&self) -> &str {
        self.get("base").unwrap_or(DEFAULT_BASE)
    }

    /// The `<name>_mode` of a field. Unknown modes are ignored with a warning.
    pub fn field_mode(&self, name: &str) -> Option<FieldMode> {
        let key = format!("{name}_mode");
        let value = self.get(&key)?;
        match value.parse() {
            Ok(mode) => Some(mode),
            Err(error) => {
                warn!("Ignoring {key}: {error}");
                None
            }
        }
    }

    /// The `<name>_extension` filter of a [`FieldMode::Files`] field, without leading dot.
    pub fn file_extension(&self, name: &str) -> Option<&str> {
        self.get(&format!("{name}_extension"))
            .map(|extension| extension.trim_start_matches('.'))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Config {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Config {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

/// How a form field gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldMode {
    /// The configured value becomes the default value.
    Substitute,
    /// The options are the files of the configured directory.
    Files,
}

impl FromStr for FieldMode {
    type Err = UnknownFieldMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("SUBSTITUTE") {
            Ok(Self::Substitute)
        } else if value.eq_ignore_ascii_case("FILES") {
            Ok(Self::Files)
        } else {
            Err(UnknownFieldMode(value.to_owned()))
        }
    }
}

impl fmt::Display for FieldMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Substitute => "SUBSTITUTE",
            Self::Files => "FILES",
        })
    }
}

/// A field mode that is neither `SUBSTITUTE` nor `FILES`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field mode '{0}', expected SUBSTITUTE or FILES")]
pub struct UnknownFieldMode(String);
