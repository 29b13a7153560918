//! Data model for parsed environment documents.
//!
//! An environment document is a YAML mapping with three recognized keys
//! (`name`, `channels`, `dependencies`) plus arbitrary extra keys that are
//! carried through untouched. Dependency entries are either plain package
//! strings or a single-key mapping holding a package list for a secondary
//! ecosystem (the conda `pip:` form).

use serde_yaml::{Mapping, Value};

use crate::error::MergeError;

/// Canonical top-level keys of an environment document.
///
/// Always use these constants instead of string literals so generation and
/// merging stay consistent.
pub mod keys {
    pub const NAME: &str = "name";
    pub const CHANNELS: &str = "channels";
    pub const DEPENDENCIES: &str = "dependencies";
}

/// One entry of a `dependencies` list.
///
/// Version and build constraints embedded in a package string (`numpy=1.7`)
/// are opaque: two entries name the same dependency only when the full
/// strings are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// A plain package reference, e.g. `numpy=1.7`.
    Plain(String),
    /// A package list for a secondary ecosystem, e.g. `pip:`.
    Nested {
        ecosystem: String,
        packages: Vec<String>,
    },
}

impl Dependency {
    /// Parse one dependency entry from its YAML form.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is neither a string nor a single-key
    /// mapping over a sequence of strings.
    pub fn from_value(value: &Value) -> Result<Self, MergeError> {
        match value {
            Value::String(package) => Ok(Self::Plain(package.clone())),
            Value::Mapping(map) => {
                let mut entries = map.iter();
                let (key, inner) = match (entries.next(), entries.next()) {
                    (Some(entry), None) => entry,
                    _ => {
                        return Err(MergeError::MalformedDependency(format!(
                            "a mapping with {} keys",
                            map.len()
                        )))
                    }
                };
                let ecosystem = key.as_str().ok_or_else(|| {
                    MergeError::MalformedDependency("a mapping with a non-string key".to_string())
                })?;
                let packages = nested_packages(inner)
                    .ok_or_else(|| MergeError::MalformedNestedList(ecosystem.to_string()))?;
                Ok(Self::Nested {
                    ecosystem: ecosystem.to_string(),
                    packages,
                })
            }
            other => Err(MergeError::MalformedDependency(describe(other).to_string())),
        }
    }

    /// Render the entry back to its YAML form.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Plain(package) => Value::String(package.clone()),
            Self::Nested {
                ecosystem,
                packages,
            } => {
                let mut map = Mapping::new();
                map.insert(
                    Value::String(ecosystem.clone()),
                    Value::Sequence(packages.iter().cloned().map(Value::String).collect()),
                );
                Value::Mapping(map)
            }
        }
    }
}

/// Strip the build string from a `name=version=build` package pin.
///
/// Pins without a build component (`xz`, `xz=5.2.5`, `a>=4`) are returned
/// unchanged; only the part after the last `=` of a doubly-pinned package
/// is dropped. Version conflicts this may expose are left for conda itself.
pub fn remove_build_string(package: &str) -> &str {
    match package.rsplit_once('=') {
        Some((pin, _)) if pin.contains('=') => pin,
        _ => package,
    }
}

/// Coerce the inner value of a nested dependency entry into a package list.
///
/// A null inner value (`- pip:` with nothing under it) counts as an empty
/// list; anything other than a sequence of strings is rejected.
fn nested_packages(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Sequence(packages) => packages
            .iter()
            .map(|package| package.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// Human-readable shape of a YAML value, for error messages.
pub(crate) fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
