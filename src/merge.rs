//! Order-preserving merge of parsed environment documents.
//!
//! Later documents take precedence for `name` and any unrecognized key,
//! while the list-valued keys (`channels`, `dependencies`) accumulate
//! across all documents in first-seen order with duplicates dropped. The
//! engine never mutates its inputs and owns everything it returns.

use std::collections::{HashMap, HashSet};

use serde_yaml::{Mapping, Value};

use crate::error::MergeError;
use crate::models::{self, keys, Dependency};

/// Merge parsed environment documents into one consolidated document.
///
/// Documents are processed in slice order: the last document wins for
/// scalar keys, and ordering also fixes the first-seen position of every
/// channel, dependency, and nested ecosystem list. The output mapping is
/// emitted as `name`, `channels`, `dependencies`, then remaining keys in
/// first-seen order, so repeated runs over the same input are
/// byte-identical.
///
/// With `remove_builds` set, plain package pins have their build string
/// stripped (`name=version=build` becomes `name=version`) before
/// deduplication, so the same pin built differently collapses to one entry.
///
/// # Errors
///
/// Returns [`MergeError`] when any document (or a structure inside one)
/// does not match the environment-file shape. The whole call fails; no
/// partial result is produced.
pub fn merge(documents: &[Value], remove_builds: bool) -> Result<Mapping, MergeError> {
    let mut channels = ChannelMerge::default();
    let mut dependencies = DependencyMerge::new(remove_builds);
    // Last-wins keys, including `name`. Mapping keeps the first-seen
    // position of a key when a later document overwrites its value.
    let mut extras = Mapping::new();

    for document in documents {
        let document = document.as_mapping().ok_or(MergeError::NotAMapping)?;
        for (key, value) in document {
            let key = key.as_str().ok_or(MergeError::NonStringKey)?;
            match key {
                keys::CHANNELS => channels.absorb(value)?,
                keys::DEPENDENCIES => dependencies.absorb(value)?,
                _ => {
                    extras.insert(Value::String(key.to_string()), value.clone());
                }
            }
        }
    }

    let name_key = Value::String(keys::NAME.to_string());
    let mut merged = Mapping::new();
    if let Some(name) = extras.get(&name_key) {
        merged.insert(name_key.clone(), name.clone());
    }
    if let Some(channels) = channels.into_value() {
        merged.insert(Value::String(keys::CHANNELS.to_string()), channels);
    }
    if let Some(dependencies) = dependencies.into_value() {
        merged.insert(Value::String(keys::DEPENDENCIES.to_string()), dependencies);
    }
    for (key, value) in extras {
        if key != name_key {
            merged.insert(key, value);
        }
    }
    Ok(merged)
}

/// Accumulates `channels` lists across documents: first-seen order, later
/// duplicates dropped.
#[derive(Default)]
struct ChannelMerge {
    present: bool,
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl ChannelMerge {
    fn absorb(&mut self, value: &Value) -> Result<(), MergeError> {
        let channels = match value {
            // `channels:` with no value parses as null; same as a missing key
            Value::Null => return Ok(()),
            Value::Sequence(channels) => channels,
            _ => return Err(MergeError::NotASequence(keys::CHANNELS)),
        };
        self.present = true;
        for channel in channels {
            let channel = channel.as_str().ok_or(MergeError::NonStringChannel)?;
            if self.seen.insert(channel.to_string()) {
                self.ordered.push(channel.to_string());
            }
        }
        Ok(())
    }

    fn into_value(self) -> Option<Value> {
        self.present
            .then(|| Value::Sequence(self.ordered.into_iter().map(Value::String).collect()))
    }
}

/// Accumulates dependency lists across documents.
///
/// Plain entries dedup on the full opaque string, after the optional
/// build-string removal. Nested ecosystem lists merge by ecosystem key
/// into the position where the key first appeared; the same key showing
/// up again, even within a single document, keeps feeding the same
/// running list.
#[derive(Default)]
struct DependencyMerge {
    remove_builds: bool,
    present: bool,
    resolved: Vec<Dependency>,
    seen_plain: HashSet<String>,
    nested_slots: HashMap<String, usize>,
}

impl DependencyMerge {
    fn new(remove_builds: bool) -> Self {
        Self {
            remove_builds,
            ..Self::default()
        }
    }

    fn absorb(&mut self, value: &Value) -> Result<(), MergeError> {
        let entries = match value {
            Value::Null => return Ok(()),
            Value::Sequence(entries) => entries,
            _ => return Err(MergeError::NotASequence(keys::DEPENDENCIES)),
        };
        self.present = true;
        for entry in entries {
            match Dependency::from_value(entry)? {
                Dependency::Plain(package) => {
                    let package = if self.remove_builds {
                        models::remove_build_string(&package).to_string()
                    } else {
                        package
                    };
                    if self.seen_plain.insert(package.clone()) {
                        self.resolved.push(Dependency::Plain(package));
                    }
                }
                Dependency::Nested {
                    ecosystem,
                    packages,
                } => self.absorb_nested(ecosystem, packages),
            }
        }
        Ok(())
    }

    fn absorb_nested(&mut self, ecosystem: String, packages: Vec<String>) {
        let slot = match self.nested_slots.get(&ecosystem) {
            Some(&slot) => slot,
            None => {
                self.resolved.push(Dependency::Nested {
                    ecosystem: ecosystem.clone(),
                    packages: Vec::new(),
                });
                let slot = self.resolved.len() - 1;
                self.nested_slots.insert(ecosystem, slot);
                slot
            }
        };
        let Dependency::Nested {
            packages: merged, ..
        } = &mut self.resolved[slot]
        else {
            unreachable!("nested_slots always points at a nested entry");
        };
        for package in packages {
            if !merged.contains(&package) {
                merged.push(package);
            }
        }
    }

    fn into_value(self) -> Option<Value> {
        self.present.then(|| {
            Value::Sequence(
                self.resolved
                    .into_iter()
                    .map(|dependency| dependency.to_value())
                    .collect(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).expect("Failed to parse test document")
    }

    fn merged_value(yamls: &[&str]) -> Value {
        let documents: Vec<Value> = yamls.iter().map(|y| doc(y)).collect();
        Value::Mapping(merge(&documents, false).expect("Failed to merge test documents"))
    }

    fn key_order(mapping: &Mapping) -> Vec<String> {
        mapping
            .iter()
            .map(|(key, _)| key.as_str().expect("non-string key").to_string())
            .collect()
    }

    #[test]
    fn test_single_document_is_normalized() {
        let merged = merged_value(&["name: app\ndependencies:\n- numpy\n- scipy\n- numpy"]);
        assert_eq!(merged, doc("name: app\ndependencies:\n- numpy\n- scipy"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let once = merged_value(&["channels:\n- defaults\ndependencies:\n- numpy\n- numpy"]);
        let twice = Value::Mapping(
            merge(&[once.clone(), once.clone()], false).expect("Failed to merge merged document"),
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn test_disjoint_dependencies_keep_document_order() {
        let merged = merged_value(&[
            "dependencies:\n- numpy\n- scipy",
            "dependencies:\n- pandas\n- flask",
        ]);
        assert_eq!(
            merged,
            doc("dependencies:\n- numpy\n- scipy\n- pandas\n- flask")
        );
    }

    #[test]
    fn test_duplicate_dependency_keeps_first_position() {
        let merged = merged_value(&[
            "dependencies:\n- numpy\n- scipy",
            "dependencies:\n- pandas\n- numpy",
        ]);
        assert_eq!(merged, doc("dependencies:\n- numpy\n- scipy\n- pandas"));
    }

    #[test]
    fn test_version_pins_are_opaque_strings() {
        // numpy and numpy=1.7 are different entries; no version parsing
        let merged = merged_value(&["dependencies:\n- numpy=1.7", "dependencies:\n- numpy"]);
        assert_eq!(merged, doc("dependencies:\n- numpy=1.7\n- numpy"));
    }

    #[test]
    fn test_last_name_wins() {
        let merged = merged_value(&["name: a", "name: b"]);
        assert_eq!(merged, doc("name: b"));
    }

    #[test]
    fn test_channels_concatenate_and_dedup() {
        let merged = merged_value(&["channels:\n- defaults", "channels:\n- conda-forge\n- defaults"]);
        assert_eq!(merged, doc("channels:\n- defaults\n- conda-forge"));
    }

    #[test]
    fn test_nested_ecosystems_merge_by_key() {
        let merged = merged_value(&[
            "dependencies:\n- pip:\n  - flask",
            "dependencies:\n- pip:\n  - requests\n  - flask",
        ]);
        assert_eq!(merged, doc("dependencies:\n- pip:\n  - flask\n  - requests"));
    }

    #[test]
    fn test_nested_entry_stays_at_first_seen_position() {
        let merged = merged_value(&[
            "dependencies:\n- numpy\n- pip:\n  - flask\n- scipy",
            "dependencies:\n- pandas\n- pip:\n  - requests",
        ]);
        assert_eq!(
            merged,
            doc("dependencies:\n- numpy\n- pip:\n  - flask\n  - requests\n- scipy\n- pandas")
        );
    }

    #[test]
    fn test_repeated_ecosystem_within_one_document() {
        let merged = merged_value(&[
            "dependencies:\n- pip:\n  - flask\n- numpy\n- pip:\n  - requests\n  - flask",
        ]);
        assert_eq!(
            merged,
            doc("dependencies:\n- pip:\n  - flask\n  - requests\n- numpy")
        );
    }

    #[test]
    fn test_remove_builds_collapses_build_pins() {
        let merged = merge(
            &[
                doc("dependencies:\n- certifi=2020.6.20=py38_0\n- ca-certificates=2020.10.14=0\n- xz"),
                doc("dependencies:\n- ca-certificates=2020.10.14=h06a4308_1\n- certifi=2021.5.30=py38h06a4308_0\n- xz=5.2.5"),
            ],
            true,
        )
        .expect("Failed to merge");
        // Conflicting certifi versions pass through; conda catches those
        assert_eq!(
            Value::Mapping(merged),
            doc("dependencies:\n- certifi=2020.6.20\n- ca-certificates=2020.10.14\n- xz\n- certifi=2021.5.30\n- xz=5.2.5")
        );
    }

    #[test]
    fn test_remove_builds_leaves_version_pins_and_pip_lists_alone() {
        let merged = merge(
            &[doc("dependencies:\n- b=2.0.*\n- a>=4\n- pip:\n  - x==1.0.0")],
            true,
        )
        .expect("Failed to merge");
        assert_eq!(
            Value::Mapping(merged),
            doc("dependencies:\n- b=2.0.*\n- a>=4\n- pip:\n  - x==1.0.0")
        );
    }

    #[test]
    fn test_end_to_end_scenario() {
        let merged = merged_value(&[
            "name: app\nchannels:\n- defaults\ndependencies:\n- numpy=1.7\n- scipy",
            "name: dev\ndependencies:\n- pandas\n- numpy=1.7",
        ]);
        assert_eq!(
            merged,
            doc("name: dev\nchannels:\n- defaults\ndependencies:\n- numpy=1.7\n- scipy\n- pandas")
        );
    }

    #[test]
    fn test_output_key_order_is_stable() {
        let merged = merge(
            &[
                doc("prefix: /opt/envs\ndependencies:\n- numpy"),
                doc("name: app\nchannels:\n- defaults\nvariables:\n  FOO: bar"),
            ],
            false,
        )
        .expect("Failed to merge");
        assert_eq!(
            key_order(&merged),
            vec!["name", "channels", "dependencies", "prefix", "variables"]
        );
    }

    #[test]
    fn test_unknown_keys_are_last_wins() {
        let merged = merged_value(&["prefix: /old\nvariables:\n  FOO: bar", "prefix: /new"]);
        assert_eq!(merged, doc("prefix: /new\nvariables:\n  FOO: bar"));
    }

    #[test]
    fn test_null_list_keys_are_treated_as_absent() {
        let merged = merged_value(&["channels:\ndependencies:", "dependencies:\n- numpy"]);
        assert_eq!(merged, doc("dependencies:\n- numpy"));
    }

    #[test]
    fn test_empty_dependency_list_is_kept() {
        let merged = merge(&[doc("dependencies: []")], false).expect("Failed to merge");
        assert_eq!(key_order(&merged), vec!["dependencies"]);
        assert_eq!(Value::Mapping(merged), doc("dependencies: []"));
    }

    #[test]
    fn test_document_must_be_a_mapping() {
        let result = merge(&[doc("- numpy")], false);
        assert_eq!(result, Err(MergeError::NotAMapping));
    }

    #[test]
    fn test_dependencies_must_be_a_sequence() {
        let result = merge(&[doc("dependencies: numpy")], false);
        assert_eq!(result, Err(MergeError::NotASequence(keys::DEPENDENCIES)));
    }

    #[test]
    fn test_channels_must_be_a_sequence() {
        let result = merge(&[doc("channels: defaults")], false);
        assert_eq!(result, Err(MergeError::NotASequence(keys::CHANNELS)));
    }

    #[test]
    fn test_channel_entries_must_be_strings() {
        let result = merge(&[doc("channels:\n- defaults\n- 1")], false);
        assert_eq!(result, Err(MergeError::NonStringChannel));
    }

    #[test]
    fn test_malformed_dependency_entry_fails_whole_merge() {
        let result = merge(
            &[
                doc("dependencies:\n- numpy"),
                doc("dependencies:\n- pip: [flask]\n  conda: [scipy]"),
            ],
            false,
        );
        assert_eq!(
            result,
            Err(MergeError::MalformedDependency(
                "a mapping with 2 keys".to_string()
            ))
        );
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let original = doc("name: app\ndependencies:\n- numpy\n- numpy");
        let inputs = vec![original.clone()];
        merge(&inputs, false).expect("Failed to merge");
        assert_eq!(inputs[0], original);
    }
}
