//! Pure diff between the local mod inventory and the remote manifest.

use serde::Serialize;

use crate::core::hasher::Inventory;
use crate::core::remote::ModManifest;

/// Why a mod has to be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadReason {
    /// Not present locally (or unreadable).
    Missing,
    /// Present, but its digest differs from the manifest.
    Outdated,
}

/// What to do with one mod file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ModDecision {
    Keep { name: String },
    Download { name: String, reason: DownloadReason },
    Delete { name: String },
}

impl ModDecision {
    pub fn name(&self) -> &str {
        match self {
            ModDecision::Keep { name }
            | ModDecision::Download { name, .. }
            | ModDecision::Delete { name } => name,
        }
    }
}

/// Decide every mod, deletions first, then the manifest's names in order.
///
/// `local` is what [`local_inventory`](crate::core::hasher::local_inventory)
/// found; a file without a digest never counts as up to date.
pub fn plan(local: &Inventory, remote: &ModManifest) -> Vec<ModDecision> {
    let mut decisions: Vec<ModDecision> = local
        .keys()
        .filter(|name| !remote.contains(name))
        .map(|name| ModDecision::Delete { name: name.clone() })
        .collect();

    for (name, digest) in remote.iter() {
        let name = name.to_string();
        let decision = match local.get(&name) {
            Some(Some(local_digest)) if local_digest == digest => ModDecision::Keep { name },
            Some(Some(_)) => ModDecision::Download {
                name,
                reason: DownloadReason::Outdated,
            },
            Some(None) | None => ModDecision::Download {
                name,
                reason: DownloadReason::Missing,
            },
        };
        decisions.push(decision);
    }

    decisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn inventory_of(pairs: &[(&str, &str)]) -> Inventory {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect()
    }

    #[test]
    fn example_scenario() {
        let local = inventory_of(&[("a.jar", "h1"), ("b.jar", "h2")]);
        let remote = ModManifest::new(map(&[("b.jar", "h2"), ("c.jar", "h3")]));

        assert_eq!(
            plan(&local, &remote),
            vec![
                ModDecision::Delete {
                    name: "a.jar".into()
                },
                ModDecision::Keep {
                    name: "b.jar".into()
                },
                ModDecision::Download {
                    name: "c.jar".into(),
                    reason: DownloadReason::Missing
                },
            ]
        );
    }

    #[test]
    fn digest_change_is_outdated() {
        let local = inventory_of(&[("a.jar", "old")]);
        let remote = ModManifest::new(map(&[("a.jar", "new")]));
        assert_eq!(
            plan(&local, &remote),
            vec![ModDecision::Download {
                name: "a.jar".into(),
                reason: DownloadReason::Outdated
            }]
        );
    }

    #[test]
    fn empty_manifest_deletes_everything() {
        let local = inventory_of(&[("a.jar", "h1"), ("b.jar", "h2")]);
        let decisions = plan(&local, &ModManifest::default());
        assert!(decisions
            .iter()
            .all(|d| matches!(d, ModDecision::Delete { .. })));
        assert_eq!(decisions.len(), 2);
    }

    #[test]
    fn unreadable_files_are_replaced_or_removed() {
        let local: Inventory = [("a.jar".to_string(), None), ("x.jar".to_string(), None)]
            .into_iter()
            .collect();
        let remote = ModManifest::new(map(&[("a.jar", "h1")]));

        assert_eq!(
            plan(&local, &remote),
            vec![
                ModDecision::Delete {
                    name: "x.jar".into()
                },
                ModDecision::Download {
                    name: "a.jar".into(),
                    reason: DownloadReason::Missing
                },
            ]
        );
    }

    fn local_files() -> impl Strategy<Value = Inventory> {
        prop::collection::btree_map("[a-e]\\.jar", prop::option::of("[0-2]"), 0..5)
    }

    fn manifest_entries() -> impl Strategy<Value = BTreeMap<String, String>> {
        prop::collection::btree_map("[a-e]\\.jar", "[0-2]", 0..5)
    }

    proptest! {
        #[test]
        fn decisions_partition_the_union(local in local_files(), remote in manifest_entries()) {
            let manifest = ModManifest::new(remote.clone());
            let decisions = plan(&local, &manifest);

            let mut keep = BTreeSet::new();
            let mut download = BTreeSet::new();
            let mut delete = BTreeSet::new();
            for d in &decisions {
                let inserted = match d {
                    ModDecision::Keep { name } => keep.insert(name.clone()),
                    ModDecision::Download { name, .. } => download.insert(name.clone()),
                    ModDecision::Delete { name } => delete.insert(name.clone()),
                };
                prop_assert!(inserted);
            }

            let expected_delete: BTreeSet<String> =
                local.keys().filter(|k| !remote.contains_key(*k)).cloned().collect();
            let expected_download: BTreeSet<String> = remote
                .iter()
                .filter(|(k, v)| local.get(*k).and_then(|d| d.as_deref()) != Some(v.as_str()))
                .map(|(k, _)| k.clone())
                .collect();
            let expected_keep: BTreeSet<String> = remote
                .iter()
                .filter(|(k, v)| local.get(*k).and_then(|d| d.as_deref()) == Some(v.as_str()))
                .map(|(k, _)| k.clone())
                .collect();

            prop_assert_eq!(&delete, &expected_delete);
            prop_assert_eq!(&download, &expected_download);
            prop_assert_eq!(&keep, &expected_keep);

            let union: BTreeSet<String> = local.keys().chain(remote.keys()).cloned().collect();
            prop_assert_eq!(decisions.len(), union.len());

            let first_non_delete = decisions
                .iter()
                .position(|d| !matches!(d, ModDecision::Delete { .. }))
                .unwrap_or(decisions.len());
            let deletes_first = decisions[first_non_delete..]
                .iter()
                .all(|d| !matches!(d, ModDecision::Delete { .. }));
            prop_assert!(deletes_first);
        }
    }
}
