//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Reverse;
use std::collections::BTreeMap;

use hive_utils::tree::{DataPath, DataTree};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::debug::Debug;
use crate::error::Error;
use crate::registry::Registry;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// Difference between two snapshots for one handler instance.
///
/// For subtree handlers `path` is the subtree root instance and the values
/// are those of the root node, even when only handled children changed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Change {
    pub path: DataPath,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

#[derive(Debug, Default)]
struct Instance {
    rank: usize,
    // Set when a handled child changed.
    nested: bool,
}

// ===== impl Change =====

impl Change {
    pub fn operation(&self) -> Operation {
        match (&self.before, &self.after) {
            (None, _) => Operation::Create,
            (Some(_), Some(_)) => Operation::Update,
            (Some(_), None) => Operation::Delete,
        }
    }
}

// ===== global functions =====

// Computes the ordered list of changes required to move the device from the
// `before` snapshot to the `after` snapshot.
//
// Deletes come first, in reverse execution order, so that dependents are
// removed before the entities they reference. Creates and updates follow in
// execution order. Within the same handler, instances are sorted by path.
pub fn compute(
    registry: &Registry,
    before: &DataTree,
    after: &DataTree,
) -> Result<Vec<Change>, Error> {
    let mut instances: BTreeMap<DataPath, Instance> = BTreeMap::new();
    for path in changed_paths(before, after) {
        let schema = path.schema();
        let (root, handler) = registry
            .resolve(&schema)
            .ok_or_else(|| Error::MissingHandler(path.clone()))?;
        if handler.writer.is_none() {
            return Err(Error::MissingHandler(path.clone()));
        }
        let rank = registry
            .rank(root)
            .ok_or_else(|| Error::MissingHandler(path.clone()))?;
        let instance = path
            .cut(root)
            .ok_or_else(|| Error::MissingHandler(path.clone()))?;

        let nested = instance != *path;
        let entry = instances.entry(instance).or_default();
        entry.rank = rank;
        entry.nested |= nested;
    }

    let mut deletes = vec![];
    let mut others = vec![];
    for (path, instance) in instances {
        let before_value = root_value(before, &path);
        let after_value = root_value(after, &path);
        if before_value == after_value && !instance.nested {
            continue;
        }

        let change = Change {
            path,
            before: before_value,
            after: after_value,
        };
        match (&change.before, &change.after) {
            (None, None) => continue,
            (Some(_), None) => deletes.push((instance.rank, change)),
            _ => others.push((instance.rank, change)),
        }
    }

    deletes.sort_by(|(rank_a, a), (rank_b, b)| {
        (Reverse(rank_a), Reverse(&a.path))
            .cmp(&(Reverse(rank_b), Reverse(&b.path)))
    });
    others.sort_by(|(rank_a, a), (rank_b, b)| {
        (rank_a, &a.path).cmp(&(rank_b, &b.path))
    });

    let changes = deletes
        .into_iter()
        .chain(others)
        .map(|(_, change)| change)
        .collect::<Vec<_>>();
    Debug::ChangesComputed(changes.len()).log();

    Ok(changes)
}

// ===== helper functions =====

// Paths whose value differs between the two snapshots.
fn changed_paths<'a>(
    before: &'a DataTree,
    after: &'a DataTree,
) -> impl Iterator<Item = &'a DataPath> + 'a {
    let removed_or_updated = before
        .iter()
        .filter(move |(path, value)| after.get(path) != Some(*value))
        .map(|(path, _)| path);
    let added = after
        .paths()
        .filter(move |path| !before.contains(path));
    removed_or_updated.chain(added)
}

// Value of a handler instance in a snapshot. A subtree root that is absent
// while some of its children are present is considered an empty node.
fn root_value(tree: &DataTree, path: &DataPath) -> Option<Value> {
    match tree.get(path) {
        Some(value) => Some(value.clone()),
        None => tree.subtree(path).next().map(|_| Value::Null),
    }
}

// ===== unit tests =====
