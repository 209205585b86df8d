//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use hive_utils::tree::SchemaPath;

use crate::debug::Debug;
use crate::error::{ConfigError, Error};
use crate::handler::{Reader, Writer};

/// Reader and writer bound to one registered path.
#[derive(Clone, Default)]
pub struct Handler {
    pub writer: Option<Arc<dyn Writer>>,
    pub reader: Option<Arc<dyn Reader>>,
}

/// Immutable collection of handlers sorted in execution order.
///
/// Creates and updates run in `order()`. Deletes run in the reverse order.
pub struct Registry {
    entries: Vec<Entry>,
    // Registered path -> position in `entries`.
    ranks: HashMap<SchemaPath, usize>,
    // Handled child path -> position of the owning subtree root.
    owners: HashMap<SchemaPath, usize>,
}

#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<Entry>,
    // (preceding path, following path)
    edges: Vec<(SchemaPath, SchemaPath)>,
}

struct Entry {
    path: SchemaPath,
    handler: Handler,
    children: BTreeSet<SchemaPath>,
}

// ===== impl Handler =====

impl Handler {
    // Creates a handler from a type acting both as reader and writer.
    pub fn new<T>(handler: T) -> Handler
    where
        T: Reader + Writer + 'static,
    {
        let handler = Arc::new(handler);
        Handler {
            writer: Some(handler.clone()),
            reader: Some(handler),
        }
    }

    pub fn writer<T: Writer + 'static>(writer: T) -> Handler {
        Handler::default().with_writer(writer)
    }

    pub fn reader<T: Reader + 'static>(reader: T) -> Handler {
        Handler::default().with_reader(reader)
    }

    #[must_use]
    pub fn with_writer<T: Writer + 'static>(mut self, writer: T) -> Handler {
        self.writer = Some(Arc::new(writer));
        self
    }

    #[must_use]
    pub fn with_reader<T: Reader + 'static>(mut self, reader: T) -> Handler {
        self.reader = Some(Arc::new(reader));
        self
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("writer", &self.writer.is_some())
            .field("reader", &self.reader.is_some())
            .finish()
    }
}

// ===== impl RegistryBuilder =====

impl RegistryBuilder {
    pub fn new() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    #[must_use]
    pub fn register(
        mut self,
        path: impl Into<SchemaPath>,
        handler: Handler,
    ) -> RegistryBuilder {
        self.entries.push(Entry {
            path: path.into(),
            handler,
            children: Default::default(),
        });
        self
    }

    // Registers a handler that also owns the given descendant paths. Those
    // paths are never dispatched on their own.
    #[must_use]
    pub fn register_subtree<I, P>(
        mut self,
        path: impl Into<SchemaPath>,
        children: I,
        handler: Handler,
    ) -> RegistryBuilder
    where
        I: IntoIterator<Item = P>,
        P: Into<SchemaPath>,
    {
        self.entries.push(Entry {
            path: path.into(),
            handler,
            children: children.into_iter().map(Into::into).collect(),
        });
        self
    }

    // Declares that `path` is processed before each of `others`.
    #[must_use]
    pub fn register_before<I, P>(
        mut self,
        path: impl Into<SchemaPath>,
        others: I,
    ) -> RegistryBuilder
    where
        I: IntoIterator<Item = P>,
        P: Into<SchemaPath>,
    {
        let path = path.into();
        for other in others {
            self.edges.push((path.clone(), other.into()));
        }
        self
    }

    // Declares that `path` is processed after each of `others`.
    #[must_use]
    pub fn register_after<I, P>(
        mut self,
        path: impl Into<SchemaPath>,
        others: I,
    ) -> RegistryBuilder
    where
        I: IntoIterator<Item = P>,
        P: Into<SchemaPath>,
    {
        let path = path.into();
        for other in others {
            self.edges.push((other.into(), path.clone()));
        }
        self
    }

    // Validates all registrations and computes the execution order.
    pub fn build(self) -> Result<Registry, Error> {
        let (ranks, owners) = self.check_paths()?;
        let owner = |path: &SchemaPath| {
            ranks.get(path).or_else(|| owners.get(path)).copied()
        };

        // Declared ordering constraints.
        let mut edges = BTreeSet::new();
        for (from, to) in &self.edges {
            let from_idx = owner(from)
                .ok_or_else(|| ConfigError::UnknownPath(from.clone()))?;
            let to_idx =
                owner(to).ok_or_else(|| ConfigError::UnknownPath(to.clone()))?;
            if from_idx == to_idx {
                let path = self.entries[from_idx].path.clone();
                return Err(ConfigError::Cycle(vec![path]).into());
            }
            edges.insert((from_idx, to_idx));
        }

        // Natural ordering: parents before their descendants.
        for (idx, entry) in self.entries.iter().enumerate() {
            let mut parent = entry.path.parent();
            while let Some(path) = parent {
                if let Some(parent_idx) = owner(&path) {
                    if parent_idx != idx {
                        edges.insert((parent_idx, idx));
                    }
                    break;
                }
                parent = path.parent();
            }
        }

        let order = topological_sort(self.entries.len(), &edges)
            .map_err(|remaining| {
                let paths = remaining
                    .into_iter()
                    .map(|idx| self.entries[idx].path.clone())
                    .collect();
                ConfigError::Cycle(paths)
            })?;

        // Reorder entries by rank.
        let mut slots = self.entries.into_iter().map(Some).collect::<Vec<_>>();
        let entries = order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect::<Vec<_>>();
        let registry = Registry::new(entries);
        let order = registry.order().cloned().collect::<Vec<_>>();
        Debug::RegistryBuilt(&order).log();

        Ok(registry)
    }

    // Checks registered and handled paths for duplicates and overlaps.
    //
    // Returns the registration index of every registered path and of every
    // handled child's owner.
    fn check_paths(
        &self,
    ) -> Result<(HashMap<SchemaPath, usize>, HashMap<SchemaPath, usize>), Error>
    {
        let mut ranks = HashMap::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            if ranks.insert(entry.path.clone(), idx).is_some() {
                return Err(ConfigError::DuplicatePath(entry.path.clone()).into());
            }
        }

        let mut owners = HashMap::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            for child in &entry.children {
                if !entry.path.is_ancestor_of(child) {
                    return Err(ConfigError::InvalidSubtreeChild(
                        entry.path.clone(),
                        child.clone(),
                    )
                    .into());
                }
                if ranks.contains_key(child)
                    || owners.insert(child.clone(), idx).is_some()
                {
                    return Err(ConfigError::SubtreeOverlap(child.clone()).into());
                }
            }
        }

        // Registered paths can't live below a handled child.
        for entry in &self.entries {
            if owners.keys().any(|child| child.is_ancestor_of(&entry.path)) {
                return Err(
                    ConfigError::SubtreeOverlap(entry.path.clone()).into()
                );
            }
        }

        Ok((ranks, owners))
    }
}

// ===== impl Registry =====

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    fn new(entries: Vec<Entry>) -> Registry {
        let mut ranks = HashMap::new();
        let mut owners = HashMap::new();
        for (rank, entry) in entries.iter().enumerate() {
            ranks.insert(entry.path.clone(), rank);
            for child in &entry.children {
                owners.insert(child.clone(), rank);
            }
        }

        Registry {
            entries,
            ranks,
            owners,
        }
    }

    // Returns the registered path and handler responsible for `path`, which
    // may be the root of a subtree handling it.
    pub fn resolve(&self, path: &SchemaPath) -> Option<(&SchemaPath, &Handler)> {
        let entry = &self.entries[self.rank(path)?];
        Some((&entry.path, &entry.handler))
    }

    // Position of the handler responsible for `path` in the execution order.
    pub fn rank(&self, path: &SchemaPath) -> Option<usize> {
        self.ranks
            .get(path)
            .or_else(|| self.owners.get(path))
            .copied()
    }

    // Registered paths in execution order.
    pub fn order(&self) -> impl Iterator<Item = &SchemaPath> {
        self.entries.iter().map(|entry| &entry.path)
    }

    // Paths owned by subtree handlers.
    pub fn handled_paths(&self) -> impl Iterator<Item = &SchemaPath> {
        self.entries.iter().flat_map(|entry| entry.children.iter())
    }

    pub fn is_handled_child(&self, path: &SchemaPath) -> bool {
        self.owners.contains_key(path)
    }

    pub fn is_subtree(&self, path: &SchemaPath) -> bool {
        self.ranks
            .get(path)
            .is_some_and(|rank| !self.entries[*rank].children.is_empty())
    }

    pub(crate) fn iter(
        &self,
    ) -> impl Iterator<Item = (&SchemaPath, &Handler)> {
        self.entries.iter().map(|entry| (&entry.path, &entry.handler))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.order()).finish()
    }
}

// ===== helper functions =====

// Kahn's algorithm. Nodes that become ready at the same time are emitted in
// registration order. On failure returns the nodes left in a cycle.
fn topological_sort(
    count: usize,
    edges: &BTreeSet<(usize, usize)>,
) -> Result<Vec<usize>, Vec<usize>> {
    let mut indegree = vec![0usize; count];
    let mut successors: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (from, to) in edges {
        indegree[*to] += 1;
        successors.entry(*from).or_default().push(*to);
    }

    let mut ready = (0..count)
        .filter(|idx| indegree[*idx] == 0)
        .collect::<BTreeSet<_>>();
    let mut order = Vec::with_capacity(count);
    while let Some(idx) = ready.pop_first() {
        order.push(idx);
        for next in successors.get(&idx).into_iter().flatten() {
            indegree[*next] -= 1;
            if indegree[*next] == 0 {
                ready.insert(*next);
            }
        }
    }

    if order.len() < count {
        let remaining = (0..count).filter(|idx| indegree[*idx] > 0).collect();
        return Err(remaining);
    }

    Ok(order)
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kahn_registration_tie_break() {
        let edges = [(2, 0)].into_iter().collect();
        assert_eq!(topological_sort(3, &edges), Ok(vec![1, 2, 0]));
    }

    #[test]
    fn kahn_cycle() {
        let edges = [(0, 1), (1, 2), (2, 1)].into_iter().collect();
        assert_eq!(topological_sort(4, &edges), Err(vec![1, 2]));
    }
}
