//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use hive_utils::tree::{DataPath, DataTree, SchemaPath};
use itertools::Itertools;
use serde_json::Value;

use crate::cache::ModificationCache;
use crate::debug::Debug;
use crate::error::Error;
use crate::handler::{ReadContext, Reader};
use crate::naming::MappingContext;
use crate::registry::Registry;

// ===== impl Registry =====

impl Registry {
    // Reads the complete operational state from the device.
    //
    // Readers are invoked in execution order, so that the instances of every
    // parent list are known before its children are enumerated. All readers
    // share a single modification cache, dropped once the read completes.
    pub async fn read_all(
        &self,
        scope: &MappingContext,
    ) -> Result<DataTree, Error> {
        let mut cache = ModificationCache::new();
        let mut ctx = ReadContext {
            mapping: scope,
            cache: &mut cache,
        };

        let mut tree = DataTree::new();
        for (path, handler) in self.iter() {
            let Some(reader) = &handler.reader else {
                continue;
            };
            let Some(node) = path.last() else {
                continue;
            };

            for parent in self.parent_instances(path, &tree) {
                Debug::ReadCallback(path, &parent).log();
                let instances = match reader
                    .list_keys(&parent, &mut ctx)
                    .await
                    .map_err(|error| Error::ReadFailed(parent.clone(), error))?
                {
                    Some(keys) => keys
                        .into_iter()
                        .unique()
                        .map(|key| parent.child(node, Some(&key)))
                        .collect::<Vec<_>>(),
                    None => vec![parent.child(node, None)],
                };

                for instance in instances {
                    let entries = self
                        .read_instance(path, reader.as_ref(), instance, &mut ctx)
                        .await?;
                    tree.extend(entries);
                }
            }
        }

        Ok(tree)
    }

    // Reads a single node from the device.
    pub async fn read(
        &self,
        path: &DataPath,
        scope: &MappingContext,
    ) -> Result<Option<Value>, Error> {
        let schema = path.schema();
        let (root, reader) = self
            .resolve(&schema)
            .and_then(|(root, handler)| Some((root, handler.reader.as_ref()?)))
            .ok_or_else(|| Error::MissingHandler(path.clone()))?;

        let mut cache = ModificationCache::new();
        let mut ctx = ReadContext {
            mapping: scope,
            cache: &mut cache,
        };

        // Handled children are read through their subtree root.
        let instance = path
            .cut(root)
            .ok_or_else(|| Error::MissingHandler(path.clone()))?;
        let value = self
            .read_instance(root, reader.as_ref(), instance, &mut ctx)
            .await?
            .into_iter()
            .find_map(|(entry, value)| (entry == *path).then_some(value));

        Ok(value)
    }

    // Reads one instance of a registered path. Subtree readers also return
    // the handled children found under it.
    async fn read_instance(
        &self,
        schema: &SchemaPath,
        reader: &dyn Reader,
        path: DataPath,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Vec<(DataPath, Value)>, Error> {
        let Some(value) = reader
            .read(&path, ctx)
            .await
            .map_err(|error| Error::ReadFailed(path.clone(), error))?
        else {
            return Ok(vec![]);
        };

        let mut entries = vec![];
        if self.is_subtree(schema) {
            let children = reader
                .read_subtree(&path, ctx)
                .await
                .map_err(|error| Error::ReadFailed(path.clone(), error))?;
            entries.extend(children.into_iter().filter(|(child, _)| {
                child.starts_with(&path)
                    && self.is_handled_child(&child.schema())
            }));
        }
        entries.insert(0, (path, value));

        Ok(entries)
    }

    // Returns the instance paths under which `schema` must be enumerated.
    //
    // Instances come from the closest ancestor known to the registry, which
    // has already been read. Unkeyed intermediate containers are implicit.
    fn parent_instances(
        &self,
        schema: &SchemaPath,
        tree: &DataTree,
    ) -> Vec<DataPath> {
        let Some(parent) = schema.parent() else {
            return vec![];
        };

        let nodes = parent.nodes().collect::<Vec<_>>();
        let mut anchor = Some(parent.clone());
        while let Some(path) = anchor {
            if path.is_empty() {
                break;
            }
            if self.rank(&path).is_some() {
                let suffix = &nodes[path.len()..];
                return tree
                    .paths()
                    .filter(|instance| instance.schema() == path)
                    .map(|instance| extend(instance.clone(), suffix))
                    .collect();
            }
            anchor = path.parent();
        }

        vec![extend(DataPath::root(), &nodes)]
    }
}

// ===== helper functions =====

fn extend(mut path: DataPath, nodes: &[&str]) -> DataPath {
    for node in nodes {
        path = path.child(node, None);
    }
    path
}
