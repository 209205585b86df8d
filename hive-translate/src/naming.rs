//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use hive_utils::{Database, DatabaseError};
use pickledb::PickleDb;
use serde::{Deserialize, Serialize};

use crate::debug::Debug;
use crate::error::MappingError;

/// Persistent scope backing every naming context.
///
/// All mutations go straight to the underlying store, so they are visible to
/// every later lookup (including lookups made by subsequent changes of the
/// same transaction) and survive a restart when the store dumps to disk.
#[derive(Clone)]
pub struct MappingContext {
    db: Database,
}

/// Bidirectional mapping between logical names and device indexes.
#[derive(Clone, Debug)]
pub struct NamingContext {
    artificial_prefix: String,
    instance: String,
}

/// One-to-many mapping between a parent name and indexed child names.
#[derive(Clone, Debug)]
pub struct MultiNamingContext {
    instance: String,
    start_index: u32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
struct ChildEntry {
    index: u32,
    name: String,
}

// ===== impl MappingContext =====

impl MappingContext {
    pub fn new(db: Database) -> MappingContext {
        MappingContext { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl std::fmt::Debug for MappingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingContext").finish_non_exhaustive()
    }
}

// ===== impl NamingContext =====

impl NamingContext {
    pub fn new(artificial_prefix: &str, instance: &str) -> NamingContext {
        NamingContext {
            artificial_prefix: artificial_prefix.to_owned(),
            instance: instance.to_owned(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    // Returns the device index mapped to `name`.
    pub fn get_index(
        &self,
        name: &str,
        scope: &MappingContext,
    ) -> Result<u32, MappingError> {
        let db = scope.db.lock().unwrap();
        db.get::<u32>(&self.name_key(name)).ok_or_else(|| {
            MappingError::UnknownName(self.instance.clone(), name.to_owned())
        })
    }

    // Returns the name mapped to `index`.
    //
    // Device objects that were never configured through a writer (e.g.
    // physical interfaces learned while reading) get an artificial name,
    // which is registered so that later lookups are stable.
    pub fn get_name(
        &self,
        index: u32,
        scope: &MappingContext,
    ) -> Result<String, MappingError> {
        let mut db = scope.db.lock().unwrap();
        if let Some(name) = db.get::<String>(&self.index_key(index)) {
            return Ok(name);
        }

        let name = format!("{}{}", self.artificial_prefix, index);
        self.insert(&mut db, &name, index)?;
        Ok(name)
    }

    pub fn get_name_if_present(
        &self,
        index: u32,
        scope: &MappingContext,
    ) -> Option<String> {
        let db = scope.db.lock().unwrap();
        db.get::<String>(&self.index_key(index))
    }

    // Checks whether a name is mapped to `index`.
    pub fn contains_name(&self, index: u32, scope: &MappingContext) -> bool {
        let db = scope.db.lock().unwrap();
        db.exists(&self.index_key(index))
    }

    // Checks whether an index is mapped to `name`.
    pub fn contains_index(&self, name: &str, scope: &MappingContext) -> bool {
        let db = scope.db.lock().unwrap();
        db.exists(&self.name_key(name))
    }

    // Registers a new name <-> index pair.
    //
    // Registering an identical pair again is a no-op. A pair that conflicts
    // with an existing entry is rejected and nothing is modified.
    pub fn add_name(
        &self,
        index: u32,
        name: &str,
        scope: &MappingContext,
    ) -> Result<(), MappingError> {
        let mut db = scope.db.lock().unwrap();
        self.insert(&mut db, name, index)
    }

    // Registers `name` under the next free index, returning the index.
    //
    // An already mapped name keeps its index.
    pub fn add_name_next(
        &self,
        name: &str,
        scope: &MappingContext,
    ) -> Result<u32, MappingError> {
        let mut db = scope.db.lock().unwrap();
        if let Some(index) = db.get::<u32>(&self.name_key(name)) {
            return Ok(index);
        }

        let prefix = self.index_prefix();
        let index = db
            .get_all()
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|index| index.parse::<u32>().ok())
            .max()
            .map_or(Some(0), |max| max.checked_add(1))
            .ok_or_else(|| {
                MappingError::InvalidIndex(self.instance.clone(), u32::MAX)
            })?;
        self.insert(&mut db, name, index)?;
        Ok(index)
    }

    // Removes the mapping for `name`, if any.
    pub fn remove_name(
        &self,
        name: &str,
        scope: &MappingContext,
    ) -> Result<(), MappingError> {
        let mut db = scope.db.lock().unwrap();
        let name_key = self.name_key(name);
        let Some(index) = db.get::<u32>(&name_key) else {
            return Ok(());
        };

        db.rem(&name_key).map_err(store_error)?;
        db.rem(&self.index_key(index)).map_err(store_error)?;
        Debug::MappingDel(&self.instance, name, index).log();
        Ok(())
    }

    // Returns all (name, index) pairs, sorted by name.
    pub fn entries(&self, scope: &MappingContext) -> Vec<(String, u32)> {
        let db = scope.db.lock().unwrap();
        let prefix = self.name_prefix();
        let mut entries = db
            .get_all()
            .into_iter()
            .filter_map(|key| {
                let name = key.strip_prefix(&prefix)?.to_owned();
                let index = db.get::<u32>(&key)?;
                Some((name, index))
            })
            .collect::<Vec<_>>();
        entries.sort();
        entries
    }

    fn insert(
        &self,
        db: &mut PickleDb,
        name: &str,
        index: u32,
    ) -> Result<(), MappingError> {
        let name_key = self.name_key(name);
        let index_key = self.index_key(index);
        match (db.get::<u32>(&name_key), db.get::<String>(&index_key)) {
            (None, None) => (),
            (Some(old_index), Some(old_name))
                if old_index == index && old_name == name =>
            {
                return Ok(());
            }
            _ => {
                return Err(MappingError::Conflict(
                    self.instance.clone(),
                    name.to_owned(),
                    index,
                ));
            }
        }

        db.set(&name_key, &index).map_err(store_error)?;
        if let Err(error) = db.set(&index_key, &name) {
            let _ = db.rem(&name_key);
            return Err(store_error(error));
        }
        Debug::MappingAdd(&self.instance, name, index).log();
        Ok(())
    }

    fn name_prefix(&self) -> String {
        format!("naming-context/{}/name/", self.instance)
    }

    fn index_prefix(&self) -> String {
        format!("naming-context/{}/index/", self.instance)
    }

    fn name_key(&self, name: &str) -> String {
        format!("{}{}", self.name_prefix(), name)
    }

    fn index_key(&self, index: u32) -> String {
        format!("{}{}", self.index_prefix(), index)
    }
}

// ===== impl MultiNamingContext =====

impl MultiNamingContext {
    pub fn new(instance: &str, start_index: u32) -> MultiNamingContext {
        MultiNamingContext {
            instance: instance.to_owned(),
            start_index,
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    // Maps a child name to `index` under `parent`.
    pub fn add_child(
        &self,
        parent: &str,
        index: u32,
        name: &str,
        scope: &MappingContext,
    ) -> Result<(), MappingError> {
        if index < self.start_index {
            return Err(MappingError::InvalidIndex(self.instance.clone(), index));
        }

        let mut db = scope.db.lock().unwrap();
        let key = self.parent_key(parent);
        let mut children = db.get::<Vec<ChildEntry>>(&key).unwrap_or_default();
        for child in &children {
            if child.index == index && child.name == name {
                return Ok(());
            }
            if child.index == index || child.name == name {
                return Err(MappingError::Conflict(
                    self.instance.clone(),
                    name.to_owned(),
                    index,
                ));
            }
        }

        children.push(ChildEntry {
            index,
            name: name.to_owned(),
        });
        db.set(&key, &children).map_err(store_error)?;
        Debug::MappingAdd(&self.instance, name, index).log();
        Ok(())
    }

    // Maps a child name under `parent` to the next free index, returning it.
    pub fn add_child_next(
        &self,
        parent: &str,
        name: &str,
        scope: &MappingContext,
    ) -> Result<u32, MappingError> {
        let index = {
            let db = scope.db.lock().unwrap();
            let children = db
                .get::<Vec<ChildEntry>>(&self.parent_key(parent))
                .unwrap_or_default();
            if let Some(child) = children.iter().find(|child| child.name == name)
            {
                return Ok(child.index);
            }
            children
                .iter()
                .map(|child| child.index)
                .max()
                .map_or(Some(self.start_index), |max| max.checked_add(1))
                .ok_or_else(|| {
                    MappingError::InvalidIndex(self.instance.clone(), u32::MAX)
                })?
        };
        self.add_child(parent, index, name, scope)?;
        Ok(index)
    }

    pub fn get_child_name(
        &self,
        parent: &str,
        index: u32,
        scope: &MappingContext,
    ) -> Result<String, MappingError> {
        self.children(parent, scope)
            .into_iter()
            .find(|(child_index, _)| *child_index == index)
            .map(|(_, name)| name)
            .ok_or_else(|| {
                MappingError::UnknownIndex(self.instance.clone(), index)
            })
    }

    pub fn get_child_index(
        &self,
        parent: &str,
        name: &str,
        scope: &MappingContext,
    ) -> Result<u32, MappingError> {
        self.children(parent, scope)
            .into_iter()
            .find(|(_, child_name)| child_name == name)
            .map(|(index, _)| index)
            .ok_or_else(|| {
                MappingError::UnknownName(self.instance.clone(), name.to_owned())
            })
    }

    // Removes a child mapping. Unknown parents and children are ignored.
    pub fn remove_child(
        &self,
        parent: &str,
        name: &str,
        scope: &MappingContext,
    ) -> Result<(), MappingError> {
        let mut db = scope.db.lock().unwrap();
        let key = self.parent_key(parent);
        let Some(mut children) = db.get::<Vec<ChildEntry>>(&key) else {
            return Ok(());
        };
        let Some(pos) = children.iter().position(|child| child.name == name)
        else {
            return Ok(());
        };

        let child = children.remove(pos);
        if children.is_empty() {
            db.rem(&key).map_err(store_error)?;
        } else {
            db.set(&key, &children).map_err(store_error)?;
        }
        Debug::MappingDel(&self.instance, &child.name, child.index).log();
        Ok(())
    }

    // Returns the (index, name) children of `parent`, sorted by index.
    pub fn children(
        &self,
        parent: &str,
        scope: &MappingContext,
    ) -> Vec<(u32, String)> {
        let db = scope.db.lock().unwrap();
        let mut children = db
            .get::<Vec<ChildEntry>>(&self.parent_key(parent))
            .unwrap_or_default()
            .into_iter()
            .map(|child| (child.index, child.name))
            .collect::<Vec<_>>();
        children.sort();
        children
    }

    fn parent_key(&self, parent: &str) -> String {
        format!("multi-naming-context/{}/{}", self.instance, parent)
    }
}

// ===== helper functions =====

fn store_error(error: DatabaseError) -> MappingError {
    MappingError::Store(error.to_string())
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use pickledb::{PickleDbDumpPolicy, SerializationMethod};

    use super::*;

    fn scope() -> MappingContext {
        let db = PickleDb::new(
            "naming-test.db",
            PickleDbDumpPolicy::NeverDump,
            SerializationMethod::Bin,
        );
        MappingContext::new(Arc::new(Mutex::new(db)))
    }

    #[test]
    fn artificial_name() {
        let scope = scope();
        let ctx = NamingContext::new("eth", "interface-context");

        assert_eq!(ctx.get_name_if_present(3, &scope), None);
        assert_eq!(ctx.get_name(3, &scope).unwrap(), "eth3");
        assert_eq!(ctx.get_index("eth3", &scope), Ok(3));

        // The artificial name is taken by another index.
        ctx.remove_name("eth3", &scope).unwrap();
        ctx.add_name(7, "eth3", &scope).unwrap();
        assert!(matches!(
            ctx.get_name(3, &scope),
            Err(MappingError::Conflict(..))
        ));
    }

    #[test]
    fn next_index() {
        let scope = scope();
        let ctx = NamingContext::new("bd", "bridge-domain-context");

        assert_eq!(ctx.add_name_next("bd-a", &scope), Ok(0));
        assert_eq!(ctx.add_name_next("bd-b", &scope), Ok(1));
        assert_eq!(ctx.add_name_next("bd-a", &scope), Ok(0));
        ctx.add_name(10, "bd-c", &scope).unwrap();
        assert_eq!(ctx.add_name_next("bd-d", &scope), Ok(11));
    }

    #[test]
    fn next_index_exhausted() {
        let scope = scope();
        let ctx = NamingContext::new("bd", "bridge-domain-context");
        let exhausted = MappingError::InvalidIndex(
            "bridge-domain-context".to_owned(),
            u32::MAX,
        );

        assert_eq!(ctx.get_name(u32::MAX, &scope).unwrap(), "bd4294967295");
        assert_eq!(ctx.add_name_next("bd-a", &scope), Err(exhausted));
        assert!(!ctx.contains_index("bd-a", &scope));

        let multi = MultiNamingContext::new("sub-interface-context", 1);
        let exhausted = MappingError::InvalidIndex(
            "sub-interface-context".to_owned(),
            u32::MAX,
        );
        multi.add_child("eth0", u32::MAX, "eth0.x", &scope).unwrap();
        assert_eq!(
            multi.add_child_next("eth0", "eth0.y", &scope),
            Err(exhausted)
        );
        assert_eq!(multi.children("eth0", &scope).len(), 1);
    }

    #[test]
    fn contexts_are_isolated() {
        let scope = scope();
        let interfaces = NamingContext::new("if", "interface-context");
        let domains = NamingContext::new("bd", "bridge-domain-context");

        interfaces.add_name(1, "eth0", &scope).unwrap();
        domains.add_name(1, "eth0", &scope).unwrap();
        interfaces.remove_name("eth0", &scope).unwrap();
        assert_eq!(domains.get_index("eth0", &scope), Ok(1));
        assert_eq!(domains.entries(&scope), vec![("eth0".to_owned(), 1)]);
    }

    #[test]
    fn multi_naming() {
        let scope = scope();
        let ctx = MultiNamingContext::new("sub-interface-context", 1);

        assert_eq!(
            ctx.add_child("eth0", 0, "eth0.0", &scope),
            Err(MappingError::InvalidIndex(
                "sub-interface-context".to_owned(),
                0
            ))
        );
        assert_eq!(ctx.add_child_next("eth0", "eth0.1", &scope), Ok(1));
        assert_eq!(ctx.add_child_next("eth0", "eth0.2", &scope), Ok(2));
        assert!(ctx.add_child("eth0", 2, "eth0.x", &scope).is_err());
        assert_eq!(ctx.get_child_index("eth0", "eth0.2", &scope), Ok(2));
        assert_eq!(
            ctx.get_child_name("eth0", 1, &scope),
            Ok("eth0.1".to_owned())
        );

        ctx.remove_child("eth0", "eth0.1", &scope).unwrap();
        ctx.remove_child("eth0", "eth0.2", &scope).unwrap();
        ctx.remove_child("eth1", "eth1.1", &scope).unwrap();
        assert!(ctx.children("eth0", &scope).is_empty());
        assert!(
            !scope
                .database()
                .lock()
                .unwrap()
                .exists("multi-naming-context/sub-interface-context/eth0")
        );
    }
}
