//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use async_trait::async_trait;
use hive_utils::tree::{DataPath, DataTree};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::ModificationCache;
use crate::error::HandlerError;
use crate::naming::MappingContext;

/// State shared by all writers taking part in one write transaction.
#[derive(Debug)]
pub struct WriteContext<'a> {
    pub mapping: &'a MappingContext,
    pub cache: &'a mut ModificationCache,
    pub before: &'a DataTree,
    pub after: &'a DataTree,
}

/// State shared by all readers taking part in one read transaction.
#[derive(Debug)]
pub struct ReadContext<'a> {
    pub mapping: &'a MappingContext,
    pub cache: &'a mut ModificationCache,
}

/// Translates configuration changes of one node type into device calls.
///
/// Writers of subtree handlers receive the value of the subtree root and are
/// expected to collect the handled children from the snapshots in the
/// [`WriteContext`].
#[async_trait]
pub trait Writer: Send + Sync {
    // Checks a node that is about to be created or updated. Runs before any
    // device call of the transaction is made.
    fn validate(
        &self,
        _path: &DataPath,
        _after: &Value,
        _config: &DataTree,
    ) -> Result<(), String> {
        Ok(())
    }

    async fn create(
        &self,
        path: &DataPath,
        after: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError>;

    async fn update(
        &self,
        path: &DataPath,
        _before: &Value,
        _after: &Value,
        _ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        Err(HandlerError::Unsupported(format!(
            "update of {} is not supported, delete it first",
            path.schema()
        )))
    }

    async fn delete(
        &self,
        path: &DataPath,
        before: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError>;
}

/// Reassembles device state of one node type into tree form.
#[async_trait]
pub trait Reader: Send + Sync {
    // Returns the keys of all list entries under `parent`, or `None` if the
    // node isn't a list.
    async fn list_keys(
        &self,
        _parent: &DataPath,
        _ctx: &mut ReadContext<'_>,
    ) -> Result<Option<Vec<String>>, HandlerError> {
        Ok(None)
    }

    async fn read(
        &self,
        path: &DataPath,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Option<Value>, HandlerError>;

    // Returns the handled children of the subtree rooted at `path`.
    async fn read_subtree(
        &self,
        _path: &DataPath,
        _ctx: &mut ReadContext<'_>,
    ) -> Result<Vec<(DataPath, Value)>, HandlerError> {
        Ok(vec![])
    }
}

// ===== global functions =====

// Deserializes a node value into its typed representation.
pub fn parse<T: DeserializeOwned>(value: &Value) -> Result<T, HandlerError> {
    let data = T::deserialize(value)?;
    Ok(data)
}

// Returns the key of the list element named `node` in `path`.
pub fn list_key<'a>(
    path: &'a DataPath,
    node: &str,
) -> Result<&'a str, HandlerError> {
    path.key_of(node).ok_or_else(|| {
        HandlerError::InvalidData(format!("{} has no {} key", path, node))
    })
}

// ===== unit tests =====
