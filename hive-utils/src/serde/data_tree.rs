//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::{Deserialize, Serializer};

use crate::tree::DataTree;

// Serialize data tree to a JSON string.
//
// Node values are arbitrary JSON, which binary formats can't represent
// directly.
pub fn serialize<S>(dtree: &DataTree, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let data =
        serde_json::to_string(dtree).map_err(serde::ser::Error::custom)?;
    s.serialize_str(&data)
}

// Deserialize data tree from a JSON string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DataTree, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    serde_json::from_str(&String::deserialize(deserializer)?)
        .map_err(serde::de::Error::custom)
}

// ===== unit tests =====
