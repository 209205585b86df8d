//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::ops::Bound;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Wildcarded location in the configuration tree (node names only).
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SchemaPath(Vec<String>);

/// Single element of an instance path.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PathArg {
    pub node: String,
    pub key: Option<String>,
}

/// Instance location in the configuration tree (node names plus list keys).
///
/// The derived ordering compares path arguments lexicographically, which
/// places every node before all of its descendants.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DataPath(Vec<PathArg>);

/// Snapshot of the configuration tree: one value per instance path.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DataTree(BTreeMap<DataPath, Value>);

// Tree model errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TreeError {
    InvalidPath(String),
    MissingParent(DataPath),
}

// ===== impl SchemaPath =====

impl SchemaPath {
    pub fn root() -> SchemaPath {
        SchemaPath(vec![])
    }

    #[must_use]
    pub fn child(&self, node: &str) -> SchemaPath {
        let mut nodes = self.0.clone();
        nodes.push(node.to_owned());
        SchemaPath(nodes)
    }

    pub fn parent(&self) -> Option<SchemaPath> {
        let (_, nodes) = self.0.split_last()?;
        Some(SchemaPath(nodes.to_vec()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // Returns true if `self` is a strict prefix of `other`.
    pub fn is_ancestor_of(&self, other: &SchemaPath) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }
}

impl std::fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for node in &self.0 {
            write!(f, "/{node}")?;
        }
        Ok(())
    }
}

impl FromStr for SchemaPath {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<SchemaPath, TreeError> {
        let Some(rest) = s.strip_prefix('/') else {
            return Err(TreeError::InvalidPath(s.to_owned()));
        };
        if rest.is_empty() {
            return Ok(SchemaPath::root());
        }

        let mut nodes = vec![];
        for node in rest.split('/') {
            if node.is_empty() || node.contains(['[', ']']) {
                return Err(TreeError::InvalidPath(s.to_owned()));
            }
            nodes.push(node.to_owned());
        }
        Ok(SchemaPath(nodes))
    }
}

impl From<&str> for SchemaPath {
    // Convenience conversion for static path literals. Panics on malformed
    // input, which is a programming error.
    fn from(s: &str) -> SchemaPath {
        SchemaPath::from_str(s)
            .unwrap_or_else(|_| panic!("malformed schema path: {s}"))
    }
}

// ===== impl PathArg =====

impl PathArg {
    pub fn new(node: &str, key: Option<&str>) -> PathArg {
        PathArg {
            node: node.to_owned(),
            key: key.map(str::to_owned),
        }
    }
}

impl std::fmt::Display for PathArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.node)?;
        if let Some(key) = &self.key {
            write!(f, "[")?;
            for c in key.chars() {
                if matches!(c, '\\' | '[' | ']') {
                    write!(f, "\\")?;
                }
                write!(f, "{c}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

// ===== impl DataPath =====

impl DataPath {
    pub fn root() -> DataPath {
        DataPath(vec![])
    }

    #[must_use]
    pub fn child(&self, node: &str, key: Option<&str>) -> DataPath {
        let mut args = self.0.clone();
        args.push(PathArg::new(node, key));
        DataPath(args)
    }

    pub fn parent(&self) -> Option<DataPath> {
        let (_, args) = self.0.split_last()?;
        Some(DataPath(args.to_vec()))
    }

    pub fn args(&self) -> &[PathArg] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // Returns the wildcarded form of this path.
    pub fn schema(&self) -> SchemaPath {
        SchemaPath(self.0.iter().map(|arg| arg.node.clone()).collect())
    }

    // Key of the last path element.
    pub fn key(&self) -> Option<&str> {
        self.0.last().and_then(|arg| arg.key.as_deref())
    }

    // Key of the first path element named `node`.
    pub fn key_of(&self, node: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|arg| arg.node == node)
            .and_then(|arg| arg.key.as_deref())
    }

    // Returns the ancestor (or self) instance whose wildcarded form is
    // `schema`.
    pub fn cut(&self, schema: &SchemaPath) -> Option<DataPath> {
        if schema.len() > self.0.len() || schema != &self.truncated(schema.len())
        {
            return None;
        }
        Some(DataPath(self.0[..schema.len()].to_vec()))
    }

    pub fn starts_with(&self, other: &DataPath) -> bool {
        self.0.starts_with(&other.0)
    }

    fn truncated(&self, len: usize) -> SchemaPath {
        SchemaPath(self.0[..len].iter().map(|arg| arg.node.clone()).collect())
    }
}

impl std::fmt::Display for DataPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for arg in &self.0 {
            write!(f, "/{arg}")?;
        }
        Ok(())
    }
}

impl FromStr for DataPath {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<DataPath, TreeError> {
        let invalid = || TreeError::InvalidPath(s.to_owned());

        let Some(mut rest) = s.strip_prefix('/') else {
            return Err(invalid());
        };
        let mut args = vec![];
        while !rest.is_empty() {
            // Node name runs until the next separator or key opening.
            let end = rest.find(['/', '[']).unwrap_or(rest.len());
            let node = &rest[..end];
            if node.is_empty() || node.contains(']') {
                return Err(invalid());
            }
            rest = &rest[end..];

            // Keys may contain slashes, so they are delimited by brackets.
            let mut key = None;
            if let Some(tail) = rest.strip_prefix('[') {
                let (value, tail) = parse_key(tail).ok_or_else(invalid)?;
                key = Some(value);
                rest = tail;
            }
            args.push(PathArg::new(node, key.as_deref()));

            match rest.strip_prefix('/') {
                Some(tail) if !tail.is_empty() => rest = tail,
                Some(_) => return Err(invalid()),
                None if rest.is_empty() => (),
                None => return Err(invalid()),
            }
        }

        Ok(DataPath(args))
    }
}

impl From<&str> for DataPath {
    // Convenience conversion for path literals. Panics on malformed input.
    fn from(s: &str) -> DataPath {
        DataPath::from_str(s)
            .unwrap_or_else(|_| panic!("malformed data path: {s}"))
    }
}

impl Serialize for DataPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DataPath {
    fn deserialize<D>(deserializer: D) -> Result<DataPath, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DataPath::from_str(&s).map_err(D::Error::custom)
    }
}

// ===== impl DataTree =====

impl DataTree {
    pub fn new() -> DataTree {
        DataTree::default()
    }

    pub fn get(&self, path: &DataPath) -> Option<&Value> {
        self.0.get(path)
    }

    pub fn contains(&self, path: &DataPath) -> bool {
        self.0.contains_key(path)
    }

    pub fn insert(&mut self, path: DataPath, value: Value) -> Option<Value> {
        self.0.insert(path, value)
    }

    pub fn remove(&mut self, path: &DataPath) -> Option<Value> {
        self.0.remove(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, DataPath, Value> {
        self.0.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &DataPath> {
        self.0.keys()
    }

    // Iterates over `root` and all of its descendants, in pre-order.
    pub fn subtree<'a>(
        &'a self,
        root: &'a DataPath,
    ) -> impl Iterator<Item = (&'a DataPath, &'a Value)> + 'a {
        self.0
            .range((Bound::Included(root), Bound::Unbounded))
            .take_while(move |(path, _)| path.starts_with(root))
    }

    // Iterates over the direct children of `parent` named `node`.
    pub fn children<'a>(
        &'a self,
        parent: &'a DataPath,
        node: &'a str,
    ) -> impl Iterator<Item = (&'a DataPath, &'a Value)> + 'a {
        self.subtree(parent).filter(move |(path, _)| {
            path.len() == parent.len() + 1
                && path.args().last().is_some_and(|arg| arg.node == node)
        })
    }

    // Checks that every entry nested under a list instance has that list
    // instance present. Unkeyed containers are implicit and may be absent.
    pub fn validate(&self) -> Result<(), TreeError> {
        for path in self.0.keys() {
            for len in 1..path.len() {
                if path.0[len - 1].key.is_none() {
                    continue;
                }
                let ancestor = DataPath(path.0[..len].to_vec());
                if !self.0.contains_key(&ancestor) {
                    return Err(TreeError::MissingParent(path.clone()));
                }
            }
        }
        Ok(())
    }
}

impl FromIterator<(DataPath, Value)> for DataTree {
    fn from_iter<I: IntoIterator<Item = (DataPath, Value)>>(
        iter: I,
    ) -> DataTree {
        DataTree(iter.into_iter().collect())
    }
}

impl Extend<(DataPath, Value)> for DataTree {
    fn extend<I: IntoIterator<Item = (DataPath, Value)>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for DataTree {
    type Item = (DataPath, Value);
    type IntoIter = btree_map::IntoIter<DataPath, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Serialize for DataTree {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for DataTree {
    fn deserialize<D>(deserializer: D) -> Result<DataTree, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = BTreeMap::<DataPath, Value>::deserialize(deserializer)?;
        Ok(DataTree(entries))
    }
}

// ===== impl TreeError =====

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeError::InvalidPath(path) => {
                write!(f, "invalid data path: {path}")
            }
            TreeError::MissingParent(path) => {
                write!(f, "parent node missing for: {path}")
            }
        }
    }
}

impl std::error::Error for TreeError {}

// ===== helper functions =====

// Parses a bracketed key up to its closing bracket, returning the unescaped
// key and the remaining input. Brackets and backslashes inside the key are
// escaped with a backslash.
fn parse_key(s: &str) -> Option<(String, &str)> {
    let mut key = String::new();
    let mut chars = s.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => key.push(chars.next()?.1),
            ']' => return Some((key, &s[idx + 1..])),
            '[' => return None,
            _ => key.push(c),
        }
    }
    None
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn data_path_parse_display() {
        let s = "/interfaces/interface[GigabitEthernet0/8/0]/l2";
        let path = DataPath::from_str(s).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.key_of("interface"), Some("GigabitEthernet0/8/0"));
        assert_eq!(path.key(), None);
        assert_eq!(path.to_string(), s);
        assert_eq!(
            path.schema(),
            SchemaPath::from("/interfaces/interface/l2")
        );
    }

    #[test]
    fn data_path_parse_invalid() {
        for s in ["", "interfaces", "/a//b", "/a[x", "/a[x]b", "/a/", "/a]"] {
            assert!(DataPath::from_str(s).is_err(), "{s}");
        }
    }

    #[test]
    fn data_path_escaped_key() {
        let path = DataPath::root()
            .child("interfaces", None)
            .child("interface", Some(r"tap[0]\x"));
        let s = path.to_string();
        assert_eq!(s, r"/interfaces/interface[tap\[0\]\\x]");
        assert_eq!(DataPath::from_str(&s), Ok(path.clone()));

        let tree: DataTree = [(path.clone(), json!({}))].into_iter().collect();
        let json = serde_json::to_string(&tree).unwrap();
        let tree: DataTree = serde_json::from_str(&json).unwrap();
        assert!(tree.contains(&path));
    }

    #[test]
    fn data_path_cut() {
        let path = DataPath::from("/a/b[1]/c/d[2]");
        assert_eq!(
            path.cut(&SchemaPath::from("/a/b")),
            Some(DataPath::from("/a/b[1]"))
        );
        assert_eq!(path.cut(&SchemaPath::from("/a/x")), None);
        assert_eq!(path.cut(&SchemaPath::from("/a/b/c/d/e")), None);
    }

    #[test]
    fn parents_sort_before_descendants() {
        let mut paths = vec![
            DataPath::from("/a/b[2]"),
            DataPath::from("/a/b[1]/c"),
            DataPath::from("/a/b[1]"),
            DataPath::from("/a"),
        ];
        paths.sort();
        assert_eq!(paths[0], DataPath::from("/a"));
        assert_eq!(paths[1], DataPath::from("/a/b[1]"));
        assert_eq!(paths[2], DataPath::from("/a/b[1]/c"));
    }

    #[test]
    fn tree_subtree_and_children() {
        let mut tree: DataTree = [
            (DataPath::from("/a/b[1]"), json!({})),
            (DataPath::from("/a/b[1]/c[x]"), json!({"v": 1})),
            (DataPath::from("/a/b[1]/c[y]"), json!({"v": 2})),
            (DataPath::from("/a/b[2]"), json!({})),
        ]
        .into_iter()
        .collect();

        let root = DataPath::from("/a/b[1]");
        assert_eq!(tree.subtree(&root).count(), 3);
        assert_eq!(tree.children(&root, "c").count(), 2);
        assert!(tree.validate().is_ok());

        tree.remove(&root);
        assert_eq!(
            tree.validate(),
            Err(TreeError::MissingParent(DataPath::from("/a/b[1]/c[x]")))
        );
    }

    #[test]
    fn tree_json() {
        let json = r#"{"/a":{"x":1},"/a/b[k/1]":null}"#;
        let tree: DataTree = serde_json::from_str(json).unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree.validate().is_ok());
        assert_eq!(serde_json::to_string(&tree).unwrap(), json);
    }
}
