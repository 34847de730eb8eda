/*
 * Copyright 2025 Oxide Computer Company
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

/*
 * A single mutation of the device configuration tree.  A Replace overwrites
 * the whole subtree at the path, a Merge only touches the fields present in
 * the value, and a Delete removes the subtree entirely.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Update {
    Replace { path: String, value: Value },
    Merge { path: String, value: Value },
    Delete { path: String },
}

impl Update {
    pub fn replace(path: impl Into<String>, value: Value) -> Update {
        Update::Replace { path: path.into(), value }
    }

    pub fn merge(path: impl Into<String>, value: Value) -> Update {
        Update::Merge { path: path.into(), value }
    }

    pub fn delete(path: impl Into<String>) -> Update {
        Update::Delete { path: path.into() }
    }

    pub fn path(&self) -> &str {
        match self {
            Update::Replace { path, .. }
            | Update::Merge { path, .. }
            | Update::Delete { path } => path,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Update::Replace { value, .. } | Update::Merge { value, .. } => {
                Some(value)
            }
            Update::Delete { .. } => None,
        }
    }

    pub fn is_replace(&self) -> bool {
        matches!(self, Update::Replace { .. })
    }

    pub fn is_merge(&self) -> bool {
        matches!(self, Update::Merge { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Update::Delete { .. })
    }
}

impl std::fmt::Display for Update {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Update::Replace { path, value } => {
                write!(f, "replace {path} {value}")
            }
            Update::Merge { path, value } => write!(f, "merge {path} {value}"),
            Update::Delete { path } => write!(f, "delete {path}"),
        }
    }
}

/*
 * The order of updates is part of the contract with the device: a base node
 * must be replaced before anything merges into it or hangs off it, so the
 * list is only ever appended to.
 */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Updates(Vec<Update>);

impl Updates {
    pub fn new() -> Updates {
        Updates(Vec::new())
    }

    pub fn push(&mut self, u: Update) {
        self.0.push(u);
    }

    pub fn extend(&mut self, other: Updates) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Update> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Update] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Update> {
        self.0
    }
}

impl std::ops::Index<usize> for Updates {
    type Output = Update;

    fn index(&self, i: usize) -> &Update {
        &self.0[i]
    }
}

impl From<Vec<Update>> for Updates {
    fn from(v: Vec<Update>) -> Self {
        Updates(v)
    }
}

impl IntoIterator for Updates {
    type Item = Update;
    type IntoIter = std::vec::IntoIter<Update>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Updates {
    type Item = &'a Update;
    type IntoIter = std::slice::Iter<'a, Update>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
