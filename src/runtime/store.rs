//! Shared data store of shares and nodes
//!
//! A share is a value record: an ordered field map with an update stamp and a
//! set of per-frame marks. A node is a namespace path with no value. Store
//! paths are canonical: no leading separator, and nodes keep their trailing
//! separator.

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Path separator used in store paths.
pub const SEPARATOR: char = '.';

/// Handle to a share in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShareId(String);

impl ShareId {
    /// Canonical path of the share
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot taken by a marker for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    /// Share stamp at the time of marking
    pub stamp: Option<DateTime<Utc>>,
    /// Copy of the share fields at the time of marking
    pub data: Option<Map<String, Value>>,
}

/// Value record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Share {
    /// Field values in insertion order
    pub fields: Map<String, Value>,
    /// Time of the last update
    pub stamp: Option<DateTime<Utc>>,
    /// Marks keyed by frame name
    pub marks: IndexMap<String, Mark>,
}

impl Share {
    /// Check whether a field is present
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The conventional `value` field
    pub fn value(&self) -> Option<&Value> {
        self.fields.get("value")
    }

    /// Iterate over fields in order
    pub fn items(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Iterate over field names in order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }
}

/// The shared data store
#[derive(Debug, Default)]
pub struct Store {
    shares: IndexMap<String, Share>,
    nodes: IndexSet<String>,
    revision: u64,
}

/// Strip the leading separator from a path.
pub fn canonical(path: &str) -> &str {
    path.strip_prefix(SEPARATOR).unwrap_or(path)
}

impl Store {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutations applied so far
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Get or create the share at `path`
    pub fn create(&mut self, path: &str) -> ShareId {
        let key = canonical(path).to_string();
        if !self.shares.contains_key(&key) {
            self.shares.insert(key.clone(), Share::default());
            self.revision += 1;
        }
        ShareId(key)
    }

    /// Get or create the namespace node at `path`.
    ///
    /// Returns the canonical node path and whether the node was newly created.
    pub fn create_node(&mut self, path: &str) -> (String, bool) {
        let mut key = canonical(path).to_string();
        if !key.ends_with(SEPARATOR) {
            key.push(SEPARATOR);
        }
        let created = self.nodes.insert(key.clone());
        if created {
            self.revision += 1;
        }
        (key, created)
    }

    /// Check whether a node exists
    pub fn has_node(&self, path: &str) -> bool {
        self.nodes.contains(canonical(path))
    }

    /// Look up an existing share by path without creating it
    pub fn find(&self, path: &str) -> Option<ShareId> {
        let key = canonical(path);
        self.shares
            .contains_key(key)
            .then(|| ShareId(key.to_string()))
    }

    /// Access a share
    pub fn get(&self, id: &ShareId) -> Option<&Share> {
        self.shares.get(&id.0)
    }

    /// Access a share mutably
    pub fn get_mut(&mut self, id: &ShareId) -> Option<&mut Share> {
        self.shares.get_mut(&id.0)
    }

    /// Merge `fields` into the share, overwriting existing values
    pub fn update(&mut self, id: &ShareId, fields: &Map<String, Value>) {
        let share = self.shares.entry(id.0.clone()).or_default();
        for (field, value) in fields {
            share.fields.insert(field.clone(), value.clone());
        }
        share.stamp = Some(Utc::now());
        self.revision += 1;
    }

    /// Add the fields that are not already present, leaving the rest untouched
    pub fn create_fields(&mut self, id: &ShareId, fields: &Map<String, Value>) {
        let share = self.shares.entry(id.0.clone()).or_default();
        let mut changed = false;
        for (field, value) in fields {
            if !share.fields.contains_key(field) {
                share.fields.insert(field.clone(), value.clone());
                changed = true;
            }
        }
        if changed {
            share.stamp = Some(Utc::now());
            self.revision += 1;
        }
    }

    /// Iterate over all shares
    pub fn shares(&self) -> impl Iterator<Item = (&String, &Share)> {
        self.shares.iter()
    }
}
