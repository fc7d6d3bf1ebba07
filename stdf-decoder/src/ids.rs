//! Stable identifiers for device and parameter names
//!
//! Ids are handed out per namespace in first-seen order. Entries loaded with
//! [`IdentifierManager::bulk_preseed`] are marked pre-existing and never show
//! up in [`IdentifierManager::get_new_mappings`], which keeps repeated runs
//! over the same input from persisting duplicates.

use crate::types::{Result, StdfError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Independent id spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    Device,
    Parameter,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Device => f.write_str("device"),
            Namespace::Parameter => f.write_str("parameter"),
        }
    }
}

/// Where an id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Loaded from an external store before the run
    Preexisting,
    /// Assigned during this run
    New,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    id: u32,
    provenance: Provenance,
}

#[derive(Debug, Clone)]
struct IdTable {
    entries: HashMap<String, Entry>,
    /// `None` once `u32::MAX` has been handed out
    next_id: Option<u32>,
}

impl Default for IdTable {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: Some(0),
        }
    }
}

impl IdTable {
    fn get_or_create(&mut self, namespace: Namespace, key: &str) -> Result<u32> {
        if let Some(entry) = self.entries.get(key) {
            return Ok(entry.id);
        }
        let id = self.next_id.ok_or(StdfError::IdsExhausted(namespace))?;
        self.next_id = id.checked_add(1);
        self.entries.insert(
            key.to_string(),
            Entry {
                id,
                provenance: Provenance::New,
            },
        );
        Ok(id)
    }

    fn preseed(&mut self, pairs: impl IntoIterator<Item = (String, u32)>) -> usize {
        let mut loaded = 0;
        for (key, id) in pairs {
            self.entries.insert(
                key,
                Entry {
                    id,
                    provenance: Provenance::Preexisting,
                },
            );
            loaded += 1;
        }
        if loaded > 0 {
            self.next_id = self
                .entries
                .values()
                .map(|e| e.id)
                .max()
                .map_or(Some(0), |max| max.checked_add(1));
        }
        loaded
    }

    fn new_mappings(&self) -> Vec<(String, u32)> {
        let mut out: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| e.provenance == Provenance::New)
            .map(|(key, e)| (key.clone(), e.id))
            .collect();
        out.sort_by_key(|(_, id)| *id);
        out
    }
}

/// Assigns and remembers ids for device and parameter keys
///
/// Not synchronized: one manager belongs to one processor.
#[derive(Debug, Clone, Default)]
pub struct IdentifierManager {
    devices: IdTable,
    parameters: IdTable,
}

impl IdentifierManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, namespace: Namespace) -> &IdTable {
        match namespace {
            Namespace::Device => &self.devices,
            Namespace::Parameter => &self.parameters,
        }
    }

    fn table_mut(&mut self, namespace: Namespace) -> &mut IdTable {
        match namespace {
            Namespace::Device => &mut self.devices,
            Namespace::Parameter => &mut self.parameters,
        }
    }

    /// Id for `key`, assigning the next free one on first sight
    ///
    /// Ids never wrap: once `u32::MAX` is taken, new keys are an error.
    pub fn get_or_create_id(&mut self, namespace: Namespace, key: &str) -> Result<u32> {
        self.table_mut(namespace).get_or_create(namespace, key)
    }

    /// Load existing (key, id) pairs
    ///
    /// Loaded keys are marked pre-existing and the next free id becomes one
    /// past the largest id in the namespace. An empty input changes nothing.
    pub fn bulk_preseed(
        &mut self,
        namespace: Namespace,
        pairs: impl IntoIterator<Item = (String, u32)>,
    ) {
        let loaded = self.table_mut(namespace).preseed(pairs);
        match self.table(namespace).next_id {
            Some(next) => log::info!("Preseeded {} {} ids, next id {}", loaded, namespace, next),
            None => log::warn!(
                "Preseeded {} {} ids, no free id left for new keys",
                loaded,
                namespace
            ),
        }
    }

    /// Keys created after preseeding, sorted by id
    pub fn get_new_mappings(&self, namespace: Namespace) -> Vec<(String, u32)> {
        self.table(namespace).new_mappings()
    }

    /// Existing id for `key` without creating one
    pub fn lookup(&self, namespace: Namespace, key: &str) -> Option<u32> {
        self.table(namespace).entries.get(key).map(|e| e.id)
    }

    pub fn provenance(&self, namespace: Namespace, key: &str) -> Option<Provenance> {
        self.table(namespace).entries.get(key).map(|e| e.provenance)
    }

    /// Number of known keys in a namespace
    pub fn len(&self, namespace: Namespace) -> usize {
        self.table(namespace).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.entries.is_empty() && self.parameters.entries.is_empty()
    }

    pub fn get_device_id(&mut self, key: &str) -> Result<u32> {
        self.get_or_create_id(Namespace::Device, key)
    }

    pub fn get_param_id(&mut self, key: &str) -> Result<u32> {
        self.get_or_create_id(Namespace::Parameter, key)
    }

    pub fn get_new_device_mappings(&self) -> Vec<(String, u32)> {
        self.get_new_mappings(Namespace::Device)
    }

    pub fn get_new_param_mappings(&self) -> Vec<(String, u32)> {
        self.get_new_mappings(Namespace::Parameter)
    }
}
