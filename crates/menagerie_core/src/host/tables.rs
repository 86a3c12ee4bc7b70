//! Host side tables keyed by kind.
//!
//! # Responsibility
//! - Data-fixer schemas, default attributes, biome spawn settings and the
//!   raw-to-wrapper conversion table.
//!
//! # Invariants
//! - Conversion entries are sealed: writes need a `FieldAccess` granting the
//!   table's sealed field.

use crate::host::HostError;
use crate::model::instance::{RawInstance, WrapperObject};
use crate::model::key::Key;
use crate::model::kind::{AttributeProfile, Category, KindId};
use crate::patch::reflection::FieldAccess;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Data-fixer schema for one kind. Keyed by the kind's string key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub name: String,
    pub fields: Vec<String>,
}

pub trait SchemaTable {
    fn get(&self, id: &str) -> Option<&SchemaEntry>;

    fn insert(&mut self, id: &str, entry: SchemaEntry);
}

pub trait AttributeTable {
    fn get(&self, kind: KindId) -> Option<&AttributeProfile>;

    fn insert(&mut self, kind: KindId, profile: AttributeProfile);
}

/// Static biome data spawn rules match against.
#[derive(Debug, Clone, PartialEq)]
pub struct Biome {
    pub key: Key,
    pub base_temperature: f32,
    pub tags: BTreeSet<Key>,
}

impl Biome {
    pub fn has_tag(&self, tag: &Key) -> bool {
        self.tags.contains(tag)
    }
}

/// One weighted entry of a biome spawn list.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSpawner {
    pub kind: KindId,
    pub weight: u32,
    pub min_group: u32,
    pub max_group: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnCost {
    pub charge: f64,
    pub energy_budget: f64,
}

/// Per-biome spawn lists and spawn costs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnSettings {
    pub spawners: BTreeMap<Category, Vec<WeightedSpawner>>,
    pub costs: BTreeMap<KindId, SpawnCost>,
}

impl SpawnSettings {
    pub fn spawners(&self, category: Category) -> &[WeightedSpawner] {
        self.spawners
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub trait BiomeCatalog {
    fn biomes(&self) -> Vec<Biome>;

    fn biome(&self, key: &Key) -> Option<&Biome>;

    fn spawn_settings(&self, biome: &Key) -> Option<&SpawnSettings>;

    fn replace_spawn_settings(
        &mut self,
        biome: &Key,
        settings: SpawnSettings,
    ) -> Result<(), HostError>;
}

/// Builds the wrapper object for a raw instance.
pub type Converter = Arc<dyn Fn(&RawInstance) -> WrapperObject + Send + Sync>;

/// Sealed mapping from kind to wrapper converter.
pub trait ConversionTable {
    /// Reflective owner name of the table.
    fn owner(&self) -> &str;

    /// Fields the owner declares, including privileged ones.
    fn declared_fields(&self) -> Vec<String>;

    /// Field holding the sealed entries.
    fn sealed_field(&self) -> &str;

    /// Converter for `kind`, following aliases.
    fn resolve(&self, kind: KindId) -> Option<Converter>;

    fn replace(
        &mut self,
        access: &FieldAccess,
        kind: KindId,
        converter: Converter,
    ) -> Result<(), HostError>;

    /// Routes conversions of `kind` through `target`'s entry.
    fn alias(&mut self, access: &FieldAccess, kind: KindId, target: KindId)
        -> Result<(), HostError>;
}
