//! Biome predicates used by spawn rules.

use crate::host::tables::Biome;
use crate::model::key::Key;
use crate::variant::TemperatureRange;
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub const OVERWORLD_TAG: &str = "minecraft:is_overworld";
pub const NETHER_TAG: &str = "minecraft:is_nether";
pub const END_TAG: &str = "minecraft:is_end";

#[derive(Clone)]
pub struct BiomeFilter(Arc<dyn Fn(&Biome) -> bool + Send + Sync>);

impl BiomeFilter {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Biome) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    pub fn test(&self, biome: &Biome) -> bool {
        (self.0)(biome)
    }

    pub fn and(filters: Vec<BiomeFilter>) -> Self {
        Self::new(move |biome| filters.iter().all(|filter| filter.test(biome)))
    }

    pub fn or(filters: Vec<BiomeFilter>) -> Self {
        Self::new(move |biome| filters.iter().any(|filter| filter.test(biome)))
    }

    pub fn not(filter: BiomeFilter) -> Self {
        Self::new(move |biome| !filter.test(biome))
    }

    pub fn base_temperature(range: TemperatureRange) -> Self {
        Self::new(move |biome| range.contains(f64::from(biome.base_temperature)))
    }

    pub fn tag(tag: Key) -> Self {
        Self::new(move |biome| biome.has_tag(&tag))
    }

    pub fn keys(keys: BTreeSet<Key>) -> Self {
        Self::new(move |biome| keys.contains(&biome.key))
    }

    pub fn key(key: Key) -> Self {
        Self::keys(BTreeSet::from([key]))
    }

    pub fn overworld() -> Self {
        Self::tag(Key::builtin(OVERWORLD_TAG))
    }

    pub fn nether() -> Self {
        Self::tag(Key::builtin(NETHER_TAG))
    }

    pub fn end() -> Self {
        Self::tag(Key::builtin(END_TAG))
    }
}

impl Debug for BiomeFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("BiomeFilter")
    }
}
