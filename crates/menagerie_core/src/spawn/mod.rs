//! Natural-spawn rules for injected kinds.
//!
//! A spawn rule is a pure function of a biome: it either opts out or yields
//! the weighted entry merged into that biome's spawn list.

pub mod filter;

use crate::host::tables::{Biome, SpawnCost, WeightedSpawner};
use crate::model::kind::KindId;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub use filter::BiomeFilter;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnData {
    pub weight: u32,
    pub min_group: u32,
    pub max_group: u32,
    pub cost: Option<SpawnCost>,
}

impl SpawnData {
    pub fn new(weight: u32, min_group: u32, max_group: u32) -> Self {
        Self {
            weight,
            min_group,
            max_group,
            cost: None,
        }
    }

    /// Fixed group size.
    pub fn uniform(weight: u32, group: u32) -> Self {
        Self::new(weight, group, group)
    }

    pub fn with_cost(mut self, charge: f64, energy_budget: f64) -> Self {
        self.cost = Some(SpawnCost {
            charge,
            energy_budget,
        });
        self
    }

    pub fn spawner(&self, kind: KindId) -> WeightedSpawner {
        WeightedSpawner {
            kind,
            weight: self.weight,
            min_group: self.min_group,
            max_group: self.max_group,
        }
    }
}

#[derive(Clone)]
pub struct SpawnRule(Arc<dyn Fn(&Biome) -> Option<SpawnData> + Send + Sync>);

impl SpawnRule {
    pub fn new<F>(rule: F) -> Self
    where
        F: Fn(&Biome) -> Option<SpawnData> + Send + Sync + 'static,
    {
        Self(Arc::new(rule))
    }

    pub fn apply(&self, biome: &Biome) -> Option<SpawnData> {
        (self.0)(biome)
    }

    pub fn never() -> Self {
        Self::new(|_| None)
    }

    pub fn if_biome(filter: BiomeFilter, data: SpawnData) -> Self {
        Self::new(move |biome| filter.test(biome).then_some(data))
    }

    pub fn first_match(rules: Vec<SpawnRule>) -> Self {
        Self::new(move |biome| rules.iter().find_map(|rule| rule.apply(biome)))
    }
}

impl Default for SpawnRule {
    fn default() -> Self {
        Self::never()
    }
}

impl Debug for SpawnRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SpawnRule")
    }
}

#[cfg(test)]
mod tests {
    use super::{BiomeFilter, SpawnData, SpawnRule};
    use crate::host::tables::Biome;
    use crate::model::key::Key;
    use crate::variant::TemperatureRange;
    use std::collections::BTreeSet;

    fn biome(raw: &str, temperature: f32, tags: &[&str]) -> Biome {
        Biome {
            key: Key::parse(raw).expect("key"),
            base_temperature: temperature,
            tags: tags.iter().map(|tag| Key::parse(tag).expect("tag")).collect(),
        }
    }

    #[test]
    fn filters_compose() {
        let plains = biome("minecraft:plains", 0.8, &["minecraft:is_overworld"]);
        let desert = biome("minecraft:desert", 2.0, &["minecraft:is_overworld"]);
        let wastes = biome("minecraft:nether_wastes", 2.0, &["minecraft:is_nether"]);

        let warm_overworld = BiomeFilter::and(vec![
            BiomeFilter::overworld(),
            BiomeFilter::base_temperature(TemperatureRange::WARM),
        ]);
        assert!(warm_overworld.test(&desert));
        assert!(!warm_overworld.test(&plains));
        assert!(!warm_overworld.test(&wastes));

        let not_nether = BiomeFilter::not(BiomeFilter::nether());
        assert!(not_nether.test(&plains));
        assert!(!not_nether.test(&wastes));

        let either = BiomeFilter::or(vec![
            BiomeFilter::key(Key::parse("minecraft:plains").expect("key")),
            BiomeFilter::end(),
        ]);
        assert!(either.test(&plains));
        assert!(!either.test(&desert));

        let none = BiomeFilter::keys(BTreeSet::new());
        assert!(!none.test(&plains));
    }

    #[test]
    fn rules_pick_first_matching_data() {
        let plains = biome("minecraft:plains", 0.8, &["minecraft:is_overworld"]);
        let wastes = biome("minecraft:nether_wastes", 2.0, &["minecraft:is_nether"]);
        let rule = SpawnRule::first_match(vec![
            SpawnRule::never(),
            SpawnRule::if_biome(BiomeFilter::nether(), SpawnData::uniform(5, 1)),
            SpawnRule::if_biome(
                BiomeFilter::overworld(),
                SpawnData::new(20, 2, 4).with_cost(0.7, 0.15),
            ),
        ]);
        let data = rule.apply(&plains).expect("plains spawn");
        assert_eq!(data.weight, 20);
        assert!(data.cost.is_some());
        assert_eq!(rule.apply(&wastes), Some(SpawnData::uniform(5, 1)));
        assert_eq!(SpawnRule::default().apply(&plains), None);
    }
}
