//! Variant selection rules.

use crate::model::key::Key;
use crate::variant::{BoundVariant, SpawnContext, VariantError, VariantMap};
use rand::Rng;
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

type RuleFn =
    dyn Fn(&VariantMap, &SpawnContext) -> Result<Option<BoundVariant>, VariantError> + Send + Sync;

/// Picks a variant for a freshly spawned instance, or none.
#[derive(Clone)]
pub struct VariantRule(Arc<RuleFn>);

/// Inclusive temperature range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureRange {
    pub min: f64,
    pub max: f64,
}

impl TemperatureRange {
    pub const COLD: Self = Self::new(-999_999_999.0, 0.5);
    pub const TEMPERATE: Self = Self::new(0.5, 0.9);
    pub const WARM: Self = Self::new(0.9, 999_999_999.0);

    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

fn unknown(variants: &VariantMap, context: &SpawnContext, ids: Vec<String>) -> VariantError {
    VariantError::UnknownVariant {
        kind: context.kind.clone(),
        ids,
        known: variants.ids(),
    }
}

fn require(
    variants: &VariantMap,
    context: &SpawnContext,
    id: &str,
) -> Result<BoundVariant, VariantError> {
    variants
        .get(id)
        .cloned()
        .ok_or_else(|| unknown(variants, context, vec![id.to_string()]))
}

impl VariantRule {
    pub fn new<F>(rule: F) -> Self
    where
        F: Fn(&VariantMap, &SpawnContext) -> Result<Option<BoundVariant>, VariantError>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(rule))
    }

    pub fn apply(
        &self,
        variants: &VariantMap,
        context: &SpawnContext,
    ) -> Result<Option<BoundVariant>, VariantError> {
        (self.0)(variants, context)
    }

    /// Never picks a variant.
    pub fn none() -> Self {
        Self::new(|_, _| Ok(None))
    }

    /// First declared variant.
    pub fn first() -> Self {
        Self::new(|variants, _| Ok(variants.first().cloned()))
    }

    /// Uniformly random variant.
    pub fn random() -> Self {
        Self::new(|variants, context| {
            if variants.is_empty() {
                return Ok(None);
            }
            let index = context.rng().gen_range(0..variants.len());
            Ok(variants.at(index).cloned())
        })
    }

    pub fn always(id: &str) -> Self {
        let id = id.to_string();
        Self::new(move |variants, context| require(variants, context, &id).map(Some))
    }

    /// Random variant weighted by `weights`; non-positive weights are skipped.
    ///
    /// # Errors
    /// - [`VariantError::EmptyWeights`] when no weight is positive.
    /// - [`VariantError::WeightOverflow`] when the weights do not fit a `u64` total.
    pub fn weighted(weights: &[(&str, i32)]) -> Result<Self, VariantError> {
        let table: Vec<(String, u64)> = weights
            .iter()
            .filter_map(|(id, weight)| {
                u64::try_from(*weight)
                    .ok()
                    .filter(|weight| *weight > 0)
                    .map(|weight| ((*id).to_string(), weight))
            })
            .collect();
        let total = table
            .iter()
            .try_fold(0u64, |total, (_, weight)| total.checked_add(*weight))
            .ok_or(VariantError::WeightOverflow)?;
        if total == 0 {
            return Err(VariantError::EmptyWeights);
        }
        let declared: Vec<String> = weights.iter().map(|(id, _)| (*id).to_string()).collect();

        Ok(Self::new(move |variants, context| {
            if variants.is_empty() {
                return Err(unknown(variants, context, declared.clone()));
            }
            let mut roll = context.rng().gen_range(0..total);
            for (id, weight) in &table {
                if roll < *weight {
                    return require(variants, context, id).map(Some);
                }
                roll -= weight;
            }
            Ok(None)
        }))
    }

    /// `id` when the instance spawns in one of `biomes`.
    pub fn if_biomes(biomes: BTreeSet<Key>, id: &str) -> Self {
        let id = id.to_string();
        Self::new(move |variants, context| {
            let variant = require(variants, context, &id)?;
            Ok(biomes.contains(&context.biome).then_some(variant))
        })
    }

    /// `id` when the instance spawns in one of `worlds`.
    pub fn if_worlds(worlds: BTreeSet<Key>, id: &str) -> Self {
        let id = id.to_string();
        Self::new(move |variants, context| {
            let variant = require(variants, context, &id)?;
            Ok(worlds.contains(&context.location.world).then_some(variant))
        })
    }

    /// `id` when the temperature at the spawn location is within `range`.
    pub fn if_temperature(range: TemperatureRange, id: &str) -> Self {
        let id = id.to_string();
        Self::new(move |variants, context| {
            let variant = require(variants, context, &id)?;
            Ok(range.contains(context.temperature).then_some(variant))
        })
    }

    /// Result of the first rule that picks a variant.
    pub fn first_match(rules: Vec<VariantRule>) -> Self {
        Self::new(move |variants, context| {
            for rule in &rules {
                if let Some(variant) = rule.apply(variants, context)? {
                    return Ok(Some(variant));
                }
            }
            Ok(None)
        })
    }
}

impl Default for VariantRule {
    fn default() -> Self {
        Self::first()
    }
}

impl Debug for VariantRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("VariantRule")
    }
}
