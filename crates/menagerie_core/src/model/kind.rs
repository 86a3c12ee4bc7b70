//! Kind descriptors as stored in the host kind registry.

use crate::model::class::{InstanceClass, LIVING_CLASS};
use crate::model::instance::{DataPayload, DataValue, Location};
use crate::model::key::Key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Raw numeric id the host registry assigns on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KindId(pub u32);

impl Display for KindId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Spawn classification; spawn tables are grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Monster,
    Creature,
    Ambient,
    Axolotls,
    UndergroundWaterCreature,
    WaterCreature,
    WaterAmbient,
    Misc,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monster => "monster",
            Self::Creature => "creature",
            Self::Ambient => "ambient",
            Self::Axolotls => "axolotls",
            Self::UndergroundWaterCreature => "underground_water_creature",
            Self::WaterCreature => "water_creature",
            Self::WaterAmbient => "water_ambient",
            Self::Misc => "misc",
        }
    }
}

/// Physical shape shared with the backing kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f32,
    pub height: f32,
    pub eye_height: f32,
}

impl Dimensions {
    /// Default eye height is 85% of the height, as the host computes it.
    pub fn scalable(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            eye_height: height * 0.85,
        }
    }
}

type InitialState = dyn Fn(&Location) -> Vec<DataValue> + Send + Sync;

/// Constructs instances of one implementation class.
///
/// The factory fixes the concrete class and produces the initial
/// synchronized state of each new instance.
#[derive(Clone)]
pub struct InstanceFactory {
    class: Arc<InstanceClass>,
    initial_state: Arc<InitialState>,
}

impl InstanceFactory {
    pub fn new<F>(class: Arc<InstanceClass>, initial_state: F) -> Self
    where
        F: Fn(&Location) -> Vec<DataValue> + Send + Sync + 'static,
    {
        Self {
            class,
            initial_state: Arc::new(initial_state),
        }
    }

    /// Factory producing only the base flag field.
    pub fn of(class: Arc<InstanceClass>) -> Self {
        Self::new(class, |_| vec![DataValue::new(0, DataPayload::Byte(0))])
    }

    pub fn class(&self) -> &Arc<InstanceClass> {
        &self.class
    }

    pub fn is_living(&self) -> bool {
        self.class.extends(LIVING_CLASS)
    }

    pub fn initial_state(&self, location: &Location) -> Vec<DataValue> {
        (self.initial_state)(location)
    }
}

impl Debug for InstanceFactory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceFactory")
            .field("class", &self.class.name())
            .finish_non_exhaustive()
    }
}

/// Immutable kind entry.
#[derive(Debug, Clone)]
pub struct KindDescriptor {
    pub key: Key,
    pub category: Category,
    pub dimensions: Dimensions,
    pub tracking_range: u32,
    pub living: bool,
    pub fire_immune: bool,
    pub summonable: bool,
    pub factory: InstanceFactory,
}

/// Mutable draft of a [`KindDescriptor`].
///
/// Injected kinds start from the backing kind's shape; declaration
/// customizers receive the draft before it is sealed.
#[derive(Debug, Clone)]
pub struct KindBuilder {
    key: Key,
    category: Category,
    factory: InstanceFactory,
    dimensions: Dimensions,
    tracking_range: u32,
    fire_immune: bool,
    summonable: bool,
}

impl KindBuilder {
    pub fn of(key: Key, category: Category, factory: InstanceFactory) -> Self {
        Self {
            key,
            category,
            factory,
            dimensions: Dimensions::scalable(0.6, 1.8),
            tracking_range: 5,
            fire_immune: false,
            summonable: true,
        }
    }

    pub fn sized(&mut self, width: f32, height: f32) -> &mut Self {
        self.dimensions = Dimensions::scalable(width, height);
        self
    }

    pub fn eye_height(&mut self, eye_height: f32) -> &mut Self {
        self.dimensions.eye_height = eye_height;
        self
    }

    pub fn tracking_range(&mut self, chunks: u32) -> &mut Self {
        self.tracking_range = chunks;
        self
    }

    pub fn fire_immune(&mut self) -> &mut Self {
        self.fire_immune = true;
        self
    }

    pub fn no_summon(&mut self) -> &mut Self {
        self.summonable = false;
        self
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn build(&self) -> KindDescriptor {
        KindDescriptor {
            key: self.key.clone(),
            category: self.category,
            dimensions: self.dimensions,
            tracking_range: self.tracking_range,
            living: self.factory.is_living(),
            fire_immune: self.fire_immune,
            summonable: self.summonable,
            factory: self.factory.clone(),
        }
    }
}

/// Default attribute values for a kind (`max_health`, `movement_speed`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeProfile {
    values: BTreeMap<String, f64>,
}

impl AttributeProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Baseline every living kind starts with.
    pub fn living_defaults() -> Self {
        Self::new()
            .with("max_health", 20.0)
            .with("knockback_resistance", 0.0)
            .with("movement_speed", 0.7)
            .with("armor", 0.0)
            .with("step_height", 0.6)
    }

    pub fn with(mut self, attribute: &str, value: f64) -> Self {
        self.values.insert(attribute.to_string(), value);
        self
    }

    pub fn get(&self, attribute: &str) -> Option<f64> {
        self.values.get(attribute).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeProfile, Category, InstanceFactory, KindBuilder};
    use crate::model::class::InstanceClass;
    use crate::model::key::Key;

    #[test]
    fn builder_applies_customizations() {
        let entity = InstanceClass::root("Entity");
        let living = InstanceClass::extending("LivingEntity", &entity);
        let capybara = InstanceClass::extending("Capybara", &living);
        let mut builder = KindBuilder::of(
            Key::parse("zoo:capybara").expect("key"),
            Category::Creature,
            InstanceFactory::of(capybara),
        );
        builder.sized(0.9, 1.2).tracking_range(8).fire_immune();
        let descriptor = builder.build();

        assert_eq!(descriptor.dimensions.width, 0.9);
        assert!((descriptor.dimensions.eye_height - 1.02).abs() < 1e-6);
        assert_eq!(descriptor.tracking_range, 8);
        assert!(descriptor.fire_immune);
        assert!(descriptor.summonable);
        assert!(descriptor.living);
    }

    #[test]
    fn attribute_profile_overrides_values() {
        let profile = AttributeProfile::living_defaults().with("max_health", 40.0);
        assert_eq!(profile.get("max_health"), Some(40.0));
        assert_eq!(profile.get("armor"), Some(0.0));
        assert_eq!(profile.get("flying_speed"), None);
        assert_eq!(Category::UndergroundWaterCreature.as_str(), "underground_water_creature");
    }

    #[test]
    fn non_living_factory_builds_non_living_kind() {
        let marker = InstanceClass::extending("Marker", &InstanceClass::root("Entity"));
        let descriptor = KindBuilder::of(
            Key::parse("zoo:beacon").expect("key"),
            Category::Misc,
            InstanceFactory::of(marker),
        )
        .build();
        assert!(!descriptor.living);
        assert_eq!(descriptor.factory.class().name(), "Marker");
    }
}
