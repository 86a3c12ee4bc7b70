//! Wrapper dispatch for one backing kind.
//!
//! # Invariants
//! - Entries are ordered most specific class first: an entry never follows
//!   an entry whose class is assignable from its own.
//! - Entries for unrelated classes keep declaration order.
//! - Instances no entry matches go through the original converter.

use crate::host::tables::Converter;
use crate::model::class::InstanceClass;
use crate::model::instance::{RawInstance, WrapperObject};
use crate::model::key::Key;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

#[derive(Clone)]
pub struct DispatchEntry {
    class: Arc<InstanceClass>,
    kind: Key,
    wrapper: Converter,
}

impl DispatchEntry {
    pub fn class(&self) -> &InstanceClass {
        &self.class
    }

    pub fn kind(&self) -> &Key {
        &self.kind
    }
}

#[derive(Clone)]
pub struct DispatchList {
    entries: Vec<DispatchEntry>,
    fallback: Converter,
}

impl DispatchList {
    pub fn new(fallback: Converter) -> Self {
        Self {
            entries: Vec::new(),
            fallback,
        }
    }

    /// Inserts ahead of the first entry whose class is a supertype of `class`.
    pub fn insert(&mut self, class: Arc<InstanceClass>, kind: Key, wrapper: Converter) {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.class.is_assignable_from(&class))
            .unwrap_or(self.entries.len());
        self.entries.insert(
            position,
            DispatchEntry {
                class,
                kind,
                wrapper,
            },
        );
    }

    /// First entry whose class is assignable from `class`.
    pub fn resolve(&self, class: &InstanceClass) -> Option<&DispatchEntry> {
        self.entries
            .iter()
            .find(|entry| entry.class.is_assignable_from(class))
    }

    pub fn convert(&self, instance: &RawInstance) -> WrapperObject {
        match self.resolve(&instance.class) {
            Some(entry) => (entry.wrapper)(instance),
            None => (self.fallback)(instance),
        }
    }

    /// Class names in dispatch order.
    pub fn order(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.class.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_converter(self) -> Converter {
        Arc::new(move |instance: &RawInstance| self.convert(instance))
    }
}

impl Debug for DispatchList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchList")
            .field("order", &self.order())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::DispatchList;
    use crate::inject::declaration::named_wrapper;
    use crate::model::class::InstanceClass;
    use crate::model::instance::{InstanceId, Location, RawInstance};
    use crate::model::key::Key;
    use crate::model::kind::KindId;
    use std::sync::Arc;
    use uuid::Uuid;

    fn key(raw: &str) -> Key {
        Key::parse(raw).expect("key")
    }

    fn instance(class: &Arc<InstanceClass>) -> RawInstance {
        RawInstance {
            id: InstanceId(1),
            uuid: Uuid::new_v4(),
            kind: KindId(0),
            class: Arc::clone(class),
            location: Location::new(key("minecraft:overworld"), 0.0, 0.0, 0.0),
            living: true,
        }
    }

    #[test]
    fn most_specific_class_wins_regardless_of_order() {
        let zombie = InstanceClass::root("Zombie");
        let ghoul = InstanceClass::extending("Ghoul", &zombie);
        let elder = InstanceClass::extending("ElderGhoul", &ghoul);

        let mut list = DispatchList::new(named_wrapper("CraftZombie"));
        list.insert(Arc::clone(&ghoul), key("zoo:ghoul"), named_wrapper("Ghoul"));
        list.insert(Arc::clone(&elder), key("zoo:elder"), named_wrapper("Elder"));
        assert_eq!(list.order(), vec!["ElderGhoul", "Ghoul"]);

        assert_eq!(list.convert(&instance(&elder)).wrapper, "Elder");
        assert_eq!(list.convert(&instance(&ghoul)).wrapper, "Ghoul");
        assert_eq!(list.convert(&instance(&zombie)).wrapper, "CraftZombie");
    }

    #[test]
    fn unrelated_classes_keep_declaration_order() {
        let entity = InstanceClass::root("Entity");
        let first = InstanceClass::extending("First", &entity);
        let second = InstanceClass::extending("Second", &entity);
        let nested = InstanceClass::extending("Nested", &second);

        let mut list = DispatchList::new(named_wrapper("Fallback"));
        list.insert(first, key("zoo:first"), named_wrapper("First"));
        list.insert(second, key("zoo:second"), named_wrapper("Second"));
        list.insert(nested, key("zoo:nested"), named_wrapper("Nested"));
        assert_eq!(list.order(), vec!["First", "Nested", "Second"]);
        assert_eq!(list.len(), 3);
    }
}
