//! Shared injection state read by patched call sites.
//!
//! # Responsibility
//! - Publish the injected kind set and the backing-kind map once phase 1
//!   completes.
//! - Track which live instances are injected, living or variant-less.
//!
//! # Invariants
//! - The kind set is published at most once.
//! - Hooks only read; instance sets are written by construction and by
//!   persistence observation.

use crate::model::instance::InstanceId;
use crate::model::key::Key;
use crate::model::kind::KindId;
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Injected kinds and the backing kind each one disguises as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectedKinds {
    keys: BTreeMap<KindId, Key>,
    backing: BTreeMap<KindId, KindId>,
}

impl InjectedKinds {
    pub fn insert(&mut self, kind: KindId, key: Key, backing: KindId) {
        self.keys.insert(kind, key);
        self.backing.insert(kind, backing);
    }

    pub fn contains(&self, kind: KindId) -> bool {
        self.keys.contains_key(&kind)
    }

    pub fn key_of(&self, kind: KindId) -> Option<&Key> {
        self.keys.get(&kind)
    }

    pub fn backing_of(&self, kind: KindId) -> Option<KindId> {
        self.backing.get(&kind).copied()
    }

    /// Maps injected kinds to their backing kind; other kinds pass through.
    pub fn disguise(&self, kind: KindId) -> KindId {
        self.backing_of(kind).unwrap_or(kind)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Default)]
struct InstanceSets {
    injected: HashSet<InstanceId>,
    living: HashSet<InstanceId>,
    no_variant: HashSet<InstanceId>,
}

#[derive(Debug, Default)]
pub struct InjectionState {
    kinds: OnceCell<InjectedKinds>,
    instances: RwLock<InstanceSets>,
}

impl InjectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes the injected kind set. Returns `false` when already set.
    pub fn publish_kinds(&self, kinds: InjectedKinds) -> bool {
        self.kinds.set(kinds).is_ok()
    }

    pub fn kinds(&self) -> Option<&InjectedKinds> {
        self.kinds.get()
    }

    pub fn is_injected_kind(&self, kind: KindId) -> bool {
        self.kinds().is_some_and(|kinds| kinds.contains(kind))
    }

    pub fn disguise(&self, kind: KindId) -> KindId {
        self.kinds().map_or(kind, |kinds| kinds.disguise(kind))
    }

    /// Records a freshly constructed instance when its kind is injected.
    ///
    /// Marks left behind by an earlier instance with the same id are cleared.
    pub fn record_construction(&self, instance: InstanceId, kind: KindId, living: bool) -> bool {
        if !self.is_injected_kind(kind) {
            return false;
        }
        let mut sets = self.write();
        sets.injected.insert(instance);
        sets.no_variant.remove(&instance);
        if living {
            sets.living.insert(instance);
        } else {
            sets.living.remove(&instance);
        }
        true
    }

    pub fn mark_no_variant(&self, instance: InstanceId) {
        self.write().no_variant.insert(instance);
    }

    pub fn forget(&self, instance: InstanceId) {
        let mut sets = self.write();
        sets.injected.remove(&instance);
        sets.living.remove(&instance);
        sets.no_variant.remove(&instance);
    }

    pub fn is_injected(&self, instance: InstanceId) -> bool {
        self.read().injected.contains(&instance)
    }

    pub fn is_living(&self, instance: InstanceId) -> bool {
        self.read().living.contains(&instance)
    }

    pub fn has_no_variant(&self, instance: InstanceId) -> bool {
        self.read().no_variant.contains(&instance)
    }

    fn read(&self) -> RwLockReadGuard<'_, InstanceSets> {
        self.instances.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InstanceSets> {
        self.instances.write().unwrap_or_else(PoisonError::into_inner)
    }
}
