//! Injection unit: the frozen declaration set and the kinds built from it.
//!
//! # Responsibility
//! - Derive kind descriptors from backing kinds and register them in one
//!   unlock window.
//! - Copy data-fixer schemas and attribute profiles for new kinds.
//! - Merge spawn entries into biome spawn settings.
//! - Replace backing-kind converters with class-ordered dispatch lists.
//!
//! # Invariants
//! - Every declaration is validated against the host before the registry
//!   is unlocked; configuration errors leave host state untouched.
//! - Backing kinds without declarations keep their converter.

use crate::config::Verbosity;
use crate::host::registry::KindRegistry;
use crate::host::tables::{BiomeCatalog, ConversionTable};
use crate::host::HostParts;
use crate::inject::declaration::KindDeclaration;
use crate::inject::dispatch::DispatchList;
use crate::inject::index::InjectedKinds;
use crate::inject::ledger::check_unique;
use crate::inject::unlock::with_unlocked;
use crate::inject::InjectError;
use crate::model::key::Key;
use crate::model::kind::{AttributeProfile, KindBuilder, KindId};
use crate::patch::reflection::FieldAccess;
use log::{debug, info};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One registered injected kind.
#[derive(Debug, Clone)]
pub struct InjectedType {
    declaration: Arc<KindDeclaration>,
    id: KindId,
    backing: KindId,
}

impl InjectedType {
    pub fn key(&self) -> &Key {
        self.declaration.key()
    }

    pub fn declaration(&self) -> &KindDeclaration {
        &self.declaration
    }

    pub fn id(&self) -> KindId {
        self.id
    }

    pub fn backing(&self) -> KindId {
        self.backing
    }
}

/// Read-only view over injected kinds, indexed by class, key and id.
#[derive(Debug, Clone, Default)]
pub struct InjectedTypes {
    entries: Vec<InjectedType>,
    by_class: BTreeMap<String, usize>,
    by_key: BTreeMap<Key, usize>,
    by_id: BTreeMap<KindId, usize>,
}

impl InjectedTypes {
    fn push(&mut self, entry: InjectedType) {
        let index = self.entries.len();
        self.by_class
            .insert(entry.declaration.instance_class().name().to_string(), index);
        self.by_key.insert(entry.key().clone(), index);
        self.by_id.insert(entry.id, index);
        self.entries.push(entry);
    }

    pub fn by_class(&self, class: &str) -> Option<&InjectedType> {
        self.by_class.get(class).map(|index| &self.entries[*index])
    }

    pub fn by_key(&self, key: &Key) -> Option<&InjectedType> {
        self.by_key.get(key).map(|index| &self.entries[*index])
    }

    pub fn by_id(&self, id: KindId) -> Option<&InjectedType> {
        self.by_id.get(&id).map(|index| &self.entries[*index])
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &InjectedType> {
        self.entries.iter()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Prepared {
    descriptor_index: usize,
    backing: KindId,
    schema_id: String,
    attributes: Option<AttributeProfile>,
}

#[derive(Debug)]
pub struct InjectionUnit {
    declarations: Vec<Arc<KindDeclaration>>,
    types: InjectedTypes,
}

impl InjectionUnit {
    /// Freezes `declarations`, checking key and class uniqueness again.
    pub fn freeze(declarations: Vec<KindDeclaration>) -> Result<Self, InjectError> {
        let mut frozen: Vec<KindDeclaration> = Vec::with_capacity(declarations.len());
        for declaration in declarations {
            check_unique(&frozen, &declaration)?;
            frozen.push(declaration);
        }
        Ok(Self {
            declarations: frozen.into_iter().map(Arc::new).collect(),
            types: InjectedTypes::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn declarations(&self) -> impl Iterator<Item = &KindDeclaration> {
        self.declarations.iter().map(|declaration| declaration.as_ref())
    }

    pub fn types(&self) -> &InjectedTypes {
        &self.types
    }

    pub fn into_types(self) -> InjectedTypes {
        self.types
    }

    /// Registers one kind per declaration and copies its side tables.
    ///
    /// # Errors
    /// - [`InjectError::UnknownBackingKind`] / [`InjectError::MissingSchema`]
    ///   before any host mutation.
    /// - Registry and unlock failures from the registration window.
    pub fn create_types(
        &mut self,
        parts: &mut HostParts<'_>,
        verbosity: Verbosity,
    ) -> Result<InjectedKinds, InjectError> {
        let mut descriptors = Vec::with_capacity(self.declarations.len());
        let mut prepared = Vec::with_capacity(self.declarations.len());
        for declaration in &self.declarations {
            let key = declaration.key();
            let backing_key = declaration.backing();
            let backing = parts
                .kinds
                .id_of(backing_key)
                .ok_or_else(|| InjectError::UnknownBackingKind {
                    kind: key.clone(),
                    backing: backing_key.clone(),
                })?;
            let shape = parts
                .kinds
                .get(backing)
                .ok_or_else(|| InjectError::UnknownBackingKind {
                    kind: key.clone(),
                    backing: backing_key.clone(),
                })?;
            if parts.schemas.get(&backing_key.as_string()).is_none() {
                return Err(InjectError::MissingSchema {
                    kind: key.clone(),
                    backing: backing_key.clone(),
                });
            }

            let mut builder =
                KindBuilder::of(key.clone(), declaration.category(), declaration.factory().clone());
            builder
                .sized(shape.dimensions.width, shape.dimensions.height)
                .eye_height(shape.dimensions.eye_height)
                .tracking_range(shape.tracking_range);
            declaration.customize(&mut builder);
            let descriptor = builder.build();

            let attributes = descriptor.living.then(|| {
                declaration
                    .attributes()
                    .or_else(|| parts.attributes.get(backing))
                    .cloned()
                    .unwrap_or_else(AttributeProfile::living_defaults)
            });
            if verbosity.verbose() {
                info!(
                    "event=kind_prepare module=injector kind={key} backing={backing_key} class={} living={}",
                    declaration.instance_class().name(),
                    descriptor.living
                );
            }
            prepared.push(Prepared {
                descriptor_index: descriptors.len(),
                backing,
                schema_id: backing_key.as_string(),
                attributes,
            });
            descriptors.push(descriptor);
        }

        let ids = with_unlocked(&mut *parts.kinds, |unlocked| {
            let mut ids = Vec::with_capacity(descriptors.len());
            for descriptor in descriptors {
                ids.push(unlocked.register(descriptor)?);
            }
            Ok::<_, InjectError>(ids)
        })?;

        let mut kinds = InjectedKinds::default();
        for (declaration, step) in self.declarations.iter().zip(prepared) {
            let id = ids[step.descriptor_index];
            let key = declaration.key();
            if let Some(schema) = parts.schemas.get(&step.schema_id).cloned() {
                parts.schemas.insert(&key.as_string(), schema);
            }
            if let Some(profile) = step.attributes {
                parts.attributes.insert(id, profile);
            }
            kinds.insert(id, key.clone(), step.backing);
            self.types.push(InjectedType {
                declaration: Arc::clone(declaration),
                id,
                backing: step.backing,
            });
            debug!(
                "event=kind_register module=injector kind={key} id={id} backing={}",
                step.backing
            );
        }
        Ok(kinds)
    }

    /// Merges each declaration's spawn entries into every biome.
    /// Returns the number of entries added.
    pub fn wire_spawn_tables(
        &self,
        biomes: &mut dyn BiomeCatalog,
        verbosity: Verbosity,
    ) -> Result<usize, InjectError> {
        let mut added = 0;
        for biome in biomes.biomes() {
            let mut settings = biomes.spawn_settings(&biome.key).cloned().unwrap_or_default();
            let mut changed = false;
            for entry in self.types.iter() {
                let declaration = entry.declaration();
                let Some(data) = declaration.spawn_rule().apply(&biome) else {
                    continue;
                };
                settings
                    .spawners
                    .entry(declaration.category())
                    .or_default()
                    .push(data.spawner(entry.id()));
                if let Some(cost) = data.cost {
                    settings.costs.insert(entry.id(), cost);
                }
                changed = true;
                added += 1;
                if verbosity.verbose() {
                    info!(
                        "event=spawn_entry module=injector kind={} biome={} weight={} group={}..{}",
                        entry.key(),
                        biome.key,
                        data.weight,
                        data.min_group,
                        data.max_group
                    );
                }
            }
            if changed {
                biomes.replace_spawn_settings(&biome.key, settings)?;
            }
        }
        Ok(added)
    }

    /// Rewires the converter of every backing kind that has declarations.
    /// Returns the number of backing kinds rewired.
    pub fn wire_dispatch(
        &self,
        kinds: &dyn KindRegistry,
        conversions: &mut dyn ConversionTable,
        access: &FieldAccess,
    ) -> Result<usize, InjectError> {
        let mut lists: BTreeMap<KindId, DispatchList> = BTreeMap::new();
        for entry in self.types.iter() {
            let list = match lists.entry(entry.backing()) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => {
                    let fallback = conversions.resolve(entry.backing()).ok_or_else(|| {
                        InjectError::MissingConverter {
                            backing: backing_key(kinds, entry),
                        }
                    })?;
                    slot.insert(DispatchList::new(fallback))
                }
            };
            let declaration = entry.declaration();
            list.insert(
                Arc::clone(declaration.instance_class()),
                entry.key().clone(),
                declaration.wrapper().clone(),
            );
        }

        let rewired = lists.len();
        for (backing, list) in lists {
            debug!(
                "event=dispatch_wire module=injector backing={backing} order={}",
                list.order().join(",")
            );
            conversions.replace(access, backing, list.into_converter())?;
        }
        for entry in self.types.iter() {
            conversions.alias(access, entry.id(), entry.backing())?;
        }
        Ok(rewired)
    }
}

fn backing_key(kinds: &dyn KindRegistry, entry: &InjectedType) -> Key {
    kinds
        .get(entry.backing())
        .map(|descriptor| descriptor.key.clone())
        .unwrap_or_else(|| entry.declaration().backing().clone())
}
