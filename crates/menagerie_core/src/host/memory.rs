//! In-process reference host.
//!
//! # Responsibility
//! - Implement every host contract over plain collections.
//! - Ship a small vanilla content set (classes, kinds, schemas, biomes,
//!   converters) the pipeline can inject against.
//!
//! # Invariants
//! - The kind registry is sealed after vanilla bootstrap.
//! - Packet encoders and instance construction always run through the code
//!   table, so installed patches observe them.

use crate::host::code::{
    CodeTable, FunctionBody, Hook, Instruction, Invocation, Native, NativeOp, Signature, Value,
    FILTER_FIELDS, INSTANCE_INIT, SPAWN_PACKET_INIT, STATE_PACKET_INIT, TOOLTIP_INIT,
};
use crate::host::registry::{HolderIndex, KindRegistry};
use crate::host::tables::{
    AttributeTable, Biome, BiomeCatalog, ConversionTable, Converter, SchemaEntry, SchemaTable,
    SpawnSettings, WeightedSpawner,
};
use crate::host::{Environment, Host, HostError, HostParts};
use crate::inject::unlock::{FreezeLatch, HolderLatch};
use crate::model::class::{InstanceClass, ENTITY_CLASS, LIVING_CLASS};
use crate::model::instance::{
    DataPayload, DataValue, InstanceId, Location, RawInstance, SpawnPacket, StatePacket, Tooltip,
    WrapperObject,
};
use crate::model::key::Key;
use crate::model::kind::{
    AttributeProfile, Category, Dimensions, InstanceFactory, KindBuilder, KindDescriptor, KindId,
};
use crate::patch::reflection::FieldAccess;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

pub const KIND_REGISTRY_NAME: &str = "minecraft:entity_type";
pub const CONVERSION_OWNER: &str = "CraftEntityTypes";
pub const CONVERSION_FIELD: &str = "ENTITY_TYPE_DATA";
const FILTER_NATIVE: &str = "reflection.filter";

#[derive(Debug)]
pub struct MemoryKindRegistry {
    name: String,
    entries: Vec<KindDescriptor>,
    by_key: BTreeMap<Key, KindId>,
    frozen: bool,
    holders: Option<HolderIndex>,
}

impl MemoryKindRegistry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
            by_key: BTreeMap::new(),
            frozen: false,
            holders: None,
        }
    }

    /// Ends bootstrap: freezes the registry and closes the holder index.
    pub fn seal(&mut self) {
        self.frozen = true;
        self.holders = None;
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|entry| &entry.key)
    }
}

impl KindRegistry for MemoryKindRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, id: KindId) -> Option<&KindDescriptor> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.entries.get(index))
    }

    fn id_of(&self, key: &Key) -> Option<KindId> {
        self.by_key.get(key).copied()
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn holder_index(&self) -> Option<&HolderIndex> {
        self.holders.as_ref()
    }

    fn create_intrusive_holder(&mut self, key: &Key) -> Result<(), HostError> {
        let holders = self
            .holders
            .as_mut()
            .ok_or_else(|| HostError::HolderIndexClosed(self.name.clone()))?;
        holders.insert(key.clone());
        Ok(())
    }

    fn register(&mut self, descriptor: KindDescriptor) -> Result<KindId, HostError> {
        if self.frozen {
            return Err(HostError::RegistryFrozen(self.name.clone()));
        }
        if self.by_key.contains_key(&descriptor.key) {
            return Err(HostError::DuplicateKey(descriptor.key));
        }
        if let Some(holders) = self.holders.as_mut() {
            if !holders.remove(&descriptor.key) {
                return Err(HostError::MissingIntrusiveHolder(descriptor.key));
            }
        }
        let raw = u32::try_from(self.entries.len())
            .map_err(|_| HostError::RegistryFrozen(self.name.clone()))?;
        let id = KindId(raw);
        self.by_key.insert(descriptor.key.clone(), id);
        self.entries.push(descriptor);
        Ok(id)
    }

    fn set_frozen(&mut self, _latch: &FreezeLatch, frozen: bool) {
        self.frozen = frozen;
    }

    fn replace_holder_index(
        &mut self,
        _latch: &HolderLatch,
        index: Option<HolderIndex>,
    ) -> Option<HolderIndex> {
        std::mem::replace(&mut self.holders, index)
    }
}

#[derive(Debug, Default)]
pub struct MemorySchemaTable {
    entries: BTreeMap<String, SchemaEntry>,
}

impl SchemaTable for MemorySchemaTable {
    fn get(&self, id: &str) -> Option<&SchemaEntry> {
        self.entries.get(id)
    }

    fn insert(&mut self, id: &str, entry: SchemaEntry) {
        self.entries.insert(id.to_string(), entry);
    }
}

#[derive(Debug, Default)]
pub struct MemoryAttributeTable {
    profiles: BTreeMap<KindId, AttributeProfile>,
}

impl AttributeTable for MemoryAttributeTable {
    fn get(&self, kind: KindId) -> Option<&AttributeProfile> {
        self.profiles.get(&kind)
    }

    fn insert(&mut self, kind: KindId, profile: AttributeProfile) {
        self.profiles.insert(kind, profile);
    }
}

#[derive(Debug, Default)]
pub struct MemoryBiomeCatalog {
    biomes: BTreeMap<Key, Biome>,
    settings: BTreeMap<Key, SpawnSettings>,
}

impl MemoryBiomeCatalog {
    pub fn add(&mut self, biome: Biome, settings: SpawnSettings) {
        self.settings.insert(biome.key.clone(), settings);
        self.biomes.insert(biome.key.clone(), biome);
    }
}

impl BiomeCatalog for MemoryBiomeCatalog {
    fn biomes(&self) -> Vec<Biome> {
        self.biomes.values().cloned().collect()
    }

    fn biome(&self, key: &Key) -> Option<&Biome> {
        self.biomes.get(key)
    }

    fn spawn_settings(&self, biome: &Key) -> Option<&SpawnSettings> {
        self.settings.get(biome)
    }

    fn replace_spawn_settings(
        &mut self,
        biome: &Key,
        settings: SpawnSettings,
    ) -> Result<(), HostError> {
        let slot = self
            .settings
            .get_mut(biome)
            .ok_or_else(|| HostError::UnknownBiome(biome.clone()))?;
        *slot = settings;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryConversionTable {
    converters: BTreeMap<KindId, Converter>,
    aliases: BTreeMap<KindId, KindId>,
}

impl MemoryConversionTable {
    /// Bootstrap registration; the table is sealed afterwards.
    fn seed(&mut self, kind: KindId, converter: Converter) {
        self.converters.insert(kind, converter);
    }

    fn check(&self, access: &FieldAccess) -> Result<(), HostError> {
        if access.grants(CONVERSION_OWNER, CONVERSION_FIELD) {
            Ok(())
        } else {
            Err(HostError::AccessDenied {
                owner: CONVERSION_OWNER.to_string(),
                field: CONVERSION_FIELD.to_string(),
            })
        }
    }
}

impl ConversionTable for MemoryConversionTable {
    fn owner(&self) -> &str {
        CONVERSION_OWNER
    }

    fn declared_fields(&self) -> Vec<String> {
        vec![CONVERSION_FIELD.to_string(), "CLASS_TYPE_DATA".to_string()]
    }

    fn sealed_field(&self) -> &str {
        CONVERSION_FIELD
    }

    fn resolve(&self, kind: KindId) -> Option<Converter> {
        let target = self.aliases.get(&kind).copied().unwrap_or(kind);
        self.converters.get(&target).cloned()
    }

    fn replace(
        &mut self,
        access: &FieldAccess,
        kind: KindId,
        converter: Converter,
    ) -> Result<(), HostError> {
        self.check(access)?;
        self.converters.insert(kind, converter);
        Ok(())
    }

    fn alias(
        &mut self,
        access: &FieldAccess,
        kind: KindId,
        target: KindId,
    ) -> Result<(), HostError> {
        self.check(access)?;
        self.aliases.insert(kind, target);
        Ok(())
    }
}

pub struct MemoryCodeTable {
    bodies: BTreeMap<Signature, FunctionBody>,
    hooks: BTreeMap<String, Hook>,
    natives: BTreeMap<String, Native>,
    reflection_cache: BTreeMap<String, Vec<String>>,
    redefinitions: usize,
}

impl MemoryCodeTable {
    /// Code table with stock call sites. `privileged` lists fields the
    /// reflection filter hides, per owner.
    pub fn new(privileged: BTreeMap<String, BTreeSet<String>>) -> Self {
        let filter: Native = Arc::new(move |args: &[Value]| match args {
            [Value::Text(owner), Value::Names(fields)] => {
                let hidden = privileged.get(owner);
                let visible = fields
                    .iter()
                    .filter(|field| !hidden.is_some_and(|hidden| hidden.contains(*field)))
                    .cloned()
                    .collect();
                Ok(vec![Value::Names(visible)])
            }
            other => Err(format!("unexpected filter operands: {other:?}")),
        });

        let mut bodies = BTreeMap::new();
        for signature in [INSTANCE_INIT, STATE_PACKET_INIT, SPAWN_PACKET_INIT, TOOLTIP_INIT] {
            bodies.insert(
                signature,
                FunctionBody::new(signature, vec![Instruction::Return]),
            );
        }
        bodies.insert(
            FILTER_FIELDS,
            FunctionBody::new(
                FILTER_FIELDS,
                vec![
                    Instruction::Load(0),
                    Instruction::Load(1),
                    Instruction::Native(NativeOp {
                        name: FILTER_NATIVE.to_string(),
                        pops: 2,
                        pushes: 1,
                    }),
                    Instruction::ReturnValue,
                ],
            ),
        );

        let mut natives = BTreeMap::new();
        natives.insert(FILTER_NATIVE.to_string(), filter);
        Self {
            bodies,
            hooks: BTreeMap::new(),
            natives,
            reflection_cache: BTreeMap::new(),
            redefinitions: 0,
        }
    }

    pub fn is_reflection_cached(&self, owner: &str) -> bool {
        self.reflection_cache.contains_key(owner)
    }
}

impl CodeTable for MemoryCodeTable {
    fn body(&self, signature: &Signature) -> Option<&FunctionBody> {
        self.bodies.get(signature)
    }

    fn install_hook(&mut self, id: &str, hook: Hook) {
        self.hooks.insert(id.to_string(), hook);
    }

    fn redefine(&mut self, definitions: Vec<FunctionBody>) -> Result<(), HostError> {
        for definition in &definitions {
            if !self.bodies.contains_key(&definition.signature) {
                return Err(HostError::UnknownFunction(definition.signature));
            }
            definition.verify()?;
        }
        let count = definitions.len();
        for definition in definitions {
            self.bodies.insert(definition.signature, definition);
        }
        self.redefinitions += 1;
        debug!("event=code_redefine module=host functions={count}");
        Ok(())
    }

    fn redefinitions(&self) -> usize {
        self.redefinitions
    }

    fn invoke(
        &mut self,
        signature: &Signature,
        mut slots: Vec<Value>,
    ) -> Result<Invocation, HostError> {
        let body = self
            .bodies
            .get(signature)
            .ok_or(HostError::UnknownFunction(*signature))?;
        let hooks = &self.hooks;
        let natives = &self.natives;
        let returned = body.execute(&mut slots, |id| hooks.get(id), |name| natives.get(name))?;
        Ok(Invocation { slots, returned })
    }

    fn reflect_fields(
        &mut self,
        owner: &str,
        declared: &[String],
    ) -> Result<Vec<String>, HostError> {
        if let Some(cached) = self.reflection_cache.get(owner) {
            return Ok(cached.clone());
        }
        let invocation = self.invoke(
            &FILTER_FIELDS,
            vec![
                Value::Text(owner.to_string()),
                Value::Names(declared.to_vec()),
            ],
        )?;
        let Value::Names(visible) = invocation.returned else {
            return Err(HostError::Invocation {
                signature: FILTER_FIELDS,
                message: "filter returned a non-field value".to_string(),
            });
        };
        self.reflection_cache
            .insert(owner.to_string(), visible.clone());
        Ok(visible)
    }

    fn clear_reflection_cache(&mut self) {
        self.reflection_cache.clear();
    }
}

/// In-memory host with vanilla content.
pub struct MemoryHost {
    kinds: MemoryKindRegistry,
    schemas: MemorySchemaTable,
    attributes: MemoryAttributeTable,
    biomes: MemoryBiomeCatalog,
    conversions: MemoryConversionTable,
    code: MemoryCodeTable,
    classes: BTreeMap<String, Arc<InstanceClass>>,
    instances: BTreeMap<InstanceId, RawInstance>,
    states: BTreeMap<InstanceId, Vec<DataValue>>,
    environments: BTreeMap<Key, Environment>,
    default_environment: Environment,
    next_instance: i32,
}

struct VanillaKind {
    key: &'static str,
    class: &'static str,
    category: Category,
    dimensions: Dimensions,
    tracking_range: u32,
    wrapper: &'static str,
    schema: bool,
}

const VANILLA_KINDS: &[VanillaKind] = &[
    VanillaKind {
        key: "minecraft:zombie",
        class: "Zombie",
        category: Category::Monster,
        dimensions: Dimensions {
            width: 0.6,
            height: 1.95,
            eye_height: 1.74,
        },
        tracking_range: 8,
        wrapper: "CraftZombie",
        schema: true,
    },
    VanillaKind {
        key: "minecraft:pig",
        class: "Pig",
        category: Category::Creature,
        dimensions: Dimensions {
            width: 0.9,
            height: 0.9,
            eye_height: 0.765,
        },
        tracking_range: 10,
        wrapper: "CraftPig",
        schema: true,
    },
    VanillaKind {
        key: "minecraft:cow",
        class: "Cow",
        category: Category::Creature,
        dimensions: Dimensions {
            width: 0.9,
            height: 1.4,
            eye_height: 1.3,
        },
        tracking_range: 10,
        wrapper: "CraftCow",
        schema: true,
    },
    VanillaKind {
        key: "minecraft:item",
        class: "ItemEntity",
        category: Category::Misc,
        dimensions: Dimensions {
            width: 0.25,
            height: 0.25,
            eye_height: 0.2125,
        },
        tracking_range: 6,
        wrapper: "CraftItem",
        schema: true,
    },
    VanillaKind {
        key: "minecraft:marker",
        class: "Marker",
        category: Category::Misc,
        dimensions: Dimensions {
            width: 0.0,
            height: 0.0,
            eye_height: 0.0,
        },
        tracking_range: 0,
        wrapper: "CraftMarker",
        schema: false,
    },
];

/// `(class, parent)` pairs, parents first.
const VANILLA_CLASSES: &[(&str, &str)] = &[
    (LIVING_CLASS, ENTITY_CLASS),
    ("Mob", LIVING_CLASS),
    ("Monster", "Mob"),
    ("Zombie", "Monster"),
    ("Animal", "Mob"),
    ("Pig", "Animal"),
    ("Cow", "Animal"),
    ("ItemEntity", ENTITY_CLASS),
    ("Marker", ENTITY_CLASS),
];

/// `(biome, base temperature, tags)`.
const VANILLA_BIOMES: &[(&str, f32, &[&str])] = &[
    ("minecraft:plains", 0.8, &["minecraft:is_overworld"]),
    ("minecraft:desert", 2.0, &["minecraft:is_overworld", "minecraft:is_hot"]),
    ("minecraft:snowy_plains", 0.0, &["minecraft:is_overworld"]),
    ("minecraft:ocean", 0.5, &["minecraft:is_overworld", "minecraft:is_ocean"]),
    ("minecraft:nether_wastes", 2.0, &["minecraft:is_nether"]),
    ("minecraft:the_end", 0.5, &["minecraft:is_end"]),
];

/// `(world, biome, temperature)`.
const VANILLA_WORLDS: &[(&str, &str, f64)] = &[
    ("minecraft:overworld", "minecraft:plains", 0.8),
    ("minecraft:the_nether", "minecraft:nether_wastes", 2.0),
    ("minecraft:the_end", "minecraft:the_end", 0.5),
];

fn vanilla_key(raw: &str) -> Key {
    Key::builtin(raw)
}

fn living_state(_: &Location) -> Vec<DataValue> {
    vec![
        DataValue::new(0, DataPayload::Byte(0)),
        DataValue::new(1, DataPayload::Int(300)),
        DataValue::new(9, DataPayload::Float(20.0)),
        DataValue::new(16, DataPayload::Byte(0)),
    ]
}

fn base_state(_: &Location) -> Vec<DataValue> {
    vec![
        DataValue::new(0, DataPayload::Byte(0)),
        DataValue::new(1, DataPayload::Int(300)),
        DataValue::new(8, DataPayload::Text(String::new())),
    ]
}

impl MemoryHost {
    /// Host with vanilla classes, kinds, biomes and worlds, sealed.
    pub fn vanilla() -> Self {
        let mut classes = BTreeMap::new();
        classes.insert(ENTITY_CLASS.to_string(), InstanceClass::root(ENTITY_CLASS));
        for (name, parent) in VANILLA_CLASSES {
            if let Some(parent) = classes.get(*parent).cloned() {
                classes.insert((*name).to_string(), InstanceClass::extending(*name, &parent));
            }
        }

        let mut privileged = BTreeMap::new();
        privileged.insert(
            CONVERSION_OWNER.to_string(),
            BTreeSet::from([CONVERSION_FIELD.to_string()]),
        );

        let mut host = Self {
            kinds: MemoryKindRegistry::new(KIND_REGISTRY_NAME),
            schemas: MemorySchemaTable::default(),
            attributes: MemoryAttributeTable::default(),
            biomes: MemoryBiomeCatalog::default(),
            conversions: MemoryConversionTable::default(),
            code: MemoryCodeTable::new(privileged),
            classes,
            instances: BTreeMap::new(),
            states: BTreeMap::new(),
            environments: BTreeMap::new(),
            default_environment: Environment {
                biome: vanilla_key("minecraft:plains"),
                temperature: 0.8,
            },
            next_instance: 1,
        };

        for vanilla in VANILLA_KINDS {
            let Some(class) = host.classes.get(vanilla.class).cloned() else {
                continue;
            };
            let living = class.extends(LIVING_CLASS);
            let factory = if living {
                InstanceFactory::new(class, living_state)
            } else {
                InstanceFactory::new(class, base_state)
            };
            let key = vanilla_key(vanilla.key);
            let mut builder = KindBuilder::of(key.clone(), vanilla.category, factory);
            builder
                .sized(vanilla.dimensions.width, vanilla.dimensions.height)
                .eye_height(vanilla.dimensions.eye_height)
                .tracking_range(vanilla.tracking_range);
            let Ok(id) = host.kinds.register(builder.build()) else {
                continue;
            };
            if vanilla.schema {
                host.schemas.insert(
                    &key.as_string(),
                    SchemaEntry {
                        name: key.as_string(),
                        fields: vec!["id".to_string(), "Pos".to_string(), "UUID".to_string()],
                    },
                );
            }
            if living {
                host.attributes.insert(id, vanilla_attributes(vanilla.key));
            }
            let wrapper = vanilla.wrapper;
            host.conversions.seed(
                id,
                Arc::new(move |instance: &RawInstance| WrapperObject {
                    instance: instance.id,
                    kind: instance.kind,
                    wrapper: wrapper.to_string(),
                }),
            );
        }

        for (raw, temperature, tags) in VANILLA_BIOMES {
            let key = vanilla_key(raw);
            let tags = tags.iter().map(|tag| vanilla_key(tag)).collect();
            let settings = host.vanilla_spawns(&key);
            host.biomes.add(
                Biome {
                    key,
                    base_temperature: *temperature,
                    tags,
                },
                settings,
            );
        }

        for (world, biome, temperature) in VANILLA_WORLDS {
            host.environments.insert(
                vanilla_key(world),
                Environment {
                    biome: vanilla_key(biome),
                    temperature: *temperature,
                },
            );
        }

        host.kinds.seal();
        host
    }

    fn vanilla_spawns(&self, biome: &Key) -> SpawnSettings {
        let mut settings = SpawnSettings::default();
        let id = |raw: &str| self.kinds.id_of(&vanilla_key(raw));
        let overworld = biome.value() != "nether_wastes" && biome.value() != "the_end";
        if !overworld {
            return settings;
        }
        if let Some(zombie) = id("minecraft:zombie") {
            settings.spawners.insert(
                Category::Monster,
                vec![WeightedSpawner {
                    kind: zombie,
                    weight: 95,
                    min_group: 4,
                    max_group: 4,
                }],
            );
        }
        if biome.value() != "desert" {
            let creatures = ["minecraft:pig", "minecraft:cow"]
                .iter()
                .filter_map(|raw| id(raw))
                .map(|kind| WeightedSpawner {
                    kind,
                    weight: 10,
                    min_group: 4,
                    max_group: 4,
                })
                .collect();
            settings.spawners.insert(Category::Creature, creatures);
        }
        settings
    }

    pub fn class(&self, name: &str) -> Option<Arc<InstanceClass>> {
        self.classes.get(name).cloned()
    }

    /// Declares an additional class, as a plugin would ship one.
    pub fn define_class(&mut self, name: &str, parent: &str) -> Option<Arc<InstanceClass>> {
        let parent = self.classes.get(parent).cloned()?;
        let class = InstanceClass::extending(name, &parent);
        self.classes.insert(name.to_string(), Arc::clone(&class));
        Some(class)
    }

    pub fn kinds(&self) -> &MemoryKindRegistry {
        &self.kinds
    }

    pub fn schemas(&self) -> &MemorySchemaTable {
        &self.schemas
    }

    pub fn attributes(&self) -> &MemoryAttributeTable {
        &self.attributes
    }

    pub fn biomes(&self) -> &MemoryBiomeCatalog {
        &self.biomes
    }

    pub fn conversions(&self) -> &MemoryConversionTable {
        &self.conversions
    }

    pub fn code(&self) -> &MemoryCodeTable {
        &self.code
    }

    pub fn code_mut(&mut self) -> &mut MemoryCodeTable {
        &mut self.code
    }

    pub fn set_environment(&mut self, world: Key, environment: Environment) {
        self.environments.insert(world, environment);
    }

    /// Current synchronized state of an instance.
    pub fn state(&self, id: InstanceId) -> Option<&[DataValue]> {
        self.states.get(&id).map(Vec::as_slice)
    }

    /// Reconstructs a previously saved instance under a fresh runtime id.
    pub fn reload_instance(
        &mut self,
        kind: KindId,
        uuid: Uuid,
        location: Location,
    ) -> Result<RawInstance, HostError> {
        let mut instance = self.construct_instance(kind, location)?;
        instance.uuid = uuid;
        self.instances.insert(instance.id, instance.clone());
        Ok(instance)
    }

    pub fn remove_instance(&mut self, id: InstanceId) -> Option<RawInstance> {
        self.states.remove(&id);
        self.instances.remove(&id)
    }

    fn instance_or_err(&self, id: InstanceId) -> Result<&RawInstance, HostError> {
        self.instances.get(&id).ok_or(HostError::UnknownInstance(id))
    }
}

fn vanilla_attributes(key: &str) -> AttributeProfile {
    match key {
        "minecraft:zombie" => AttributeProfile::living_defaults()
            .with("movement_speed", 0.23)
            .with("attack_damage", 3.0)
            .with("follow_range", 35.0),
        "minecraft:pig" => AttributeProfile::living_defaults()
            .with("max_health", 10.0)
            .with("movement_speed", 0.25),
        "minecraft:cow" => AttributeProfile::living_defaults()
            .with("max_health", 10.0)
            .with("movement_speed", 0.2),
        _ => AttributeProfile::living_defaults(),
    }
}

fn slot_kind(
    invocation: &Invocation,
    slot: usize,
    signature: Signature,
) -> Result<KindId, HostError> {
    match invocation.slots.get(slot) {
        Some(Value::Kind(kind)) => Ok(*kind),
        other => Err(HostError::Invocation {
            signature,
            message: format!("slot {slot} does not hold a kind: {other:?}"),
        }),
    }
}

impl Host for MemoryHost {
    fn parts(&mut self) -> HostParts<'_> {
        HostParts {
            kinds: &mut self.kinds,
            schemas: &mut self.schemas,
            attributes: &mut self.attributes,
            biomes: &mut self.biomes,
            conversions: &mut self.conversions,
            code: &mut self.code,
        }
    }

    fn construct_instance(
        &mut self,
        kind: KindId,
        location: Location,
    ) -> Result<RawInstance, HostError> {
        let descriptor = self
            .kinds
            .get(kind)
            .ok_or_else(|| HostError::UnknownKind(kind.to_string()))?;
        let id = InstanceId(self.next_instance);
        let instance = RawInstance {
            id,
            uuid: Uuid::new_v4(),
            kind,
            class: Arc::clone(descriptor.factory.class()),
            living: descriptor.living,
            location,
        };
        let state = descriptor.factory.initial_state(&instance.location);

        self.code.invoke(
            &INSTANCE_INIT,
            vec![
                Value::Instance {
                    id,
                    living: instance.living,
                },
                Value::Kind(kind),
            ],
        )?;
        self.next_instance += 1;
        self.states.insert(id, state);
        self.instances.insert(id, instance.clone());
        Ok(instance)
    }

    fn instance(&self, id: InstanceId) -> Option<&RawInstance> {
        self.instances.get(&id)
    }

    fn environment(&self, location: &Location) -> Environment {
        self.environments
            .get(&location.world)
            .cloned()
            .unwrap_or_else(|| self.default_environment.clone())
    }

    fn encode_spawn_packet(&mut self, id: InstanceId) -> Result<SpawnPacket, HostError> {
        let instance = self.instance_or_err(id)?;
        let (uuid, kind) = (instance.uuid, instance.kind);
        let invocation = self.code.invoke(
            &SPAWN_PACKET_INIT,
            vec![Value::Int(i64::from(id.0)), Value::Uuid(uuid), Value::Kind(kind)],
        )?;
        Ok(SpawnPacket {
            instance: id,
            uuid,
            kind: slot_kind(&invocation, 2, SPAWN_PACKET_INIT)?,
        })
    }

    fn encode_state_packet(
        &mut self,
        id: InstanceId,
        values: Vec<DataValue>,
    ) -> Result<StatePacket, HostError> {
        self.instance_or_err(id)?;
        let invocation = self.code.invoke(
            &STATE_PACKET_INIT,
            vec![Value::Int(i64::from(id.0)), Value::Data(values)],
        )?;
        match invocation.slots.into_iter().nth(1) {
            Some(Value::Data(values)) => Ok(StatePacket {
                instance: id,
                values,
            }),
            other => Err(HostError::Invocation {
                signature: STATE_PACKET_INIT,
                message: format!("slot 1 does not hold state values: {other:?}"),
            }),
        }
    }

    fn encode_tooltip(&mut self, id: InstanceId) -> Result<Tooltip, HostError> {
        let instance = self.instance_or_err(id)?;
        let (uuid, kind) = (instance.uuid, instance.kind);
        let invocation = self
            .code
            .invoke(&TOOLTIP_INIT, vec![Value::Kind(kind), Value::Uuid(uuid)])?;
        Ok(Tooltip {
            kind: slot_kind(&invocation, 0, TOOLTIP_INIT)?,
            uuid,
        })
    }

    fn convert(&self, id: InstanceId) -> Result<WrapperObject, HostError> {
        let instance = self.instance_or_err(id)?;
        let converter = self
            .conversions
            .resolve(instance.kind)
            .ok_or_else(|| HostError::UnknownKind(instance.kind.to_string()))?;
        Ok(converter(instance))
    }
}
