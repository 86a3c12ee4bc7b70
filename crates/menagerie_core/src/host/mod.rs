//! Host runtime contracts.
//!
//! # Responsibility
//! - Describe every host structure the engine reads or rewrites.
//! - Keep privileged mutations behind typed capability arguments.
//!
//! # Invariants
//! - Freeze flag and intrusive-holder index are only writable with latches
//!   minted by `inject::unlock`.
//! - Sealed conversion entries are only writable with a reflective
//!   `FieldAccess` grant minted by `patch::reflection`.
//! - Host call sites that were patched run through `CodeTable::invoke`.

pub mod appearance;
pub mod code;
pub mod memory;
pub mod registry;
pub mod tables;

use crate::model::instance::{
    DataValue, InstanceId, Location, RawInstance, SpawnPacket, StatePacket, Tooltip, WrapperObject,
};
use crate::model::key::Key;
use crate::model::kind::KindId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use appearance::{AppearanceError, AppearanceService, MemoryAppearanceService};
pub use code::{CodeTable, FunctionBody, Hook, HookRef, Instruction, Invocation, Signature, Value};
pub use memory::MemoryHost;
pub use registry::KindRegistry;
pub use tables::{
    AttributeTable, Biome, BiomeCatalog, ConversionTable, Converter, SchemaEntry, SchemaTable,
    SpawnCost, SpawnSettings, WeightedSpawner,
};

/// Disjoint mutable views over host structures.
pub struct HostParts<'a> {
    pub kinds: &'a mut dyn KindRegistry,
    pub schemas: &'a mut dyn SchemaTable,
    pub attributes: &'a mut dyn AttributeTable,
    pub biomes: &'a mut dyn BiomeCatalog,
    pub conversions: &'a mut dyn ConversionTable,
    pub code: &'a mut dyn CodeTable,
}

/// Environmental data at a location, used by spawn contexts.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub biome: Key,
    pub temperature: f64,
}

/// Host runtime the pipeline injects into.
pub trait Host {
    fn parts(&mut self) -> HostParts<'_>;

    /// Constructs a new instance of `kind`. Runs the instance-init call site.
    fn construct_instance(
        &mut self,
        kind: KindId,
        location: Location,
    ) -> Result<RawInstance, HostError>;

    fn instance(&self, id: InstanceId) -> Option<&RawInstance>;

    fn environment(&self, location: &Location) -> Environment;

    /// Builds the outbound spawn packet. Runs the spawn-packet call site.
    fn encode_spawn_packet(&mut self, id: InstanceId) -> Result<SpawnPacket, HostError>;

    /// Builds the outbound state packet. Runs the state-packet call site.
    fn encode_state_packet(
        &mut self,
        id: InstanceId,
        values: Vec<DataValue>,
    ) -> Result<StatePacket, HostError>;

    /// Builds a hover payload. Runs the tooltip call site.
    fn encode_tooltip(&mut self, id: InstanceId) -> Result<Tooltip, HostError>;

    /// Wraps a raw instance through the conversion table.
    fn convert(&self, id: InstanceId) -> Result<WrapperObject, HostError>;
}

/// Failures reported by host structures.
#[derive(Debug, Clone, PartialEq)]
pub enum HostError {
    RegistryFrozen(String),
    DuplicateKey(Key),
    MissingIntrusiveHolder(Key),
    HolderIndexClosed(String),
    UnknownKind(String),
    UnknownInstance(InstanceId),
    UnknownBiome(Key),
    UnknownFunction(Signature),
    Verify {
        signature: Signature,
        message: String,
    },
    Invocation {
        signature: Signature,
        message: String,
    },
    AccessDenied {
        owner: String,
        field: String,
    },
}

impl Display for HostError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegistryFrozen(name) => write!(f, "registry is frozen: {name}"),
            Self::DuplicateKey(key) => write!(f, "key already registered: {key}"),
            Self::MissingIntrusiveHolder(key) => {
                write!(f, "no intrusive holder created for: {key}")
            }
            Self::HolderIndexClosed(name) => {
                write!(f, "intrusive holder index is closed for registry: {name}")
            }
            Self::UnknownKind(kind) => write!(f, "unknown kind: {kind}"),
            Self::UnknownInstance(id) => write!(f, "unknown instance: {id}"),
            Self::UnknownBiome(key) => write!(f, "unknown biome: {key}"),
            Self::UnknownFunction(signature) => write!(f, "unknown function: {signature}"),
            Self::Verify { signature, message } => {
                write!(f, "function rejected by verifier: {signature}: {message}")
            }
            Self::Invocation { signature, message } => {
                write!(f, "function invocation failed: {signature}: {message}")
            }
            Self::AccessDenied { owner, field } => {
                write!(f, "reflective access denied: {owner}.{field}")
            }
        }
    }
}

impl Error for HostError {}
