//! Host instances and the wire payloads built from them.

use crate::model::class::InstanceClass;
use crate::model::key::Key;
use crate::model::kind::KindId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Process-local instance id. The host recycles ids only after destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub i32);

impl Display for InstanceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position inside one world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: Key,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl Location {
    pub fn new(world: Key, x: f64, y: f64, z: f64) -> Self {
        Self {
            world,
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn block_position(&self) -> (i64, i64, i64) {
        (
            self.x.floor() as i64,
            self.y.floor() as i64,
            self.z.floor() as i64,
        )
    }
}

/// Low-level instance as constructed by the host.
#[derive(Debug, Clone)]
pub struct RawInstance {
    pub id: InstanceId,
    pub uuid: Uuid,
    pub kind: KindId,
    pub class: Arc<InstanceClass>,
    pub location: Location,
    pub living: bool,
}

/// Lightweight reference handed to collaborators (appearance service, tag store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceRef {
    pub id: InstanceId,
    pub uuid: Uuid,
}

impl From<&RawInstance> for InstanceRef {
    fn from(value: &RawInstance) -> Self {
        Self {
            id: value.id,
            uuid: value.uuid,
        }
    }
}

/// High-level handle built over a raw instance for external API consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperObject {
    pub instance: InstanceId,
    pub kind: KindId,
    /// Name of the wrapper implementation that produced this handle.
    pub wrapper: String,
}

/// One synchronized state field (`id` is the protocol field index).
#[derive(Debug, Clone, PartialEq)]
pub struct DataValue {
    pub id: u8,
    pub payload: DataPayload,
}

impl DataValue {
    pub fn new(id: u8, payload: DataPayload) -> Self {
        Self { id, payload }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataPayload {
    Byte(u8),
    Int(i32),
    Float(f32),
    Bool(bool),
    Text(String),
}

/// Outbound "add instance" packet.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnPacket {
    pub instance: InstanceId,
    pub uuid: Uuid,
    pub kind: KindId,
}

/// Outbound dynamic state packet.
#[derive(Debug, Clone, PartialEq)]
pub struct StatePacket {
    pub instance: InstanceId,
    pub values: Vec<DataValue>,
}

/// Hover payload naming an instance's kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub kind: KindId,
    pub uuid: Uuid,
}
