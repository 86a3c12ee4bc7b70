//! Shared value types for kinds, instances and identities.
//!
//! # Responsibility
//! - Define the identity (`Key`) every injected kind is addressed by.
//! - Define the host-facing shapes the engine reads and writes.
//!
//! # Invariants
//! - A `Key` is always syntactically valid once constructed.
//! - `InstanceClass` chains are acyclic by construction (parents are shared, immutable).

pub mod class;
pub mod instance;
pub mod key;
pub mod kind;
