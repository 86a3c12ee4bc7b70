//! Runtime patches over host code.
//!
//! # Responsibility
//! - Describe patches as edits at fixed insertion points plus the hooks the
//!   edits call.
//! - Compose and redefine them in one batch (`engine`).
//!
//! # See also
//! - `hooks` for the construction, state-suppression and disguise patches.
//! - `reflection` for the reversible filter bypass.

pub mod engine;
pub mod hooks;
pub mod reflection;

use crate::host::code::{Hook, Instruction, Signature};
use crate::host::HostError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use engine::{AppliedPatches, PatchEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionPoint {
    Head,
    BeforeEachReturn,
    ReplaceBody,
}

/// One edit of one host function.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub target: Signature,
    pub point: InsertionPoint,
    pub delta: Vec<Instruction>,
}

/// Named set of edits applied together.
#[derive(Clone)]
pub struct Patch {
    pub name: &'static str,
    pub edits: Vec<Edit>,
    pub hooks: Vec<(String, Hook)>,
    pub reversible: bool,
    pub compute_frames: bool,
}

impl Patch {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            edits: Vec::new(),
            hooks: Vec::new(),
            reversible: false,
            compute_frames: true,
        }
    }

    pub fn edit(mut self, target: Signature, point: InsertionPoint, delta: Vec<Instruction>) -> Self {
        self.edits.push(Edit {
            target,
            point,
            delta,
        });
        self
    }

    pub fn hook(mut self, id: &str, hook: Hook) -> Self {
        self.hooks.push((id.to_string(), hook));
        self
    }

    pub fn reversible(mut self) -> Self {
        self.reversible = true;
        self
    }

    pub fn compute_frames(mut self, compute_frames: bool) -> Self {
        self.compute_frames = compute_frames;
        self
    }
}

impl std::fmt::Debug for Patch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Patch")
            .field("name", &self.name)
            .field("edits", &self.edits)
            .field("hooks", &self.hooks.iter().map(|(id, _)| id).collect::<Vec<_>>())
            .field("reversible", &self.reversible)
            .field("compute_frames", &self.compute_frames)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchError {
    MissingTarget(Signature),
    Assemble { signature: Signature, message: String },
    Host(HostError),
}

impl Display for PatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTarget(signature) => write!(f, "patch target not found: {signature}"),
            Self::Assemble { signature, message } => {
                write!(f, "failed to assemble patched body {signature}: {message}")
            }
            Self::Host(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Host(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HostError> for PatchError {
    fn from(value: HostError) -> Self {
        Self::Host(value)
    }
}
