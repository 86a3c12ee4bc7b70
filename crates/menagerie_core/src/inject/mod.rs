//! Phased kind injection.
//!
//! # Responsibility
//! - Collect declarations (`ledger`) and freeze them into an injection unit.
//! - Run the one-shot phases that register kinds, merge spawn tables, patch
//!   host code and rewire wrapper dispatch (`injector`).
//! - Isolate every privileged registry mutation in `unlock`.
//!
//! # Invariants
//! - Phases advance strictly in [`Phase`] order; none repeats or is skipped.
//! - Derived views are unreadable before [`Phase::Injected`].
//! - An execution failure poisons the injector for the rest of the process.

pub mod declaration;
pub mod dispatch;
pub mod index;
pub mod injector;
pub mod ledger;
pub mod unit;
pub mod unlock;

use crate::host::HostError;
use crate::model::key::Key;
use crate::patch::PatchError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use declaration::{named_wrapper, DeclarationBuilder, DeclarationError, KindDeclaration};
pub use dispatch::DispatchList;
pub use index::{InjectedKinds, InjectionState};
pub use injector::{Injector, WorldReport};
pub use ledger::DeclarationLedger;
pub use unit::{InjectedType, InjectedTypes, InjectionUnit};
pub use unlock::{with_unlocked, UnlockError, UnlockedRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Registration,
    PreInjection,
    Phase1,
    Phase2,
    Injected,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::PreInjection => "pre_injection",
            Self::Phase1 => "phase_1",
            Self::Phase2 => "phase_2",
            Self::Injected => "injected",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InjectError {
    DuplicateKey(Key),
    DuplicateClass(String),
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },
    NotReady(Phase),
    Poisoned,
    UnknownBackingKind {
        kind: Key,
        backing: Key,
    },
    MissingSchema {
        kind: Key,
        backing: Key,
    },
    MissingConverter {
        backing: Key,
    },
    Host(HostError),
    Unlock(UnlockError),
    Patch(PatchError),
}

impl InjectError {
    /// Whether the failure happened while mutating host state.
    pub fn is_execution_failure(&self) -> bool {
        !matches!(
            self,
            Self::InvalidPhase { .. } | Self::NotReady(_) | Self::Poisoned
        )
    }
}

impl Display for InjectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey(key) => write!(f, "kind already declared: {key}"),
            Self::DuplicateClass(class) => {
                write!(f, "instance class already declared: {class}")
            }
            Self::InvalidPhase { operation, phase } => {
                write!(f, "{operation} is not allowed in phase {phase}")
            }
            Self::NotReady(phase) => {
                write!(f, "injection is not finished (current phase: {phase})")
            }
            Self::Poisoned => write!(f, "injector is poisoned by an earlier failure"),
            Self::UnknownBackingKind { kind, backing } => {
                write!(f, "backing kind {backing} of {kind} is not registered")
            }
            Self::MissingSchema { kind, backing } => write!(
                f,
                "backing kind {backing} of {kind} has no data-fixer schema entry"
            ),
            Self::MissingConverter { backing } => {
                write!(f, "backing kind {backing} has no wrapper converter")
            }
            Self::Host(err) => write!(f, "{err}"),
            Self::Unlock(err) => write!(f, "{err}"),
            Self::Patch(err) => write!(f, "{err}"),
        }
    }
}

impl Error for InjectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Host(err) => Some(err),
            Self::Unlock(err) => Some(err),
            Self::Patch(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HostError> for InjectError {
    fn from(value: HostError) -> Self {
        Self::Host(value)
    }
}

impl From<UnlockError> for InjectError {
    fn from(value: UnlockError) -> Self {
        Self::Unlock(value)
    }
}

impl From<PatchError> for InjectError {
    fn from(value: PatchError) -> Self {
        Self::Patch(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{InjectError, Phase};

    #[test]
    fn phases_are_ordered() {
        assert!(Phase::Registration < Phase::PreInjection);
        assert!(Phase::Phase2 < Phase::Injected);
        assert_eq!(Phase::Phase1.to_string(), "phase_1");
    }

    #[test]
    fn ordering_errors_are_not_execution_failures() {
        let invalid = InjectError::InvalidPhase {
            operation: "inject_world",
            phase: Phase::Registration,
        };
        assert!(!invalid.is_execution_failure());
        assert!(!InjectError::NotReady(Phase::Phase2).is_execution_failure());
        assert!(InjectError::DuplicateClass("Ghoul".to_string()).is_execution_failure());
    }
}
