//! Scoped registry unlock.
//!
//! # Responsibility
//! - Open a sealed kind registry for the duration of one body.
//! - Mint the capability latches the registry's privileged setters demand.
//!
//! # Invariants
//! - The freeze flag is restored on every exit path, panics included.
//! - On exit the holder index is reset to the sealed state (`None`) when the
//!   registry was frozen on entry, or restored to its entry value otherwise.
//! - Holders created inside the body but never bound fail the unlock.

use crate::host::registry::{HolderIndex, KindRegistry};
use crate::host::HostError;
use crate::model::key::Key;
use crate::model::kind::{KindDescriptor, KindId};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Capability to flip a registry's freeze flag.
#[derive(Debug)]
pub struct FreezeLatch {
    _private: (),
}

/// Capability to swap a registry's intrusive-holder index.
#[derive(Debug)]
pub struct HolderLatch {
    _private: (),
}

impl FreezeLatch {
    fn mint() -> Self {
        Self { _private: () }
    }
}

impl HolderLatch {
    fn mint() -> Self {
        Self { _private: () }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnlockError {
    UnboundHolders { registry: String, keys: Vec<Key> },
}

impl Display for UnlockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnboundHolders { registry, keys } => {
                let keys = keys.iter().map(Key::as_string).collect::<Vec<_>>();
                write!(
                    f,
                    "registry {registry} left intrusive holders unbound: {}",
                    keys.join(", ")
                )
            }
        }
    }
}

impl Error for UnlockError {}

/// Registry view handed to the unlock body.
pub struct UnlockedRegistry<'a, R: KindRegistry + ?Sized> {
    registry: &'a mut R,
    registered: Vec<KindId>,
}

impl<R: KindRegistry + ?Sized> UnlockedRegistry<'_, R> {
    /// Creates the intrusive holder for `descriptor.key` and binds it.
    pub fn register(&mut self, descriptor: KindDescriptor) -> Result<KindId, HostError> {
        self.registry.create_intrusive_holder(&descriptor.key)?;
        let id = self.registry.register(descriptor)?;
        self.registered.push(id);
        Ok(id)
    }

    pub fn registry(&self) -> &R {
        self.registry
    }

    pub fn registered(&self) -> &[KindId] {
        &self.registered
    }
}

struct RelockGuard<'a, R: KindRegistry + ?Sized> {
    registry: &'a mut R,
    was_frozen: bool,
    entry_index: Option<HolderIndex>,
}

impl<R: KindRegistry + ?Sized> Drop for RelockGuard<'_, R> {
    fn drop(&mut self) {
        let restored = if self.was_frozen {
            None
        } else {
            self.entry_index.take()
        };
        self.registry
            .replace_holder_index(&HolderLatch::mint(), restored);
        self.registry
            .set_frozen(&FreezeLatch::mint(), self.was_frozen);
        debug!(
            "event=registry_relock module=unlock registry={} frozen={}",
            self.registry.name(),
            self.was_frozen
        );
    }
}

/// Runs `body` with `registry` unfrozen and its holder index open.
///
/// # Errors
/// - Whatever `body` returns.
/// - [`UnlockError::UnboundHolders`] when the body left holders unbound.
pub fn with_unlocked<R, T, E, F>(registry: &mut R, body: F) -> Result<T, E>
where
    R: KindRegistry + ?Sized,
    E: From<UnlockError>,
    F: FnOnce(&mut UnlockedRegistry<'_, R>) -> Result<T, E>,
{
    let was_frozen = registry.is_frozen();
    let entry_index = registry.replace_holder_index(&HolderLatch::mint(), Some(HolderIndex::new()));
    registry.set_frozen(&FreezeLatch::mint(), false);
    debug!(
        "event=registry_unlock module=unlock registry={} was_frozen={was_frozen}",
        registry.name()
    );

    let mut guard = RelockGuard {
        registry,
        was_frozen,
        entry_index,
    };
    let outcome = {
        let mut unlocked = UnlockedRegistry {
            registry: &mut *guard.registry,
            registered: Vec::new(),
        };
        body(&mut unlocked)
    };
    let unbound: Vec<Key> = guard
        .registry
        .holder_index()
        .map(|index| index.iter().cloned().collect())
        .unwrap_or_default();
    let name = guard.registry.name().to_string();
    drop(guard);

    let value = outcome?;
    if !unbound.is_empty() {
        warn!(
            "event=registry_unlock module=unlock status=error registry={name} unbound={}",
            unbound.len()
        );
        return Err(UnlockError::UnboundHolders {
            registry: name,
            keys: unbound,
        }
        .into());
    }
    Ok(value)
}
