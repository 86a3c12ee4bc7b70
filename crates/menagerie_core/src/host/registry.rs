//! Host kind registry contract.

use crate::host::HostError;
use crate::inject::unlock::{FreezeLatch, HolderLatch};
use crate::model::key::Key;
use crate::model::kind::{KindDescriptor, KindId};
use std::collections::BTreeSet;

/// Keys with an intrusive holder created but not yet bound by registration.
pub type HolderIndex = BTreeSet<Key>;

/// Append-locked registry of kind descriptors.
///
/// While the holder index is open, `register` requires an intrusive holder
/// created for the key beforehand and binds it.
pub trait KindRegistry {
    fn name(&self) -> &str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, id: KindId) -> Option<&KindDescriptor>;

    fn id_of(&self, key: &Key) -> Option<KindId>;

    fn get_by_key(&self, key: &Key) -> Option<&KindDescriptor> {
        self.id_of(key).and_then(|id| self.get(id))
    }

    fn is_frozen(&self) -> bool;

    fn holder_index(&self) -> Option<&HolderIndex>;

    fn create_intrusive_holder(&mut self, key: &Key) -> Result<(), HostError>;

    fn register(&mut self, descriptor: KindDescriptor) -> Result<KindId, HostError>;

    fn set_frozen(&mut self, latch: &FreezeLatch, frozen: bool);

    /// Swaps the holder index, returning the previous one.
    fn replace_holder_index(
        &mut self,
        latch: &HolderLatch,
        index: Option<HolderIndex>,
    ) -> Option<HolderIndex>;
}
