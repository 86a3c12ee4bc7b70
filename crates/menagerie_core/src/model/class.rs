//! Instance class hierarchy.
//!
//! Host instances carry the concrete implementation class they were built
//! from. Classes form a single-inheritance tree declared up front; the
//! subclass-of relation is the partial order used by dispatch precedence.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Root of every instance class.
pub const ENTITY_CLASS: &str = "Entity";
/// Classes descending from this one are living; they carry attributes and
/// the extended synchronized-state range.
pub const LIVING_CLASS: &str = "LivingEntity";

/// One named implementation type with an optional parent.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct InstanceClass {
    name: String,
    parent: Option<Arc<InstanceClass>>,
}

impl InstanceClass {
    /// Declares a root class.
    pub fn root(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: None,
        })
    }

    /// Declares a class extending `parent`.
    pub fn extending(name: impl Into<String>, parent: &Arc<InstanceClass>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: Some(Arc::clone(parent)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<InstanceClass>> {
        self.parent.as_ref()
    }

    /// Returns `true` when `other` is this class or one of its descendants.
    ///
    /// Classes are compared by name; names are unique within one host.
    pub fn is_assignable_from(&self, other: &InstanceClass) -> bool {
        let mut current = Some(other);
        while let Some(class) = current {
            if class.name == self.name {
                return true;
            }
            current = class.parent.as_deref();
        }
        false
    }

    /// Returns `true` when this class descends from a class named `ancestor`.
    pub fn extends(&self, ancestor: &str) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.name == ancestor {
                return true;
            }
            current = class.parent.as_deref();
        }
        false
    }
}

impl Display for InstanceClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
