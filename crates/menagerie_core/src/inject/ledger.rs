//! Declaration ledger.
//!
//! Collects declarations while the registry is still open for them. The
//! ledger never touches host state; it only rejects duplicates.

use crate::inject::declaration::KindDeclaration;
use crate::inject::InjectError;
use log::debug;

#[derive(Debug, Default)]
pub struct DeclarationLedger {
    declarations: Vec<KindDeclaration>,
}

impl DeclarationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `declaration`.
    ///
    /// # Errors
    /// - [`InjectError::DuplicateKey`] when the key is already declared.
    /// - [`InjectError::DuplicateClass`] when the instance class is already
    ///   declared.
    pub fn register(&mut self, declaration: KindDeclaration) -> Result<(), InjectError> {
        check_unique(&self.declarations, &declaration)?;
        debug!(
            "event=declaration_register module=ledger kind={} backing={} class={}",
            declaration.key(),
            declaration.backing(),
            declaration.instance_class().name()
        );
        self.declarations.push(declaration);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn declarations(&self) -> &[KindDeclaration] {
        &self.declarations
    }

    pub fn into_declarations(self) -> Vec<KindDeclaration> {
        self.declarations
    }
}

/// Rejects `candidate` when it collides with any of `existing`.
pub(crate) fn check_unique(
    existing: &[KindDeclaration],
    candidate: &KindDeclaration,
) -> Result<(), InjectError> {
    if existing.iter().any(|other| other.key() == candidate.key()) {
        return Err(InjectError::DuplicateKey(candidate.key().clone()));
    }
    let class = candidate.instance_class().name();
    if existing
        .iter()
        .any(|other| other.instance_class().name() == class)
    {
        return Err(InjectError::DuplicateClass(class.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::DeclarationLedger;
    use crate::inject::declaration::{named_wrapper, KindDeclaration};
    use crate::inject::InjectError;
    use crate::model::class::InstanceClass;
    use crate::model::key::Key;
    use crate::model::kind::InstanceFactory;

    fn declaration(key: &str, class: &str) -> KindDeclaration {
        let class = InstanceClass::extending(class, &InstanceClass::root("Entity"));
        KindDeclaration::builder(
            Key::parse(key).expect("key"),
            Key::parse("minecraft:marker").expect("key"),
            InstanceFactory::of(class),
            named_wrapper("Test"),
        )
        .build()
        .expect("declaration")
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut ledger = DeclarationLedger::new();
        ledger
            .register(declaration("zoo:one", "One"))
            .expect("first");
        let err = ledger
            .register(declaration("zoo:one", "Two"))
            .expect_err("same key");
        assert_eq!(err, InjectError::DuplicateKey(Key::parse("zoo:one").expect("key")));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn duplicate_class_is_rejected() {
        let mut ledger = DeclarationLedger::new();
        ledger
            .register(declaration("zoo:one", "Shared"))
            .expect("first");
        let err = ledger
            .register(declaration("zoo:two", "Shared"))
            .expect_err("same class");
        assert_eq!(err, InjectError::DuplicateClass("Shared".to_string()));
    }
}
