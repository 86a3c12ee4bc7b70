//! Kind declarations.
//!
//! # Responsibility
//! - Immutable description of one injected kind, assembled by a builder.
//!
//! # Invariants
//! - Variants are bound to the declaration key; ids are unique.
//! - An attribute override is only accepted for living instance classes.

use crate::host::tables::Converter;
use crate::model::class::InstanceClass;
use crate::model::instance::{RawInstance, WrapperObject};
use crate::model::key::Key;
use crate::model::kind::{AttributeProfile, Category, InstanceFactory, KindBuilder};
use crate::spawn::SpawnRule;
use crate::variant::{Variant, VariantError, VariantMap, VariantRule};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Adjusts the kind descriptor derived from the backing kind.
pub type Customizer = Arc<dyn Fn(&mut KindBuilder) + Send + Sync>;

/// Converter producing a [`WrapperObject`] tagged with `name`.
pub fn named_wrapper(name: &str) -> Converter {
    let name = name.to_string();
    Arc::new(move |instance: &RawInstance| WrapperObject {
        instance: instance.id,
        kind: instance.kind,
        wrapper: name.clone(),
    })
}

#[derive(Clone)]
pub struct KindDeclaration {
    key: Key,
    backing: Key,
    factory: InstanceFactory,
    wrapper: Converter,
    category: Category,
    customizer: Customizer,
    attributes: Option<AttributeProfile>,
    variants: VariantMap,
    variant_rule: VariantRule,
    spawn_rule: SpawnRule,
    display_names: BTreeMap<String, String>,
}

impl KindDeclaration {
    /// Starts a declaration of `key`, imitating the host kind `backing`.
    pub fn builder(
        key: Key,
        backing: Key,
        factory: InstanceFactory,
        wrapper: Converter,
    ) -> DeclarationBuilder {
        DeclarationBuilder {
            key,
            backing,
            factory,
            wrapper,
            category: Category::Misc,
            customizer: None,
            attributes: None,
            variants: Vec::new(),
            variant_rule: VariantRule::default(),
            spawn_rule: SpawnRule::default(),
            display_names: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn backing(&self) -> &Key {
        &self.backing
    }

    pub fn factory(&self) -> &InstanceFactory {
        &self.factory
    }

    pub fn instance_class(&self) -> &Arc<InstanceClass> {
        self.factory.class()
    }

    pub fn is_living(&self) -> bool {
        self.factory.is_living()
    }

    pub fn wrapper(&self) -> &Converter {
        &self.wrapper
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn customize(&self, builder: &mut KindBuilder) {
        (self.customizer)(builder);
    }

    /// Declared attribute override, if any.
    pub fn attributes(&self) -> Option<&AttributeProfile> {
        self.attributes.as_ref()
    }

    pub fn variants(&self) -> &VariantMap {
        &self.variants
    }

    pub fn variant_rule(&self) -> &VariantRule {
        &self.variant_rule
    }

    pub fn spawn_rule(&self) -> &SpawnRule {
        &self.spawn_rule
    }

    /// Display names keyed by locale (`en_us`, ...).
    pub fn display_names(&self) -> &BTreeMap<String, String> {
        &self.display_names
    }

    pub fn appearance_prefix(&self) -> String {
        self.key.appearance_prefix()
    }
}

impl Debug for KindDeclaration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindDeclaration")
            .field("key", &self.key)
            .field("backing", &self.backing)
            .field("class", &self.instance_class().name())
            .field("category", &self.category)
            .field("variants", &self.variants.ids())
            .finish_non_exhaustive()
    }
}

pub struct DeclarationBuilder {
    key: Key,
    backing: Key,
    factory: InstanceFactory,
    wrapper: Converter,
    category: Category,
    customizer: Option<Customizer>,
    attributes: Option<AttributeProfile>,
    variants: Vec<Variant>,
    variant_rule: VariantRule,
    spawn_rule: SpawnRule,
    display_names: BTreeMap<String, String>,
}

impl DeclarationBuilder {
    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn customize<F>(mut self, customizer: F) -> Self
    where
        F: Fn(&mut KindBuilder) + Send + Sync + 'static,
    {
        self.customizer = Some(Arc::new(customizer));
        self
    }

    pub fn attributes(mut self, profile: AttributeProfile) -> Self {
        self.attributes = Some(profile);
        self
    }

    pub fn variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn variants(mut self, variants: impl IntoIterator<Item = Variant>) -> Self {
        self.variants.extend(variants);
        self
    }

    pub fn variant_rule(mut self, rule: VariantRule) -> Self {
        self.variant_rule = rule;
        self
    }

    pub fn spawn_rule(mut self, rule: SpawnRule) -> Self {
        self.spawn_rule = rule;
        self
    }

    pub fn display_name(mut self, locale: &str, name: &str) -> Self {
        self.display_names
            .insert(locale.to_ascii_lowercase(), name.to_string());
        self
    }

    /// Seals the declaration.
    ///
    /// # Errors
    /// - [`DeclarationError::NotLiving`] for an attribute override on a
    ///   non-living instance class.
    /// - [`DeclarationError::Variant`] for duplicate variant ids.
    pub fn build(self) -> Result<KindDeclaration, DeclarationError> {
        if self.attributes.is_some() && !self.factory.is_living() {
            return Err(DeclarationError::NotLiving {
                key: self.key,
                class: self.factory.class().name().to_string(),
            });
        }
        let variants = VariantMap::bind(&self.key, &self.variants)?;
        let customizer: Customizer = match self.customizer {
            Some(customizer) => customizer,
            None => Arc::new(keep_shape),
        };
        Ok(KindDeclaration {
            variants,
            customizer,
            key: self.key,
            backing: self.backing,
            factory: self.factory,
            wrapper: self.wrapper,
            category: self.category,
            attributes: self.attributes,
            variant_rule: self.variant_rule,
            spawn_rule: self.spawn_rule,
            display_names: self.display_names,
        })
    }
}

fn keep_shape(_: &mut KindBuilder) {}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationError {
    NotLiving { key: Key, class: String },
    Variant(VariantError),
}

impl Display for DeclarationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotLiving { key, class } => write!(
                f,
                "attributes declared for {key}, but instance class {class} is not living"
            ),
            Self::Variant(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DeclarationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Variant(err) => Some(err),
            Self::NotLiving { .. } => None,
        }
    }
}

impl From<VariantError> for DeclarationError {
    fn from(value: VariantError) -> Self {
        Self::Variant(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{named_wrapper, DeclarationError, KindDeclaration};
    use crate::model::class::InstanceClass;
    use crate::model::key::Key;
    use crate::model::kind::{AttributeProfile, Category, InstanceFactory, KindBuilder};
    use crate::variant::{Variant, VariantError};

    fn key(raw: &str) -> Key {
        Key::parse(raw).expect("key")
    }

    fn living_factory(name: &str) -> InstanceFactory {
        let entity = InstanceClass::root("Entity");
        let living = InstanceClass::extending("LivingEntity", &entity);
        InstanceFactory::of(InstanceClass::extending(name, &living))
    }

    #[test]
    fn defaults_are_applied() {
        let declaration = KindDeclaration::builder(
            key("zoo:capybara"),
            key("minecraft:pig"),
            living_factory("Capybara"),
            named_wrapper("Capybara"),
        )
        .build()
        .expect("declaration");

        assert_eq!(declaration.category(), Category::Misc);
        assert!(declaration.attributes().is_none());
        assert!(declaration.variants().is_empty());
        assert!(declaration.is_living());
        assert_eq!(declaration.appearance_prefix(), "menagerie.zoo.capybara");

        let mut builder = KindBuilder::of(
            key("zoo:capybara"),
            Category::Misc,
            living_factory("Capybara"),
        );
        builder.sized(1.0, 1.0);
        declaration.customize(&mut builder);
        assert_eq!(builder.dimensions().width, 1.0);
    }

    #[test]
    fn attributes_require_living_class() {
        let marker = InstanceClass::extending("Beacon", &InstanceClass::root("Entity"));
        let err = KindDeclaration::builder(
            key("zoo:beacon"),
            key("minecraft:marker"),
            InstanceFactory::of(marker),
            named_wrapper("Beacon"),
        )
        .attributes(AttributeProfile::living_defaults())
        .build()
        .expect_err("non-living class");
        assert!(matches!(err, DeclarationError::NotLiving { class, .. } if class == "Beacon"));
    }

    #[test]
    fn variants_bind_to_declaration_key() {
        let declaration = KindDeclaration::builder(
            key("zoo:capybara"),
            key("minecraft:pig"),
            living_factory("Capybara"),
            named_wrapper("Capybara"),
        )
        .variant(Variant::new("brown", "models/brown.bbmodel").expect("variant"))
        .variant(Variant::new("golden", "models/golden.bbmodel").expect("variant"))
        .display_name("EN_US", "Capybara")
        .build()
        .expect("declaration");

        let golden = declaration.variants().get("golden").expect("golden");
        assert_eq!(golden.owner(), declaration.key());
        assert_eq!(golden.appearance_name(), "menagerie.zoo.capybara.golden");
        assert_eq!(
            declaration.display_names().get("en_us").map(String::as_str),
            Some("Capybara")
        );
    }

    #[test]
    fn duplicate_variant_ids_fail_build() {
        let err = KindDeclaration::builder(
            key("zoo:capybara"),
            key("minecraft:pig"),
            living_factory("Capybara"),
            named_wrapper("Capybara"),
        )
        .variants([
            Variant::new("brown", "a").expect("variant"),
            Variant::new("brown", "b").expect("variant"),
        ])
        .build()
        .expect_err("duplicate");
        assert_eq!(
            err,
            DeclarationError::Variant(VariantError::Duplicate("brown".to_string()))
        );
    }
}
