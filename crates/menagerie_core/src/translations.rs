//! Display-name translations for injected kinds.

use crate::inject::unit::InjectedTypes;
use std::collections::BTreeMap;

/// Locale-specific display names keyed by description id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationCatalog {
    entries: BTreeMap<String, BTreeMap<String, String>>,
}

impl TranslationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects display names of every injected kind that declares any.
    pub fn from_types(types: &InjectedTypes) -> Self {
        let mut catalog = Self::new();
        for entry in types.iter() {
            let names = entry.declaration().display_names();
            if names.is_empty() {
                continue;
            }
            catalog
                .entries
                .insert(entry.key().description_id(), names.clone());
        }
        catalog
    }

    /// Exact-locale lookup. Locales compare case-insensitively.
    pub fn translate(&self, description_id: &str, locale: &str) -> Option<&str> {
        self.entries
            .get(description_id)?
            .get(&locale.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn locales(&self, description_id: &str) -> Vec<&str> {
        self.entries
            .get(description_id)
            .map(|names| names.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::TranslationCatalog;
    use crate::config::Verbosity;
    use crate::host::appearance::MemoryAppearanceService;
    use crate::host::memory::MemoryHost;
    use crate::inject::declaration::{named_wrapper, KindDeclaration};
    use crate::inject::injector::Injector;
    use crate::model::key::Key;
    use crate::model::kind::InstanceFactory;
    use std::sync::Arc;

    fn declaration(
        host: &mut MemoryHost,
        key: &str,
        class: &str,
        names: &[(&str, &str)],
    ) -> KindDeclaration {
        let class = host.define_class(class, "Zombie").expect("class");
        let mut builder = KindDeclaration::builder(
            Key::parse(key).expect("key"),
            Key::parse("minecraft:zombie").expect("key"),
            InstanceFactory::of(class),
            named_wrapper("Test"),
        );
        for (locale, name) in names {
            builder = builder.display_name(locale, name);
        }
        builder.build().expect("declaration")
    }

    #[test]
    fn names_are_keyed_by_description_id() {
        let mut host = MemoryHost::vanilla();
        let mut injector = Injector::new(
            Arc::new(MemoryAppearanceService::new(false)),
            Verbosity::Quiet,
        );
        let named = declaration(
            &mut host,
            "zoo:cave/ghoul",
            "Ghoul",
            &[("en_US", "Ghoul"), ("cs_cz", "Ghúl")],
        );
        let nameless = declaration(&mut host, "zoo:nameless", "Nameless", &[]);
        injector.register(named).expect("register");
        injector.register(nameless).expect("register");
        injector.inject_types(&mut host).expect("phase 1");
        injector.inject_world(&mut host).expect("phases 2 and 3");

        let catalog = TranslationCatalog::from_types(&injector.types().expect("types"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.translate("entity.zoo.cave.ghoul", "en_us"), Some("Ghoul"));
        assert_eq!(catalog.translate("entity.zoo.cave.ghoul", "CS_CZ"), Some("Ghúl"));
        assert_eq!(catalog.translate("entity.zoo.cave.ghoul", "de_de"), None);
        assert_eq!(catalog.locales("entity.zoo.cave.ghoul"), vec!["cs_cz", "en_us"]);
        assert!(catalog.locales("entity.zoo.nameless").is_empty());
    }
}
