use menagerie_core::manager::AppearanceStatus;
use menagerie_core::persistence::migration::MigrationOutcome;
use menagerie_core::{
    named_wrapper, Injector, InstanceFactory, Key, KindDeclaration, KindManager, Location,
    MemoryAppearanceService, MemoryHost, MemoryTagStore, Observation, Origin, TagField, TagStore,
    TagValue, Variant, VariantError, VariantRule, Verbosity, CURRENT_DATA_VERSION, NO_VARIANT_ID,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn key(raw: &str) -> Key {
    Key::parse(raw).expect("key")
}

fn at(world: &str) -> Location {
    Location::new(key(world), 0.0, 64.0, 0.0)
}

fn injected(
    host: &mut MemoryHost,
    appearance: Arc<MemoryAppearanceService>,
    variants: Vec<Variant>,
    rule: VariantRule,
) -> Injector {
    let class = host.define_class("Ghoul", "Zombie").expect("class");
    let declaration = KindDeclaration::builder(
        key("zoo:ghoul"),
        key("minecraft:zombie"),
        InstanceFactory::of(class),
        named_wrapper("Ghoul"),
    )
    .variants(variants)
    .variant_rule(rule)
    .build()
    .expect("declaration");
    let mut injector = Injector::new(appearance, Verbosity::Quiet);
    injector.register(declaration).expect("register");
    injector.inject_types(host).expect("phase 1");
    injector.inject_world(host).expect("phases 2 and 3");
    injector
}

#[test]
fn scenario_plain_kind_without_variants() {
    let mut host = MemoryHost::vanilla();
    let injector = injected(
        &mut host,
        Arc::new(MemoryAppearanceService::new(false)),
        Vec::new(),
        VariantRule::first(),
    );
    let mut manager = KindManager::new(&injector, MemoryTagStore::new()).expect("manager");
    assert!(manager.is_injected_kind(&key("zoo:ghoul")));
    assert_eq!(manager.list_injected_kinds(), vec![key("zoo:ghoul")]);

    let spawned = manager
        .spawn(&mut host, &key("zoo:ghoul"), at("minecraft:overworld"))
        .expect("spawn");
    let uuid = spawned.instance.uuid;
    let store = manager.store();
    assert_eq!(
        store.get_text(uuid, TagField::KindKey).expect("kind"),
        Some("zoo:ghoul".to_string())
    );
    assert_eq!(
        store.get_int(uuid, TagField::DataVersion).expect("version"),
        Some(CURRENT_DATA_VERSION)
    );
    assert_eq!(
        store.get_text(uuid, TagField::Variant).expect("variant"),
        Some(NO_VARIANT_ID.to_string())
    );
    assert_eq!(store.get(uuid, TagField::PendingAppearance).expect("pending"), None);
    assert!(injector.state().has_no_variant(spawned.instance.id));
}

#[test]
fn scenario_variant_chosen_by_context_waits_for_appearance_service() {
    let mut host = MemoryHost::vanilla();
    let appearance = Arc::new(MemoryAppearanceService::new(false));
    let rule = VariantRule::first_match(vec![
        VariantRule::if_biomes(BTreeSet::from([key("minecraft:plains")]), "v1"),
        VariantRule::always("v2"),
    ]);
    let injector = injected(
        &mut host,
        Arc::clone(&appearance),
        vec![
            Variant::new("v1", "file:///models/v1.bbmodel").expect("v1"),
            Variant::new("v2", "file:///models/v2.bbmodel").expect("v2"),
        ],
        rule,
    );
    let mut manager = KindManager::new(&injector, MemoryTagStore::new()).expect("manager");

    let spawned = manager
        .spawn(&mut host, &key("zoo:ghoul"), at("minecraft:overworld"))
        .expect("spawn");
    let uuid = spawned.instance.uuid;
    assert_eq!(
        spawned.observation,
        Observation::FirstSpawn {
            variant: Some("v1".to_string()),
            appearance: AppearanceStatus::Pending("menagerie.zoo.ghoul.v1".to_string()),
        }
    );
    assert_eq!(
        manager
            .store()
            .get_text(uuid, TagField::PendingAppearance)
            .expect("pending"),
        Some("menagerie.zoo.ghoul.v1".to_string())
    );

    appearance.set_available(true);
    let applied = manager
        .apply_pending((&spawned.instance).into())
        .expect("apply");
    assert_eq!(
        applied,
        AppearanceStatus::Applied("menagerie.zoo.ghoul.v1".to_string())
    );
    assert_eq!(
        manager
            .store()
            .get(uuid, TagField::PendingAppearance)
            .expect("cleared"),
        None
    );
    assert_eq!(appearance.applied().len(), 1);

    let nether = manager
        .spawn(&mut host, &key("zoo:ghoul"), at("minecraft:the_nether"))
        .expect("spawn in nether");
    assert_eq!(
        nether.observation,
        Observation::FirstSpawn {
            variant: Some("v2".to_string()),
            appearance: AppearanceStatus::Applied("menagerie.zoo.ghoul.v2".to_string()),
        }
    );
}

#[test]
fn scenario_untagged_instance_is_not_given_fabricated_history() {
    let mut host = MemoryHost::vanilla();
    let injector = injected(
        &mut host,
        Arc::new(MemoryAppearanceService::new(true)),
        Vec::new(),
        VariantRule::none(),
    );
    let mut manager = KindManager::new(&injector, MemoryTagStore::new()).expect("manager");
    let types = injector.types().expect("types");
    let ghoul = types.by_key(&key("zoo:ghoul")).expect("ghoul").id();

    let legacy = host
        .reload_instance(ghoul, uuid::Uuid::new_v4(), at("minecraft:overworld"))
        .expect("reload");
    let observation = manager
        .observe(&host, &legacy, Origin::Loaded)
        .expect("observe");
    assert_eq!(
        observation,
        Observation::Loaded {
            migration: MigrationOutcome::MissingVersion,
            appearance: AppearanceStatus::None,
        }
    );
    assert!(manager.store().tags_of(legacy.uuid).is_empty());
    assert!(!injector.state().has_no_variant(legacy.id));
}

#[test]
fn data_version_converges_after_one_load() {
    let mut host = MemoryHost::vanilla();
    let injector = injected(
        &mut host,
        Arc::new(MemoryAppearanceService::new(false)),
        Vec::new(),
        VariantRule::none(),
    );
    let mut manager = KindManager::new(&injector, MemoryTagStore::new()).expect("manager");
    let spawned = manager
        .spawn(&mut host, &key("zoo:ghoul"), at("minecraft:overworld"))
        .expect("spawn");
    let uuid = spawned.instance.uuid;
    manager
        .store_mut()
        .set(uuid, TagField::DataVersion, TagValue::Int(CURRENT_DATA_VERSION - 1))
        .expect("age the instance");

    let first = manager
        .observe(&host, &spawned.instance, Origin::Loaded)
        .expect("first load");
    assert_eq!(
        first,
        Observation::Loaded {
            migration: MigrationOutcome::Migrated {
                from: CURRENT_DATA_VERSION - 1,
                to: CURRENT_DATA_VERSION,
            },
            appearance: AppearanceStatus::None,
        }
    );
    let second = manager
        .observe(&host, &spawned.instance, Origin::Loaded)
        .expect("second load");
    assert_eq!(
        second,
        Observation::Loaded {
            migration: MigrationOutcome::UpToDate,
            appearance: AppearanceStatus::None,
        }
    );
    assert_eq!(
        manager
            .store()
            .get_int(uuid, TagField::DataVersion)
            .expect("version"),
        Some(CURRENT_DATA_VERSION)
    );
}

#[test]
fn foreign_variant_is_a_configuration_error() {
    let mut host = MemoryHost::vanilla();
    let stranger = Variant::new("borrowed", "file:///models/borrowed.bbmodel")
        .expect("variant")
        .bind(&key("zoo:stranger"));
    let rule = VariantRule::new(move |_, _| Ok(Some(stranger.clone())));
    let injector = injected(
        &mut host,
        Arc::new(MemoryAppearanceService::new(false)),
        Vec::new(),
        rule,
    );
    let mut manager = KindManager::new(&injector, MemoryTagStore::new()).expect("manager");

    let err = manager
        .spawn(&mut host, &key("zoo:ghoul"), at("minecraft:overworld"))
        .expect_err("variant belongs to another kind");
    match err {
        menagerie_core::ManagerError::Variant(VariantError::ForeignVariant {
            expected,
            actual,
            id,
        }) => {
            assert_eq!(expected, key("zoo:ghoul"));
            assert_eq!(actual, key("zoo:stranger"));
            assert_eq!(id, "borrowed");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn spawned_instance_with_existing_tags_is_reconciled_not_reinitialized() {
    let mut host = MemoryHost::vanilla();
    let injector = injected(
        &mut host,
        Arc::new(MemoryAppearanceService::new(false)),
        vec![Variant::new("pale", "file:///models/pale.bbmodel").expect("variant")],
        VariantRule::first(),
    );
    let mut manager = KindManager::new(&injector, MemoryTagStore::new()).expect("manager");
    let spawned = manager
        .spawn(&mut host, &key("zoo:ghoul"), at("minecraft:overworld"))
        .expect("spawn");

    let again = manager
        .observe(&host, &spawned.instance, Origin::Spawned)
        .expect("observe");
    assert_eq!(
        again,
        Observation::Loaded {
            migration: MigrationOutcome::UpToDate,
            appearance: AppearanceStatus::Pending("menagerie.zoo.ghoul.pale".to_string()),
        }
    );
}
