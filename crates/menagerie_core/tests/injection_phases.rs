use menagerie_core::host::ConversionTable;
use menagerie_core::host::KindRegistry;
use menagerie_core::{
    named_wrapper, Host, InjectError, Injector, InstanceFactory, Key, KindDeclaration, Location,
    MemoryAppearanceService, MemoryHost, Phase, Verbosity,
};
use std::sync::Arc;

fn key(raw: &str) -> Key {
    Key::parse(raw).expect("key")
}

fn injector() -> Injector {
    Injector::new(Arc::new(MemoryAppearanceService::new(false)), Verbosity::Quiet)
}

fn declaration(host: &mut MemoryHost, kind: &str, class: &str, backing: &str) -> KindDeclaration {
    let parent = if backing == "minecraft:marker" { "Marker" } else { "Zombie" };
    let class = host.define_class(class, parent).expect("class");
    KindDeclaration::builder(
        key(kind),
        key(backing),
        InstanceFactory::of(class),
        named_wrapper("Test"),
    )
    .build()
    .expect("declaration")
}

fn assert_not_ready(injector: &Injector) {
    let phase = injector.phase();
    assert_eq!(injector.types().err(), Some(InjectError::NotReady(phase)));
    assert_eq!(injector.injections().err(), Some(InjectError::NotReady(phase)));
}

#[test]
fn derived_views_are_not_ready_until_injected() {
    let mut host = MemoryHost::vanilla();
    let mut injector = injector();
    let ghoul = declaration(&mut host, "zoo:ghoul", "Ghoul", "minecraft:zombie");
    injector.register(ghoul).expect("register");
    assert_not_ready(&injector);

    injector.load_declarations().expect("load");
    assert_eq!(injector.phase(), Phase::PreInjection);
    assert_not_ready(&injector);

    injector.inject_types(&mut host).expect("phase 1");
    assert_eq!(injector.phase(), Phase::Phase2);
    assert_not_ready(&injector);

    injector.inject_world(&mut host).expect("phases 2 and 3");
    assert_eq!(injector.phase(), Phase::Injected);
    let types = injector.types().expect("types");
    assert_eq!(types.keys(), vec![key("zoo:ghoul")]);
    assert_eq!(injector.injections().expect("injections").len(), 1);
}

#[test]
fn world_phase_before_type_phase_is_rejected() {
    let mut host = MemoryHost::vanilla();
    let mut injector = injector();
    let err = injector
        .inject_world(&mut host)
        .expect_err("phase 1 has not run");
    assert_eq!(
        err,
        InjectError::InvalidPhase {
            operation: "inject_world",
            phase: Phase::Registration,
        }
    );
    assert!(!injector.is_poisoned());
}

#[test]
fn every_phase_runs_once() {
    let mut host = MemoryHost::vanilla();
    let mut injector = injector();
    injector.inject_types(&mut host).expect("phase 1");
    assert!(matches!(
        injector.inject_types(&mut host),
        Err(InjectError::InvalidPhase { .. })
    ));
    injector.inject_world(&mut host).expect("phases 2 and 3");
    assert!(matches!(
        injector.inject_world(&mut host),
        Err(InjectError::InvalidPhase { .. })
    ));
    assert!(matches!(
        injector.load_declarations(),
        Err(InjectError::InvalidPhase { .. })
    ));
}

#[test]
fn duplicate_declarations_are_named() {
    let mut host = MemoryHost::vanilla();
    let mut injector = injector();
    let first = declaration(&mut host, "zoo:ghoul", "Ghoul", "minecraft:zombie");
    let same_key = declaration(&mut host, "zoo:ghoul", "Wight", "minecraft:zombie");
    injector.register(first).expect("register");
    assert_eq!(
        injector.register(same_key).expect_err("duplicate key"),
        InjectError::DuplicateKey(key("zoo:ghoul"))
    );

    let class = host.class("Ghoul").expect("class");
    let same_class = KindDeclaration::builder(
        key("zoo:other"),
        key("minecraft:zombie"),
        InstanceFactory::of(class),
        named_wrapper("Other"),
    )
    .build()
    .expect("declaration");
    assert_eq!(
        injector.register(same_class).expect_err("duplicate class"),
        InjectError::DuplicateClass("Ghoul".to_string())
    );
    assert!(!injector.is_poisoned());
}

#[test]
fn missing_schema_poisons_the_injector() {
    let mut host = MemoryHost::vanilla();
    let mut injector = injector();
    let wisp = declaration(&mut host, "zoo:wisp", "Wisp", "minecraft:marker");
    injector.register(wisp).expect("register");

    let err = injector
        .inject_types(&mut host)
        .expect_err("marker has no schema entry");
    assert_eq!(
        err,
        InjectError::MissingSchema {
            kind: key("zoo:wisp"),
            backing: key("minecraft:marker"),
        }
    );
    assert!(injector.is_poisoned());
    assert!(host.kinds().id_of(&key("zoo:wisp")).is_none());
    assert!(host.kinds().is_frozen());

    assert_eq!(
        injector.inject_world(&mut host).expect_err("poisoned"),
        InjectError::Poisoned
    );
    assert_eq!(injector.types().err(), Some(InjectError::Poisoned));
}

#[test]
fn registry_is_sealed_again_after_phase_one() {
    let mut host = MemoryHost::vanilla();
    let mut injector = injector();
    let ghoul = declaration(&mut host, "zoo:ghoul", "Ghoul", "minecraft:zombie");
    injector.register(ghoul).expect("register");
    injector.inject_types(&mut host).expect("phase 1");

    assert!(host.kinds().is_frozen());
    assert!(host.kinds().holder_index().is_none());
    let id = host.kinds().id_of(&key("zoo:ghoul")).expect("registered");
    assert!(injector.state().is_injected_kind(id));
}

#[test]
fn empty_pipeline_leaves_host_behaviour_unchanged() {
    let mut host = MemoryHost::vanilla();
    let zombie = host.kinds().id_of(&key("minecraft:zombie")).expect("zombie");
    let location = Location::new(key("minecraft:overworld"), 0.0, 64.0, 0.0);
    let before = host.construct_instance(zombie, location.clone()).expect("construct");
    let wrapper_before = host.convert(before.id).expect("convert");

    let mut injector = injector();
    injector.inject_types(&mut host).expect("phase 1");
    let report = injector.inject_world(&mut host).expect("phases 2 and 3");
    assert!(report.patches.is_empty());
    assert_eq!(report.rewired_backings, 0);
    assert!(injector.types().expect("types").is_empty());

    let after = host.construct_instance(zombie, location).expect("construct");
    let wrapper_after = host.convert(after.id).expect("convert");
    assert_eq!(wrapper_after.wrapper, wrapper_before.wrapper);
    assert!(host.conversions().resolve(zombie).is_some());
}
