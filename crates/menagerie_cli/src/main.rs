//! CLI smoke entry point.
//!
//! # Responsibility
//! - Run the full injection pipeline against the in-process reference host.
//! - Print a deterministic summary for quick local sanity checks.
//!
//! Usage: `menagerie_cli [config.json]`

use log::info;
use menagerie_core::fatal::or_terminate;
use menagerie_core::logging::init_from_config;
use menagerie_core::{
    core_version, named_wrapper, EngineConfig, InstanceFactory, Injector, Key, KindDeclaration,
    KindManager, Lifecycle, LifecycleSignal, Location, MemoryAppearanceService, MemoryHost,
    MemoryTagStore, Observation, TranslationCatalog, Variant, VariantRule,
};
use std::path::PathBuf;
use std::sync::Arc;

fn demo_declaration(host: &mut MemoryHost) -> KindDeclaration {
    let class = match host.define_class("Ghoul", "Zombie") {
        Some(class) => class,
        None => {
            eprintln!("reference host has no Zombie class");
            std::process::exit(1);
        }
    };
    let key = or_terminate("demo key", Key::parse("demo:ghoul"));
    let backing = or_terminate("demo backing key", Key::parse("minecraft:zombie"));
    let pale = or_terminate("demo variant", Variant::new("pale", "file:///demo/pale.bbmodel"));
    or_terminate(
        "demo declaration",
        KindDeclaration::builder(key, backing, InstanceFactory::of(class), named_wrapper("Ghoul"))
            .variant(pale)
            .variant_rule(VariantRule::first())
            .display_name("en_us", "Ghoul")
            .build(),
    )
}

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => or_terminate("load config", EngineConfig::load(&PathBuf::from(path))),
        None => EngineConfig::default(),
    };
    if let Err(err) = init_from_config(&config) {
        eprintln!("logging disabled: {err}");
    }
    info!("event=cli_start module=cli status=start version={}", core_version());

    let mut host = MemoryHost::vanilla();
    let appearance = Arc::new(MemoryAppearanceService::new(false));
    let mut lifecycle = Lifecycle::new(Injector::from_config(appearance.clone(), &config));
    let declaration = demo_declaration(&mut host);
    or_terminate("register", lifecycle.injector_mut().register(declaration));

    for signal in [
        LifecycleSignal::PreWorldAvailable,
        LifecycleSignal::KindRegistryCreatable,
        LifecycleSignal::WorldDataReady,
    ] {
        or_terminate(signal.as_str(), lifecycle.handle(signal, &mut host));
    }

    let injector = lifecycle.into_injector();
    let mut manager = or_terminate("manager", KindManager::new(&injector, MemoryTagStore::new()));
    let kind = or_terminate("demo key", Key::parse("demo:ghoul"));
    let world = or_terminate("world key", Key::parse("minecraft:overworld"));
    let spawned = or_terminate(
        "spawn",
        manager.spawn(&mut host, &kind, Location::new(world, 0.0, 64.0, 0.0)),
    );

    appearance.set_available(true);
    let applied = or_terminate(
        "apply pending",
        manager.apply_pending((&spawned.instance).into()),
    );

    let types = or_terminate("types", injector.types());
    let catalog = TranslationCatalog::from_types(&types);
    println!("menagerie_core version={}", core_version());
    println!("phase={}", injector.phase());
    for key in manager.list_injected_kinds() {
        println!(
            "kind={key} backing={} name={}",
            manager
                .backing_kind(&key)
                .map(Key::to_string)
                .unwrap_or_default(),
            catalog
                .translate(&key.description_id(), "en_us")
                .unwrap_or("-")
        );
    }
    if let Observation::FirstSpawn { variant, appearance } = &spawned.observation {
        println!(
            "spawned={} variant={} appearance={appearance:?}",
            spawned.instance.uuid,
            variant.as_deref().unwrap_or("NONE")
        );
    }
    println!("pending_applied={applied:?}");
    menagerie_core::flush_logging();
}
