use menagerie_core::assets::{ASSET_EXTENSION, ASSET_SUBDIR};
use menagerie_core::{
    export_appearance_assets, named_wrapper, AssetError, InjectError, Injector, InstanceFactory,
    Key, KindDeclaration, MemoryAppearanceService, MemoryHost, Variant, Verbosity,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn injector_with_variant(
    host: &mut MemoryHost,
    appearance: Arc<MemoryAppearanceService>,
    source: &Path,
) -> Injector {
    let class = host.define_class("Ghoul", "Zombie").expect("class");
    let url = format!("file://{}", source.display());
    let declaration = KindDeclaration::builder(
        Key::parse("zoo:ghoul").expect("key"),
        Key::parse("minecraft:zombie").expect("key"),
        InstanceFactory::of(class),
        named_wrapper("Ghoul"),
    )
    .variant(Variant::new("pale", &url).expect("variant"))
    .build()
    .expect("declaration");
    let mut injector = Injector::new(appearance, Verbosity::Quiet);
    injector.register(declaration).expect("register");
    injector
}

#[test]
fn variants_are_copied_under_their_appearance_name() {
    let models = tempfile::tempdir().expect("models");
    let source = models.path().join("pale.bbmodel");
    fs::write(&source, "{\"model\":\"pale\"}").expect("write model");
    let target = tempfile::tempdir().expect("target");

    let mut host = MemoryHost::vanilla();
    let appearance =
        Arc::new(MemoryAppearanceService::new(true).with_asset_dir(target.path()));
    let mut injector = injector_with_variant(&mut host, appearance, &source);
    injector.inject_types(&mut host).expect("phase 1");
    injector.inject_world(&mut host).expect("phases 2 and 3");

    let written = export_appearance_assets(&injector, None).expect("export");
    let expected = target
        .path()
        .join(ASSET_SUBDIR)
        .join(format!("menagerie.zoo.ghoul.pale.{ASSET_EXTENSION}"));
    assert_eq!(written, vec![expected.clone()]);
    assert_eq!(
        fs::read_to_string(expected).expect("read copy"),
        "{\"model\":\"pale\"}"
    );
}

#[test]
fn export_requires_injection_and_service() {
    let models = tempfile::tempdir().expect("models");
    let source = models.path().join("pale.bbmodel");
    fs::write(&source, "{}").expect("write model");
    let target = tempfile::tempdir().expect("target");

    let mut host = MemoryHost::vanilla();
    let appearance = Arc::new(MemoryAppearanceService::new(false));
    let mut injector = injector_with_variant(&mut host, Arc::clone(&appearance), &source);
    assert!(matches!(
        export_appearance_assets(&injector, Some(target.path())),
        Err(AssetError::Inject(InjectError::NotReady(_)))
    ));

    injector.inject_types(&mut host).expect("phase 1");
    injector.inject_world(&mut host).expect("phases 2 and 3");
    assert!(matches!(
        export_appearance_assets(&injector, Some(target.path())),
        Err(AssetError::ServiceUnavailable)
    ));

    appearance.set_available(true);
    let written = export_appearance_assets(&injector, Some(target.path())).expect("export");
    assert_eq!(written.len(), 1);
    assert!(written[0].starts_with(target.path()));
}
