//! Phased kind injection and live patching for a running simulation host.
//! This crate owns every injection invariant; hosts only expose their tables.

pub mod assets;
pub mod config;
pub mod db;
pub mod fatal;
pub mod host;
pub mod inject;
pub mod lifecycle;
pub mod logging;
pub mod manager;
pub mod model;
pub mod patch;
pub mod persistence;
pub mod spawn;
pub mod translations;
pub mod variant;
pub mod world;

pub use assets::{export_appearance_assets, AssetError};
pub use config::{ConfigError, EngineConfig, Verbosity};
pub use host::{AppearanceService, Host, HostError, MemoryAppearanceService, MemoryHost};
pub use inject::{
    named_wrapper, InjectError, Injector, KindDeclaration, Phase, WorldReport,
};
pub use lifecycle::{Lifecycle, LifecycleSignal};
pub use logging::{default_log_level, flush_logging, init_logging, logging_status};
pub use manager::{AppearanceStatus, KindManager, ManagerError, Observation, Origin, Spawned};
pub use model::instance::{InstanceId, InstanceRef, Location, RawInstance};
pub use model::key::{Key, KeyError};
pub use model::kind::{AttributeProfile, Category, InstanceFactory, KindBuilder};
pub use persistence::{
    MemoryTagStore, SqliteTagStore, TagField, TagStore, TagStoreError, TagValue,
    CURRENT_DATA_VERSION,
};
pub use spawn::{BiomeFilter, SpawnData, SpawnRule};
pub use translations::TranslationCatalog;
pub use variant::{Variant, VariantError, VariantRule, NO_VARIANT_ID};
pub use world::WorldLoadTracker;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
