//! Runtime kind manager.
//!
//! # Responsibility
//! - Answer queries about injected kinds once injection finished.
//! - Spawn injected kinds and initialize their persisted tags.
//! - Reconcile tags of loaded instances: migrate, restore the no-variant
//!   mark and apply pending appearances.
//!
//! # Invariants
//! - A manager only exists after [`Phase::Injected`](crate::inject::Phase).
//! - First-spawn tags are written only for freshly spawned instances; loaded
//!   instances never receive fabricated history.
//! - A pending appearance is cleared exactly once, when it is applied.

use crate::host::appearance::AppearanceService;
use crate::host::{Host, HostError};
use crate::inject::declaration::KindDeclaration;
use crate::inject::index::InjectionState;
use crate::inject::injector::Injector;
use crate::inject::unit::InjectedTypes;
use crate::inject::InjectError;
use crate::model::instance::{InstanceId, InstanceRef, Location, RawInstance};
use crate::model::key::Key;
use crate::persistence::migration::{
    default_steps, migrate_to, MigrationOutcome, MigrationStep, CURRENT_DATA_VERSION,
};
use crate::persistence::store::{TagStore, TagStoreError};
use crate::persistence::tag::{TagField, TagValue};
use crate::variant::resolver::pick;
use crate::variant::{SpawnContext, VariantError, NO_VARIANT_ID};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// How an instance entered the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Spawned,
    Loaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppearanceStatus {
    /// Nothing to apply.
    None,
    Applied(String),
    /// Stored for a later [`KindManager::apply_pending`].
    Pending(String),
}

/// Result of [`KindManager::observe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Not an instance of an injected kind.
    Ignored,
    FirstSpawn {
        variant: Option<String>,
        appearance: AppearanceStatus,
    },
    Loaded {
        migration: MigrationOutcome,
        appearance: AppearanceStatus,
    },
}

/// A freshly spawned instance and the tags written for it.
#[derive(Debug, Clone)]
pub struct Spawned {
    pub instance: RawInstance,
    pub observation: Observation,
}

#[derive(Debug)]
pub enum ManagerError {
    Inject(InjectError),
    UnknownKind(Key),
    NotInjected { instance: InstanceId, class: String },
    Host(HostError),
    Variant(VariantError),
    Store(TagStoreError),
}

impl Display for ManagerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inject(err) => write!(f, "{err}"),
            Self::UnknownKind(key) => write!(f, "kind is not an injected kind: {key}"),
            Self::NotInjected { instance, class } => {
                write!(f, "instance {instance} of class {class} is not an injected kind")
            }
            Self::Host(err) => write!(f, "{err}"),
            Self::Variant(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ManagerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Inject(err) => Some(err),
            Self::Host(err) => Some(err),
            Self::Variant(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::UnknownKind(_) | Self::NotInjected { .. } => None,
        }
    }
}

impl From<InjectError> for ManagerError {
    fn from(value: InjectError) -> Self {
        Self::Inject(value)
    }
}

impl From<HostError> for ManagerError {
    fn from(value: HostError) -> Self {
        Self::Host(value)
    }
}

impl From<VariantError> for ManagerError {
    fn from(value: VariantError) -> Self {
        Self::Variant(value)
    }
}

impl From<TagStoreError> for ManagerError {
    fn from(value: TagStoreError) -> Self {
        Self::Store(value)
    }
}

pub type ManagerResult<T> = Result<T, ManagerError>;

/// Query and spawn surface over the injected kinds.
pub struct KindManager<S: TagStore> {
    types: Arc<InjectedTypes>,
    state: Arc<InjectionState>,
    appearance: Arc<dyn AppearanceService>,
    store: S,
    steps: Vec<MigrationStep>,
}

impl<S: TagStore> KindManager<S> {
    /// Creates a manager over a finished injector.
    ///
    /// # Errors
    /// - [`InjectError::NotReady`] before injection finished.
    /// - [`InjectError::Poisoned`] after a failed injection.
    pub fn new(injector: &Injector, store: S) -> ManagerResult<Self> {
        Ok(Self {
            types: injector.types()?,
            state: Arc::clone(injector.state()),
            appearance: Arc::clone(injector.appearance()),
            store,
            steps: default_steps(),
        })
    }

    /// Replaces the data-version upgrade chain.
    pub fn with_steps(mut self, steps: Vec<MigrationStep>) -> Self {
        self.steps = steps;
        self
    }

    pub fn list_injected_kinds(&self) -> Vec<Key> {
        self.types.keys()
    }

    pub fn is_injected_kind(&self, kind: &Key) -> bool {
        self.types.by_key(kind).is_some()
    }

    /// Declaration of the kind `instance` was constructed as, if injected.
    pub fn lookup_declaration(&self, instance: &RawInstance) -> Option<&KindDeclaration> {
        self.types
            .by_class(instance.class.name())
            .map(|entry| entry.declaration())
    }

    pub fn require_declaration(&self, instance: &RawInstance) -> ManagerResult<&KindDeclaration> {
        self.lookup_declaration(instance)
            .ok_or_else(|| ManagerError::NotInjected {
                instance: instance.id,
                class: instance.class.name().to_string(),
            })
    }

    /// Backing kind of an injected kind.
    pub fn backing_kind(&self, kind: &Key) -> Option<&Key> {
        self.types
            .by_key(kind)
            .map(|entry| entry.declaration().backing())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Spawns an instance of an injected kind and initializes its tags.
    ///
    /// # Contract
    /// - Construction runs through the host, so construction hooks see it.
    /// - The returned observation is always [`Observation::FirstSpawn`].
    pub fn spawn(
        &mut self,
        host: &mut dyn Host,
        kind: &Key,
        location: Location,
    ) -> ManagerResult<Spawned> {
        let id = self
            .types
            .by_key(kind)
            .map(|entry| entry.id())
            .ok_or_else(|| ManagerError::UnknownKind(kind.clone()))?;
        let instance = host.construct_instance(id, location)?;
        let observation = self.observe(&*host, &instance, Origin::Spawned)?;
        info!(
            "event=instance_spawn module=manager status=ok kind={kind} instance={}",
            instance.uuid
        );
        Ok(Spawned {
            instance,
            observation,
        })
    }

    /// Handles an instance entering the world.
    ///
    /// # Contract
    /// - Instances of non-injected kinds are ignored.
    /// - A spawned instance without a variant tag is treated as first spawn.
    /// - Everything else is reconciled as a load.
    pub fn observe(
        &mut self,
        host: &dyn Host,
        instance: &RawInstance,
        origin: Origin,
    ) -> ManagerResult<Observation> {
        let types = Arc::clone(&self.types);
        let Some(declaration) = types
            .by_class(instance.class.name())
            .map(|entry| entry.declaration())
        else {
            return Ok(Observation::Ignored);
        };

        let tagged = self
            .store
            .get(instance.uuid, TagField::Variant)?
            .is_some();
        if origin == Origin::Spawned && !tagged {
            return self.first_spawn(host, instance, declaration);
        }

        let migration = migrate_to(
            &mut self.store,
            instance.uuid,
            CURRENT_DATA_VERSION,
            &self.steps,
        )?;
        if self.store.get_text(instance.uuid, TagField::Variant)?.as_deref() == Some(NO_VARIANT_ID)
        {
            self.state.mark_no_variant(instance.id);
        }
        let appearance = self.apply_pending(InstanceRef::from(instance))?;
        debug!(
            "event=instance_load module=manager kind={} instance={} migration={migration:?}",
            declaration.key(),
            instance.uuid
        );
        Ok(Observation::Loaded {
            migration,
            appearance,
        })
    }

    /// Applies a stored pending appearance when the service is available.
    pub fn apply_pending(&mut self, instance: InstanceRef) -> ManagerResult<AppearanceStatus> {
        let Some(name) = self
            .store
            .get_text(instance.uuid, TagField::PendingAppearance)?
        else {
            return Ok(AppearanceStatus::None);
        };
        if !self.appearance.is_available() {
            return Ok(AppearanceStatus::Pending(name));
        }
        match self.appearance.apply(instance, &name) {
            Ok(()) => {
                self.store
                    .remove(instance.uuid, TagField::PendingAppearance)?;
                info!(
                    "event=appearance_apply module=manager status=ok instance={} appearance={name} pending=true",
                    instance.uuid
                );
                Ok(AppearanceStatus::Applied(name))
            }
            Err(err) => {
                warn!(
                    "event=appearance_apply module=manager status=error instance={} appearance={name} error={err}",
                    instance.uuid
                );
                Ok(AppearanceStatus::Pending(name))
            }
        }
    }

    /// Drops runtime bookkeeping for a removed instance. Persisted tags stay.
    pub fn forget(&self, instance: InstanceId) {
        self.state.forget(instance);
    }

    fn first_spawn(
        &mut self,
        host: &dyn Host,
        instance: &RawInstance,
        declaration: &KindDeclaration,
    ) -> ManagerResult<Observation> {
        let environment = host.environment(&instance.location);
        let context = SpawnContext {
            instance: InstanceRef::from(instance),
            kind: declaration.key().clone(),
            location: instance.location.clone(),
            biome: environment.biome,
            temperature: environment.temperature,
        };
        let variant = pick(
            declaration.key(),
            declaration.variants(),
            declaration.variant_rule(),
            &context,
        )?;

        let mut tags = vec![(
            TagField::KindKey,
            TagValue::text(declaration.key().as_string()),
        )];
        let appearance = match &variant {
            Some(variant) => {
                tags.push((TagField::Variant, TagValue::text(variant.id())));
                let status = self.try_apply(context.instance, variant.appearance_name());
                if let AppearanceStatus::Pending(name) = &status {
                    tags.push((TagField::PendingAppearance, TagValue::text(name.clone())));
                }
                status
            }
            None => {
                tags.push((TagField::Variant, TagValue::text(NO_VARIANT_ID)));
                AppearanceStatus::None
            }
        };
        tags.push((TagField::DataVersion, TagValue::Int(CURRENT_DATA_VERSION)));
        self.store.set_all(instance.uuid, &tags)?;
        if variant.is_none() {
            self.state.mark_no_variant(instance.id);
        }

        Ok(Observation::FirstSpawn {
            variant: variant.map(|variant| variant.id().to_string()),
            appearance,
        })
    }

    fn try_apply(&self, instance: InstanceRef, name: &str) -> AppearanceStatus {
        if self.appearance.is_available() {
            match self.appearance.apply(instance, name) {
                Ok(()) => return AppearanceStatus::Applied(name.to_string()),
                Err(err) => warn!(
                    "event=appearance_apply module=manager status=error instance={} appearance={name} error={err}",
                    instance.uuid
                ),
            }
        }
        AppearanceStatus::Pending(name.to_string())
    }
}
