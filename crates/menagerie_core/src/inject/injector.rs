//! Injection phase state machine.
//!
//! # Responsibility
//! - Accept declarations while in [`Phase::Registration`].
//! - `inject_types`: freeze declarations and register kinds (phase 1).
//! - `inject_world`: merge spawn tables, then apply code patches and rewire
//!   wrapper dispatch (phases 2 and 3).
//!
//! # Invariants
//! - Calling an operation in the wrong phase fails with
//!   [`InjectError::InvalidPhase`] and changes nothing.
//! - Any failure while mutating host state poisons the injector; every later
//!   call returns [`InjectError::Poisoned`].
//! - `types()` and `injections()` fail with [`InjectError::NotReady`] until
//!   [`Phase::Injected`].

use crate::config::{EngineConfig, Verbosity};
use crate::host::appearance::AppearanceService;
use crate::host::Host;
use crate::inject::declaration::KindDeclaration;
use crate::inject::index::InjectionState;
use crate::inject::ledger::DeclarationLedger;
use crate::inject::unit::{InjectedTypes, InjectionUnit};
use crate::inject::{InjectError, Phase};
use crate::patch::hooks::{construction_patch, identity_disguise_patch, state_suppression_patch};
use crate::patch::reflection::{filter_bypass_patch, resolve_fields};
use crate::patch::PatchEngine;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Instant;

/// Outcome of [`Injector::inject_world`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldReport {
    pub spawn_entries: usize,
    pub patches: Vec<&'static str>,
    pub rewired_backings: usize,
}

pub struct Injector {
    phase: Phase,
    poisoned: bool,
    verbosity: Verbosity,
    ledger: DeclarationLedger,
    unit: Option<InjectionUnit>,
    types: Option<Arc<InjectedTypes>>,
    state: Arc<InjectionState>,
    appearance: Arc<dyn AppearanceService>,
}

impl Injector {
    pub fn new(appearance: Arc<dyn AppearanceService>, verbosity: Verbosity) -> Self {
        Self {
            phase: Phase::Registration,
            poisoned: false,
            verbosity,
            ledger: DeclarationLedger::new(),
            unit: None,
            types: None,
            state: Arc::new(InjectionState::new()),
            appearance,
        }
    }

    pub fn from_config(appearance: Arc<dyn AppearanceService>, config: &EngineConfig) -> Self {
        Self::new(appearance, config.verbosity)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Instance index shared with patched call sites.
    pub fn state(&self) -> &Arc<InjectionState> {
        &self.state
    }

    pub fn appearance(&self) -> &Arc<dyn AppearanceService> {
        &self.appearance
    }

    /// Declares a kind.
    ///
    /// # Errors
    /// - [`InjectError::InvalidPhase`] outside [`Phase::Registration`].
    /// - [`InjectError::DuplicateKey`] / [`InjectError::DuplicateClass`].
    pub fn register(&mut self, declaration: KindDeclaration) -> Result<(), InjectError> {
        self.expect_phase("register", Phase::Registration)?;
        self.ledger.register(declaration)
    }

    /// Freezes the ledger into an injection unit.
    pub fn load_declarations(&mut self) -> Result<usize, InjectError> {
        self.expect_phase("load_declarations", Phase::Registration)?;
        let declarations = std::mem::take(&mut self.ledger).into_declarations();
        let unit = match InjectionUnit::freeze(declarations) {
            Ok(unit) => unit,
            Err(err) => return Err(self.poison("load_declarations", err)),
        };
        let count = unit.len();
        self.unit = Some(unit);
        self.phase = Phase::PreInjection;
        if self.verbosity.normal() {
            info!("event=declarations_load module=injector status=ok declarations={count}");
        }
        Ok(count)
    }

    /// Registers every declared kind (phase 1 of 3).
    ///
    /// Loads declarations first when still in [`Phase::Registration`].
    pub fn inject_types(&mut self, host: &mut dyn Host) -> Result<usize, InjectError> {
        self.ensure_healthy()?;
        if self.phase == Phase::Registration {
            self.load_declarations()?;
        }
        self.expect_phase("inject_types", Phase::PreInjection)?;
        self.phase = Phase::Phase1;

        let started_at = Instant::now();
        let verbosity = self.verbosity;
        let Some(unit) = self.unit.as_mut() else {
            let err = InjectError::InvalidPhase {
                operation: "inject_types",
                phase: Phase::Phase1,
            };
            return Err(self.poison("inject_types", err));
        };
        if verbosity.normal() {
            info!(
                "event=inject_types module=injector status=start stage=\"[Phase 1/3]\" kinds={}",
                unit.len()
            );
        }
        let created = {
            let mut parts = host.parts();
            unit.create_types(&mut parts, verbosity)
        };
        let kinds = match created {
            Ok(kinds) => kinds,
            Err(err) => return Err(self.poison("inject_types", err)),
        };
        let count = kinds.len();
        if !self.state.publish_kinds(kinds) {
            warn!("event=inject_types module=injector status=warn reason=kinds_already_published");
        }
        self.phase = Phase::Phase2;
        if verbosity.normal() {
            info!(
                "event=inject_types module=injector status=ok stage=\"[Phase 1/3]\" kinds={count} duration_ms={}",
                started_at.elapsed().as_millis()
            );
        }
        Ok(count)
    }

    /// Merges spawn tables, patches host code and rewires dispatch
    /// (phases 2 and 3 of 3).
    pub fn inject_world(&mut self, host: &mut dyn Host) -> Result<WorldReport, InjectError> {
        self.expect_phase("inject_world", Phase::Phase2)?;
        let started_at = Instant::now();
        let Some(unit) = self.unit.take() else {
            let err = InjectError::InvalidPhase {
                operation: "inject_world",
                phase: Phase::Phase2,
            };
            return Err(self.poison("inject_world", err));
        };
        match self.wire_world(&unit, host) {
            Ok(report) => {
                self.types = Some(Arc::new(unit.into_types()));
                self.phase = Phase::Injected;
                if self.verbosity.normal() {
                    info!(
                        "event=inject_world module=injector status=ok spawn_entries={} patches={} rewired={} duration_ms={}",
                        report.spawn_entries,
                        report.patches.len(),
                        report.rewired_backings,
                        started_at.elapsed().as_millis()
                    );
                }
                Ok(report)
            }
            Err(err) => Err(self.poison("inject_world", err)),
        }
    }

    fn wire_world(
        &self,
        unit: &InjectionUnit,
        host: &mut dyn Host,
    ) -> Result<WorldReport, InjectError> {
        let verbosity = self.verbosity;
        let parts = host.parts();

        if verbosity.normal() {
            info!("event=inject_world module=injector status=start stage=\"[Phase 2/3]\"");
        }
        let spawn_entries = unit.wire_spawn_tables(&mut *parts.biomes, verbosity)?;

        if verbosity.normal() {
            info!("event=inject_world module=injector status=start stage=\"[Phase 3/3]\"");
        }
        if unit.is_empty() {
            if verbosity.normal() {
                info!("event=inject_world module=injector status=skip reason=no_declarations");
            }
            return Ok(WorldReport {
                spawn_entries,
                ..WorldReport::default()
            });
        }

        let patches = vec![
            filter_bypass_patch(),
            construction_patch(Arc::clone(&self.state)),
            state_suppression_patch(Arc::clone(&self.state), Arc::clone(&self.appearance)),
            identity_disguise_patch(Arc::clone(&self.state)),
        ];
        let mut applied = PatchEngine::new(patches).apply(&mut *parts.code)?;

        let owner = parts.conversions.owner().to_string();
        let declared = parts.conversions.declared_fields();
        let sealed = parts.conversions.sealed_field().to_string();
        let access = resolve_fields(&mut *parts.code, &owner, &declared, &[sealed.as_str()]);
        let reverted = applied.revert_reversible(&mut *parts.code);
        let access = access?;
        reverted?;

        let rewired_backings =
            unit.wire_dispatch(&*parts.kinds, &mut *parts.conversions, &access)?;
        Ok(WorldReport {
            spawn_entries,
            patches: applied.patched().to_vec(),
            rewired_backings,
        })
    }

    /// Injected kinds, once injection finished.
    pub fn types(&self) -> Result<Arc<InjectedTypes>, InjectError> {
        self.ensure_healthy()?;
        self.types.clone().ok_or(InjectError::NotReady(self.phase))
    }

    /// Declarations of every injected kind, in declaration order.
    pub fn injections(&self) -> Result<Vec<KindDeclaration>, InjectError> {
        let types = self.types()?;
        Ok(types
            .iter()
            .map(|entry| entry.declaration().clone())
            .collect())
    }

    fn ensure_healthy(&self) -> Result<(), InjectError> {
        if self.poisoned {
            Err(InjectError::Poisoned)
        } else {
            Ok(())
        }
    }

    fn expect_phase(&self, operation: &'static str, expected: Phase) -> Result<(), InjectError> {
        self.ensure_healthy()?;
        if self.phase == expected {
            Ok(())
        } else {
            Err(InjectError::InvalidPhase {
                operation,
                phase: self.phase,
            })
        }
    }

    fn poison(&mut self, operation: &'static str, err: InjectError) -> InjectError {
        self.poisoned = true;
        error!(
            "event={operation} module=injector status=error phase={} error={}",
            self.phase, err
        );
        err
    }
}

#[cfg(test)]
mod tests {
    use super::Injector;
    use crate::config::Verbosity;
    use crate::host::appearance::MemoryAppearanceService;
    use crate::host::code::CodeTable;
    use crate::host::memory::MemoryHost;
    use crate::inject::declaration::{named_wrapper, KindDeclaration};
    use crate::inject::{InjectError, Phase};
    use crate::model::key::Key;
    use crate::model::kind::InstanceFactory;
    use std::sync::Arc;

    fn injector() -> Injector {
        Injector::new(Arc::new(MemoryAppearanceService::new(false)), Verbosity::Quiet)
    }

    fn ghoul(host: &mut MemoryHost, backing: &str) -> KindDeclaration {
        let class = host.define_class("Ghoul", "Zombie").expect("class");
        KindDeclaration::builder(
            Key::parse("zoo:ghoul").expect("key"),
            Key::parse(backing).expect("key"),
            InstanceFactory::of(class),
            named_wrapper("Ghoul"),
        )
        .build()
        .expect("declaration")
    }

    #[test]
    fn register_after_loading_is_rejected_without_poisoning() {
        let mut host = MemoryHost::vanilla();
        let mut injector = injector();
        injector.load_declarations().expect("load");
        let err = injector
            .register(ghoul(&mut host, "minecraft:zombie"))
            .expect_err("ledger is frozen");
        assert_eq!(
            err,
            InjectError::InvalidPhase {
                operation: "register",
                phase: Phase::PreInjection,
            }
        );
        assert!(!injector.is_poisoned());
    }

    #[test]
    fn world_before_types_is_invalid() {
        let mut host = MemoryHost::vanilla();
        let mut injector = injector();
        let err = injector.inject_world(&mut host).expect_err("phase 1 missing");
        assert!(matches!(err, InjectError::InvalidPhase { .. }));
        assert_eq!(injector.phase(), Phase::Registration);
    }

    #[test]
    fn failing_phase_poisons() {
        let mut host = MemoryHost::vanilla();
        let mut injector = injector();
        injector
            .register(ghoul(&mut host, "minecraft:marker"))
            .expect("register");
        let err = injector.inject_types(&mut host).expect_err("marker has no schema");
        assert!(matches!(err, InjectError::MissingSchema { .. }));
        assert!(injector.is_poisoned());
        assert_eq!(
            injector.inject_world(&mut host).expect_err("poisoned"),
            InjectError::Poisoned
        );
        assert_eq!(injector.types().expect_err("poisoned"), InjectError::Poisoned);
    }

    #[test]
    fn empty_injection_skips_patches() {
        let mut host = MemoryHost::vanilla();
        let mut injector = injector();
        assert_eq!(injector.inject_types(&mut host).expect("types"), 0);
        let report = injector.inject_world(&mut host).expect("world");
        assert!(report.patches.is_empty());
        assert_eq!(host.code().redefinitions(), 0);
        assert!(injector.types().expect("types").is_empty());
    }
}
