//! Host lifecycle driver.
//!
//! # Responsibility
//! - Map host lifecycle signals onto injector phases.
//!
//! # Invariants
//! - Each signal drives its phase at most once; repeats are ignored.
//! - Signals arriving out of order surface the injector's phase error.

use crate::host::Host;
use crate::inject::injector::Injector;
use crate::inject::InjectError;
use log::{debug, info};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleSignal {
    /// Declarations are complete; the ledger may be frozen.
    PreWorldAvailable,
    /// The kind registry accepts new entries (phase 1).
    KindRegistryCreatable,
    /// World data is loaded; spawn tables and dispatch can be wired.
    WorldDataReady,
}

impl LifecycleSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreWorldAvailable => "pre_world_available",
            Self::KindRegistryCreatable => "kind_registry_creatable",
            Self::WorldDataReady => "world_data_ready",
        }
    }
}

impl Display for LifecycleSignal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Lifecycle {
    injector: Injector,
    handled: BTreeSet<LifecycleSignal>,
}

impl Lifecycle {
    pub fn new(injector: Injector) -> Self {
        Self {
            injector,
            handled: BTreeSet::new(),
        }
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// Mutable access for declaration registration before the first signal.
    pub fn injector_mut(&mut self) -> &mut Injector {
        &mut self.injector
    }

    pub fn into_injector(self) -> Injector {
        self.injector
    }

    /// Runs the phase bound to `signal`.
    ///
    /// Returns `false` when the signal was already handled.
    pub fn handle(&mut self, signal: LifecycleSignal, host: &mut dyn Host) -> Result<bool, InjectError> {
        if !self.handled.insert(signal) {
            debug!("event=lifecycle_signal module=lifecycle status=ignored signal={signal}");
            return Ok(false);
        }
        info!("event=lifecycle_signal module=lifecycle status=start signal={signal}");
        match signal {
            LifecycleSignal::PreWorldAvailable => {
                self.injector.load_declarations()?;
            }
            LifecycleSignal::KindRegistryCreatable => {
                self.injector.inject_types(host)?;
            }
            LifecycleSignal::WorldDataReady => {
                self.injector.inject_world(host)?;
            }
        }
        info!(
            "event=lifecycle_signal module=lifecycle status=ok signal={signal} phase={}",
            self.injector.phase()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{Lifecycle, LifecycleSignal};
    use crate::config::Verbosity;
    use crate::host::appearance::MemoryAppearanceService;
    use crate::host::memory::MemoryHost;
    use crate::inject::{InjectError, Injector, Phase};
    use std::sync::Arc;

    fn lifecycle() -> Lifecycle {
        Lifecycle::new(Injector::new(
            Arc::new(MemoryAppearanceService::new(false)),
            Verbosity::Quiet,
        ))
    }

    #[test]
    fn signals_drive_phases_in_order() {
        let mut host = MemoryHost::vanilla();
        let mut lifecycle = lifecycle();
        assert!(lifecycle
            .handle(LifecycleSignal::PreWorldAvailable, &mut host)
            .expect("load"));
        assert_eq!(lifecycle.injector().phase(), Phase::PreInjection);
        assert!(lifecycle
            .handle(LifecycleSignal::KindRegistryCreatable, &mut host)
            .expect("phase 1"));
        assert_eq!(lifecycle.injector().phase(), Phase::Phase2);
        assert!(lifecycle
            .handle(LifecycleSignal::WorldDataReady, &mut host)
            .expect("phases 2 and 3"));
        assert_eq!(lifecycle.injector().phase(), Phase::Injected);
    }

    #[test]
    fn repeated_signal_is_ignored() {
        let mut host = MemoryHost::vanilla();
        let mut lifecycle = lifecycle();
        lifecycle
            .handle(LifecycleSignal::KindRegistryCreatable, &mut host)
            .expect("phase 1");
        let again = lifecycle
            .handle(LifecycleSignal::KindRegistryCreatable, &mut host)
            .expect("ignored");
        assert!(!again);
        assert_eq!(lifecycle.injector().phase(), Phase::Phase2);
    }

    #[test]
    fn world_signal_before_registry_signal_is_a_phase_error() {
        let mut host = MemoryHost::vanilla();
        let mut lifecycle = lifecycle();
        let err = lifecycle
            .handle(LifecycleSignal::WorldDataReady, &mut host)
            .expect_err("out of order");
        assert!(matches!(err, InjectError::InvalidPhase { .. }));
        assert!(!lifecycle.injector().is_poisoned());
    }
}
