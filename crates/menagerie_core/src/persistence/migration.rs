//! Per-instance data-version migration.
//!
//! # Invariants
//! - An instance already at [`CURRENT_DATA_VERSION`] is never written.
//! - An instance without a recorded version is logged and left untouched.
//! - Versions only move forward; a version newer than the binary is kept as is.

use crate::persistence::store::{TagResult, TagStore};
use crate::persistence::tag::{TagField, TagValue};
use log::{error, info, warn};
use uuid::Uuid;

pub const CURRENT_DATA_VERSION: i64 = 1;

/// One upgrade step from `from` to `from + 1`.
#[derive(Clone, Copy)]
pub struct MigrationStep {
    pub from: i64,
    pub run: fn(&mut dyn TagStore, Uuid) -> TagResult<()>,
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

/// Upgrade chain shipped with this version. Version 1 is the first layout.
pub fn default_steps() -> Vec<MigrationStep> {
    Vec::new()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    UpToDate,
    /// No data version is stored; nothing was changed.
    MissingVersion,
    Migrated { from: i64, to: i64 },
    /// Written by a newer binary; nothing was changed.
    FromFuture(i64),
}

impl MigrationOutcome {
    pub fn changed(self) -> bool {
        matches!(self, Self::Migrated { .. })
    }
}

/// Brings `instance` to `current`, running every matching step on the way.
///
/// Versions without a step are skipped over; the final version is always
/// written once at least one version was crossed.
pub fn migrate_to(
    store: &mut dyn TagStore,
    instance: Uuid,
    current: i64,
    steps: &[MigrationStep],
) -> TagResult<MigrationOutcome> {
    let Some(stored) = store.get_int(instance, TagField::DataVersion)? else {
        error!(
            "event=instance_migrate module=persistence status=error instance={instance} reason=missing_data_version"
        );
        return Ok(MigrationOutcome::MissingVersion);
    };

    if stored == current {
        return Ok(MigrationOutcome::UpToDate);
    }
    if stored > current {
        warn!(
            "event=instance_migrate module=persistence status=skipped instance={instance} stored={stored} current={current}"
        );
        return Ok(MigrationOutcome::FromFuture(stored));
    }

    for version in stored..current {
        if let Some(step) = steps.iter().find(|step| step.from == version) {
            (step.run)(&mut *store, instance)?;
        }
    }
    store.set(instance, TagField::DataVersion, TagValue::Int(current))?;
    info!(
        "event=instance_migrate module=persistence status=ok instance={instance} from={stored} to={current}"
    );
    Ok(MigrationOutcome::Migrated {
        from: stored,
        to: current,
    })
}

#[cfg(test)]
mod tests {
    use super::{migrate_to, MigrationOutcome, MigrationStep, CURRENT_DATA_VERSION};
    use crate::persistence::store::{MemoryTagStore, TagResult, TagStore};
    use crate::persistence::tag::{TagField, TagValue};
    use uuid::Uuid;

    fn rename_variant(store: &mut dyn TagStore, instance: Uuid) -> TagResult<()> {
        if store.get_text(instance, TagField::Variant)?.as_deref() == Some("old") {
            store.set(instance, TagField::Variant, TagValue::text("new"))?;
        }
        Ok(())
    }

    #[test]
    fn current_version_is_left_alone() {
        let mut store = MemoryTagStore::new();
        let instance = Uuid::new_v4();
        store
            .set(
                instance,
                TagField::DataVersion,
                TagValue::Int(CURRENT_DATA_VERSION),
            )
            .expect("seed");
        let outcome =
            migrate_to(&mut store, instance, CURRENT_DATA_VERSION, &[]).expect("migrate");
        assert_eq!(outcome, MigrationOutcome::UpToDate);
        assert!(!outcome.changed());
    }

    #[test]
    fn missing_version_writes_nothing() {
        let mut store = MemoryTagStore::new();
        let instance = Uuid::new_v4();
        let outcome =
            migrate_to(&mut store, instance, CURRENT_DATA_VERSION, &[]).expect("migrate");
        assert_eq!(outcome, MigrationOutcome::MissingVersion);
        assert!(store.tags_of(instance).is_empty());
    }

    #[test]
    fn older_version_runs_steps_and_converges() {
        let mut store = MemoryTagStore::new();
        let instance = Uuid::new_v4();
        store
            .set(instance, TagField::DataVersion, TagValue::Int(1))
            .expect("seed version");
        store
            .set(instance, TagField::Variant, TagValue::text("old"))
            .expect("seed variant");
        let steps = [MigrationStep {
            from: 1,
            run: rename_variant,
        }];

        let outcome = migrate_to(&mut store, instance, 3, &steps).expect("migrate");
        assert_eq!(outcome, MigrationOutcome::Migrated { from: 1, to: 3 });
        assert_eq!(
            store.get_text(instance, TagField::Variant).expect("read"),
            Some("new".to_string())
        );
        assert_eq!(
            store.get_int(instance, TagField::DataVersion).expect("read"),
            Some(3)
        );

        let again = migrate_to(&mut store, instance, 3, &steps).expect("second load");
        assert_eq!(again, MigrationOutcome::UpToDate);
    }

    #[test]
    fn newer_version_is_not_downgraded() {
        let mut store = MemoryTagStore::new();
        let instance = Uuid::new_v4();
        store
            .set(instance, TagField::DataVersion, TagValue::Int(7))
            .expect("seed");
        let outcome = migrate_to(&mut store, instance, 2, &[]).expect("migrate");
        assert_eq!(outcome, MigrationOutcome::FromFuture(7));
        assert_eq!(
            store.get_int(instance, TagField::DataVersion).expect("read"),
            Some(7)
        );
    }
}
