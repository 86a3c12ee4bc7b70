//! Tag database layout upgrades.
//!
//! # Invariants
//! - Layouts are numbered from 1 and listed in ascending order.
//! - Every pending layout is applied in one transaction; the layout number is
//!   written to `PRAGMA user_version` after each script.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// SQL script producing layout `version` from layout `version - 1`.
#[derive(Debug, Clone, Copy)]
struct Layout {
    version: u32,
    script: &'static str,
}

const LAYOUTS: &[Layout] = &[Layout {
    version: 1,
    script: include_str!("0001_instance_tags.sql"),
}];

/// Latest table layout this release writes.
pub fn latest_version() -> u32 {
    LAYOUTS.last().map_or(0, |layout| layout.version)
}

/// Layout number recorded in the database.
pub fn stored_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

/// Upgrades the database to [`latest_version`].
///
/// Returns the number of layout scripts applied.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    let stored = stored_version(conn)?;
    let latest = latest_version();
    if stored > latest {
        return Err(DbError::NewerLayout {
            found: stored,
            supported: latest,
        });
    }

    let pending: Vec<&Layout> = LAYOUTS.iter().filter(|layout| layout.version > stored).collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for layout in &pending {
        tx.execute_batch(layout.script)?;
        tx.pragma_update(None, "user_version", layout.version)?;
    }
    tx.commit()?;
    info!(
        "event=tag_db_migrate module=db status=ok from={stored} to={latest} scripts={}",
        pending.len()
    );
    Ok(pending.len())
}
