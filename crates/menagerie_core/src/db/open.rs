//! Connection bootstrap for the tag database.
//!
//! # Invariants
//! - Returned connections carry the latest table layout.
//! - File databases use WAL journaling and wait up to [`BUSY_TIMEOUT`] on a
//!   locked database.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (or creates) the tag database at `path`.
///
/// # Side effects
/// - Creates the file when missing.
/// - Emits `tag_db_open` events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    let started_at = Instant::now();
    info!("event=tag_db_open module=db status=start mode=file");

    let mut conn = Connection::open(path).map_err(|source| {
        error!(
            "event=tag_db_open module=db status=error mode=file error_code=open_failed error={source}"
        );
        DbError::Open {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let prepared = prepare_file(&mut conn);
    finish(conn, prepared, "file", started_at)
}

/// Opens a private in-memory tag database.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=tag_db_open module=db status=start mode=memory");
    let mut conn = Connection::open_in_memory()?;
    let prepared = apply_migrations(&mut conn);
    finish(conn, prepared, "memory", started_at)
}

fn prepare_file(conn: &mut Connection) -> DbResult<usize> {
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}

fn finish(
    conn: Connection,
    prepared: DbResult<usize>,
    mode: &str,
    started_at: Instant,
) -> DbResult<Connection> {
    let duration_ms = started_at.elapsed().as_millis();
    match prepared {
        Ok(migrated) => {
            info!(
                "event=tag_db_open module=db status=ok mode={mode} migrated={migrated} duration_ms={duration_ms}"
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=tag_db_open module=db status=error mode={mode} duration_ms={duration_ms} error_code=bootstrap_failed error={err}"
            );
            Err(err)
        }
    }
}
