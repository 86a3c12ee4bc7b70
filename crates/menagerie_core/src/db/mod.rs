//! Tag database bootstrap.
//!
//! # Responsibility
//! - Open the SQLite database that backs `SqliteTagStore`.
//! - Bring its table layout to the one this release writes.
//!
//! # Invariants
//! - The table layout number lives in `PRAGMA user_version`. It is unrelated
//!   to the per-instance data version stored inside the tags.
//! - A database laid out by a newer release is refused, never downgraded.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// The database file could not be opened or created.
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    Sqlite(rusqlite::Error),
    /// The stored layout is newer than any layout this release knows.
    NewerLayout { found: u32, supported: u32 },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "cannot open tag database {}: {source}", path.display())
            }
            Self::Sqlite(err) => write!(f, "tag database: {err}"),
            Self::NewerLayout { found, supported } => write!(
                f,
                "tag database layout {found} was written by a newer release (supported up to {supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::NewerLayout { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
