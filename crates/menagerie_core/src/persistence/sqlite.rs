//! SQLite-backed tag store.
//!
//! # Invariants
//! - One row per `(instance_uuid, field)`; writes upsert.
//! - `set_all` runs in one immediate transaction.
//! - Reads reject rows whose stored kind disagrees with their columns.

use crate::persistence::store::{TagResult, TagStore, TagStoreError};
use crate::persistence::tag::{TagField, TagValue};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use uuid::Uuid;

const VALUE_KIND_TEXT: &str = "text";
const VALUE_KIND_INT: &str = "int";

pub struct SqliteTagStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTagStore<'conn> {
    /// `conn` must come from `db::open_db` / `db::open_db_in_memory`.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Number of stored tags across all instances.
    pub fn count(&self) -> TagResult<u64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM instance_tags;", [], |row| {
                row.get::<_, u64>(0)
            })?;
        Ok(count)
    }
}

impl TagStore for SqliteTagStore<'_> {
    fn get(&self, instance: Uuid, field: TagField) -> TagResult<Option<TagValue>> {
        let row = self
            .conn
            .query_row(
                "SELECT value_kind, value_text, value_int
                FROM instance_tags
                WHERE instance_uuid = ?1 AND field = ?2;",
                params![instance.to_string(), field.key()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((kind, text, int)) = row else {
            return Ok(None);
        };
        let invalid = |message: String| TagStoreError::InvalidData {
            instance,
            field,
            message,
        };
        match (kind.as_str(), text, int) {
            (VALUE_KIND_TEXT, Some(text), _) => Ok(Some(TagValue::Text(text))),
            (VALUE_KIND_INT, _, Some(int)) => Ok(Some(TagValue::Int(int))),
            (other, _, _) => Err(invalid(format!("row of kind `{other}` has no value"))),
        }
    }

    fn set(&mut self, instance: Uuid, field: TagField, value: TagValue) -> TagResult<()> {
        upsert(self.conn, instance, field, &value)
    }

    fn set_all(&mut self, instance: Uuid, tags: &[(TagField, TagValue)]) -> TagResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for (field, value) in tags {
            upsert(&tx, instance, *field, value)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn remove(&mut self, instance: Uuid, field: TagField) -> TagResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM instance_tags WHERE instance_uuid = ?1 AND field = ?2;",
            params![instance.to_string(), field.key()],
        )?;
        Ok(removed > 0)
    }
}

fn upsert(conn: &Connection, instance: Uuid, field: TagField, value: &TagValue) -> TagResult<()> {
    let (kind, text, int) = match value {
        TagValue::Text(text) => (VALUE_KIND_TEXT, Some(text.as_str()), None),
        TagValue::Int(int) => (VALUE_KIND_INT, None, Some(*int)),
    };
    conn.execute(
        "INSERT INTO instance_tags (instance_uuid, field, value_kind, value_text, value_int)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(instance_uuid, field) DO UPDATE SET
            value_kind = excluded.value_kind,
            value_text = excluded.value_text,
            value_int = excluded.value_int;",
        params![instance.to_string(), field.key(), kind, text, int],
    )?;
    Ok(())
}
