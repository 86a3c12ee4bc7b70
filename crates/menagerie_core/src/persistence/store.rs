//! Tag store contract and in-memory implementation.

use crate::db::DbError;
use crate::persistence::tag::{TagField, TagValue};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type TagResult<T> = Result<T, TagStoreError>;

#[derive(Debug)]
pub enum TagStoreError {
    Db(DbError),
    /// A stored field holds a value of the wrong kind.
    InvalidData {
        instance: Uuid,
        field: TagField,
        message: String,
    },
}

impl Display for TagStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData {
                instance,
                field,
                message,
            } => write!(f, "invalid tag {field} on instance {instance}: {message}"),
        }
    }
}

impl Error for TagStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData { .. } => None,
        }
    }
}

impl From<DbError> for TagStoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for TagStoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Flat key/value tags per instance, keyed by the instance uuid.
pub trait TagStore {
    fn get(&self, instance: Uuid, field: TagField) -> TagResult<Option<TagValue>>;

    fn set(&mut self, instance: Uuid, field: TagField, value: TagValue) -> TagResult<()>;

    /// Writes every tag in `tags`, or none of them when any write fails.
    fn set_all(&mut self, instance: Uuid, tags: &[(TagField, TagValue)]) -> TagResult<()>;

    /// Removes a field. Returns whether it was present.
    fn remove(&mut self, instance: Uuid, field: TagField) -> TagResult<bool>;

    fn get_text(&self, instance: Uuid, field: TagField) -> TagResult<Option<String>> {
        match self.get(instance, field)? {
            None => Ok(None),
            Some(TagValue::Text(value)) => Ok(Some(value)),
            Some(TagValue::Int(value)) => Err(TagStoreError::InvalidData {
                instance,
                field,
                message: format!("expected text, found int {value}"),
            }),
        }
    }

    fn get_int(&self, instance: Uuid, field: TagField) -> TagResult<Option<i64>> {
        match self.get(instance, field)? {
            None => Ok(None),
            Some(TagValue::Int(value)) => Ok(Some(value)),
            Some(TagValue::Text(value)) => Err(TagStoreError::InvalidData {
                instance,
                field,
                message: format!("expected int, found text `{value}`"),
            }),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryTagStore {
    tags: BTreeMap<(Uuid, TagField), TagValue>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every tag of `instance`, in field order.
    pub fn tags_of(&self, instance: Uuid) -> Vec<(TagField, TagValue)> {
        self.tags
            .iter()
            .filter(|((owner, _), _)| *owner == instance)
            .map(|((_, field), value)| (*field, value.clone()))
            .collect()
    }
}

impl TagStore for MemoryTagStore {
    fn get(&self, instance: Uuid, field: TagField) -> TagResult<Option<TagValue>> {
        Ok(self.tags.get(&(instance, field)).cloned())
    }

    fn set(&mut self, instance: Uuid, field: TagField, value: TagValue) -> TagResult<()> {
        self.tags.insert((instance, field), value);
        Ok(())
    }

    fn set_all(&mut self, instance: Uuid, tags: &[(TagField, TagValue)]) -> TagResult<()> {
        for (field, value) in tags {
            self.tags.insert((instance, *field), value.clone());
        }
        Ok(())
    }

    fn remove(&mut self, instance: Uuid, field: TagField) -> TagResult<bool> {
        Ok(self.tags.remove(&(instance, field)).is_some())
    }
}
