//! Persisted tag layout.

use std::fmt::{Display, Formatter};

/// The four per-instance fields the engine persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagField {
    /// Key of the injected kind (text).
    KindKey,
    /// Data version of the persisted instance (int).
    DataVersion,
    /// Chosen variant id, or `NONE` (text).
    Variant,
    /// Appearance name awaiting application (text). Absent when nothing is pending.
    PendingAppearance,
}

impl TagField {
    pub const ALL: [TagField; 4] = [
        Self::KindKey,
        Self::DataVersion,
        Self::Variant,
        Self::PendingAppearance,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::KindKey => "menagerie:kind",
            Self::DataVersion => "menagerie:data_version",
            Self::Variant => "menagerie:variant",
            Self::PendingAppearance => "menagerie:pending_appearance",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == raw)
    }
}

impl Display for TagField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Text(String),
    Int(i64),
}

impl TagValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}
