//! Namespaced identity keys.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z0-9._-]+):([a-z0-9/._-]+)$").expect("valid key regex"));

/// Namespace used when a key string carries no explicit namespace.
pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// Root segment of every appearance (model) name produced by the engine.
pub const APPEARANCE_ROOT: &str = "menagerie";

/// Namespaced identity, rendered as `namespace:value`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key {
    namespace: String,
    value: String,
}

impl Key {
    /// Builds a key from explicit parts.
    pub fn new(namespace: &str, value: &str) -> Result<Self, KeyError> {
        Self::parse(&format!("{namespace}:{value}"))
    }

    /// Parses `namespace:value`; a bare `value` falls back to [`DEFAULT_NAMESPACE`].
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(KeyError::Empty);
        }
        let qualified = if trimmed.contains(':') {
            trimmed.to_string()
        } else {
            format!("{DEFAULT_NAMESPACE}:{trimmed}")
        };
        let Some(captures) = KEY_RE.captures(&qualified) else {
            return Err(KeyError::Invalid(raw.to_string()));
        };
        Ok(Self {
            namespace: captures[1].to_string(),
            value: captures[2].to_string(),
        })
    }

    /// Builds a key from a host-owned literal without validation.
    pub(crate) fn builtin(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((namespace, value)) => Self {
                namespace: namespace.to_string(),
                value: value.to_string(),
            },
            None => Self {
                namespace: DEFAULT_NAMESPACE.to_string(),
                value: raw.to_string(),
            },
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn as_string(&self) -> String {
        format!("{}:{}", self.namespace, self.value)
    }

    /// Appearance name prefix for kinds registered under this key.
    ///
    /// Format: `menagerie.<namespace>.<value>`.
    pub fn appearance_prefix(&self) -> String {
        format!("{APPEARANCE_ROOT}.{}.{}", self.namespace, self.value)
    }

    /// Translation id used by display-name lookups: `entity.<namespace>.<value>`.
    pub fn description_id(&self) -> String {
        format!("entity.{}.{}", self.namespace, self.value.replace('/', "."))
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.value)
    }
}

impl FromStr for Key {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Key {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Key> for String {
    fn from(value: Key) -> Self {
        value.as_string()
    }
}

/// Key parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    Empty,
    Invalid(String),
}

impl Display for KeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "key must not be empty"),
            Self::Invalid(value) => write!(
                f,
                "key is invalid: `{value}` (expected namespace:value in [a-z0-9/._-])"
            ),
        }
    }
}

impl Error for KeyError {}
