//! Per-instance appearance variants.
//!
//! # Responsibility
//! - Unbound variant definitions and their binding to one declaration.
//! - Selection rules (`rule`) and validated selection (`resolver`).
//!
//! # Invariants
//! - Variant ids match `[a-z0-9._-]+` and are unique per declaration.
//! - A bound variant's appearance name is `<declaration prefix>.<id>`.

pub mod resolver;
pub mod rule;

use crate::model::instance::{InstanceRef, Location};
use crate::model::key::Key;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use resolver::pick;
pub use rule::{TemperatureRange, VariantRule};

/// Persisted marker for instances that resolved to no variant.
pub const NO_VARIANT_ID: &str = "NONE";

static VARIANT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9._-]+$").expect("valid variant id regex"));

/// Variant definition before it is attached to a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    id: String,
    source: String,
}

impl Variant {
    /// `source` locates the appearance asset (`file://` URL or plain path).
    pub fn new(id: &str, source: &str) -> Result<Self, VariantError> {
        if !VARIANT_ID_RE.is_match(id) {
            return Err(VariantError::InvalidId(id.to_string()));
        }
        Ok(Self {
            id: id.to_string(),
            source: source.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bind(&self, owner: &Key) -> BoundVariant {
        BoundVariant {
            id: self.id.clone(),
            source: self.source.clone(),
            appearance_name: format!("{}.{}", owner.appearance_prefix(), self.id),
            owner: owner.clone(),
        }
    }
}

/// Variant attached to exactly one declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundVariant {
    id: String,
    source: String,
    owner: Key,
    appearance_name: String,
}

impl BoundVariant {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Key of the declaration this variant belongs to.
    pub fn owner(&self) -> &Key {
        &self.owner
    }

    pub fn appearance_name(&self) -> &str {
        &self.appearance_name
    }
}

/// Insertion-ordered variants of one declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantMap {
    entries: Vec<BoundVariant>,
}

impl VariantMap {
    /// Binds `variants` to `owner`, rejecting duplicate ids.
    pub fn bind(owner: &Key, variants: &[Variant]) -> Result<Self, VariantError> {
        let mut entries: Vec<BoundVariant> = Vec::with_capacity(variants.len());
        for variant in variants {
            if entries.iter().any(|bound| bound.id == variant.id) {
                return Err(VariantError::Duplicate(variant.id.clone()));
            }
            entries.push(variant.bind(owner));
        }
        Ok(Self { entries })
    }

    pub fn get(&self, id: &str) -> Option<&BoundVariant> {
        self.entries.iter().find(|variant| variant.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn first(&self) -> Option<&BoundVariant> {
        self.entries.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundVariant> {
        self.entries.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|variant| variant.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn at(&self, index: usize) -> Option<&BoundVariant> {
        self.entries.get(index)
    }
}

/// Inputs a variant rule may inspect.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnContext {
    pub instance: InstanceRef,
    pub kind: Key,
    pub location: Location,
    pub biome: Key,
    pub temperature: f64,
}

impl SpawnContext {
    /// Random source seeded from the instance uuid.
    pub fn rng(&self) -> StdRng {
        let (high, low) = self.instance.uuid.as_u64_pair();
        StdRng::seed_from_u64(high ^ low)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariantError {
    InvalidId(String),
    Duplicate(String),
    EmptyWeights,
    /// The positive weights add up to more than `u64::MAX`.
    WeightOverflow,
    UnknownVariant {
        kind: Key,
        ids: Vec<String>,
        known: Vec<String>,
    },
    ForeignVariant {
        expected: Key,
        actual: Key,
        id: String,
    },
}

impl Display for VariantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(id) => {
                write!(f, "variant id can only contain [a-z0-9_.-]: '{id}'")
            }
            Self::Duplicate(id) => write!(f, "duplicate variant id: '{id}'"),
            Self::EmptyWeights => write!(f, "weights map must contain a positive weight"),
            Self::WeightOverflow => write!(f, "sum of variant weights overflows"),
            Self::UnknownVariant { kind, ids, known } => write!(
                f,
                "unknown variant(s) [{}] for kind '{kind}'; known variants: [{}]",
                ids.join(", "),
                known.join(", ")
            ),
            Self::ForeignVariant {
                expected,
                actual,
                id,
            } => write!(
                f,
                "variant '{id}' belongs to '{actual}' but was picked for '{expected}'"
            ),
        }
    }
}

impl Error for VariantError {}

#[cfg(test)]
mod tests {
    use super::{Variant, VariantError, VariantMap};
    use crate::model::key::Key;

    #[test]
    fn binding_builds_appearance_names() {
        let owner = Key::parse("zoo:capybara").expect("key");
        let variant = Variant::new("cold", "models/cold.bbmodel").expect("variant");
        let bound = variant.bind(&owner);
        assert_eq!(bound.appearance_name(), "menagerie.zoo.capybara.cold");
        assert_eq!(bound.owner(), &owner);
    }

    #[test]
    fn invalid_and_duplicate_ids_are_rejected() {
        assert_eq!(
            Variant::new("Cold", "x").expect_err("uppercase"),
            VariantError::InvalidId("Cold".to_string())
        );
        let owner = Key::parse("zoo:capybara").expect("key");
        let variants = vec![
            Variant::new("warm", "a").expect("variant"),
            Variant::new("warm", "b").expect("variant"),
        ];
        assert_eq!(
            VariantMap::bind(&owner, &variants).expect_err("duplicate"),
            VariantError::Duplicate("warm".to_string())
        );
    }
}
