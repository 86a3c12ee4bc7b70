//! Reflective field access.
//!
//! # Responsibility
//! - Resolve privileged fields through the host's reflection filter.
//! - Provide the reversible patch that lifts that filter.
//!
//! # Invariants
//! - A [`FieldAccess`] can only be obtained from [`resolve_fields`].
//! - Resolution succeeds only while the filter is lifted or the fields are
//!   not privileged; the cache must be cleared after the filter returns.

use crate::host::code::{CodeTable, Instruction, FILTER_FIELDS};
use crate::host::HostError;
use crate::patch::{InsertionPoint, Patch};
use log::debug;
use std::collections::BTreeSet;

/// Proof that the named fields of `owner` were reflectively resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAccess {
    owner: String,
    fields: BTreeSet<String>,
}

impl FieldAccess {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn grants(&self, owner: &str, field: &str) -> bool {
        self.owner == owner && self.fields.contains(field)
    }
}

/// Reflectively resolves `wanted` fields among `declared` fields of `owner`.
///
/// # Errors
/// - [`HostError::AccessDenied`] for the first wanted field the filter hides.
pub fn resolve_fields(
    code: &mut dyn CodeTable,
    owner: &str,
    declared: &[String],
    wanted: &[&str],
) -> Result<FieldAccess, HostError> {
    let visible = code.reflect_fields(owner, declared)?;
    let mut fields = BTreeSet::new();
    for field in wanted {
        if !visible.iter().any(|candidate| candidate == field) {
            debug!("event=reflect_fields module=reflection status=denied owner={owner} field={field}");
            return Err(HostError::AccessDenied {
                owner: owner.to_string(),
                field: (*field).to_string(),
            });
        }
        fields.insert((*field).to_string());
    }
    debug!(
        "event=reflect_fields module=reflection status=ok owner={owner} fields={}",
        fields.len()
    );
    Ok(FieldAccess {
        owner: owner.to_string(),
        fields,
    })
}

/// Replaces the reflection filter with an identity over its field list.
pub fn filter_bypass_patch() -> Patch {
    Patch::new("reflection_filter_bypass")
        .edit(
            FILTER_FIELDS,
            InsertionPoint::ReplaceBody,
            vec![Instruction::Load(1), Instruction::ReturnValue],
        )
        .reversible()
        .compute_frames(false)
}
