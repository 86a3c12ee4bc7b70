//! Batched patch application.
//!
//! # Responsibility
//! - Group edits by target function and compose them in declaration order.
//! - Redefine every affected function in a single host batch.
//! - Revert reversible patches in a second batch.
//!
//! # Invariants
//! - Each affected function is assembled and redefined exactly once per batch.
//! - Frame recomputation is enabled for a function when any patch touching it
//!   requests it.
//! - Reverting restores the body as if only non-reversible patches had run.

use crate::host::code::{CodeTable, FunctionBody, Signature};
use crate::patch::{Edit, InsertionPoint, Patch, PatchError};
use log::{debug, error, info};
use std::collections::BTreeMap;
use std::time::Instant;

pub struct PatchEngine {
    patches: Vec<Patch>,
}

/// Record of one applied batch.
#[derive(Debug)]
pub struct AppliedPatches {
    patched: Vec<&'static str>,
    targets: Vec<Signature>,
    restore: Vec<FunctionBody>,
}

struct Target<'a> {
    edits: Vec<(&'a Edit, bool)>,
    compute_frames: bool,
}

impl PatchEngine {
    pub fn new(patches: Vec<Patch>) -> Self {
        Self { patches }
    }

    /// Applies every patch in one redefinition batch.
    ///
    /// # Errors
    /// - [`PatchError::MissingTarget`] when a target function does not exist.
    /// - [`PatchError::Assemble`] when an edited body cannot be assembled.
    /// - [`PatchError::Host`] when the host rejects the batch.
    pub fn apply(self, code: &mut dyn CodeTable) -> Result<AppliedPatches, PatchError> {
        let started_at = Instant::now();
        info!(
            "event=patch_apply module=patch status=start patches={}",
            self.patches.len()
        );

        let mut targets: BTreeMap<Signature, Target<'_>> = BTreeMap::new();
        for patch in &self.patches {
            for edit in &patch.edits {
                let target = targets.entry(edit.target).or_insert_with(|| Target {
                    edits: Vec::new(),
                    compute_frames: false,
                });
                target.edits.push((edit, patch.reversible));
                target.compute_frames |= patch.compute_frames;
            }
        }

        let mut definitions = Vec::with_capacity(targets.len());
        let mut restore = Vec::new();
        for (signature, target) in &targets {
            let original = code
                .body(signature)
                .cloned()
                .ok_or(PatchError::MissingTarget(*signature))?;

            let all_edits = target.edits.iter().map(|(edit, _)| *edit);
            let patched = compose(&original, all_edits, target.compute_frames)?;
            if target.edits.iter().any(|(_, reversible)| *reversible) {
                let durable = target
                    .edits
                    .iter()
                    .filter(|(_, reversible)| !*reversible)
                    .map(|(edit, _)| *edit);
                restore.push(compose(&original, durable, target.compute_frames)?);
            }
            debug!(
                "event=patch_compose module=patch target={signature} edits={} compute_frames={}",
                target.edits.len(),
                target.compute_frames
            );
            definitions.push(patched);
        }

        for patch in &self.patches {
            for (id, hook) in &patch.hooks {
                code.install_hook(id, hook.clone());
            }
        }

        if let Err(err) = code.redefine(definitions) {
            error!(
                "event=patch_apply module=patch status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }

        let applied = AppliedPatches {
            patched: self.patches.iter().map(|patch| patch.name).collect(),
            targets: targets.keys().copied().collect(),
            restore,
        };
        info!(
            "event=patch_apply module=patch status=ok targets={} reversible_targets={} duration_ms={}",
            applied.targets.len(),
            applied.restore.len(),
            started_at.elapsed().as_millis()
        );
        Ok(applied)
    }
}

fn compose<'a>(
    original: &FunctionBody,
    edits: impl Iterator<Item = &'a Edit>,
    compute_frames: bool,
) -> Result<FunctionBody, PatchError> {
    let mut body = original.clone();
    for edit in edits {
        match edit.point {
            InsertionPoint::Head => body.insert_head(&edit.delta),
            InsertionPoint::BeforeEachReturn => body.insert_before_returns(&edit.delta),
            InsertionPoint::ReplaceBody => body.replace_body(&edit.delta),
        }
    }
    body.assemble(compute_frames).map_err(|message| PatchError::Assemble {
        signature: original.signature,
        message,
    })?;
    Ok(body)
}

impl AppliedPatches {
    pub fn patched(&self) -> &[&'static str] {
        &self.patched
    }

    pub fn targets(&self) -> &[Signature] {
        &self.targets
    }

    pub fn has_reversible(&self) -> bool {
        !self.restore.is_empty()
    }

    /// Reverts reversible patches in one batch and clears the reflection
    /// cache. Returns the number of functions restored.
    pub fn revert_reversible(&mut self, code: &mut dyn CodeTable) -> Result<usize, PatchError> {
        let restore = std::mem::take(&mut self.restore);
        let count = restore.len();
        if count > 0 {
            code.redefine(restore)?;
        }
        code.clear_reflection_cache();
        info!("event=patch_revert module=patch status=ok restored={count}");
        Ok(count)
    }
}
