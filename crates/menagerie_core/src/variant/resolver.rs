//! Validated variant selection.

use crate::model::key::Key;
use crate::variant::{BoundVariant, SpawnContext, VariantError, VariantMap, VariantRule};
use log::debug;

/// Runs `rule` for the declaration keyed `owner` and validates the pick.
///
/// # Errors
/// - Any error the rule reports.
/// - [`VariantError::ForeignVariant`] when the rule returns a variant bound
///   to a different declaration.
/// - [`VariantError::UnknownVariant`] when the returned variant is not part
///   of `variants`.
pub fn pick(
    owner: &Key,
    variants: &VariantMap,
    rule: &VariantRule,
    context: &SpawnContext,
) -> Result<Option<BoundVariant>, VariantError> {
    let Some(variant) = rule.apply(variants, context)? else {
        debug!(
            "event=variant_pick module=variant kind={owner} instance={} variant=none",
            context.instance.id
        );
        return Ok(None);
    };
    if variant.owner() != owner {
        return Err(VariantError::ForeignVariant {
            expected: owner.clone(),
            actual: variant.owner().clone(),
            id: variant.id().to_string(),
        });
    }
    if variants.get(variant.id()) != Some(&variant) {
        return Err(VariantError::UnknownVariant {
            kind: owner.clone(),
            ids: vec![variant.id().to_string()],
            known: variants.ids(),
        });
    }
    debug!(
        "event=variant_pick module=variant kind={owner} instance={} variant={}",
        context.instance.id,
        variant.id()
    );
    Ok(Some(variant))
}
