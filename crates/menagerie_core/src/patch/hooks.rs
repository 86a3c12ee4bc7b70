//! Behavioural patches installed in phase 3.
//!
//! # Responsibility
//! - Construction hook: record injected (and living) instances at every exit
//!   of the instance-init call site.
//! - State suppression: strip extension state of injected instances from
//!   outbound state packets and force the invisibility flag.
//! - Identity disguise: rewrite injected kinds to their backing kind in spawn
//!   packets and tooltips.
//!
//! # Invariants
//! - Non-injected instances and kinds pass through every hook unchanged.

use crate::host::appearance::AppearanceService;
use crate::host::code::{
    Hook, HookRef, Instruction, Value, INSTANCE_INIT, SPAWN_PACKET_INIT, STATE_PACKET_INIT,
    TOOLTIP_INIT,
};
use crate::inject::index::InjectionState;
use crate::model::instance::{DataPayload, DataValue, InstanceId};
use crate::patch::{InsertionPoint, Patch};
use std::sync::Arc;

pub const INSTANCE_INIT_HOOK: &str = "menagerie:instance_init";
pub const SUPPRESS_STATE_HOOK: &str = "menagerie:suppress_state";
pub const DISGUISE_KIND_HOOK: &str = "menagerie:disguise_kind";

/// Highest state field id every instance shares.
pub const BASE_STATE_MAX_ID: u8 = 7;
/// Highest state field id every living instance shares.
pub const LIVING_STATE_MAX_ID: u8 = 14;
pub const FLAGS_ID: u8 = 0;
pub const INVISIBLE_BIT: u8 = 5;

pub fn construction_patch(state: Arc<InjectionState>) -> Patch {
    let hook: Hook = Arc::new(move |args: &[Value]| {
        if let [Value::Instance { id, living }, Value::Kind(kind)] = args {
            state.record_construction(*id, *kind, *living);
        }
        Value::Unit
    });
    Patch::new("instance_construction")
        .edit(
            INSTANCE_INIT,
            InsertionPoint::BeforeEachReturn,
            vec![
                Instruction::Load(0),
                Instruction::Load(1),
                Instruction::CallHook(HookRef::new(INSTANCE_INIT_HOOK, 2, false)),
            ],
        )
        .hook(INSTANCE_INIT_HOOK, hook)
}

pub fn state_suppression_patch(
    state: Arc<InjectionState>,
    appearance: Arc<dyn AppearanceService>,
) -> Patch {
    let hook: Hook = Arc::new(move |args: &[Value]| match args {
        [Value::Int(id), Value::Data(values)] => match i32::try_from(*id) {
            Ok(id) => Value::Data(suppress_state(
                &state,
                appearance.is_available(),
                InstanceId(id),
                values.clone(),
            )),
            Err(_) => Value::Data(values.clone()),
        },
        [_, other] => other.clone(),
        _ => Value::Unit,
    });
    Patch::new("state_suppression")
        .edit(
            STATE_PACKET_INIT,
            InsertionPoint::Head,
            vec![
                Instruction::Load(0),
                Instruction::Load(1),
                Instruction::CallHook(HookRef::new(SUPPRESS_STATE_HOOK, 2, true)),
                Instruction::Store(1),
            ],
        )
        .hook(SUPPRESS_STATE_HOOK, hook)
}

pub fn identity_disguise_patch(state: Arc<InjectionState>) -> Patch {
    let hook: Hook = Arc::new(move |args: &[Value]| match args {
        [Value::Kind(kind)] => Value::Kind(state.disguise(*kind)),
        [other] => other.clone(),
        _ => Value::Unit,
    });
    let remap = |slot: usize| {
        vec![
            Instruction::Load(slot),
            Instruction::CallHook(HookRef::new(DISGUISE_KIND_HOOK, 1, true)),
            Instruction::Store(slot),
        ]
    };
    Patch::new("identity_disguise")
        .edit(SPAWN_PACKET_INIT, InsertionPoint::Head, remap(2))
        .edit(TOOLTIP_INIT, InsertionPoint::Head, remap(0))
        .hook(DISGUISE_KIND_HOOK, hook)
}

/// Filters the state of one outbound packet.
///
/// Injected instances keep only fields up to [`BASE_STATE_MAX_ID`]
/// ([`LIVING_STATE_MAX_ID`] when living). The flag field is always present
/// afterwards; its invisibility bit is set while the appearance service is
/// available, unless the instance has no variant to render.
pub fn suppress_state(
    state: &InjectionState,
    appearance_available: bool,
    instance: InstanceId,
    values: Vec<DataValue>,
) -> Vec<DataValue> {
    if !state.is_injected(instance) {
        return values;
    }
    let limit = if state.is_living(instance) {
        LIVING_STATE_MAX_ID
    } else {
        BASE_STATE_MAX_ID
    };
    let mut kept: Vec<DataValue> = values.into_iter().filter(|value| value.id <= limit).collect();

    let position = kept.iter().position(|value| value.id == FLAGS_ID);
    let mut flags = match position.map(|index| &kept[index].payload) {
        Some(DataPayload::Byte(flags)) => *flags,
        _ => 0,
    };
    let invisible = appearance_available && !state.has_no_variant(instance);
    if invisible {
        flags |= 1 << INVISIBLE_BIT;
    } else {
        flags &= !(1 << INVISIBLE_BIT);
    }

    let flags_value = DataValue::new(FLAGS_ID, DataPayload::Byte(flags));
    match position {
        Some(index) => kept[index] = flags_value,
        None => kept.push(flags_value),
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::{suppress_state, FLAGS_ID, INVISIBLE_BIT};
    use crate::inject::index::{InjectedKinds, InjectionState};
    use crate::model::instance::{DataPayload, DataValue, InstanceId};
    use crate::model::key::Key;
    use crate::model::kind::KindId;

    fn state() -> InjectionState {
        let state = InjectionState::new();
        let mut kinds = InjectedKinds::default();
        kinds.insert(KindId(9), Key::parse("zoo:capybara").expect("key"), KindId(1));
        state.publish_kinds(kinds);
        state.record_construction(InstanceId(1), KindId(9), true);
        state.record_construction(InstanceId(2), KindId(9), false);
        state
    }

    fn values() -> Vec<DataValue> {
        vec![
            DataValue::new(0, DataPayload::Byte(0b0000_0001)),
            DataValue::new(6, DataPayload::Int(0)),
            DataValue::new(9, DataPayload::Float(20.0)),
            DataValue::new(17, DataPayload::Bool(true)),
        ]
    }

    fn flags(values: &[DataValue]) -> u8 {
        match values.iter().find(|value| value.id == FLAGS_ID).map(|v| &v.payload) {
            Some(DataPayload::Byte(flags)) => *flags,
            other => panic!("missing flags: {other:?}"),
        }
    }

    #[test]
    fn living_instance_keeps_living_prefix() {
        let state = state();
        let filtered = suppress_state(&state, true, InstanceId(1), values());
        let ids: Vec<u8> = filtered.iter().map(|value| value.id).collect();
        assert_eq!(ids, vec![0, 6, 9]);
        assert_eq!(flags(&filtered), 0b0000_0001 | (1 << INVISIBLE_BIT));
    }

    #[test]
    fn non_living_instance_keeps_base_prefix() {
        let state = state();
        let filtered = suppress_state(&state, false, InstanceId(2), values());
        let ids: Vec<u8> = filtered.iter().map(|value| value.id).collect();
        assert_eq!(ids, vec![0, 6]);
        assert_eq!(flags(&filtered), 0b0000_0001);
    }

    #[test]
    fn missing_flags_are_appended() {
        let state = state();
        let filtered = suppress_state(
            &state,
            true,
            InstanceId(2),
            vec![DataValue::new(3, DataPayload::Bool(false))],
        );
        assert_eq!(filtered.len(), 2);
        assert_eq!(flags(&filtered), 1 << INVISIBLE_BIT);
    }

    #[test]
    fn variantless_instance_stays_visible() {
        let state = state();
        state.mark_no_variant(InstanceId(1));
        let filtered = suppress_state(&state, true, InstanceId(1), values());
        assert_eq!(flags(&filtered) & (1 << INVISIBLE_BIT), 0);
    }

    #[test]
    fn foreign_instances_pass_through() {
        let state = state();
        let filtered = suppress_state(&state, true, InstanceId(77), values());
        assert_eq!(filtered, values());
    }
}
