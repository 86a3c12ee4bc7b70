//! Host code table.
//!
//! # Responsibility
//! - Model host call sites as small stack-machine function bodies.
//! - Redefine function bodies in verified batches.
//! - Run bodies, dispatching hook calls to installed callbacks.
//!
//! # Invariants
//! - A redefinition batch is verified as a whole before any body is swapped.
//! - A body whose stack depth exceeds its declared `max_stack` is rejected.
//! - `max_stack` is only recomputed when assembling with `compute_frames`.

use crate::host::HostError;
use crate::model::instance::{DataValue, InstanceId};
use crate::model::kind::KindId;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Address of one host function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature {
    pub owner: &'static str,
    pub name: &'static str,
    pub descriptor: &'static str,
}

impl Signature {
    pub const fn new(owner: &'static str, name: &'static str, descriptor: &'static str) -> Self {
        Self {
            owner,
            name,
            descriptor,
        }
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}{}", self.owner, self.name, self.descriptor)
    }
}

/// Instance construction. Slots: `[Instance, Kind]`.
pub const INSTANCE_INIT: Signature = Signature::new("Entity", "<init>", "(Entity;EntityType)V");
/// State packet construction. Slots: `[Int(instance id), Data(values)]`.
pub const STATE_PACKET_INIT: Signature =
    Signature::new("StateDataPacket", "<init>", "(I;List)V");
/// Spawn packet construction. Slots: `[Int(instance id), Uuid, Kind]`.
pub const SPAWN_PACKET_INIT: Signature =
    Signature::new("AddEntityPacket", "<init>", "(I;UUID;EntityType)V");
/// Tooltip construction. Slots: `[Kind, Uuid]`.
pub const TOOLTIP_INIT: Signature =
    Signature::new("EntityTooltipInfo", "<init>", "(EntityType;UUID)V");
/// Reflection filter over declared fields. Slots: `[Text(owner), Names(fields)]`.
pub const FILTER_FIELDS: Signature =
    Signature::new("Reflection", "filterFields", "(Class;[Field)[Field");

/// Runtime value on the operand stack or in a local slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Int(i64),
    Text(String),
    Names(Vec<String>),
    Kind(KindId),
    Instance { id: InstanceId, living: bool },
    Data(Vec<DataValue>),
    Uuid(Uuid),
}

/// Call to an installed hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRef {
    pub id: String,
    pub arity: usize,
    pub returns: bool,
}

impl HookRef {
    pub fn new(id: &str, arity: usize, returns: bool) -> Self {
        Self {
            id: id.to_string(),
            arity,
            returns,
        }
    }
}

/// Call to a native host routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeOp {
    pub name: String,
    pub pops: usize,
    pub pushes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Load(usize),
    Store(usize),
    Push(Value),
    Pop,
    CallHook(HookRef),
    Native(NativeOp),
    Return,
    ReturnValue,
}

impl Instruction {
    fn is_return(&self) -> bool {
        matches!(self, Self::Return | Self::ReturnValue)
    }

    fn stack_effect(&self) -> (usize, usize) {
        match self {
            Self::Load(_) | Self::Push(_) => (0, 1),
            Self::Store(_) | Self::Pop | Self::ReturnValue => (1, 0),
            Self::CallHook(hook) => (hook.arity, usize::from(hook.returns)),
            Self::Native(op) => (op.pops, op.pushes),
            Self::Return => (0, 0),
        }
    }
}

/// Callback bound to a hook id.
pub type Hook = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Native routine: receives popped operands, returns values to push.
pub type Native = Arc<dyn Fn(&[Value]) -> Result<Vec<Value>, String> + Send + Sync>;

/// Straight-line function body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    pub signature: Signature,
    pub instructions: Vec<Instruction>,
    pub max_stack: usize,
}

impl FunctionBody {
    pub fn new(signature: Signature, instructions: Vec<Instruction>) -> Self {
        let mut body = Self {
            signature,
            instructions,
            max_stack: 0,
        };
        body.max_stack = body.stack_depth().unwrap_or(0);
        body
    }

    /// Peak operand depth, or the first underflow.
    pub fn stack_depth(&self) -> Result<usize, String> {
        let mut depth = 0usize;
        let mut peak = 0usize;
        for (index, instruction) in self.instructions.iter().enumerate() {
            let (pops, pushes) = instruction.stack_effect();
            depth = depth
                .checked_sub(pops)
                .ok_or_else(|| format!("stack underflow at instruction {index}"))?;
            depth += pushes;
            peak = peak.max(depth);
        }
        Ok(peak)
    }

    /// Inserts `delta` before the first instruction.
    pub fn insert_head(&mut self, delta: &[Instruction]) {
        self.instructions.splice(0..0, delta.iter().cloned());
    }

    /// Inserts `delta` before every return instruction.
    pub fn insert_before_returns(&mut self, delta: &[Instruction]) {
        let mut rebuilt = Vec::with_capacity(self.instructions.len() + delta.len());
        for instruction in self.instructions.drain(..) {
            if instruction.is_return() {
                rebuilt.extend(delta.iter().cloned());
            }
            rebuilt.push(instruction);
        }
        self.instructions = rebuilt;
    }

    pub fn replace_body(&mut self, delta: &[Instruction]) {
        self.instructions = delta.to_vec();
    }

    /// Finalizes an edited body. Recomputes `max_stack` only when
    /// `compute_frames` is set.
    pub fn assemble(&mut self, compute_frames: bool) -> Result<(), String> {
        let depth = self.stack_depth()?;
        if compute_frames {
            self.max_stack = depth;
        }
        Ok(())
    }

    /// Structural check run by the host on redefinition.
    pub fn verify(&self) -> Result<(), HostError> {
        let depth = self.stack_depth().map_err(|message| HostError::Verify {
            signature: self.signature,
            message,
        })?;
        if depth > self.max_stack {
            return Err(HostError::Verify {
                signature: self.signature,
                message: format!("stack depth {depth} exceeds max_stack {}", self.max_stack),
            });
        }
        if !self.instructions.last().is_some_and(Instruction::is_return) {
            return Err(HostError::Verify {
                signature: self.signature,
                message: "body does not end with a return".to_string(),
            });
        }
        Ok(())
    }

    /// Runs the body over `slots`.
    ///
    /// `hook` resolves installed hooks, `native` resolves host routines.
    pub fn execute<'h>(
        &self,
        slots: &mut [Value],
        hook: impl Fn(&str) -> Option<&'h Hook>,
        native: impl Fn(&str) -> Option<&'h Native>,
    ) -> Result<Value, HostError> {
        let fail = |message: String| HostError::Invocation {
            signature: self.signature,
            message,
        };
        let mut stack: Vec<Value> = Vec::with_capacity(self.max_stack);
        for instruction in &self.instructions {
            match instruction {
                Instruction::Load(slot) => {
                    let value = slots
                        .get(*slot)
                        .cloned()
                        .ok_or_else(|| fail(format!("no local slot {slot}")))?;
                    stack.push(value);
                }
                Instruction::Store(slot) => {
                    let value = stack.pop().ok_or_else(|| fail("empty stack".to_string()))?;
                    let target = slots
                        .get_mut(*slot)
                        .ok_or_else(|| fail(format!("no local slot {slot}")))?;
                    *target = value;
                }
                Instruction::Push(value) => stack.push(value.clone()),
                Instruction::Pop => {
                    stack.pop().ok_or_else(|| fail("empty stack".to_string()))?;
                }
                Instruction::CallHook(reference) => {
                    let callback = hook(reference.id.as_str())
                        .ok_or_else(|| fail(format!("hook not installed: {}", reference.id)))?;
                    let args = pop_args(&mut stack, reference.arity).map_err(&fail)?;
                    let result = callback(&args);
                    if reference.returns {
                        stack.push(result);
                    }
                }
                Instruction::Native(op) => {
                    let routine = native(op.name.as_str())
                        .ok_or_else(|| fail(format!("unknown native routine: {}", op.name)))?;
                    let args = pop_args(&mut stack, op.pops).map_err(&fail)?;
                    let results = routine(&args).map_err(&fail)?;
                    if results.len() != op.pushes {
                        return Err(fail(format!(
                            "native routine {} produced {} values, expected {}",
                            op.name,
                            results.len(),
                            op.pushes
                        )));
                    }
                    stack.extend(results);
                }
                Instruction::Return => return Ok(Value::Unit),
                Instruction::ReturnValue => {
                    return stack.pop().ok_or_else(|| fail("empty stack".to_string()));
                }
            }
        }
        Err(fail("fell off the end of the body".to_string()))
    }
}

fn pop_args(stack: &mut Vec<Value>, arity: usize) -> Result<Vec<Value>, String> {
    let start = stack
        .len()
        .checked_sub(arity)
        .ok_or_else(|| format!("expected {arity} operands, found {}", stack.len()))?;
    Ok(stack.split_off(start))
}

/// Result of invoking a function: final local slots plus the return value.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub slots: Vec<Value>,
    pub returned: Value,
}

/// Mutable table of host function bodies.
pub trait CodeTable {
    fn body(&self, signature: &Signature) -> Option<&FunctionBody>;

    fn install_hook(&mut self, id: &str, hook: Hook);

    /// Swaps in every body of `definitions` at once, or none of them.
    fn redefine(&mut self, definitions: Vec<FunctionBody>) -> Result<(), HostError>;

    /// Number of successful `redefine` calls so far.
    fn redefinitions(&self) -> usize;

    fn invoke(&mut self, signature: &Signature, slots: Vec<Value>)
        -> Result<Invocation, HostError>;

    /// Reflectively lists the visible fields of `owner`, consulting the
    /// per-owner reflection cache first.
    fn reflect_fields(&mut self, owner: &str, declared: &[String])
        -> Result<Vec<String>, HostError>;

    fn clear_reflection_cache(&mut self);
}

#[cfg(test)]
mod tests {
    use super::{FunctionBody, HookRef, Instruction, Value, INSTANCE_INIT};
    use crate::host::code::Hook;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn hooks(entries: Vec<(&str, Hook)>) -> BTreeMap<String, Hook> {
        entries
            .into_iter()
            .map(|(id, hook)| (id.to_string(), hook))
            .collect()
    }

    #[test]
    fn insert_before_returns_hits_every_exit() {
        let mut body = FunctionBody::new(
            INSTANCE_INIT,
            vec![Instruction::Return, Instruction::Return],
        );
        body.insert_before_returns(&[Instruction::Push(Value::Int(1)), Instruction::Pop]);
        assert_eq!(body.instructions.len(), 6);
        assert_eq!(body.instructions[2], Instruction::Pop);
        assert_eq!(body.instructions[5], Instruction::Return);
    }

    #[test]
    fn assemble_without_frames_keeps_max_stack() {
        let mut body = FunctionBody::new(INSTANCE_INIT, vec![Instruction::Return]);
        body.insert_head(&[Instruction::Load(0), Instruction::Pop]);
        body.assemble(false).expect("assemble");
        assert_eq!(body.max_stack, 0);
        body.verify().expect_err("depth 1 exceeds max_stack 0");

        body.assemble(true).expect("assemble with frames");
        assert_eq!(body.max_stack, 1);
        body.verify().expect("verified");
    }

    #[test]
    fn underflow_is_rejected() {
        let body = FunctionBody::new(INSTANCE_INIT, vec![Instruction::Pop, Instruction::Return]);
        body.verify().expect_err("underflow");
    }

    #[test]
    fn execute_dispatches_hooks_and_stores_results() {
        let body = FunctionBody::new(
            INSTANCE_INIT,
            vec![
                Instruction::Load(0),
                Instruction::CallHook(HookRef::new("double", 1, true)),
                Instruction::Store(0),
                Instruction::Return,
            ],
        );
        let doubling: Hook = Arc::new(|args: &[Value]| match args {
            [Value::Int(value)] => Value::Int(value * 2),
            _ => Value::Unit,
        });
        let table = hooks(vec![("double", doubling)]);
        let mut slots = vec![Value::Int(21)];
        let returned = body
            .execute(&mut slots, |id| table.get(id), |_| None)
            .expect("execute");
        assert_eq!(returned, Value::Unit);
        assert_eq!(slots[0], Value::Int(42));
    }

    #[test]
    fn missing_hook_fails_invocation() {
        let body = FunctionBody::new(
            INSTANCE_INIT,
            vec![
                Instruction::CallHook(HookRef::new("absent", 0, false)),
                Instruction::Return,
            ],
        );
        let table: BTreeMap<String, Hook> = BTreeMap::new();
        body.execute(&mut [], |id| table.get(id), |_| None)
            .expect_err("hook missing");
    }
}
