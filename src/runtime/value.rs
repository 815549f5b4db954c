use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bytecode::op::CodeAddr;
use crate::error::RuntimeError;
use crate::runtime::env::Env;

/// Index of a value slot in the [`Heap`].
pub type ValueId = usize;

/// A runtime value.
///
/// Values are shared by reference: compound values hold `ValueId`s into
/// the heap, never owned copies. The VM does not deep-copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Symbol(String),
    List(Vec<ValueId>),
    Dict(Dict),
    Slice {
        start: ValueId,
        stop: ValueId,
        step: ValueId,
    },
    Env(Env),
    Object {
        env: ValueId,
        members: Dict,
    },
    Function {
        addr: CodeAddr,
        env: ValueId,
    },
}

/// Key a value hashes to when used in a dict.
///
/// `Int`, `Float`, `Str` and `Symbol` hash by value (floats by bit
/// pattern); everything else hashable hashes by identity. Lists and
/// dicts refuse to hash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HashKey {
    Int(i64),
    Float(u64),
    Str(String),
    Symbol(String),
    Identity(ValueId),
}

/// A value→value mapping keyed by [`HashKey`]. Each entry keeps the key's
/// original value id so the key can be rendered back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dict {
    entries: BTreeMap<HashKey, (ValueId, ValueId)>,
}

impl Dict {
    pub fn new() -> Self {
        Dict::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, hash: HashKey, key: ValueId, value: ValueId) {
        self.entries.insert(hash, (key, value));
    }

    pub fn get(&self, hash: &HashKey) -> Option<(ValueId, ValueId)> {
        self.entries.get(hash).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HashKey, &(ValueId, ValueId))> {
        self.entries.iter()
    }
}

impl Value {
    /// Runtime type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::Symbol(_) => "Symbol",
            Value::List(_) => "List",
            Value::Dict(_) => "Dict",
            Value::Slice { .. } => "Slice",
            Value::Env(_) => "Env",
            Value::Object { .. } => "Object",
            Value::Function { .. } => "Func",
        }
    }

    /// Truthiness, as used by conditional jumps and the logical
    /// operators: null is false, booleans are themselves, numbers are
    /// non-zero, strings/lists/dicts/envs are non-empty, everything else
    /// is true.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(value) => *value,
            Value::Int(value) => *value != 0,
            Value::Float(value) => *value != 0.0,
            Value::Str(value) => !value.is_empty(),
            Value::List(elements) => !elements.is_empty(),
            Value::Dict(dict) => !dict.is_empty(),
            Value::Env(env) => !env.is_empty(),
            _ => true,
        }
    }

    pub fn falsy(&self) -> bool {
        !self.truthy()
    }
}

/// One heap slot: the value plus a mark bit reserved for a future
/// tracing collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub value: Value,
    pub marked: bool,
}

/// Arena of runtime values, owned by the VM and referenced by index.
///
/// Nothing is reclaimed yet; the mark bit and [`Heap::trace`] exist so a
/// collector can be added without changing the value model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heap {
    slots: Vec<Slot>,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn alloc(&mut self, value: Value) -> ValueId {
        let id = self.slots.len();
        self.slots.push(Slot {
            value,
            marked: false,
        });
        id
    }

    pub fn get(&self, id: ValueId) -> &Value {
        &self.slots[id].value
    }

    pub fn get_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.slots[id].value
    }

    pub fn is_marked(&self, id: ValueId) -> bool {
        self.slots[id].marked
    }

    pub fn clear_marks(&mut self) {
        for slot in &mut self.slots {
            slot.marked = false;
        }
    }

    /// Marks a value and everything reachable from it.
    pub fn trace(&mut self, id: ValueId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if self.slots[id].marked {
                continue;
            }
            self.slots[id].marked = true;
            match &self.slots[id].value {
                Value::List(elements) => pending.extend(elements),
                Value::Dict(dict) => {
                    for (_, (key, value)) in dict.iter() {
                        pending.push(*key);
                        pending.push(*value);
                    }
                }
                Value::Slice { start, stop, step } => {
                    pending.extend([*start, *stop, *step]);
                }
                Value::Env(env) => {
                    if let Some(parent) = env.parent {
                        pending.push(parent);
                    }
                    pending.extend(env.bindings());
                }
                Value::Object { env, members } => {
                    pending.push(*env);
                    for (_, (key, value)) in members.iter() {
                        pending.push(*key);
                        pending.push(*value);
                    }
                }
                Value::Function { env, .. } => pending.push(*env),
                _ => {}
            }
        }
    }
}

fn type_error(message: String) -> RuntimeError {
    RuntimeError::new(message)
}

fn binary_type_error(verb: &str, left: &Value, right: &Value) -> RuntimeError {
    type_error(format!(
        "cannot {verb} types '{}' and '{}'",
        left.type_name(),
        right.type_name()
    ))
}

fn unary_type_error(verb: &str, value: &Value) -> RuntimeError {
    type_error(format!("cannot {verb} type '{}'", value.type_name()))
}

// ───────────────────────────── Rendering ─────────────────────────────

/// Textual representation, as emitted by `PRINT`. Strings render in
/// single quotes; reference kinds render opaquely.
pub fn repr(heap: &Heap, id: ValueId) -> String {
    match heap.get(id) {
        Value::Null => "Null".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(value) => value.to_string(),
        Value::Float(value) => format!("{value:.6}"),
        Value::Str(value) => format!("'{value}'"),
        Value::Symbol(name) => name.clone(),
        Value::List(elements) => {
            let mut out = String::from("[");
            for element in elements {
                out.push_str(&repr(heap, *element));
            }
            out.push(']');
            out
        }
        Value::Dict(dict) => {
            let mut out = String::from("{");
            for (_, (key, value)) in dict.iter() {
                out.push_str(&repr(heap, *key));
                out.push_str(": ");
                out.push_str(&repr(heap, *value));
                out.push(',');
            }
            out.push('}');
            out
        }
        Value::Slice { start, stop, step } => format!(
            "<Slice start='{}' stop='{}' step='{}'>",
            repr(heap, *start),
            repr(heap, *stop),
            repr(heap, *step)
        ),
        Value::Env(_) => format!("<Env at='{id}'>"),
        Value::Object { .. } => format!("<Object at='{id}'>"),
        Value::Function { addr, .. } => format!("<Function addr='{addr}' at='{id}'>"),
    }
}

// ───────────────────────────── Hashing ───────────────────────────────

/// Computes the dict key for a value. Lists and dicts are unhashable.
pub fn hash_key(heap: &Heap, id: ValueId) -> Result<HashKey, RuntimeError> {
    match heap.get(id) {
        Value::Int(value) => Ok(HashKey::Int(*value)),
        Value::Float(value) => Ok(HashKey::Float(value.to_bits())),
        Value::Str(value) => Ok(HashKey::Str(value.clone())),
        Value::Symbol(name) => Ok(HashKey::Symbol(name.clone())),
        Value::List(_) | Value::Dict(_) => Err(type_error(format!(
            "cannot hash value of type '{}'",
            heap.get(id).type_name()
        ))),
        _ => Ok(HashKey::Identity(id)),
    }
}

// ───────────────────────────── Equality ──────────────────────────────

/// Structural equality within one kind; ints and floats compare
/// numerically across kinds; functions compare by code address and
/// objects by identity. Any other cross-kind comparison fails.
pub fn equal(heap: &Heap, left: ValueId, right: ValueId) -> Result<bool, RuntimeError> {
    use Value::*;
    match (heap.get(left), heap.get(right)) {
        (Null, Null) => Ok(true),
        (Bool(l), Bool(r)) => Ok(l == r),
        (Int(l), Int(r)) => Ok(l == r),
        (Int(l), Float(r)) => Ok((*l as f64) == *r),
        (Float(l), Int(r)) => Ok(*l == (*r as f64)),
        (Float(l), Float(r)) => Ok(l == r),
        (Str(l), Str(r)) => Ok(l == r),
        (Symbol(l), Symbol(r)) => Ok(l == r),
        (List(l), List(r)) => {
            if l.len() != r.len() {
                return Ok(false);
            }
            let (l, r) = (l.clone(), r.clone());
            for (a, b) in l.into_iter().zip(r) {
                if !equal(heap, a, b)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Dict(l), Dict(r)) => {
            if l.len() != r.len() {
                return Ok(false);
            }
            let (l, r) = (l.clone(), r.clone());
            for (hash, (_, value)) in l.iter() {
                match r.get(hash) {
                    Some((_, other)) => {
                        if !equal(heap, *value, other)? {
                            return Ok(false);
                        }
                    }
                    None => return Ok(false),
                }
            }
            Ok(true)
        }
        (
            Slice { start, stop, step },
            Slice {
                start: rstart,
                stop: rstop,
                step: rstep,
            },
        ) => {
            let (parts, rparts) = ([*start, *stop, *step], [*rstart, *rstop, *rstep]);
            for (a, b) in parts.into_iter().zip(rparts) {
                if !equal(heap, a, b)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Function { addr: l, .. }, Function { addr: r, .. }) => Ok(l == r),
        (Object { .. }, Object { .. }) | (Env(_), Env(_)) => Ok(left == right),
        (l, r) => Err(type_error(format!(
            "cannot test equality of types '{}' and '{}'",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn ordering(
    heap: &Heap,
    verb: &str,
    left: ValueId,
    right: ValueId,
) -> Result<std::cmp::Ordering, RuntimeError> {
    use std::cmp::Ordering;
    use Value::*;
    let cmp = |l: f64, r: f64| l.partial_cmp(&r).unwrap_or(Ordering::Greater);
    match (heap.get(left), heap.get(right)) {
        (Int(l), Int(r)) => Ok(l.cmp(r)),
        (Int(l), Float(r)) => Ok(cmp(*l as f64, *r)),
        (Float(l), Int(r)) => Ok(cmp(*l, *r as f64)),
        (Float(l), Float(r)) => Ok(cmp(*l, *r)),
        (Str(l), Str(r)) => Ok(l.cmp(r)),
        (l, r) => Err(binary_type_error(verb, l, r)),
    }
}

// ──────────────────────────── Arithmetic ─────────────────────────────

pub fn add(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    use Value::*;
    let value = match (heap.get(left), heap.get(right)) {
        (Int(l), Int(r)) => Int(l.wrapping_add(*r)),
        (Int(l), Float(r)) => Float(*l as f64 + r),
        (Float(l), Int(r)) => Float(l + *r as f64),
        (Float(l), Float(r)) => Float(l + r),
        (Str(l), Str(r)) => Str(format!("{l}{r}")),
        (l, r) => return Err(binary_type_error("add", l, r)),
    };
    Ok(heap.alloc(value))
}

pub fn sub(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    use Value::*;
    let value = match (heap.get(left), heap.get(right)) {
        (Int(l), Int(r)) => Int(l.wrapping_sub(*r)),
        (Int(l), Float(r)) => Float(*l as f64 - r),
        (Float(l), Int(r)) => Float(l - *r as f64),
        (Float(l), Float(r)) => Float(l - r),
        (l, r) => return Err(binary_type_error("subtract", l, r)),
    };
    Ok(heap.alloc(value))
}

pub fn mul(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    use Value::*;
    let value = match (heap.get(left), heap.get(right)) {
        (Int(l), Int(r)) => Int(l.wrapping_mul(*r)),
        (Int(l), Float(r)) => Float(*l as f64 * r),
        (Float(l), Int(r)) => Float(l * *r as f64),
        (Float(l), Float(r)) => Float(l * r),
        (l, r) => return Err(binary_type_error("multiply", l, r)),
    };
    Ok(heap.alloc(value))
}

pub fn div(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    use Value::*;
    let value = match (heap.get(left), heap.get(right)) {
        (Int(_), Int(0)) => return Err(type_error("division by zero".to_string())),
        (Int(l), Int(r)) => Int(l.wrapping_div(*r)),
        (Int(l), Float(r)) => Float(*l as f64 / r),
        (Float(l), Int(r)) => Float(l / *r as f64),
        (Float(l), Float(r)) => Float(l / r),
        (l, r) => return Err(binary_type_error("divide", l, r)),
    };
    Ok(heap.alloc(value))
}

pub fn modulo(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    use Value::*;
    let value = match (heap.get(left), heap.get(right)) {
        (Int(_), Int(0)) => return Err(type_error("modulo by zero".to_string())),
        (Int(l), Int(r)) => Int(l.wrapping_rem(*r)),
        (Int(l), Float(r)) => Float((*l as f64) % r),
        (Float(l), Int(r)) => Float(l % *r as f64),
        (Float(l), Float(r)) => Float(l % r),
        (l, r) => return Err(binary_type_error("modulo", l, r)),
    };
    Ok(heap.alloc(value))
}

pub fn pow(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    use Value::*;
    let value = match (heap.get(left), heap.get(right)) {
        (Int(l), Int(r)) => Int((*l as f64).powf(*r as f64) as i64),
        (Int(l), Float(r)) => Float((*l as f64).powf(*r)),
        (Float(l), Int(r)) => Float(l.powf(*r as f64)),
        (Float(l), Float(r)) => Float(l.powf(*r)),
        (l, r) => {
            return Err(type_error(format!(
                "cannot raise type '{}' to power of type '{}'",
                l.type_name(),
                r.type_name()
            )))
        }
    };
    Ok(heap.alloc(value))
}

pub fn pos(heap: &mut Heap, operand: ValueId) -> Result<ValueId, RuntimeError> {
    use Value::*;
    let value = match heap.get(operand) {
        Int(v) => Int(*v),
        Float(v) => Float(*v),
        v => return Err(unary_type_error("make positive", v)),
    };
    Ok(heap.alloc(value))
}

pub fn neg(heap: &mut Heap, operand: ValueId) -> Result<ValueId, RuntimeError> {
    use Value::*;
    let value = match heap.get(operand) {
        Int(v) => Int(v.wrapping_neg()),
        Float(v) => Float(-v),
        v => return Err(unary_type_error("negate", v)),
    };
    Ok(heap.alloc(value))
}

// ────────────────────────────── Logical ──────────────────────────────

pub fn log_and(
    heap: &mut Heap,
    left: ValueId,
    right: ValueId,
) -> Result<ValueId, RuntimeError> {
    let result = heap.get(left).truthy() && heap.get(right).truthy();
    Ok(heap.alloc(Value::Bool(result)))
}

pub fn log_or(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    let result = heap.get(left).truthy() || heap.get(right).truthy();
    Ok(heap.alloc(Value::Bool(result)))
}

pub fn log_not(heap: &mut Heap, operand: ValueId) -> Result<ValueId, RuntimeError> {
    let result = heap.get(operand).falsy();
    Ok(heap.alloc(Value::Bool(result)))
}

// ───────────────────────── Bitwise and shifts ────────────────────────

fn int_operands<'a>(
    verb: &str,
    left: &'a Value,
    right: &'a Value,
) -> Result<(i64, i64), RuntimeError> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok((*l, *r)),
        (l, r) => Err(binary_type_error(verb, l, r)),
    }
}

pub fn bit_and(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    let (l, r) = int_operands("perform bitwise-and on", heap.get(left), heap.get(right))?;
    Ok(heap.alloc(Value::Int(l & r)))
}

pub fn bit_or(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    let (l, r) = int_operands("perform bitwise-or on", heap.get(left), heap.get(right))?;
    Ok(heap.alloc(Value::Int(l | r)))
}

pub fn bit_xor(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    let (l, r) = int_operands("perform bitwise-xor on", heap.get(left), heap.get(right))?;
    Ok(heap.alloc(Value::Int(l ^ r)))
}

pub fn bit_not(heap: &mut Heap, operand: ValueId) -> Result<ValueId, RuntimeError> {
    let value = match heap.get(operand) {
        Value::Int(v) => Value::Int(!v),
        v => return Err(unary_type_error("perform bitwise-not on", v)),
    };
    Ok(heap.alloc(value))
}

pub fn lshift(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    let (l, r) = int_operands("perform left-shift on", heap.get(left), heap.get(right))?;
    Ok(heap.alloc(Value::Int(l.wrapping_shl(r as u32))))
}

pub fn rshift(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    let (l, r) = int_operands("perform right-shift on", heap.get(left), heap.get(right))?;
    Ok(heap.alloc(Value::Int(l.wrapping_shr(r as u32))))
}

// ─────────────────────────── Comparisons ─────────────────────────────

pub fn eq(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    let result = equal(heap, left, right)?;
    Ok(heap.alloc(Value::Bool(result)))
}

pub fn ne(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    let result = !equal(heap, left, right)?;
    Ok(heap.alloc(Value::Bool(result)))
}

pub fn gt(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    let result = ordering(heap, "compare", left, right)?.is_gt();
    Ok(heap.alloc(Value::Bool(result)))
}

pub fn ge(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    let result = ordering(heap, "compare", left, right)?.is_ge();
    Ok(heap.alloc(Value::Bool(result)))
}

pub fn lt(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    let result = ordering(heap, "compare", left, right)?.is_lt();
    Ok(heap.alloc(Value::Bool(result)))
}

pub fn le(heap: &mut Heap, left: ValueId, right: ValueId) -> Result<ValueId, RuntimeError> {
    let result = ordering(heap, "compare", left, right)?.is_le();
    Ok(heap.alloc(Value::Bool(result)))
}

// ──────────────────────────── In-place ops ───────────────────────────

/// `target = value`: overwrite the target slot with a shallow copy of
/// the right-hand value. Sharing through the slot makes the assignment
/// visible to every binding of the target.
pub fn ip_assign(
    heap: &mut Heap,
    target: ValueId,
    value: ValueId,
) -> Result<ValueId, RuntimeError> {
    let new_value = heap.get(value).clone();
    *heap.get_mut(target) = new_value;
    Ok(target)
}

macro_rules! ip_numeric {
    ($name:ident, $verb:literal, $int:expr, $float:expr) => {
        pub fn $name(
            heap: &mut Heap,
            target: ValueId,
            value: ValueId,
        ) -> Result<ValueId, RuntimeError> {
            use Value::*;
            let rhs = heap.get(value).clone();
            let updated = match (heap.get(target), &rhs) {
                (Int(l), Int(r)) => Int($int(*l, *r)?),
                (Int(l), Float(r)) => Int($float(*l as f64, *r)? as i64),
                (Float(l), Int(r)) => Float($float(*l, *r as f64)?),
                (Float(l), Float(r)) => Float($float(*l, *r)?),
                (l, r) => return Err(binary_type_error($verb, l, r)),
            };
            *heap.get_mut(target) = updated;
            Ok(target)
        }
    };
}

ip_numeric!(
    ip_add_numeric,
    "in-place add",
    |l: i64, r: i64| Ok::<i64, RuntimeError>(l.wrapping_add(r)),
    |l: f64, r: f64| Ok::<f64, RuntimeError>(l + r)
);
ip_numeric!(
    ip_sub,
    "in-place subtract",
    |l: i64, r: i64| Ok::<i64, RuntimeError>(l.wrapping_sub(r)),
    |l: f64, r: f64| Ok::<f64, RuntimeError>(l - r)
);
ip_numeric!(
    ip_mul,
    "in-place multiply",
    |l: i64, r: i64| Ok::<i64, RuntimeError>(l.wrapping_mul(r)),
    |l: f64, r: f64| Ok::<f64, RuntimeError>(l * r)
);
ip_numeric!(
    ip_div,
    "in-place divide",
    |l: i64, r: i64| {
        if r == 0 {
            Err(RuntimeError::new("division by zero"))
        } else {
            Ok(l.wrapping_div(r))
        }
    },
    |l: f64, r: f64| Ok::<f64, RuntimeError>(l / r)
);
ip_numeric!(
    ip_mod,
    "in-place modulo",
    |l: i64, r: i64| {
        if r == 0 {
            Err(RuntimeError::new("modulo by zero"))
        } else {
            Ok(l.wrapping_rem(r))
        }
    },
    |l: f64, r: f64| Ok::<f64, RuntimeError>(l % r)
);

/// `+=` also concatenates strings, so it cannot share the numeric-only
/// macro body.
pub fn ip_add(heap: &mut Heap, target: ValueId, value: ValueId) -> Result<ValueId, RuntimeError> {
    use Value::*;
    let appended = match (heap.get(target), heap.get(value)) {
        (Str(_), Str(r)) => Some(r.clone()),
        _ => None,
    };
    match appended {
        Some(tail) => {
            if let Str(l) = heap.get_mut(target) {
                l.push_str(&tail);
            }
            Ok(target)
        }
        None => ip_add_numeric(heap, target, value),
    }
}

macro_rules! ip_integer {
    ($name:ident, $verb:literal, $apply:expr) => {
        pub fn $name(
            heap: &mut Heap,
            target: ValueId,
            value: ValueId,
        ) -> Result<ValueId, RuntimeError> {
            use Value::*;
            let updated = match (heap.get(target), heap.get(value)) {
                (Int(l), Int(r)) => Int($apply(*l, *r)),
                (l, r) => return Err(binary_type_error($verb, l, r)),
            };
            *heap.get_mut(target) = updated;
            Ok(target)
        }
    };
}

ip_integer!(ip_and, "in-place bitwise-and", |l: i64, r: i64| l & r);
ip_integer!(ip_or, "in-place bitwise-or", |l: i64, r: i64| l | r);
ip_integer!(ip_xor, "in-place bitwise-xor", |l: i64, r: i64| l ^ r);
ip_integer!(ip_lshift, "in-place left-shift", |l: i64, r: i64| l
    .wrapping_shl(r as u32));
ip_integer!(ip_rshift, "in-place right-shift", |l: i64, r: i64| l
    .wrapping_shr(r as u32));

/// Pre-increment: mutates in place and yields the new value.
pub fn preinc(heap: &mut Heap, target: ValueId) -> Result<ValueId, RuntimeError> {
    step_by(heap, target, 1, "pre-increment", true)
}

/// Pre-decrement: mutates in place and yields the new value.
pub fn predec(heap: &mut Heap, target: ValueId) -> Result<ValueId, RuntimeError> {
    step_by(heap, target, -1, "pre-decrement", true)
}

/// Post-increment: mutates in place and yields the old value.
pub fn postinc(heap: &mut Heap, target: ValueId) -> Result<ValueId, RuntimeError> {
    step_by(heap, target, 1, "post-increment", false)
}

/// Post-decrement: mutates in place and yields the old value.
pub fn postdec(heap: &mut Heap, target: ValueId) -> Result<ValueId, RuntimeError> {
    step_by(heap, target, -1, "post-decrement", false)
}

fn step_by(
    heap: &mut Heap,
    target: ValueId,
    delta: i64,
    verb: &str,
    yield_new: bool,
) -> Result<ValueId, RuntimeError> {
    use Value::*;
    let (old, new) = match heap.get(target) {
        Int(v) => (Int(*v), Int(v.wrapping_add(delta))),
        Float(v) => (Float(*v), Float(v + delta as f64)),
        v => return Err(unary_type_error(verb, v)),
    };
    *heap.get_mut(target) = new.clone();
    Ok(heap.alloc(if yield_new { new } else { old }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap_with(values: &[Value]) -> (Heap, Vec<ValueId>) {
        let mut heap = Heap::new();
        let ids = values.iter().map(|v| heap.alloc(v.clone())).collect();
        (heap, ids)
    }

    #[test]
    fn test_truthiness_table() {
        let mut heap = Heap::new();
        let empty_list = heap.alloc(Value::List(vec![]));
        let one = heap.alloc(Value::Int(1));
        let full_list = heap.alloc(Value::List(vec![one]));

        assert!(!Value::Null.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(Value::Bool(true).truthy());
        assert!(!Value::Int(0).truthy());
        assert!(Value::Int(-3).truthy());
        assert!(!Value::Float(0.0).truthy());
        assert!(Value::Float(0.5).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(Value::Str("x".into()).truthy());
        assert!(!heap.get(empty_list).truthy());
        assert!(heap.get(full_list).truthy());
        assert!(!Value::Dict(Dict::new()).truthy());
        assert!(!Value::Env(Env::new(None)).truthy());
        assert!(Value::Function { addr: 0, env: 0 }.truthy());
    }

    #[test]
    fn test_truthy_is_not_falsy_for_every_kind() {
        let values = [
            Value::Null,
            Value::Bool(false),
            Value::Int(0),
            Value::Float(1.5),
            Value::Str("s".into()),
            Value::Symbol("s".into()),
            Value::List(vec![]),
            Value::Dict(Dict::new()),
            Value::Slice {
                start: 0,
                stop: 0,
                step: 0,
            },
            Value::Env(Env::new(None)),
            Value::Object {
                env: 0,
                members: Dict::new(),
            },
            Value::Function { addr: 0, env: 0 },
        ];
        for value in values {
            assert_eq!(value.truthy(), !value.falsy(), "{value:?}");
        }
    }

    #[test]
    fn test_arithmetic_dispatch() {
        let (mut heap, ids) =
            heap_with(&[Value::Int(7), Value::Int(2), Value::Float(0.5)]);
        let (i7, i2, f05) = (ids[0], ids[1], ids[2]);

        let sum = add(&mut heap, i7, i2).unwrap();
        assert_eq!(heap.get(sum), &Value::Int(9));
        let mixed = add(&mut heap, i7, f05).unwrap();
        assert_eq!(heap.get(mixed), &Value::Float(7.5));
        let diff = sub(&mut heap, i7, i2).unwrap();
        assert_eq!(heap.get(diff), &Value::Int(5));
        let product = mul(&mut heap, i7, i2).unwrap();
        assert_eq!(heap.get(product), &Value::Int(14));
        let quotient = div(&mut heap, i7, i2).unwrap();
        assert_eq!(heap.get(quotient), &Value::Int(3));
        let rem = modulo(&mut heap, i7, i2).unwrap();
        assert_eq!(heap.get(rem), &Value::Int(1));
        let power = pow(&mut heap, i7, i2).unwrap();
        assert_eq!(heap.get(power), &Value::Int(49));
    }

    #[test]
    fn test_string_concatenation_is_add_only() {
        let (mut heap, ids) = heap_with(&[
            Value::Str("ab".into()),
            Value::Str("cd".into()),
        ]);
        let joined = add(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(heap.get(joined), &Value::Str("abcd".into()));
        assert!(sub(&mut heap, ids[0], ids[1]).is_err());
        assert!(mul(&mut heap, ids[0], ids[1]).is_err());
    }

    #[test]
    fn test_type_mismatch_names_both_kinds() {
        let (mut heap, ids) = heap_with(&[Value::Int(1), Value::Str("x".into())]);
        let err = add(&mut heap, ids[0], ids[1]).unwrap_err();
        assert!(err.message.contains("Int"), "{}", err.message);
        assert!(err.message.contains("String"), "{}", err.message);
    }

    #[test]
    fn test_division_by_zero() {
        let (mut heap, ids) = heap_with(&[Value::Int(1), Value::Int(0)]);
        assert!(div(&mut heap, ids[0], ids[1]).is_err());
        assert!(modulo(&mut heap, ids[0], ids[1]).is_err());
    }

    #[test]
    fn test_bitwise_is_int_only() {
        let (mut heap, ids) =
            heap_with(&[Value::Int(0b1100), Value::Int(0b1010), Value::Float(1.0)]);
        let and = bit_and(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(heap.get(and), &Value::Int(0b1000));
        let or = bit_or(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(heap.get(or), &Value::Int(0b1110));
        let xor = bit_xor(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(heap.get(xor), &Value::Int(0b0110));
        assert!(bit_and(&mut heap, ids[0], ids[2]).is_err());

        let not = bit_not(&mut heap, ids[0]).unwrap();
        assert_eq!(heap.get(not), &Value::Int(!0b1100));
        assert!(bit_not(&mut heap, ids[2]).is_err());
    }

    #[test]
    fn test_shifts() {
        let (mut heap, ids) = heap_with(&[Value::Int(1), Value::Int(4)]);
        let left = lshift(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(heap.get(left), &Value::Int(16));
        let right = rshift(&mut heap, ids[1], ids[0]).unwrap();
        assert_eq!(heap.get(right), &Value::Int(2));
    }

    #[test]
    fn test_logical_yield_bool() {
        let (mut heap, ids) = heap_with(&[Value::Int(5), Value::Int(0)]);
        let and = log_and(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(heap.get(and), &Value::Bool(false));
        let or = log_or(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(heap.get(or), &Value::Bool(true));
        let not = log_not(&mut heap, ids[1]).unwrap();
        assert_eq!(heap.get(not), &Value::Bool(true));
    }

    #[test]
    fn test_equality_rules() {
        let (mut heap, ids) = heap_with(&[
            Value::Int(1),
            Value::Float(1.0),
            Value::Str("a".into()),
            Value::Null,
            Value::Bool(true),
        ]);
        assert!(equal(&heap, ids[0], ids[1]).unwrap());
        assert!(equal(&heap, ids[3], ids[3]).unwrap());
        assert!(equal(&heap, ids[4], ids[4]).unwrap());
        // cross-kind non-numeric equality fails
        assert!(equal(&heap, ids[0], ids[2]).is_err());
        assert!(equal(&heap, ids[3], ids[0]).is_err());

        let ne_result = ne(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(heap.get(ne_result), &Value::Bool(false));
    }

    #[test]
    fn test_list_equality_is_structural() {
        let mut heap = Heap::new();
        let a1 = heap.alloc(Value::Int(1));
        let a2 = heap.alloc(Value::Int(2));
        let b1 = heap.alloc(Value::Int(1));
        let b2 = heap.alloc(Value::Int(2));
        let list_a = heap.alloc(Value::List(vec![a1, a2]));
        let list_b = heap.alloc(Value::List(vec![b1, b2]));
        let list_c = heap.alloc(Value::List(vec![b2, b1]));
        assert!(equal(&heap, list_a, list_b).unwrap());
        assert!(!equal(&heap, list_a, list_c).unwrap());
    }

    #[test]
    fn test_function_equality_is_address_equality() {
        let mut heap = Heap::new();
        let env = heap.new_env(None);
        let f1 = heap.alloc(Value::Function { addr: 10, env });
        let f2 = heap.alloc(Value::Function { addr: 10, env });
        let f3 = heap.alloc(Value::Function { addr: 20, env });
        assert!(equal(&heap, f1, f2).unwrap());
        assert!(!equal(&heap, f1, f3).unwrap());
    }

    #[test]
    fn test_object_equality_is_identity() {
        let mut heap = Heap::new();
        let env = heap.new_env(None);
        let o1 = heap.alloc(Value::Object {
            env,
            members: Dict::new(),
        });
        let o2 = heap.alloc(Value::Object {
            env,
            members: Dict::new(),
        });
        assert!(equal(&heap, o1, o1).unwrap());
        assert!(!equal(&heap, o1, o2).unwrap());
    }

    #[test]
    fn test_comparisons() {
        let (mut heap, ids) = heap_with(&[
            Value::Int(1),
            Value::Int(2),
            Value::Float(1.5),
            Value::Str("abc".into()),
            Value::Str("abd".into()),
        ]);
        let result = lt(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(heap.get(result), &Value::Bool(true));
        let result = gt(&mut heap, ids[1], ids[2]).unwrap();
        assert_eq!(heap.get(result), &Value::Bool(true));
        let result = ge(&mut heap, ids[0], ids[0]).unwrap();
        assert_eq!(heap.get(result), &Value::Bool(true));
        let result = le(&mut heap, ids[2], ids[1]).unwrap();
        assert_eq!(heap.get(result), &Value::Bool(true));
        // strings compare lexicographically
        let result = lt(&mut heap, ids[3], ids[4]).unwrap();
        assert_eq!(heap.get(result), &Value::Bool(true));
        // mixed string/number ordering fails
        assert!(lt(&mut heap, ids[0], ids[3]).is_err());
    }

    #[test]
    fn test_in_place_ops_mutate_the_slot() {
        let (mut heap, ids) = heap_with(&[Value::Int(10), Value::Int(3)]);
        let result = ip_add(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(result, ids[0]);
        assert_eq!(heap.get(ids[0]), &Value::Int(13));

        ip_sub(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(heap.get(ids[0]), &Value::Int(10));
        ip_mul(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(heap.get(ids[0]), &Value::Int(30));
        ip_div(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(heap.get(ids[0]), &Value::Int(10));
        ip_mod(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(heap.get(ids[0]), &Value::Int(1));
    }

    #[test]
    fn test_in_place_add_concatenates_strings() {
        let (mut heap, ids) = heap_with(&[
            Value::Str("ab".into()),
            Value::Str("cd".into()),
        ]);
        ip_add(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(heap.get(ids[0]), &Value::Str("abcd".into()));
    }

    #[test]
    fn test_in_place_assign_overwrites() {
        let (mut heap, ids) = heap_with(&[Value::Int(1), Value::Str("s".into())]);
        let result = ip_assign(&mut heap, ids[0], ids[1]).unwrap();
        assert_eq!(result, ids[0]);
        assert_eq!(heap.get(ids[0]), &Value::Str("s".into()));
        // the source is unchanged
        assert_eq!(heap.get(ids[1]), &Value::Str("s".into()));
    }

    #[test]
    fn test_increment_decrement_semantics() {
        let (mut heap, ids) = heap_with(&[Value::Int(5)]);
        let target = ids[0];

        let new = preinc(&mut heap, target).unwrap();
        assert_eq!(heap.get(new), &Value::Int(6));
        assert_eq!(heap.get(target), &Value::Int(6));

        let old = postinc(&mut heap, target).unwrap();
        assert_eq!(heap.get(old), &Value::Int(6));
        assert_eq!(heap.get(target), &Value::Int(7));

        let new = predec(&mut heap, target).unwrap();
        assert_eq!(heap.get(new), &Value::Int(6));

        let old = postdec(&mut heap, target).unwrap();
        assert_eq!(heap.get(old), &Value::Int(6));
        assert_eq!(heap.get(target), &Value::Int(5));

        let (mut heap, ids) = heap_with(&[Value::Float(1.0)]);
        preinc(&mut heap, ids[0]).unwrap();
        assert_eq!(heap.get(ids[0]), &Value::Float(2.0));

        let (mut heap, ids) = heap_with(&[Value::Str("x".into())]);
        assert!(preinc(&mut heap, ids[0]).is_err());
    }

    #[test]
    fn test_hashing_rules() {
        let (heap, ids) = heap_with(&[
            Value::Int(3),
            Value::Float(1.5),
            Value::Str("k".into()),
            Value::Symbol("s".into()),
            Value::List(vec![]),
            Value::Dict(Dict::new()),
            Value::Null,
        ]);
        assert_eq!(hash_key(&heap, ids[0]).unwrap(), HashKey::Int(3));
        assert_eq!(
            hash_key(&heap, ids[1]).unwrap(),
            HashKey::Float(1.5f64.to_bits())
        );
        assert_eq!(hash_key(&heap, ids[2]).unwrap(), HashKey::Str("k".into()));
        assert_eq!(
            hash_key(&heap, ids[3]).unwrap(),
            HashKey::Symbol("s".into())
        );
        assert!(hash_key(&heap, ids[4]).is_err());
        assert!(hash_key(&heap, ids[5]).is_err());
        assert_eq!(hash_key(&heap, ids[6]).unwrap(), HashKey::Identity(ids[6]));
    }

    #[test]
    fn test_repr() {
        let mut heap = Heap::new();
        let n = heap.alloc(Value::Null);
        let t = heap.alloc(Value::Bool(true));
        let i = heap.alloc(Value::Int(-4));
        let f = heap.alloc(Value::Float(3.0));
        let s = heap.alloc(Value::Str("abcd".into()));
        let list = heap.alloc(Value::List(vec![i, t]));

        assert_eq!(repr(&heap, n), "Null");
        assert_eq!(repr(&heap, t), "True");
        assert_eq!(repr(&heap, i), "-4");
        assert_eq!(repr(&heap, f), "3.000000");
        assert_eq!(repr(&heap, s), "'abcd'");
        assert_eq!(repr(&heap, list), "[-4True]");
    }

    #[test]
    fn test_trace_marks_reachable_values() {
        let mut heap = Heap::new();
        let a = heap.alloc(Value::Int(1));
        let b = heap.alloc(Value::Int(2));
        let list = heap.alloc(Value::List(vec![a]));
        heap.trace(list);
        assert!(heap.is_marked(list));
        assert!(heap.is_marked(a));
        assert!(!heap.is_marked(b));
        heap.clear_marks();
        assert!(!heap.is_marked(list));
    }
}
