use std::fmt;
use std::num::NonZeroU32;

use serde::Serialize;

use crate::fault::Fault;

// ── Object handles ───────────────────────────────────────────────────

/// Handle to one object in the heap arena.
///
/// Never zero: a reference word stored in zero-filled memory decodes as null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectId(NonZeroU32);

impl ObjectId {
    pub(crate) fn from_index(index: usize) -> Option<Self> {
        let raw = u32::try_from(index).ok()?.checked_add(1)?;
        NonZeroU32::new(raw).map(ObjectId)
    }

    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(ObjectId)
    }

    pub(crate) fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }

    pub fn raw(self) -> u32 {
        self.0.get()
    }
}

/// A non-null reference: an object plus a byte offset into it.
///
/// Interior pointers (struct fields, array elements, string suffixes) share
/// the object of their base and differ only in `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pointer {
    pub object: ObjectId,
    pub offset: u32,
}

impl Pointer {
    pub fn new(object: ObjectId, offset: u32) -> Self {
        Pointer { object, offset }
    }

    /// Advance by `bytes`. Landing outside the object is only detected when
    /// the result is dereferenced.
    pub fn offset_by(self, bytes: u32) -> Result<Pointer, Fault> {
        let offset = self
            .offset
            .checked_add(bytes)
            .ok_or_else(|| Fault::memory("address arithmetic overflow"))?;
        Ok(Pointer { offset, ..self })
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{}+{}", self.object.raw(), self.offset)
    }
}

// ── Value ────────────────────────────────────────────────────────────

/// One operand-stack slot, local, or native argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i32),
    Ref(Option<Pointer>),
}

impl Default for Value {
    /// Zero-initialized locals read as integer 0.
    fn default() -> Self {
        Value::Int(0)
    }
}

impl Value {
    pub const NULL: Value = Value::Ref(None);

    pub fn ptr(p: Pointer) -> Self {
        Value::Ref(Some(p))
    }

    pub fn to_int(self) -> Result<i32, Fault> {
        match self {
            Value::Int(n) => Ok(n),
            Value::Ref(_) => Err(Fault::malformed("expected an integer, found a reference")),
        }
    }

    pub fn to_ref(self) -> Result<Option<Pointer>, Fault> {
        match self {
            Value::Ref(r) => Ok(r),
            Value::Int(_) => Err(Fault::malformed("expected a reference, found an integer")),
        }
    }

    pub fn is_null(self) -> bool {
        matches!(self, Value::Ref(None))
    }
}

/// Equality used by `if_cmpeq` / `if_cmpne`: integers compare by value,
/// references by identity (both null, or same object and offset), and an
/// integer never equals a reference.
pub fn equal(a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Ref(x), Value::Ref(y)) => x == y,
        _ => false,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Ref(None) => write!(f, "null"),
            Value::Ref(Some(p)) => write!(f, "{p}"),
        }
    }
}
