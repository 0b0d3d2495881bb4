use crate::fault::Fault;
use crate::value::{Pointer, Value};

/// Per-activation LIFO of values.
#[derive(Debug, Default)]
pub struct OperandStack {
    values: Vec<Value>,
}

impl OperandStack {
    pub fn new() -> Self {
        OperandStack::default()
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, Fault> {
        self.values.pop().ok_or_else(|| Fault::malformed("operand stack underflow"))
    }

    pub fn pop_int(&mut self) -> Result<i32, Fault> {
        self.pop()?.to_int()
    }

    pub fn pop_ref(&mut self) -> Result<Option<Pointer>, Fault> {
        self.pop()?.to_ref()
    }

    pub fn peek(&self) -> Option<Value> {
        self.values.last().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A suspended caller: everything needed to resume it after the callee
/// returns. Owned by the call stack and restored exactly once.
#[derive(Debug)]
pub(crate) struct Frame<'p> {
    pub stack: OperandStack,
    pub function: u16,
    pub code: &'p [u8],
    /// Already advanced past the `invokestatic` that suspended this frame.
    pub pc: usize,
    pub locals: Vec<Value>,
}
