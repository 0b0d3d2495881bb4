//! Native call bridge.
//!
//! `invokenative` names a native descriptor; the descriptor names a slot in
//! the host's [`NativeTable`]. Routines receive their arguments in parameter
//! order and return exactly one value, or a fault that propagates exactly as
//! an interpreter-raised one.

pub mod stdlib;

use std::fmt;
use std::io::Write;

use crate::fault::{Fault, FaultKind};
use crate::heap::Heap;
use crate::value::Value;

/// What a native routine may touch besides its arguments.
pub struct NativeContext<'a> {
    pub heap: &'a mut Heap,
    pub out: &'a mut dyn Write,
}

impl NativeContext<'_> {
    /// Write to the program's output, reporting a failed write as a fault.
    pub fn emit(&mut self, bytes: &[u8]) -> Result<(), Fault> {
        self.out
            .write_all(bytes)
            .map_err(|e| Fault::user(format!("write failed: {e}")))
    }
}

pub type NativeFn = fn(&mut NativeContext<'_>, &[Value]) -> Result<Value, Fault>;

#[derive(Clone, Copy)]
pub struct NativeEntry {
    pub name: &'static str,
    pub func: NativeFn,
}

impl fmt::Debug for NativeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeEntry").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Host-supplied slot → routine mapping. Fixed for the run.
#[derive(Debug, Clone, Default)]
pub struct NativeTable {
    slots: Vec<Option<NativeEntry>>,
}

impl NativeTable {
    /// A table with no routines registered.
    pub fn new() -> Self {
        NativeTable::default()
    }

    /// The bundled console and string library; see [`stdlib`] for slot numbers.
    pub fn standard() -> Self {
        let mut table = NativeTable::new();
        for (slot, (name, func)) in stdlib::ROUTINES.iter().enumerate() {
            table.register(slot as u16, *name, *func);
        }
        table
    }

    /// Install `func` at `slot`, replacing whatever was there.
    pub fn register(&mut self, slot: u16, name: &'static str, func: NativeFn) {
        let slot = slot as usize;
        if self.slots.len() <= slot {
            self.slots.resize(slot + 1, None);
        }
        self.slots[slot] = Some(NativeEntry { name, func });
    }

    pub fn get(&self, slot: u16) -> Option<&NativeEntry> {
        self.slots.get(slot as usize).and_then(Option::as_ref)
    }

    pub fn lookup(&self, slot: u16) -> Result<&NativeEntry, Fault> {
        self.get(slot).ok_or_else(|| {
            Fault::new(FaultKind::InvalidOpcode, format!("unknown native function in slot {slot}"))
        })
    }

    /// Number of registered routines.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(_: &mut NativeContext<'_>, _: &[Value]) -> Result<Value, Fault> {
        Ok(Value::Int(42))
    }

    #[test]
    fn register_and_call() {
        let mut table = NativeTable::new();
        assert!(table.is_empty());
        table.register(5, "answer", answer);
        assert_eq!(table.len(), 1);
        assert!(table.get(4).is_none());

        let mut heap = Heap::new();
        let mut out = Vec::new();
        let mut ctx = NativeContext { heap: &mut heap, out: &mut out };
        let entry = table.lookup(5).unwrap();
        assert_eq!(entry.name, "answer");
        assert_eq!((entry.func)(&mut ctx, &[]).unwrap(), Value::Int(42));
    }

    #[test]
    fn unknown_slot_is_invalid_opcode() {
        let table = NativeTable::new();
        let err = table.lookup(9).unwrap_err();
        assert_eq!(err.kind, FaultKind::InvalidOpcode);
        assert!(err.message.contains('9'));
    }

    #[test]
    fn standard_table_is_dense() {
        let table = NativeTable::standard();
        assert_eq!(table.len(), stdlib::ROUTINES.len());
        assert_eq!(table.lookup(stdlib::PRINTINT).unwrap().name, "printint");
    }
}
