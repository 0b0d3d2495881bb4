use std::fmt;

use serde::Serialize;

use crate::diagnostic::{Diagnostic, Output};

/// Classification of an unrecoverable runtime condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultKind {
    /// Zero divisor, `i32::MIN / -1`, shift amount outside `[0, 32)`.
    Arithmetic,
    /// Null dereference, negative array length, index or offset out of bounds.
    MemoryAccess,
    /// `assert` on a zero condition.
    AssertionFailure,
    /// Explicit `athrow`.
    UserError,
    /// Unknown or unsupported opcode byte, unregistered native slot.
    InvalidOpcode,
    /// The executed bytecode broke an invariant the compiler is trusted to
    /// uphold: stack underflow, variant mismatch, pool index out of range.
    Malformed,
}

impl FaultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::Arithmetic => "arithmetic error",
            FaultKind::MemoryAccess => "memory error",
            FaultKind::AssertionFailure => "assertion failed",
            FaultKind::UserError => "user error",
            FaultKind::InvalidOpcode => "invalid opcode",
            FaultKind::Malformed => "malformed bytecode",
        }
    }

    /// Stable diagnostic code.
    pub fn code(self) -> &'static str {
        match self {
            FaultKind::Arithmetic => "C0VM-A001",
            FaultKind::MemoryAccess => "C0VM-M001",
            FaultKind::AssertionFailure => "C0VM-S001",
            FaultKind::UserError => "C0VM-U001",
            FaultKind::InvalidOpcode => "C0VM-I001",
            FaultKind::Malformed => "C0VM-B001",
        }
    }

    /// Process exit status, following the shell's 128 + signal convention
    /// for SIGFPE, SIGSEGV and SIGABRT.
    pub fn exit_code(self) -> i32 {
        match self {
            FaultKind::Arithmetic => 136,
            FaultKind::MemoryAccess => 139,
            FaultKind::AssertionFailure
            | FaultKind::UserError
            | FaultKind::InvalidOpcode
            | FaultKind::Malformed => 134,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a fault was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub function: u16,
    pub pc: usize,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    pub location: Option<Location>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Fault { kind, message: message.into(), location: None }
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        Fault::new(FaultKind::Arithmetic, message)
    }

    pub fn memory(message: impl Into<String>) -> Self {
        Fault::new(FaultKind::MemoryAccess, message)
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Fault::new(FaultKind::AssertionFailure, message)
    }

    pub fn user(message: impl Into<String>) -> Self {
        Fault::new(FaultKind::UserError, message)
    }

    pub fn invalid_opcode(byte: u8) -> Self {
        Fault::new(FaultKind::InvalidOpcode, format!("0x{byte:02x}"))
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Fault::new(FaultKind::Malformed, message)
    }

    /// Attach the detection site. The first location recorded wins.
    pub fn at(mut self, location: Location) -> Self {
        self.location.get_or_insert(location);
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}

/// Report `fault` on stderr and end the process with its exit status.
///
/// This is the only way a faulting run ends; nothing between the point of
/// detection and here inspects the fault.
pub fn abort(fault: &Fault, output: Output) -> ! {
    let rendered = output.render(&Diagnostic::from(fault));
    eprint!("{rendered}");
    if !rendered.ends_with('\n') {
        eprintln!();
    }
    std::process::exit(fault.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_kind_and_message() {
        let f = Fault::arithmetic("division by zero");
        assert_eq!(f.to_string(), "arithmetic error: division by zero");
        assert_eq!(Fault::invalid_opcode(0xd1).to_string(), "invalid opcode: 0xd1");
    }

    #[test]
    fn exit_codes_are_nonzero_and_distinguish_signals() {
        let kinds = [
            FaultKind::Arithmetic,
            FaultKind::MemoryAccess,
            FaultKind::AssertionFailure,
            FaultKind::UserError,
            FaultKind::InvalidOpcode,
            FaultKind::Malformed,
        ];
        for k in kinds {
            assert_ne!(k.exit_code(), 0, "{k}");
        }
        assert_ne!(FaultKind::Arithmetic.exit_code(), FaultKind::MemoryAccess.exit_code());
    }

    #[test]
    fn first_location_wins() {
        let inner = Location { function: 1, pc: 4, depth: 1 };
        let outer = Location { function: 0, pc: 9, depth: 0 };
        let f = Fault::memory("null dereference").at(inner).at(outer);
        assert_eq!(f.location, Some(inner));
    }

    #[test]
    fn codes_are_unique() {
        let mut codes = vec![
            FaultKind::Arithmetic.code(),
            FaultKind::MemoryAccess.code(),
            FaultKind::AssertionFailure.code(),
            FaultKind::UserError.code(),
            FaultKind::InvalidOpcode.code(),
            FaultKind::Malformed.code(),
        ];
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 6);
    }
}
