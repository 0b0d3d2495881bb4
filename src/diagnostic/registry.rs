/// An entry in the diagnostic code registry.
pub struct ErrorEntry {
    pub code: &'static str,
    /// One line, for listings.
    pub short: &'static str,
    /// Full explanation printed by `--explain`.
    pub long: &'static str,
}

/// Every stable code the interpreter reports.
pub static REGISTRY: &[ErrorEntry] = &[
    ErrorEntry {
        code: "C0VM-A001",
        short: "arithmetic error",
        long: r#"## C0VM-A001: arithmetic error

Integer division or remainder by zero, `INT_MIN / -1` or `INT_MIN % -1`,
or a shift amount outside 0..=31.

    bipush 1
    bipush 0
    idiv        # faults here

The process exits with status 136.
"#,
    },
    ErrorEntry {
        code: "C0VM-M001",
        short: "memory error",
        long: r#"## C0VM-M001: memory error

A load, store or address computation went through a null reference,
outside the object it points into, or past the end of an array. Also
raised for a negative `newarray` length, an array size that does not fit
in 32 bits, and a call stack deeper than `--max-depth`.

    aconst_null
    imload      # faults here

The process exits with status 139.
"#,
    },
    ErrorEntry {
        code: "C0VM-S001",
        short: "assertion failed",
        long: r#"## C0VM-S001: assertion failed

An `assert` instruction found its condition equal to 0. The message is
the string the program supplied with the assertion.

The process exits with status 134.
"#,
    },
    ErrorEntry {
        code: "C0VM-U001",
        short: "user error",
        long: r#"## C0VM-U001: user error

The program executed `athrow` (C0 `error(...)`), or a native library
routine rejected its arguments. The message comes from the program or the
routine.

The process exits with status 134.
"#,
    },
    ErrorEntry {
        code: "C0VM-I001",
        short: "invalid opcode",
        long: r#"## C0VM-I001: invalid opcode

The byte at the program counter is not an instruction this interpreter
executes. Tagged-pointer and function-pointer instructions (`checktag`,
`hastag`, `addtag`, `addrof_static`, `addrof_native`, `invokedynamic`)
land here too, as does `invokenative` naming a library slot the host did
not register.

The process exits with status 134.
"#,
    },
    ErrorEntry {
        code: "C0VM-B001",
        short: "malformed bytecode",
        long: r#"## C0VM-B001: malformed bytecode

The executed code broke a rule a correct compiler always follows: the
operand stack ran dry, an integer was used as a reference or the reverse,
a pool, function, native or local index was out of range, execution ran
off the end of a function, or `return` found more than one value on the
operand stack.

Rebuild the module with a compiler matching this interpreter's format.

The process exits with status 134.
"#,
    },
    ErrorEntry {
        code: "C0VM-L001",
        short: "module load error",
        long: r#"## C0VM-L001: module load error

The `.bc0` file could not be read as a module: an unexpected character,
a wrong magic number (expected `C0 C0 FF EE`), input ending in the middle
of a field, bytes left over after the native pool, or no functions.

Nothing is executed. The process exits with status 1.
"#,
    },
];

/// Look up an entry by code (e.g. `"C0VM-A001"`).
pub fn lookup(code: &str) -> Option<&'static ErrorEntry> {
    REGISTRY.iter().find(|e| e.code.eq_ignore_ascii_case(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::LOAD_ERROR_CODE;
    use crate::fault::FaultKind;

    #[test]
    fn every_fault_kind_is_registered() {
        let kinds = [
            FaultKind::Arithmetic,
            FaultKind::MemoryAccess,
            FaultKind::AssertionFailure,
            FaultKind::UserError,
            FaultKind::InvalidOpcode,
            FaultKind::Malformed,
        ];
        for kind in kinds {
            let entry = lookup(kind.code()).unwrap_or_else(|| panic!("{} missing", kind.code()));
            assert_eq!(entry.short, kind.as_str());
            assert!(entry.long.contains(kind.code()));
        }
        assert!(lookup(LOAD_ERROR_CODE).is_some());
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(lookup("c0vm-m001").map(|e| e.code), Some("C0VM-M001"));
    }

    #[test]
    fn lookup_unknown_returns_none() {
        assert!(lookup("C0VM-X999").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn all_codes_unique() {
        let mut codes: Vec<&str> = REGISTRY.iter().map(|e| e.code).collect();
        codes.sort_unstable();
        let len_before = codes.len();
        codes.dedup();
        assert_eq!(codes.len(), len_before, "duplicate codes in registry");
    }
}
