use crate::fault::Fault;
use crate::value::{self, Value};

// ── Opcode bytes ─────────────────────────────────────────────────────
//
// Immediates follow the opcode byte: u8/i8 (1 byte) or u16/i16 (2 bytes,
// big-endian). Branch offsets are relative to the branch opcode itself.

pub const NOP: u8 = 0x00;
pub const ACONST_NULL: u8 = 0x01;
pub const BIPUSH: u8 = 0x10; // i8
pub const ILDC: u8 = 0x13; // u16
pub const ALDC: u8 = 0x14; // u16
pub const VLOAD: u8 = 0x15; // u8
pub const ADDROF_STATIC: u8 = 0x16; // u16, unsupported
pub const ADDROF_NATIVE: u8 = 0x17; // u16, unsupported
pub const IMLOAD: u8 = 0x2E;
pub const AMLOAD: u8 = 0x2F;
pub const CMLOAD: u8 = 0x34;
pub const VSTORE: u8 = 0x36; // u8
pub const IMSTORE: u8 = 0x4E;
pub const AMSTORE: u8 = 0x4F;
pub const CMSTORE: u8 = 0x55;
pub const POP: u8 = 0x57;
pub const DUP: u8 = 0x59;
pub const SWAP: u8 = 0x5F;
pub const IADD: u8 = 0x60;
pub const AADDF: u8 = 0x62; // u8
pub const AADDS: u8 = 0x63;
pub const ISUB: u8 = 0x64;
pub const IMUL: u8 = 0x68;
pub const IDIV: u8 = 0x6C;
pub const IREM: u8 = 0x70;
pub const ISHL: u8 = 0x78;
pub const ISHR: u8 = 0x7A;
pub const IAND: u8 = 0x7E;
pub const IOR: u8 = 0x80;
pub const IXOR: u8 = 0x82;
pub const IF_CMPEQ: u8 = 0x9F; // i16
pub const IF_CMPNE: u8 = 0xA0; // i16
pub const IF_ICMPLT: u8 = 0xA1; // i16
pub const IF_ICMPGE: u8 = 0xA2; // i16
pub const IF_ICMPGT: u8 = 0xA3; // i16
pub const IF_ICMPLE: u8 = 0xA4; // i16
pub const GOTO: u8 = 0xA7; // i16
pub const RETURN: u8 = 0xB0;
pub const INVOKEDYNAMIC: u8 = 0xB6; // unsupported
pub const INVOKENATIVE: u8 = 0xB7; // u16
pub const INVOKESTATIC: u8 = 0xB8; // u16
pub const NEW: u8 = 0xBB; // u8
pub const NEWARRAY: u8 = 0xBC; // u8
pub const ARRAYLENGTH: u8 = 0xBE;
pub const ATHROW: u8 = 0xBF;
pub const CHECKTAG: u8 = 0xC0; // u16, unsupported
pub const HASTAG: u8 = 0xC1; // u16, unsupported
pub const ADDTAG: u8 = 0xC2; // u16, unsupported
pub const ASSERT: u8 = 0xCF;

/// Mnemonic for an opcode byte, if it is one.
pub fn name(op: u8) -> Option<&'static str> {
    Some(match op {
        NOP => "nop",
        ACONST_NULL => "aconst_null",
        BIPUSH => "bipush",
        ILDC => "ildc",
        ALDC => "aldc",
        VLOAD => "vload",
        ADDROF_STATIC => "addrof_static",
        ADDROF_NATIVE => "addrof_native",
        IMLOAD => "imload",
        AMLOAD => "amload",
        CMLOAD => "cmload",
        VSTORE => "vstore",
        IMSTORE => "imstore",
        AMSTORE => "amstore",
        CMSTORE => "cmstore",
        POP => "pop",
        DUP => "dup",
        SWAP => "swap",
        IADD => "iadd",
        AADDF => "aaddf",
        AADDS => "aadds",
        ISUB => "isub",
        IMUL => "imul",
        IDIV => "idiv",
        IREM => "irem",
        ISHL => "ishl",
        ISHR => "ishr",
        IAND => "iand",
        IOR => "ior",
        IXOR => "ixor",
        IF_CMPEQ => "if_cmpeq",
        IF_CMPNE => "if_cmpne",
        IF_ICMPLT => "if_icmplt",
        IF_ICMPGE => "if_icmpge",
        IF_ICMPGT => "if_icmpgt",
        IF_ICMPLE => "if_icmple",
        GOTO => "goto",
        RETURN => "return",
        INVOKEDYNAMIC => "invokedynamic",
        INVOKENATIVE => "invokenative",
        INVOKESTATIC => "invokestatic",
        NEW => "new",
        NEWARRAY => "newarray",
        ARRAYLENGTH => "arraylength",
        ATHROW => "athrow",
        CHECKTAG => "checktag",
        HASTAG => "hastag",
        ADDTAG => "addtag",
        ASSERT => "assert",
        _ => return None,
    })
}

// ── Decoded instructions ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    And,
    Or,
    Xor,
}

impl ArithOp {
    /// `left OP right`, where `right` is the value that was on top of the stack.
    pub fn apply(self, left: i32, right: i32) -> Result<i32, Fault> {
        Ok(match self {
            ArithOp::Add => left.wrapping_add(right),
            ArithOp::Sub => left.wrapping_sub(right),
            ArithOp::Mul => left.wrapping_mul(right),
            ArithOp::Div => {
                check_divisor(left, right)?;
                left / right
            }
            ArithOp::Rem => {
                check_divisor(left, right)?;
                left % right
            }
            ArithOp::Shl => left << shift_amount(right)?,
            ArithOp::Shr => left >> shift_amount(right)?,
            ArithOp::And => left & right,
            ArithOp::Or => left | right,
            ArithOp::Xor => left ^ right,
        })
    }
}

fn check_divisor(dividend: i32, divisor: i32) -> Result<(), Fault> {
    if divisor == 0 {
        return Err(Fault::arithmetic("division by zero"));
    }
    if dividend == i32::MIN && divisor == -1 {
        return Err(Fault::arithmetic("division overflow"));
    }
    Ok(())
}

fn shift_amount(amount: i32) -> Result<u32, Fault> {
    u32::try_from(amount)
        .ok()
        .filter(|&n| n < 32)
        .ok_or_else(|| Fault::arithmetic(format!("shift amount {amount} out of range")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Cond {
    /// `left` is the value pushed first (popped second).
    pub fn holds(self, left: Value, right: Value) -> Result<bool, Fault> {
        Ok(match self {
            Cond::Eq => value::equal(left, right),
            Cond::Ne => !value::equal(left, right),
            Cond::Lt => left.to_int()? < right.to_int()?,
            Cond::Ge => left.to_int()? >= right.to_int()?,
            Cond::Gt => left.to_int()? > right.to_int()?,
            Cond::Le => left.to_int()? <= right.to_int()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    AconstNull,
    Bipush(i8),
    Ildc(u16),
    Aldc(u16),
    Vload(u8),
    Vstore(u8),
    Pop,
    Dup,
    Swap,
    Arith(ArithOp),
    If { cond: Cond, offset: i16 },
    Goto(i16),
    Athrow,
    Assert,
    InvokeStatic(u16),
    InvokeNative(u16),
    Return,
    New(u8),
    NewArray(u8),
    ArrayLength,
    Aaddf(u8),
    Aadds,
    Imload,
    Imstore,
    Amload,
    Amstore,
    Cmload,
    Cmstore,
}

impl Instruction {
    /// Decode the instruction at `pc`, returning it with its encoded width.
    pub fn decode(code: &[u8], pc: usize) -> Result<(Instruction, usize), Fault> {
        let op = *code
            .get(pc)
            .ok_or_else(|| Fault::malformed(format!("program counter {pc} past end of code")))?;
        let u8_at = |i: usize| {
            code.get(pc + i)
                .copied()
                .ok_or_else(|| Fault::malformed(format!("truncated instruction at {pc}")))
        };
        let u16_imm = || -> Result<u16, Fault> { Ok(u16::from_be_bytes([u8_at(1)?, u8_at(2)?])) };
        let branch = |cond| -> Result<(Instruction, usize), Fault> {
            Ok((Instruction::If { cond, offset: u16_imm()? as i16 }, 3))
        };

        let decoded = match op {
            NOP => (Instruction::Nop, 1),
            ACONST_NULL => (Instruction::AconstNull, 1),
            BIPUSH => (Instruction::Bipush(u8_at(1)? as i8), 2),
            ILDC => (Instruction::Ildc(u16_imm()?), 3),
            ALDC => (Instruction::Aldc(u16_imm()?), 3),
            VLOAD => (Instruction::Vload(u8_at(1)?), 2),
            VSTORE => (Instruction::Vstore(u8_at(1)?), 2),
            POP => (Instruction::Pop, 1),
            DUP => (Instruction::Dup, 1),
            SWAP => (Instruction::Swap, 1),
            IADD => (Instruction::Arith(ArithOp::Add), 1),
            ISUB => (Instruction::Arith(ArithOp::Sub), 1),
            IMUL => (Instruction::Arith(ArithOp::Mul), 1),
            IDIV => (Instruction::Arith(ArithOp::Div), 1),
            IREM => (Instruction::Arith(ArithOp::Rem), 1),
            ISHL => (Instruction::Arith(ArithOp::Shl), 1),
            ISHR => (Instruction::Arith(ArithOp::Shr), 1),
            IAND => (Instruction::Arith(ArithOp::And), 1),
            IOR => (Instruction::Arith(ArithOp::Or), 1),
            IXOR => (Instruction::Arith(ArithOp::Xor), 1),
            IF_CMPEQ => branch(Cond::Eq)?,
            IF_CMPNE => branch(Cond::Ne)?,
            IF_ICMPLT => branch(Cond::Lt)?,
            IF_ICMPGE => branch(Cond::Ge)?,
            IF_ICMPGT => branch(Cond::Gt)?,
            IF_ICMPLE => branch(Cond::Le)?,
            GOTO => (Instruction::Goto(u16_imm()? as i16), 3),
            ATHROW => (Instruction::Athrow, 1),
            ASSERT => (Instruction::Assert, 1),
            INVOKESTATIC => (Instruction::InvokeStatic(u16_imm()?), 3),
            INVOKENATIVE => (Instruction::InvokeNative(u16_imm()?), 3),
            RETURN => (Instruction::Return, 1),
            NEW => (Instruction::New(u8_at(1)?), 2),
            NEWARRAY => (Instruction::NewArray(u8_at(1)?), 2),
            ARRAYLENGTH => (Instruction::ArrayLength, 1),
            AADDF => (Instruction::Aaddf(u8_at(1)?), 2),
            AADDS => (Instruction::Aadds, 1),
            IMLOAD => (Instruction::Imload, 1),
            IMSTORE => (Instruction::Imstore, 1),
            AMLOAD => (Instruction::Amload, 1),
            AMSTORE => (Instruction::Amstore, 1),
            CMLOAD => (Instruction::Cmload, 1),
            CMSTORE => (Instruction::Cmstore, 1),
            CHECKTAG | HASTAG | ADDTAG | ADDROF_STATIC | ADDROF_NATIVE | INVOKEDYNAMIC => {
                let mut fault = Fault::invalid_opcode(op);
                if let Some(name) = name(op) {
                    fault.message = format!("0x{op:02x} ({name} is not supported)");
                }
                return Err(fault);
            }
            _ => return Err(Fault::invalid_opcode(op)),
        };
        Ok(decoded)
    }
}

/// Target of a branch whose opcode sits at `pc`.
pub fn branch_target(pc: usize, offset: i16) -> Result<usize, Fault> {
    pc.checked_add_signed(isize::from(offset))
        .ok_or_else(|| Fault::malformed(format!("branch from {pc} by {offset} leaves the function")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultKind;

    #[test]
    fn subtract_is_second_popped_minus_first_popped() {
        // push 10, push 3 → right = 3, left = 10
        assert_eq!(ArithOp::Sub.apply(10, 3).unwrap(), 7);
    }

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(ArithOp::Add.apply(i32::MAX, 1).unwrap(), i32::MIN);
        assert_eq!(ArithOp::Sub.apply(i32::MIN, 1).unwrap(), i32::MAX);
        assert_eq!(ArithOp::Mul.apply(0x10000, 0x10000).unwrap(), 0);
    }

    #[test]
    fn division_faults() {
        for (a, b) in [(1, 0), (0, 0), (i32::MIN, -1)] {
            for op in [ArithOp::Div, ArithOp::Rem] {
                let err = op.apply(a, b).unwrap_err();
                assert_eq!(err.kind, FaultKind::Arithmetic, "{op:?} {a} {b}");
            }
        }
    }

    #[test]
    fn division_truncates() {
        let cases = [(7, 2), (-7, 2), (7, -2), (-7, -2), (i32::MIN, 1), (i32::MIN, 2), (5, 7)];
        for (a, b) in cases {
            assert_eq!(ArithOp::Div.apply(a, b).unwrap(), a / b);
            assert_eq!(ArithOp::Rem.apply(a, b).unwrap(), a % b);
        }
        assert_eq!(ArithOp::Rem.apply(-7, 2).unwrap(), -1);
    }

    #[test]
    fn shifts() {
        assert_eq!(ArithOp::Shl.apply(1, 31).unwrap(), i32::MIN);
        assert_eq!(ArithOp::Shr.apply(-8, 1).unwrap(), -4);
        assert_eq!(ArithOp::Shr.apply(i32::MIN, 31).unwrap(), -1);
        assert_eq!(ArithOp::Shl.apply(5, 0).unwrap(), 5);
        for amount in [-1, 32, 33, i32::MIN, i32::MAX] {
            assert_eq!(ArithOp::Shl.apply(1, amount).unwrap_err().kind, FaultKind::Arithmetic);
            assert_eq!(ArithOp::Shr.apply(1, amount).unwrap_err().kind, FaultKind::Arithmetic);
        }
    }

    #[test]
    fn bitwise() {
        assert_eq!(ArithOp::And.apply(0b1100, 0b1010).unwrap(), 0b1000);
        assert_eq!(ArithOp::Or.apply(0b1100, 0b1010).unwrap(), 0b1110);
        assert_eq!(ArithOp::Xor.apply(0b1100, 0b1010).unwrap(), 0b0110);
    }

    #[test]
    fn comparisons_use_pushed_first_as_left() {
        assert!(Cond::Lt.holds(Value::Int(1), Value::Int(2)).unwrap());
        assert!(!Cond::Gt.holds(Value::Int(1), Value::Int(2)).unwrap());
        assert!(Cond::Le.holds(Value::Int(2), Value::Int(2)).unwrap());
        assert!(Cond::Ge.holds(Value::Int(-1), Value::Int(-2)).unwrap());
        assert!(Cond::Eq.holds(Value::NULL, Value::NULL).unwrap());
        assert!(Cond::Ne.holds(Value::Int(0), Value::NULL).unwrap());
        assert_eq!(Cond::Lt.holds(Value::NULL, Value::Int(0)).unwrap_err().kind, FaultKind::Malformed);
    }

    #[test]
    fn decode_immediates() {
        let code = [BIPUSH, 0xFF, ILDC, 0x01, 0x02, GOTO, 0xFF, 0xFB, VLOAD, 200];
        assert_eq!(Instruction::decode(&code, 0).unwrap(), (Instruction::Bipush(-1), 2));
        assert_eq!(Instruction::decode(&code, 2).unwrap(), (Instruction::Ildc(0x0102), 3));
        assert_eq!(Instruction::decode(&code, 5).unwrap(), (Instruction::Goto(-5), 3));
        assert_eq!(Instruction::decode(&code, 8).unwrap(), (Instruction::Vload(200), 2));
    }

    #[test]
    fn decode_branches() {
        let code = [IF_ICMPLE, 0x00, 0x06];
        assert_eq!(
            Instruction::decode(&code, 0).unwrap(),
            (Instruction::If { cond: Cond::Le, offset: 6 }, 3)
        );
    }

    #[test]
    fn unknown_opcode_names_the_byte() {
        let err = Instruction::decode(&[0xD1], 0).unwrap_err();
        assert_eq!(err.kind, FaultKind::InvalidOpcode);
        assert!(err.message.contains("0xd1"), "{}", err.message);
    }

    #[test]
    fn extension_opcodes_are_unsupported() {
        for op in [CHECKTAG, HASTAG, ADDTAG, ADDROF_STATIC, ADDROF_NATIVE, INVOKEDYNAMIC] {
            let err = Instruction::decode(&[op, 0, 0], 0).unwrap_err();
            assert_eq!(err.kind, FaultKind::InvalidOpcode);
            assert!(err.message.contains("not supported"), "{}", err.message);
        }
    }

    #[test]
    fn truncated_and_runaway() {
        assert_eq!(Instruction::decode(&[ILDC, 0], 0).unwrap_err().kind, FaultKind::Malformed);
        assert_eq!(Instruction::decode(&[NOP], 1).unwrap_err().kind, FaultKind::Malformed);
    }

    #[test]
    fn branch_targets() {
        assert_eq!(branch_target(10, -4).unwrap(), 6);
        assert_eq!(branch_target(10, 6).unwrap(), 16);
        assert_eq!(branch_target(2, -3).unwrap_err().kind, FaultKind::Malformed);
    }

    #[test]
    fn every_named_opcode_is_distinct() {
        let named: Vec<u8> = (0..=255u8).filter(|&b| name(b).is_some()).collect();
        assert_eq!(named.len(), 49);
    }
}
