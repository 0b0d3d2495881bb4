//! End-to-end behavior of the interpreter through the library API.

use std::io;

use c0vm::asm::Assembler;
use c0vm::native::NativeTable;
use c0vm::opcode::*;
use c0vm::program::{Program, ProgramBuilder};
use c0vm::vm::{Vm, VmConfig};
use c0vm::{Fault, FaultKind};

fn exec(program: &Program) -> Result<i32, Fault> {
    let natives = NativeTable::standard();
    Vm::new(program, &natives, VmConfig::default())?
        .with_output(io::sink())
        .run()
}

/// Main pushes `left` and `right` from the int pool, applies `op`, returns.
fn binary(op: u8, left: i32, right: i32) -> Result<i32, Fault> {
    let mut b = Program::builder();
    let l = b.int(left);
    let r = b.int(right);
    b.function(0, 0, Assembler::new().ildc(l).ildc(r).op(op).op(RETURN).finish());
    exec(&b.build())
}

const SAMPLES: [i32; 9] = [0, 1, -1, 2, -7, 13, 1 << 20, i32::MAX, i32::MIN];

// ── Arithmetic ───────────────────────────────────────────────────────

#[test]
fn subtract_is_first_pushed_minus_second_pushed() {
    for a in SAMPLES {
        for b in SAMPLES {
            assert_eq!(binary(ISUB, a, b).unwrap(), a.wrapping_sub(b), "{a} - {b}");
        }
    }
    assert_eq!(binary(ISUB, 10, 3).unwrap(), 7);
}

#[test]
fn division_and_remainder_truncate_or_fault() {
    for a in SAMPLES {
        for b in SAMPLES {
            let faults = b == 0 || (a == i32::MIN && b == -1);
            for (op, expected) in [(IDIV, a.checked_div(b)), (IREM, a.checked_rem(b))] {
                match binary(op, a, b) {
                    Ok(v) => {
                        assert!(!faults, "{a} op {b} should fault");
                        assert_eq!(Some(v), expected, "{a} op {b}");
                    }
                    Err(f) => {
                        assert!(faults, "{a} op {b} faulted: {f}");
                        assert_eq!(f.kind, FaultKind::Arithmetic);
                    }
                }
            }
        }
    }
}

#[test]
fn shifts_check_their_amount() {
    for amount in [-1, 32, 33, i32::MIN] {
        assert_eq!(binary(ISHL, 1, amount).unwrap_err().kind, FaultKind::Arithmetic);
        assert_eq!(binary(ISHR, 1, amount).unwrap_err().kind, FaultKind::Arithmetic);
    }
    assert_eq!(binary(ISHL, 1, 31).unwrap(), i32::MIN);
    assert_eq!(binary(ISHR, -16, 2).unwrap(), -4);
    assert_eq!(binary(ISHR, i32::MIN, 31).unwrap(), -1);
}

// ── Arrays and null safety ───────────────────────────────────────────

fn array_program(b: &mut ProgramBuilder, count: i32, tail: &mut Assembler) {
    let n = b.int(count);
    let mut a = Assembler::new();
    a.ildc(n).newarray(4);
    let mut code = a.finish();
    code.extend(tail.finish());
    b.function(0, 0, code);
}

#[test]
fn array_length_round_trips() {
    for n in [0, 1, 2, 7, 100, 4096] {
        let mut b = Program::builder();
        array_program(&mut b, n, Assembler::new().op(ARRAYLENGTH).op(RETURN));
        assert_eq!(exec(&b.build()).unwrap(), n);
    }
}

#[test]
fn element_address_bounds() {
    let n = 5;
    let element = |index: i32| {
        let mut b = Program::builder();
        let i = b.int(index);
        array_program(&mut b, n, Assembler::new().ildc(i).op(AADDS).op(IMLOAD).op(RETURN));
        exec(&b.build())
    };
    for i in 0..n {
        assert_eq!(element(i).unwrap(), 0);
    }
    for i in [-1, n, i32::MAX] {
        assert_eq!(element(i).unwrap_err().kind, FaultKind::MemoryAccess, "index {i}");
    }
}

#[test]
fn null_reference_faults_before_access() {
    let null_ops: Vec<Vec<u8>> = vec![
        Assembler::new().op(ACONST_NULL).op(IMLOAD).op(RETURN).finish(),
        Assembler::new().op(ACONST_NULL).op(AMLOAD).op(POP).bipush(0).op(RETURN).finish(),
        Assembler::new().op(ACONST_NULL).op(CMLOAD).op(RETURN).finish(),
        Assembler::new().op(ACONST_NULL).bipush(1).op(IMSTORE).bipush(0).op(RETURN).finish(),
        Assembler::new().op(ACONST_NULL).op(ACONST_NULL).op(AMSTORE).bipush(0).op(RETURN).finish(),
        Assembler::new().op(ACONST_NULL).bipush(1).op(CMSTORE).bipush(0).op(RETURN).finish(),
        Assembler::new().op(ACONST_NULL).op(ARRAYLENGTH).op(RETURN).finish(),
        Assembler::new().op(ACONST_NULL).bipush(0).op(AADDS).op(POP).bipush(0).op(RETURN).finish(),
        Assembler::new().op(ACONST_NULL).aaddf(4).op(POP).bipush(0).op(RETURN).finish(),
    ];
    for code in null_ops {
        let mut b = Program::builder();
        b.function(0, 0, code.clone());
        let fault = exec(&b.build()).unwrap_err();
        assert_eq!(fault.kind, FaultKind::MemoryAccess, "code {code:02x?}");
    }
}

// ── Calls ────────────────────────────────────────────────────────────

#[test]
fn call_return_stack_depth_law() {
    for k in 0..=3u8 {
        let mut b = Program::builder();
        // two values below the arguments, then k arguments
        let mut main = Assembler::new();
        main.bipush(11).bipush(22);
        for i in 0..k {
            main.bipush(i as i8);
        }
        main.invokestatic(1).op(POP).op(POP).op(RETURN);
        b.function(0, 0, main.finish());
        b.function(u16::from(k), u16::from(k), Assembler::new().bipush(99).op(RETURN).finish());
        let program = b.build();
        let natives = NativeTable::new();
        let mut vm = Vm::new(&program, &natives, VmConfig::default()).unwrap();

        let pushes = 2 + usize::from(k);
        for _ in 0..pushes {
            vm.step().unwrap();
        }
        let before = vm.stack_depth();
        vm.step().unwrap(); // invokestatic
        vm.step().unwrap(); // bipush 99
        vm.step().unwrap(); // return
        assert_eq!(vm.call_depth(), 0);
        assert_eq!(vm.stack_depth(), before - usize::from(k) + 1, "k = {k}");
        // the value left by the call sits on top; popping it and one more leaves 11
        assert_eq!(vm.run().unwrap(), 11);
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn scenario_a_add() {
    let mut b = Program::builder();
    b.function(0, 0, Assembler::new().bipush(5).bipush(3).op(IADD).op(RETURN).finish());
    assert_eq!(exec(&b.build()).unwrap(), 8);
}

#[test]
fn scenario_b_divide_by_zero() {
    let mut b = Program::builder();
    b.function(0, 0, Assembler::new().bipush(1).bipush(0).op(IDIV).finish());
    let fault = exec(&b.build()).unwrap_err();
    assert_eq!(fault.kind, FaultKind::Arithmetic);
    assert_ne!(fault.exit_code(), 0);
}

#[test]
fn scenario_c_nested_call() {
    let mut b = Program::builder();
    let main = Assembler::new()
        .bipush(20)
        .bipush(22)
        .invokestatic(1)
        .bipush(1)
        .op(IADD)
        .op(RETURN)
        .finish();
    b.function(0, 0, main);
    b.function(2, 2, Assembler::new().vload(0).vload(1).op(IADD).op(RETURN).finish());
    assert_eq!(exec(&b.build()).unwrap(), 43);
}

#[test]
fn scenario_d_null_load() {
    let mut b = Program::builder();
    b.function(0, 0, Assembler::new().op(ACONST_NULL).op(IMLOAD).op(RETURN).finish());
    assert_eq!(exec(&b.build()).unwrap_err().kind, FaultKind::MemoryAccess);
}

#[test]
fn string_library_end_to_end() {
    // string_join("ab", string_fromint(12)) has length 4
    let mut b = Program::builder();
    let ab = b.string("ab");
    let fromint = b.native(1, c0vm::native::stdlib::STRING_FROMINT);
    let join = b.native(2, c0vm::native::stdlib::STRING_JOIN);
    let length = b.native(1, c0vm::native::stdlib::STRING_LENGTH);
    let code = Assembler::new()
        .aldc(ab)
        .bipush(12)
        .invokenative(fromint)
        .invokenative(join)
        .invokenative(length)
        .op(RETURN)
        .finish();
    b.function(0, 0, code);
    assert_eq!(exec(&b.build()).unwrap(), 4);
}
