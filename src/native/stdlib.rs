//! Bundled host library: console output and string helpers.
//!
//! Strings are references to NUL-terminated bytes; null reads as "".
//! Routines with no meaningful result return integer 0.

use std::cmp::Ordering;

use super::{NativeContext, NativeFn};
use crate::fault::Fault;
use crate::value::{Pointer, Value};

pub const PRINT: u16 = 0;
pub const PRINTLN: u16 = 1;
pub const PRINTINT: u16 = 2;
pub const PRINTBOOL: u16 = 3;
pub const PRINTCHAR: u16 = 4;
pub const FLUSH: u16 = 5;
pub const STRING_LENGTH: u16 = 6;
pub const STRING_CHARAT: u16 = 7;
pub const STRING_JOIN: u16 = 8;
pub const STRING_SUB: u16 = 9;
pub const STRING_EQUAL: u16 = 10;
pub const STRING_COMPARE: u16 = 11;
pub const STRING_FROMINT: u16 = 12;
pub const STRING_FROMBOOL: u16 = 13;
pub const STRING_FROMCHAR: u16 = 14;
pub const CHAR_ORD: u16 = 15;
pub const CHAR_CHR: u16 = 16;
pub const STRING_TO_CHARARRAY: u16 = 17;
pub const STRING_FROM_CHARARRAY: u16 = 18;

/// Indexed by slot number.
pub static ROUTINES: &[(&str, NativeFn)] = &[
    ("print", print),
    ("println", println),
    ("printint", printint),
    ("printbool", printbool),
    ("printchar", printchar),
    ("flush", flush),
    ("string_length", string_length),
    ("string_charat", string_charat),
    ("string_join", string_join),
    ("string_sub", string_sub),
    ("string_equal", string_equal),
    ("string_compare", string_compare),
    ("string_fromint", string_fromint),
    ("string_frombool", string_frombool),
    ("string_fromchar", string_fromchar),
    ("char_ord", char_ord),
    ("char_chr", char_chr),
    ("string_to_chararray", string_to_chararray),
    ("string_from_chararray", string_from_chararray),
];

// ── Argument access ──────────────────────────────────────────────────

fn arg(args: &[Value], i: usize) -> Result<Value, Fault> {
    args.get(i)
        .copied()
        .ok_or_else(|| Fault::malformed(format!("native called with {} arguments, needs {}", args.len(), i + 1)))
}

fn int_arg(args: &[Value], i: usize) -> Result<i32, Fault> {
    arg(args, i)?.to_int()
}

fn ref_arg(args: &[Value], i: usize) -> Result<Option<Pointer>, Fault> {
    arg(args, i)?.to_ref()
}

fn string_arg(ctx: &NativeContext<'_>, args: &[Value], i: usize) -> Result<Vec<u8>, Fault> {
    ctx.heap.read_c_string(ref_arg(args, i)?)
}

fn new_string(ctx: &mut NativeContext<'_>, bytes: &[u8]) -> Result<Value, Fault> {
    Ok(Value::ptr(ctx.heap.alloc_string(bytes)?))
}

fn len_i32(len: usize) -> Result<i32, Fault> {
    i32::try_from(len).map_err(|_| Fault::memory("string too long"))
}

// ── Console ──────────────────────────────────────────────────────────

fn print(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let s = string_arg(ctx, args, 0)?;
    ctx.emit(&s)?;
    Ok(Value::Int(0))
}

fn println(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let mut s = string_arg(ctx, args, 0)?;
    s.push(b'\n');
    ctx.emit(&s)?;
    Ok(Value::Int(0))
}

fn printint(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let n = int_arg(args, 0)?;
    ctx.emit(n.to_string().as_bytes())?;
    Ok(Value::Int(0))
}

fn printbool(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let b = int_arg(args, 0)? != 0;
    ctx.emit(if b { &b"true"[..] } else { &b"false"[..] })?;
    Ok(Value::Int(0))
}

fn printchar(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let c = int_arg(args, 0)?;
    ctx.emit(&[c as u8])?;
    Ok(Value::Int(0))
}

fn flush(ctx: &mut NativeContext<'_>, _args: &[Value]) -> Result<Value, Fault> {
    ctx.out.flush().map_err(|e| Fault::user(format!("flush failed: {e}")))?;
    Ok(Value::Int(0))
}

// ── Strings ──────────────────────────────────────────────────────────

fn string_length(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let s = string_arg(ctx, args, 0)?;
    Ok(Value::Int(len_i32(s.len())?))
}

fn string_charat(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let s = string_arg(ctx, args, 0)?;
    let i = int_arg(args, 1)?;
    usize::try_from(i)
        .ok()
        .and_then(|i| s.get(i))
        .map(|&c| Value::Int(i32::from(c as i8)))
        .ok_or_else(|| Fault::memory(format!("string_charat: index {i} out of bounds for length {}", s.len())))
}

fn string_join(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let mut a = string_arg(ctx, args, 0)?;
    let b = string_arg(ctx, args, 1)?;
    a.extend_from_slice(&b);
    new_string(ctx, &a)
}

fn string_sub(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let s = string_arg(ctx, args, 0)?;
    let (start, end) = (int_arg(args, 1)?, int_arg(args, 2)?);
    let range = usize::try_from(start)
        .ok()
        .zip(usize::try_from(end).ok())
        .filter(|&(lo, hi)| lo <= hi && hi <= s.len())
        .ok_or_else(|| {
            Fault::memory(format!("string_sub: range {start}..{end} out of bounds for length {}", s.len()))
        })?;
    new_string(ctx, &s[range.0..range.1])
}

fn string_equal(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let a = string_arg(ctx, args, 0)?;
    let b = string_arg(ctx, args, 1)?;
    Ok(Value::Int(i32::from(a == b)))
}

fn string_compare(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let a = string_arg(ctx, args, 0)?;
    let b = string_arg(ctx, args, 1)?;
    Ok(Value::Int(match a.cmp(&b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }))
}

fn string_fromint(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let n = int_arg(args, 0)?;
    new_string(ctx, n.to_string().as_bytes())
}

fn string_frombool(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let b = int_arg(args, 0)? != 0;
    new_string(ctx, if b { &b"true"[..] } else { &b"false"[..] })
}

fn string_fromchar(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let c = int_arg(args, 0)?;
    new_string(ctx, &[(c & 0x7f) as u8])
}

fn char_ord(_ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    Ok(Value::Int(int_arg(args, 0)?))
}

fn char_chr(_ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let n = int_arg(args, 0)?;
    if (0..=127).contains(&n) {
        Ok(Value::Int(n))
    } else {
        Err(Fault::user(format!("char_chr: {n} is not an ASCII code")))
    }
}

/// Array of element size 1 holding the string and its terminator.
fn string_to_chararray(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let s = string_arg(ctx, args, 0)?;
    let array = ctx.heap.alloc_array(len_i32(s.len() + 1)?, 1)?;
    for (i, &c) in s.iter().enumerate() {
        let slot = ctx.heap.element_address(Some(array), len_i32(i)?)?;
        ctx.heap.store_byte(Some(slot), i32::from(c))?;
    }
    Ok(Value::ptr(array))
}

fn string_from_chararray(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let array = ref_arg(args, 0)?;
    let count = ctx.heap.array_length(array)?;
    let mut bytes = Vec::new();
    for i in 0..count {
        let slot = ctx.heap.element_address(array, i)?;
        match ctx.heap.load_byte(Some(slot))? {
            0 => break,
            c => bytes.push(c as u8),
        }
    }
    new_string(ctx, &bytes)
}
