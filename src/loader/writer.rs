use crate::opcode::{self, BIPUSH, GOTO, Instruction};
use crate::program::{MAGIC, Program};

const COMMENT_COLUMN: usize = 18;

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ")
}

fn line(out: &mut String, bytes: &[u8], comment: &str) {
    let text = hex(bytes);
    if comment.is_empty() {
        out.push_str(&text);
    } else {
        out.push_str(&format!("{text:<COMMENT_COLUMN$}# {comment}"));
    }
    out.push('\n');
}

fn is_branch(op: u8) -> bool {
    (opcode::IF_CMPEQ..=opcode::IF_ICMPLE).contains(&op) || op == GOTO
}

/// Mnemonic plus immediate for one encoded instruction.
fn describe(bytes: &[u8]) -> String {
    let op = bytes[0];
    let name = opcode::name(op).unwrap_or("?");
    match bytes {
        [_, imm] if op == BIPUSH => format!("{name} {}", *imm as i8),
        [_, imm] => format!("{name} {imm}"),
        [_, hi, lo] if is_branch(op) => format!("{name} {:+}", i16::from_be_bytes([*hi, *lo])),
        [_, hi, lo] => format!("{name} {}", u16::from_be_bytes([*hi, *lo])),
        _ => name.to_string(),
    }
}

fn disassemble(out: &mut String, code: &[u8]) {
    let mut pc = 0;
    while pc < code.len() {
        // Undecodable bytes are written one at a time so the text still
        // reproduces the module exactly.
        let width = Instruction::decode(code, pc).map_or(1, |(_, width)| width);
        let bytes = &code[pc..pc + width];
        line(out, bytes, &describe(bytes));
        pc += width;
    }
}

/// Render `program` as commented `.bc0` text that [`super::parse`] reads back.
pub fn write(program: &Program) -> String {
    let mut out = String::new();
    line(&mut out, &MAGIC.to_be_bytes(), "magic number");
    line(
        &mut out,
        &program.version.to_be_bytes(),
        &format!("version {}, arch = {}", program.version >> 1, program.version & 1),
    );

    out.push('\n');
    line(&mut out, &(program.int_pool.len() as u16).to_be_bytes(), "int pool count");
    out.push_str("# int pool\n");
    for n in &program.int_pool {
        line(&mut out, &n.to_be_bytes(), &n.to_string());
    }

    out.push('\n');
    line(&mut out, &(program.string_pool.len() as u16).to_be_bytes(), "string pool total size");
    out.push_str("# string pool\n");
    for s in program.string_pool.split_inclusive(|&b| b == 0) {
        let text = String::from_utf8_lossy(s.strip_suffix(&[0]).unwrap_or(s));
        line(&mut out, s, &format!("{text:?}"));
    }

    out.push('\n');
    line(&mut out, &(program.functions.len() as u16).to_be_bytes(), "function count");
    for (index, f) in program.functions.iter().enumerate() {
        out.push_str(&format!("\n# function {index}\n"));
        line(&mut out, &f.num_args.to_be_bytes(), &format!("number of arguments = {}", f.num_args));
        line(&mut out, &f.num_vars.to_be_bytes(), &format!("number of local variables = {}", f.num_vars));
        line(&mut out, &(f.code.len() as u16).to_be_bytes(), &format!("code length = {} bytes", f.code.len()));
        disassemble(&mut out, &f.code);
    }

    out.push('\n');
    line(&mut out, &(program.natives.len() as u16).to_be_bytes(), "native count");
    out.push_str("# native pool\n");
    for n in &program.natives {
        let mut bytes = n.num_args.to_be_bytes().to_vec();
        bytes.extend_from_slice(&n.function_table_index.to_be_bytes());
        line(&mut out, &bytes, &format!("slot {}", n.function_table_index));
    }
    out
}
