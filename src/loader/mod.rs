//! Reading and writing the textual `.bc0` module format.
//!
//! A module is a stream of hex byte pairs with `#` comments. All multi-byte
//! fields are big-endian:
//!
//! ```text
//! magic           C0 C0 FF EE
//! version         u16
//! int pool        u16 count, then count × i32
//! string pool     u16 size, then size bytes
//! functions       u16 count, then per function:
//!                   u16 num_args, u16 num_vars, u16 code_length, code bytes
//! natives         u16 count, then per native:
//!                   u16 num_args, u16 function_table_index
//! ```

pub mod lexer;
mod writer;

pub use writer::write;

use crate::diagnostic::Span;
use crate::program::{Function, MAGIC, Native, Program};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("unexpected input {snippet:?}; expected a two-digit hex byte")]
    Lex { span: Span, snippet: String },
    #[error("bad magic number 0x{found:08x}, expected 0xc0c0ffee")]
    BadMagic { found: u32, span: Span },
    #[error("input ends in the middle of the {what}")]
    Truncated { what: &'static str, span: Option<Span> },
    #[error("{count} unexpected bytes after the native pool")]
    Trailing { count: usize, span: Span },
    #[error("module defines no functions")]
    NoFunctions,
}

impl LoadError {
    pub fn span(&self) -> Option<Span> {
        match self {
            LoadError::Lex { span, .. }
            | LoadError::BadMagic { span, .. }
            | LoadError::Trailing { span, .. } => Some(*span),
            LoadError::Truncated { span, .. } => *span,
            LoadError::NoFunctions => None,
        }
    }
}

/// Cursor over lexed bytes.
struct Reader {
    bytes: Vec<(u8, Span)>,
    pos: usize,
}

impl Reader {
    fn take(&mut self, n: usize, what: &'static str) -> Result<&[(u8, Span)], LoadError> {
        if self.bytes.len() - self.pos < n {
            return Err(LoadError::Truncated { what, span: self.bytes.last().map(|&(_, s)| s) });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.bytes[start..self.pos])
    }

    fn raw(&mut self, n: usize, what: &'static str) -> Result<Vec<u8>, LoadError> {
        Ok(self.take(n, what)?.iter().map(|&(b, _)| b).collect())
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, LoadError> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0].0, b[1].0]))
    }

    fn u32(&mut self, what: &'static str) -> Result<(u32, Span), LoadError> {
        let b = self.take(4, what)?;
        let span = Span::new(b[0].1.start, b[3].1.end);
        Ok((u32::from_be_bytes([b[0].0, b[1].0, b[2].0, b[3].0]), span))
    }
}

/// Parse `.bc0` text into a [`Program`].
pub fn parse(source: &str) -> Result<Program, LoadError> {
    let mut r = Reader { bytes: lexer::lex(source)?, pos: 0 };

    let (magic, span) = r.u32("magic number")?;
    if magic != MAGIC {
        return Err(LoadError::BadMagic { found: magic, span });
    }
    let version = r.u16("version")?;

    let int_count = r.u16("integer pool count")?;
    let int_pool = (0..int_count)
        .map(|_| r.u32("integer pool").map(|(v, _)| v as i32))
        .collect::<Result<Vec<_>, _>>()?;

    let string_size = r.u16("string pool size")?;
    let string_pool = r.raw(usize::from(string_size), "string pool")?;

    let function_count = r.u16("function count")?;
    if function_count == 0 {
        return Err(LoadError::NoFunctions);
    }
    let mut functions = Vec::with_capacity(usize::from(function_count));
    for _ in 0..function_count {
        let num_args = r.u16("function header")?;
        let num_vars = r.u16("function header")?;
        let code_length = r.u16("function header")?;
        let code = r.raw(usize::from(code_length), "function body")?;
        functions.push(Function { num_args, num_vars, code });
    }

    let native_count = r.u16("native count")?;
    let mut natives = Vec::with_capacity(usize::from(native_count));
    for _ in 0..native_count {
        let num_args = r.u16("native pool")?;
        let function_table_index = r.u16("native pool")?;
        natives.push(Native { num_args, function_table_index });
    }

    if let Some(&(_, first)) = r.bytes.get(r.pos) {
        let count = r.bytes.len() - r.pos;
        let last = r.bytes[r.bytes.len() - 1].1;
        return Err(LoadError::Trailing { count, span: Span::new(first.start, last.end) });
    }

    Ok(Program { version, int_pool, string_pool, functions, natives })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD: &str = "\
C0 C0 FF EE       # magic number
00 17             # version 11, arch = 1 (64 bits)

00 00             # int pool count
# int pool

00 00             # string pool total size
# string pool

00 01             # function count
# function_pool

#<main>
00 00             # number of arguments = 0
00 00             # number of local variables = 0
00 06             # code length = 6 bytes
10 05    # bipush 5
10 03    # bipush 3
60       # iadd
B0       # return

00 00             # native count
# native pool
";

    #[test]
    fn parses_minimal_module() {
        let p = parse(ADD).unwrap();
        assert_eq!(p.version, 0x17);
        assert!(p.int_pool.is_empty());
        assert_eq!(p.functions.len(), 1);
        assert_eq!(p.functions[0].code, vec![0x10, 0x05, 0x10, 0x03, 0x60, 0xB0]);
        assert!(p.natives.is_empty());
    }

    #[test]
    fn pools_and_natives() {
        let src = "C0 C0 FF EE 00 17
            00 02  FF FF FF FF  00 0F 42 40
            00 03  68 69 00
            00 01  00 01 00 02 00 01 B0
            00 01  00 01 00 06";
        let p = parse(src).unwrap();
        assert_eq!(p.int_pool, vec![-1, 1_000_000]);
        assert_eq!(p.string_pool, b"hi\0".to_vec());
        assert_eq!(p.functions[0].num_args, 1);
        assert_eq!(p.functions[0].num_vars, 2);
        assert_eq!(p.natives, vec![Native { num_args: 1, function_table_index: 6 }]);
    }

    #[test]
    fn bad_magic() {
        let err = parse("C0 C0 FF EF 00 17").unwrap_err();
        assert!(matches!(err, LoadError::BadMagic { found: 0xC0C0_FFEF, .. }));
        assert_eq!(err.span(), Some(Span::new(0, 11)));
    }

    #[test]
    fn truncated_names_the_field() {
        let err = parse("C0 C0 FF EE 00 17 00 00 00 00 00 01 00 00 00 00 00 04 10").unwrap_err();
        assert_eq!(err, LoadError::Truncated { what: "function body", span: Some(Span::new(54, 56)) });
        assert!(err.to_string().contains("function body"));
    }

    #[test]
    fn empty_input_is_truncated() {
        let err = parse("# nothing here\n").unwrap_err();
        assert!(matches!(err, LoadError::Truncated { what: "magic number", span: None }));
    }

    #[test]
    fn trailing_bytes() {
        let src = format!("{ADD}\nAA BB");
        let err = parse(&src).unwrap_err();
        assert!(matches!(err, LoadError::Trailing { count: 2, .. }));
    }

    #[test]
    fn zero_functions() {
        let err = parse("C0 C0 FF EE 00 17 00 00 00 00 00 00 00 00").unwrap_err();
        assert_eq!(err, LoadError::NoFunctions);
        assert_eq!(err.span(), None);
    }

    #[test]
    fn lex_error_surfaces() {
        let err = parse("C0 C0 FF EE xyz").unwrap_err();
        assert!(matches!(err, LoadError::Lex { .. }));
    }
}
