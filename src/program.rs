use serde::Serialize;

use crate::fault::Fault;

/// Magic number at the start of every module.
pub const MAGIC: u32 = 0xC0C0_FFEE;

/// Module version word written by [`ProgramBuilder`]: version 11 on a 64-bit target.
pub const DEFAULT_VERSION: u16 = (11 << 1) | 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Function {
    pub num_args: u16,
    pub num_vars: u16,
    pub code: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Native {
    pub num_args: u16,
    pub function_table_index: u16,
}

/// A loaded bytecode module. Read-only for the whole run and shared by all
/// frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Program {
    pub version: u16,
    pub int_pool: Vec<i32>,
    /// Concatenated NUL-terminated strings; `aldc` indexes bytes.
    pub string_pool: Vec<u8>,
    pub functions: Vec<Function>,
    pub natives: Vec<Native>,
}

impl Program {
    pub fn builder() -> ProgramBuilder {
        ProgramBuilder::default()
    }

    pub fn function(&self, index: u16) -> Result<&Function, Fault> {
        self.functions
            .get(index as usize)
            .ok_or_else(|| Fault::malformed(format!("function index {index} out of range")))
    }

    pub fn native(&self, index: u16) -> Result<Native, Fault> {
        self.natives
            .get(index as usize)
            .copied()
            .ok_or_else(|| Fault::malformed(format!("native index {index} out of range")))
    }

    pub fn int_constant(&self, index: u16) -> Result<i32, Fault> {
        self.int_pool
            .get(index as usize)
            .copied()
            .ok_or_else(|| Fault::malformed(format!("integer constant {index} out of range")))
    }

    /// Checks an `aldc` index against the string pool.
    pub fn string_offset(&self, index: u16) -> Result<u32, Fault> {
        if (index as usize) < self.string_pool.len() {
            Ok(u32::from(index))
        } else {
            Err(Fault::malformed(format!("string constant {index} out of range")))
        }
    }
}

// ── Builder ──────────────────────────────────────────────────────────

/// Assembles a [`Program`] in memory; used by hosts and tests that do not
/// start from a `.bc0` file.
#[derive(Debug)]
pub struct ProgramBuilder {
    program: Program,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        ProgramBuilder {
            program: Program {
                version: DEFAULT_VERSION,
                int_pool: Vec::new(),
                string_pool: Vec::new(),
                functions: Vec::new(),
                natives: Vec::new(),
            },
        }
    }
}

impl ProgramBuilder {
    /// Add an integer constant and return its `ildc` index.
    pub fn int(&mut self, value: i32) -> u16 {
        self.program.int_pool.push(value);
        (self.program.int_pool.len() - 1) as u16
    }

    /// Add a string constant and return its `aldc` index.
    pub fn string(&mut self, s: &str) -> u16 {
        let offset = self.program.string_pool.len() as u16;
        self.program.string_pool.extend_from_slice(s.as_bytes());
        self.program.string_pool.push(0);
        offset
    }

    /// Add a function and return its `invokestatic` index. The first
    /// function added is the default entry point.
    pub fn function(&mut self, num_args: u16, num_vars: u16, code: Vec<u8>) -> u16 {
        self.program.functions.push(Function { num_args, num_vars, code });
        (self.program.functions.len() - 1) as u16
    }

    /// Add a native descriptor and return its `invokenative` index.
    pub fn native(&mut self, num_args: u16, function_table_index: u16) -> u16 {
        self.program.natives.push(Native { num_args, function_table_index });
        (self.program.natives.len() - 1) as u16
    }

    pub fn build(self) -> Program {
        self.program
    }
}
