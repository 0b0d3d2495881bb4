//! An interpreter for C0 bytecode modules.
//!
//! Load a module with [`loader::parse`] (or assemble one with
//! [`program::ProgramBuilder`]), then execute it with [`vm::Vm`]:
//!
//! ```no_run
//! let source = std::fs::read_to_string("prog.bc0").unwrap();
//! let program = c0vm::loader::parse(&source).unwrap();
//! let natives = c0vm::native::NativeTable::standard();
//! let result = c0vm::vm::run(&program, &natives);
//! ```

pub mod asm;
pub mod diagnostic;
pub mod fault;
pub mod heap;
pub mod loader;
pub mod native;
pub mod opcode;
pub mod program;
pub mod value;
pub mod vm;

pub use fault::{Fault, FaultKind};
pub use program::Program;
pub use value::Value;
