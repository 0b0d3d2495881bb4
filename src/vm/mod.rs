//! The interpreter loop.
//!
//! One [`Vm`] runs one program to completion. The live activation (operand
//! stack, function, pc, locals) sits in registers on the `Vm`; callers are
//! parked on `call_stack` by `invokestatic` and restored by `return`.

mod frame;

pub use frame::OperandStack;

use std::io::{self, Write};
use std::mem;

use crate::fault::{Fault, Location};
use crate::heap::Heap;
use crate::native::{NativeContext, NativeTable};
use crate::opcode::{self, Instruction};
use crate::program::Program;
use crate::value::{ObjectId, Pointer, Value};
use frame::Frame;

/// Per-run knobs. `Default` runs function 0 with no trace and no depth cap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmConfig {
    /// Index of the function to start in.
    pub entry: u16,
    /// Print one line per executed instruction to stderr.
    pub trace: bool,
    /// Suspended frames allowed before `invokestatic` faults.
    pub max_call_depth: Option<usize>,
}

/// Outcome of a single [`Vm::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Running,
    Finished(i32),
}

pub struct Vm<'p> {
    program: &'p Program,
    natives: &'p NativeTable,
    config: VmConfig,
    heap: Heap,
    /// The string pool, copied to the heap so `aldc` yields ordinary pointers.
    strings: ObjectId,
    out: Box<dyn Write + 'p>,

    stack: OperandStack,
    function: u16,
    code: &'p [u8],
    pc: usize,
    locals: Vec<Value>,
    call_stack: Vec<Frame<'p>>,
}

/// Run `program` from function 0 with default settings, natives writing to stdout.
pub fn run(program: &Program, natives: &NativeTable) -> Result<i32, Fault> {
    Vm::new(program, natives, VmConfig::default())?.run()
}

impl<'p> Vm<'p> {
    pub fn new(program: &'p Program, natives: &'p NativeTable, config: VmConfig) -> Result<Self, Fault> {
        let entry = program.function(config.entry)?;
        let mut heap = Heap::new();
        let strings = heap.alloc_bytes(program.string_pool.clone())?.object;
        Ok(Vm {
            program,
            natives,
            heap,
            strings,
            out: Box::new(io::stdout()),
            stack: OperandStack::new(),
            function: config.entry,
            code: &entry.code,
            pc: 0,
            locals: vec![Value::default(); usize::from(entry.num_vars)],
            call_stack: Vec::new(),
            config,
        })
    }

    /// Send native output somewhere other than stdout.
    pub fn with_output(mut self, out: impl Write + 'p) -> Self {
        self.out = Box::new(out);
        self
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Number of suspended callers.
    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    /// Values on the current activation's operand stack.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn function(&self) -> u16 {
        self.function
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Execute until the outermost function returns.
    pub fn run(&mut self) -> Result<i32, Fault> {
        let outcome = self.run_to_completion();
        // output produced before a fault still belongs to the run
        let flushed = self.out.flush();
        let result = outcome?;
        flushed.map_err(|e| Fault::user(format!("write failed: {e}")))?;
        Ok(result)
    }

    fn run_to_completion(&mut self) -> Result<i32, Fault> {
        loop {
            if let Step::Finished(result) = self.step()? {
                return Ok(result);
            }
        }
    }

    /// Execute one instruction. Faults carry the location of that instruction.
    pub fn step(&mut self) -> Result<Step, Fault> {
        let location = Location {
            function: self.function,
            pc: self.pc,
            depth: self.call_stack.len(),
        };
        self.execute().map_err(|fault| fault.at(location))
    }

    fn execute(&mut self) -> Result<Step, Fault> {
        let program = self.program;
        let code = self.code;
        let pc = self.pc;
        let (instruction, width) = Instruction::decode(code, pc)?;
        if self.config.trace {
            eprintln!("opcode 0x{:02x} -- stack size {} -- pc {}", code[pc], self.stack.len(), pc);
        }
        self.pc = pc + width;

        match instruction {
            Instruction::Nop => {}

            // ── Constants and locals ─────────────────────────────────────
            Instruction::AconstNull => self.stack.push(Value::NULL),
            Instruction::Bipush(n) => self.stack.push(Value::Int(i32::from(n))),
            Instruction::Ildc(index) => self.stack.push(Value::Int(program.int_constant(index)?)),
            Instruction::Aldc(index) => {
                let offset = program.string_offset(index)?;
                self.stack.push(Value::ptr(Pointer::new(self.strings, offset)));
            }
            Instruction::Vload(slot) => {
                let value = *self.local(slot)?;
                self.stack.push(value);
            }
            Instruction::Vstore(slot) => {
                let value = self.stack.pop()?;
                *self.local(slot)? = value;
            }

            // ── Stack shuffling ──────────────────────────────────────────
            Instruction::Pop => {
                self.stack.pop()?;
            }
            Instruction::Dup => {
                let v = self.stack.pop()?;
                self.stack.push(v);
                self.stack.push(v);
            }
            Instruction::Swap => {
                let top = self.stack.pop()?;
                let below = self.stack.pop()?;
                self.stack.push(top);
                self.stack.push(below);
            }

            // ── Arithmetic ───────────────────────────────────────────────
            Instruction::Arith(op) => {
                let right = self.stack.pop_int()?;
                let left = self.stack.pop_int()?;
                self.stack.push(Value::Int(op.apply(left, right)?));
            }

            // ── Control flow ─────────────────────────────────────────────
            Instruction::If { cond, offset } => {
                let right = self.stack.pop()?;
                let left = self.stack.pop()?;
                if cond.holds(left, right)? {
                    self.pc = opcode::branch_target(pc, offset)?;
                }
            }
            Instruction::Goto(offset) => self.pc = opcode::branch_target(pc, offset)?,
            Instruction::Athrow => {
                let message = self.stack.pop_ref()?;
                let text = self.heap.read_c_string(message)?;
                return Err(Fault::user(String::from_utf8_lossy(&text)));
            }
            Instruction::Assert => {
                let message = self.stack.pop_ref()?;
                let condition = self.stack.pop_int()?;
                if condition == 0 {
                    let text = self.heap.read_c_string(message)?;
                    return Err(Fault::assertion(String::from_utf8_lossy(&text)));
                }
            }

            // ── Calls ────────────────────────────────────────────────────
            Instruction::InvokeStatic(index) => self.invoke(index)?,
            Instruction::InvokeNative(index) => self.invoke_native(index)?,
            Instruction::Return => return self.ret(),

            // ── Memory ───────────────────────────────────────────────────
            Instruction::New(size) => {
                let p = self.heap.alloc_block(usize::from(size))?;
                self.stack.push(Value::ptr(p));
            }
            Instruction::NewArray(elt_size) => {
                let count = self.stack.pop_int()?;
                let p = self.heap.alloc_array(count, u32::from(elt_size))?;
                self.stack.push(Value::ptr(p));
            }
            Instruction::ArrayLength => {
                let array = self.stack.pop_ref()?;
                let length = self.heap.array_length(array)?;
                self.stack.push(Value::Int(length));
            }
            Instruction::Aaddf(offset) => {
                let base = self.stack.pop_ref()?;
                let p = self.heap.field_address(base, offset)?;
                self.stack.push(Value::ptr(p));
            }
            Instruction::Aadds => {
                let index = self.stack.pop_int()?;
                let array = self.stack.pop_ref()?;
                let p = self.heap.element_address(array, index)?;
                self.stack.push(Value::ptr(p));
            }
            Instruction::Imload => {
                let target = self.stack.pop_ref()?;
                self.stack.push(Value::Int(self.heap.load_int(target)?));
            }
            Instruction::Imstore => {
                let value = self.stack.pop_int()?;
                let target = self.stack.pop_ref()?;
                self.heap.store_int(target, value)?;
            }
            Instruction::Amload => {
                let target = self.stack.pop_ref()?;
                self.stack.push(Value::Ref(self.heap.load_ref(target)?));
            }
            Instruction::Amstore => {
                let value = self.stack.pop_ref()?;
                let target = self.stack.pop_ref()?;
                self.heap.store_ref(target, value)?;
            }
            Instruction::Cmload => {
                let target = self.stack.pop_ref()?;
                self.stack.push(Value::Int(self.heap.load_byte(target)?));
            }
            Instruction::Cmstore => {
                let value = self.stack.pop_int()?;
                let target = self.stack.pop_ref()?;
                self.heap.store_byte(target, value)?;
            }
        }
        Ok(Step::Running)
    }

    fn local(&mut self, slot: u8) -> Result<&mut Value, Fault> {
        let count = self.locals.len();
        self.locals.get_mut(usize::from(slot)).ok_or_else(|| {
            Fault::malformed(format!("local {slot} out of range for {count} slots"))
        })
    }

    fn invoke(&mut self, index: u16) -> Result<(), Fault> {
        let program = self.program;
        let callee = program.function(index)?;
        if let Some(max) = self.config.max_call_depth {
            if self.call_stack.len() >= max {
                return Err(Fault::memory(format!("call stack exhausted at depth {max}")));
            }
        }
        let num_args = usize::from(callee.num_args);
        let mut locals = vec![Value::default(); usize::from(callee.num_vars)];
        if num_args > locals.len() {
            return Err(Fault::malformed(format!(
                "function {index} takes {num_args} arguments but has {} locals",
                locals.len()
            )));
        }
        // last argument is on top
        for slot in locals[..num_args].iter_mut().rev() {
            *slot = self.stack.pop()?;
        }

        self.call_stack.push(Frame {
            stack: mem::take(&mut self.stack),
            function: self.function,
            code: self.code,
            pc: self.pc,
            locals: mem::replace(&mut self.locals, locals),
        });
        self.function = index;
        self.code = &callee.code;
        self.pc = 0;
        Ok(())
    }

    fn invoke_native(&mut self, index: u16) -> Result<(), Fault> {
        let natives = self.natives;
        let native = self.program.native(index)?;
        let entry = natives.lookup(native.function_table_index)?;
        let mut args = vec![Value::default(); usize::from(native.num_args)];
        for slot in args.iter_mut().rev() {
            *slot = self.stack.pop()?;
        }
        let mut ctx = NativeContext { heap: &mut self.heap, out: &mut *self.out };
        let result = (entry.func)(&mut ctx, &args)?;
        self.stack.push(result);
        Ok(())
    }

    fn ret(&mut self) -> Result<Step, Fault> {
        let result = self.stack.pop()?;
        if !self.stack.is_empty() {
            return Err(Fault::malformed(format!(
                "{} values left on the operand stack at return",
                self.stack.len()
            )));
        }
        let Some(caller) = self.call_stack.pop() else {
            return Ok(Step::Finished(result.to_int()?));
        };
        self.stack = caller.stack;
        self.function = caller.function;
        self.code = caller.code;
        self.pc = caller.pc;
        self.locals = caller.locals;
        self.stack.push(result);
        Ok(Step::Running)
    }
}
