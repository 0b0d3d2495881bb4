use crate::opcode::*;

/// Emits instruction bytes for one function body.
///
/// Branch offsets are relative to the branch opcode, so targets are given
/// as absolute positions ([`Assembler::pos`]) and converted here.
#[derive(Debug, Default)]
pub struct Assembler {
    code: Vec<u8>,
}

impl Assembler {
    pub fn new() -> Self {
        Assembler::default()
    }

    /// Offset the next instruction will occupy.
    pub fn pos(&self) -> usize {
        self.code.len()
    }

    /// An instruction with no immediates.
    pub fn op(&mut self, op: u8) -> &mut Self {
        self.code.push(op);
        self
    }

    fn op_u8(&mut self, op: u8, imm: u8) -> &mut Self {
        self.code.extend_from_slice(&[op, imm]);
        self
    }

    fn op_u16(&mut self, op: u8, imm: u16) -> &mut Self {
        self.code.push(op);
        self.code.extend_from_slice(&imm.to_be_bytes());
        self
    }

    pub fn bipush(&mut self, n: i8) -> &mut Self {
        self.op_u8(BIPUSH, n as u8)
    }

    pub fn ildc(&mut self, index: u16) -> &mut Self {
        self.op_u16(ILDC, index)
    }

    pub fn aldc(&mut self, index: u16) -> &mut Self {
        self.op_u16(ALDC, index)
    }

    pub fn vload(&mut self, slot: u8) -> &mut Self {
        self.op_u8(VLOAD, slot)
    }

    pub fn vstore(&mut self, slot: u8) -> &mut Self {
        self.op_u8(VSTORE, slot)
    }

    pub fn invokestatic(&mut self, function: u16) -> &mut Self {
        self.op_u16(INVOKESTATIC, function)
    }

    pub fn invokenative(&mut self, native: u16) -> &mut Self {
        self.op_u16(INVOKENATIVE, native)
    }

    pub fn new_block(&mut self, size: u8) -> &mut Self {
        self.op_u8(NEW, size)
    }

    pub fn newarray(&mut self, elt_size: u8) -> &mut Self {
        self.op_u8(NEWARRAY, elt_size)
    }

    pub fn aaddf(&mut self, offset: u8) -> &mut Self {
        self.op_u8(AADDF, offset)
    }

    /// A branch or `goto` with a raw relative offset.
    pub fn branch(&mut self, op: u8, offset: i16) -> &mut Self {
        self.op_u16(op, offset as u16)
    }

    /// A branch to an already-emitted position.
    pub fn jump_to(&mut self, op: u8, target: usize) -> &mut Self {
        let offset = (target as isize - self.pos() as isize) as i16;
        self.branch(op, offset)
    }

    /// A forward branch; fill in its target later with [`Assembler::patch`].
    pub fn jump_placeholder(&mut self, op: u8) -> usize {
        let at = self.pos();
        self.branch(op, 0);
        at
    }

    /// Point the branch at `at` to the current position.
    pub fn patch(&mut self, at: usize) {
        let offset = (self.pos() as isize - at as isize) as i16;
        self.code[at + 1..at + 3].copy_from_slice(&offset.to_be_bytes());
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.code)
    }
}
