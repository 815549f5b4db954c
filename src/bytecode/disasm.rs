use crate::bytecode::ir::{Ins, InstructionList};
use crate::bytecode::op::{CodeAddr, Opcode};
use crate::error::RuntimeError;

/// Sequential reader over a byte-code image (big-endian).
pub struct Reader<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Reader { code, pos: 0 }
    }

    pub fn offset(&self) -> CodeAddr {
        self.pos as CodeAddr
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.code.len()
    }

    pub fn read_u8(&mut self) -> Result<u8, RuntimeError> {
        let byte = self
            .code
            .get(self.pos)
            .copied()
            .ok_or_else(|| RuntimeError::new("unexpected end of byte code"))?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u16(&mut self) -> Result<u16, RuntimeError> {
        Ok((u16::from(self.read_u8()?) << 8) | u16::from(self.read_u8()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, RuntimeError> {
        Ok((u32::from(self.read_u16()?) << 16) | u32::from(self.read_u16()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, RuntimeError> {
        Ok((u64::from(self.read_u32()?) << 32) | u64::from(self.read_u32()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, RuntimeError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, RuntimeError> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub fn read_addr(&mut self) -> Result<CodeAddr, RuntimeError> {
        self.read_u32()
    }

    /// Reads a `u8`-length-prefixed identifier.
    pub fn read_name(&mut self) -> Result<String, RuntimeError> {
        let len = self.read_u8()? as usize;
        self.read_utf8(len)
    }

    /// Reads a `u32`-length-prefixed string.
    pub fn read_string(&mut self) -> Result<String, RuntimeError> {
        let len = self.read_u32()? as usize;
        self.read_utf8(len)
    }

    fn read_utf8(&mut self, len: usize) -> Result<String, RuntimeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.code.len())
            .ok_or_else(|| RuntimeError::new("unexpected end of byte code"))?;
        let bytes = &self.code[self.pos..end];
        self.pos = end;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| RuntimeError::new("invalid UTF-8 in byte code"))
    }
}

fn format_addr(addr: CodeAddr) -> String {
    format!("0x{addr:08X}")
}

/// Decodes a binary image back into an instruction list, pairing each
/// instruction with its byte offset. Decoding stops at (and includes)
/// the first `HALT`. Jump and `PUSH_FUNCTION` payloads come back as
/// `0x########` strings for listing display.
pub fn disassemble(code: &[u8]) -> Result<Vec<(CodeAddr, Ins)>, RuntimeError> {
    let mut reader = Reader::new(code);
    let mut out = Vec::new();
    loop {
        let addr = reader.offset();
        let byte = reader.read_u8()?;
        let op = Opcode::from_u8(byte)
            .ok_or_else(|| RuntimeError::new(format!("unknown op-code 0x{byte:02X}")))?;
        let ins = match op {
            Opcode::Halt => {
                out.push((addr, Ins::Halt));
                return Ok(out);
            }
            Opcode::Nop => Ins::Nop,
            Opcode::Print => Ins::Print,
            Opcode::OpenScope => Ins::OpenScope,
            Opcode::CloseScope => Ins::CloseScope,
            Opcode::Bind => Ins::Bind(reader.read_name()?),
            Opcode::Call => Ins::Call(reader.read_u8()?),
            Opcode::Return => Ins::Return,
            Opcode::Jump => Ins::Jump(format_addr(reader.read_addr()?)),
            Opcode::JumpTrue => Ins::JumpTrue(format_addr(reader.read_addr()?)),
            Opcode::JumpFalse => Ins::JumpFalse(format_addr(reader.read_addr()?)),
            Opcode::PopTop => Ins::PopTop,
            Opcode::PushNull => Ins::PushNull,
            Opcode::PushTrue => Ins::PushTrue,
            Opcode::PushFalse => Ins::PushFalse,
            Opcode::PushInt => Ins::PushInt(reader.read_u64()?),
            Opcode::PushFloat => Ins::PushFloat(reader.read_f64()?),
            Opcode::PushString => Ins::PushString(reader.read_string()?),
            Opcode::PushSymbol => Ins::PushSymbol(reader.read_name()?),
            Opcode::PushList => Ins::PushList(reader.read_u32()?),
            Opcode::PushDict => Ins::PushDict(reader.read_u32()?),
            Opcode::PushSlice => Ins::PushSlice,
            Opcode::PushFunction => Ins::PushFunction(format_addr(reader.read_addr()?)),
            Opcode::Index => Ins::Index,
            Opcode::Member => Ins::Member,
            Opcode::Label => {
                return Err(RuntimeError::new(
                    "label pseudo-op encountered in byte code",
                ))
            }
            other if other.is_unary() => Ins::Un(other),
            other => Ins::Bin(other),
        };
        out.push((addr, ins));
    }
}

/// Renders a disassembly as address-prefixed listing text.
pub fn listing(items: &[(CodeAddr, Ins)]) -> String {
    let mut out = String::new();
    for (addr, ins) in items {
        out.push_str(&ins.dis(*addr));
        out.push('\n');
    }
    out
}

/// Drops the addresses from a disassembly, for callers that only care
/// about the instruction sequence.
pub fn instructions(items: Vec<(CodeAddr, Ins)>) -> InstructionList {
    items.into_iter().map(|(_, ins)| ins).collect()
}
