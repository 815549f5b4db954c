use std::collections::HashMap;

use crate::bytecode::ir::{Ins, InstructionList};
use crate::bytecode::op::CodeAddr;
use crate::error::RuntimeError;

/// Resolved label name → byte offset mapping, populated during the
/// assembler's first pass.
pub type LabelMap = HashMap<String, CodeAddr>;

/// Growable big-endian byte-code output buffer.
#[derive(Debug, Default, Clone)]
pub struct CodeBuffer {
    buf: Vec<u8>,
}

impl CodeBuffer {
    pub fn new() -> Self {
        CodeBuffer { buf: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_f32(&mut self, v: f32) {
        self.put_u32(v.to_bits());
    }

    pub fn put_f64(&mut self, v: f64) {
        self.put_u64(v.to_bits());
    }

    pub fn put_addr(&mut self, v: CodeAddr) {
        self.put_u32(v);
    }

    /// Writes a length-prefixed identifier (`u8` length). Identifiers
    /// longer than 255 bytes do not fit the wire format.
    pub fn put_ident(&mut self, v: &str) -> Result<(), RuntimeError> {
        if v.len() > u8::MAX as usize {
            return Err(RuntimeError::new(format!(
                "identifier '{}...' exceeds 255 bytes",
                &v[..16.min(v.len())]
            )));
        }
        self.put_u8(v.len() as u8);
        self.buf.extend_from_slice(v.as_bytes());
        Ok(())
    }

    /// Writes a length-prefixed string (`u32` length).
    pub fn put_string(&mut self, v: &str) {
        self.put_u32(v.len() as u32);
        self.buf.extend_from_slice(v.as_bytes());
    }
}

/// Assembles a lowered instruction list into a binary byte-code image.
///
/// Pass 1 resolves labels to byte offsets and drops them; pass 2 encodes
/// the surviving instructions, substituting resolved offsets for
/// symbolic jump and `PUSH_FUNCTION` payloads.
pub fn assemble(ops: &InstructionList) -> Result<Vec<u8>, RuntimeError> {
    let mut labels = LabelMap::new();
    let mut survivors: Vec<&Ins> = Vec::with_capacity(ops.len());
    let mut offset: CodeAddr = 0;

    for op in ops {
        if let Ins::Label(name) = op {
            if labels.insert(name.clone(), offset).is_some() {
                return Err(RuntimeError::new(format!(
                    "multiple labels named '{name}'"
                )));
            }
        } else {
            offset += op.size();
            survivors.push(op);
        }
    }

    let mut buf = CodeBuffer::new();
    for op in survivors {
        encode(op, &mut buf, &labels)?;
    }
    Ok(buf.into_vec())
}

fn resolve(labels: &LabelMap, name: &str) -> Result<CodeAddr, RuntimeError> {
    labels
        .get(name)
        .copied()
        .ok_or_else(|| RuntimeError::new(format!("unresolved label '{name}'")))
}

fn encode(op: &Ins, buf: &mut CodeBuffer, labels: &LabelMap) -> Result<(), RuntimeError> {
    use Ins::*;
    buf.put_u8(op.opcode() as u8);
    match op {
        Label(_) => {
            return Err(RuntimeError::new("cannot generate code for labels"));
        }
        Bind(name) | PushSymbol(name) => buf.put_ident(name)?,
        Call(argc) => buf.put_u8(*argc),
        Jump(label) | JumpTrue(label) | JumpFalse(label) | PushFunction(label) => {
            buf.put_addr(resolve(labels, label)?);
        }
        PushInt(value) => buf.put_u64(*value),
        PushFloat(value) => buf.put_f64(*value),
        PushString(value) => buf.put_string(value),
        PushList(len) | PushDict(len) => buf.put_u32(*len),
        _ => {}
    }
    Ok(())
}

/// Renders an instruction list as an assembler-side listing (labels kept,
/// payloads symbolic).
pub fn listing(ops: &InstructionList) -> String {
    let mut out = String::new();
    for op in ops {
        out.push_str(&op.list());
        out.push('\n');
    }
    out
}
