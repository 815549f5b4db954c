use std::io::{self, Write};

use crate::bytecode::op::{CodeAddr, Opcode};
use crate::error::RuntimeError;
use crate::runtime::value::{self, Heap, Value, ValueId};

/// Exit code reported when execution stops because the machine was
/// paused rather than halted.
pub const EXIT_PAUSED: i32 = -1;

/// The Pop virtual machine: a single fetch-decode-execute loop over a
/// byte-code image, an operand stack of value references, a call-return
/// stack of saved instruction pointers, and a chain of lexical
/// environments rooted in `env`.
pub struct Vm {
    code: Vec<u8>,
    ip: CodeAddr,
    stack: Vec<ValueId>,
    return_stack: Vec<CodeAddr>,
    heap: Heap,
    env: ValueId,
    running: bool,
    paused: bool,
    exit_code: i32,
    out: Box<dyn Write>,
}

impl Vm {
    pub fn new(code: Vec<u8>) -> Self {
        Self::with_output(code, Box::new(io::stdout()))
    }

    /// Builds a VM whose `PRINT` output goes to the given sink.
    pub fn with_output(code: Vec<u8>, out: Box<dyn Write>) -> Self {
        let mut heap = Heap::new();
        let env = heap.new_env(None);
        Vm {
            code,
            ip: 0,
            stack: Vec::new(),
            return_stack: Vec::new(),
            heap,
            env,
            running: false,
            paused: false,
            exit_code: 0,
            out,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Number of values currently on the operand stack.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    // ─────────────────────────── Machine control ────────────────────────

    /// Runs until `HALT`, a runtime error, or a pause. The instruction
    /// pointer is not reset, so calling again after [`Vm::resume`]
    /// continues where the pause left off.
    pub fn execute(&mut self) -> Result<i32, RuntimeError> {
        self.running = true;
        self.paused = false;
        self.exit_code = 0;

        while self.running && !self.paused {
            self.step()?;
        }
        if self.paused {
            self.exit_code = EXIT_PAUSED;
        }
        Ok(self.exit_code)
    }

    /// Requests a cooperative pause; the loop checks the flag between
    /// instructions and reports `EXIT_PAUSED`.
    pub fn pause(&mut self) {
        if self.running && !self.paused {
            self.paused = true;
        }
        self.exit_code = EXIT_PAUSED;
    }

    /// Clears the paused flag; the caller must re-invoke `execute`.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
        }
    }

    /// Stops the machine with the given exit code.
    pub fn exit(&mut self, exit_code: i32) {
        if self.running {
            self.exit_code = exit_code;
            self.running = false;
            self.paused = false;
        }
    }

    // ──────────────────────────── Decoding ───────────────────────────────

    fn fetch_u8(&mut self) -> Result<u8, RuntimeError> {
        let byte = self
            .code
            .get(self.ip as usize)
            .copied()
            .ok_or_else(|| RuntimeError::new("instruction pointer ran off the byte code"))?;
        self.ip += 1;
        Ok(byte)
    }

    fn fetch_u32(&mut self) -> Result<u32, RuntimeError> {
        let mut value = 0u32;
        for _ in 0..4 {
            value = (value << 8) | u32::from(self.fetch_u8()?);
        }
        Ok(value)
    }

    fn fetch_u64(&mut self) -> Result<u64, RuntimeError> {
        let mut value = 0u64;
        for _ in 0..8 {
            value = (value << 8) | u64::from(self.fetch_u8()?);
        }
        Ok(value)
    }

    fn fetch_addr(&mut self) -> Result<CodeAddr, RuntimeError> {
        self.fetch_u32()
    }

    fn fetch_f64(&mut self) -> Result<f64, RuntimeError> {
        Ok(f64::from_bits(self.fetch_u64()?))
    }

    fn fetch_name(&mut self) -> Result<String, RuntimeError> {
        let len = self.fetch_u8()? as usize;
        self.fetch_utf8(len)
    }

    fn fetch_string(&mut self) -> Result<String, RuntimeError> {
        let len = self.fetch_u32()? as usize;
        self.fetch_utf8(len)
    }

    fn fetch_utf8(&mut self, len: usize) -> Result<String, RuntimeError> {
        let start = self.ip as usize;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.code.len())
            .ok_or_else(|| RuntimeError::new("instruction pointer ran off the byte code"))?;
        let text = std::str::from_utf8(&self.code[start..end])
            .map_err(|_| RuntimeError::new("invalid UTF-8 in byte code"))?
            .to_string();
        self.ip = end as CodeAddr;
        Ok(text)
    }

    // ──────────────────────────── Execution ──────────────────────────────

    fn pop(&mut self) -> Result<ValueId, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::new("operand stack underflow"))
    }

    fn push_new(&mut self, value: Value) {
        let id = self.heap.alloc(value);
        self.stack.push(id);
    }

    fn binop(
        &mut self,
        op: fn(&mut Heap, ValueId, ValueId) -> Result<ValueId, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let left = self.pop()?;
        let right = self.pop()?;
        let result = op(&mut self.heap, left, right)?;
        self.stack.push(result);
        Ok(())
    }

    fn unop(
        &mut self,
        op: fn(&mut Heap, ValueId) -> Result<ValueId, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let operand = self.pop()?;
        let result = op(&mut self.heap, operand)?;
        self.stack.push(result);
        Ok(())
    }

    /// One fetch-decode-execute iteration.
    pub fn step(&mut self) -> Result<(), RuntimeError> {
        let byte = self.fetch_u8()?;
        let op = Opcode::from_u8(byte)
            .filter(|op| *op != Opcode::Label)
            .ok_or_else(|| RuntimeError::new(format!("unknown op-code 0x{byte:02X}")))?;

        match op {
            Opcode::Halt => self.running = false,
            Opcode::Nop => {}
            Opcode::Print => {
                let id = self.pop()?;
                let text = value::repr(&self.heap, id);
                writeln!(self.out, "{text}")
                    .map_err(|e| RuntimeError::new(format!("failed to write output: {e}")))?;
            }

            Opcode::OpenScope => {
                let parent = self.env;
                self.env = self.heap.new_env(Some(parent));
            }
            Opcode::CloseScope => {
                self.env = self
                    .heap
                    .env_parent(self.env)
                    .ok_or_else(|| RuntimeError::new("cannot close the root scope"))?;
            }
            Opcode::Bind => {
                let name = self.fetch_name()?;
                let id = self.pop()?;
                self.heap.env_define(self.env, &name, id);
            }

            Opcode::Call => {
                let _argc = self.fetch_u8()?; // arguments stay on the operand stack
                let callee = self.pop()?;
                match self.heap.get(callee) {
                    Value::Function { addr, .. } => {
                        let addr = *addr;
                        self.return_stack.push(self.ip);
                        self.ip = addr;
                    }
                    other => {
                        return Err(RuntimeError::new(format!(
                            "value of type '{}' is not callable at '0x{:08X}'",
                            other.type_name(),
                            self.ip
                        )))
                    }
                }
            }
            Opcode::Return => {
                self.ip = self
                    .return_stack
                    .pop()
                    .ok_or_else(|| RuntimeError::new("return with an empty call stack"))?;
            }
            Opcode::Jump => {
                self.ip = self.fetch_addr()?;
            }
            Opcode::JumpTrue => {
                let addr = self.fetch_addr()?;
                let id = self.pop()?;
                if self.heap.get(id).truthy() {
                    self.ip = addr;
                }
            }
            Opcode::JumpFalse => {
                let addr = self.fetch_addr()?;
                let id = self.pop()?;
                if self.heap.get(id).falsy() {
                    self.ip = addr;
                }
            }

            Opcode::PopTop => {
                self.pop()?;
            }
            Opcode::PushNull => self.push_new(Value::Null),
            Opcode::PushTrue => self.push_new(Value::Bool(true)),
            Opcode::PushFalse => self.push_new(Value::Bool(false)),
            Opcode::PushInt => {
                let raw = self.fetch_u64()?;
                self.push_new(Value::Int(raw as i64));
            }
            Opcode::PushFloat => {
                let raw = self.fetch_f64()?;
                self.push_new(Value::Float(raw));
            }
            Opcode::PushString => {
                let text = self.fetch_string()?;
                self.push_new(Value::Str(text));
            }
            Opcode::PushSymbol => {
                let name = self.fetch_name()?;
                let id = self
                    .heap
                    .env_lookup(self.env, &name, true)
                    .ok_or_else(|| RuntimeError::new(format!("unbound symbol '{name}'")))?;
                self.stack.push(id);
            }
            Opcode::PushList => {
                let len = self.fetch_u32()? as usize;
                let mut elements = Vec::with_capacity(len);
                for _ in 0..len {
                    elements.push(self.pop()?);
                }
                self.push_new(Value::List(elements));
            }
            Opcode::PushDict => {
                let len = self.fetch_u32()? as usize;
                let mut dict = value::Dict::new();
                for _ in 0..len {
                    let key = self.pop()?;
                    let val = self.pop()?;
                    let hash = value::hash_key(&self.heap, key)?;
                    dict.insert(hash, key, val);
                }
                self.push_new(Value::Dict(dict));
            }
            Opcode::PushSlice => {
                let start = self.pop()?;
                let stop = self.pop()?;
                let step = self.pop()?;
                self.push_new(Value::Slice { start, stop, step });
            }
            Opcode::PushFunction => {
                let addr = self.fetch_addr()?;
                let env = self.env;
                self.push_new(Value::Function { addr, env });
            }

            Opcode::Index => self.exec_index()?,
            Opcode::Member => self.exec_member()?,

            Opcode::Add => self.binop(value::add)?,
            Opcode::Sub => self.binop(value::sub)?,
            Opcode::Mul => self.binop(value::mul)?,
            Opcode::Div => self.binop(value::div)?,
            Opcode::Mod => self.binop(value::modulo)?,
            Opcode::Pow => self.binop(value::pow)?,
            Opcode::Pos => self.unop(value::pos)?,
            Opcode::Neg => self.unop(value::neg)?,

            Opcode::LogAnd => self.binop(value::log_and)?,
            Opcode::LogOr => self.binop(value::log_or)?,
            Opcode::LogNot => self.unop(value::log_not)?,

            Opcode::BitAnd => self.binop(value::bit_and)?,
            Opcode::BitOr => self.binop(value::bit_or)?,
            Opcode::BitXor => self.binop(value::bit_xor)?,
            Opcode::BitNot => self.unop(value::bit_not)?,
            Opcode::LeftShift => self.binop(value::lshift)?,
            Opcode::RightShift => self.binop(value::rshift)?,

            Opcode::IpAdd => self.binop(value::ip_add)?,
            Opcode::IpSub => self.binop(value::ip_sub)?,
            Opcode::IpMul => self.binop(value::ip_mul)?,
            Opcode::IpDiv => self.binop(value::ip_div)?,
            Opcode::IpMod => self.binop(value::ip_mod)?,
            Opcode::IpAnd => self.binop(value::ip_and)?,
            Opcode::IpOr => self.binop(value::ip_or)?,
            Opcode::IpXor => self.binop(value::ip_xor)?,
            Opcode::IpNot => {
                return Err(RuntimeError::new(
                    "IP_NOT has no source operator and cannot execute",
                ))
            }
            Opcode::IpLeft => self.binop(value::ip_lshift)?,
            Opcode::IpRight => self.binop(value::ip_rshift)?,
            Opcode::IpAssign => self.binop(value::ip_assign)?,
            Opcode::IpPreInc => self.unop(value::preinc)?,
            Opcode::IpPreDec => self.unop(value::predec)?,
            Opcode::IpPostInc => self.unop(value::postinc)?,
            Opcode::IpPostDec => self.unop(value::postdec)?,

            Opcode::Eq => self.binop(value::eq)?,
            Opcode::Ne => self.binop(value::ne)?,
            Opcode::Gt => self.binop(value::gt)?,
            Opcode::Ge => self.binop(value::ge)?,
            Opcode::Lt => self.binop(value::lt)?,
            Opcode::Le => self.binop(value::le)?,

            Opcode::Label => unreachable!("filtered above"),
        }
        Ok(())
    }

    fn exec_index(&mut self) -> Result<(), RuntimeError> {
        let index = self.pop()?;
        let object = self.pop()?;
        let container = self.heap.get(object).clone();
        let result = match container {
            Value::List(elements) => match self.heap.get(index) {
                Value::Int(i) => {
                    let i = *i;
                    usize::try_from(i)
                        .ok()
                        .and_then(|i| elements.get(i).copied())
                        .ok_or_else(|| {
                            RuntimeError::new(format!("list index {i} out of bounds"))
                        })?
                }
                other => {
                    return Err(RuntimeError::new(format!(
                        "cannot index type 'List' with type '{}'",
                        other.type_name()
                    )))
                }
            },
            Value::Str(text) => match self.heap.get(index) {
                Value::Int(i) => {
                    let i = *i;
                    let ch = usize::try_from(i)
                        .ok()
                        .and_then(|i| text.chars().nth(i))
                        .ok_or_else(|| {
                            RuntimeError::new(format!("string index {i} out of bounds"))
                        })?;
                    self.heap.alloc(Value::Str(ch.to_string()))
                }
                other => {
                    return Err(RuntimeError::new(format!(
                        "cannot index type 'String' with type '{}'",
                        other.type_name()
                    )))
                }
            },
            Value::Dict(dict) => {
                let hash = value::hash_key(&self.heap, index)?;
                dict.get(&hash).map(|(_, value)| value).ok_or_else(|| {
                    RuntimeError::new(format!(
                        "key {} not found in dict",
                        value::repr(&self.heap, index)
                    ))
                })?
            }
            other => {
                return Err(RuntimeError::new(format!(
                    "cannot index type '{}' with type '{}'",
                    other.type_name(),
                    self.heap.get(index).type_name()
                )))
            }
        };
        self.stack.push(result);
        Ok(())
    }

    fn exec_member(&mut self) -> Result<(), RuntimeError> {
        let name = self.pop()?;
        let object = self.pop()?;
        match self.heap.get(object) {
            Value::Object { members, .. } => {
                let hash = value::hash_key(&self.heap, name)?;
                let found = members.get(&hash).map(|(_, value)| value);
                match found {
                    Some(value) => {
                        self.stack.push(value);
                        Ok(())
                    }
                    None => Err(RuntimeError::new(format!(
                        "object has no member '{}'",
                        value::repr(&self.heap, name)
                    ))),
                }
            }
            other => Err(RuntimeError::new(format!(
                "value of type '{}' has no members",
                other.type_name()
            ))),
        }
    }
}
