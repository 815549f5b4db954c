use crate::bytecode::op::{CodeAddr, Opcode};

/// One entry of a lowered instruction sequence.
///
/// Jump targets and `PushFunction` payloads are symbolic names until the
/// assembler substitutes byte offsets for them. `Label` marks a position
/// and has size zero; assembly strips it.
#[derive(Debug, Clone, PartialEq)]
pub enum Ins {
    Label(String),

    Halt,
    Nop,
    Print,

    OpenScope,
    CloseScope,
    Bind(String),

    Call(u8),
    Return,
    Jump(String),
    JumpTrue(String),
    JumpFalse(String),

    PopTop,
    PushNull,
    PushTrue,
    PushFalse,
    PushInt(u64),
    PushFloat(f64),
    PushString(String),
    PushSymbol(String),
    PushList(u32),
    PushDict(u32),
    PushSlice,
    PushFunction(String),

    Index,
    Member,

    /// Single-operand operator (`POSITIVE`, `NEGATIVE`, `LOG_NOT`,
    /// `BIT_NOT`).
    Un(Opcode),
    /// Two-operand operator, including the in-place and comparison
    /// families.
    Bin(Opcode),
}

/// Lowered program: a linear sequence of instructions with symbolic
/// labels still present.
pub type InstructionList = Vec<Ins>;

impl Ins {
    pub fn opcode(&self) -> Opcode {
        use Ins::*;
        match self {
            Label(_) => Opcode::Label,
            Halt => Opcode::Halt,
            Nop => Opcode::Nop,
            Print => Opcode::Print,
            OpenScope => Opcode::OpenScope,
            CloseScope => Opcode::CloseScope,
            Bind(_) => Opcode::Bind,
            Call(_) => Opcode::Call,
            Return => Opcode::Return,
            Jump(_) => Opcode::Jump,
            JumpTrue(_) => Opcode::JumpTrue,
            JumpFalse(_) => Opcode::JumpFalse,
            PopTop => Opcode::PopTop,
            PushNull => Opcode::PushNull,
            PushTrue => Opcode::PushTrue,
            PushFalse => Opcode::PushFalse,
            PushInt(_) => Opcode::PushInt,
            PushFloat(_) => Opcode::PushFloat,
            PushString(_) => Opcode::PushString,
            PushSymbol(_) => Opcode::PushSymbol,
            PushList(_) => Opcode::PushList,
            PushDict(_) => Opcode::PushDict,
            PushSlice => Opcode::PushSlice,
            PushFunction(_) => Opcode::PushFunction,
            Index => Opcode::Index,
            Member => Opcode::Member,
            Un(op) | Bin(op) => *op,
        }
    }

    /// Encoded size in bytes. Labels occupy no space in the image.
    pub fn size(&self) -> CodeAddr {
        use Ins::*;
        match self {
            Label(_) => 0,
            Bind(name) | PushSymbol(name) => 2 + name.len() as CodeAddr,
            Call(_) => 2,
            Jump(_) | JumpTrue(_) | JumpFalse(_) | PushFunction(_) => {
                1 + std::mem::size_of::<CodeAddr>() as CodeAddr
            }
            PushInt(_) | PushFloat(_) => 9,
            PushString(value) => 5 + value.len() as CodeAddr,
            PushList(_) | PushDict(_) => 5,
            _ => 1,
        }
    }

    /// One line of assembler-side listing output: labels render as
    /// `name:`, everything else indented with its payload.
    pub fn list(&self) -> String {
        use Ins::*;
        match self {
            Label(name) => format!("{name}:"),
            Bind(name) => format!("\tBIND {name}"),
            Call(argc) => format!("\tCALL {argc}"),
            Jump(label) => format!("\tJUMP {label}"),
            JumpTrue(label) => format!("\tJUMP_TRUE {label}"),
            JumpFalse(label) => format!("\tJUMP_FALSE {label}"),
            PushInt(value) => format!("\tPUSH_INT {value}"),
            PushFloat(value) => format!("\tPUSH_FLOAT {value}"),
            PushString(value) => format!("\tPUSH_STRING \"{value}\""),
            PushSymbol(name) => format!("\tPUSH_SYMBOL {name}"),
            PushList(len) => format!("\tPUSH_LIST {len}"),
            PushDict(len) => format!("\tPUSH_DICT {len}"),
            PushFunction(name) => format!("\tPUSH_FUNCTION {name}"),
            other => format!("\t{}", other.opcode().name()),
        }
    }

    /// One line of disassembly output, prefixed with the instruction's
    /// byte offset.
    pub fn dis(&self, addr: CodeAddr) -> String {
        format!("0x{addr:08X}:{}", self.list())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_match_encoding() {
        assert_eq!(Ins::Halt.size(), 1);
        assert_eq!(Ins::Nop.size(), 1);
        assert_eq!(Ins::Print.size(), 1);
        assert_eq!(Ins::OpenScope.size(), 1);
        assert_eq!(Ins::PushSlice.size(), 1);
        assert_eq!(Ins::Un(Opcode::Neg).size(), 1);
        assert_eq!(Ins::Bin(Opcode::Add).size(), 1);
        assert_eq!(Ins::Call(2).size(), 2);
        assert_eq!(Ins::Bind("x".into()).size(), 3);
        assert_eq!(Ins::PushSymbol("abc".into()).size(), 5);
        assert_eq!(Ins::Jump("a".into()).size(), 5);
        assert_eq!(Ins::PushFunction("f".into()).size(), 5);
        assert_eq!(Ins::PushInt(0).size(), 9);
        assert_eq!(Ins::PushFloat(0.0).size(), 9);
        assert_eq!(Ins::PushString("ab".into()).size(), 7);
        assert_eq!(Ins::PushList(3).size(), 5);
        assert_eq!(Ins::PushDict(3).size(), 5);
        assert_eq!(Ins::Label("l".into()).size(), 0);
    }

    #[test]
    fn test_listing_format() {
        assert_eq!(Ins::Label("_pop_start_".into()).list(), "_pop_start_:");
        assert_eq!(Ins::Jump("_pop_start_".into()).list(), "\tJUMP _pop_start_");
        assert_eq!(Ins::PushInt(42).list(), "\tPUSH_INT 42");
        assert_eq!(Ins::PushString("hi".into()).list(), "\tPUSH_STRING \"hi\"");
        assert_eq!(Ins::Bind("x".into()).list(), "\tBIND x");
        assert_eq!(Ins::Bin(Opcode::Add).list(), "\tADD");
        assert_eq!(Ins::Un(Opcode::Neg).list(), "\tNEGATIVE");
        assert_eq!(Ins::Halt.list(), "\tHALT");
    }

    #[test]
    fn test_dis_format() {
        assert_eq!(Ins::Halt.dis(0x1F), "0x0000001F:\tHALT");
    }

    #[test]
    fn test_opcode_of_operator_wrappers() {
        assert_eq!(Ins::Un(Opcode::LogNot).opcode(), Opcode::LogNot);
        assert_eq!(Ins::Bin(Opcode::IpAssign).opcode(), Opcode::IpAssign);
        assert_eq!(Ins::Label("x".into()).opcode(), Opcode::Label);
    }
}
