use crate::frontend::token::TokenKind;

/// Byte-code address. Widening to `u64` would require changing the
/// assembler and VM together; both go through `put_addr`/`read_addr`.
pub type CodeAddr = u32;

/// One-byte operation codes.
///
/// `Label` is a pseudo-op used only before assembly; it is never emitted
/// into a binary image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Halt = 0,
    Nop,

    OpenScope,
    CloseScope,
    Bind,

    Call,
    Return,
    Jump,
    JumpTrue,
    JumpFalse,

    PopTop,
    PushNull,
    PushTrue,
    PushFalse,
    PushInt,
    PushFloat,
    PushString,
    PushSymbol,
    PushList,
    PushDict,
    PushSlice,
    PushFunction,

    Index,
    Member,

    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Pos,
    Neg,

    LogAnd,
    LogOr,
    LogNot,

    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    LeftShift,
    RightShift,

    IpAdd,
    IpSub,
    IpMul,
    IpDiv,
    IpMod,
    IpAnd,
    IpOr,
    IpXor,
    IpNot,
    IpLeft,
    IpRight,
    IpAssign,
    IpPreInc,
    IpPreDec,
    IpPostInc,
    IpPostDec,

    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,

    Print,

    Label = 255,
}

impl Opcode {
    /// Decodes an op-code byte.
    pub fn from_u8(byte: u8) -> Option<Opcode> {
        use Opcode::*;
        let op = match byte {
            0 => Halt,
            1 => Nop,
            2 => OpenScope,
            3 => CloseScope,
            4 => Bind,
            5 => Call,
            6 => Return,
            7 => Jump,
            8 => JumpTrue,
            9 => JumpFalse,
            10 => PopTop,
            11 => PushNull,
            12 => PushTrue,
            13 => PushFalse,
            14 => PushInt,
            15 => PushFloat,
            16 => PushString,
            17 => PushSymbol,
            18 => PushList,
            19 => PushDict,
            20 => PushSlice,
            21 => PushFunction,
            22 => Index,
            23 => Member,
            24 => Add,
            25 => Sub,
            26 => Mul,
            27 => Div,
            28 => Mod,
            29 => Pow,
            30 => Pos,
            31 => Neg,
            32 => LogAnd,
            33 => LogOr,
            34 => LogNot,
            35 => BitAnd,
            36 => BitOr,
            37 => BitXor,
            38 => BitNot,
            39 => LeftShift,
            40 => RightShift,
            41 => IpAdd,
            42 => IpSub,
            43 => IpMul,
            44 => IpDiv,
            45 => IpMod,
            46 => IpAnd,
            47 => IpOr,
            48 => IpXor,
            49 => IpNot,
            50 => IpLeft,
            51 => IpRight,
            52 => IpAssign,
            53 => IpPreInc,
            54 => IpPreDec,
            55 => IpPostInc,
            56 => IpPostDec,
            57 => Eq,
            58 => Ne,
            59 => Gt,
            60 => Ge,
            61 => Lt,
            62 => Le,
            63 => Print,
            255 => Label,
            _ => return None,
        };
        Some(op)
    }

    /// Display name used in listings and disassembly.
    pub fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            Halt => "HALT",
            Nop => "NOP",
            OpenScope => "OPEN_SCOPE",
            CloseScope => "CLOSE_SCOPE",
            Bind => "BIND",
            Call => "CALL",
            Return => "RETURN",
            Jump => "JUMP",
            JumpTrue => "JUMP_TRUE",
            JumpFalse => "JUMP_FALSE",
            PopTop => "POP_TOP",
            PushNull => "PUSH_NULL",
            PushTrue => "PUSH_TRUE",
            PushFalse => "PUSH_FALSE",
            PushInt => "PUSH_INT",
            PushFloat => "PUSH_FLOAT",
            PushString => "PUSH_STRING",
            PushSymbol => "PUSH_SYMBOL",
            PushList => "PUSH_LIST",
            PushDict => "PUSH_DICT",
            PushSlice => "PUSH_SLICE",
            PushFunction => "PUSH_FUNCTION",
            Index => "INDEX",
            Member => "MEMBER",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Mod => "MOD",
            Pow => "POW",
            Pos => "POSITIVE",
            Neg => "NEGATIVE",
            LogAnd => "LOG_AND",
            LogOr => "LOG_OR",
            LogNot => "LOG_NOT",
            BitAnd => "BIT_AND",
            BitOr => "BIT_OR",
            BitXor => "BIT_XOR",
            BitNot => "BIT_NOT",
            LeftShift => "LEFT_SHIFT",
            RightShift => "RIGHT_SHIFT",
            IpAdd => "IP_ADD",
            IpSub => "IP_SUB",
            IpMul => "IP_MUL",
            IpDiv => "IP_DIV",
            IpMod => "IP_MOD",
            IpAnd => "IP_AND",
            IpOr => "IP_OR",
            IpXor => "IP_XOR",
            IpNot => "IP_NOT",
            IpLeft => "IP_LEFT",
            IpRight => "IP_RIGHT",
            IpAssign => "ASSIGN",
            IpPreInc => "PREINC",
            IpPreDec => "PREDEC",
            IpPostInc => "POSTINC",
            IpPostDec => "POSTDEC",
            Eq => "EQ",
            Ne => "NE",
            Gt => "GT",
            Ge => "GE",
            Lt => "LT",
            Le => "LE",
            Print => "PRINT",
            Label => "LABEL",
        }
    }

    /// Maps an operator token to the op-code the lowering pass emits for
    /// it. Tokens without a runtime operator (for example `**=` and `~=`,
    /// which the expression grammar never produces) have no mapping.
    pub fn from_token(kind: TokenKind) -> Option<Opcode> {
        use TokenKind as T;
        let op = match kind {
            T::Add => Opcode::Add,
            T::Sub => Opcode::Sub,
            T::Mul => Opcode::Mul,
            T::Div => Opcode::Div,
            T::Mod => Opcode::Mod,
            T::Pow => Opcode::Pow,
            T::UPlus => Opcode::Pos,
            T::UMinus => Opcode::Neg,
            T::LogAnd => Opcode::LogAnd,
            T::LogOr => Opcode::LogOr,
            T::LogNot => Opcode::LogNot,
            T::BitAnd => Opcode::BitAnd,
            T::BitOr => Opcode::BitOr,
            T::BitXor => Opcode::BitXor,
            T::BitNot => Opcode::BitNot,
            T::LShift => Opcode::LeftShift,
            T::RShift => Opcode::RightShift,
            T::AddAssign => Opcode::IpAdd,
            T::SubAssign => Opcode::IpSub,
            T::MulAssign => Opcode::IpMul,
            T::DivAssign => Opcode::IpDiv,
            T::ModAssign => Opcode::IpMod,
            T::AndAssign => Opcode::IpAnd,
            T::OrAssign => Opcode::IpOr,
            T::XorAssign => Opcode::IpXor,
            T::LeftAssign => Opcode::IpLeft,
            T::RightAssign => Opcode::IpRight,
            T::Assign => Opcode::IpAssign,
            T::PreInc => Opcode::IpPreInc,
            T::PreDec => Opcode::IpPreDec,
            T::PostInc => Opcode::IpPostInc,
            T::PostDec => Opcode::IpPostDec,
            T::Eq => Opcode::Eq,
            T::Ne => Opcode::Ne,
            T::Gt => Opcode::Gt,
            T::Ge => Opcode::Ge,
            T::Lt => Opcode::Lt,
            T::Le => Opcode::Le,
            _ => return None,
        };
        Some(op)
    }

    /// True for the four single-operand operator codes.
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            Opcode::Pos | Opcode::Neg | Opcode::LogNot | Opcode::BitNot
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_numbering() {
        assert_eq!(Opcode::Halt as u8, 0);
        assert_eq!(Opcode::Nop as u8, 1);
        assert_eq!(Opcode::Bind as u8, 4);
        assert_eq!(Opcode::PopTop as u8, 10);
        assert_eq!(Opcode::PushFunction as u8, 21);
        assert_eq!(Opcode::Add as u8, 24);
        assert_eq!(Opcode::IpAdd as u8, 41);
        assert_eq!(Opcode::Eq as u8, 57);
        assert_eq!(Opcode::Le as u8, 62);
        assert_eq!(Opcode::Label as u8, 255);
    }

    #[test]
    fn test_from_u8_round_trips() {
        for byte in 0..=63u8 {
            let op = Opcode::from_u8(byte).expect("every code below 64 is assigned");
            assert_eq!(op as u8, byte);
        }
        assert_eq!(Opcode::from_u8(64), None);
        assert_eq!(Opcode::from_u8(254), None);
        assert_eq!(Opcode::from_u8(255), Some(Opcode::Label));
    }

    #[test]
    fn test_token_mapping() {
        assert_eq!(Opcode::from_token(TokenKind::Add), Some(Opcode::Add));
        assert_eq!(Opcode::from_token(TokenKind::UMinus), Some(Opcode::Neg));
        assert_eq!(Opcode::from_token(TokenKind::Assign), Some(Opcode::IpAssign));
        assert_eq!(
            Opcode::from_token(TokenKind::LeftAssign),
            Some(Opcode::IpLeft)
        );
        assert_eq!(
            Opcode::from_token(TokenKind::PostDec),
            Some(Opcode::IpPostDec)
        );
        // reserved operator tokens with no runtime mapping
        assert_eq!(Opcode::from_token(TokenKind::PowAssign), None);
        assert_eq!(Opcode::from_token(TokenKind::NotAssign), None);
        assert_eq!(Opcode::from_token(TokenKind::Identifier), None);
    }

    #[test]
    fn test_unary_classification() {
        assert!(Opcode::Neg.is_unary());
        assert!(Opcode::LogNot.is_unary());
        assert!(!Opcode::Add.is_unary());
        assert!(!Opcode::IpNot.is_unary());
    }
}
