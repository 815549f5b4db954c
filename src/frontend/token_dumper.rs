use crate::frontend::token::{Token, TokenKind};

/// Renders a token stream for the `--tokens` CLI mode, one token per
/// line with its source position, kind class and lexeme.
pub struct TokenDumper {
    pub color: bool,
    pub show_debug_repr: bool, // if false, prints a nicer value for some tokens
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_debug_repr: true,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.show_debug_repr = false;
        self
    }

    pub fn dump(&self, tokens: &[Token]) {
        for token in tokens {
            println!("{}", self.line(token));
        }
    }

    /// One rendered line for a token.
    pub fn line(&self, token: &Token) -> String {
        let line = token.range.start.line;
        let col = token.range.start.column;

        let class = self.class(token.kind);
        let color = if self.color { self.color_of(token.kind) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        if self.show_debug_repr {
            format!(
                "[{:02}:{:02}] {}{:<8} {:?} {:?}{}",
                line, col, color, class, token.kind, token.text, reset
            )
        } else if token.text.is_empty() {
            format!(
                "[{:02}:{:02}] {}{:<8} {}{}",
                line,
                col,
                color,
                class,
                token.kind.name(),
                reset
            )
        } else {
            format!(
                "[{:02}:{:02}] {}{:<8} {}{}",
                line, col, color, class, token.text, reset
            )
        }
    }

    fn class(&self, kind: TokenKind) -> &'static str {
        use TokenKind::*;
        match kind {
            End => "END",
            SingleLineComment | MultiLineComment => "COMMENT",
            IntLiteral => "INT",
            FloatLiteral => "FLOAT",
            StringLiteral => "STRING",
            Identifier => "IDENT",
            Colon | Semicolon | Comma | LBrace | RBrace | LParen | RParen | LBracket
            | RBracket => "PUNCT",
            Eq | Ne | Gt | Ge | Lt | Le => "CMP",
            Add | Sub | Mul | Div | Mod | Pow | Member | LogAnd | LogOr | LogNot | BitAnd
            | BitOr | BitXor | BitNot | LShift | RShift | Assign | AddAssign | SubAssign
            | MulAssign | DivAssign | ModAssign | PowAssign | AndAssign | OrAssign
            | XorAssign | NotAssign | LeftAssign | RightAssign | Increment | Decrement => "OP",
            Unknown(_) => "UNKNOWN",
            _ => "KEYWORD",
        }
    }

    fn color_of(&self, kind: TokenKind) -> &'static str {
        use TokenKind::*;
        match kind {
            End | SingleLineComment | MultiLineComment => Self::DIM,
            StringLiteral => Self::GRN,
            IntLiteral | FloatLiteral => Self::CYN,
            Identifier => Self::YEL,
            Eq | Ne | Gt | Ge | Lt | Le => Self::MAG,
            Add | Sub | Mul | Div | Mod | Pow | Member | LogAnd | LogOr | LogNot | BitAnd
            | BitOr | BitXor | BitNot | LShift | RShift | Assign | AddAssign | SubAssign
            | MulAssign | DivAssign | ModAssign | PowAssign | AndAssign | OrAssign
            | XorAssign | NotAssign | LeftAssign | RightAssign | Increment | Decrement => {
                Self::MAG
            }
            _ => Self::RESET,
        }
    }
}
