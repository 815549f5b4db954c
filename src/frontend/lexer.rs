use crate::error::SyntaxError;
use crate::frontend::token::{keyword, SourcePosition, SourceRange, Token, TokenKind};

#[inline]
fn is_binary(ch: char) -> bool {
    ch == '0' || ch == '1'
}

#[inline]
fn is_octal(ch: char) -> bool {
    ('0'..='7').contains(&ch)
}

#[inline]
fn is_decimal(ch: char) -> bool {
    ch.is_ascii_digit()
}

/// Single-pass lexer with one character of lookahead.
///
/// `next_token` yields tokens until `End`, which repeats at the end of
/// input. A lexer is restartable only by constructing a fresh instance.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    chr: Option<char>,
    offset: u32,
    line: u32,
    column: u32,
    text: String,
    start: SourcePosition,
    pub filename: String,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self::with_filename(source, "<stream>")
    }

    pub fn with_filename(source: &str, filename: &str) -> Self {
        let chars: Vec<char> = source.chars().collect();
        let chr = chars.first().copied();
        Lexer {
            chars,
            pos: 0,
            chr,
            offset: 0,
            line: 1,
            column: 0,
            text: String::new(),
            start: SourcePosition::default(),
            filename: filename.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    /// Moves the lookahead one character forward, tracking line/column.
    fn advance(&mut self) {
        if self.chr.is_none() {
            return;
        }
        if self.chr == Some('\n') {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        self.pos += 1;
        self.offset += 1;
        self.chr = self.chars.get(self.pos).copied();
    }

    /// Consumes the lookahead character into the token text.
    fn take(&mut self) {
        if let Some(ch) = self.chr {
            self.text.push(ch);
        }
        self.advance();
    }

    fn position(&self) -> SourcePosition {
        SourcePosition::new(self.offset, self.line, self.column)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.line, self.column)
    }

    fn token(&mut self, kind: TokenKind) -> Token {
        Token {
            kind,
            range: SourceRange::new(self.start, self.position()),
            text: std::mem::take(&mut self.text),
        }
    }

    /// Yields the next token, skipping any run of whitespace first.
    pub fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.text.clear();
        while matches!(self.chr, Some(ch) if ch.is_whitespace()) {
            self.advance();
        }
        self.start = self.position();

        let ch = match self.chr {
            Some(ch) => ch,
            None => return Ok(self.token(TokenKind::End)),
        };

        if ch.is_ascii_alphabetic() || ch == '_' {
            return Ok(self.lex_identifier());
        }
        if ch.is_ascii_digit() || ch == '.' {
            return self.lex_number_or_member();
        }
        if ch == '"' || ch == '\'' {
            return self.lex_string(ch);
        }

        let kind = match ch {
            '+' => {
                self.advance();
                match self.chr {
                    Some('=') => {
                        self.advance();
                        TokenKind::AddAssign
                    }
                    Some('+') => {
                        self.advance();
                        TokenKind::Increment
                    }
                    _ => TokenKind::Add,
                }
            }
            '-' => {
                self.advance();
                match self.chr {
                    Some('=') => {
                        self.advance();
                        TokenKind::SubAssign
                    }
                    Some('-') => {
                        self.advance();
                        TokenKind::Decrement
                    }
                    _ => TokenKind::Sub,
                }
            }
            '*' => {
                self.advance();
                match self.chr {
                    Some('=') => {
                        self.advance();
                        TokenKind::MulAssign
                    }
                    Some('*') => {
                        self.advance();
                        if self.chr == Some('=') {
                            self.advance();
                            TokenKind::PowAssign
                        } else {
                            TokenKind::Pow
                        }
                    }
                    _ => TokenKind::Mul,
                }
            }
            '/' => return self.lex_slash(),
            '%' => {
                self.advance();
                if self.chr == Some('=') {
                    self.advance();
                    TokenKind::ModAssign
                } else {
                    TokenKind::Mod
                }
            }
            '&' => {
                self.advance();
                match self.chr {
                    Some('&') => {
                        self.advance();
                        TokenKind::LogAnd
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::AndAssign
                    }
                    _ => TokenKind::BitAnd,
                }
            }
            '|' => {
                self.advance();
                match self.chr {
                    Some('|') => {
                        self.advance();
                        TokenKind::LogOr
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::OrAssign
                    }
                    _ => TokenKind::BitOr,
                }
            }
            '^' => {
                self.advance();
                if self.chr == Some('=') {
                    self.advance();
                    TokenKind::XorAssign
                } else {
                    TokenKind::BitXor
                }
            }
            '~' => {
                self.advance();
                if self.chr == Some('=') {
                    self.advance();
                    TokenKind::NotAssign
                } else {
                    TokenKind::BitNot
                }
            }
            '=' => {
                self.advance();
                if self.chr == Some('=') {
                    self.advance();
                    TokenKind::Eq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                self.advance();
                if self.chr == Some('=') {
                    self.advance();
                    TokenKind::Ne
                } else {
                    TokenKind::LogNot
                }
            }
            '<' => {
                self.advance();
                match self.chr {
                    Some('<') => {
                        self.advance();
                        if self.chr == Some('=') {
                            self.advance();
                            TokenKind::LeftAssign
                        } else {
                            TokenKind::LShift
                        }
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::Le
                    }
                    _ => TokenKind::Lt,
                }
            }
            '>' => {
                self.advance();
                match self.chr {
                    Some('>') => {
                        self.advance();
                        if self.chr == Some('=') {
                            self.advance();
                            TokenKind::RightAssign
                        } else {
                            TokenKind::RShift
                        }
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::Ge
                    }
                    _ => TokenKind::Gt,
                }
            }
            ':' => {
                self.advance();
                TokenKind::Colon
            }
            ';' => {
                self.advance();
                TokenKind::Semicolon
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            '{' => {
                self.advance();
                TokenKind::LBrace
            }
            '}' => {
                self.advance();
                TokenKind::RBrace
            }
            '(' => {
                self.advance();
                TokenKind::LParen
            }
            ')' => {
                self.advance();
                TokenKind::RParen
            }
            '[' => {
                self.advance();
                TokenKind::LBracket
            }
            ']' => {
                self.advance();
                TokenKind::RBracket
            }
            other => {
                self.advance();
                TokenKind::Unknown(other)
            }
        };

        Ok(self.token(kind))
    }

    /// Lexes every token through `End` (inclusive).
    pub fn tokenize(&mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::End;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn lex_identifier(&mut self) -> Token {
        while matches!(self.chr, Some(ch) if ch.is_ascii_alphanumeric() || ch == '_') {
            self.take();
        }
        match keyword(&self.text) {
            Some(kind) => {
                self.text.clear();
                self.token(kind)
            }
            None => self.token(TokenKind::Identifier),
        }
    }

    /// Consumes digits of one radix, allowing a single decimal point.
    ///
    /// Returns whether the literal turned out to be a float. A second
    /// point fails, naming the radix.
    fn lex_digits(
        &mut self,
        mut is_float: bool,
        radix_name: &str,
        accept: fn(char) -> bool,
    ) -> Result<bool, SyntaxError> {
        loop {
            match self.chr {
                Some(ch) if accept(ch) => self.take(),
                Some('.') => {
                    if is_float {
                        return Err(self.error(format!(
                            "multiple decimal points in floating-point {radix_name} literal"
                        )));
                    }
                    is_float = true;
                    self.take();
                }
                _ => break,
            }
        }
        Ok(is_float)
    }

    fn lex_number_or_member(&mut self) -> Result<Token, SyntaxError> {
        let ch = self.chr.unwrap_or('\0');

        // '.' not followed by a digit is the member operator.
        if ch == '.' && !matches!(self.peek(), Some(p) if p.is_ascii_digit()) {
            self.advance();
            return Ok(self.token(TokenKind::Member));
        }

        let is_float;
        if ch == '0' {
            self.take();
            match self.chr {
                Some('x') | Some('X') => {
                    self.take();
                    is_float =
                        self.lex_digits(false, "hexadecimal", |c| c.is_ascii_hexdigit())?;
                }
                Some('b') | Some('B') => {
                    self.take();
                    is_float = self.lex_digits(false, "binary", is_binary)?;
                }
                Some('o') | Some('O') => {
                    self.take();
                    is_float = self.lex_digits(false, "octal", is_octal)?;
                }
                Some('d') | Some('D') => {
                    self.take();
                    is_float = self.lex_digits(false, "decimal", is_decimal)?;
                }
                // 0-prefixed octal, or a bare "0", or "0." float
                _ => is_float = self.lex_digits(false, "octal", is_octal)?,
            }
        } else {
            is_float = self.lex_digits(false, "decimal", is_decimal)?;
        }

        if is_float {
            Ok(self.token(TokenKind::FloatLiteral))
        } else {
            Ok(self.token(TokenKind::IntLiteral))
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, SyntaxError> {
        self.advance(); // opening quote
        loop {
            match self.chr {
                None => return Err(self.error("EOF encountered in string literal")),
                Some(ch) if ch == quote => {
                    self.advance();
                    break;
                }
                // only \<quote> is an escape; everything else is verbatim
                Some('\\') if self.peek() == Some(quote) => {
                    self.text.push(quote);
                    self.advance();
                    self.advance();
                }
                Some(ch) => {
                    self.text.push(ch);
                    self.advance();
                }
            }
        }
        Ok(self.token(TokenKind::StringLiteral))
    }

    fn lex_slash(&mut self) -> Result<Token, SyntaxError> {
        self.advance(); // '/'
        match self.chr {
            Some('/') => {
                self.text.push_str("//");
                self.advance();
                while matches!(self.chr, Some(ch) if ch != '\n') {
                    self.take();
                }
                Ok(self.token(TokenKind::SingleLineComment))
            }
            Some('*') => {
                self.text.push_str("/*");
                self.advance();
                loop {
                    match self.chr {
                        None => {
                            return Err(self.error("EOF encountered in multi-line comment"))
                        }
                        Some('*') if self.peek() == Some('/') => {
                            self.text.push_str("*/");
                            self.advance();
                            self.advance();
                            break;
                        }
                        _ => self.take(),
                    }
                }
                Ok(self.token(TokenKind::MultiLineComment))
            }
            Some('=') => {
                self.advance();
                Ok(self.token(TokenKind::DivAssign))
            }
            _ => Ok(self.token(TokenKind::Div)),
        }
    }
}
