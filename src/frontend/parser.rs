use crate::ast::{Ast, NodeId, NodeKind};
use crate::error::SyntaxError;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{SourcePosition, SourceRange, Token, TokenKind};

/// Binding power and associativity of a binary (or assignment) operator.
///
/// Unary and postfix operators are not driven by this table: prefixes
/// bind one `unary_expr` and postfixes are consumed greedily after a
/// primary, which realizes their level-14/15 binding strength.
fn binop_info(kind: TokenKind) -> Option<(i32, bool)> {
    use TokenKind::*;
    let info = match kind {
        Mul | Div | Mod | Pow => (12, true),
        Add | Sub => (11, true),
        LShift | RShift => (10, true),
        Lt | Le | Gt | Ge => (9, true),
        Eq | Ne => (8, true),
        BitAnd => (7, true),
        BitXor => (6, true),
        BitOr => (5, true),
        LogAnd => (4, true),
        LogOr => (3, true),
        Assign | AddAssign | SubAssign | MulAssign | DivAssign | ModAssign | LeftAssign
        | RightAssign | AndAssign | XorAssign | OrAssign => (2, false),
        _ => return None,
    };
    Some(info)
}

fn precedence(kind: TokenKind) -> i32 {
    binop_info(kind).map(|(prec, _)| prec).unwrap_or(-1)
}

fn is_left_associative(kind: TokenKind) -> bool {
    binop_info(kind).map(|(_, left)| left).unwrap_or(false)
}

fn is_unary_pre_op(kind: TokenKind) -> bool {
    use TokenKind::*;
    matches!(kind, Add | Sub | LogNot | BitNot | Increment | Decrement)
}

fn is_unary_post_op(kind: TokenKind) -> bool {
    use TokenKind::*;
    matches!(kind, Increment | Decrement | If | LBracket | LParen | Member)
}

/// Recursive-descent parser for statements with Pratt operator-precedence
/// parsing for expressions. Single token of lookahead in `tok`; comment
/// tokens are skipped when advancing.
pub struct Parser {
    lexer: Lexer,
    tok: Token,
    ast: Ast,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self::with_filename(source, "<stream>")
    }

    pub fn with_filename(source: &str, filename: &str) -> Self {
        Parser {
            lexer: Lexer::with_filename(source, filename),
            tok: Token::default(),
            ast: Ast::new(),
        }
    }

    fn bump(&mut self) -> Result<(), SyntaxError> {
        loop {
            self.tok = self.lexer.next_token()?;
            if !self.tok.kind.is_comment() {
                return Ok(());
            }
        }
    }

    /// Consumes the current token if it has the given kind.
    fn accept(&mut self, kind: TokenKind) -> Result<bool, SyntaxError> {
        if self.tok.kind == kind {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Consumes the current token or fails naming both kinds.
    fn expect(&mut self, kind: TokenKind) -> Result<(), SyntaxError> {
        if self.accept(kind)? {
            Ok(())
        } else {
            Err(SyntaxError::new(
                format!(
                    "unexpected '{}', expected '{}'",
                    self.tok.kind_name(),
                    kind.name()
                ),
                self.tok.range.start.line,
                self.tok.range.start.column,
            ))
        }
    }

    fn error_expecting(&self, what: &str) -> SyntaxError {
        SyntaxError::new(
            format!("unexpected '{}', expecting {}", self.tok.kind_name(), what),
            self.tok.range.start.line,
            self.tok.range.start.column,
        )
    }

    fn node(&mut self, kind: NodeKind, start: SourcePosition, end: SourcePosition) -> NodeId {
        self.ast.add(kind, SourceRange::new(start, end))
    }

    /// Parses a whole module and resolves parent links.
    pub fn parse(mut self) -> Result<Ast, SyntaxError> {
        let filename = self.lexer.filename.clone();
        self.bump()?;
        let mut stmts = Vec::new();
        while let Some(stmt) = self.parse_stmt()? {
            stmts.push(stmt);
        }
        self.expect(TokenKind::End)?;
        let root = self.ast.add(
            NodeKind::Module { filename, stmts },
            SourceRange::default(),
        );
        self.ast.root = root;
        self.ast.resolve_parents();
        Ok(self.ast)
    }

    // ──────────────────────────── Statements ────────────────────────────

    /// Parses one statement, or returns `None` when the current token
    /// cannot start one (end of input or a closing brace).
    fn parse_stmt(&mut self) -> Result<Option<NodeId>, SyntaxError> {
        use TokenKind::*;
        match self.tok.kind {
            Let => self.parse_let_binding().map(Some),
            Break => self.parse_break_stmt().map(Some),
            Continue => self.parse_continue_stmt().map(Some),
            Return => self.parse_return_stmt().map(Some),
            Goto => self.parse_goto_stmt().map(Some),
            If => self.parse_if_stmt().map(Some),
            Unless => self.parse_unless_stmt().map(Some),
            Do => self.parse_do_stmt().map(Some),
            While => self.parse_while_stmt().map(Some),
            Until => self.parse_until_stmt().map(Some),
            For => self.parse_for_stmt().map(Some),
            Function => self.parse_func_decl().map(Some),
            LBrace => self.parse_compound_stmt().map(Some),
            Semicolon => {
                let start = self.tok.range.start;
                let end = self.tok.range.end;
                self.expect(Semicolon)?;
                Ok(Some(self.node(NodeKind::EmptyStmt, start, end)))
            }
            End => Ok(None),
            _ => {
                let start = self.tok.range.start;
                match self.parse_expr()? {
                    Some(expr) => {
                        let end = self.ast.range(expr).end;
                        self.expect(Semicolon)?;
                        Ok(Some(self.node(NodeKind::ExprStmt { expr }, start, end)))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    fn parse_let_binding(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::Let)?;
        let name = self.tok.text.clone();
        self.expect(TokenKind::Identifier)?;
        self.expect(TokenKind::Assign)?;
        let value = self.require_expr()?;
        let end = self.tok.range.end;
        self.expect(TokenKind::Semicolon)?;
        Ok(self.node(
            NodeKind::LetBinding {
                name,
                value: Some(value),
            },
            start,
            end,
        ))
    }

    fn parse_break_stmt(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::Break)?;
        let end = self.tok.range.end;
        self.expect(TokenKind::Semicolon)?;
        Ok(self.node(NodeKind::BreakStmt, start, end))
    }

    fn parse_continue_stmt(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::Continue)?;
        let end = self.tok.range.end;
        self.expect(TokenKind::Semicolon)?;
        Ok(self.node(NodeKind::ContinueStmt, start, end))
    }

    fn parse_return_stmt(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::Return)?;
        let mut end = self.tok.range.end;
        let mut expr = None;
        if !self.accept(TokenKind::Semicolon)? {
            expr = Some(self.require_expr()?);
            end = self.tok.range.end;
            self.expect(TokenKind::Semicolon)?;
        }
        Ok(self.node(NodeKind::ReturnStmt { expr }, start, end))
    }

    fn parse_goto_stmt(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::Goto)?;
        let label = self.tok.text.clone();
        self.expect(TokenKind::Identifier)?;
        let end = self.tok.range.end;
        self.expect(TokenKind::Semicolon)?;
        Ok(self.node(NodeKind::GotoStmt { label }, start, end))
    }

    fn parse_compound_stmt(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while let Some(stmt) = self.parse_stmt()? {
            stmts.push(stmt);
        }
        let end = self.tok.range.end;
        self.expect(TokenKind::RBrace)?;
        Ok(self.node(NodeKind::CompoundStmt { stmts }, start, end))
    }

    fn parse_if_stmt(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let predicate = self.require_expr()?;
        self.expect(TokenKind::RParen)?;
        let consequence = self.require_stmt()?;
        let mut alternative = None;
        if self.accept(TokenKind::Else)? {
            alternative = Some(self.require_stmt()?);
        }
        let end = self
            .ast
            .range(alternative.unwrap_or(consequence))
            .end;
        Ok(self.node(
            NodeKind::IfStmt {
                predicate,
                consequence,
                alternative,
            },
            start,
            end,
        ))
    }

    fn parse_unless_stmt(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::Unless)?;
        self.expect(TokenKind::LParen)?;
        let predicate = self.require_expr()?;
        self.expect(TokenKind::RParen)?;
        let consequence = self.require_stmt()?;
        let mut alternative = None;
        if self.accept(TokenKind::Else)? {
            alternative = Some(self.require_stmt()?);
        }
        let end = self
            .ast
            .range(alternative.unwrap_or(consequence))
            .end;
        Ok(self.node(
            NodeKind::UnlessStmt {
                predicate,
                consequence,
                alternative,
            },
            start,
            end,
        ))
    }

    /// `do stmt while (expr);` or `do stmt unless (expr);`
    fn parse_do_stmt(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::Do)?;
        let stmt = self.require_stmt()?;
        let is_while = self.accept(TokenKind::While)?;
        if !is_while {
            self.expect(TokenKind::Unless)?;
        }
        self.expect(TokenKind::LParen)?;
        let expr = self.require_expr()?;
        self.expect(TokenKind::RParen)?;
        let end = self.tok.range.end;
        self.expect(TokenKind::Semicolon)?;
        let kind = if is_while {
            NodeKind::DoWhileStmt { expr, stmt }
        } else {
            NodeKind::DoUntilStmt { expr, stmt }
        };
        Ok(self.node(kind, start, end))
    }

    fn parse_while_stmt(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let expr = self.require_expr()?;
        self.expect(TokenKind::RParen)?;
        let stmt = self.require_stmt()?;
        let end = self.ast.range(stmt).end;
        Ok(self.node(NodeKind::WhileStmt { expr, stmt }, start, end))
    }

    fn parse_until_stmt(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::Until)?;
        self.expect(TokenKind::LParen)?;
        let expr = self.require_expr()?;
        self.expect(TokenKind::RParen)?;
        let stmt = self.require_stmt()?;
        let end = self.ast.range(stmt).end;
        Ok(self.node(NodeKind::UntilStmt { expr, stmt }, start, end))
    }

    fn parse_for_stmt(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;
        let name = self.tok.text.clone();
        let id_start = self.tok.range.start;
        let id_end = self.tok.range.end;
        self.expect(TokenKind::Identifier)?;
        let iterator = self.node(NodeKind::Identifier(name), id_start, id_end);
        self.expect(TokenKind::In)?;
        let sequence = self.require_expr()?;
        self.expect(TokenKind::RParen)?;
        let stmt = self.require_stmt()?;
        let end = self.ast.range(stmt).end;
        Ok(self.node(
            NodeKind::ForStmt {
                iterator,
                sequence,
                stmt,
            },
            start,
            end,
        ))
    }

    /// `function NAME(args) { stmts }` is sugar for
    /// `let NAME = function(args) { stmts };`
    fn parse_func_decl(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::Function)?;
        let name = self.tok.text.clone();
        self.expect(TokenKind::Identifier)?;
        let (arguments, stmts, end) = self.parse_func_tail()?;
        let func = self.node(
            NodeKind::FunctionLiteral { arguments, stmts },
            start,
            end,
        );
        Ok(self.node(
            NodeKind::LetBinding {
                name,
                value: Some(func),
            },
            start,
            end,
        ))
    }

    /// Argument list and body, shared by function declarations and
    /// function expressions. Returns the end position of the `}`.
    fn parse_func_tail(
        &mut self,
    ) -> Result<(Vec<String>, Vec<NodeId>, SourcePosition), SyntaxError> {
        let mut arguments = Vec::new();
        self.expect(TokenKind::LParen)?;
        if !self.accept(TokenKind::RParen)? {
            loop {
                let name = self.tok.text.clone();
                self.expect(TokenKind::Identifier)?;
                arguments.push(name);
                if !self.accept(TokenKind::Comma)? {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while let Some(stmt) = self.parse_stmt()? {
            stmts.push(stmt);
        }
        let end = self.tok.range.end;
        self.expect(TokenKind::RBrace)?;
        Ok((arguments, stmts, end))
    }

    fn require_stmt(&mut self) -> Result<NodeId, SyntaxError> {
        match self.parse_stmt()? {
            Some(stmt) => Ok(stmt),
            None => Err(self.error_expecting("a statement")),
        }
    }

    // ──────────────────────────── Expressions ───────────────────────────

    fn parse_expr(&mut self) -> Result<Option<NodeId>, SyntaxError> {
        match self.parse_unary_expr()? {
            Some(lhs) => self.parse_binop_rhs(0, lhs).map(Some),
            None => Ok(None),
        }
    }

    fn require_expr(&mut self) -> Result<NodeId, SyntaxError> {
        match self.parse_expr()? {
            Some(expr) => Ok(expr),
            None => Err(self.error_expecting("an expression")),
        }
    }

    /// The Pratt loop. Consumes operators binding at least as tightly as
    /// `expr_prec`, recursing with `prec + 1` after a left-associative
    /// operator and `prec` after a right-associative one.
    fn parse_binop_rhs(
        &mut self,
        expr_prec: i32,
        mut lhs: NodeId,
    ) -> Result<NodeId, SyntaxError> {
        loop {
            let tok_prec = precedence(self.tok.kind);
            if tok_prec < expr_prec {
                return Ok(lhs);
            }
            let binop = self.tok.kind;
            self.expect(binop)?;
            let mut rhs = match self.parse_unary_expr()? {
                Some(rhs) => rhs,
                None => return Err(self.error_expecting("an expression")),
            };
            let next_prec = precedence(self.tok.kind);
            if tok_prec <= next_prec {
                let min_prec = if is_left_associative(self.tok.kind) {
                    tok_prec + 1
                } else {
                    tok_prec
                };
                rhs = self.parse_binop_rhs(min_prec, rhs)?;
            }
            let start = self.ast.range(lhs).start;
            let end = self.ast.range(rhs).end;
            lhs = self.node(
                NodeKind::BinaryExpr {
                    op: binop,
                    left: lhs,
                    right: rhs,
                },
                start,
                end,
            );
        }
    }

    fn parse_unary_expr(&mut self) -> Result<Option<NodeId>, SyntaxError> {
        use TokenKind::*;
        let start = self.tok.range.start;
        let kind = self.tok.kind;

        if is_unary_pre_op(kind) {
            self.expect(kind)?;
            let operand = match self.parse_unary_expr()? {
                Some(operand) => operand,
                None => return Err(self.error_expecting("an expression")),
            };
            let op = match kind {
                Add => UPlus,
                Sub => UMinus,
                Increment => PreInc,
                Decrement => PreDec,
                other => other, // LogNot and BitNot keep their kind
            };
            let end = self.ast.range(operand).end;
            return Ok(Some(self.node(
                NodeKind::UnaryExpr { op, operand },
                start,
                end,
            )));
        }

        // A leading postfix token (other than '(') cannot start an
        // expression.
        if is_unary_post_op(kind) && kind != LParen {
            return Ok(None);
        }

        let mut expr = match self.parse_primary_expr()? {
            Some(expr) => expr,
            None => return Ok(None),
        };

        while is_unary_post_op(self.tok.kind) {
            let kind = self.tok.kind;
            match kind {
                Increment | Decrement => {
                    let end = self.tok.range.end;
                    self.expect(kind)?;
                    let op = if kind == Increment { PostInc } else { PostDec };
                    expr = self.node(NodeKind::UnaryExpr { op, operand: expr }, start, end);
                }
                // ternary: `consequence if predicate else alternative`
                If => {
                    self.expect(If)?;
                    let predicate = self.require_expr()?;
                    self.expect(Else)?;
                    let alternative = self.require_expr()?;
                    let end = self.ast.range(alternative).end;
                    expr = self.node(
                        NodeKind::IfExpr {
                            predicate,
                            consequence: expr,
                            alternative,
                        },
                        start,
                        end,
                    );
                }
                LBracket => {
                    self.expect(LBracket)?;
                    let index = self.require_expr()?;
                    let end = self.tok.range.end;
                    self.expect(RBracket)?;
                    expr = self.node(
                        NodeKind::IndexExpr {
                            object: expr,
                            index,
                        },
                        start,
                        end,
                    );
                }
                LParen => {
                    self.expect(LParen)?;
                    let mut arguments = Vec::new();
                    while self.tok.kind != RParen {
                        match self.parse_expr()? {
                            Some(arg) => arguments.push(arg),
                            None => break,
                        }
                        if !self.accept(Comma)? {
                            break;
                        }
                    }
                    let end = self.tok.range.end;
                    self.expect(RParen)?;
                    expr = self.node(
                        NodeKind::CallExpr {
                            callee: expr,
                            arguments,
                        },
                        start,
                        end,
                    );
                }
                Member => {
                    self.expect(Member)?;
                    let name = self.tok.text.clone();
                    let id_start = self.tok.range.start;
                    let id_end = self.tok.range.end;
                    self.expect(Identifier)?;
                    let member = self.node(NodeKind::Identifier(name), id_start, id_end);
                    expr = self.node(
                        NodeKind::MemberExpr {
                            object: expr,
                            member,
                        },
                        start,
                        id_end,
                    );
                }
                _ => unreachable!(),
            }
        }
        Ok(Some(expr))
    }

    fn parse_primary_expr(&mut self) -> Result<Option<NodeId>, SyntaxError> {
        use TokenKind::*;
        let start = self.tok.range.start;
        let end = self.tok.range.end;
        match self.tok.kind {
            Null => {
                self.expect(Null)?;
                Ok(Some(self.node(NodeKind::NullLiteral, start, end)))
            }
            True => {
                self.expect(True)?;
                Ok(Some(self.node(NodeKind::BoolLiteral(true), start, end)))
            }
            False => {
                self.expect(False)?;
                Ok(Some(self.node(NodeKind::BoolLiteral(false), start, end)))
            }
            IntLiteral => {
                let text = self.tok.text.clone();
                let value = self.parse_int(&text)?;
                self.expect(IntLiteral)?;
                Ok(Some(self.node(NodeKind::IntLiteral(value), start, end)))
            }
            FloatLiteral => {
                let text = self.tok.text.clone();
                let value = self.parse_float(&text)?;
                self.expect(FloatLiteral)?;
                Ok(Some(self.node(NodeKind::FloatLiteral(value), start, end)))
            }
            StringLiteral => {
                let text = self.tok.text.clone();
                self.expect(StringLiteral)?;
                Ok(Some(self.node(
                    NodeKind::StringLiteral(text),
                    start,
                    end,
                )))
            }
            Identifier => {
                let name = self.tok.text.clone();
                self.expect(Identifier)?;
                Ok(Some(self.node(NodeKind::Identifier(name), start, end)))
            }
            Function => self.parse_func_expr().map(Some),
            LParen => {
                self.expect(LParen)?;
                let expr = self.require_expr()?;
                self.expect(RParen)?;
                Ok(Some(expr))
            }
            LBrace => self.parse_object_expr().map(Some),
            _ => Ok(None),
        }
    }

    fn parse_func_expr(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::Function)?;
        let (arguments, stmts, end) = self.parse_func_tail()?;
        Ok(self.node(
            NodeKind::FunctionLiteral { arguments, stmts },
            start,
            end,
        ))
    }

    /// `{ name: expr, name: expr }`
    fn parse_object_expr(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.tok.range.start;
        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while self.tok.kind == TokenKind::Identifier {
            let key = self.tok.text.clone();
            self.expect(TokenKind::Identifier)?;
            self.expect(TokenKind::Colon)?;
            let value = self.require_expr()?;
            members.push((key, value));
            if !self.accept(TokenKind::Comma)? {
                break;
            }
        }
        let end = self.tok.range.end;
        self.expect(TokenKind::RBrace)?;
        Ok(self.node(NodeKind::ObjectLiteral { members }, start, end))
    }

    // ───────────────────────── Literal decoding ─────────────────────────

    fn literal_error(&self, message: String) -> SyntaxError {
        SyntaxError::new(
            message,
            self.tok.range.start.line,
            self.tok.range.start.column,
        )
    }

    /// Decodes an integer lexeme using the radix prefixes.
    fn parse_int(&self, text: &str) -> Result<u64, SyntaxError> {
        let (digits, radix) = split_radix(text);
        u64::from_str_radix(digits, radix)
            .map_err(|_| self.literal_error(format!("invalid integer literal '{text}'")))
    }

    /// Decodes a float lexeme. Radix-prefixed floats evaluate whole and
    /// fractional parts in the radix.
    fn parse_float(&self, text: &str) -> Result<f64, SyntaxError> {
        let bad = || self.literal_error(format!("invalid float literal '{text}'"));
        let (digits, radix) = split_radix(text);
        if radix == 10 && digits.len() == text.len() {
            return text.parse::<f64>().map_err(|_| bad());
        }
        let (whole, fract) = match digits.find('.') {
            Some(dot) => (&digits[..dot], &digits[dot + 1..]),
            None => (digits, ""),
        };
        let mut value = if whole.is_empty() {
            0.0
        } else {
            u64::from_str_radix(whole, radix).map_err(|_| bad())? as f64
        };
        if !fract.is_empty() {
            let part = u64::from_str_radix(fract, radix).map_err(|_| bad())? as f64;
            value += part / (radix as f64).powi(fract.len() as i32);
        }
        Ok(value)
    }
}

/// Splits a numeric lexeme into its digit text and radix.
fn split_radix(text: &str) -> (&str, u32) {
    let bytes = text.as_bytes();
    if bytes.len() > 2 && bytes[0] == b'0' {
        match bytes[1] {
            b'x' | b'X' => return (&text[2..], 16),
            b'b' | b'B' => return (&text[2..], 2),
            b'o' | b'O' => return (&text[2..], 8),
            b'd' | b'D' => return (&text[2..], 10),
            _ => {}
        }
    }
    if bytes.len() > 1 && bytes[0] == b'0' && bytes[1] != b'.' {
        return (text, 8);
    }
    (text, 10)
}
