use crate::frontend::token::{SourceRange, TokenKind};

/// Index of a node in the [`Ast`] arena.
pub type NodeId = usize;

/// One AST node: a tagged kind plus the source range it covers and a
/// non-owning reference to its parent.
///
/// Parent links are derived by [`Ast::resolve_parents`] after parsing;
/// edges from parent to child (the `NodeId`s inside [`NodeKind`]) are the
/// authoritative tree structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub range: SourceRange,
    pub parent: Option<NodeId>,
}

/// The node variants of the Pop AST.
///
/// Expressions and statements share one sum type; the parser guarantees
/// each appears only where its grammar allows.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Root of a parsed source file.
    Module {
        filename: String,
        stmts: Vec<NodeId>,
    },

    // Literal expressions
    NullLiteral,
    BoolLiteral(bool),
    IntLiteral(u64),
    FloatLiteral(f64),
    StringLiteral(String),
    Identifier(String),

    // Compound expressions
    ListLiteral {
        elements: Vec<NodeId>,
    },
    FunctionLiteral {
        arguments: Vec<String>,
        stmts: Vec<NodeId>,
    },
    ObjectLiteral {
        members: Vec<(String, NodeId)>,
    },
    UnaryExpr {
        op: TokenKind,
        operand: NodeId,
    },
    BinaryExpr {
        op: TokenKind,
        left: NodeId,
        right: NodeId,
    },
    SliceExpr {
        start: Option<NodeId>,
        stop: Option<NodeId>,
        step: Option<NodeId>,
    },
    IndexExpr {
        object: NodeId,
        index: NodeId,
    },
    MemberExpr {
        object: NodeId,
        member: NodeId,
    },
    CallExpr {
        callee: NodeId,
        arguments: Vec<NodeId>,
    },
    IfExpr {
        predicate: NodeId,
        consequence: NodeId,
        alternative: NodeId,
    },
    ForExpr {
        value: NodeId,
        iterator: NodeId,
        sequence: NodeId,
    },

    // Statements
    LetBinding {
        name: String,
        value: Option<NodeId>,
    },
    LabelDecl {
        name: String,
    },
    EmptyStmt,
    ExprStmt {
        expr: NodeId,
    },
    CompoundStmt {
        stmts: Vec<NodeId>,
    },
    BreakStmt,
    ContinueStmt,
    GotoStmt {
        label: String,
    },
    ReturnStmt {
        expr: Option<NodeId>,
    },
    IfStmt {
        predicate: NodeId,
        consequence: NodeId,
        alternative: Option<NodeId>,
    },
    UnlessStmt {
        predicate: NodeId,
        consequence: NodeId,
        alternative: Option<NodeId>,
    },
    DoWhileStmt {
        expr: NodeId,
        stmt: NodeId,
    },
    DoUntilStmt {
        expr: NodeId,
        stmt: NodeId,
    },
    WhileStmt {
        expr: NodeId,
        stmt: NodeId,
    },
    UntilStmt {
        expr: NodeId,
        stmt: NodeId,
    },
    ForStmt {
        iterator: NodeId,
        sequence: NodeId,
        stmt: NodeId,
    },
}

/// Arena of AST nodes; nodes reference each other by index, which keeps
/// the upward parent links free of ownership concerns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ast {
    nodes: Vec<Node>,
    pub root: NodeId,
}

impl Ast {
    pub fn new() -> Self {
        Ast {
            nodes: Vec::new(),
            root: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends a node and returns its id.
    pub fn add(&mut self, kind: NodeKind, range: SourceRange) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            range,
            parent: None,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn range(&self, id: NodeId) -> SourceRange {
        self.nodes[id].range
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    /// Child ids of a node, in source order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        use NodeKind::*;
        match &self.nodes[id].kind {
            Module { stmts, .. }
            | CompoundStmt { stmts }
            | FunctionLiteral { stmts, .. } => stmts.clone(),
            ListLiteral { elements } => elements.clone(),
            ObjectLiteral { members } => members.iter().map(|(_, v)| *v).collect(),
            UnaryExpr { operand, .. } => vec![*operand],
            BinaryExpr { left, right, .. } => vec![*left, *right],
            SliceExpr { start, stop, step } => {
                [*start, *stop, *step].into_iter().flatten().collect()
            }
            IndexExpr { object, index } => vec![*object, *index],
            MemberExpr { object, member } => vec![*object, *member],
            CallExpr { callee, arguments } => {
                let mut out = vec![*callee];
                out.extend(arguments);
                out
            }
            IfExpr {
                predicate,
                consequence,
                alternative,
            } => vec![*predicate, *consequence, *alternative],
            ForExpr {
                value,
                iterator,
                sequence,
            } => vec![*value, *iterator, *sequence],
            LetBinding { value, .. } => value.iter().copied().collect(),
            ExprStmt { expr } => vec![*expr],
            ReturnStmt { expr } => expr.iter().copied().collect(),
            IfStmt {
                predicate,
                consequence,
                alternative,
            }
            | UnlessStmt {
                predicate,
                consequence,
                alternative,
            } => {
                let mut out = vec![*predicate, *consequence];
                out.extend(alternative);
                out
            }
            DoWhileStmt { expr, stmt }
            | DoUntilStmt { expr, stmt }
            | WhileStmt { expr, stmt }
            | UntilStmt { expr, stmt } => vec![*expr, *stmt],
            ForStmt {
                iterator,
                sequence,
                stmt,
            } => vec![*iterator, *sequence, *stmt],
            NullLiteral
            | BoolLiteral(_)
            | IntLiteral(_)
            | FloatLiteral(_)
            | StringLiteral(_)
            | Identifier(_)
            | LabelDecl { .. }
            | EmptyStmt
            | BreakStmt
            | ContinueStmt
            | GotoStmt { .. } => Vec::new(),
        }
    }

    /// Walks the tree from the root and fills in every node's parent
    /// link. The root keeps `parent == None`.
    pub fn resolve_parents(&mut self) {
        let mut stack = vec![(self.root, None)];
        while let Some((id, parent)) = stack.pop() {
            self.nodes[id].parent = parent;
            for child in self.children(id) {
                stack.push((child, Some(id)));
            }
        }
    }
}
