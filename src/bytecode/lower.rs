use crate::ast::{Ast, NodeId, NodeKind};
use crate::bytecode::ir::{Ins, InstructionList};
use crate::bytecode::op::Opcode;
use crate::error::RuntimeError;

/// Entry point label of every assembled module.
pub const START_LABEL: &str = "_pop_start_";

/// Lowers a parsed module into a linear instruction list with symbolic
/// labels.
///
/// The result is laid out as: a jump to `_pop_start_`, the function
/// declaration units, the `_pop_start_` label, `OPEN_SCOPE`, the
/// top-level code, `CLOSE_SCOPE`, `HALT`.
pub fn lower(ast: &Ast) -> Result<InstructionList, RuntimeError> {
    let mut lowerer = Lowerer {
        ast,
        decls: Vec::new(),
        depth_stack: vec![0],
        control_stack: Vec::new(),
    };

    let stmts = match ast.kind(ast.root) {
        NodeKind::Module { stmts, .. } => stmts.clone(),
        other => {
            return Err(RuntimeError::new(format!(
                "lowering expects a module root, found {other:?}"
            )))
        }
    };

    let mut code = Vec::new();
    for stmt in stmts {
        lowerer.stmt(stmt, &mut code)?;
    }

    let mut combined = Vec::with_capacity(lowerer.decls.len() + code.len() + 5);
    combined.push(Ins::Jump(START_LABEL.to_string()));
    combined.append(&mut lowerer.decls);
    combined.push(Ins::Label(START_LABEL.to_string()));
    combined.push(Ins::OpenScope);
    combined.append(&mut code);
    combined.push(Ins::CloseScope);
    combined.push(Ins::Halt);
    Ok(combined)
}

struct Lowerer<'a> {
    ast: &'a Ast,
    /// Completed function body units, in definition order.
    decls: InstructionList,
    /// Label counters, one per nesting level.
    depth_stack: Vec<u32>,
    /// Base names of the enclosing control-flow statements, for
    /// `break`/`continue` targeting.
    control_stack: Vec<String>,
}

impl<'a> Lowerer<'a> {
    /// Produces a fresh label base name from the counter stack and bumps
    /// the innermost counter.
    fn auto_name(&mut self) -> String {
        let mut name = String::from("_pop_");
        for count in &self.depth_stack {
            name.push_str(&count.to_string());
            name.push('_');
        }
        *self.depth_stack.last_mut().unwrap() += 1;
        name
    }

    fn enter(&mut self) {
        self.depth_stack.push(0);
    }

    /// Leaves a nesting level. The new innermost counter is bumped so a
    /// sibling level cannot reproduce the same names.
    fn leave(&mut self) {
        self.depth_stack.pop();
        *self.depth_stack.last_mut().unwrap() += 1;
    }

    fn unsupported(&self, what: &str) -> RuntimeError {
        RuntimeError::new(format!("cannot lower {what}"))
    }

    fn stmt(&mut self, id: NodeId, ops: &mut InstructionList) -> Result<(), RuntimeError> {
        match self.ast.kind(id) {
            NodeKind::LetBinding { name, value } => {
                match value {
                    Some(value) => self.expr(*value, ops)?,
                    None => ops.push(Ins::PushNull),
                }
                ops.push(Ins::Bind(name.clone()));
            }
            NodeKind::LabelDecl { name } => {
                ops.push(Ins::Label(format!("_pop_label_{name}")));
            }
            NodeKind::EmptyStmt => {}
            NodeKind::ExprStmt { expr } => {
                self.expr(*expr, ops)?;
                // PRINT consumes its operand, so a print call leaves no
                // residue to discard
                if !matches!(ops.last(), Some(Ins::Print)) {
                    ops.push(Ins::PopTop);
                }
            }
            // compound statements contribute label-nesting depth only;
            // block scoping is a future extension
            NodeKind::CompoundStmt { stmts } => {
                self.enter();
                for stmt in stmts.clone() {
                    self.stmt(stmt, ops)?;
                }
                self.leave();
            }
            NodeKind::BreakStmt => match self.control_stack.last() {
                Some(base) => ops.push(Ins::Jump(format!("{base}end_"))),
                None => return Err(RuntimeError::new("'break' outside of a loop")),
            },
            NodeKind::ContinueStmt => match self.control_stack.last() {
                Some(base) => ops.push(Ins::Jump(format!("{base}begin_"))),
                None => return Err(RuntimeError::new("'continue' outside of a loop")),
            },
            NodeKind::GotoStmt { label } => {
                ops.push(Ins::Jump(format!("_pop_label_{label}")));
            }
            NodeKind::ReturnStmt { expr } => {
                match expr {
                    Some(expr) => self.expr(*expr, ops)?,
                    None => ops.push(Ins::PushNull),
                }
                ops.push(Ins::CloseScope);
                ops.push(Ins::Return);
            }
            NodeKind::IfStmt {
                predicate,
                consequence,
                alternative,
            } => {
                let (predicate, consequence, alternative) =
                    (*predicate, *consequence, *alternative);
                let name = self.auto_name();
                self.expr(predicate, ops)?;
                ops.push(Ins::JumpFalse(format!("{name}else_")));
                self.stmt(consequence, ops)?;
                ops.push(Ins::Jump(format!("{name}endif_")));
                ops.push(Ins::Label(format!("{name}else_")));
                if let Some(alternative) = alternative {
                    self.stmt(alternative, ops)?;
                }
                ops.push(Ins::Label(format!("{name}endif_")));
            }
            NodeKind::UnlessStmt {
                predicate,
                consequence,
                alternative,
            } => {
                let (predicate, consequence, alternative) =
                    (*predicate, *consequence, *alternative);
                let name = self.auto_name();
                self.expr(predicate, ops)?;
                ops.push(Ins::JumpTrue(format!("{name}else_")));
                self.stmt(consequence, ops)?;
                ops.push(Ins::Jump(format!("{name}endif_")));
                ops.push(Ins::Label(format!("{name}else_")));
                if let Some(alternative) = alternative {
                    self.stmt(alternative, ops)?;
                }
                ops.push(Ins::Label(format!("{name}endif_")));
            }
            NodeKind::DoWhileStmt { expr, stmt } => {
                let (expr, stmt) = (*expr, *stmt);
                let name = self.auto_name();
                ops.push(Ins::Label(format!("{name}begin_")));
                self.control_stack.push(name.clone());
                self.stmt(stmt, ops)?;
                self.control_stack.pop();
                self.expr(expr, ops)?;
                ops.push(Ins::JumpTrue(format!("{name}begin_")));
                ops.push(Ins::Label(format!("{name}end_")));
            }
            NodeKind::DoUntilStmt { expr, stmt } => {
                let (expr, stmt) = (*expr, *stmt);
                let name = self.auto_name();
                ops.push(Ins::Label(format!("{name}begin_")));
                self.control_stack.push(name.clone());
                self.stmt(stmt, ops)?;
                self.control_stack.pop();
                self.expr(expr, ops)?;
                ops.push(Ins::JumpFalse(format!("{name}begin_")));
                ops.push(Ins::Label(format!("{name}end_")));
            }
            NodeKind::WhileStmt { expr, stmt } => {
                let (expr, stmt) = (*expr, *stmt);
                let name = self.auto_name();
                ops.push(Ins::Label(format!("{name}begin_")));
                self.expr(expr, ops)?;
                ops.push(Ins::JumpFalse(format!("{name}end_")));
                self.control_stack.push(name.clone());
                self.stmt(stmt, ops)?;
                self.control_stack.pop();
                ops.push(Ins::Jump(format!("{name}begin_")));
                ops.push(Ins::Label(format!("{name}end_")));
            }
            NodeKind::UntilStmt { expr, stmt } => {
                let (expr, stmt) = (*expr, *stmt);
                let name = self.auto_name();
                ops.push(Ins::Label(format!("{name}begin_")));
                self.expr(expr, ops)?;
                ops.push(Ins::JumpTrue(format!("{name}end_")));
                self.control_stack.push(name.clone());
                self.stmt(stmt, ops)?;
                self.control_stack.pop();
                ops.push(Ins::Jump(format!("{name}begin_")));
                ops.push(Ins::Label(format!("{name}end_")));
            }
            NodeKind::ForStmt { .. } => return Err(self.unsupported("'for' statements")),
            other => {
                return Err(RuntimeError::new(format!(
                    "expected a statement, found {other:?}"
                )))
            }
        }
        Ok(())
    }

    fn expr(&mut self, id: NodeId, ops: &mut InstructionList) -> Result<(), RuntimeError> {
        match self.ast.kind(id) {
            NodeKind::NullLiteral => ops.push(Ins::PushNull),
            NodeKind::BoolLiteral(true) => ops.push(Ins::PushTrue),
            NodeKind::BoolLiteral(false) => ops.push(Ins::PushFalse),
            NodeKind::IntLiteral(value) => ops.push(Ins::PushInt(*value)),
            NodeKind::FloatLiteral(value) => ops.push(Ins::PushFloat(*value)),
            NodeKind::StringLiteral(value) => ops.push(Ins::PushString(value.clone())),
            NodeKind::Identifier(name) => ops.push(Ins::PushSymbol(name.clone())),
            NodeKind::ListLiteral { elements } => {
                let elements = elements.clone();
                for element in elements.iter().rev() {
                    self.expr(*element, ops)?;
                }
                ops.push(Ins::PushList(elements.len() as u32));
            }
            NodeKind::FunctionLiteral { arguments, stmts } => {
                let (arguments, stmts) = (arguments.clone(), stmts.clone());
                let name = self.auto_name();
                self.enter();
                // the body is built in its own buffer and appended to
                // the decls sequence as one unit, so a nested function
                // literal cannot splice into an enclosing body
                let mut body = Vec::new();
                body.push(Ins::Label(name.clone()));
                body.push(Ins::OpenScope);
                for argument in &arguments {
                    body.push(Ins::Bind(argument.clone()));
                }
                for stmt in stmts {
                    self.stmt(stmt, &mut body)?;
                }
                body.push(Ins::CloseScope);
                self.leave();
                self.decls.append(&mut body);
                ops.push(Ins::PushFunction(name));
            }
            NodeKind::UnaryExpr { op, operand } => {
                let (op, operand) = (*op, *operand);
                self.expr(operand, ops)?;
                let opcode = Opcode::from_token(op).ok_or_else(|| {
                    RuntimeError::new(format!("no op-code for operator '{}'", op.name()))
                })?;
                ops.push(Ins::Un(opcode));
            }
            NodeKind::BinaryExpr { op, left, right } => {
                let (op, left, right) = (*op, *left, *right);
                // right first: the VM pops the left operand first
                self.expr(right, ops)?;
                self.expr(left, ops)?;
                let opcode = Opcode::from_token(op).ok_or_else(|| {
                    RuntimeError::new(format!("no op-code for operator '{}'", op.name()))
                })?;
                ops.push(Ins::Bin(opcode));
            }
            NodeKind::SliceExpr { start, stop, step } => {
                let (start, stop, step) = (*start, *stop, *step);
                for part in [step, stop, start] {
                    match part {
                        Some(part) => self.expr(part, ops)?,
                        None => ops.push(Ins::PushNull),
                    }
                }
                ops.push(Ins::PushSlice);
            }
            NodeKind::IndexExpr { object, index } => {
                let (object, index) = (*object, *index);
                self.expr(object, ops)?;
                self.expr(index, ops)?;
                ops.push(Ins::Index);
            }
            NodeKind::MemberExpr { object, member } => {
                let (object, member) = (*object, *member);
                self.expr(object, ops)?;
                match self.ast.kind(member) {
                    NodeKind::Identifier(name) => ops.push(Ins::PushString(name.clone())),
                    other => {
                        return Err(RuntimeError::new(format!(
                            "member access expects a name, found {other:?}"
                        )))
                    }
                }
                ops.push(Ins::Member);
            }
            NodeKind::CallExpr { callee, arguments } => {
                let (callee, arguments) = (*callee, arguments.clone());
                for argument in arguments.iter().rev() {
                    self.expr(*argument, ops)?;
                }
                if arguments.len() > u8::MAX as usize {
                    return Err(RuntimeError::new(format!(
                        "call with {} arguments exceeds the limit of 255",
                        arguments.len()
                    )));
                }
                // the builtin print intrinsic bypasses symbol resolution
                if matches!(self.ast.kind(callee), NodeKind::Identifier(name) if name == "print")
                {
                    ops.push(Ins::Print);
                } else {
                    self.expr(callee, ops)?;
                    ops.push(Ins::Call(arguments.len() as u8));
                }
            }
            NodeKind::IfExpr {
                predicate,
                consequence,
                alternative,
            } => {
                let (predicate, consequence, alternative) =
                    (*predicate, *consequence, *alternative);
                let name = self.auto_name();
                self.expr(predicate, ops)?;
                ops.push(Ins::JumpFalse(format!("{name}else_")));
                self.expr(consequence, ops)?;
                ops.push(Ins::Jump(format!("{name}endif_")));
                ops.push(Ins::Label(format!("{name}else_")));
                self.expr(alternative, ops)?;
                ops.push(Ins::Label(format!("{name}endif_")));
            }
            NodeKind::ObjectLiteral { .. } => {
                return Err(self.unsupported("object literals"))
            }
            NodeKind::ForExpr { .. } => return Err(self.unsupported("'for' expressions")),
            other => {
                return Err(RuntimeError::new(format!(
                    "expected an expression, found {other:?}"
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::Parser;

    fn lower_source(source: &str) -> InstructionList {
        let ast = Parser::new(source).parse().unwrap();
        lower(&ast).unwrap()
    }

    fn lower_err(source: &str) -> RuntimeError {
        let ast = Parser::new(source).parse().unwrap();
        lower(&ast).unwrap_err()
    }

    #[test]
    fn test_empty_module_shape() {
        assert_eq!(
            lower_source(""),
            vec![
                Ins::Jump("_pop_start_".into()),
                Ins::Label("_pop_start_".into()),
                Ins::OpenScope,
                Ins::CloseScope,
                Ins::Halt,
            ]
        );
    }

    #[test]
    fn test_let_and_print_lowering() {
        // the byte-level scenario from the toolchain contract
        assert_eq!(
            lower_source("let x = 1 + 2; print(x);"),
            vec![
                Ins::Jump("_pop_start_".into()),
                Ins::Label("_pop_start_".into()),
                Ins::OpenScope,
                // right operand pushed first, so the VM pops left first
                Ins::PushInt(2),
                Ins::PushInt(1),
                Ins::Bin(Opcode::Add),
                Ins::Bind("x".into()),
                Ins::PushSymbol("x".into()),
                Ins::Print,
                Ins::CloseScope,
                Ins::Halt,
            ]
        );
    }

    #[test]
    fn test_expr_stmt_pops_residue() {
        let ops = lower_source("1;");
        assert_eq!(
            ops[3..5],
            [Ins::PushInt(1), Ins::PopTop]
        );
    }

    #[test]
    fn test_if_else_lowering() {
        assert_eq!(
            lower_source("if (a) b; else c;"),
            vec![
                Ins::Jump("_pop_start_".into()),
                Ins::Label("_pop_start_".into()),
                Ins::OpenScope,
                Ins::PushSymbol("a".into()),
                Ins::JumpFalse("_pop_0_else_".into()),
                Ins::PushSymbol("b".into()),
                Ins::PopTop,
                Ins::Jump("_pop_0_endif_".into()),
                Ins::Label("_pop_0_else_".into()),
                Ins::PushSymbol("c".into()),
                Ins::PopTop,
                Ins::Label("_pop_0_endif_".into()),
                Ins::CloseScope,
                Ins::Halt,
            ]
        );
    }

    #[test]
    fn test_unless_inverts_the_test() {
        let ops = lower_source("unless (a) b;");
        assert!(ops.contains(&Ins::JumpTrue("_pop_0_else_".into())));
    }

    #[test]
    fn test_while_lowering() {
        assert_eq!(
            lower_source("while (a) b;"),
            vec![
                Ins::Jump("_pop_start_".into()),
                Ins::Label("_pop_start_".into()),
                Ins::OpenScope,
                Ins::Label("_pop_0_begin_".into()),
                Ins::PushSymbol("a".into()),
                Ins::JumpFalse("_pop_0_end_".into()),
                Ins::PushSymbol("b".into()),
                Ins::PopTop,
                Ins::Jump("_pop_0_begin_".into()),
                Ins::Label("_pop_0_end_".into()),
                Ins::CloseScope,
                Ins::Halt,
            ]
        );
    }

    #[test]
    fn test_until_inverts_the_test() {
        let ops = lower_source("until (a) b;");
        assert!(ops.contains(&Ins::JumpTrue("_pop_0_end_".into())));
    }

    #[test]
    fn test_do_while_tests_after_body() {
        let ops = lower_source("do a; while (b);");
        let begin = ops
            .iter()
            .position(|op| *op == Ins::Label("_pop_0_begin_".into()))
            .unwrap();
        let test = ops
            .iter()
            .position(|op| *op == Ins::JumpTrue("_pop_0_begin_".into()))
            .unwrap();
        let body = ops
            .iter()
            .position(|op| *op == Ins::PushSymbol("a".into()))
            .unwrap();
        assert!(begin < body && body < test);

        let ops = lower_source("do a; unless (b);");
        assert!(ops.contains(&Ins::JumpFalse("_pop_0_begin_".into())));
    }

    #[test]
    fn test_break_and_continue_target_enclosing_loop() {
        let ops = lower_source("while (a) { break; continue; }");
        assert!(ops.contains(&Ins::Jump("_pop_0_end_".into())));
        assert!(ops.contains(&Ins::Jump("_pop_0_begin_".into())));
    }

    #[test]
    fn test_break_outside_loop_fails() {
        let err = lower_err("break;");
        assert!(err.message.contains("break"), "{}", err.message);
    }

    #[test]
    fn test_goto_label_naming() {
        let ops = lower_source("goto out;");
        assert!(ops.contains(&Ins::Jump("_pop_label_out".into())));
    }

    #[test]
    fn test_return_closes_scope() {
        let ops = lower_source("function f() { return 1; } ");
        let ret = ops.iter().position(|op| *op == Ins::Return).unwrap();
        assert_eq!(ops[ret - 1], Ins::CloseScope);
        assert_eq!(ops[ret - 2], Ins::PushInt(1));

        // a bare `return;` yields null
        let ops = lower_source("function f() { return; } ");
        let ret = ops.iter().position(|op| *op == Ins::Return).unwrap();
        assert_eq!(ops[ret - 1], Ins::CloseScope);
        assert_eq!(ops[ret - 2], Ins::PushNull);
    }

    #[test]
    fn test_function_literal_body_in_decls() {
        let ops = lower_source("let f = function(a, b) { return a; };");
        // decls come right after the entry jump, before _pop_start_
        assert_eq!(ops[0], Ins::Jump("_pop_start_".into()));
        assert_eq!(ops[1], Ins::Label("_pop_0_".into()));
        assert_eq!(ops[2], Ins::OpenScope);
        assert_eq!(ops[3], Ins::Bind("a".into()));
        assert_eq!(ops[4], Ins::Bind("b".into()));
        // body: PUSH_SYMBOL a; CLOSE_SCOPE; RETURN; then trailing CLOSE_SCOPE
        assert_eq!(ops[5], Ins::PushSymbol("a".into()));
        assert_eq!(ops[6], Ins::CloseScope);
        assert_eq!(ops[7], Ins::Return);
        assert_eq!(ops[8], Ins::CloseScope);
        let start = ops
            .iter()
            .position(|op| *op == Ins::Label("_pop_start_".into()))
            .unwrap();
        assert_eq!(start, 9);
        // code references the function by its label
        assert!(ops[start..].contains(&Ins::PushFunction("_pop_0_".into())));
        assert!(ops[start..].contains(&Ins::Bind("f".into())));
    }

    #[test]
    fn test_nested_function_literals_do_not_interleave() {
        let ops =
            lower_source("let f = function() { let g = function() { return 1; }; };");
        // the inner unit is completed before the outer unit is appended
        let inner = ops
            .iter()
            .position(|op| *op == Ins::Label("_pop_0_0_".into()))
            .unwrap();
        let outer = ops
            .iter()
            .position(|op| *op == Ins::Label("_pop_0_".into()))
            .unwrap();
        assert!(inner < outer);
        // the outer body binds g to the inner function
        let bind_g = ops
            .iter()
            .position(|op| *op == Ins::Bind("g".into()))
            .unwrap();
        assert!(bind_g > outer);
        assert_eq!(ops[bind_g - 1], Ins::PushFunction("_pop_0_0_".into()));
    }

    #[test]
    fn test_call_prefers_print_intrinsic() {
        let ops = lower_source("print(1, 2);");
        // arguments are pushed in reverse, then PRINT without a CALL
        assert_eq!(ops[3], Ins::PushInt(2));
        assert_eq!(ops[4], Ins::PushInt(1));
        assert_eq!(ops[5], Ins::Print);
        assert!(!ops.iter().any(|op| matches!(op, Ins::Call(_))));
    }

    #[test]
    fn test_call_through_symbol() {
        let ops = lower_source("f(1, 2, 3);");
        assert_eq!(ops[3], Ins::PushInt(3));
        assert_eq!(ops[4], Ins::PushInt(2));
        assert_eq!(ops[5], Ins::PushInt(1));
        assert_eq!(ops[6], Ins::PushSymbol("f".into()));
        assert_eq!(ops[7], Ins::Call(3));
    }

    #[test]
    fn test_unary_lowering() {
        let ops = lower_source("-a;");
        assert_eq!(ops[3], Ins::PushSymbol("a".into()));
        assert_eq!(ops[4], Ins::Un(Opcode::Neg));

        let ops = lower_source("!a;");
        assert_eq!(ops[4], Ins::Un(Opcode::LogNot));
    }

    #[test]
    fn test_assignment_lowering() {
        let ops = lower_source("a = 5;");
        assert_eq!(ops[3], Ins::PushInt(5));
        assert_eq!(ops[4], Ins::PushSymbol("a".into()));
        assert_eq!(ops[5], Ins::Bin(Opcode::IpAssign));

        let ops = lower_source("a += 1;");
        assert_eq!(ops[5], Ins::Bin(Opcode::IpAdd));
    }

    #[test]
    fn test_ternary_lowering() {
        let ops = lower_source("let r = a if p else b;");
        assert!(ops.contains(&Ins::JumpFalse("_pop_0_else_".into())));
        assert!(ops.contains(&Ins::Jump("_pop_0_endif_".into())));
    }

    #[test]
    fn test_sibling_compounds_get_distinct_labels() {
        let ops = lower_source("{ if (a) b; } { if (c) d; }");
        let labels: Vec<&Ins> = ops
            .iter()
            .filter(|op| matches!(op, Ins::Label(_)))
            .collect();
        let mut unique = labels.clone();
        unique.sort_by_key(|op| format!("{op:?}"));
        unique.dedup();
        assert_eq!(labels.len(), unique.len(), "duplicate labels in {ops:?}");
    }

    #[test]
    fn test_member_lowering() {
        let ops = lower_source("a.b;");
        assert_eq!(ops[3], Ins::PushSymbol("a".into()));
        assert_eq!(ops[4], Ins::PushString("b".into()));
        assert_eq!(ops[5], Ins::Member);
    }

    #[test]
    fn test_index_lowering() {
        let ops = lower_source("a[0];");
        assert_eq!(ops[3], Ins::PushSymbol("a".into()));
        assert_eq!(ops[4], Ins::PushInt(0));
        assert_eq!(ops[5], Ins::Index);
    }

    #[test]
    fn test_unsupported_constructs() {
        assert!(lower_err("({ a: 1 });").message.contains("object literals"));
        assert!(lower_err("for (i in xs) x;").message.contains("'for'"));
    }

    // The remaining node kinds have no surface syntax, so their lowering
    // is exercised from constructed trees.

    use crate::ast::{Ast, NodeKind};
    use crate::frontend::token::SourceRange;

    fn module_of(build: impl FnOnce(&mut Ast) -> Vec<crate::ast::NodeId>) -> Ast {
        let mut ast = Ast::new();
        let stmts = build(&mut ast);
        let root = ast.add(
            NodeKind::Module {
                filename: "<test>".to_string(),
                stmts,
            },
            SourceRange::default(),
        );
        ast.root = root;
        ast.resolve_parents();
        ast
    }

    #[test]
    fn test_list_literal_lowers_in_reverse() {
        let ast = module_of(|ast| {
            let one = ast.add(NodeKind::IntLiteral(1), SourceRange::default());
            let two = ast.add(NodeKind::IntLiteral(2), SourceRange::default());
            let list = ast.add(
                NodeKind::ListLiteral {
                    elements: vec![one, two],
                },
                SourceRange::default(),
            );
            let stmt = ast.add(NodeKind::ExprStmt { expr: list }, SourceRange::default());
            vec![stmt]
        });
        let ops = lower(&ast).unwrap();
        assert_eq!(ops[3], Ins::PushInt(2));
        assert_eq!(ops[4], Ins::PushInt(1));
        assert_eq!(ops[5], Ins::PushList(2));
    }

    #[test]
    fn test_slice_expr_fills_missing_parts_with_null() {
        let ast = module_of(|ast| {
            let start = ast.add(NodeKind::IntLiteral(1), SourceRange::default());
            let slice = ast.add(
                NodeKind::SliceExpr {
                    start: Some(start),
                    stop: None,
                    step: None,
                },
                SourceRange::default(),
            );
            let stmt = ast.add(NodeKind::ExprStmt { expr: slice }, SourceRange::default());
            vec![stmt]
        });
        let ops = lower(&ast).unwrap();
        // pushed step, stop, start
        assert_eq!(ops[3], Ins::PushNull);
        assert_eq!(ops[4], Ins::PushNull);
        assert_eq!(ops[5], Ins::PushInt(1));
        assert_eq!(ops[6], Ins::PushSlice);
    }

    #[test]
    fn test_label_decl_and_goto_resolve_together() {
        let ast = module_of(|ast| {
            let goto = ast.add(
                NodeKind::GotoStmt {
                    label: "done".to_string(),
                },
                SourceRange::default(),
            );
            let skipped = ast.add(NodeKind::IntLiteral(9), SourceRange::default());
            let skipped = ast.add(
                NodeKind::ExprStmt { expr: skipped },
                SourceRange::default(),
            );
            let decl = ast.add(
                NodeKind::LabelDecl {
                    name: "done".to_string(),
                },
                SourceRange::default(),
            );
            vec![goto, skipped, decl]
        });
        let ops = lower(&ast).unwrap();
        assert!(ops.contains(&Ins::Jump("_pop_label_done".into())));
        assert!(ops.contains(&Ins::Label("_pop_label_done".into())));
        // the pair survives assembly
        assert!(crate::bytecode::asm::assemble(&ops).is_ok());
    }
}
