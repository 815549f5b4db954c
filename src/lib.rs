//! Pop: a small dynamically-typed language with lexical scoping,
//! compiled to byte code and executed on a stack-based virtual machine.
//!
//! The pipeline is `source → tokens → AST → instruction list → byte-code
//! image → execution`:
//!
//! ```
//! let image = pop::compile("let x = 1 + 2; print(x);").unwrap();
//! let listing = pop::bytecode::disasm::disassemble(&image).unwrap();
//! assert!(!listing.is_empty());
//! ```

pub mod ast;
pub mod bytecode;
pub mod error;
pub mod frontend;
pub mod runtime;

pub use error::{Error, RuntimeError, SyntaxError};

use crate::ast::Ast;

/// Parses a source stream into an AST with parent links resolved.
pub fn parse(source: &str, filename: &str) -> Result<Ast, SyntaxError> {
    frontend::Parser::with_filename(source, filename).parse()
}

/// Compiles source text to a binary byte-code image.
pub fn compile(source: &str) -> Result<Vec<u8>, Error> {
    compile_file(source, "<stream>")
}

/// Compiles source text to a binary byte-code image, naming the input.
pub fn compile_file(source: &str, filename: &str) -> Result<Vec<u8>, Error> {
    let ast = parse(source, filename)?;
    let ops = bytecode::lower(&ast)?;
    let image = bytecode::assemble(&ops)?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_pipeline() {
        let image = compile("let x = 1 + 2; print(x);").unwrap();
        assert!(!image.is_empty());
        // a compiled image always ends in HALT
        assert_eq!(*image.last().unwrap(), bytecode::Opcode::Halt as u8);
    }

    #[test]
    fn test_compile_reports_syntax_errors() {
        match compile("let = 1;") {
            Err(Error::Syntax(err)) => assert!(err.message.contains("IDENTIFIER")),
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_compile_reports_lowering_errors() {
        match compile("break;") {
            Err(Error::Runtime(err)) => assert!(err.message.contains("break")),
            other => panic!("expected a runtime error, got {other:?}"),
        }
    }
}
