use thiserror::Error;

/// Error raised by the lexer and parser.
///
/// Carries the 1-based line and 0-based column of the offending input.
/// Syntax errors are never recovered from; they surface directly to the
/// caller of `parse`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
        SyntaxError {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Error raised by the lowering pass, the assembler and the VM.
///
/// The VM halts on any runtime error; there is no try/catch surface
/// (the `try`/`catch`/`throw`/`finally` keywords are reserved for a
/// future extension).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("runtime error: {message}")]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        RuntimeError {
            message: message.into(),
        }
    }
}

/// Union of the two error families, for callers driving the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
