//! The weft error taxonomy.
//!
//! Compile-time failures are never silently recovered: they abort the whole
//! compile and are re-wrapped with resource + line context at each recursive
//! boundary (include/extends/block), so the outermost caller sees a single,
//! precisely located message with the inner causes preserved.

use thiserror::Error;

/// Any error the engine can produce.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),

    #[error(transparent)]
    Compile(#[from] Box<CompileError>),

    #[error("template not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Error::Compile(Box::new(e))
    }
}

/// Malformed delimiter nesting detected while tokenizing.
#[derive(Debug, Error)]
#[error("tokenize error at offset {position}: {message}")]
pub struct TokenizeError {
    /// Byte offset of the unmatched delimiter.
    pub position: usize,
    pub message: String,
}

impl TokenizeError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Invalid template syntax, located at a resource and line.
#[derive(Debug, Error)]
#[error("{resource} line {line}: {message}")]
pub struct CompileError {
    /// Resource name of the template being compiled.
    pub resource: String,
    /// 1-indexed line where the error was detected.
    pub line: u32,
    pub message: String,
    /// The inner failure, when this error wraps a nested compile.
    #[source]
    pub cause: Option<Box<Error>>,
}

impl CompileError {
    pub fn new(resource: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            line,
            message: message.into(),
            cause: None,
        }
    }

    /// Wrap an inner error with position context at a recursive boundary.
    pub fn wrap(
        resource: impl Into<String>,
        line: u32,
        message: impl Into<String>,
        cause: Error,
    ) -> Self {
        Self {
            resource: resource.into(),
            line,
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }
}

/// A failure raised during rendering, not compilation.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("unknown filter `{0}`")]
    UnknownFilter(String),

    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    #[error("`{0}` is not an object")]
    NotAnObject(String),

    #[error("method `{method}` failed: {message}")]
    Method { method: String, message: String },

    #[error("filter `{name}` expects {expected} argument(s), got {got}")]
    FilterArity {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{0}")]
    Message(String),
}

impl RuntimeError {
    pub fn msg(message: impl Into<String>) -> Self {
        RuntimeError::Message(message.into())
    }
}
