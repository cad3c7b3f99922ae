use thiserror::Error;

use crate::error::PositionalError;

/// An error found while reading a textual IR listing.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{kind}")]
pub struct ReadError {
    /// One-based line number of the offending line.
    pub line: usize,
    pub kind: ReadErrorKind,
}
impl ReadError {
    pub fn new(line: usize, kind: ReadErrorKind) -> Self {
        Self { line, kind }
    }
}

impl PositionalError for ReadError {
    fn line(&self) -> usize {
        self.line
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadErrorKind {
    #[error("unknown opcode '{0}'")]
    UnknownOpcode(String),
    #[error("invalid operand '{0}'")]
    InvalidOperand(String),
    #[error("an instruction takes at most three operands, found {0}")]
    TooManyOperands(usize),
    #[error("unbalanced brackets in '{0}'")]
    Unbalanced(String),
    #[error("procedure name missing")]
    MissingName,
}
