// ABOUTME: Error taxonomy shared by the compiler and the evaluator

use thiserror::Error;

/// Every way a compile or an evaluation can go wrong.
///
/// The first five variants are *value errors*: they travel through the
/// postfix stream like any other value and can be inspected with
/// `iserror(x)`. The rest are *blocking*: they abort the compile or the
/// evaluation outright.
///
/// Variants are declared in ascending severity; the generic-typed parser
/// keeps the worst error seen across its typed attempts.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Variable not known to the resolver.
    #[error("unresolved reference")]
    Ref,
    /// Invalid arithmetic, e.g. `0/0` or `sqrt(-1)`.
    #[error("not a number")]
    Nan,
    /// Numeric overflow: a finite computation left the double range.
    #[error("numeric overflow")]
    Huge,
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivByZero,
    /// Invalid value: bad literal range, or a variable of an unexpected type.
    #[error("invalid value")]
    Value,
    /// Unspecified failure, e.g. an unmatched parenthesis at finalization.
    #[error("error")]
    Generic,
    /// Reference cycle reported by the host's resolver.
    #[error("circular reference")]
    CircularRef,
    /// Workspace capacity exceeded.
    #[error("not enough memory")]
    Mem,
    /// Malformed instruction stream or wrong residual count.
    #[error("evaluation error")]
    Eval,
    /// The input does not match the grammar.
    #[error("syntax error")]
    Syntax,
}

impl ErrorKind {
    /// Blocking errors abort compile/evaluate; the rest are value errors.
    pub fn is_blocking(self) -> bool {
        matches!(
            self,
            ErrorKind::Generic
                | ErrorKind::CircularRef
                | ErrorKind::Mem
                | ErrorKind::Eval
                | ErrorKind::Syntax
        )
    }

    /// Spreadsheet-style short code, used when printing error values.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Ref => "#REF",
            ErrorKind::Nan => "#NAN",
            ErrorKind::Huge => "#HUGE",
            ErrorKind::DivByZero => "#DIV0",
            ErrorKind::Value => "#VALUE",
            ErrorKind::Generic => "#ERROR",
            ErrorKind::CircularRef => "#CREF",
            ErrorKind::Mem => "#MEM",
            ErrorKind::Eval => "#EVAL",
            ErrorKind::Syntax => "#SYNTAX",
        }
    }
}

/// A failed compile: what went wrong and where.
///
/// `offset` is the byte offset of the earliest offending symbol within the
/// input expression.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{kind} at offset {offset}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub offset: usize,
}
