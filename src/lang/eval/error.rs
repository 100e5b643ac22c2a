use thiserror::Error;

use crate::lang::ast::Identifier;

/// Fatal evaluation errors
///
/// Any of these aborts the current run; there is no local recovery inside the evaluator.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Unknown name: {0}")]
    UndefinedName(Identifier),
    #[error("'{name}()' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        name: Identifier,
        expected: usize,
        found: usize,
    },
    #[error("Cannot compare '{lhs}' {op} '{rhs}'")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("'{name}' is a {ty}, it cannot be called")]
    NotCallable { name: Identifier, ty: &'static str },
    #[error("'{function}()' expects a {expected}, got '{found}'")]
    InvalidArgument {
        function: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}
