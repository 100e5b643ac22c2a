pub mod ast;
pub mod environment;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parse;
pub mod runtime;
pub mod token;
