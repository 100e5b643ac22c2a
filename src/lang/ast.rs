use std::fmt;
use std::rc::Rc;

use crate::lang::token::normalize;

#[derive(Debug, PartialEq, Hash, PartialOrd, Ord, Eq, Clone)]
pub struct Identifier(pub String);

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(normalize(name))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ComparisonOp {
    /// `>`
    GreaterThan,
    /// `<`
    LessThan,
    /// `<>`
    NotEquals,
}

impl ComparisonOp {
    pub fn op_str(&self) -> &'static str {
        match self {
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::LessThan => "<",
            ComparisonOp::NotEquals => "<>",
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Call {
    pub callee: Identifier,
    pub args: Vec<Expression>,
}

#[derive(Debug, PartialEq)]
pub enum Expression {
    Variable(Identifier),
    Number(i64),
    Str(String),
    Call(Call),
    /// (op, lhs, rhs)
    Comparison(ComparisonOp, Box<Expression>, Box<Expression>),
    /// (condition, then, else)
    Ternary(Box<Expression>, Box<Expression>, Box<Expression>),
}

/// `if`/`elseif` chain with an optional trailing `else`
#[derive(Debug, PartialEq)]
pub struct Conditional {
    /// (condition, body) tried in order
    pub branches: Vec<(Expression, Block)>,
    pub otherwise: Option<Block>,
}

#[derive(Debug, PartialEq)]
pub enum Statement {
    Assign(Identifier, Expression),
    Call(Call),
    Conditional(Conditional),
}

#[derive(Debug, PartialEq)]
pub struct Procedure {
    pub name: Identifier,
    pub params: Vec<Identifier>,
    pub body: Block,
}

/// Procedure definitions always precede statements within a block
#[derive(Debug, PartialEq, Default)]
pub struct Block {
    pub procedures: Vec<Rc<Procedure>>,
    pub statements: Vec<Statement>,
}
