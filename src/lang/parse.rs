//! Grammar for the scripting language.
//!
//! The grammar is defined as a PEG over the token stream produced by the lexer, so the rules
//! below never deal with whitespace, comments or case: by the time a token reaches the parser it
//! is already classified and normalized.
//!
//! Developer notes:
//!
//! * A PEG is order sensitive. A call (`ID '(' ...`) must be tried before a plain variable
//!   reference, otherwise the variable rule takes the identifier and the parser chokes on `(`.
//!
//! * PEGs may not have left recursion. `value '>' value` is therefore expressed as an operand
//!   followed by any number of `(operator, operand)` pairs, which are folded left. All three
//!   comparison operators share a single precedence level and associate left-to-right:
//!
//!     1 < 2 <> 3  =>  (1 < 2) <> 3
//!
//! * The ternary `? cond ? then ? else` is an operand, and its else-branch is a full value. It
//!   thus binds looser than any comparison and nests to the right:
//!
//!     ? a ? b ? c < 1    =>  ? a ? b ? (c < 1)
//!     ? a ? b ? ? c ? d ? e  =>  ? a ? b ? (? c ? d ? e)
//!
//! * `repeat()` and `list()` treat any failure as the end of the repetition, which would make
//!   every error look like it happened at the first token of the outermost construct. Instead,
//!   each construct commits with `expect()` once its leading token(s) are seen, and `many()` /
//!   `comma_list()` pass those failures on. The error reported is the innermost one, ie. the
//!   token that actually broke the construct:
//!
//!     Если 1 < 2 Тогда Сообщить(1);   =>  unexpected end of input
//!     B = ;                            =>  unexpected symbol ';'

use std::rc::Rc;

use pom::parser::{call, end, is_a, Parser};
use thiserror::Error;

use crate::lang::ast::*;
use crate::lang::token::{Token, TokenKind};

#[derive(Debug, PartialEq, Clone, Error)]
pub enum SyntaxError {
    #[error("Syntax error on line {line}: unexpected {kind} '{value}'")]
    UnexpectedToken {
        kind: &'static str,
        value: String,
        line: usize,
    },
    #[error("Syntax error on line {line}: unexpected end of input")]
    UnexpectedEnd { line: usize },
}

impl SyntaxError {
    fn new(err: &pom::Error, tokens: &[Token]) -> Self {
        let position = match err {
            // Committed constructs wrap the failure that stopped them
            pom::Error::Expect { inner, .. } | pom::Error::Custom { inner: Some(inner), .. } => {
                return SyntaxError::new(inner, tokens)
            }
            pom::Error::Mismatch { position, .. }
            | pom::Error::Conversion { position, .. }
            | pom::Error::Custom { position, .. } => *position,
            pom::Error::Incomplete => tokens.len(),
        };

        match tokens.get(position) {
            Some(t) => SyntaxError::UnexpectedToken {
                kind: t.kind.name(),
                value: t.kind.to_string(),
                line: t.line,
            },
            None => SyntaxError::UnexpectedEnd {
                line: tokens.last().map_or(1, |t| t.line),
            },
        }
    }
}

/// Zero or more `parser`
///
/// Same as `repeat(0..)` except a committed (`expect()`) failure is returned instead of ending
/// the repetition.
fn many<'a, O: 'a>(parser: Parser<'a, Token, O>) -> Parser<'a, Token, Vec<O>> {
    Parser::new(move |input: &'a [Token], start: usize| {
        let mut items = vec![];
        let mut pos = start;
        loop {
            match parser.parse_at(input, pos) {
                Ok((item, next)) => {
                    items.push(item);
                    pos = next;
                }
                Err(e @ pom::Error::Expect { .. }) => return Err(e),
                Err(_) => break,
            }
        }

        Ok((items, pos))
    })
}

/// Possibly empty, comma separated list. Every comma must be followed by another item.
fn comma_list<'a, O: 'a>(item: fn() -> Parser<'a, Token, O>) -> Parser<'a, Token, Vec<O>> {
    let first = item();
    let rest = many(token(TokenKind::Comma) * item().expect("list item"));

    Parser::new(move |input: &'a [Token], start: usize| match first.parse_at(input, start) {
        Ok((head, pos)) => {
            let (mut items, pos) = rest.parse_at(input, pos)?;
            items.insert(0, head);
            Ok((items, pos))
        }
        Err(e @ pom::Error::Expect { .. }) => Err(e),
        Err(_) => Ok((vec![], start)),
    })
}

fn token<'a>(kind: TokenKind) -> Parser<'a, Token, ()> {
    is_a(move |t: Token| t.kind == kind).discard()
}

fn ident<'a>() -> Parser<'a, Token, Identifier> {
    is_a(|t: Token| matches!(t.kind, TokenKind::Identifier(_))).convert(|t| match t.kind {
        TokenKind::Identifier(name) => Ok(Identifier(name)),
        other => Err(other),
    })
}

fn number<'a>() -> Parser<'a, Token, Expression> {
    is_a(|t: Token| matches!(t.kind, TokenKind::Number(_))).convert(|t| match t.kind {
        TokenKind::Number(n) => Ok(Expression::Number(n)),
        other => Err(other),
    })
}

fn string<'a>() -> Parser<'a, Token, Expression> {
    is_a(|t: Token| matches!(t.kind, TokenKind::Str(_))).convert(|t| match t.kind {
        TokenKind::Str(s) => Ok(Expression::Str(s)),
        other => Err(other),
    })
}

fn call_expr<'a>() -> Parser<'a, Token, Call> {
    let arguments = (comma_list(value) - token(TokenKind::RightParen)).expect("arguments");
    (ident() - token(TokenKind::LeftParen) + arguments).map(|(callee, args)| Call { callee, args })
}

fn primary<'a>() -> Parser<'a, Token, Expression> {
    call_expr().map(Expression::Call) | ident().map(Expression::Variable) | number() | string()
}

fn ternary<'a>() -> Parser<'a, Token, Expression> {
    let question = || token(TokenKind::Question);
    let branches = call(value) - question() + call(value) - question() + call(value);
    let parser = question() * branches.expect("ternary");

    parser.map(|((cond, then), otherwise)| {
        Expression::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise))
    })
}

fn operand<'a>() -> Parser<'a, Token, Expression> {
    ternary() | primary()
}

fn comparison_op<'a>() -> Parser<'a, Token, ComparisonOp> {
    token(TokenKind::NotEqual).map(|_| ComparisonOp::NotEquals)
        | token(TokenKind::Less).map(|_| ComparisonOp::LessThan)
        | token(TokenKind::Greater).map(|_| ComparisonOp::GreaterThan)
}

/// Parse a value (the language's only kind of expression)
fn value<'a>() -> Parser<'a, Token, Expression> {
    let comparisons =
        call(operand) + many(comparison_op() + call(operand).expect("comparison operand"));

    // NB: comparisons are left-to-right associative, so fold-left
    comparisons.map(|(lhs, rest)| {
        rest.into_iter().fold(lhs, |lhs, (op, rhs)| {
            Expression::Comparison(op, Box::new(lhs), Box::new(rhs))
        })
    })
}

fn assign_stmt<'a>() -> Parser<'a, Token, Statement> {
    // A statement starting with an identifier that is not a call can only be an assignment
    let rhs = token(TokenKind::Equals) * call(value) - token(TokenKind::Semicolon);
    let assignment = ident() + rhs.expect("assignment");
    assignment.map(|(name, value)| Statement::Assign(name, value))
}

fn call_stmt<'a>() -> Parser<'a, Token, Statement> {
    (call_expr() - token(TokenKind::Semicolon).expect("';'")).map(Statement::Call)
}

/// `Если`, `ИначеЕсли` and `Иначе` all open an independent single-branch conditional
fn conditional_stmt<'a>() -> Parser<'a, Token, Statement> {
    let opener = token(TokenKind::If) | token(TokenKind::ElseIf) | token(TokenKind::Else);
    let rest = call(value) - token(TokenKind::Then) + call(block)
        - token(TokenKind::EndIf)
        - token(TokenKind::Semicolon);
    let conditional = opener * rest.expect("conditional");

    conditional.map(|(cond, body)| {
        Statement::Conditional(Conditional {
            branches: vec![(cond, body)],
            otherwise: None,
        })
    })
}

fn stmt<'a>() -> Parser<'a, Token, Statement> {
    // NB: call must come before assignment, both start with an identifier
    conditional_stmt() | call_stmt() | assign_stmt()
}

fn procedure<'a>() -> Parser<'a, Token, Rc<Procedure>> {
    let params = comma_list(ident);
    let rest = ident() - token(TokenKind::LeftParen) + params - token(TokenKind::RightParen)
        + call(block)
        - token(TokenKind::EndProcedure);
    let definition = token(TokenKind::Procedure) * rest.expect("procedure");

    definition.map(|((name, params), body)| Rc::new(Procedure { name, params, body }))
}

/// Parse a block: all procedure definitions, then all statements
fn block<'a>() -> Parser<'a, Token, Block> {
    (many(procedure()) + many(stmt())).map(|(procedures, statements)| Block {
        procedures,
        statements,
    })
}

pub fn parse(tokens: &[Token]) -> Result<Block, SyntaxError> {
    let program = block() - end();
    program
        .parse(tokens)
        .map_err(|e| SyntaxError::new(&e, tokens))
}

#[cfg(test)]
fn lex(input: &str) -> Vec<Token> {
    let (tokens, errors) = crate::lang::lexer::tokenize(input);
    assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
    tokens
}

#[cfg(test)]
fn var(name: &str) -> Box<Expression> {
    Box::new(Expression::Variable(Identifier(name.to_string())))
}

#[cfg(test)]
fn num(n: i64) -> Box<Expression> {
    Box::new(Expression::Number(n))
}

#[test]
fn test_primary() {
    let data = vec![
        ("Переменная", *var("переменная")),
        ("42", *num(42)),
        (r#""Строка""#, Expression::Str("строка".to_string())),
        (
            "ТекущаяДата()",
            Expression::Call(Call {
                callee: Identifier("текущаядата".to_string()),
                args: vec![],
            }),
        ),
        (
            "ДеньНедели(ТекущаяДата(), 'x', 3)",
            Expression::Call(Call {
                callee: Identifier("деньнедели".to_string()),
                args: vec![
                    Expression::Call(Call {
                        callee: Identifier("текущаядата".to_string()),
                        args: vec![],
                    }),
                    Expression::Str("x".to_string()),
                    *num(3),
                ],
            }),
        ),
    ];

    for (input, expected) in data {
        let tokens = lex(input);
        assert_eq!((value() - end()).parse(&tokens), Ok(expected));
    }
}

#[test]
fn test_comparison() {
    let data = vec![
        (
            "1 < 2",
            Expression::Comparison(ComparisonOp::LessThan, num(1), num(2)),
        ),
        (
            "a <> b",
            Expression::Comparison(ComparisonOp::NotEquals, var("a"), var("b")),
        ),
        (
            "1 < 2 > 3",
            Expression::Comparison(
                ComparisonOp::GreaterThan,
                Box::new(Expression::Comparison(
                    ComparisonOp::LessThan,
                    num(1),
                    num(2),
                )),
                num(3),
            ),
        ),
        (
            "a<>b<c",
            Expression::Comparison(
                ComparisonOp::LessThan,
                Box::new(Expression::Comparison(
                    ComparisonOp::NotEquals,
                    var("a"),
                    var("b"),
                )),
                var("c"),
            ),
        ),
    ];

    for (input, expected) in data {
        let tokens = lex(input);
        assert_eq!((value() - end()).parse(&tokens), Ok(expected));
    }
}

#[test]
fn test_ternary() {
    let data = vec![
        ("?a?1?2", Expression::Ternary(var("a"), num(1), num(2))),
        (
            "? a > 1 ? b ? c < 1",
            Expression::Ternary(
                Box::new(Expression::Comparison(
                    ComparisonOp::GreaterThan,
                    var("a"),
                    num(1),
                )),
                var("b"),
                Box::new(Expression::Comparison(
                    ComparisonOp::LessThan,
                    var("c"),
                    num(1),
                )),
            ),
        ),
        (
            "?a?b??c?d?e",
            Expression::Ternary(
                var("a"),
                var("b"),
                Box::new(Expression::Ternary(var("c"), var("d"), var("e"))),
            ),
        ),
        (
            "1 < ?a?b?c",
            Expression::Comparison(
                ComparisonOp::LessThan,
                num(1),
                Box::new(Expression::Ternary(var("a"), var("b"), var("c"))),
            ),
        ),
    ];

    for (input, expected) in data {
        let tokens = lex(input);
        assert_eq!((value() - end()).parse(&tokens), Ok(expected));
    }
}

#[test]
fn test_bad_value() {
    let data = vec!["", "<", "1 <", "?a?b", "?a?b?c?d?e", "f(1,)", "f(1", "(1)"];

    for input in data {
        let tokens = lex(input);
        assert!(
            (value() - end()).parse(&tokens).is_err(),
            "'{}' should not parse",
            input
        );
    }
}

#[test]
fn test_statement() {
    let data = vec![
        (
            "A = 42;",
            Statement::Assign(Identifier("a".to_string()), *num(42)),
        ),
        (
            "Сообщить(A);",
            Statement::Call(Call {
                callee: Identifier("сообщить".to_string()),
                args: vec![*var("a")],
            }),
        ),
        (
            "Если 1 < 2 Тогда A = 1; КонецЕсли;",
            Statement::Conditional(Conditional {
                branches: vec![(
                    Expression::Comparison(ComparisonOp::LessThan, num(1), num(2)),
                    Block {
                        procedures: vec![],
                        statements: vec![Statement::Assign(Identifier("a".to_string()), *num(1))],
                    },
                )],
                otherwise: None,
            }),
        ),
        (
            "ИначеЕсли a Тогда КонецЕсли;",
            Statement::Conditional(Conditional {
                branches: vec![(*var("a"), Block::default())],
                otherwise: None,
            }),
        ),
        (
            "Иначе a Тогда КонецЕсли;",
            Statement::Conditional(Conditional {
                branches: vec![(*var("a"), Block::default())],
                otherwise: None,
            }),
        ),
    ];

    for (input, expected) in data {
        let tokens = lex(input);
        assert_eq!((stmt() - end()).parse(&tokens), Ok(expected));
    }

    let bad = vec![
        "A = 42",
        "A 42;",
        "Сообщить(A)",
        "Если a Тогда КонецЕсли",
        "Если a КонецЕсли;",
        "Иначе Тогда КонецЕсли;",
        "42;",
    ];

    for input in bad {
        let tokens = lex(input);
        assert!(
            (stmt() - end()).parse(&tokens).is_err(),
            "'{}' should not parse",
            input
        );
    }
}

#[test]
fn test_procedure() {
    let tokens = lex("Процедура П(X, Y) Процедура Вложенная() КонецПроцедуры Сообщить(x); КонецПроцедуры");
    let expected = Procedure {
        name: Identifier("п".to_string()),
        params: vec![Identifier("x".to_string()), Identifier("y".to_string())],
        body: Block {
            procedures: vec![Rc::new(Procedure {
                name: Identifier("вложенная".to_string()),
                params: vec![],
                body: Block::default(),
            })],
            statements: vec![Statement::Call(Call {
                callee: Identifier("сообщить".to_string()),
                args: vec![*var("x")],
            })],
        },
    };
    assert_eq!((procedure() - end()).parse(&tokens), Ok(Rc::new(expected)));

    for input in vec![
        "Процедура П(X,) КонецПроцедуры",
        "Процедура П(1) КонецПроцедуры",
        "Процедура П X КонецПроцедуры",
        "Процедура П()",
        "Процедура П() A = 1; Процедура Q() КонецПроцедуры КонецПроцедуры",
    ] {
        let tokens = lex(input);
        assert!(
            (procedure() - end()).parse(&tokens).is_err(),
            "'{}' should not parse",
            input
        );
    }
}

#[test]
fn test_parse() {
    let input = r#"
Процедура МояПроцедура(ВтороеСообщение)
Если 1 < 2 Тогда
    Сообщить(ВтороеСообщение);
КонецЕсли;
КонецПроцедуры
A = 42; // комментарий
МояПроцедура("Данные удалены.");
"#;
    let block = parse(&lex(input)).expect("Failed to parse");
    assert_eq!(block.procedures.len(), 1);
    assert_eq!(block.procedures[0].name, Identifier("мояпроцедура".to_string()));
    assert_eq!(block.statements.len(), 2);

    assert_eq!(parse(&[]), Ok(Block::default()));
}

#[test]
fn test_parse_errors() {
    let unexpected = |kind: &'static str, value: &str, line: usize| {
        SyntaxError::UnexpectedToken {
            kind,
            value: value.to_string(),
            line,
        }
    };

    let data = vec![
        (
            // Procedure definitions must come first
            "A = 1;\nПроцедура П() КонецПроцедуры",
            unexpected("keyword", "процедура", 2),
        ),
        (
            "Если 1 < 2 Тогда\n  Сообщить(1);\n",
            SyntaxError::UnexpectedEnd { line: 2 },
        ),
        (
            "Сообщить(1);\nA = 1\n",
            SyntaxError::UnexpectedEnd { line: 2 },
        ),
        ("A = 'x';\n;", unexpected("symbol", ";", 2)),
        (
            "Процедура П()\n A = 1;\n B = ;\nКонецПроцедуры",
            unexpected("symbol", ";", 3),
        ),
        (
            "Процедура П(X,)\nКонецПроцедуры",
            unexpected("symbol", ")", 1),
        ),
        (
            "Процедура П()\n A = 1;\n",
            SyntaxError::UnexpectedEnd { line: 2 },
        ),
        ("A 1;", unexpected("number", "1", 1)),
        ("A = 1 <\n;", unexpected("symbol", ";", 2)),
        ("Сообщить(1 ;", unexpected("symbol", ";", 1)),
        ("Сообщить(1, );", unexpected("symbol", ")", 1)),
        ("Сообщить(1)\nA = 2;", unexpected("identifier", "a", 2)),
        ("A = ?1?2;", unexpected("symbol", ";", 1)),
        (
            "Если 1 Тогда\n  Если 2 Тогда\n    A = ;\n  КонецЕсли;\nКонецЕсли;",
            unexpected("symbol", ";", 3),
        ),
        ("Если 1 Тогда КонецЕсли", SyntaxError::UnexpectedEnd { line: 1 }),
    ];

    for (input, expected) in data {
        assert_eq!(parse(&lex(input)), Err(expected), "{}", input);
    }
}
