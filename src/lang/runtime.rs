use std::io::{self, Write};

use log::info;
use thiserror::Error;

use crate::lang::environment::Environment;
use crate::lang::eval::{Eval, EvalError};
use crate::lang::lexer::tokenize;
use crate::lang::parse::{parse, SyntaxError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("Failed to write diagnostics: {0}")]
    Io(#[from] io::Error),
}

pub struct Runtime<'a> {
    sink: &'a mut dyn Write,
    diagnostics: &'a mut dyn Write,
    env: Environment,
    dump_tokens: bool,
    dump_ast: bool,
}

impl<'a> Runtime<'a> {
    /// Create a new `Runtime` instance
    ///
    /// `sink` is where program output should be written, along with token and tree dumps.
    ///
    /// `diagnostics` receives the lexer's complaints about characters it had to skip.
    pub fn new(sink: &'a mut dyn Write, diagnostics: &'a mut dyn Write) -> Self {
        Self {
            sink,
            diagnostics,
            env: Environment::new(),
            dump_tokens: false,
            dump_ast: false,
        }
    }

    pub fn set_dump_tokens(&mut self, dump: bool) {
        self.dump_tokens = dump;
    }

    pub fn set_dump_ast(&mut self, dump: bool) {
        self.dump_ast = dump;
    }

    /// Lex, parse and evaluate `source`
    ///
    /// Top level bindings persist across calls, so a REPL can feed input piece by piece.
    pub fn run(&mut self, source: &str) -> Result<(), Error> {
        let (tokens, errors) = tokenize(source);
        info!("lexed {} token(s), {} error(s)", tokens.len(), errors.len());
        for e in &errors {
            writeln!(self.diagnostics, "{}", e)?;
        }

        if self.dump_tokens {
            for t in &tokens {
                writeln!(self.sink, "{:>4}  {:<10}  {}", t.line, t.kind.name(), t.kind)?;
            }
        }

        let block = parse(&tokens)?;
        info!(
            "parsed {} procedure(s), {} statement(s)",
            block.procedures.len(),
            block.statements.len()
        );

        if self.dump_ast {
            writeln!(self.sink, "{:#?}", block)?;
        }

        Eval::new(&mut *self.sink).eval_block(&mut self.env, &block)?;

        Ok(())
    }
}

#[test]
fn test_sample_script() {
    let mut output = Vec::new();
    let mut diagnostics = Vec::new();
    let mut runtime = Runtime::new(&mut output, &mut diagnostics);
    runtime
        .run(include_str!("../../scripts/sample.bsl"))
        .expect("Failed to run sample");

    assert!(diagnostics.is_empty());
    let output = String::from_utf8(output).expect("Output not utf-8");
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 5, "{}", output);
    assert_eq!(lines[0], "добрый день, 1с!");
    assert_eq!(lines[1], "24");
    assert_eq!(lines[2], "один равен нулю.");
    let day: i64 = lines[4].parse().expect("day of week is an integer");
    assert!((1..=7).contains(&day));
}

#[test]
fn test_lex_errors_are_not_fatal() {
    let mut output = Vec::new();
    let mut diagnostics = Vec::new();
    let mut runtime = Runtime::new(&mut output, &mut diagnostics);
    runtime
        .run("A = 1 @;\nСообщить(A) #;")
        .expect("Failed to run");

    assert_eq!(
        String::from_utf8(diagnostics).expect("Output not utf-8"),
        "Unexpected character '@' on line 1\nUnexpected character '#' on line 2\n"
    );
    assert_eq!(String::from_utf8(output).expect("Output not utf-8"), "1\n");
}

#[test]
fn test_syntax_error_is_fatal() {
    let mut output = Vec::new();
    let mut diagnostics = Vec::new();
    let mut runtime = Runtime::new(&mut output, &mut diagnostics);
    let res = runtime.run("Сообщить(1);\nЕсли 1 < 2 Тогда\n    Сообщить(2);\n");

    assert!(matches!(res, Err(Error::Syntax(_))));
    // Nothing runs if the program does not parse
    assert!(output.is_empty());
}

#[test]
fn test_state_persists() {
    let mut output = Vec::new();
    let mut diagnostics = Vec::new();
    let mut runtime = Runtime::new(&mut output, &mut diagnostics);
    runtime.run("A = 1;").expect("Failed to run");
    runtime
        .run("Процедура П(X) Сообщить(X); КонецПроцедуры")
        .expect("Failed to run");
    assert!(runtime.run("Сообщить(Б);").is_err());
    runtime.run("П(A);").expect("Failed to run");

    assert_eq!(String::from_utf8(output).expect("Output not utf-8"), "1\n");
}

#[test]
fn test_dump_tokens() {
    let mut output = Vec::new();
    let mut diagnostics = Vec::new();
    let mut runtime = Runtime::new(&mut output, &mut diagnostics);
    runtime.set_dump_tokens(true);
    runtime.run("A = 'Б';").expect("Failed to run");

    assert_eq!(
        String::from_utf8(output).expect("Output not utf-8"),
        concat!(
            "   1  identifier  a\n",
            "   1  symbol      =\n",
            "   1  string      \"б\"\n",
            "   1  symbol      ;\n",
        )
    );
}

#[test]
fn test_dump_ast() {
    let mut output = Vec::new();
    let mut diagnostics = Vec::new();
    let mut runtime = Runtime::new(&mut output, &mut diagnostics);
    runtime.set_dump_ast(true);
    runtime.run("A = 1;").expect("Failed to run");

    let output = String::from_utf8(output).expect("Output not utf-8");
    assert!(output.starts_with("Block {"), "{}", output);
    assert!(output.contains("Assign("), "{}", output);
}
