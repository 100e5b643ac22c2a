use std::cmp::Ordering;
use std::io::Write;
use std::rc::Rc;

use log::debug;

use super::{EvalError, Value};
use crate::lang::ast::*;
use crate::lang::environment::Environment;

type Result<T> = std::result::Result<T, EvalError>;

fn check_arity(name: &Identifier, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(EvalError::ArityMismatch {
            name: name.clone(),
            expected,
            found,
        });
    }

    Ok(())
}

/// Tree walking evaluator
///
/// `Eval` only owns the output sink. The environment is always passed in explicitly: statements
/// get `&mut Environment`, expressions only `&Environment` since nothing an expression does can
/// rebind a name in the caller's scope.
pub struct Eval<'a> {
    sink: &'a mut dyn Write,
}

impl<'a> Eval<'a> {
    /// `sink` is where output should be written. eg. result of `Сообщить()` calls
    pub fn new(sink: &'a mut dyn Write) -> Self {
        Self { sink }
    }

    /// Call `call.callee`, producing `Value::Null` if it returned nothing
    fn eval_call(&mut self, env: &Environment, call: &Call) -> Result<Value> {
        let callee = env
            .get(&call.callee)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedName(call.callee.clone()))?;

        match callee {
            Value::Procedure(proc) => {
                check_arity(&call.callee, proc.params.len(), call.args.len())?;
                debug!("call {}() with {} argument(s)", call.callee, call.args.len());

                let mut local = env.clone();
                for (param, arg) in proc.params.iter().zip(&call.args) {
                    // Arguments see the caller's bindings, not the parameters bound so far
                    let val = self.eval_expr(env, arg)?;
                    local.insert(param.clone(), val);
                }

                self.eval_block(&mut local, &proc.body)?;

                Ok(Value::Null)
            }
            Value::Native(func) => {
                check_arity(&call.callee, func.arity(), call.args.len())?;
                debug!("call builtin {}()", func.name());

                let args = call
                    .args
                    .iter()
                    .map(|arg| self.eval_expr(env, arg))
                    .collect::<Result<Vec<_>>>()?;

                Ok(func.call(&mut *self.sink, args)?.unwrap_or(Value::Null))
            }
            v => Err(EvalError::NotCallable {
                name: call.callee.clone(),
                ty: v.type_str(),
            }),
        }
    }

    fn eval_comparison(
        &mut self,
        env: &Environment,
        op: ComparisonOp,
        lhs: &Expression,
        rhs: &Expression,
    ) -> Result<Value> {
        let lhs_val = self.eval_expr(env, lhs)?;
        let rhs_val = self.eval_expr(env, rhs)?;

        let ordering = lhs_val
            .compare(&rhs_val)
            .ok_or_else(|| EvalError::TypeMismatch {
                op: op.op_str(),
                lhs: lhs_val.type_str(),
                rhs: rhs_val.type_str(),
            })?;

        let res = match op {
            ComparisonOp::GreaterThan => ordering == Ordering::Greater,
            ComparisonOp::LessThan => ordering == Ordering::Less,
            ComparisonOp::NotEquals => ordering != Ordering::Equal,
        };

        Ok(Value::Boolean(res))
    }

    fn eval_expr(&mut self, env: &Environment, expr: &Expression) -> Result<Value> {
        match expr {
            Expression::Variable(ident) => env
                .get(ident)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedName(ident.clone())),
            Expression::Number(n) => Ok(Value::Integer(*n)),
            Expression::Str(s) => Ok(Value::String(s.clone())),
            Expression::Call(call) => self.eval_call(env, call),
            Expression::Comparison(op, lhs, rhs) => self.eval_comparison(env, *op, lhs, rhs),
            Expression::Ternary(cond, then, otherwise) => {
                // Only the taken branch is evaluated
                if self.eval_expr(env, cond)?.is_truthy() {
                    self.eval_expr(env, then)
                } else {
                    self.eval_expr(env, otherwise)
                }
            }
        }
    }

    fn eval_conditional(&mut self, env: &mut Environment, cond: &Conditional) -> Result<()> {
        for (test, body) in &cond.branches {
            if self.eval_expr(env, test)?.is_truthy() {
                return self.eval_block(env, body);
            }
        }

        if let Some(body) = &cond.otherwise {
            self.eval_block(env, body)?;
        }

        Ok(())
    }

    fn eval_statement(&mut self, env: &mut Environment, stmt: &Statement) -> Result<()> {
        match stmt {
            Statement::Assign(name, expr) => {
                let val = self.eval_expr(env, expr)?;
                env.insert(name.clone(), val);

                Ok(())
            }
            Statement::Call(call) => {
                // Whatever the callee produced is discarded
                self.eval_call(env, call)?;

                Ok(())
            }
            Statement::Conditional(cond) => self.eval_conditional(env, cond),
        }
    }

    /// Evaluate `block` against `env`
    ///
    /// Procedure definitions are bound first, then statements run in order. Stops at the first
    /// error.
    pub fn eval_block(&mut self, env: &mut Environment, block: &Block) -> Result<()> {
        for proc in &block.procedures {
            env.insert(proc.name.clone(), Value::Procedure(Rc::clone(proc)));
        }

        for stmt in &block.statements {
            self.eval_statement(env, stmt)?;
        }

        Ok(())
    }
}

#[cfg(test)]
struct Mark;

#[cfg(test)]
impl super::NativeFunction for Mark {
    fn name(&self) -> &str {
        "отметить"
    }

    fn arity(&self) -> usize {
        1
    }

    fn call(&self, sink: &mut dyn Write, args: Vec<Value>) -> Result<Option<Value>> {
        writeln!(sink, "mark {}", args[0])?;
        Ok(Some(args[0].clone()))
    }
}

#[cfg(test)]
fn eval_source(input: &str) -> (Result<()>, Environment, String) {
    use crate::lang::lexer::tokenize;
    use crate::lang::parse::parse;

    let (tokens, errors) = tokenize(input);
    assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
    let block = parse(&tokens).expect("Failed to parse");

    let mut env = Environment::new();
    env.define_native(Rc::new(Mark));

    let mut output = Vec::new();
    let res = Eval::new(&mut output).eval_block(&mut env, &block);

    (
        res,
        env,
        String::from_utf8(output).expect("Output not utf-8"),
    )
}

#[cfg(test)]
fn lookup(env: &Environment, name: &str) -> Option<Value> {
    env.get(&Identifier::from(name)).cloned()
}

#[test]
fn test_assign() {
    let (res, env, _) = eval_source("A = 42;");
    assert!(res.is_ok());
    assert_eq!(lookup(&env, "a"), Some(Value::Integer(42)));

    let (res, env, _) = eval_source("A = 42; a = 24; Б = 'Текст'; В = A < Б < 1;");
    assert!(matches!(res, Err(EvalError::TypeMismatch { .. })));
    assert_eq!(lookup(&env, "A"), Some(Value::Integer(24)));
    assert_eq!(lookup(&env, "б"), Some(Value::String("текст".to_string())));
    assert_eq!(lookup(&env, "в"), None);
}

#[test]
fn test_expression() {
    let tests = vec![
        ("Сообщить(1 < 2);", "True\n"),
        ("Сообщить(2 < 1);", "False\n"),
        ("Сообщить(1 <> 2);", "True\n"),
        ("Сообщить(1 <> 1);", "False\n"),
        ("Сообщить(3 > 2);", "True\n"),
        ("Сообщить(2 > 2);", "False\n"),
        ("Сообщить('а' < 'б');", "True\n"),
        ("Сообщить('Текст' <> 'ТЕКСТ');", "False\n"),
        ("A = 1 < 2; B = 2 < 1; Сообщить(A > B);", "True\n"),
        ("A = 1 < 2; B = 3 > 2; Сообщить(A <> B);", "False\n"),
        ("Сообщить(?1 < 2?'да'?'нет');", "да\n"),
        ("Сообщить(?0?'да'?'нет');", "нет\n"),
        ("Сообщить(?''?1??'x'?2?3);", "2\n"),
        ("Сообщить(1 < ?1?2?0);", "True\n"),
        ("Сообщить(Сообщить);", "<builtin сообщить>\n"),
    ];

    for (input, expected) in tests {
        let (res, _, output) = eval_source(input);
        assert!(res.is_ok(), "'{}' failed: {:?}", input, res);
        assert_eq!(output, expected, "'{}'", input);
    }
}

#[test]
fn test_errors() {
    let (res, _, _) = eval_source("Сообщить(1 < 'a');");
    match res {
        Err(EvalError::TypeMismatch { op, lhs, rhs }) => {
            assert_eq!((op, lhs, rhs), ("<", "integer", "string"))
        }
        e => panic!("expected type mismatch, got {:?}", e),
    }

    let (res, _, _) = eval_source("Сообщить(Сообщить <> Сообщить);");
    assert!(matches!(res, Err(EvalError::TypeMismatch { .. })));

    let (res, _, _) = eval_source("Сообщить(Икс);");
    match res {
        Err(EvalError::UndefinedName(ident)) => assert_eq!(ident, Identifier::from("икс")),
        e => panic!("expected undefined name, got {:?}", e),
    }

    let (res, _, _) = eval_source("НетТакой(1);");
    assert!(matches!(res, Err(EvalError::UndefinedName(_))));

    let (res, _, _) = eval_source("Сообщить(1, 2);");
    match res {
        Err(EvalError::ArityMismatch {
            expected, found, ..
        }) => assert_eq!((expected, found), (1, 2)),
        e => panic!("expected arity mismatch, got {:?}", e),
    }

    let (res, _, _) = eval_source("A = 1; A(2);");
    match res {
        Err(EvalError::NotCallable { ty, .. }) => assert_eq!(ty, "integer"),
        e => panic!("expected not callable, got {:?}", e),
    }

    let (res, _, _) = eval_source("Сообщить(ДеньНедели(5));");
    assert!(matches!(res, Err(EvalError::InvalidArgument { .. })));
}

#[test]
fn test_error_stops_run() {
    let (res, env, output) = eval_source("Сообщить(1); Сообщить(Икс); Сообщить(2); A = 1;");
    assert!(res.is_err());
    assert_eq!(output, "1\n");
    assert_eq!(lookup(&env, "a"), None);
}

#[test]
fn test_conditional() {
    let tests = vec![
        ("Если 1 < 2 Тогда Сообщить('да'); КонецЕсли;", "да\n"),
        ("Если 2 < 1 Тогда Сообщить('да'); КонецЕсли;", ""),
        ("Если 'x' Тогда Сообщить(1); КонецЕсли;", "1\n"),
        ("Если '' Тогда Сообщить(1); КонецЕсли;", ""),
        ("Если 0 Тогда Сообщить(1); КонецЕсли;", ""),
        (
            "Если 1 Тогда Если 0 Тогда Сообщить(1); КонецЕсли; Сообщить(2); КонецЕсли;",
            "2\n",
        ),
        // Each form is an independent conditional, nothing is chained
        (
            "Если 0 Тогда Сообщить(1); КонецЕсли; \
             ИначеЕсли 1 Тогда Сообщить(2); КонецЕсли; \
             Иначе 1 Тогда Сообщить(3); КонецЕсли;",
            "2\n3\n",
        ),
        (
            "Если 1 Тогда Сообщить(1); КонецЕсли; Иначе 0 Тогда Сообщить(2); КонецЕсли;",
            "1\n",
        ),
    ];

    for (input, expected) in tests {
        let (res, _, output) = eval_source(input);
        assert!(res.is_ok(), "'{}' failed: {:?}", input, res);
        assert_eq!(output, expected, "'{}'", input);
    }

    // Conditional bodies run in the enclosing scope
    let (res, env, _) = eval_source("Если 1 Тогда A = 5; КонецЕсли;");
    assert!(res.is_ok());
    assert_eq!(lookup(&env, "a"), Some(Value::Integer(5)));
}

#[test]
fn test_conditional_chain() {
    let print = |s: &str| Block {
        procedures: vec![],
        statements: vec![Statement::Call(Call {
            callee: Identifier::from("сообщить"),
            args: vec![Expression::Str(s.to_string())],
        })],
    };
    let chain = |first: i64, second: i64| Conditional {
        branches: vec![
            (Expression::Number(first), print("first")),
            (Expression::Number(second), print("second")),
        ],
        otherwise: Some(print("otherwise")),
    };

    let tests = vec![
        (chain(1, 1), "first\n"),
        (chain(0, 1), "second\n"),
        (chain(0, 0), "otherwise\n"),
    ];

    for (cond, expected) in tests {
        let block = Block {
            procedures: vec![],
            statements: vec![Statement::Conditional(cond)],
        };
        let mut env = Environment::new();
        let mut output = Vec::new();
        Eval::new(&mut output)
            .eval_block(&mut env, &block)
            .expect("Failed to eval");
        assert_eq!(
            String::from_utf8(output).expect("Output not utf-8"),
            expected
        );
    }
}

#[test]
fn test_ternary_short_circuit() {
    let (res, env, output) = eval_source("A = ?1 < 2?Отметить(1)?Отметить(2);");
    assert!(res.is_ok());
    assert_eq!(output, "mark 1\n");
    assert_eq!(lookup(&env, "a"), Some(Value::Integer(1)));

    let (res, env, output) = eval_source("A = ?2 < 1?Отметить(1)?Отметить(2);");
    assert!(res.is_ok());
    assert_eq!(output, "mark 2\n");
    assert_eq!(lookup(&env, "a"), Some(Value::Integer(2)));

    // An error in the branch not taken is never reached
    let (res, _, _) = eval_source("A = ?1?2?Неизвестно;");
    assert!(res.is_ok());
}

#[test]
fn test_procedure_isolation() {
    let input = r#"
Процедура P(X)
    x = 10;
    A = 5;
    Сообщить(x);
    Сообщить(a);
КонецПроцедуры
A = 1;
P(5);
"#;
    let (res, env, output) = eval_source(input);
    assert!(res.is_ok(), "{:?}", res);
    assert_eq!(output, "10\n5\n");
    assert_eq!(lookup(&env, "a"), Some(Value::Integer(1)));
    assert_eq!(lookup(&env, "x"), None);
    assert!(matches!(lookup(&env, "p"), Some(Value::Procedure(_))));
}

#[test]
fn test_procedure_scoping() {
    let tests = vec![
        // The parameter shadows the caller's variable of the same name
        (
            "Процедура P(A) Сообщить(A); КонецПроцедуры A = 1; P(2); Сообщить(A);",
            "2\n1\n",
        ),
        // Dynamic scoping: the callee sees the caller's bindings as of the call
        (
            "Процедура P() Сообщить(B); КонецПроцедуры B = 7; P(); B = 8; P();",
            "7\n8\n",
        ),
        // Arguments are evaluated in the caller's scope
        (
            "Процедура P(X, Y) Сообщить(Y); КонецПроцедуры X = 'caller'; P(1, X);",
            "caller\n",
        ),
        (
            "Процедура Внешняя() Внутренняя(); КонецПроцедуры \
             Процедура Внутренняя() Сообщить('inner'); КонецПроцедуры \
             Внешняя();",
            "inner\n",
        ),
        (
            "Процедура P(Уровень) \
               Если Уровень < 3 Тогда Сообщить(Уровень); КонецЕсли; \
             КонецПроцедуры \
             P(1); P(2); P(3);",
            "1\n2\n",
        ),
    ];

    for (input, expected) in tests {
        let (res, _, output) = eval_source(input);
        assert!(res.is_ok(), "'{}' failed: {:?}", input, res);
        assert_eq!(output, expected, "'{}'", input);
    }
}

#[test]
fn test_nested_procedure() {
    let input = "Процедура P() \
                   Процедура Q() Сообщить('q'); КонецПроцедуры \
                   Q(); \
                 КонецПроцедуры \
                 P(); Q();";
    let (res, _, output) = eval_source(input);
    assert_eq!(output, "q\n");
    match res {
        Err(EvalError::UndefinedName(ident)) => assert_eq!(ident, Identifier::from("q")),
        e => panic!("expected undefined name, got {:?}", e),
    }
}

#[test]
fn test_procedure_arity() {
    let tests = vec![
        ("Процедура P(X) КонецПроцедуры P();", (1, 0)),
        ("Процедура P(X) КонецПроцедуры P(1, 2);", (1, 2)),
        ("Процедура P() КонецПроцедуры P(Отметить(1));", (0, 1)),
    ];

    for (input, counts) in tests {
        let (res, _, output) = eval_source(input);
        match res {
            Err(EvalError::ArityMismatch {
                name,
                expected,
                found,
            }) => {
                assert_eq!(name, Identifier::from("p"));
                assert_eq!((expected, found), counts);
            }
            e => panic!("expected arity mismatch, got {:?}", e),
        }
        // Arguments are not evaluated when the arity is wrong
        assert_eq!(output, "");
    }
}

#[test]
fn test_shared_namespace() {
    let (res, _, _) = eval_source("Процедура P() КонецПроцедуры P = 1; P();");
    assert!(matches!(res, Err(EvalError::NotCallable { .. })));

    let (res, _, output) = eval_source("Сообщить = 1; A = Сообщить;");
    assert!(res.is_ok());
    assert_eq!(output, "");
}

#[test]
fn test_call_without_result() {
    let (res, env, output) = eval_source("Процедура P() КонецПроцедуры A = P(); Б = Сообщить(1);");
    assert!(res.is_ok(), "{:?}", res);
    assert_eq!(output, "1\n");
    assert_eq!(lookup(&env, "a"), Some(Value::Null));
    assert_eq!(lookup(&env, "б"), Some(Value::Null));

    let tests = vec![
        (
            "Процедура P() КонецПроцедуры \
             Если P() Тогда Сообщить('да'); КонецЕсли; Сообщить('после');",
            "после\n",
        ),
        ("Сообщить(?Сообщить(1)?'да'?'нет');", "1\nнет\n"),
        ("Процедура P() КонецПроцедуры Сообщить(P());", "None\n"),
    ];

    for (input, expected) in tests {
        let (res, _, output) = eval_source(input);
        assert!(res.is_ok(), "'{}' failed: {:?}", input, res);
        assert_eq!(output, expected, "'{}'", input);
    }

    let (res, _, _) = eval_source("Процедура P() КонецПроцедуры Сообщить(P() <> 1);");
    match res {
        Err(EvalError::TypeMismatch { op, lhs, rhs }) => {
            assert_eq!((op, lhs, rhs), ("<>", "null", "integer"))
        }
        e => panic!("expected type mismatch, got {:?}", e),
    }
}
