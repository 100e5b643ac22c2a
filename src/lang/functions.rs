use std::fmt;
use std::io::Write;

use chrono::{Datelike, Local};
use lazy_static::lazy_static;

use crate::lang::ast::Identifier;
use crate::lang::eval::{EvalError, NativeFunction, Value};

/// Functions every runtime starts with
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Function {
    /// `Сообщить(value)`
    Message,
    /// `ТекущаяДата()`
    CurrentDate,
    /// `ДеньНедели(moment)`
    DayOfWeek,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl NativeFunction for Function {
    fn name(&self) -> &str {
        match self {
            Function::Message => "сообщить",
            Function::CurrentDate => "текущаядата",
            Function::DayOfWeek => "деньнедели",
        }
    }

    fn arity(&self) -> usize {
        match self {
            Function::Message => 1,
            Function::CurrentDate => 0,
            Function::DayOfWeek => 1,
        }
    }

    fn call(&self, sink: &mut dyn Write, args: Vec<Value>) -> Result<Option<Value>, EvalError> {
        match (self, args.as_slice()) {
            (Function::Message, [val]) => {
                writeln!(sink, "{}", val)?;
                Ok(None)
            }
            (Function::CurrentDate, []) => Ok(Some(Value::Moment(Local::now().naive_local()))),
            (Function::DayOfWeek, [Value::Moment(m)]) => Ok(Some(Value::Integer(
                m.weekday().number_from_monday().into(),
            ))),
            (f @ Function::DayOfWeek, [v]) => Err(EvalError::InvalidArgument {
                function: f.to_string(),
                expected: "moment",
                found: v.type_str(),
            }),
            (f, args) => Err(EvalError::ArityMismatch {
                name: Identifier::from(f.name()),
                expected: f.arity(),
                found: args.len(),
            }),
        }
    }
}

lazy_static! {
    pub static ref FUNCTIONS: Vec<Function> = vec![
        Function::Message,
        Function::CurrentDate,
        Function::DayOfWeek,
    ];
}

#[test]
fn test_message() {
    let data = vec![
        (Value::Integer(42), "42\n"),
        (Value::String("добрый день, 1с!".to_string()), "добрый день, 1с!\n"),
        (Value::String(String::new()), "\n"),
        (Value::Boolean(false), "False\n"),
    ];

    for (val, expected) in data {
        let mut output = Vec::new();
        let ret = Function::Message
            .call(&mut output, vec![val])
            .expect("Failed to call");
        assert!(ret.is_none());
        assert_eq!(
            String::from_utf8(output).expect("Output not utf-8"),
            expected
        );
    }
}

#[test]
fn test_day_of_week() {
    use chrono::NaiveDate;

    let data = vec![
        ((2024, 4, 29), 1),
        ((2024, 5, 1), 3),
        ((2024, 5, 4), 6),
        ((2024, 5, 5), 7),
    ];

    for ((y, m, d), expected) in data {
        let moment = NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date");
        let mut output = Vec::new();
        let ret = Function::DayOfWeek
            .call(&mut output, vec![Value::Moment(moment)])
            .expect("Failed to call");
        assert_eq!(ret, Some(Value::Integer(expected)));
    }

    let mut output = Vec::new();
    match Function::DayOfWeek.call(&mut output, vec![Value::Integer(5)]) {
        Err(EvalError::InvalidArgument { found, .. }) => assert_eq!(found, "integer"),
        _ => panic!("integer argument should be rejected"),
    }
}

#[test]
fn test_current_date() {
    let mut output = Vec::new();
    let now = Function::CurrentDate
        .call(&mut output, vec![])
        .expect("Failed to call");
    assert!(matches!(now, Some(Value::Moment(_))));

    match Function::CurrentDate.call(&mut output, vec![Value::Integer(1)]) {
        Err(EvalError::ArityMismatch {
            expected, found, ..
        }) => assert_eq!((expected, found), (0, 1)),
        _ => panic!("extra argument should be rejected"),
    }
}
