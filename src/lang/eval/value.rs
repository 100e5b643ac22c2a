use std::cmp::Ordering;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use chrono::NaiveDateTime;

use super::EvalError;
use crate::lang::ast::Procedure;

/// Contract for functions supplied by the host
///
/// The evaluator checks `arity()` against the call site before evaluating any argument, so
/// `call()` always receives exactly `arity()` values.
pub trait NativeFunction {
    fn name(&self) -> &str;
    fn arity(&self) -> usize;
    /// `sink` is where output should be written. Returns `None` for functions that are only
    /// called for their side effects.
    fn call(&self, sink: &mut dyn Write, args: Vec<Value>) -> Result<Option<Value>, EvalError>;
}

#[derive(Clone)]
pub enum Value {
    Integer(i64),
    String(String),
    Boolean(bool),
    /// Opaque point in time. Only builtins create or look inside these.
    Moment(NaiveDateTime),
    Native(Rc<dyn NativeFunction>),
    Procedure(Rc<Procedure>),
    /// Result of a call that produced nothing
    Null,
}

impl Value {
    pub fn type_str(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Moment(_) => "moment",
            Value::Native(_) => "builtin",
            Value::Procedure(_) => "procedure",
            Value::Null => "null",
        }
    }

    /// `false`, `0`, `""` and null are falsy, everything else is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Integer(i) => *i != 0,
            Value::String(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
            Value::Null => false,
            Value::Moment(_) | Value::Native(_) | Value::Procedure(_) => true,
        }
    }

    /// Order two values of the same kind
    ///
    /// Returns `None` if the kinds differ or the kind has no ordering (callables, null).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(l), Value::Integer(r)) => Some(l.cmp(r)),
            (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
            (Value::Boolean(l), Value::Boolean(r)) => Some(l.cmp(r)),
            (Value::Moment(l), Value::Moment(r)) => Some(l.cmp(r)),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Native(l), Value::Native(r)) => l.name() == r.name(),
            (Value::Procedure(l), Value::Procedure(r)) => l == r,
            (Value::Null, Value::Null) => true,
            (l, r) => l.compare(r) == Some(Ordering::Equal),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => {
                write!(f, "{}", if *b { "True" } else { "False" })
            }
            Value::Moment(m) => write!(f, "{}", m.format("%Y-%m-%d %H:%M:%S%.6f")),
            Value::Native(func) => write!(f, "<builtin {}>", func.name()),
            Value::Procedure(proc) => {
                let params: Vec<&str> = proc.params.iter().map(|p| p.0.as_str()).collect();
                write!(f, "<procedure({})>", params.join(", "))
            }
            Value::Null => write!(f, "None"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Procedure(proc) => write!(f, "Procedure({})", proc.name),
            v => write!(f, "{}({})", v.type_str(), v),
        }
    }
}

#[test]
fn test_truthiness() {
    let data = vec![
        (Value::Integer(0), false),
        (Value::Integer(-3), true),
        (Value::String(String::new()), false),
        (Value::String("0".to_string()), true),
        (Value::Boolean(false), false),
        (Value::Boolean(true), true),
        (Value::Null, false),
    ];

    for (value, expected) in data {
        assert_eq!(value.is_truthy(), expected, "{:?}", value);
    }
}

#[test]
fn test_compare() {
    use chrono::NaiveDate;

    let early = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .expect("valid date");
    let late = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .expect("valid date");

    assert_eq!(
        Value::Integer(1).compare(&Value::Integer(2)),
        Some(Ordering::Less)
    );
    assert_eq!(
        Value::String("б".to_string()).compare(&Value::String("а".to_string())),
        Some(Ordering::Greater)
    );
    assert_eq!(
        Value::Boolean(false).compare(&Value::Boolean(true)),
        Some(Ordering::Less)
    );
    assert_eq!(
        Value::Moment(early).compare(&Value::Moment(late)),
        Some(Ordering::Less)
    );
    assert_eq!(
        Value::Integer(1).compare(&Value::String("1".to_string())),
        None
    );
    assert_eq!(Value::Boolean(true).compare(&Value::Integer(1)), None);
    assert_eq!(Value::Null.compare(&Value::Null), None);
    assert_eq!(Value::Null.compare(&Value::Integer(0)), None);
}

#[test]
fn test_display() {
    use chrono::NaiveDate;

    let moment = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_micro_opt(12, 34, 56, 789))
        .expect("valid date");

    assert_eq!(format!("{}", Value::Integer(-5)), "-5");
    assert_eq!(format!("{}", Value::String("текст".to_string())), "текст");
    assert_eq!(format!("{}", Value::Boolean(true)), "True");
    assert_eq!(format!("{}", Value::Null), "None");
    assert_eq!(
        format!("{}", Value::Moment(moment)),
        "2024-05-01 12:34:56.000789"
    );
}
