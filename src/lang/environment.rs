use std::collections::BTreeMap;
use std::rc::Rc;

use crate::lang::ast::Identifier;
use crate::lang::eval::{NativeFunction, Value};
use crate::lang::functions::FUNCTIONS;

/// Name to value bindings
///
/// Variables, procedures and builtins all live in the same namespace. `clone()` produces an
/// independent copy with the same entries, which is how procedure calls get their local scope:
/// a callee sees every binding the caller had at call time, and nothing it does is visible to
/// the caller afterwards.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    inner: BTreeMap<Identifier, Value>,
}

impl Environment {
    /// Environment preloaded with the standard builtins
    pub fn new() -> Self {
        let mut env = Environment::default();
        for func in &*FUNCTIONS {
            env.define_native(Rc::new(*func));
        }

        env
    }

    pub fn define_native(&mut self, func: Rc<dyn NativeFunction>) {
        self.insert(Identifier::from(func.name()), Value::Native(func));
    }

    pub fn get(&self, ident: &Identifier) -> Option<&Value> {
        self.inner.get(ident)
    }

    pub fn insert(&mut self, ident: Identifier, val: Value) {
        self.inner.insert(ident, val);
    }
}

#[test]
fn test_builtins() {
    let env = Environment::new();
    for name in &["сообщить", "текущаядата", "деньнедели"] {
        assert!(
            matches!(env.get(&Identifier::from(*name)), Some(Value::Native(_))),
            "missing builtin {}",
            name
        );
    }

    assert!(Environment::default()
        .get(&Identifier::from("сообщить"))
        .is_none());
}

#[test]
fn test_clone_is_independent() {
    let mut caller = Environment::new();
    caller.insert(Identifier::from("A"), Value::Integer(1));

    let mut callee = caller.clone();
    callee.insert(Identifier::from("a"), Value::Integer(2));
    callee.insert(Identifier::from("x"), Value::Integer(3));

    assert_eq!(caller.get(&Identifier::from("a")), Some(&Value::Integer(1)));
    assert_eq!(caller.get(&Identifier::from("x")), None);
    assert_eq!(callee.get(&Identifier::from("a")), Some(&Value::Integer(2)));
}
