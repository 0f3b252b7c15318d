use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::interp::value::Value;

/// A lexical scope chain. Cloning shares the scope.
#[derive(Clone, Default)]
pub struct Env(Rc<RefCell<Scope>>);

#[derive(Default)]
struct Scope {
    vars: HashMap<String, Value>,
    parent: Option<Env>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a nested scope whose lookups fall back to `self`.
    pub fn child(&self) -> Env {
        Env(Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    /// Bind `name` in this scope, shadowing outer bindings.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let scope = self.0.borrow();
        match scope.vars.get(name) {
            Some(value) => Some(value.clone()),
            None => scope.parent.as_ref().and_then(|parent| parent.get(name)),
        }
    }

    /// Update the nearest existing binding. Returns false when `name` is
    /// not bound anywhere in the chain.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        let mut scope = self.0.borrow_mut();
        if let Some(slot) = scope.vars.get_mut(name) {
            *slot = value;
            return true;
        }
        match &scope.parent {
            Some(parent) => parent.assign(name, value),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_scope_shadows_and_assigns_through() {
        let global = Env::new();
        global.define("x", Value::Int(1));
        let inner = global.child();

        assert!(inner.assign("x", Value::Int(2)));
        assert_eq!(global.get("x").and_then(|v| v.as_int()), Some(2));

        inner.define("x", Value::Int(3));
        assert_eq!(inner.get("x").and_then(|v| v.as_int()), Some(3));
        assert_eq!(global.get("x").and_then(|v| v.as_int()), Some(2));

        assert!(!inner.assign("missing", Value::Nil));
    }
}
