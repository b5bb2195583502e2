use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::trace;

use crate::value::Value;

/// Shared handle to a scope. Function values hold one to keep their defining
/// scope alive.
pub type Env = Rc<RefCell<Environment>>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("identifier not found: {0}")]
    Unbound(String),
}

#[derive(Debug, Default)]
pub struct Environment {
    // Use Rc<RefCell<...>> so closures can share a frame and `update` can
    // mutate one through any handle.
    outer: Option<Env>,
    bindings: FxHashMap<String, Value>,
}

impl Environment {
    /// Creates a new, top-level (global) environment.
    pub fn new() -> Env {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer: Env) -> Env {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer),
            bindings: FxHashMap::default(),
        }))
    }

    /// Binds `name` in the *current* frame, shadowing any outer binding.
    /// Replaces the value if the name already exists in this frame.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Looks up a name, innermost frame first.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.bindings.get(name) {
            Some(value) => Some(value.clone()),
            None => self.outer.as_ref()?.borrow().get(name),
        }
    }

    /// Rebinds an *existing* name in the nearest frame that owns it.
    pub fn update(&mut self, name: &str, value: Value) -> Result<(), EnvError> {
        if let Some(slot) = self.bindings.get_mut(name) {
            trace!(name, "binding updated");
            *slot = value;
            return Ok(());
        }
        match &self.outer {
            Some(outer) => outer.borrow_mut().update(name, value),
            None => Err(EnvError::Unbound(name.to_string())),
        }
    }

    /// Every name visible from this frame.
    pub fn identifiers(&self) -> HashSet<String> {
        let mut identifiers = match &self.outer {
            Some(outer) => outer.borrow().identifiers(),
            None => HashSet::new(),
        };
        identifiers.extend(self.bindings.keys().cloned());
        identifiers
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Value {
        Value::Integer(n)
    }

    #[test]
    fn test_define_and_get_global() {
        let env = Environment::new();
        env.borrow_mut().define("x", int(10));

        assert_eq!(env.borrow().get("x"), Some(int(10)));
    }

    #[test]
    fn test_get_unbound() {
        let global_env = Environment::new();
        let local_env = Environment::new_enclosed(global_env);
        assert_eq!(local_env.borrow().get("z"), None);
    }

    #[test]
    fn test_define_and_get_enclosed() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("x", int(10));

        let local_env = Environment::new_enclosed(global_env);
        local_env.borrow_mut().define("y", int(20));

        assert_eq!(local_env.borrow().get("y"), Some(int(20)));
        assert_eq!(local_env.borrow().get("x"), Some(int(10)));
    }

    #[test]
    fn test_shadowing() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("x", int(10));

        let local_env = Environment::new_enclosed(global_env.clone());
        local_env.borrow_mut().define("x", int(50));

        let inner_env = Environment::new_enclosed(local_env.clone());
        inner_env.borrow_mut().define("y", Value::string("y-value"));

        assert_eq!(inner_env.borrow().get("x"), Some(int(50)));
        assert_eq!(inner_env.borrow().get("y"), Some(Value::string("y-value")));
        assert_eq!(local_env.borrow().get("x"), Some(int(50)));
        assert_eq!(global_env.borrow().get("x"), Some(int(10)));
    }

    #[test]
    fn test_update_outer() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("counter", int(0));
        let local_env = Environment::new_enclosed(global_env.clone());

        assert_eq!(local_env.borrow_mut().update("counter", int(1)), Ok(()));
        assert_eq!(global_env.borrow().get("counter"), Some(int(1)));
        assert!(local_env.borrow().bindings.is_empty());
    }

    #[test]
    fn test_update_nearest_owner() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("x", int(1));
        let local_env = Environment::new_enclosed(global_env.clone());
        local_env.borrow_mut().define("x", int(2));

        local_env
            .borrow_mut()
            .update("x", int(3))
            .expect("x is bound locally");
        assert_eq!(local_env.borrow().get("x"), Some(int(3)));
        assert_eq!(global_env.borrow().get("x"), Some(int(1)));
    }

    #[test]
    fn test_update_unbound_error() {
        let env = Environment::new_enclosed(Environment::new());
        let result = env.borrow_mut().update("missing", int(1));
        assert_eq!(result, Err(EnvError::Unbound("missing".to_string())));
        assert_eq!(
            result.unwrap_err().to_string(),
            "identifier not found: missing"
        );
    }

    #[test]
    fn test_identifiers() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("outer", int(1));
        let local_env = Environment::new_enclosed(global_env);
        local_env.borrow_mut().define("inner", int(2));

        let names = local_env.borrow().identifiers();
        assert_eq!(names.len(), 2);
        assert!(names.contains("outer") && names.contains("inner"));
    }
}
