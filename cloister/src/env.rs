//! Lexical environments.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::RuntimeError;
use crate::value::Value;

struct Binding {
    value: Value,
    mutable: bool,
}

/// One level of lexical scope. Closures keep their defining scope alive
/// through an `Arc`.
#[derive(Default)]
pub struct Scope {
    bindings: Mutex<HashMap<String, Binding>>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    pub fn global() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn child(parent: &Arc<Scope>) -> Arc<Self> {
        Arc::new(Self {
            bindings: Mutex::new(HashMap::new()),
            parent: Some(Arc::clone(parent)),
        })
    }

    /// Introduce `name` in this scope, shadowing outer bindings.
    /// Redeclaring in the same scope replaces the old binding so a REPL
    /// session can redefine things.
    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        let _previous = self
            .bindings
            .lock()
            .insert(name.to_string(), Binding { value, mutable });
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = self;
        loop {
            if let Some(binding) = scope.bindings.lock().get(name) {
                return Some(binding.value.clone());
            }
            scope = scope.parent.as_deref()?;
        }
    }

    pub fn assign(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let mut scope = self;
        loop {
            let previous = {
                let mut bindings = scope.bindings.lock();
                match bindings.get_mut(name) {
                    Some(binding) if !binding.mutable => {
                        return Err(RuntimeError::type_error(format!(
                            "assignment to constant `{}`",
                            name
                        )));
                    }
                    Some(binding) => Some(std::mem::replace(&mut binding.value, value.clone())),
                    None => None,
                }
            };
            if previous.is_some() {
                return Ok(());
            }
            scope = match scope.parent.as_deref() {
                Some(parent) => parent,
                None => {
                    return Err(RuntimeError::ReferenceError {
                        name: name.to_string(),
                    });
                }
            };
        }
    }
}
