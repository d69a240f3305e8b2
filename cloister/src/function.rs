//! Function and class values.

use std::sync::{Arc, Weak};

use parser::{Bindings, ClassId, ExprId, FuncId, Program};

use crate::env::Scope;
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::object::ObjectRef;
use crate::token::DefinitionToken;
use crate::value::Value;

pub type FunctionRef = Arc<Function>;
pub type ClassRef = Arc<Class>;

/// Host function: `(interpreter, this, args)`.
pub type NativeFn = fn(&mut Interpreter, Value, Vec<Value>) -> Result<Value, RuntimeError>;

/// A parsed and bound program unit. Functions keep the unit they were
/// defined in alive so they can be called after later units replace it.
#[derive(Debug)]
pub struct Unit {
    pub program: Program,
    pub bindings: Bindings,
}

/// The class body a function was written in.
///
/// Captured when the function value is created and never exposed to
/// scripts; it is what `private` and `static` resolve against.
#[derive(Clone)]
pub struct Home {
    pub token: Arc<DefinitionToken>,
    pub class: Weak<Class>,
    pub parent: Option<ClassRef>,
}

impl Home {
    /// Receiver for `static.m(...)`: the class value itself.
    pub fn class_value(&self) -> Value {
        self.class.upgrade().map(Value::Class).unwrap_or_default()
    }
}

pub struct ScriptFunction {
    pub unit: Arc<Unit>,
    pub func: FuncId,
    pub env: Arc<Scope>,
    pub home: Option<Home>,
}

pub enum Callable {
    Script(ScriptFunction),
    Native(NativeFn),
}

pub struct Function {
    pub name: String,
    pub callable: Callable,
}

impl Function {
    pub fn native(name: &str, f: NativeFn) -> FunctionRef {
        Arc::new(Self {
            name: name.to_string(),
            callable: Callable::Native(f),
        })
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "<anonymous>"
        } else {
            &self.name
        }
    }

    /// The class this function was defined in, if any.
    pub fn home(&self) -> Option<&Home> {
        match &self.callable {
            Callable::Script(script) => script.home.as_ref(),
            Callable::Native(_) => None,
        }
    }
}

/// A field declaration awaiting per-instance initialization.
pub struct FieldInit {
    pub name: String,
    pub init: Option<ExprId>,
}

pub struct Class {
    pub(crate) name: String,
    pub(crate) site: ClassId,
    pub(crate) token: Arc<DefinitionToken>,
    pub(crate) prototype: ObjectRef,
    pub(crate) parent: Option<ClassRef>,
    pub(crate) constructor: Option<FunctionRef>,
    pub(crate) private_methods: Vec<(String, FunctionRef)>,
    pub(crate) fields: Vec<FieldInit>,
    pub(crate) unit: Arc<Unit>,
    pub(crate) env: Arc<Scope>,
}

impl Class {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn site(&self) -> ClassId {
        self.site
    }

    /// Host-side handle on the class' token, for diagnostics and tests.
    /// Scripts have no way to reach it.
    pub fn token(&self) -> &Arc<DefinitionToken> {
        &self.token
    }

    pub fn prototype(&self) -> &ObjectRef {
        &self.prototype
    }

    pub fn parent(&self) -> Option<&ClassRef> {
        self.parent.as_ref()
    }

    /// This class followed by its ancestors.
    pub fn chain(self: &Arc<Self>) -> impl Iterator<Item = ClassRef> {
        std::iter::successors(Some(Arc::clone(self)), |c| c.parent.clone())
    }

    pub(crate) fn home(self: &Arc<Self>) -> Home {
        Home {
            token: Arc::clone(&self.token),
            class: Arc::downgrade(self),
            parent: self.parent.clone(),
        }
    }
}
