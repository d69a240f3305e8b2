//! Instantiation.
//!
//! `new C(args)` allocates the instance and registers it with the token of
//! every class in `C`'s chain before any user code runs. Initialization
//! then proceeds base-first: a class installs its private methods and runs
//! its private field initializers, then its constructor body. A derived
//! constructor hands control to its parent through `super(...)`, and its
//! own private members are set up as soon as that call returns.

use std::cell::Cell;
use std::sync::Arc;

use log::trace;

use crate::error::RuntimeError;
use crate::function::ClassRef;
use crate::interpreter::{Construction, Frame, Interpreter};
use crate::object::{Object, ObjectRef};
use crate::value::{PropertyKey, Value};

impl Interpreter {
    pub(crate) fn construct(&mut self, class: &ClassRef, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let instance = Object::new(Some(Arc::clone(&class.prototype)));
        for link in class.chain() {
            link.token.register_instance(&instance);
        }
        self.initialize(class, &instance, args)?;
        Ok(Value::Object(instance))
    }

    fn initialize(&mut self, class: &ClassRef, instance: &ObjectRef, args: Vec<Value>) -> Result<(), RuntimeError> {
        trace!("initializing object #{} as {}", instance.id(), class.name);
        let this = Value::Object(Arc::clone(instance));
        match (&class.parent, &class.constructor) {
            (None, None) => self.install_private(class, instance),
            (None, Some(constructor)) => {
                self.install_private(class, instance)?;
                self.invoke(constructor, this, args, None)?;
                Ok(())
            }
            (Some(parent), None) => {
                self.initialize(parent, instance, args)?;
                self.install_private(class, instance)
            }
            (Some(_), Some(constructor)) => {
                let construction = Construction {
                    class: Arc::clone(class),
                    instance: Arc::clone(instance),
                    super_called: Cell::new(false),
                };
                self.invoke(constructor, this, args, Some(&construction))?;
                if !construction.super_called.get() {
                    return Err(RuntimeError::type_error(format!(
                        "constructor of {} must call super(...)",
                        class.name
                    )));
                }
                Ok(())
            }
        }
    }

    /// `super(args)` inside a derived constructor.
    pub(crate) fn super_call(&mut self, frame: &Frame, args: Vec<Value>) -> Result<(), RuntimeError> {
        let Some(construction) = frame.construction else {
            return Err(RuntimeError::type_error(
                "`super(...)` is only valid in a derived constructor",
            ));
        };
        if construction.super_called.replace(true) {
            return Err(RuntimeError::type_error("`super(...)` called twice"));
        }
        let Some(parent) = &construction.class.parent else {
            return Err(RuntimeError::type_error(format!(
                "class {} has no parent",
                construction.class.name
            )));
        };
        self.initialize(parent, &construction.instance, args)?;
        self.install_private(&construction.class, &construction.instance)
    }

    /// Private methods first, then field initializers in declaration
    /// order. A name declared twice keeps the last value.
    fn install_private(&mut self, class: &ClassRef, instance: &ObjectRef) -> Result<(), RuntimeError> {
        let table = class.token.register_instance(instance);
        for (name, method) in &class.private_methods {
            table.set(PropertyKey::from(name.as_str()), Value::Function(Arc::clone(method)));
        }
        if class.fields.is_empty() {
            return Ok(());
        }
        let frame = Frame {
            unit: Arc::clone(&class.unit),
            this: Value::Object(Arc::clone(instance)),
            home: Some(class.home()),
            construction: None,
        };
        for field in &class.fields {
            let value = match field.init {
                Some(init) => self.eval(&frame, &class.env, init)?,
                None => Value::Undefined,
            };
            table.set(PropertyKey::from(field.name.as_str()), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{Error, RuntimeError};
    use crate::{Interpreter, Value};

    fn eval(src: &str) -> Value {
        Interpreter::new()
            .run(src)
            .unwrap_or_else(|e| panic!("{}: {}", src, e))
    }

    #[test]
    fn fields_are_ready_before_constructor_body() {
        let src = r#"
            class A {
                private seen;
                private base = 40;
                constructor(n) { private.seen = private.base + n; }
                seen() { return private.seen; }
            }
            new A(2).seen()
        "#;
        assert_eq!(eval(src), Value::Number(42.0));
    }

    #[test]
    fn initializers_see_this_and_earlier_fields() {
        let src = r#"
            class A {
                private a = 1;
                private b = private.a + 1;
                private self = this;
                check() { return private.b == 2 && private.self == this; }
            }
            new A().check()
        "#;
        assert_eq!(eval(src), Value::Bool(true));
    }

    #[test]
    fn last_initializer_wins() {
        let src = r#"
            class A {
                private x = 1;
                private x = 2;
                get() { return private.x; }
            }
            new A().get()
        "#;
        assert_eq!(eval(src), Value::Number(2.0));
    }

    #[test]
    fn derived_fields_wait_for_super() {
        let src = r#"
            class Base {
                constructor() { this.order = "base"; }
            }
            class Derived extends Base {
                private tag = this.order + "+derived";
                constructor() {
                    let before = private.tag;
                    super();
                    this.before = before;
                }
                tag() { return private.tag; }
            }
            let d = new Derived();
            d.tag() + "/" + d.before
        "#;
        assert_eq!(eval(src), Value::string("base+derived/undefined"));
    }

    #[test]
    fn implicit_derived_constructor_forwards_arguments() {
        let src = r#"
            class Base { constructor(v) { this.v = v; } }
            class Derived extends Base { private w = 1; w() { return private.w; } }
            let d = new Derived(9);
            d.v + d.w()
        "#;
        assert_eq!(eval(src), Value::Number(10.0));
    }

    #[test]
    fn super_must_be_called_exactly_once() {
        let missing = "class B {} class D extends B { constructor() {} } new D();";
        match Interpreter::new().run(missing) {
            Err(Error::Runtime(RuntimeError::TypeError { message })) => {
                assert!(message.contains("must call super"), "{}", message)
            }
            other => panic!("unexpected {:?}", other),
        }
        let twice = "class B {} class D extends B { constructor() { super(); super(); } } new D();";
        match Interpreter::new().run(twice) {
            Err(Error::Runtime(RuntimeError::TypeError { message })) => {
                assert!(message.contains("twice"), "{}", message)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn extends_requires_a_class() {
        let err = Interpreter::new()
            .run("let x = 1; class D extends x {}")
            .expect_err("not a class");
        assert!(matches!(err, Error::Runtime(RuntimeError::TypeError { .. })));
    }
}
