//! Evaluation of `private` and `static` accessors.
//!
//! Every accessor form goes through [`Interpreter::resolve_table`]:
//!
//! * `private.k`, `private[e]`: the table of the current receiver;
//! * `private(x).k`, `private(x)[e]`: the table of `x`;
//! * `static.k`, `static[e]`: the class' static table.
//!
//! The token comes from the running function's [`Home`], never from the
//! target, so calling a method with a substituted receiver cannot reach
//! another object's table: the lookup simply fails.

use std::sync::Arc;

use log::{debug, trace};
use parser::ast::{Accessor, AccessorKind, MemberKey};
use parser::ExprId;

use crate::env::Scope;
use crate::error::RuntimeError;
use crate::function::Home;
use crate::interpreter::{Frame, Interpreter};
use crate::slots::SlotTable;
use crate::token::{DefinitionToken, NotRegistered};
use crate::value::{PropertyKey, Value};

/// The home of the running function, checked against the class the
/// binder assigned to `site`.
fn bound_home<'f>(frame: &'f Frame, site: ExprId) -> Result<&'f Home, RuntimeError> {
    let home = frame.home.as_ref().ok_or_else(|| {
        RuntimeError::type_error("private accessor evaluated outside of a class body")
    })?;
    let bound = frame.unit.bindings.construct_of(site);
    if bound != Some(home.token.site()) {
        return Err(RuntimeError::type_error(format!(
            "accessor bound to {:?} resolved against class {}",
            bound,
            home.token.name()
        )));
    }
    Ok(home)
}

/// The table `token` keeps for `receiver`.
pub(crate) fn instance_table(
    token: &DefinitionToken,
    receiver: &Value,
) -> Result<Arc<SlotTable>, RuntimeError> {
    let found = match receiver {
        Value::Object(object) => token.lookup_instance(object),
        _ => Err(NotRegistered),
    };
    found.map_err(|NotRegistered| {
        debug!(
            "rejected private access to {} through {} ({})",
            receiver.describe(),
            token.id(),
            token.name()
        );
        RuntimeError::PrivateAccess {
            construct: token.name().to_string(),
            receiver: receiver.describe(),
        }
    })
}

impl Interpreter {
    /// Resolve an accessor to its table and the receiver a method read
    /// through it is called with.
    fn resolve_table(
        &mut self,
        frame: &Frame,
        env: &Arc<Scope>,
        site: ExprId,
        accessor: &Accessor,
    ) -> Result<(Arc<SlotTable>, Value), RuntimeError> {
        let home = bound_home(frame, site)?;
        match &accessor.kind {
            AccessorKind::Static => {
                trace!("static access through {}", home.token.id());
                Ok((Arc::clone(home.token.static_table()), home.class_value()))
            }
            AccessorKind::Instance { target } => {
                let receiver = match target {
                    Some(target) => self.eval(frame, env, *target)?,
                    None => frame.this.clone(),
                };
                let table = instance_table(&home.token, &receiver)?;
                Ok((table, receiver))
            }
        }
    }

    fn slot_key(&mut self, frame: &Frame, env: &Arc<Scope>, key: &MemberKey) -> Result<PropertyKey, RuntimeError> {
        match key {
            MemberKey::Named(name) => Ok(PropertyKey::from(name.as_str())),
            MemberKey::Computed(expr) => Ok(self.eval(frame, env, *expr)?.to_property_key()),
        }
    }

    /// Read. Absent keys are `undefined`. Also returns the receiver, for
    /// `private(x).m(...)`.
    pub(crate) fn private_get(
        &mut self,
        frame: &Frame,
        env: &Arc<Scope>,
        site: ExprId,
        accessor: &Accessor,
        key: &MemberKey,
    ) -> Result<(Value, Value), RuntimeError> {
        let (table, receiver) = self.resolve_table(frame, env, site, accessor)?;
        let key = self.slot_key(frame, env, key)?;
        Ok((table.get(&key).unwrap_or_default(), receiver))
    }

    /// Write. The table and key are resolved before `value` is evaluated.
    pub(crate) fn private_set(
        &mut self,
        frame: &Frame,
        env: &Arc<Scope>,
        site: ExprId,
        accessor: &Accessor,
        key: &MemberKey,
        value: ExprId,
    ) -> Result<Value, RuntimeError> {
        let (table, _) = self.resolve_table(frame, env, site, accessor)?;
        let key = self.slot_key(frame, env, key)?;
        let value = self.eval(frame, env, value)?;
        table.set(key, value.clone());
        Ok(value)
    }

    pub(crate) fn private_delete(
        &mut self,
        frame: &Frame,
        env: &Arc<Scope>,
        site: ExprId,
        accessor: &Accessor,
        key: &MemberKey,
    ) -> Result<Value, RuntimeError> {
        let (table, _) = self.resolve_table(frame, env, site, accessor)?;
        let key = self.slot_key(frame, env, key)?;
        Ok(Value::Bool(table.delete(&key)))
    }

    /// `key in private(x)`. The key has already been evaluated.
    pub(crate) fn private_has(
        &mut self,
        frame: &Frame,
        env: &Arc<Scope>,
        site: ExprId,
        accessor: &Accessor,
        key: &PropertyKey,
    ) -> Result<Value, RuntimeError> {
        let (table, _) = self.resolve_table(frame, env, site, accessor)?;
        Ok(Value::Bool(table.has(key)))
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

    fn private_error(src: &str) -> RuntimeError {
        match Interpreter::new().run(src) {
            Err(Error::Runtime(err)) if err.is_private_access() => err,
            other => panic!("expected PrivateAccessError for {:?}, got {:?}", src, other),
        }
    }

    #[test]
    fn four_spellings_read_and_write_the_same_slot() {
        let src = r#"
            class P {
                private k = 1;
                run() {
                    let trace = "";
                    private.k = private.k + 1;
                    trace = trace + private["k"];
                    private["k"] = private(this).k + 1;
                    trace = trace + private(this)["k"];
                    private(this).k = private(this)["k"] + 1;
                    trace = trace + private.k;
                    private(this)["k"] = private["k"] + 1;
                    return trace + private.k;
                }
            }
            new P().run()
        "#;
        assert_eq!(eval(src), Value::string("2345"));
    }

    #[test]
    fn read_of_absent_key_is_undefined() {
        let src = "class A { look() { return private.nothing; } } new A().look()";
        assert_eq!(eval(src), Value::Undefined);
    }

    #[test]
    fn has_and_delete() {
        let src = r#"
            class A {
                private present = 1;
                check() {
                    let before = "present" in private;
                    let removed = delete private.present;
                    let again = delete private["present"];
                    return before && removed && !again && !("present" in private(this));
                }
            }
            new A().check()
        "#;
        assert_eq!(eval(src), Value::Bool(true));
    }

    #[test]
    fn non_object_targets_are_rejected() {
        let err = private_error("class A { peek(x) { return private(x).v; } } new A().peek(5);");
        assert_eq!(
            err.to_string(),
            "PrivateAccessError: 5 was not constructed by class A"
        );
        private_error("class A { peek(x) { return \"v\" in private(x); } } new A().peek(\"s\");");
    }

    #[test]
    fn plain_objects_are_rejected_on_every_operation() {
        for body in [
            "return private(o).v;",
            "private(o).v = 1;",
            "return delete private(o).v;",
            "return \"v\" in private(o);",
        ] {
            let src = format!("class A {{ m(o) {{ {} }} }} new A().m({{ v: 1 }});", body);
            private_error(&src);
        }
    }

    #[test]
    fn private_method_call_uses_target_as_receiver() {
        let src = r#"
            class Acc {
                private total = 0;
                private add(n) { private.total = private.total + n; return this; }
                constructor(start) { private.total = start; }
                merge(other) {
                    private(other).add(private.total);
                    return private(other).total;
                }
            }
            let a = new Acc(2);
            let b = new Acc(5);
            a.merge(b)
        "#;
        assert_eq!(eval(src), Value::Number(7.0));
    }

    #[test]
    fn static_method_receiver_is_the_class() {
        let src = r#"
            class Counter {
                static count = 10;
                static next() { static.count = static.count + 1; return this; }
                bump() { return static.next() == Counter; }
            }
            let ok = new Counter().bump();
            ok
        "#;
        assert_eq!(eval(src), Value::Bool(true));
    }

    #[test]
    fn nested_function_shares_class_access() {
        let src = r#"
            class Box {
                private v = 3;
                reader() {
                    let self = this;
                    return function() { return private(self).v; };
                }
            }
            let r = new Box().reader();
            r()
        "#;
        assert_eq!(eval(src), Value::Number(3.0));
    }

    #[test]
    fn write_evaluates_key_before_value() {
        let src = r#"
            class A {
                private log = "";
                run() {
                    private[this.note("k")] = this.note("v");
                    return private.log;
                }
                note(s) { private.log = private.log + s; return s; }
            }
            new A().run()
        "#;
        assert_eq!(eval(src), Value::string("kv"));
    }
}
