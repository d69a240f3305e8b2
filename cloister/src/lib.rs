//! # Cloister
//!
//! Runtime for class-scoped private state. Every evaluation of a class
//! definition mints a [`DefinitionToken`]; functions written inside the
//! class body capture it, and `private` / `static` accessors resolve
//! through it to a per-instance [`SlotTable`] (or the class' static
//! table). Code outside the class has no way to name the token, so it has
//! no way to reach the tables.
//!
//! ```text
//!  source ──▶ parser::parse_program ──▶ parser::bind ──▶ Interpreter
//!                                                           │
//!                        new C(...) ─▶ construct ──register──┤
//!                                                           ▼
//!                 private(x)[k] ─▶ accessor ──lookup──▶ DefinitionToken
//!                                                           │
//!                                                           ▼
//!                                                       SlotTable
//! ```
//!
//! ```rust
//! use cloister::{Interpreter, Value};
//!
//! let mut interp = Interpreter::new();
//! let value = interp
//!     .run("class A { private n = 41; next() { return private.n + 1; } } new A().next()")
//!     .expect("runs");
//! assert_eq!(value, Value::Number(42.0));
//! ```

mod accessor;
mod builtins;
mod construct;
pub mod env;
pub mod error;
pub mod function;
pub mod interpreter;
pub mod object;
mod reclaim;
pub mod settings;
pub mod slots;
pub mod token;
pub mod value;

pub use error::{Error, RuntimeError};
pub use function::{Class, ClassRef, Function, FunctionRef, Unit};
pub use interpreter::{Interpreter, compile};
pub use object::{Object, ObjectRef};
pub use settings::Settings;
pub use slots::SlotTable;
pub use token::{DefinitionToken, NotRegistered, TokenId};
pub use value::{PropertyKey, Symbol, Value};

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> Value {
        Interpreter::new()
            .run(src)
            .unwrap_or_else(|e| panic!("{}: {}", src, e))
    }

    fn class_token(interp: &Interpreter, name: &str) -> std::sync::Arc<DefinitionToken> {
        match interp.global(name) {
            Some(Value::Class(class)) => std::sync::Arc::clone(class.token()),
            other => panic!("{} is not a class: {:?}", name, other),
        }
    }

    #[test]
    fn write_then_forged_receiver() {
        let src = r#"
            class A {
                private id = 0;
                write(v) { private.id = v; }
                read() { return private.id; }
            }
            let x = new A();
            x.write(5);
            let first = x.read();
            let name = "";
            try { x.write.call({}, 99); } catch (e) { name = e.name; }
            first + ":" + name + ":" + x.read()
        "#;
        assert_eq!(eval(src), Value::string("5:PrivateAccessError:5"));

        let forged = r#"
            class A { private id = 0; write(v) { private.id = v; } }
            new A().write.call({ id: 1 }, 99);
        "#;
        match Interpreter::new().run(forged) {
            Err(Error::Runtime(err)) => assert!(err.is_private_access(), "{}", err),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn hash_table_with_lazy_keys() {
        let src = r#"
            class H {
                set(k, v) { private[k] = v; }
                get(k) { return private[k]; }
            }
            let h = new H();
            h.set("a", 1);
            let i = 0;
            while (i < 100) { h.set("k" + i, i); i = i + 1; }
            h.get("a") == 1 && h.get("b") == undefined && h.get("k42") == 42
        "#;
        assert_eq!(eval(src), Value::Bool(true));
    }

    #[test]
    fn instances_never_alias() {
        let src = r#"
            class A {
                private v = 0;
                put(v) { private.v = v; }
                peek(o) { return private(o).v; }
            }
            let a = new A();
            let b = new A();
            a.put("a");
            b.put("b");
            a.peek(a) + b.peek(a) + a.peek(b) + b.peek(b)
        "#;
        assert_eq!(eval(src), Value::string("aabb"));
    }

    #[test]
    fn static_table_is_shared() {
        let src = r#"
            class C {
                static count = 0;
                constructor() { static.count = static.count + 1; }
                total() { return static["count"]; }
            }
            let a = new C();
            let b = new C();
            a.total() + b.total()
        "#;
        assert_eq!(eval(src), Value::Number(4.0));
    }

    #[test]
    fn every_spelling_writes_what_every_other_reads() {
        let src = r#"
            const sym = Symbol("k");
            class S {
                writeBare(k, v) { private[k] = v; }
                writeTarget(k, v) { private(this)[k] = v; }
                writeNamed(v) { private.k = v; }
                writeNamedTarget(v) { private(this).k = v; }
                readBare(k) { return private[k]; }
                readTarget(k) { return private(this)[k]; }
                readNamed() { return private.k; }
                readNamedTarget() { return private(this).k; }
                holds(k) { return k in private; }
                holdsTarget(k) { return k in private(this); }
            }
            let s = new S();
            function symbolReads() { return "" + s.readBare(sym) + s.readTarget(sym); }
            function stringReads() {
                return "" + s.readNamed() + s.readNamedTarget() + s.readBare("k") + s.readTarget("k");
            }
            let log = "";
            s.writeBare(sym, 1);
            log = log + symbolReads() + ",";
            s.writeTarget(sym, 2);
            log = log + symbolReads() + ",";
            s.writeBare("k", 3);
            log = log + stringReads() + ",";
            s.writeTarget("k", 4);
            log = log + stringReads() + ",";
            s.writeNamed(5);
            log = log + stringReads() + ",";
            s.writeNamedTarget(6);
            log = log + stringReads() + "," + symbolReads() + ",";
            log + (s.holds(sym) && s.holdsTarget(sym) && s.holds("k") && s.holdsTarget("k")
                && s.readBare(Symbol("k")) == undefined)
        "#;
        let mut interp = Interpreter::new();
        let value = interp.run(src).expect("runs");
        assert_eq!(value, Value::string("11,22,3333,4444,5555,6666,22,true"));

        let token = class_token(&interp, "S");
        let instance = match interp.global("s") {
            Some(Value::Object(object)) => object,
            other => panic!("s is not an object: {:?}", other),
        };
        let table = token.lookup_instance(&instance).expect("registered");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn nested_class_binds_to_itself() {
        let src = r#"
            class Outer {
                private tag = "outer";
                inspect() {
                    class Inner {
                        private tag = "inner";
                        read(o) { return private(o).tag; }
                    }
                    let inner = new Inner();
                    let crossed = "";
                    try { inner.read(this); } catch (e) { crossed = e.name; }
                    return inner.read(inner) + "/" + private.tag + "/" + crossed;
                }
            }
            new Outer().inspect()
        "#;
        assert_eq!(eval(src), Value::string("inner/outer/PrivateAccessError"));
    }

    #[test]
    fn unbound_accessor_rejects_the_whole_unit() {
        let mut interp = Interpreter::new();
        let err = interp
            .run("let touched = 1; function f() { return private.x; }")
            .expect_err("unbound accessor");
        assert!(matches!(err, Error::Scope(ref errors) if errors.len() == 1), "{}", err);
        assert_eq!(interp.global("touched"), None);
    }

    #[test]
    fn base_and_derived_tables_are_separate() {
        let src = r#"
            class Base {
                private secret = "base";
                baseSecret() { return private.secret; }
            }
            class Derived extends Base {
                private secret = "derived";
                derivedSecret() { return private.secret; }
                peek(o) { return private(o).secret; }
            }
            let d = new Derived();
            let rejected = "";
            try { d.peek(new Base()); } catch (e) { rejected = e.name; }
            d.baseSecret() + "/" + d.derivedSecret() + "/" + rejected
        "#;
        let mut interp = Interpreter::new();
        let value = interp.run(src).expect("runs");
        assert_eq!(value, Value::string("base/derived/PrivateAccessError"));

        let base = class_token(&interp, "Base");
        let derived = class_token(&interp, "Derived");
        assert_ne!(base.id(), derived.id());
        assert_eq!(base.live_instances(), 1);
        assert_eq!(derived.live_instances(), 1);
    }

    #[test]
    fn tables_are_reclaimed_with_their_instance() {
        let mut interp = Interpreter::new();
        interp
            .run("class A { private v = 1; } let a = new A(); let b = new A();")
            .expect("setup");
        let token = class_token(&interp, "A");
        assert_eq!(token.live_instances(), 2);

        interp.run("a = undefined;").expect("drop a");
        assert_eq!(token.live_instances(), 1);
        interp.run("b = null;").expect("drop b");
        assert_eq!(token.live_instances(), 0);
    }

    #[test]
    fn long_chain_of_instances_is_reclaimed() {
        let mut interp = Interpreter::new();
        let src = r#"
            class Node {
                private next;
                link(n) { private.next = n; return this; }
            }
            let head = undefined;
            let i = 0;
            while (i < 20000) { head = new Node().link(head); i = i + 1; }
        "#;
        interp.run(src).expect("builds the chain");
        let token = class_token(&interp, "Node");
        assert_eq!(token.live_instances(), 20000);

        interp.run("head = undefined;").expect("drops the chain");
        assert_eq!(token.live_instances(), 0);
    }

    #[test]
    fn deep_expressions_are_refused_before_running() {
        let mut interp = Interpreter::new();
        let sum = format!("1{}", " + 1".repeat(100));
        assert_eq!(interp.run(&sum).ok(), Some(Value::Number(101.0)));

        let deep = format!("let touched = 1{};", " + 1".repeat(5000));
        match interp.run(&deep) {
            Err(Error::Parse(errors)) => {
                assert!(errors[0].message.contains("nested too deeply"), "{}", errors[0])
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(interp.global("touched"), None);
    }

    #[test]
    fn identical_definitions_get_distinct_tokens() {
        let src = r#"
            function make() {
                return class { private v = 0; peek(o) { return private(o).v; } };
            }
            let A = make();
            let B = make();
            let a = new A();
            let rejected = false;
            try { new B().peek(a); } catch (e) { rejected = e.name == "PrivateAccessError"; }
            a.peek(a) == 0 && rejected
        "#;
        assert_eq!(eval(src), Value::Bool(true));
    }

    #[test]
    fn caught_errors_carry_name_and_message() {
        let src = r#"
            class A { read(o) { return private(o).x; } }
            let caught = {};
            try { new A().read({}); } catch (e) { caught = e; }
            caught.name + ": " + caught.message
        "#;
        let text = match eval(src) {
            Value::String(text) => text,
            other => panic!("expected a string, got {:?}", other),
        };
        assert!(
            text.starts_with("PrivateAccessError: object #") && text.ends_with("was not constructed by class A"),
            "{}",
            text
        );
    }
}
