//! Host functions available to every program.

use crate::env::Scope;
use crate::error::RuntimeError;
use crate::function::{Function, NativeFn};
use crate::interpreter::Interpreter;
use crate::value::{Symbol, Value};

const GLOBALS: &[(&str, NativeFn)] = &[("print", print), ("assert", assert), ("Symbol", symbol)];

pub(crate) fn install(globals: &Scope) {
    for (name, f) in GLOBALS {
        globals.declare(name, Value::Function(Function::native(name, *f)), false);
    }
}

fn print(_: &mut Interpreter, _: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", line);
    Ok(Value::Undefined)
}

fn assert(_: &mut Interpreter, _: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let mut args = args.into_iter();
    if args.next().unwrap_or_default().is_truthy() {
        return Ok(Value::Undefined);
    }
    let message = match args.next() {
        Some(message) => message.to_string(),
        None => "assertion failed".to_string(),
    };
    Err(RuntimeError::AssertionFailed { message })
}

fn symbol(_: &mut Interpreter, _: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let description = match args.first() {
        None | Some(Value::Undefined) => None,
        Some(description) => Some(description.to_string()),
    };
    Ok(Value::Symbol(Symbol::new(description.as_deref())))
}

/// `f.call(receiver, ...args)`: the function is `this`.
pub(crate) fn call(interp: &mut Interpreter, this: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let Value::Function(function) = this else {
        return Err(RuntimeError::type_error(format!(
            "`call` expects a function receiver, got {}",
            this.describe()
        )));
    };
    let mut args = args.into_iter();
    let receiver = args.next().unwrap_or_default();
    interp.call_function(&function, receiver, args.collect())
}
