//! Tree-walking evaluator.
//!
//! Programs are parsed and bound into a [`Unit`] first; nothing runs if
//! either step fails. Evaluation then walks the arena AST directly.
//! Private accessors are handled in [`crate::accessor`], instantiation in
//! [`crate::construct`].

use std::cell::Cell;
use std::cmp::Ordering;
use std::sync::{Arc, Weak};

use log::debug;
use parser::ast::{BinaryOp, ExprKind, LogicalOp, MemberKind, Stmt, StmtKind, UnaryOp};
use parser::{ClassId, ExprId, FuncId};

use crate::builtins;
use crate::env::Scope;
use crate::error::{Error, RuntimeError};
use crate::function::{
    Callable, Class, ClassRef, FieldInit, Function, FunctionRef, Home,
    ScriptFunction, Unit,
};
use crate::object::{Object, ObjectRef};
use crate::settings::Settings;
use crate::token::DefinitionToken;
use crate::value::{PropertyKey, Value};

pub(crate) enum Flow {
    Normal,
    Return(Value),
}

/// State of a derived constructor that has not finished yet.
pub(crate) struct Construction {
    pub class: ClassRef,
    pub instance: ObjectRef,
    pub super_called: Cell<bool>,
}

/// What the running function sees besides its variables.
pub(crate) struct Frame<'c> {
    pub unit: Arc<Unit>,
    pub this: Value,
    pub home: Option<Home>,
    pub construction: Option<&'c Construction>,
}

/// Parse and bind `source` without running it.
pub fn compile(source: &str) -> Result<Unit, Error> {
    let program = parser::parse_program(source).map_err(Error::Parse)?;
    let bindings = parser::bind(&program).map_err(Error::Scope)?;
    Ok(Unit { program, bindings })
}

pub struct Interpreter {
    settings: Settings,
    globals: Arc<Scope>,
    depth: usize,
    call_fn: FunctionRef,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let globals = Scope::global();
        builtins::install(&globals);
        Self {
            settings,
            globals,
            depth: 0,
            call_fn: Function::native("call", builtins::call),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.lookup(name)
    }

    /// Run one program unit and return the value of its last expression
    /// statement. Globals persist between calls.
    pub fn run(&mut self, source: &str) -> Result<Value, Error> {
        let unit = Arc::new(compile(source)?);
        self.run_unit(unit)
    }

    pub fn run_unit(&mut self, unit: Arc<Unit>) -> Result<Value, Error> {
        self.depth = 0;
        let frame = Frame {
            unit: Arc::clone(&unit),
            this: Value::Undefined,
            home: None,
            construction: None,
        };
        let env = Arc::clone(&self.globals);
        self.hoist(&frame, &env, &unit.program.body);

        let mut last = Value::Undefined;
        for stmt in &unit.program.body {
            match &stmt.kind {
                StmtKind::Expr(expr) => last = self.eval(&frame, &env, *expr)?,
                _ => {
                    if let Flow::Return(value) = self.exec(&frame, &env, stmt)? {
                        return Ok(value);
                    }
                }
            }
        }
        Ok(last)
    }

    // ───────────────────────────────────────────────────────────
    //  Statements
    // ───────────────────────────────────────────────────────────

    /// Function declarations are visible throughout their block.
    fn hoist(&mut self, frame: &Frame, env: &Arc<Scope>, stmts: &[Stmt]) {
        for stmt in stmts {
            if let StmtKind::Function(func) = stmt.kind {
                let function = self.make_function(frame, env, func);
                env.declare(&function.name, Value::Function(Arc::clone(&function)), true);
            }
        }
    }

    pub(crate) fn exec_block(
        &mut self,
        frame: &Frame,
        env: &Arc<Scope>,
        stmts: &[Stmt],
    ) -> Result<Flow, RuntimeError> {
        self.hoist(frame, env, stmts);
        for stmt in stmts {
            if let Flow::Return(value) = self.exec(frame, env, stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, frame: &Frame, env: &Arc<Scope>, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match &stmt.kind {
            StmtKind::Let {
                name,
                mutable,
                init,
            } => {
                let value = match init {
                    Some(init) => self.eval(frame, env, *init)?,
                    None => Value::Undefined,
                };
                env.declare(name, value, *mutable);
            }
            StmtKind::Expr(expr) => {
                self.eval(frame, env, *expr)?;
            }
            StmtKind::Block(body) => {
                let scope = Scope::child(env);
                return self.exec_block(frame, &scope, body);
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(frame, env, *cond)?.is_truthy() {
                    return self.exec(frame, env, then);
                } else if let Some(otherwise) = otherwise {
                    return self.exec(frame, env, otherwise);
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval(frame, env, *cond)?.is_truthy() {
                    if let Flow::Return(value) = self.exec(frame, env, body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(frame, env, *value)?,
                    None => Value::Undefined,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Throw(value) => {
                let value = self.eval(frame, env, *value)?;
                return Err(RuntimeError::Thrown(value));
            }
            StmtKind::Try {
                body,
                param,
                handler,
            } => {
                let scope = Scope::child(env);
                return match self.exec_block(frame, &scope, body) {
                    Ok(flow) => Ok(flow),
                    Err(err) => {
                        debug!("caught {}", err);
                        let scope = Scope::child(env);
                        scope.declare(param, error_value(err), true);
                        self.exec_block(frame, &scope, handler)
                    }
                };
            }
            StmtKind::Function(_) => {}
            StmtKind::Class(id) => {
                let class = self.define_class(frame, env, *id)?;
                env.declare(&class.name, Value::Class(class.clone()), true);
            }
        }
        Ok(Flow::Normal)
    }

    // ───────────────────────────────────────────────────────────
    //  Expressions
    // ───────────────────────────────────────────────────────────

    pub(crate) fn eval(&mut self, frame: &Frame, env: &Arc<Scope>, id: ExprId) -> Result<Value, RuntimeError> {
        let node = frame.unit.program.arena.get(id);
        match &node.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::string(s)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Undefined => Ok(Value::Undefined),
            ExprKind::Ident(name) => env
                .lookup(name)
                .ok_or_else(|| RuntimeError::ReferenceError { name: name.clone() }),
            ExprKind::This => Ok(frame.this.clone()),
            ExprKind::Object(props) => {
                let object = Object::new(None);
                for (name, value) in props {
                    let value = self.eval(frame, env, *value)?;
                    object.set(PropertyKey::from(name.as_str()), value);
                }
                Ok(Value::Object(object))
            }
            ExprKind::Function(func) => Ok(Value::Function(self.make_function(frame, env, *func))),
            ExprKind::Class(class) => Ok(Value::Class(self.define_class(frame, env, *class)?)),
            ExprKind::Unary { op, operand } => self.eval_unary(frame, env, *op, *operand),
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(frame, env, *left)?;
                let right = self.eval(frame, env, *right)?;
                binary(*op, left, right)
            }
            ExprKind::Logical { op, left, right } => {
                let left = self.eval(frame, env, *left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(frame, env, *right)
                }
            }
            ExprKind::Assign { target, value } => self.eval_assign(frame, env, *target, *value),
            ExprKind::Member { object, name } => {
                let object = self.eval(frame, env, *object)?;
                self.get_member(&object, &PropertyKey::from(name.as_str()))
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(frame, env, *object)?;
                let key = self.eval(frame, env, *index)?.to_property_key();
                self.get_member(&object, &key)
            }
            ExprKind::Call { callee, args } => self.eval_call(frame, env, *callee, args),
            ExprKind::New { callee, args } => {
                let callee = self.eval(frame, env, *callee)?;
                let args = self.eval_args(frame, env, args)?;
                match callee {
                    Value::Class(class) => self.construct(&class, args),
                    other => Err(RuntimeError::type_error(format!(
                        "{} is not a constructor",
                        other.describe()
                    ))),
                }
            }
            ExprKind::PrivateMember { accessor, key } => {
                Ok(self.private_get(frame, env, id, accessor, key)?.0)
            }
            ExprKind::PrivateHas { key, accessor } => {
                let key = self.eval(frame, env, *key)?.to_property_key();
                self.private_has(frame, env, id, accessor, &key)
            }
            ExprKind::SuperCall { args } => {
                let args = self.eval_args(frame, env, args)?;
                self.super_call(frame, args)?;
                Ok(Value::Undefined)
            }
            ExprKind::SuperMember { name } => {
                let parent = frame
                    .home
                    .as_ref()
                    .and_then(|home| home.parent.as_ref())
                    .ok_or_else(|| RuntimeError::type_error("`super` used outside of a derived class"))?;
                Ok(parent
                    .prototype
                    .get(&PropertyKey::from(name.as_str()))
                    .unwrap_or_default())
            }
        }
    }

    fn eval_args(&mut self, frame: &Frame, env: &Arc<Scope>, args: &[ExprId]) -> Result<Vec<Value>, RuntimeError> {
        args.iter().map(|arg| self.eval(frame, env, *arg)).collect()
    }

    fn eval_unary(
        &mut self,
        frame: &Frame,
        env: &Arc<Scope>,
        op: UnaryOp,
        operand: ExprId,
    ) -> Result<Value, RuntimeError> {
        let node = frame.unit.program.arena.get(operand);
        match op {
            UnaryOp::Delete => match &node.kind {
                ExprKind::Member { object, name } => {
                    let object = self.eval(frame, env, *object)?;
                    delete_member(&object, &PropertyKey::from(name.as_str()))
                }
                ExprKind::Index { object, index } => {
                    let object = self.eval(frame, env, *object)?;
                    let key = self.eval(frame, env, *index)?.to_property_key();
                    delete_member(&object, &key)
                }
                ExprKind::PrivateMember { accessor, key } => {
                    self.private_delete(frame, env, operand, accessor, key)
                }
                _ => Err(RuntimeError::type_error("`delete` needs a member expression")),
            },
            UnaryOp::Typeof => {
                // `typeof undeclared` is "undefined", not a ReferenceError.
                if let ExprKind::Ident(name) = &node.kind {
                    if env.lookup(name).is_none() {
                        return Ok(Value::string("undefined"));
                    }
                }
                let value = self.eval(frame, env, operand)?;
                Ok(Value::string(value.type_name()))
            }
            UnaryOp::Not => Ok(Value::Bool(!self.eval(frame, env, operand)?.is_truthy())),
            UnaryOp::Negate => match self.eval(frame, env, operand)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(RuntimeError::type_error(format!(
                    "cannot negate {}",
                    other.describe()
                ))),
            },
        }
    }

    fn eval_assign(
        &mut self,
        frame: &Frame,
        env: &Arc<Scope>,
        target: ExprId,
        value: ExprId,
    ) -> Result<Value, RuntimeError> {
        match &frame.unit.program.arena.get(target).kind {
            ExprKind::Ident(name) => {
                let value = self.eval(frame, env, value)?;
                env.assign(name, value.clone())?;
                Ok(value)
            }
            ExprKind::Member { object, name } => {
                let object = self.eval(frame, env, *object)?;
                let value = self.eval(frame, env, value)?;
                set_member(&object, PropertyKey::from(name.as_str()), value.clone())?;
                Ok(value)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(frame, env, *object)?;
                let key = self.eval(frame, env, *index)?.to_property_key();
                let value = self.eval(frame, env, value)?;
                set_member(&object, key, value.clone())?;
                Ok(value)
            }
            ExprKind::PrivateMember { accessor, key } => {
                self.private_set(frame, env, target, accessor, key, value)
            }
            _ => Err(RuntimeError::type_error("invalid assignment target")),
        }
    }

    fn eval_call(
        &mut self,
        frame: &Frame,
        env: &Arc<Scope>,
        callee: ExprId,
        args: &[ExprId],
    ) -> Result<Value, RuntimeError> {
        let (function, this) = match &frame.unit.program.arena.get(callee).kind {
            ExprKind::Member { object, name } => {
                let object = self.eval(frame, env, *object)?;
                let function = self.get_member(&object, &PropertyKey::from(name.as_str()))?;
                (function, object)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(frame, env, *object)?;
                let key = self.eval(frame, env, *index)?.to_property_key();
                let function = self.get_member(&object, &key)?;
                (function, object)
            }
            ExprKind::PrivateMember { accessor, key } => {
                self.private_get(frame, env, callee, accessor, key)?
            }
            ExprKind::SuperMember { .. } => (self.eval(frame, env, callee)?, frame.this.clone()),
            _ => (self.eval(frame, env, callee)?, Value::Undefined),
        };
        let args = self.eval_args(frame, env, args)?;
        self.call_value(&function, this, args)
    }

    // ───────────────────────────────────────────────────────────
    //  Calls
    // ───────────────────────────────────────────────────────────

    pub fn call_value(&mut self, function: &Value, this: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match function {
            Value::Function(function) => self.call_function(function, this, args),
            Value::Class(class) => Err(RuntimeError::type_error(format!(
                "class {} cannot be invoked without `new`",
                class.name
            ))),
            other => Err(RuntimeError::type_error(format!(
                "{} is not a function",
                other.describe()
            ))),
        }
    }

    pub fn call_function(&mut self, function: &FunctionRef, this: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.invoke(function, this, args, None)
    }

    pub(crate) fn invoke(
        &mut self,
        function: &FunctionRef,
        this: Value,
        args: Vec<Value>,
        construction: Option<&Construction>,
    ) -> Result<Value, RuntimeError> {
        if self.depth >= self.settings.max_call_depth {
            return Err(RuntimeError::StackOverflow);
        }
        self.depth += 1;
        let result = match &function.callable {
            Callable::Native(native) => native(self, this, args),
            Callable::Script(script) => self.call_script(script, this, args, construction),
        };
        self.depth -= 1;
        result
    }

    fn call_script(
        &mut self,
        script: &ScriptFunction,
        this: Value,
        args: Vec<Value>,
        construction: Option<&Construction>,
    ) -> Result<Value, RuntimeError> {
        let node = script.unit.program.arena.function(script.func);
        let env = Scope::child(&script.env);
        let mut args = args.into_iter();
        for param in &node.params {
            env.declare(param, args.next().unwrap_or_default(), true);
        }
        let frame = Frame {
            unit: Arc::clone(&script.unit),
            this,
            home: script.home.clone(),
            construction,
        };
        match self.exec_block(&frame, &env, &node.body)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Undefined),
        }
    }

    /// A function value closing over `env`. Functions written inside a
    /// class body inherit that class as their home.
    fn make_function(&mut self, frame: &Frame, env: &Arc<Scope>, func: FuncId) -> FunctionRef {
        script_function(&frame.unit, func, env, frame.home.clone())
    }

    // ───────────────────────────────────────────────────────────
    //  Properties
    // ───────────────────────────────────────────────────────────

    pub(crate) fn get_member(&self, object: &Value, key: &PropertyKey) -> Result<Value, RuntimeError> {
        let name = match key {
            PropertyKey::String(s) => Some(s.as_ref()),
            PropertyKey::Symbol(_) => None,
        };
        Ok(match object {
            Value::Object(object) => object.get(key).unwrap_or_default(),
            Value::Function(function) => match name {
                Some("name") => Value::string(&function.name),
                Some("call") => Value::Function(Arc::clone(&self.call_fn)),
                _ => Value::Undefined,
            },
            Value::Class(class) => match name {
                Some("name") => Value::string(&class.name),
                Some("prototype") => Value::Object(Arc::clone(&class.prototype)),
                _ => Value::Undefined,
            },
            Value::String(s) => match name {
                Some("length") => Value::Number(s.chars().count() as f64),
                _ => Value::Undefined,
            },
            Value::Undefined | Value::Null => {
                return Err(RuntimeError::type_error(format!(
                    "cannot read property `{}` of {}",
                    key, object
                )));
            }
            _ => Value::Undefined,
        })
    }

    // ───────────────────────────────────────────────────────────
    //  Classes
    // ───────────────────────────────────────────────────────────

    /// Evaluate a class definition: mint its token, build the prototype
    /// and static table, and run static initializers.
    fn define_class(&mut self, frame: &Frame, env: &Arc<Scope>, id: ClassId) -> Result<ClassRef, RuntimeError> {
        let unit = Arc::clone(&frame.unit);
        let node = unit.program.arena.class(id);

        let parent = match node.superclass {
            Some(superclass) => match self.eval(frame, env, superclass)? {
                Value::Class(parent) => Some(parent),
                other => {
                    return Err(RuntimeError::type_error(format!(
                        "class {} cannot extend {}",
                        node.display_name(),
                        other.describe()
                    )));
                }
            },
            None => None,
        };

        let token = DefinitionToken::new(id, node.display_name());
        let scope = Scope::child(env);
        let prototype = Object::new(parent.as_ref().map(|p| Arc::clone(&p.prototype)));

        let class = Arc::new_cyclic(|weak: &Weak<Class>| {
            let home = Home {
                token: Arc::clone(&token),
                class: weak.clone(),
                parent: parent.clone(),
            };
            let method = |func: FuncId| script_function(&unit, func, &scope, Some(home.clone()));

            let mut private_methods = Vec::new();
            let mut fields = Vec::new();
            for member in &node.members {
                let key = PropertyKey::from(member.name.as_str());
                match &member.kind {
                    MemberKind::Method(func) => prototype.set(key, Value::Function(method(*func))),
                    MemberKind::PrivateMethod(func) => {
                        private_methods.push((member.name.clone(), method(*func)))
                    }
                    MemberKind::PrivateField(init) => fields.push(FieldInit {
                        name: member.name.clone(),
                        init: *init,
                    }),
                    MemberKind::StaticMethod(func) => {
                        token.static_table().set(key, Value::Function(method(*func)))
                    }
                    MemberKind::StaticField(_) => {}
                }
            }

            Class {
                name: node.display_name().to_string(),
                site: id,
                token: Arc::clone(&token),
                prototype: Arc::clone(&prototype),
                parent: parent.clone(),
                constructor: node.constructor.map(method),
                private_methods,
                fields,
                unit: Arc::clone(&unit),
                env: Arc::clone(&scope),
            }
        });

        if let Some(name) = &node.name {
            scope.declare(name, Value::Class(Arc::clone(&class)), false);
        }

        let static_frame = Frame {
            unit: Arc::clone(&unit),
            this: Value::Class(Arc::clone(&class)),
            home: Some(class.home()),
            construction: None,
        };
        for member in &node.members {
            if let MemberKind::StaticField(init) = &member.kind {
                let value = match init {
                    Some(init) => self.eval(&static_frame, &scope, *init)?,
                    None => Value::Undefined,
                };
                token
                    .static_table()
                    .set(PropertyKey::from(member.name.as_str()), value);
            }
        }

        debug!("defined class {} with {}", class.name, token.id());
        Ok(class)
    }
}

pub(crate) fn script_function(
    unit: &Arc<Unit>,
    func: FuncId,
    env: &Arc<Scope>,
    home: Option<Home>,
) -> FunctionRef {
    let name = unit.program.arena.function(func).name.clone().unwrap_or_default();
    Arc::new(Function {
        name,
        callable: Callable::Script(ScriptFunction {
            unit: Arc::clone(unit),
            func,
            env: Arc::clone(env),
            home,
        }),
    })
}

fn set_member(object: &Value, key: PropertyKey, value: Value) -> Result<(), RuntimeError> {
    match object {
        Value::Object(object) => {
            object.set(key, value);
            Ok(())
        }
        other => Err(RuntimeError::type_error(format!(
            "cannot set property `{}` on {}",
            key,
            other.describe()
        ))),
    }
}

fn delete_member(object: &Value, key: &PropertyKey) -> Result<Value, RuntimeError> {
    match object {
        Value::Object(object) => Ok(Value::Bool(object.delete(key))),
        Value::Undefined | Value::Null => Err(RuntimeError::type_error(format!(
            "cannot delete property `{}` of {}",
            key, object
        ))),
        _ => Ok(Value::Bool(true)),
    }
}

/// The value a `catch` clause binds for `err`.
fn error_value(err: RuntimeError) -> Value {
    match err {
        RuntimeError::Thrown(value) => value,
        other => {
            let object = Object::new(None);
            object.set(PropertyKey::from("name"), Value::string(other.name()));
            object.set(PropertyKey::from("message"), Value::string(&other.message()));
            Value::Object(object)
        }
    }
}

fn arithmetic(op: &str, left: &Value, right: &Value, f: fn(f64, f64) -> f64) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(f(*a, *b))),
        _ => Err(RuntimeError::type_error(format!(
            "cannot apply `{}` to {} and {}",
            op,
            left.describe(),
            right.describe()
        ))),
    }
}

fn compare(op: &str, left: &Value, right: &Value, f: fn(Ordering) -> bool) -> Result<Value, RuntimeError> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => {
            return Err(RuntimeError::type_error(format!(
                "cannot compare {} and {} with `{}`",
                left.describe(),
                right.describe(),
                op
            )));
        }
    };
    Ok(Value::Bool(ordering.is_some_and(f)))
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(left.strict_equals(&right))),
        BinaryOp::NotEq => Ok(Value::Bool(!left.strict_equals(&right))),
        BinaryOp::Add => match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Symbol(_), _) | (_, Value::Symbol(_)) => Err(RuntimeError::type_error(
                "cannot convert a symbol to a string",
            )),
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::string(&format!("{}{}", left, right)))
            }
            _ => arithmetic("+", &left, &right, |a, b| a + b),
        },
        BinaryOp::Sub => arithmetic("-", &left, &right, |a, b| a - b),
        BinaryOp::Mul => arithmetic("*", &left, &right, |a, b| a * b),
        BinaryOp::Div => arithmetic("/", &left, &right, |a, b| a / b),
        BinaryOp::Rem => arithmetic("%", &left, &right, |a, b| a % b),
        BinaryOp::Lt => compare("<", &left, &right, Ordering::is_lt),
        BinaryOp::LtEq => compare("<=", &left, &right, Ordering::is_le),
        BinaryOp::Gt => compare(">", &left, &right, Ordering::is_gt),
        BinaryOp::GtEq => compare(">=", &left, &right, Ordering::is_ge),
        BinaryOp::In => match &right {
            Value::Object(object) => Ok(Value::Bool(object.has(&left.to_property_key()))),
            other => Err(RuntimeError::type_error(format!(
                "cannot use `in` to search {}",
                other.describe()
            ))),
        },
    }
}
