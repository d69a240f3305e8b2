//! Scope binding for `private` / `static` accessors.
//!
//! Runs over a whole [`Program`] before anything executes. Every accessor
//! expression is bound to the innermost class body that lexically encloses
//! it; the evaluator later resolves that class' definition token through
//! the function it is running in. A class' `extends` clause belongs to the
//! *outer* scope, so `class B extends private.base {}` inside class `A`
//! binds to `A`.
//!
//! Accessors with no enclosing class, and `super` outside a method of a
//! class that has an `extends` clause, are [`ScopeError`]s. One error is
//! enough to reject the unit.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::ast::{
    AccessorKind, AstArena, ClassId, ExprId, ExprKind, FuncId, FunctionKind,
    MemberKey, MemberKind, Program, Stmt, StmtKind,
};
use crate::span::Span;

/// The construct an accessor is bound to. Constructs are class bodies.
pub type ConstructId = ClassId;

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for ScopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.span, self.message)
    }
}

impl std::error::Error for ScopeError {}

/// Per-construct facts gathered while binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstructInfo {
    pub name: String,
    pub span: Span,
    /// Declared `private` members. Informational: any key may be used.
    pub private_names: BTreeSet<String>,
    /// Declared `static` members.
    pub static_names: BTreeSet<String>,
    /// Number of accessor expressions bound to this construct.
    pub access_sites: usize,
}

/// Result of [`bind`]: accessor expression → construct.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    sites: HashMap<ExprId, ConstructId>,
    constructs: BTreeMap<ConstructId, ConstructInfo>,
}

impl Bindings {
    /// The construct `expr` (a `PrivateMember` or `PrivateHas`) is bound to.
    pub fn construct_of(&self, expr: ExprId) -> Option<ConstructId> {
        self.sites.get(&expr).copied()
    }

    pub fn construct(&self, id: ConstructId) -> Option<&ConstructInfo> {
        self.constructs.get(&id)
    }

    /// Every class in the unit, in definition order.
    pub fn constructs(&self) -> impl Iterator<Item = (ConstructId, &ConstructInfo)> {
        self.constructs.iter().map(|(id, info)| (*id, info))
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }
}

/// What `super` may refer to in the current function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SuperContext {
    None,
    /// A method of a derived class: `super.name` is allowed.
    Member,
    /// A derived constructor: `super(...)` and `super.name`.
    Constructor,
}

struct Binder<'a> {
    arena: &'a AstArena,
    classes: Vec<ConstructId>,
    super_ctx: SuperContext,
    bindings: Bindings,
    errors: Vec<ScopeError>,
}

/// Bind every accessor in `program`, or report every unbound one.
pub fn bind(program: &Program) -> Result<Bindings, Vec<ScopeError>> {
    let mut binder = Binder {
        arena: &program.arena,
        classes: Vec::new(),
        super_ctx: SuperContext::None,
        bindings: Bindings::default(),
        errors: Vec::new(),
    };
    binder.stmts(&program.body);
    if binder.errors.is_empty() {
        Ok(binder.bindings)
    } else {
        Err(binder.errors)
    }
}

impl Binder<'_> {
    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(ScopeError {
            message: message.into(),
            span,
        });
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let { init, .. } => {
                if let Some(init) = init {
                    self.expr(*init);
                }
            }
            StmtKind::Expr(e) | StmtKind::Throw(e) => self.expr(*e),
            StmtKind::Block(body) => self.stmts(body),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(*cond);
                self.stmt(then);
                if let Some(otherwise) = otherwise {
                    self.stmt(otherwise);
                }
            }
            StmtKind::While { cond, body } => {
                self.expr(*cond);
                self.stmt(body);
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.expr(*value);
                }
            }
            StmtKind::Try { body, handler, .. } => {
                self.stmts(body);
                self.stmts(handler);
            }
            StmtKind::Function(func) => self.function(*func, SuperContext::None),
            StmtKind::Class(class) => self.class(*class),
        }
    }

    fn function(&mut self, func: FuncId, super_ctx: SuperContext) {
        let arena = self.arena;
        let saved = std::mem::replace(&mut self.super_ctx, super_ctx);
        self.stmts(&arena.function(func).body);
        self.super_ctx = saved;
    }

    /// Run `f` with `super` unavailable (initializers, nested plain
    /// functions).
    fn without_super(&mut self, f: impl FnOnce(&mut Self)) {
        let saved = std::mem::replace(&mut self.super_ctx, SuperContext::None);
        f(self);
        self.super_ctx = saved;
    }

    fn class(&mut self, id: ClassId) {
        let arena = self.arena;
        let class = arena.class(id);
        let derived = class.superclass.is_some();

        if let Some(superclass) = class.superclass {
            self.expr(superclass);
        }

        let mut info = ConstructInfo {
            name: class.display_name().to_string(),
            span: class.span,
            ..ConstructInfo::default()
        };
        for member in &class.members {
            if member.kind.is_private() {
                info.private_names.insert(member.name.clone());
            } else if member.kind.is_static() {
                info.static_names.insert(member.name.clone());
            }
        }
        self.bindings.constructs.insert(id, info);

        self.classes.push(id);
        let (member_ctx, ctor_ctx) = if derived {
            (SuperContext::Member, SuperContext::Constructor)
        } else {
            (SuperContext::None, SuperContext::None)
        };
        if let Some(ctor) = class.constructor {
            self.function(ctor, ctor_ctx);
        }
        for member in &class.members {
            match &member.kind {
                MemberKind::Method(f) | MemberKind::PrivateMethod(f) => {
                    self.function(*f, member_ctx)
                }
                MemberKind::StaticMethod(f) => self.function(*f, SuperContext::None),
                MemberKind::PrivateField(init) | MemberKind::StaticField(init) => {
                    if let Some(init) = init {
                        let init = *init;
                        self.without_super(|b| b.expr(init));
                    }
                }
            }
        }
        self.classes.pop();
    }

    fn bind_site(&mut self, expr: ExprId, keyword: &str, span: Span) {
        match self.classes.last().copied() {
            Some(class) => {
                self.bindings.sites.insert(expr, class);
                if let Some(info) = self.bindings.constructs.get_mut(&class) {
                    info.access_sites += 1;
                }
            }
            None => self.error(
                format!("`{}` used outside of any class body", keyword),
                span,
            ),
        }
    }

    fn expr(&mut self, id: ExprId) {
        let arena = self.arena;
        let node = arena.get(id);
        match &node.kind {
            ExprKind::Number(_)
            | ExprKind::String(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Undefined
            | ExprKind::Ident(_)
            | ExprKind::This => {}
            ExprKind::Object(props) => {
                for (_, value) in props {
                    self.expr(*value);
                }
            }
            ExprKind::Function(func) => {
                let func = *func;
                debug_assert_eq!(arena.function(func).kind, FunctionKind::Plain);
                self.function(func, SuperContext::None);
            }
            ExprKind::Class(class) => self.class(*class),
            ExprKind::Unary { operand, .. } => self.expr(*operand),
            ExprKind::Binary { left, right, .. }
            | ExprKind::Logical { left, right, .. } => {
                self.expr(*left);
                self.expr(*right);
            }
            ExprKind::Assign { target, value } => {
                self.expr(*target);
                self.expr(*value);
            }
            ExprKind::Member { object, .. } => self.expr(*object),
            ExprKind::Index { object, index } => {
                self.expr(*object);
                self.expr(*index);
            }
            ExprKind::Call { callee, args } | ExprKind::New { callee, args } => {
                self.expr(*callee);
                for arg in args {
                    self.expr(*arg);
                }
            }
            ExprKind::PrivateMember { accessor, key } => {
                self.bind_site(id, accessor.keyword(), accessor.span);
                if let AccessorKind::Instance { target: Some(target) } = accessor.kind {
                    self.expr(target);
                }
                if let MemberKey::Computed(key) = key {
                    self.expr(*key);
                }
            }
            ExprKind::PrivateHas { key, accessor } => {
                self.expr(*key);
                self.bind_site(id, accessor.keyword(), accessor.span);
                if let AccessorKind::Instance { target: Some(target) } = accessor.kind {
                    self.expr(target);
                }
            }
            ExprKind::SuperCall { args } => {
                if self.super_ctx != SuperContext::Constructor {
                    self.error(
                        "`super(...)` is only valid in the constructor of a class with `extends`",
                        node.span,
                    );
                }
                for arg in args {
                    self.expr(*arg);
                }
            }
            ExprKind::SuperMember { .. } => {
                if self.super_ctx == SuperContext::None {
                    self.error(
                        "`super` is only valid in methods of a class with `extends`",
                        node.span,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_program;

    fn bind_src(src: &str) -> (Program, Result<Bindings, Vec<ScopeError>>) {
        let program = parse_program(src).unwrap_or_else(|e| panic!("{:?}", e));
        let result = bind(&program);
        (program, result)
    }

    fn accessor_sites(program: &Program) -> Vec<ExprId> {
        program
            .arena
            .expr_ids()
            .filter(|id| {
                matches!(
                    program.arena.get(*id).kind,
                    ExprKind::PrivateMember { .. } | ExprKind::PrivateHas { .. }
                )
            })
            .collect()
    }

    #[test]
    fn binds_to_enclosing_class() {
        let (program, result) = bind_src(
            "class A { private x = 1; get() { return private.x + private(this)[\"x\"]; } }",
        );
        let bindings = result.expect("binds");
        let class = program.arena.class_ids().next().expect("one class");
        let sites = accessor_sites(&program);
        assert_eq!(sites.len(), 2);
        for site in sites {
            assert_eq!(bindings.construct_of(site), Some(class));
        }
        let info = bindings.construct(class).expect("info");
        assert_eq!(info.name, "A");
        assert_eq!(info.access_sites, 2);
        assert!(info.private_names.contains("x"));
    }

    #[test]
    fn nested_class_binds_to_itself() {
        let src = r#"
            class Outer {
                private tag = "outer";
                make() {
                    return class Inner {
                        private tag = "inner";
                        read() { return private.tag; }
                    };
                }
                read() { return private.tag; }
            }
        "#;
        let (program, result) = bind_src(src);
        let bindings = result.expect("binds");
        let ids: Vec<_> = program.arena.class_ids().collect();
        let outer = ids
            .iter()
            .copied()
            .find(|id| program.arena.class(*id).name.as_deref() == Some("Outer"))
            .expect("outer");
        let inner = ids
            .iter()
            .copied()
            .find(|id| program.arena.class(*id).name.as_deref() == Some("Inner"))
            .expect("inner");
        assert_eq!(bindings.construct(outer).map(|i| i.access_sites), Some(1));
        assert_eq!(bindings.construct(inner).map(|i| i.access_sites), Some(1));
    }

    #[test]
    fn extends_clause_binds_in_outer_scope() {
        let src = r#"
            class Outer {
                private base = class {};
                make() { return class extends private.base { go() { return 1; } }; }
            }
        "#;
        let (program, result) = bind_src(src);
        let bindings = result.expect("binds");
        let site = accessor_sites(&program)[0];
        let bound = bindings.construct_of(site).expect("bound");
        assert_eq!(program.arena.class(bound).name.as_deref(), Some("Outer"));
    }

    #[test]
    fn accessor_outside_class_is_scope_error() {
        let (_, result) = bind_src("let a = 1;\nfunction f(x) { return private(x).secret; }");
        let errors = result.expect_err("must be rejected");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span.start.line, 2);
        assert!(errors[0].message.contains("`private`"));
    }

    #[test]
    fn static_and_has_outside_class_are_errors() {
        let (_, result) = bind_src("static.count = 1; \"k\" in private;");
        let errors = result.expect_err("must be rejected");
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("`static`"));
    }

    #[test]
    fn nested_function_inherits_class() {
        let src = "class A { run() { let f = function() { return private.x; }; return f; } }";
        let (_, result) = bind_src(src);
        assert_eq!(result.expect("binds").site_count(), 1);
    }

    #[test]
    fn super_requires_derived_class() {
        let (_, result) = bind_src("class A { constructor() { super(); } }");
        assert!(result.is_err());
        let (_, result) = bind_src("function f() { return super.x; }");
        assert!(result.is_err());
        let (_, result) = bind_src(
            "class B extends A { constructor() { super(); } m() { return super.m(); } }",
        );
        assert!(result.is_ok());
        let (_, result) = bind_src("class B extends A { m() { super(); } }");
        assert!(result.is_err());
    }

    #[test]
    fn declared_names_are_recorded() {
        let src = "class C { private a; private b() {} static c = 0; static d() {} m() {} }";
        let (program, result) = bind_src(src);
        let bindings = result.expect("binds");
        let class = program.arena.class_ids().next().expect("class");
        let info = bindings.construct(class).expect("info");
        assert_eq!(
            info.private_names.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(
            info.static_names.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["c", "d"]
        );
        assert_eq!(info.access_sites, 0);
    }
}
