//! Abstract syntax tree.
//!
//! Expressions, functions and classes live in an [`AstArena`] and are
//! referred to by index ([`ExprId`], [`FuncId`], [`ClassId`]).
//! Statements are plain trees whose leaves point into the arena. Index
//! identities are what the binder keys its side tables on: every accessor
//! site is an `ExprId`, every construct is a `ClassId`.
//!
//! # Private access
//!
//! All four spellings of an instance accessor
//!
//! ```text
//! private.k    private["k"]    private(this).k    private(this)["k"]
//! ```
//!
//! parse to one node shape, [`ExprKind::PrivateMember`], differing only
//! in the accessor target and the [`MemberKey`]. The evaluator
//! therefore has exactly one code path for them.
use crate::span::Span;

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

arena_id!(ExprId);
arena_id!(FuncId);
arena_id!(ClassId);

/// Storage for every expression, function and class of one program unit.
///
/// Each node's height (the longest path down to a leaf, counting nested
/// function and class bodies) is recorded when it is allocated, so the
/// parser can refuse trees too deep to walk recursively.
#[derive(Debug, Clone, Default)]
pub struct AstArena {
    exprs: Vec<ExprNode>,
    functions: Vec<FunctionNode>,
    classes: Vec<ClassNode>,
    expr_heights: Vec<u32>,
    function_heights: Vec<u32>,
    class_heights: Vec<u32>,
}

impl AstArena {
    pub fn alloc(&mut self, node: ExprNode) -> ExprId {
        let height = 1 + self.expr_children_height(&node.kind);
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(node);
        self.expr_heights.push(height);
        id
    }

    pub fn alloc_function(&mut self, node: FunctionNode) -> FuncId {
        let height = 1 + self.stmts_height(&node.body);
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(node);
        self.function_heights.push(height);
        id
    }

    pub fn alloc_class(&mut self, node: ClassNode) -> ClassId {
        let mut below = node.superclass.map_or(0, |e| self.height(e));
        if let Some(ctor) = node.constructor {
            below = below.max(self.function_height(ctor));
        }
        for member in &node.members {
            let member_height = match member.kind {
                MemberKind::Method(f) | MemberKind::PrivateMethod(f) | MemberKind::StaticMethod(f) => {
                    self.function_height(f)
                }
                MemberKind::PrivateField(init) | MemberKind::StaticField(init) => {
                    init.map_or(0, |e| self.height(e))
                }
            };
            below = below.max(member_height);
        }
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(node);
        self.class_heights.push(1 + below);
        id
    }

    pub fn height(&self, id: ExprId) -> u32 {
        self.expr_heights[id.index()]
    }

    pub fn function_height(&self, id: FuncId) -> u32 {
        self.function_heights[id.index()]
    }

    pub fn class_height(&self, id: ClassId) -> u32 {
        self.class_heights[id.index()]
    }

    /// Height of a statement. Nested statements are walked; everything
    /// else was measured at allocation.
    pub fn stmt_height(&self, stmt: &Stmt) -> u32 {
        let opt = |e: &Option<ExprId>| e.map_or(0, |e| self.height(e));
        let below = match &stmt.kind {
            StmtKind::Let { init, .. } => opt(init),
            StmtKind::Expr(e) | StmtKind::Throw(e) => self.height(*e),
            StmtKind::Return(value) => opt(value),
            StmtKind::Block(body) => self.stmts_height(body),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                let otherwise = otherwise.as_deref().map_or(0, |s| self.stmt_height(s));
                self.height(*cond).max(self.stmt_height(then)).max(otherwise)
            }
            StmtKind::While { cond, body } => self.height(*cond).max(self.stmt_height(body)),
            StmtKind::Try { body, handler, .. } => {
                self.stmts_height(body).max(self.stmts_height(handler))
            }
            StmtKind::Function(f) => self.function_height(*f),
            StmtKind::Class(c) => self.class_height(*c),
        };
        1 + below
    }

    fn stmts_height(&self, stmts: &[Stmt]) -> u32 {
        stmts.iter().map(|s| self.stmt_height(s)).max().unwrap_or(0)
    }

    fn expr_children_height(&self, kind: &ExprKind) -> u32 {
        let h = |e: &ExprId| self.height(*e);
        let many = |es: &[ExprId]| es.iter().map(h).max().unwrap_or(0);
        let key = |k: &MemberKey| match k {
            MemberKey::Named(_) => 0,
            MemberKey::Computed(e) => h(e),
        };
        let accessor = |a: &Accessor| match &a.kind {
            AccessorKind::Instance { target: Some(t) } => h(t),
            _ => 0,
        };
        match kind {
            ExprKind::Number(_)
            | ExprKind::String(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Undefined
            | ExprKind::Ident(_)
            | ExprKind::This
            | ExprKind::SuperMember { .. } => 0,
            ExprKind::Object(props) => props.iter().map(|(_, e)| h(e)).max().unwrap_or(0),
            ExprKind::Function(f) => self.function_height(*f),
            ExprKind::Class(c) => self.class_height(*c),
            ExprKind::Unary { operand, .. } => h(operand),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                h(left).max(h(right))
            }
            ExprKind::Assign { target, value } => h(target).max(h(value)),
            ExprKind::Member { object, .. } => h(object),
            ExprKind::Index { object, index } => h(object).max(h(index)),
            ExprKind::Call { callee, args } | ExprKind::New { callee, args } => {
                h(callee).max(many(args))
            }
            ExprKind::PrivateMember { accessor: a, key: k } => accessor(a).max(key(k)),
            ExprKind::PrivateHas { key: k, accessor: a } => h(k).max(accessor(a)),
            ExprKind::SuperCall { args } => many(args),
        }
    }

    pub fn get(&self, id: ExprId) -> &ExprNode {
        &self.exprs[id.index()]
    }

    pub fn function(&self, id: FuncId) -> &FunctionNode {
        &self.functions[id.index()]
    }

    pub fn class(&self, id: ClassId) -> &ClassNode {
        &self.classes[id.index()]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn expr_ids(&self) -> impl Iterator<Item = ExprId> + '_ {
        (0..self.exprs.len()).map(|i| ExprId(i as u32))
    }

    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.classes.len()).map(|i| ClassId(i as u32))
    }
}

/// A parsed program unit: the arena plus its top-level statements.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub arena: AstArena,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    This,

    /// `{ a: 1, "b": 2 }`
    Object(Vec<(String, ExprId)>),
    /// A function expression.
    Function(FuncId),
    /// A class expression.
    Class(ClassId),

    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    /// Short-circuiting `&&` / `||`.
    Logical {
        op: LogicalOp,
        left: ExprId,
        right: ExprId,
    },
    Assign {
        target: ExprId,
        value: ExprId,
    },

    /// `object.name`
    Member {
        object: ExprId,
        name: String,
    },
    /// `object[index]`
    Index {
        object: ExprId,
        index: ExprId,
    },
    Call {
        callee: ExprId,
        args: Vec<ExprId>,
    },
    New {
        callee: ExprId,
        args: Vec<ExprId>,
    },

    /// `private.k`, `private[e]`, `private(x).k`, `private(x)[e]`,
    /// `static.k`, `static[e]`.
    PrivateMember {
        accessor: Accessor,
        key: MemberKey,
    },
    /// `key in private`, `key in private(x)`, `key in static`.
    PrivateHas {
        key: ExprId,
        accessor: Accessor,
    },

    /// `super(args)` inside a derived constructor.
    SuperCall {
        args: Vec<ExprId>,
    },
    /// `super.name`, resolved against the parent class' prototype.
    SuperMember {
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Typeof,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// Ordinary `key in object` over public properties.
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// The `private`/`static` prefix of an accessor expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    pub kind: AccessorKind,
    /// Span of the `private`/`static` keyword (plus the call form, if any).
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccessorKind {
    /// `private` (target `None`: the current receiver) or `private(x)`.
    Instance { target: Option<ExprId> },
    /// `static`: the construct's class-level table.
    Static,
}

impl Accessor {
    pub fn keyword(&self) -> &'static str {
        match self.kind {
            AccessorKind::Instance { .. } => "private",
            AccessorKind::Static => "static",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberKey {
    /// `.name`
    Named(String),
    /// `[expr]`
    Computed(ExprId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let {
        name: String,
        mutable: bool,
        init: Option<ExprId>,
    },
    Expr(ExprId),
    Block(Vec<Stmt>),
    If {
        cond: ExprId,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: ExprId,
        body: Box<Stmt>,
    },
    Return(Option<ExprId>),
    Throw(ExprId),
    Try {
        body: Vec<Stmt>,
        param: String,
        handler: Vec<Stmt>,
    },
    /// `function name(...) { ... }`
    Function(FuncId),
    /// `class Name { ... }`
    Class(ClassId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Plain,
    Method,
    Constructor,
    PrivateMethod,
    StaticMethod,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionNode {
    pub name: Option<String>,
    pub kind: FunctionKind,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassNode {
    pub name: Option<String>,
    pub superclass: Option<ExprId>,
    pub constructor: Option<FuncId>,
    pub members: Vec<ClassMember>,
    pub span: Span,
}

impl ClassNode {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMember {
    pub name: String,
    pub kind: MemberKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    /// Public method installed on the prototype.
    Method(FuncId),
    /// `private name = init;`
    PrivateField(Option<ExprId>),
    /// `private name(...) { ... }`
    PrivateMethod(FuncId),
    /// `static name = init;`
    StaticField(Option<ExprId>),
    /// `static name(...) { ... }`
    StaticMethod(FuncId),
}

impl MemberKind {
    pub fn is_private(&self) -> bool {
        matches!(self, Self::PrivateField(_) | Self::PrivateMethod(_))
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Self::StaticField(_) | Self::StaticMethod(_))
    }
}
