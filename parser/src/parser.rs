use crate::ast::{
    Accessor, AccessorKind, AstArena, BinaryOp, ClassId, ClassMember,
    ClassNode, ExprId, ExprKind, ExprNode, FuncId, FunctionKind,
    FunctionNode, LogicalOp, MemberKey, MemberKind, Program, Stmt, StmtKind,
    UnaryOp,
};
use crate::span::{Pos, Span};
use crate::token::{Keyword, Operator, Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.span, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Binary operator precedence, loosest first.
fn binary_precedence(kind: &TokenKind) -> Option<u8> {
    match kind {
        TokenKind::Operator(Operator::Or) => Some(1),
        TokenKind::Operator(Operator::And) => Some(2),
        TokenKind::Operator(Operator::Eq | Operator::NotEq) => Some(3),
        TokenKind::Operator(
            Operator::Lt | Operator::LtEq | Operator::Gt | Operator::GtEq,
        ) => Some(4),
        TokenKind::Keyword(Keyword::In) => Some(4),
        TokenKind::Operator(Operator::Plus | Operator::Minus) => Some(5),
        TokenKind::Operator(
            Operator::Star | Operator::Slash | Operator::Percent,
        ) => Some(6),
        _ => None,
    }
}

/// Deepest tree the parser hands out, measured both as parser recursion
/// and as node height. The binder and the interpreter walk trees
/// recursively, so anything deeper is rejected here.
pub const MAX_NESTING: u32 = 128;

/// What an accessor prefix turned out to be once its suffix was seen.
enum AccessorParse {
    /// `private.k` / `private(x)[e]` / …
    Member(ExprId),
    /// A bare `private` / `private(x)` / `static`, only legal after `in`.
    Bare(Accessor),
}

/// Recursive-descent parser over a token stream.
///
/// Yields one top-level [`Stmt`] per iteration, like the lexer yields one
/// token. Comments are dropped. Use [`crate::parse_program`] to parse a
/// whole unit with error recovery.
pub struct Parser<I: Iterator<Item = Token>> {
    tokens: std::iter::Peekable<I>,
    arena: AstArena,
    last_span: Span,
    at_eof: bool,
    depth: u32,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new(tokens: I) -> Self {
        Self {
            tokens: tokens.peekable(),
            arena: AstArena::default(),
            last_span: Span::point(Pos::origin()),
            at_eof: false,
            depth: 0,
        }
    }

    pub fn arena(&self) -> &AstArena {
        &self.arena
    }

    pub fn into_arena(self) -> AstArena {
        self.arena
    }

    pub fn into_program(self, body: Vec<Stmt>) -> Program {
        Program {
            arena: self.arena,
            body,
        }
    }

    fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> Result<ExprId, ParseError> {
        let id = self.arena.alloc(ExprNode { kind, span });
        if self.arena.height(id) > MAX_NESTING {
            return Err(too_deep(span));
        }
        Ok(id)
    }

    /// Run `f` one recursion level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(too_deep(self.peek_span()));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn span_of(&self, id: ExprId) -> Span {
        self.arena.get(id).span
    }

    // ───────────────────────────────────────────────────────────
    //  Token plumbing
    // ───────────────────────────────────────────────────────────

    fn skip_comments(&mut self) {
        while self.tokens.peek().is_some_and(|t| t.is_comment()) {
            self.tokens.next();
        }
    }

    fn peek_kind(&mut self) -> &TokenKind {
        self.skip_comments();
        match self.tokens.peek() {
            Some(tok) => &tok.kind,
            None => &TokenKind::Eof,
        }
    }

    fn peek_span(&mut self) -> Span {
        self.skip_comments();
        match self.tokens.peek() {
            Some(tok) => tok.span,
            None => self.last_span,
        }
    }

    fn advance(&mut self) -> Token {
        self.skip_comments();
        match self.tokens.next() {
            Some(tok) => {
                self.last_span = tok.span;
                if tok.is_eof() {
                    self.at_eof = true;
                }
                tok
            }
            None => {
                self.at_eof = true;
                Token::new(TokenKind::Eof, self.last_span, "")
            }
        }
    }

    fn check(&mut self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    fn check_keyword(&mut self, kw: Keyword) -> bool {
        self.peek_kind().is_keyword(kw)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&mut self, expected: &str) -> ParseError {
        let tok = self.advance();
        let found = match &tok.kind {
            TokenKind::Error(msg) => return ParseError::new(msg.clone(), tok.span),
            other => other.name(),
        };
        ParseError::new(format!("expected {}, found {}", expected, found), tok.span)
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<Token, ParseError> {
        if self.check(expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&expected.name()))
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<Token, ParseError> {
        if self.check_keyword(kw) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("`{}`", kw.as_str())))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        if let TokenKind::Identifier(_) = self.peek_kind() {
            let tok = self.advance();
            if let TokenKind::Identifier(name) = tok.kind {
                return Ok((name, tok.span));
            }
        }
        Err(self.unexpected("identifier"))
    }

    /// A property name after `.` or in a declaration: identifiers and
    /// reserved words are both allowed (`obj.new`, `private.class`).
    fn expect_property_name(&mut self) -> Result<(String, Span), ParseError> {
        match self.peek_kind() {
            TokenKind::Identifier(_) | TokenKind::Keyword(_) => {
                let tok = self.advance();
                Ok((tok.lexeme, tok.span))
            }
            _ => Err(self.unexpected("property name")),
        }
    }

    /// `;` ends a statement; it may be omitted before `}` or end of input.
    fn end_statement(&mut self) -> Result<(), ParseError> {
        if self.eat(&TokenKind::Semicolon) {
            return Ok(());
        }
        match self.peek_kind() {
            TokenKind::RBrace | TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected("`;`")),
        }
    }

    /// Skip ahead to a plausible statement boundary after an error.
    pub fn synchronize(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::Keyword(
                    Keyword::Class
                    | Keyword::Function
                    | Keyword::Let
                    | Keyword::Const,
                ) => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ───────────────────────────────────────────────────────────
    //  Statements
    // ───────────────────────────────────────────────────────────

    pub fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let stmt = self.nested(Self::parse_statement_inner)?;
        if self.arena.stmt_height(&stmt) > MAX_NESTING {
            return Err(too_deep(stmt.span));
        }
        Ok(stmt)
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_span();
        let kind = match self.peek_kind().clone() {
            TokenKind::Keyword(Keyword::Let) => self.parse_let(true)?,
            TokenKind::Keyword(Keyword::Const) => self.parse_let(false)?,
            TokenKind::Keyword(Keyword::Function) => {
                let func = self.parse_function(FunctionKind::Plain, true)?;
                StmtKind::Function(func)
            }
            TokenKind::Keyword(Keyword::Class) => {
                let class = self.parse_class(true)?;
                StmtKind::Class(class)
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if()?,
            TokenKind::Keyword(Keyword::While) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let cond = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                let body = Box::new(self.parse_statement()?);
                StmtKind::While { cond, body }
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                let value = match self.peek_kind() {
                    TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof => {
                        None
                    }
                    _ => Some(self.parse_expression()?),
                };
                self.end_statement()?;
                StmtKind::Return(value)
            }
            TokenKind::Keyword(Keyword::Throw) => {
                self.advance();
                let value = self.parse_expression()?;
                self.end_statement()?;
                StmtKind::Throw(value)
            }
            TokenKind::Keyword(Keyword::Try) => {
                self.advance();
                let body = self.parse_block()?;
                self.expect_keyword(Keyword::Catch)?;
                self.expect(&TokenKind::LParen)?;
                let (param, _) = self.expect_ident()?;
                self.expect(&TokenKind::RParen)?;
                let handler = self.parse_block()?;
                StmtKind::Try {
                    body,
                    param,
                    handler,
                }
            }
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::Semicolon => {
                self.advance();
                StmtKind::Block(Vec::new())
            }
            _ => {
                let expr = self.parse_expression()?;
                self.end_statement()?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt {
            kind,
            span: start.merge(self.last_span),
        })
    }

    fn parse_let(&mut self, mutable: bool) -> Result<StmtKind, ParseError> {
        self.advance();
        let (name, name_span) = self.expect_ident()?;
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else if !mutable {
            return Err(ParseError::new(
                format!("`const {}` needs an initializer", name),
                name_span,
            ));
        } else {
            None
        };
        self.end_statement()?;
        Ok(StmtKind::Let {
            name,
            mutable,
            init,
        })
    }

    fn parse_if(&mut self) -> Result<StmtKind, ParseError> {
        self.advance();
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        let then = Box::new(self.parse_statement()?);
        let otherwise = if self.check_keyword(Keyword::Else) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(StmtKind::If {
            cond,
            then,
            otherwise,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.unexpected("`}`"));
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_params(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let (name, span) = self.expect_ident()?;
            if params.contains(&name) {
                return Err(ParseError::new(
                    format!("duplicate parameter `{}`", name),
                    span,
                ));
            }
            params.push(name);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    /// `function [name](params) { body }`. `name_required` is set for
    /// declarations.
    fn parse_function(
        &mut self,
        kind: FunctionKind,
        name_required: bool,
    ) -> Result<FuncId, ParseError> {
        let start = self.expect_keyword(Keyword::Function)?.span;
        let name = match self.peek_kind() {
            TokenKind::Identifier(_) => Some(self.expect_ident()?.0),
            _ if name_required => return Err(self.unexpected("function name")),
            _ => None,
        };
        self.parse_function_rest(name, kind, start)
    }

    /// Parameter list and body, shared by functions and class members.
    fn parse_function_rest(
        &mut self,
        name: Option<String>,
        kind: FunctionKind,
        start: Span,
    ) -> Result<FuncId, ParseError> {
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        let span = start.merge(self.last_span);
        let func = self.arena.alloc_function(FunctionNode {
            name,
            kind,
            params,
            body,
            span,
        });
        if self.arena.function_height(func) > MAX_NESTING {
            return Err(too_deep(span));
        }
        Ok(func)
    }

    // ───────────────────────────────────────────────────────────
    //  Classes
    // ───────────────────────────────────────────────────────────

    fn parse_class(&mut self, name_required: bool) -> Result<ClassId, ParseError> {
        let start = self.expect_keyword(Keyword::Class)?.span;
        let name = match self.peek_kind() {
            TokenKind::Identifier(_) => Some(self.expect_ident()?.0),
            _ if name_required => return Err(self.unexpected("class name")),
            _ => None,
        };
        let superclass = if self.check_keyword(Keyword::Extends) {
            self.advance();
            let primary = self.nested(Self::parse_primary)?;
            Some(self.parse_postfix_tail(primary)?)
        } else {
            None
        };

        self.expect(&TokenKind::LBrace)?;
        let mut constructor = None;
        let mut members = Vec::new();
        loop {
            match self.peek_kind().clone() {
                TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::Eof => return Err(self.unexpected("`}`")),
                TokenKind::Keyword(Keyword::Constructor) => {
                    let tok = self.advance();
                    if constructor.is_some() {
                        return Err(ParseError::new(
                            "a class may only have one constructor",
                            tok.span,
                        ));
                    }
                    constructor = Some(self.parse_function_rest(
                        Some("constructor".into()),
                        FunctionKind::Constructor,
                        tok.span,
                    )?);
                }
                TokenKind::Keyword(Keyword::Private) => {
                    members.push(self.parse_declared_member(true)?);
                }
                TokenKind::Keyword(Keyword::Static) => {
                    members.push(self.parse_declared_member(false)?);
                }
                TokenKind::Identifier(_) | TokenKind::Keyword(_) => {
                    let (name, span) = self.expect_property_name()?;
                    let func = self.parse_function_rest(
                        Some(name.clone()),
                        FunctionKind::Method,
                        span,
                    )?;
                    members.push(ClassMember {
                        name,
                        kind: MemberKind::Method(func),
                        span: span.merge(self.last_span),
                    });
                }
                _ => return Err(self.unexpected("class member")),
            }
        }

        let span = start.merge(self.last_span);
        let class = self.arena.alloc_class(ClassNode {
            name,
            superclass,
            constructor,
            members,
            span,
        });
        if self.arena.class_height(class) > MAX_NESTING {
            return Err(too_deep(span));
        }
        Ok(class)
    }

    /// `private name [= init];`, `private name(...) {}`, and the `static`
    /// equivalents.
    fn parse_declared_member(
        &mut self,
        private: bool,
    ) -> Result<ClassMember, ParseError> {
        let start = self.advance().span;
        let (name, _) = self.expect_property_name()?;

        let kind = if self.check(&TokenKind::LParen) {
            let fkind = if private {
                FunctionKind::PrivateMethod
            } else {
                FunctionKind::StaticMethod
            };
            let func = self.parse_function_rest(Some(name.clone()), fkind, start)?;
            if private {
                MemberKind::PrivateMethod(func)
            } else {
                MemberKind::StaticMethod(func)
            }
        } else {
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            self.end_statement()?;
            if private {
                MemberKind::PrivateField(init)
            } else {
                MemberKind::StaticField(init)
            }
        };

        Ok(ClassMember {
            name,
            kind,
            span: start.merge(self.last_span),
        })
    }

    // ───────────────────────────────────────────────────────────
    //  Expressions
    // ───────────────────────────────────────────────────────────

    pub fn parse_expression(&mut self) -> Result<ExprId, ParseError> {
        self.nested(Self::parse_assignment)
    }

    fn parse_assignment(&mut self) -> Result<ExprId, ParseError> {
        let target = self.parse_binary(1)?;
        if !self.check(&TokenKind::Assign) {
            return Ok(target);
        }
        let eq = self.advance();
        let assignable = matches!(
            self.arena.get(target).kind,
            ExprKind::Ident(_)
                | ExprKind::Member { .. }
                | ExprKind::Index { .. }
                | ExprKind::PrivateMember { .. }
        );
        if !assignable {
            return Err(ParseError::new("invalid assignment target", eq.span));
        }
        let value = self.nested(Self::parse_assignment)?;
        let span = self.span_of(target).merge(self.span_of(value));
        self.alloc_expr(ExprKind::Assign { target, value }, span)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<ExprId, ParseError> {
        let left = self.parse_unary()?;
        self.parse_binary_with_left(left, min_prec)
    }

    fn parse_binary_with_left(
        &mut self,
        mut left: ExprId,
        min_prec: u8,
    ) -> Result<ExprId, ParseError> {
        loop {
            let kind = self.peek_kind().clone();
            let prec = match binary_precedence(&kind) {
                Some(p) if p >= min_prec => p,
                _ => return Ok(left),
            };
            self.advance();

            if kind.is_keyword(Keyword::In)
                && matches!(
                    self.peek_kind(),
                    TokenKind::Keyword(Keyword::Private | Keyword::Static)
                )
            {
                match self.parse_accessor(true)? {
                    AccessorParse::Bare(accessor) => {
                        let span = self.span_of(left).merge(accessor.span);
                        left = self.alloc_expr(
                            ExprKind::PrivateHas { key: left, accessor },
                            span,
                        )?;
                        continue;
                    }
                    AccessorParse::Member(member) => {
                        let right = self.parse_postfix_tail(member)?;
                        let right = self.parse_binary_with_left(right, prec + 1)?;
                        left = self.make_binary(&kind, left, right)?;
                        continue;
                    }
                }
            }

            let right = self.parse_unary()?;
            let right = self.parse_binary_with_left(right, prec + 1)?;
            left = self.make_binary(&kind, left, right)?;
        }
    }

    fn make_binary(
        &mut self,
        kind: &TokenKind,
        left: ExprId,
        right: ExprId,
    ) -> Result<ExprId, ParseError> {
        let span = self.span_of(left).merge(self.span_of(right));
        let expr = match kind {
            TokenKind::Operator(Operator::And) => ExprKind::Logical {
                op: LogicalOp::And,
                left,
                right,
            },
            TokenKind::Operator(Operator::Or) => ExprKind::Logical {
                op: LogicalOp::Or,
                left,
                right,
            },
            other => {
                let op = match other {
                    TokenKind::Operator(Operator::Plus) => BinaryOp::Add,
                    TokenKind::Operator(Operator::Minus) => BinaryOp::Sub,
                    TokenKind::Operator(Operator::Star) => BinaryOp::Mul,
                    TokenKind::Operator(Operator::Slash) => BinaryOp::Div,
                    TokenKind::Operator(Operator::Percent) => BinaryOp::Rem,
                    TokenKind::Operator(Operator::Eq) => BinaryOp::Eq,
                    TokenKind::Operator(Operator::NotEq) => BinaryOp::NotEq,
                    TokenKind::Operator(Operator::Lt) => BinaryOp::Lt,
                    TokenKind::Operator(Operator::LtEq) => BinaryOp::LtEq,
                    TokenKind::Operator(Operator::Gt) => BinaryOp::Gt,
                    TokenKind::Operator(Operator::GtEq) => BinaryOp::GtEq,
                    TokenKind::Keyword(Keyword::In) => BinaryOp::In,
                    _ => unreachable!("binary_precedence admitted {:?}", other),
                };
                ExprKind::Binary { op, left, right }
            }
        };
        self.alloc_expr(expr, span)
    }

    fn parse_unary(&mut self) -> Result<ExprId, ParseError> {
        let op = match self.peek_kind() {
            TokenKind::Operator(Operator::Not) => UnaryOp::Not,
            TokenKind::Operator(Operator::Minus) => UnaryOp::Negate,
            TokenKind::Keyword(Keyword::Typeof) => UnaryOp::Typeof,
            TokenKind::Keyword(Keyword::Delete) => UnaryOp::Delete,
            _ => return self.parse_postfix(),
        };
        let start = self.advance().span;
        let operand = self.nested(Self::parse_unary)?;
        if op == UnaryOp::Delete
            && !matches!(
                self.arena.get(operand).kind,
                ExprKind::Member { .. }
                    | ExprKind::Index { .. }
                    | ExprKind::PrivateMember { .. }
            )
        {
            return Err(ParseError::new(
                "`delete` needs a member expression",
                self.span_of(operand),
            ));
        }
        let span = start.merge(self.span_of(operand));
        self.alloc_expr(ExprKind::Unary { op, operand }, span)
    }

    fn parse_postfix(&mut self) -> Result<ExprId, ParseError> {
        let primary = self.parse_primary()?;
        self.parse_postfix_tail(primary)
    }

    fn parse_postfix_tail(&mut self, mut expr: ExprId) -> Result<ExprId, ParseError> {
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let (name, name_span) = self.expect_property_name()?;
                    let span = self.span_of(expr).merge(name_span);
                    expr = self.alloc_expr(ExprKind::Member { object: expr, name }, span)?;
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    let end = self.expect(&TokenKind::RBracket)?.span;
                    let span = self.span_of(expr).merge(end);
                    expr = self.alloc_expr(ExprKind::Index { object: expr, index }, span)?;
                }
                TokenKind::LParen => {
                    let args = self.parse_args()?;
                    let span = self.span_of(expr).merge(self.last_span);
                    expr = self.alloc_expr(ExprKind::Call { callee: expr, args }, span)?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<ExprId>, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            args.push(self.parse_expression()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    /// `private`, `private(x)` or `static`, followed by `.name` or `[e]`.
    /// Without a member suffix the accessor is only accepted when
    /// `allow_bare` is set (the right operand of `in`).
    fn parse_accessor(&mut self, allow_bare: bool) -> Result<AccessorParse, ParseError> {
        let tok = self.advance();
        let mut span = tok.span;
        let kind = match tok.kind {
            TokenKind::Keyword(Keyword::Private) => {
                let target = if self.eat(&TokenKind::LParen) {
                    let target = self.parse_expression()?;
                    span = span.merge(self.expect(&TokenKind::RParen)?.span);
                    Some(target)
                } else {
                    None
                };
                AccessorKind::Instance { target }
            }
            TokenKind::Keyword(Keyword::Static) => AccessorKind::Static,
            _ => unreachable!("parse_accessor called on {:?}", tok.kind),
        };
        let accessor = Accessor { kind, span };

        let key = match self.peek_kind() {
            TokenKind::Dot => {
                self.advance();
                let (name, name_span) = self.expect_property_name()?;
                span = span.merge(name_span);
                MemberKey::Named(name)
            }
            TokenKind::LBracket => {
                self.advance();
                let key = self.parse_expression()?;
                span = span.merge(self.expect(&TokenKind::RBracket)?.span);
                MemberKey::Computed(key)
            }
            _ if allow_bare => return Ok(AccessorParse::Bare(accessor)),
            _ => {
                let keyword = accessor.keyword();
                let found = self.peek_kind().name();
                return Err(ParseError::new(
                    format!(
                        "expected `.` or `[` after `{}` accessor, found {}",
                        keyword, found
                    ),
                    self.peek_span(),
                ));
            }
        };
        Ok(AccessorParse::Member(
            self.alloc_expr(ExprKind::PrivateMember { accessor, key }, span)?,
        ))
    }

    fn parse_object_literal(&mut self) -> Result<ExprId, ParseError> {
        let start = self.expect(&TokenKind::LBrace)?.span;
        let mut props = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let name = match self.peek_kind().clone() {
                TokenKind::String(s) => {
                    self.advance();
                    s
                }
                TokenKind::Number(n) => {
                    self.advance();
                    format_number_key(n)
                }
                _ => self.expect_property_name()?.0,
            };
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_expression()?;
            props.push((name, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(&TokenKind::RBrace)?.span;
        self.alloc_expr(ExprKind::Object(props), start.merge(end))
    }

    fn parse_new(&mut self) -> Result<ExprId, ParseError> {
        let start = self.advance().span;
        let mut callee = self.nested(Self::parse_primary)?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let (name, name_span) = self.expect_property_name()?;
                    let span = self.span_of(callee).merge(name_span);
                    callee = self.alloc_expr(ExprKind::Member { object: callee, name }, span)?;
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    let end = self.expect(&TokenKind::RBracket)?.span;
                    let span = self.span_of(callee).merge(end);
                    callee = self.alloc_expr(ExprKind::Index { object: callee, index }, span)?;
                }
                _ => break,
            }
        }
        let args = if self.check(&TokenKind::LParen) {
            self.parse_args()?
        } else {
            Vec::new()
        };
        let span = start.merge(self.last_span);
        self.alloc_expr(ExprKind::New { callee, args }, span)
    }

    fn parse_primary(&mut self) -> Result<ExprId, ParseError> {
        let span = self.peek_span();
        let kind = match self.peek_kind().clone() {
            TokenKind::Number(n) => {
                self.advance();
                ExprKind::Number(n)
            }
            TokenKind::String(s) => {
                self.advance();
                ExprKind::String(s)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                ExprKind::Ident(name)
            }
            TokenKind::Keyword(kw) => match kw {
                Keyword::True | Keyword::False => {
                    self.advance();
                    ExprKind::Bool(kw == Keyword::True)
                }
                Keyword::Null => {
                    self.advance();
                    ExprKind::Null
                }
                Keyword::Undefined => {
                    self.advance();
                    ExprKind::Undefined
                }
                Keyword::This => {
                    self.advance();
                    ExprKind::This
                }
                Keyword::Function => {
                    let func = self.parse_function(FunctionKind::Plain, false)?;
                    ExprKind::Function(func)
                }
                Keyword::Class => ExprKind::Class(self.parse_class(false)?),
                Keyword::New => return self.parse_new(),
                Keyword::Private | Keyword::Static => {
                    return match self.parse_accessor(false)? {
                        AccessorParse::Member(expr) => Ok(expr),
                        AccessorParse::Bare(_) => unreachable!(),
                    };
                }
                Keyword::Super => {
                    self.advance();
                    if self.check(&TokenKind::LParen) {
                        ExprKind::SuperCall {
                            args: self.parse_args()?,
                        }
                    } else if self.eat(&TokenKind::Dot) {
                        ExprKind::SuperMember {
                            name: self.expect_property_name()?.0,
                        }
                    } else {
                        return Err(self.unexpected("`(` or `.` after `super`"));
                    }
                }
                _ => return Err(self.unexpected("expression")),
            },
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBrace => return self.parse_object_literal(),
            _ => return Err(self.unexpected("expression")),
        };
        self.alloc_expr(kind, span.merge(self.last_span))
    }
}

fn too_deep(span: Span) -> ParseError {
    ParseError::new(
        format!("program nested too deeply (limit {} levels)", MAX_NESTING),
        span,
    )
}

/// Property name for a numeric object-literal key (`{ 1: x }` → `"1"`).
fn format_number_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl<I: Iterator<Item = Token>> Iterator for Parser<I> {
    type Item = Result<Stmt, ParseError>;

    fn next(&mut self) -> Option<Result<Stmt, ParseError>> {
        if self.at_eof || matches!(self.peek_kind(), TokenKind::Eof) {
            self.at_eof = true;
            return None;
        }
        Some(self.parse_statement())
    }
}
