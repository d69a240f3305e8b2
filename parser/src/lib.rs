//! # Parser
//!
//! Front end for Cloister: a streaming lexer, a recursive-descent parser
//! producing an arena AST, and the scope binder that ties every
//! `private` / `static` accessor to its enclosing class.
//!
//! ## Architecture
//!
//! ```text
//!  impl Read (file, stdin, &[u8], …)
//!      │
//!      ▼
//!  ┌────────┐   Token stream    ┌────────┐   Program    ┌────────┐
//!  │ Lexer  │ ────────────────▶ │ Parser │ ───────────▶ │ Binder │ ──▶ Bindings
//!  └────────┘  (impl Iterator)  └────────┘              └────────┘
//! ```
//!
//! ```rust
//! use parser::{binder, parse_program};
//!
//! let source = "class Point { private x = 0; x() { return private.x; } }";
//! let program = parse_program(source).expect("parses");
//! let bindings = binder::bind(&program).expect("every accessor is bound");
//! assert_eq!(bindings.site_count(), 1);
//! ```

pub mod ast;
pub mod binder;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod token;

pub use ast::{
    Accessor, AccessorKind, AstArena, ClassId, ExprId, ExprKind, ExprNode,
    FuncId, MemberKey, Program, Stmt, StmtKind,
};
pub use binder::{Bindings, ConstructId, ScopeError, bind};
pub use lexer::Lexer;
pub use parser::{MAX_NESTING, ParseError, Parser};
pub use span::{Pos, Span};
pub use token::{Token, TokenKind};

/// Parse a whole program unit, collecting every error.
///
/// After an error the parser skips to the next statement boundary and
/// keeps going, so one pass reports as many problems as it can find.
pub fn parse_program(source: &str) -> Result<Program, Vec<ParseError>> {
    let mut parser = Parser::new(Lexer::from_str(source));
    let mut body = Vec::new();
    let mut errors = Vec::new();
    while let Some(result) = parser.next() {
        match result {
            Ok(stmt) => body.push(stmt),
            Err(err) => {
                errors.push(err);
                parser.synchronize();
            }
        }
    }
    if errors.is_empty() {
        Ok(parser.into_program(body))
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{MemberKind, UnaryOp};

    fn program(src: &str) -> Program {
        parse_program(src).unwrap_or_else(|errs| {
            let msgs: Vec<_> = errs.iter().map(|e| e.to_string()).collect();
            panic!("parse failed for {:?}: {:?}", src, msgs)
        })
    }

    fn errors(src: &str) -> Vec<String> {
        match parse_program(src) {
            Ok(_) => panic!("expected parse errors for {:?}", src),
            Err(errs) => errs.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn empty_program() {
        let p = program("");
        assert!(p.body.is_empty());
        let p = program("// nothing here\n/* or here */");
        assert!(p.body.is_empty());
    }

    #[test]
    fn scenario_write_and_forgery_parses() {
        let src = r#"
            class A {
                private id = 0;
                write(v) { private.id = v; }
                read() { return private.id; }
            }
            let x = new A();
            x.write(5);
            x.write.call({}, 99);
        "#;
        let p = program(src);
        assert_eq!(p.body.len(), 4);
        let StmtKind::Class(class) = p.body[0].kind else {
            panic!("expected class");
        };
        let class = p.arena.class(class);
        assert_eq!(class.members.len(), 3);
        assert!(matches!(class.members[0].kind, MemberKind::PrivateField(Some(_))));
    }

    #[test]
    fn scenario_hash_table_parses_and_binds() {
        let src = r#"
            class Hash {
                set(k, v) { private[k] = v; }
                get(k) { return private[k]; }
                has(k) { return k in private; }
                remove(k) { return delete private[k]; }
                same(other, k) { return private(other)[k] == private[k]; }
            }
            let h = new Hash();
            h.set("a", 1);
            h.get("b");
        "#;
        let p = program(src);
        let bindings = bind(&p).expect("binds");
        assert_eq!(bindings.site_count(), 6);

        let deletes = p
            .arena
            .expr_ids()
            .filter(|id| {
                matches!(
                    p.arena.get(*id).kind,
                    ExprKind::Unary {
                        op: UnaryOp::Delete,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(deletes, 1);
    }

    #[test]
    fn recovers_after_errors() {
        let errs = errors("let = 1;\nlet ok = 2;\nconst;\nlet fine = 3;");
        assert_eq!(errs.len(), 2, "{:?}", errs);
        assert!(errs[0].starts_with("1:5"), "{}", errs[0]);
        assert!(errs[1].starts_with("3:"), "{}", errs[1]);
    }

    #[test]
    fn unbound_accessor_is_reported_with_position() {
        let p = program("let y = 1;\n  private.x = y;");
        let errs = bind(&p).expect_err("unbound");
        assert_eq!(errs[0].to_string(), "2:3: `private` used outside of any class body");
    }

    #[test]
    fn static_members_and_methods() {
        let src = r#"
            class Registry {
                static count = 0;
                static bump() { static.count = static.count + 1; return static.count; }
                constructor() { static.bump.call(Registry); }
            }
        "#;
        let p = program(src);
        let bindings = bind(&p).expect("binds");
        let (_, info) = bindings.constructs().next().expect("one construct");
        assert_eq!(info.access_sites, 4);
        assert!(info.static_names.contains("count"));
        assert!(info.static_names.contains("bump"));
    }

    #[test]
    fn keyword_property_names() {
        let p = program("let o = { class: 1 }; o.class; o.new = 2;");
        assert_eq!(p.body.len(), 3);
    }

    #[test]
    fn symbol_keys_via_computed_access() {
        let src = r#"
            const tag = Symbol("tag");
            class Tagged {
                constructor(v) { private[tag] = v; }
                tag() { return private(this)[tag]; }
            }
        "#;
        let p = program(src);
        assert_eq!(bind(&p).expect("binds").site_count(), 2);
    }

    #[test]
    fn overly_deep_source_is_one_parse_error() {
        let errs = errors(&format!("let total = 1{};", " + 1".repeat(5000)));
        assert_eq!(errs.len(), 1, "{:?}", errs);
        assert!(errs[0].contains("nested too deeply"), "{}", errs[0]);
    }

    #[test]
    fn accessors_deep_inside_the_limit_still_bind() {
        let sum = format!("private.n{}", " + private.n".repeat(60));
        let src = format!("class C {{ private n = 1; total() {{ return {}; }} }}", sum);
        let p = program(&src);
        assert_eq!(bind(&p).expect("binds").site_count(), 61);
    }
}
