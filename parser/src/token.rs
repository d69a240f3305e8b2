//! Token types produced by the lexer.
use crate::span::Span;

/// The kind of a lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Numeric literal, e.g. `42`, `3.5`, `1e3`.
    Number(f64),
    /// String literal (contents without quotes), e.g. `"id"` or `'id'`.
    String(std::string::String),
    /// An identifier, e.g. `counter`, `_tmp`, `Point`.
    Identifier(std::string::String),

    /// A reserved word.
    Keyword(Keyword),

    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// `=`
    Assign,
    /// Any other operator: `+`, `==`, `&&`, `<=`, …
    Operator(Operator),

    /// A line comment: `// ...` (text excludes the leading `//`).
    LineComment(std::string::String),
    /// A block comment: `/* ... */` (text excludes delimiters). May nest.
    BlockComment(std::string::String),

    /// End of input.
    Eof,
    /// An unrecognized character or malformed token.
    Error(std::string::String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Class,
    Extends,
    Constructor,
    New,
    This,
    Super,
    Private,
    Static,
    Let,
    Const,
    Function,
    Return,
    If,
    Else,
    While,
    Throw,
    Try,
    Catch,
    Delete,
    In,
    Typeof,
    True,
    False,
    Null,
    Undefined,
}

impl Keyword {
    pub fn from_ident(ident: &str) -> Option<Self> {
        Some(match ident {
            "class" => Self::Class,
            "extends" => Self::Extends,
            "constructor" => Self::Constructor,
            "new" => Self::New,
            "this" => Self::This,
            "super" => Self::Super,
            "private" => Self::Private,
            "static" => Self::Static,
            "let" => Self::Let,
            "const" => Self::Const,
            "function" => Self::Function,
            "return" => Self::Return,
            "if" => Self::If,
            "else" => Self::Else,
            "while" => Self::While,
            "throw" => Self::Throw,
            "try" => Self::Try,
            "catch" => Self::Catch,
            "delete" => Self::Delete,
            "in" => Self::In,
            "typeof" => Self::Typeof,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            "undefined" => Self::Undefined,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Extends => "extends",
            Self::Constructor => "constructor",
            Self::New => "new",
            Self::This => "this",
            Self::Super => "super",
            Self::Private => "private",
            Self::Static => "static",
            Self::Let => "let",
            Self::Const => "const",
            Self::Function => "function",
            Self::Return => "return",
            Self::If => "if",
            Self::Else => "else",
            Self::While => "while",
            Self::Throw => "throw",
            Self::Try => "try",
            Self::Catch => "catch",
            Self::Delete => "delete",
            Self::In => "in",
            Self::Typeof => "typeof",
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
            Self::Undefined => "undefined",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Not,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::Not => "!",
        }
    }
}

impl TokenKind {
    /// Human-readable name for error messages.
    pub fn name(&self) -> std::string::String {
        match self {
            Self::Number(_) => "number".into(),
            Self::String(_) => "string".into(),
            Self::Identifier(_) => "identifier".into(),
            Self::Keyword(kw) => format!("`{}`", kw.as_str()),
            Self::LParen => "`(`".into(),
            Self::RParen => "`)`".into(),
            Self::LBracket => "`[`".into(),
            Self::RBracket => "`]`".into(),
            Self::LBrace => "`{`".into(),
            Self::RBrace => "`}`".into(),
            Self::Comma => "`,`".into(),
            Self::Semicolon => "`;`".into(),
            Self::Colon => "`:`".into(),
            Self::Dot => "`.`".into(),
            Self::Assign => "`=`".into(),
            Self::Operator(op) => format!("`{}`", op.as_str()),
            Self::LineComment(_) => "line comment".into(),
            Self::BlockComment(_) => "block comment".into(),
            Self::Eof => "end of input".into(),
            Self::Error(_) => "error".into(),
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Self::LineComment(_) | Self::BlockComment(_))
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        matches!(self, Self::Keyword(k) if *k == kw)
    }
}

/// A token with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// The original source text of this token.
    pub lexeme: std::string::String,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        span: Span,
        lexeme: impl Into<std::string::String>,
    ) -> Self {
        Self {
            kind,
            span,
            lexeme: lexeme.into(),
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    pub fn is_comment(&self) -> bool {
        self.kind.is_comment()
    }
}
