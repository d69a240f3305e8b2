//! Streaming lexer for Cloister source.
//!
//! The [`Lexer`] consumes bytes from any [`std::io::Read`] source (a file,
//! `stdin`, an in-memory buffer) and implements [`Iterator`] over
//! [`Token`]s, tracking byte offset, line and column for each one.
//!
//! | Syntax         | Kind          | Notes                        |
//! |----------------|---------------|------------------------------|
//! | `// …`         | Line comment  | Runs to end of line          |
//! | `/* … */`      | Block comment | **Nestable** (`/* /* */ */`) |
//! | `"…"` / `'…'`  | String        | `\n \t \r \0 \\ \" \'`       |
//!
//! `private`, `static`, `super` and the other reserved words are lexed as
//! [`TokenKind::Keyword`]; whether they are *bound* is decided later by
//! the binder.
use std::io::Read;

use crate::span::{Pos, Span};
use crate::token::{Keyword, Operator, Token, TokenKind};

/// Bytes of lookahead kept in the read buffer. Two bytes is the deepest
/// peek the lexer needs (`/*`, `==`, `&&`); the rest is headroom for
/// multi-byte UTF-8 identifiers.
const LOOKAHEAD: usize = 8;

struct ReadBuf<R: Read> {
    reader: R,
    buf: [u8; LOOKAHEAD],
    /// Valid bytes in `buf`, starting at index 0.
    filled: usize,
    reader_eof: bool,
    pos: Pos,
}

impl<R: Read> ReadBuf<R> {
    fn new(reader: R) -> Self {
        let mut rb = Self {
            reader,
            buf: [0u8; LOOKAHEAD],
            filled: 0,
            reader_eof: false,
            pos: Pos::origin(),
        };
        rb.fill();
        rb
    }

    fn fill(&mut self) {
        while !self.reader_eof && self.filled < LOOKAHEAD {
            let mut one = [0u8; 1];
            match self.reader.read(&mut one) {
                Ok(0) | Err(_) => self.reader_eof = true,
                Ok(_) => {
                    self.buf[self.filled] = one[0];
                    self.filled += 1;
                }
            }
        }
    }

    fn pos(&self) -> Pos {
        self.pos
    }

    fn peek_ahead(&self, n: usize) -> Option<u8> {
        (n < self.filled).then(|| self.buf[n])
    }

    fn advance(&mut self) -> Option<u8> {
        if self.filled == 0 {
            return None;
        }
        let b = self.buf[0];
        self.buf.copy_within(1..self.filled, 0);
        self.filled -= 1;
        self.fill();

        self.pos.advance(b);
        Some(b)
    }

    /// Decode the leading UTF-8 character without consuming it. Invalid
    /// or truncated sequences decode as U+FFFD with length 1.
    fn peek_char(&self) -> Option<(char, usize)> {
        let b0 = self.peek_ahead(0)?;
        let (len, first_bits) = match b0 {
            0x00..=0x7F => return Some((b0 as char, 1)),
            0xC0..=0xDF => (2, (b0 & 0x1F) as u32),
            0xE0..=0xEF => (3, (b0 & 0x0F) as u32),
            0xF0..=0xF7 => (4, (b0 & 0x07) as u32),
            _ => return Some(('\u{FFFD}', 1)),
        };
        if len > self.filled {
            return Some(('\u{FFFD}', 1));
        }
        let mut codepoint = first_bits;
        for i in 1..len {
            let cont = self.buf[i];
            if cont & 0xC0 != 0x80 {
                return Some(('\u{FFFD}', 1));
            }
            codepoint = (codepoint << 6) | (cont & 0x3F) as u32;
        }
        Some(char::from_u32(codepoint).map_or(('\u{FFFD}', 1), |c| (c, len)))
    }

    fn advance_char(&mut self) -> Option<char> {
        let (ch, len) = self.peek_char()?;
        for _ in 0..len {
            self.advance();
        }
        Some(ch)
    }
}

/// A streaming lexer.
///
/// ```rust
/// use parser::{Lexer, TokenKind};
///
/// let kinds: Vec<_> = Lexer::from_str("private.id").map(|t| t.kind).collect();
/// assert_eq!(kinds.len(), 4);
/// assert!(matches!(kinds[1], TokenKind::Dot));
/// ```
pub struct Lexer<R: Read> {
    rb: ReadBuf<R>,
    emitted_eof: bool,
}

impl<R: Read> Lexer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            rb: ReadBuf::new(reader),
            emitted_eof: false,
        }
    }
}

impl<'a> Lexer<&'a [u8]> {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(source: &'a str) -> Self {
        Self::new(source.as_bytes())
    }
}

impl<R: Read> Lexer<R> {
    fn pos(&self) -> Pos {
        self.rb.pos()
    }

    fn peek(&self) -> Option<u8> {
        self.rb.peek_ahead(0)
    }

    fn peek_ahead(&self, n: usize) -> Option<u8> {
        self.rb.peek_ahead(n)
    }

    fn advance(&mut self) -> Option<u8> {
        self.rb.advance()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C) = self.peek() {
            self.advance();
        }
    }

    fn single(&mut self, kind: TokenKind, lexeme: &str) -> Token {
        let start = self.pos();
        for _ in 0..lexeme.len() {
            self.advance();
        }
        Token::new(kind, Span::new(start, self.pos()), lexeme)
    }

    fn lex_line_comment(&mut self) -> Token {
        let start = self.pos();
        self.advance();
        self.advance();
        let mut text = Vec::new();
        while let Some(b) = self.peek() {
            if b == b'\n' {
                break;
            }
            text.push(b);
            self.advance();
        }
        let text = String::from_utf8_lossy(&text).into_owned();
        let raw = format!("//{}", text);
        Token::new(
            TokenKind::LineComment(text),
            Span::new(start, self.pos()),
            raw,
        )
    }

    fn lex_block_comment(&mut self) -> Token {
        let start = self.pos();
        self.advance();
        self.advance();
        let mut text = Vec::new();
        let mut depth: usize = 1;

        loop {
            match self.peek() {
                None => {
                    return Token::new(
                        TokenKind::Error("unterminated block comment".into()),
                        Span::new(start, self.pos()),
                        "/*",
                    );
                }
                Some(b'/') if self.peek_ahead(1) == Some(b'*') => {
                    depth += 1;
                    text.extend_from_slice(b"/*");
                    self.advance();
                    self.advance();
                }
                Some(b'*') if self.peek_ahead(1) == Some(b'/') => {
                    self.advance();
                    self.advance();
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    text.extend_from_slice(b"*/");
                }
                Some(b) => {
                    text.push(b);
                    self.advance();
                }
            }
        }
        let text = String::from_utf8_lossy(&text).into_owned();
        let raw = format!("/*{}*/", text);
        Token::new(
            TokenKind::BlockComment(text),
            Span::new(start, self.pos()),
            raw,
        )
    }

    /// Lex a string literal delimited by `quote` (`"` or `'`).
    fn lex_string(&mut self, quote: u8) -> Token {
        let start = self.pos();
        self.advance();
        let mut value = Vec::new();
        loop {
            match self.advance() {
                Some(b) if b == quote => break,
                Some(b'\\') => {
                    let escaped = match self.advance() {
                        Some(b'n') => b'\n',
                        Some(b't') => b'\t',
                        Some(b'r') => b'\r',
                        Some(b'0') => b'\0',
                        Some(other) => other,
                        None => {
                            return Token::new(
                                TokenKind::Error(
                                    "unterminated string escape".into(),
                                ),
                                Span::new(start, self.pos()),
                                "",
                            );
                        }
                    };
                    value.push(escaped);
                }
                Some(b) => value.push(b),
                None => {
                    return Token::new(
                        TokenKind::Error("unterminated string".into()),
                        Span::new(start, self.pos()),
                        "",
                    );
                }
            }
        }
        let value = String::from_utf8_lossy(&value).into_owned();
        let raw = format!("{0}{1}{0}", quote as char, value);
        Token::new(TokenKind::String(value), Span::new(start, self.pos()), raw)
    }

    /// Lex a decimal number with optional fraction and exponent. `_` may
    /// separate digits.
    fn lex_number(&mut self) -> Token {
        let start = self.pos();
        let mut raw = String::new();

        let take_digits = |lexer: &mut Self, raw: &mut String| {
            while let Some(b) = lexer.peek() {
                if b.is_ascii_digit() || b == b'_' {
                    raw.push(b as char);
                    lexer.advance();
                } else {
                    break;
                }
            }
        };

        take_digits(self, &mut raw);

        // `3.name` is a member access on 3, not a float
        if self.peek() == Some(b'.')
            && matches!(self.peek_ahead(1), Some(d) if d.is_ascii_digit())
        {
            raw.push('.');
            self.advance();
            take_digits(self, &mut raw);
        }

        if matches!(self.peek(), Some(b'e' | b'E')) {
            let sign = matches!(self.peek_ahead(1), Some(b'+' | b'-'));
            let digit_at = if sign { 2 } else { 1 };
            if matches!(self.peek_ahead(digit_at), Some(d) if d.is_ascii_digit())
            {
                for _ in 0..digit_at {
                    if let Some(b) = self.advance() {
                        raw.push(b as char);
                    }
                }
                take_digits(self, &mut raw);
            }
        }

        let span = Span::new(start, self.pos());
        let normalized: String = raw.chars().filter(|c| *c != '_').collect();
        match normalized.parse::<f64>() {
            Ok(v) => Token::new(TokenKind::Number(v), span, raw),
            Err(e) => Token::new(
                TokenKind::Error(format!("invalid number: {}", e)),
                span,
                raw,
            ),
        }
    }

    fn lex_identifier_or_keyword(&mut self) -> Token {
        let start = self.pos();
        let mut raw = String::new();
        while let Some((ch, _)) = self.rb.peek_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                self.rb.advance_char();
                raw.push(ch);
            } else {
                break;
            }
        }
        let span = Span::new(start, self.pos());
        let kind = match Keyword::from_ident(&raw) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier(raw.clone()),
        };
        Token::new(kind, span, raw)
    }

    /// Produce the next token from the stream.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.pos();
        let Some(b) = self.peek() else {
            self.emitted_eof = true;
            return Token::new(TokenKind::Eof, Span::point(start), "");
        };
        let next = self.peek_ahead(1);

        match (b, next) {
            (b'/', Some(b'/')) => self.lex_line_comment(),
            (b'/', Some(b'*')) => self.lex_block_comment(),
            (b'"' | b'\'', _) => self.lex_string(b),

            (b'(', _) => self.single(TokenKind::LParen, "("),
            (b')', _) => self.single(TokenKind::RParen, ")"),
            (b'[', _) => self.single(TokenKind::LBracket, "["),
            (b']', _) => self.single(TokenKind::RBracket, "]"),
            (b'{', _) => self.single(TokenKind::LBrace, "{"),
            (b'}', _) => self.single(TokenKind::RBrace, "}"),
            (b',', _) => self.single(TokenKind::Comma, ","),
            (b';', _) => self.single(TokenKind::Semicolon, ";"),
            (b':', _) => self.single(TokenKind::Colon, ":"),
            (b'.', Some(d)) if d.is_ascii_digit() => self.lex_number(),
            (b'.', _) => self.single(TokenKind::Dot, "."),

            (b'=', Some(b'=')) => {
                self.single(TokenKind::Operator(Operator::Eq), "==")
            }
            (b'=', _) => self.single(TokenKind::Assign, "="),
            (b'!', Some(b'=')) => {
                self.single(TokenKind::Operator(Operator::NotEq), "!=")
            }
            (b'!', _) => self.single(TokenKind::Operator(Operator::Not), "!"),
            (b'<', Some(b'=')) => {
                self.single(TokenKind::Operator(Operator::LtEq), "<=")
            }
            (b'<', _) => self.single(TokenKind::Operator(Operator::Lt), "<"),
            (b'>', Some(b'=')) => {
                self.single(TokenKind::Operator(Operator::GtEq), ">=")
            }
            (b'>', _) => self.single(TokenKind::Operator(Operator::Gt), ">"),
            (b'&', Some(b'&')) => {
                self.single(TokenKind::Operator(Operator::And), "&&")
            }
            (b'|', Some(b'|')) => {
                self.single(TokenKind::Operator(Operator::Or), "||")
            }
            (b'+', _) => self.single(TokenKind::Operator(Operator::Plus), "+"),
            (b'-', _) => self.single(TokenKind::Operator(Operator::Minus), "-"),
            (b'*', _) => self.single(TokenKind::Operator(Operator::Star), "*"),
            (b'/', _) => self.single(TokenKind::Operator(Operator::Slash), "/"),
            (b'%', _) => {
                self.single(TokenKind::Operator(Operator::Percent), "%")
            }

            (b'0'..=b'9', _) => self.lex_number(),
            (b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$', _) => {
                self.lex_identifier_or_keyword()
            }

            _ => {
                if let Some((ch, _)) = self.rb.peek_char() {
                    if ch.is_alphabetic() {
                        return self.lex_identifier_or_keyword();
                    }
                }
                let ch = self.rb.advance_char().unwrap_or('\u{FFFD}');
                Token::new(
                    TokenKind::Error(format!("unexpected character: {:?}", ch)),
                    Span::new(start, self.pos()),
                    ch.to_string(),
                )
            }
        }
    }
}

impl<R: Read> Iterator for Lexer<R> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        let tok = self.next_token();
        if tok.is_eof() {
            self.emitted_eof = true;
        }
        Some(tok)
    }
}
