//! Tokenizer for fragment text.
//!
//! Only as much lexing as the rewriter needs: it must never mistake text
//! inside strings or comments for code, and multi-character operators have to
//! stay whole so `=` is not confused with `==` or `=>`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Punct,
    Comment,
    Whitespace,
    Newline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset into the source
    pub start: usize,
}

impl Token<'_> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }

    pub fn is_ident(&self, text: &str) -> bool {
        self.is(TokenKind::Ident, text)
    }

    pub fn is_punct(&self, text: &str) -> bool {
        self.is(TokenKind::Punct, text)
    }

    /// Whitespace and comments carry no meaning for the rewriter
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    pub fn opens(&self) -> bool {
        self.kind == TokenKind::Punct && matches!(self.text, "(" | "[" | "{" | "#{")
    }

    pub fn closes(&self) -> bool {
        self.kind == TokenKind::Punct && matches!(self.text, ")" | "]" | "}")
    }
}

// Longest first
const OPERATORS: &[&str] = &[
    "...", "..=", "**=", "<<=", ">>=", "..", "::", "==", "!=", "<=", ">=", "=>", "->", "&&",
    "||", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "**", "<<", ">>", "?.", "?[", "??",
    "#{",
];

pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(c) = src[pos..].chars().next() {
        let rest = &src[pos..];
        let (kind, len) = if c == '\n' {
            (TokenKind::Newline, 1)
        } else if c.is_whitespace() {
            let len = rest
                .find(|ch: char| ch == '\n' || !ch.is_whitespace())
                .unwrap_or(rest.len());
            (TokenKind::Whitespace, len)
        } else if rest.starts_with("//") {
            (TokenKind::Comment, rest.find('\n').unwrap_or(rest.len()))
        } else if rest.starts_with("/*") {
            (TokenKind::Comment, block_comment_len(rest))
        } else if matches!(c, '"' | '\'' | '`') {
            (TokenKind::Str, quoted_len(rest, c))
        } else if c.is_ascii_digit() {
            (TokenKind::Number, number_len(rest))
        } else if c.is_alphabetic() || c == '_' {
            let len = rest
                .find(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
                .unwrap_or(rest.len());
            (TokenKind::Ident, len)
        } else {
            let len = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .map_or(c.len_utf8(), |op| op.len());
            (TokenKind::Punct, len)
        };

        tokens.push(Token {
            kind,
            text: &src[pos..pos + len],
            start: pos,
        });
        pos += len;
    }

    tokens
}

/// Block comments nest
fn block_comment_len(rest: &str) -> usize {
    let mut depth = 0usize;
    let mut i = 0;
    while i < rest.len() {
        if rest[i..].starts_with("/*") {
            depth += 1;
            i += 2;
        } else if rest[i..].starts_with("*/") {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += rest[i..].chars().next().map_or(1, char::len_utf8);
        }
    }
    rest.len()
}

fn quoted_len(rest: &str, quote: char) -> usize {
    let mut escaped = false;
    for (i, ch) in rest.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == quote {
            return i + ch.len_utf8();
        }
    }
    rest.len()
}

/// Digits, `_` separators, hex/exponent letters and a fractional part.
/// `1..3` stays a range.
fn number_len(rest: &str) -> usize {
    let bytes = rest.as_bytes();
    let mut i = 0;
    let mut seen_dot = false;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_alphanumeric() || b == b'_' {
            i += 1;
        } else if b == b'.'
            && !seen_dot
            && bytes.get(i + 1).is_some_and(|next| next.is_ascii_digit())
        {
            seen_dot = true;
            i += 1;
        } else {
            break;
        }
    }
    i
}

/// Whether `text` is a plain identifier
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {
            chars.all(|ch| ch.is_alphanumeric() || ch == '_')
        }
        _ => false,
    }
}
