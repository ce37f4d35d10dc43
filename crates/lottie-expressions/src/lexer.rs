//! Tokenizer for a single statement.

use crate::error::{ExpressionError, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset in the statement text.
    pub position: usize,
}

impl Token {
    pub fn text(&self) -> String {
        match &self.kind {
            TokenKind::Number(n) => n.to_string(),
            TokenKind::Str(s) => format!("\"{}\"", s),
            TokenKind::Ident(s) => s.clone(),
            TokenKind::Punct(p) => (*p).to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }

    pub fn is_punct(&self, p: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(q) if q == p)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(s) if s == name)
    }
}

/// Longest match first.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "...", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=",
    "%=", "+", "-", "*", "/", "%", "=", "<", ">", "!", "(", ")", "[", "]", "{", "}", ",", ".",
    ";", "?", ":",
];

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if source[pos..].starts_with("//") {
            pos = source[pos..].find('\n').map_or(bytes.len(), |i| pos + i);
            continue;
        }
        if source[pos..].starts_with("/*") {
            match source[pos + 2..].find("*/") {
                Some(i) => pos = pos + 2 + i + 2,
                None => return Err(error("unterminated comment", "/*", pos)),
            }
            continue;
        }

        let start = pos;

        if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            pos = scan_number(bytes, pos);
            let text = &source[start..pos];
            let value = text
                .parse::<f64>()
                .map_err(|_| error("invalid number", text, start))?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                position: start,
            });
            continue;
        }

        if c == b'"' || c == b'\'' {
            let (text, end) = scan_string(source, pos)?;
            pos = end;
            tokens.push(Token {
                kind: TokenKind::Str(text),
                position: start,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' || c == b'$' {
            while pos < bytes.len()
                && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_' || bytes[pos] == b'$')
            {
                pos += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Ident(source[start..pos].to_string()),
                position: start,
            });
            continue;
        }

        match PUNCTUATORS.iter().find(|p| source[pos..].starts_with(**p)) {
            Some(p) => {
                pos += p.len();
                tokens.push(Token {
                    kind: TokenKind::Punct(p),
                    position: start,
                });
            }
            None => {
                let ch = source[pos..].chars().next().unwrap_or('?');
                return Err(error("unexpected character", &ch.to_string(), pos));
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: source.len(),
    });
    Ok(tokens)
}

fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    pos
}

fn scan_string(source: &str, start: usize) -> Result<(String, usize)> {
    let mut chars = source[start..].char_indices();
    let quote = match chars.next() {
        Some((_, q)) => q,
        None => return Err(error("unterminated string", "", start)),
    };
    let mut text = String::new();

    while let Some((i, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((text, start + i + c.len_utf8())),
            '\\' => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, 'r')) => text.push('\r'),
                Some((_, '0')) => text.push('\0'),
                Some((_, other)) => text.push(other),
                None => break,
            },
            c => text.push(c),
        }
    }
    Err(error("unterminated string", &source[start..], start))
}

fn error(message: &str, token: &str, position: usize) -> ExpressionError {
    ExpressionError::Syntax {
        message: message.to_string(),
        token: token.to_string(),
        position,
    }
}
